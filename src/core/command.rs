use std::future::Future;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outbound request, described independently of the client that sends it.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub bearer_token: String,
    pub json_body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, bearer_token: &str) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            bearer_token: bearer_token.to_string(),
            json_body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, bearer_token: &str, body: String) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            bearer_token: bearer_token.to_string(),
            json_body: Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub trait CommandRunner {
    /// Returns `None` only when the process could not be launched.
    fn run(&self, request: &HttpRequest) -> impl Future<Output = Option<CommandOutput>> + Send;
}

/// Sends requests through the `curl` executable.
#[derive(Debug, Clone)]
pub struct CurlRunner {
    program: String,
}

impl CurlRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for CurlRunner {
    fn default() -> Self {
        Self::new("curl")
    }
}

impl CommandRunner for CurlRunner {
    async fn run(&self, request: &HttpRequest) -> Option<CommandOutput> {
        let args = curl_args(request);
        tracing::debug!(method = ?request.method, url = %request.url, "running curl");

        let output = match Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(program = %self.program, "failed to launch http client: {e}");
                return None;
            }
        };

        // Progress meters can emit bytes that are not valid UTF-8.
        Some(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

pub fn curl_args(request: &HttpRequest) -> Vec<String> {
    let mut args = vec![
        "-H".to_string(),
        format!("Authorization: Bearer {}", request.bearer_token),
    ];

    if request.method == Method::Post {
        args.push("-X".to_string());
        args.push("POST".to_string());
    }

    if let Some(body) = &request.json_body {
        args.push("-H".to_string());
        args.push("Content-Type: application/json".to_string());
        args.push("-d".to_string());
        args.push(body.clone());
    }

    args.push(request.url.clone());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_request_has_auth_header_and_url_last() {
        let request = HttpRequest::get("https://example.test/progress/s1", "k3y");
        let args = curl_args(&request);
        assert_eq!(
            args,
            vec![
                "-H",
                "Authorization: Bearer k3y",
                "https://example.test/progress/s1"
            ]
        );
    }

    #[test]
    fn post_request_carries_json_body() {
        let request =
            HttpRequest::post_json("https://example.test/trigger", "k3y", "[]".to_string());
        let args = curl_args(&request);
        assert!(args.windows(2).any(|w| w == ["-X", "POST"]));
        assert!(args.windows(2).any(|w| w == ["-d", "[]"]));
        assert!(
            args.windows(2)
                .any(|w| w == ["-H", "Content-Type: application/json"])
        );
        assert_eq!(args.last().map(String::as_str), Some("https://example.test/trigger"));
    }

    #[tokio::test]
    async fn missing_executable_yields_none() {
        let runner = CurlRunner::new("vidtrend-no-such-http-client");
        let request = HttpRequest::get("https://example.test", "k");
        assert!(runner.run(&request).await.is_none());
    }
}
