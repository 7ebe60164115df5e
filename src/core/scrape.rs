use crate::config::ScraperConfig;
use crate::core::command::{CommandRunner, HttpRequest};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A scraped entry exactly as the provider returned it.
pub type RawRecord = Value;

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelQuery {
    pub channel_urls: Vec<String>,
    pub post_limit: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub order_by: String,
    pub country: String,
}

impl ChannelQuery {
    pub fn from_config(
        channel_urls: Vec<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        scraper: &ScraperConfig,
    ) -> Self {
        Self {
            channel_urls,
            post_limit: scraper.post_limit,
            start_date,
            end_date,
            order_by: scraper.order_by.clone(),
            country: scraper.country.clone(),
        }
    }

    /// Non-blank channel URLs, in the order they were given.
    pub fn valid_urls(&self) -> Vec<&str> {
        self.channel_urls
            .iter()
            .map(String::as_str)
            .filter(|url| !url.trim().is_empty())
            .collect()
    }

    pub fn job_items(&self) -> Vec<JobItem> {
        self.valid_urls()
            .into_iter()
            .map(|url| JobItem {
                url: url.to_string(),
                num_of_posts: self.post_limit,
                start_date: format_date(self.start_date),
                end_date: format_date(self.end_date),
                order_by: self.order_by.clone(),
                country: self.country.clone(),
            })
            .collect()
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobItem {
    pub url: String,
    pub num_of_posts: u32,
    pub start_date: String,
    pub end_date: String,
    pub order_by: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriggerResponse {
    #[serde(default)]
    pub snapshot_id: Option<String>,
}

impl TriggerResponse {
    pub fn snapshot_id(&self) -> Option<&str> {
        self.snapshot_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Ready,
    Failed,
    Other(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "running" => JobStatus::Running,
            "ready" => JobStatus::Ready,
            "failed" => JobStatus::Failed,
            other => JobStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Ready => "ready",
            JobStatus::Failed => "failed",
            JobStatus::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStatus {
    pub status: JobStatus,
    pub raw: Value,
}

impl ProgressStatus {
    pub fn from_value(raw: Value) -> Self {
        let status = match raw.get("status") {
            Some(Value::String(s)) => JobStatus::parse(s),
            Some(other) => JobStatus::Other(other.to_string()),
            None => JobStatus::Other("unknown".to_string()),
        };
        Self { status, raw }
    }
}

/// What a snapshot download actually produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotData {
    Records(Vec<RawRecord>),
    Empty,
    TransportFailed(String),
    Unparseable,
}

impl SnapshotData {
    pub fn into_records(self) -> Vec<RawRecord> {
        match self {
            SnapshotData::Records(records) => records,
            _ => Vec::new(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SnapshotData::Records(records) => format!("{} raw records", records.len()),
            SnapshotData::Empty => "the provider returned empty output".to_string(),
            SnapshotData::TransportFailed(reason) => {
                format!("the result download failed: {reason}")
            }
            SnapshotData::Unparseable => "the provider output could not be parsed".to_string(),
        }
    }
}

pub struct ScrapeClient<R> {
    runner: R,
    api_base: String,
    dataset_id: String,
}

impl<R: CommandRunner> ScrapeClient<R> {
    pub fn new(runner: R, scraper: &ScraperConfig) -> Self {
        Self {
            runner,
            api_base: scraper.api_base.trim_end_matches('/').to_string(),
            dataset_id: scraper.dataset_id.clone(),
        }
    }

    fn trigger_url(&self) -> String {
        format!(
            "{}/trigger?dataset_id={}&include_errors=true&type=discover_new&discover_by=url",
            self.api_base, self.dataset_id
        )
    }

    fn progress_url(&self, snapshot_id: &str) -> String {
        format!("{}/progress/{snapshot_id}", self.api_base)
    }

    fn snapshot_url(&self, snapshot_id: &str, format: &str) -> String {
        format!("{}/snapshot/{snapshot_id}?format={format}", self.api_base)
    }

    /// Submits one discovery job covering every non-blank channel URL.
    pub async fn trigger(&self, api_key: &str, query: &ChannelQuery) -> Option<TriggerResponse> {
        let items = query.job_items();
        if items.is_empty() {
            tracing::warn!("no channel URLs left after dropping blanks; not triggering");
            return None;
        }

        let body = match serde_json::to_string(&items) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("failed to encode trigger payload: {e}");
                return None;
            }
        };

        let request = HttpRequest::post_json(self.trigger_url(), api_key, body);
        let output = self.runner.run(&request).await?;
        if !output.success() {
            tracing::warn!(
                exit_code = ?output.exit_code,
                stderr = %output.stderr.trim(),
                "trigger request failed"
            );
            return None;
        }

        match serde_json::from_str::<TriggerResponse>(output.stdout.trim()) {
            Ok(response) => {
                tracing::info!(
                    snapshot_id = ?response.snapshot_id,
                    channels = items.len(),
                    "scrape job triggered"
                );
                Some(response)
            }
            Err(e) => {
                tracing::warn!("failed to parse trigger response: {e}");
                None
            }
        }
    }

    pub async fn progress(&self, api_key: &str, snapshot_id: &str) -> Option<ProgressStatus> {
        let request = HttpRequest::get(self.progress_url(snapshot_id), api_key);
        let output = self.runner.run(&request).await?;
        if !output.success() {
            tracing::warn!(snapshot_id, exit_code = ?output.exit_code, "progress request failed");
            return None;
        }

        match serde_json::from_str::<Value>(output.stdout.trim()) {
            Ok(value) => Some(ProgressStatus::from_value(value)),
            Err(e) => {
                tracing::warn!(snapshot_id, "failed to parse progress response: {e}");
                None
            }
        }
    }

    /// Downloads the snapshot and keeps the reason when nothing usable came back.
    pub async fn fetch_snapshot(
        &self,
        api_key: &str,
        snapshot_id: &str,
        format: &str,
    ) -> SnapshotData {
        let request = HttpRequest::get(self.snapshot_url(snapshot_id, format), api_key);
        let Some(output) = self.runner.run(&request).await else {
            return SnapshotData::TransportFailed("http client could not be launched".to_string());
        };

        if !output.success() {
            tracing::warn!(snapshot_id, stderr = %output.stderr.trim(), "snapshot download failed");
            return SnapshotData::TransportFailed(output.stderr.trim().to_string());
        }

        if output.stdout.trim().is_empty() {
            tracing::warn!(snapshot_id, "provider returned empty output");
            return SnapshotData::Empty;
        }

        match parse_snapshot_body(&output.stdout) {
            Some(records) => SnapshotData::Records(records),
            None => {
                tracing::error!(snapshot_id, "could not parse snapshot output");
                SnapshotData::Unparseable
            }
        }
    }

    pub async fn fetch(&self, api_key: &str, snapshot_id: &str, format: &str) -> Vec<RawRecord> {
        self.fetch_snapshot(api_key, snapshot_id, format)
            .await
            .into_records()
    }
}

/// Parses a snapshot body as one JSON document, falling back to JSON lines.
pub fn parse_snapshot_body(body: &str) -> Option<Vec<RawRecord>> {
    let body = body.trim();
    if body.is_empty() {
        return Some(Vec::new());
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(records)) => Some(records),
        Ok(single) => Some(vec![single]),
        Err(e) => {
            tracing::debug!("whole-body parse failed ({e}); trying JSON lines");
            body.lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| serde_json::from_str::<Value>(line).ok())
                .collect()
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::core::command::{CommandOutput, CommandRunner, HttpRequest};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays canned outputs in order and records every request it was given.
    #[derive(Clone, Default)]
    pub struct ScriptedRunner {
        responses: Arc<Mutex<VecDeque<Option<CommandOutput>>>>,
        pub requests: Arc<Mutex<Vec<HttpRequest>>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn ok(self, stdout: &str) -> Self {
            self.push(Some(CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: Some(0),
            }))
        }

        pub fn exit(self, code: i32, stderr: &str) -> Self {
            self.push(Some(CommandOutput {
                stdout: String::new(),
                stderr: stderr.to_string(),
                exit_code: Some(code),
            }))
        }

        pub fn launch_failure(self) -> Self {
            self.push(None)
        }

        fn push(self, response: Option<CommandOutput>) -> Self {
            self.responses.lock().unwrap().push_back(response);
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn request(&self, index: usize) -> HttpRequest {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        async fn run(&self, request: &HttpRequest) -> Option<CommandOutput> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted runner ran out of responses")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedRunner;
    use super::*;
    use crate::core::command::Method;
    use serde_json::json;

    fn query(urls: &[&str]) -> ChannelQuery {
        ChannelQuery::from_config(
            urls.iter().map(|u| u.to_string()).collect(),
            parse_date("2024-01-01").unwrap(),
            parse_date("2024-01-31").unwrap(),
            &ScraperConfig::default(),
        )
    }

    fn client(runner: ScriptedRunner) -> ScrapeClient<ScriptedRunner> {
        ScrapeClient::new(runner, &ScraperConfig::default())
    }

    #[tokio::test]
    async fn trigger_sends_only_non_blank_urls_in_order() {
        let runner = ScriptedRunner::new().ok(r#"{"snapshot_id":"s1"}"#);
        let client = client(runner.clone());

        let response = client
            .trigger("key", &query(&["https://yt/a", "  ", "", "https://yt/b"]))
            .await
            .expect("trigger response");
        assert_eq!(response.snapshot_id(), Some("s1"));

        let request = runner.request(0);
        assert_eq!(request.method, Method::Post);
        assert!(request.url.contains("/trigger?dataset_id=gd_lk56epmy2i5g7lzu0k"));
        let payload: Vec<JobItem> =
            serde_json::from_str(request.json_body.as_deref().unwrap()).unwrap();
        let urls: Vec<&str> = payload.iter().map(|item| item.url.as_str()).collect();
        assert_eq!(urls, vec!["https://yt/a", "https://yt/b"]);
        assert_eq!(payload[0].num_of_posts, 10);
        assert_eq!(payload[0].start_date, "2024-01-01");
        assert_eq!(payload[1].end_date, "2024-01-31");
        assert_eq!(payload[1].order_by, "Latest");
        assert_eq!(payload[1].country, "");
    }

    #[tokio::test]
    async fn trigger_with_only_blank_urls_makes_no_request() {
        let runner = ScriptedRunner::new();
        let client = client(runner.clone());

        assert!(client.trigger("key", &query(&[" ", "\t"])).await.is_none());
        assert!(client.trigger("key", &query(&[])).await.is_none());
        assert_eq!(runner.request_count(), 0);
    }

    #[tokio::test]
    async fn trigger_returns_none_on_failure_or_garbage() {
        let runner = ScriptedRunner::new()
            .exit(6, "could not resolve host")
            .ok("<html>bad gateway</html>")
            .launch_failure();
        let client = client(runner);
        let q = query(&["https://yt/a"]);

        assert!(client.trigger("key", &q).await.is_none());
        assert!(client.trigger("key", &q).await.is_none());
        assert!(client.trigger("key", &q).await.is_none());
    }

    #[tokio::test]
    async fn trigger_without_snapshot_id_parses_but_has_no_id() {
        let runner = ScriptedRunner::new().ok(r#"{"error":"invalid token"}"#);
        let response = client(runner)
            .trigger("key", &query(&["https://yt/a"]))
            .await
            .expect("parsed");
        assert_eq!(response.snapshot_id(), None);
    }

    #[tokio::test]
    async fn progress_reads_status() {
        let runner = ScriptedRunner::new()
            .ok(r#"{"status":"running","records":0}"#)
            .ok(r#"{"status":"collecting"}"#)
            .ok("not json");
        let client = client(runner.clone());

        let first = client.progress("key", "s1").await.unwrap();
        assert_eq!(first.status, JobStatus::Running);
        assert_eq!(first.raw["records"], json!(0));

        let second = client.progress("key", "s1").await.unwrap();
        assert_eq!(second.status, JobStatus::Other("collecting".to_string()));

        assert!(client.progress("key", "s1").await.is_none());
        assert!(runner.request(0).url.ends_with("/progress/s1"));
    }

    #[tokio::test]
    async fn fetch_wraps_single_object() {
        let runner = ScriptedRunner::new().ok(r#"{"url":"u","shortcode":"a"}"#);
        let records = client(runner.clone()).fetch("key", "s1", "json").await;
        assert_eq!(records, vec![json!({"url":"u","shortcode":"a"})]);
        assert!(runner.request(0).url.ends_with("/snapshot/s1?format=json"));
    }

    #[tokio::test]
    async fn fetch_falls_back_to_json_lines() {
        let body = "{\"shortcode\":\"a\"}\n\n{\"shortcode\":\"b\"}\n";
        let runner = ScriptedRunner::new().ok(body);
        let records = client(runner).fetch("key", "s1", "json").await;
        assert_eq!(records, vec![json!({"shortcode":"a"}), json!({"shortcode":"b"})]);
    }

    #[tokio::test]
    async fn fetch_empty_body_is_empty_list() {
        let runner = ScriptedRunner::new().ok("   \n").ok("");
        let client = client(runner.clone());
        assert_eq!(
            client.fetch_snapshot("key", "s1", "json").await,
            SnapshotData::Empty
        );
        assert_eq!(client.fetch("key", "s1", "json").await, Vec::<RawRecord>::new());
    }

    #[tokio::test]
    async fn fetch_distinguishes_failure_kinds() {
        let runner = ScriptedRunner::new()
            .exit(22, "HTTP 500")
            .ok("{not json}\nalso not json")
            .launch_failure();
        let client = client(runner);

        assert_eq!(
            client.fetch_snapshot("key", "s1", "json").await,
            SnapshotData::TransportFailed("HTTP 500".to_string())
        );
        assert_eq!(
            client.fetch_snapshot("key", "s1", "json").await,
            SnapshotData::Unparseable
        );
        assert!(client.fetch("key", "s1", "json").await.is_empty());
    }

    #[test]
    fn json_lines_fallback_is_all_or_nothing() {
        assert_eq!(parse_snapshot_body("{\"a\":1}\n{broken"), None);
        assert_eq!(
            parse_snapshot_body("[1, {\"a\":2}]"),
            Some(vec![json!(1), json!({"a": 2})])
        );
    }
}
