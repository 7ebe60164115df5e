use async_openai::error::OpenAIError;
use derive_more::{Display, From};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, From)]
pub enum Error {
    #[display("Configuration error: {_0}")]
    Configuration(String),

    #[display("{_0}")]
    Submission(String),

    #[display("Scraping failed on the provider side (snapshot {snapshot_id})")]
    JobFailed { snapshot_id: String },

    #[display("Gave up waiting for snapshot {snapshot_id} after {attempts} progress checks")]
    PollTimeout { snapshot_id: String, attempts: u32 },

    #[display("Could not read progress for snapshot {snapshot_id}")]
    ProgressUnavailable { snapshot_id: String },

    #[display("Analysis error: {_0}")]
    Analysis(String),

    #[from]
    #[display("{_0}")]
    Io(std::io::Error),

    #[from]
    #[display("{_0}")]
    Json(serde_json::Error),

    #[from]
    #[display("{_0}")]
    Yaml(serde_yaml::Error),

    #[from]
    #[display("{_0}")]
    OpenAi(OpenAIError),

    #[display("{_0}")]
    Custom(String),
}

impl Error {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn submission(message: impl Into<String>) -> Self {
        Self::Submission(message.into())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Yaml(e) => Some(e),
            Error::OpenAi(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn poll_timeout_message_names_snapshot() {
        let err = Error::PollTimeout {
            snapshot_id: "s_1".to_string(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "Gave up waiting for snapshot s_1 after 3 progress checks"
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "denied");
    }
}
