//! YAML-backed settings for the scraper, storage locations and analysis stages.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const BRIGHT_DATA_API_KEY_ENV: &str = "BRIGHT_DATA_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub api_base: String,
    pub dataset_id: String,
    pub post_limit: u32,
    pub order_by: String,
    pub country: String,
    pub output_format: String,
    pub poll_interval_secs: u64,
    /// `None` keeps polling until the provider reports a terminal status.
    pub max_poll_attempts: Option<u32>,
    pub curl_path: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.brightdata.com/datasets/v3".to_string(),
            dataset_id: "gd_lk56epmy2i5g7lzu0k".to_string(),
            post_limit: 10,
            order_by: "Latest".to_string(),
            country: String::new(),
            output_format: "json".to_string(),
            poll_interval_secs: 10,
            max_poll_attempts: Some(360),
            curl_path: "curl".to_string(),
        }
    }
}

impl ScraperConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub transcripts_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            transcripts_dir: PathBuf::from("transcripts"),
            reports_dir: PathBuf::from("reports"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub max_output_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gpt-4o".to_string(),
            max_output_tokens: 16_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Reads the scraped transcript files.
    TranscriptAnalysis,
    /// Works from the previous stage's output.
    Synthesis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    pub kind: StageKind,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub description: String,
    pub expected_output: String,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::configuration(format!(
                "{} file is missing",
                path.display()
            )));
        }

        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&raw)?;
        tracing::debug!(path = %path.display(), stages = config.stages.len(), "loaded config");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(Error::configuration("no analysis stages are defined"));
        }

        if self.stages[0].kind != StageKind::TranscriptAnalysis {
            return Err(Error::configuration(format!(
                "the first stage ('{}') must be a transcript_analysis stage",
                self.stages[0].name
            )));
        }

        if self.scraper.poll_interval_secs == 0 {
            return Err(Error::configuration("poll_interval_secs must be at least 1"));
        }

        Ok(())
    }
}

/// Reads the scraping provider key, failing before any network call is made.
pub fn bright_data_api_key() -> Result<String> {
    match env::var(BRIGHT_DATA_API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(Error::configuration(format!(
            "{BRIGHT_DATA_API_KEY_ENV} is missing"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
stages:
  - name: analysis
    kind: transcript_analysis
    role: Analyst
    goal: Find trends
    backstory: Watches a lot of video
    description: "Read {file_paths}"
    expected_output: A list of trends
"#;

    #[test]
    fn scraper_defaults_apply_when_section_missing() {
        let config = AppConfig::from_yaml(MINIMAL).expect("valid config");
        assert_eq!(config.scraper, ScraperConfig::default());
        assert_eq!(config.scraper.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.storage.transcripts_dir, PathBuf::from("transcripts"));
        assert_eq!(config.stages.len(), 1);
    }

    #[test]
    fn partial_scraper_section_keeps_other_defaults() {
        let raw = format!("scraper:\n  post_limit: 3\n  max_poll_attempts: null\n{MINIMAL}");
        let config = AppConfig::from_yaml(&raw).expect("valid config");
        assert_eq!(config.scraper.post_limit, 3);
        assert_eq!(config.scraper.max_poll_attempts, None);
        assert_eq!(config.scraper.order_by, "Latest");
    }

    #[test]
    fn rejects_config_without_stages() {
        let err = AppConfig::from_yaml("scraper:\n  post_limit: 3\n").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn rejects_synthesis_as_first_stage() {
        let raw = MINIMAL.replace("transcript_analysis", "synthesis");
        assert!(AppConfig::from_yaml(&raw).is_err());
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(&dir.path().join("config.yaml")).unwrap_err();
        assert!(err.to_string().contains("file is missing"));
    }
}
