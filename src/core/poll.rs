use crate::config::ScraperConfig;
use crate::core::command::CommandRunner;
use crate::core::sanitize::{CleanRecord, clean};
use crate::core::scrape::{ChannelQuery, JobStatus, ScrapeClient, SnapshotData};
use crate::error::{Error, Result};
use std::time::Duration;
use tokio::sync::mpsc;

/// Progress notifications emitted while a pipeline runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Status(String),
    Log(String),
    Progress(f64),
    Videos(Vec<VideoSummary>),
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoSummary {
    pub shortcode: String,
    pub url: String,
    pub title: Option<String>,
}

impl From<&CleanRecord> for VideoSummary {
    fn from(record: &CleanRecord) -> Self {
        Self {
            shortcode: record.shortcode().to_string(),
            url: record.url().to_string(),
            title: record.title().map(str::to_string),
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<PipelineEvent>;

/// Sends an event if anyone is listening; a closed receiver is not an error.
pub fn emit(events: Option<&EventSender>, event: PipelineEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until the provider reports a terminal status.
    pub max_attempts: Option<u32>,
}

impl PollPolicy {
    pub fn from_config(scraper: &ScraperConfig) -> Self {
        Self {
            interval: scraper.poll_interval(),
            max_attempts: scraper.max_poll_attempts,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: Some(360),
        }
    }
}

/// The result of a job that reached `ready`.
#[derive(Debug, Clone, PartialEq)]
pub struct Harvest {
    pub snapshot_id: String,
    pub records: Vec<CleanRecord>,
    pub fetched: SnapshotData,
}

impl Harvest {
    /// User-facing reason when no valid video survived, if any.
    pub fn empty_reason(&self) -> Option<String> {
        if !self.records.is_empty() {
            return None;
        }
        Some(match &self.fetched {
            SnapshotData::Records(_) => {
                "Scraping finished, but no valid videos were found.".to_string()
            }
            other => format!("Scraping finished, but {}.", other.describe()),
        })
    }
}

pub struct PollOrchestrator<R> {
    client: ScrapeClient<R>,
    policy: PollPolicy,
    output_format: String,
}

impl<R: CommandRunner> PollOrchestrator<R> {
    pub fn new(
        client: ScrapeClient<R>,
        policy: PollPolicy,
        output_format: impl Into<String>,
    ) -> Self {
        Self {
            client,
            policy,
            output_format: output_format.into(),
        }
    }

    /// Submits the query, polls until the job is terminal, then fetches and cleans the results.
    pub async fn run(
        &self,
        api_key: &str,
        query: &ChannelQuery,
        events: Option<&EventSender>,
    ) -> Result<Harvest> {
        if query.valid_urls().is_empty() {
            return Err(Error::submission(
                "No channel URLs were provided. Add at least one channel URL.",
            ));
        }

        emit(events, PipelineEvent::Status("Extracting videos from the channels...".to_string()));
        let snapshot_id = self.submit(api_key, query).await?;
        emit(events, PipelineEvent::Log(format!("Snapshot {snapshot_id} submitted")));

        self.wait_until_ready(api_key, &snapshot_id, events).await?;
        emit(events, PipelineEvent::Status("Scraping completed!".to_string()));

        let fetched = self
            .client
            .fetch_snapshot(api_key, &snapshot_id, &self.output_format)
            .await;
        let records = clean(fetched.clone().into_records());
        tracing::info!(%snapshot_id, videos = records.len(), "snapshot cleaned");

        Ok(Harvest {
            snapshot_id,
            records,
            fetched,
        })
    }

    /// Downloads and cleans a snapshot that was submitted earlier, without polling it.
    pub async fn collect(&self, api_key: &str, snapshot_id: &str) -> Vec<CleanRecord> {
        let records = clean(
            self.client
                .fetch(api_key, snapshot_id, &self.output_format)
                .await,
        );
        tracing::info!(snapshot_id, videos = records.len(), "snapshot collected");
        records
    }

    async fn submit(&self, api_key: &str, query: &ChannelQuery) -> Result<String> {
        let response = self.client.trigger(api_key, query).await;
        match response.as_ref().and_then(|r| r.snapshot_id()) {
            Some(id) => Ok(id.to_string()),
            None => Err(Error::submission(
                "Failed to start scraping. Please check your API Key and Channel URL.",
            )),
        }
    }

    async fn wait_until_ready(
        &self,
        api_key: &str,
        snapshot_id: &str,
        events: Option<&EventSender>,
    ) -> Result<()> {
        let mut attempts: u32 = 0;

        loop {
            if self.attempts_exhausted(attempts) {
                return Err(poll_timeout(snapshot_id, attempts));
            }
            attempts += 1;

            let Some(progress) = self.client.progress(api_key, snapshot_id).await else {
                return Err(Error::ProgressUnavailable {
                    snapshot_id: snapshot_id.to_string(),
                });
            };

            match progress.status {
                JobStatus::Ready => return Ok(()),
                JobStatus::Failed => {
                    tracing::warn!(snapshot_id, "provider reported failure");
                    return Err(Error::JobFailed {
                        snapshot_id: snapshot_id.to_string(),
                    });
                }
                status => {
                    tracing::debug!(
                        snapshot_id,
                        attempts,
                        status = status.as_str(),
                        "job not ready"
                    );
                    emit(
                        events,
                        PipelineEvent::Status(format!("Current status: {}...", status.as_str())),
                    );
                    // The limit is checked before sleeping, not after.
                    if self.attempts_exhausted(attempts) {
                        return Err(poll_timeout(snapshot_id, attempts));
                    }
                    tokio::time::sleep(self.policy.interval).await;
                }
            }
        }
    }

    fn attempts_exhausted(&self, attempts: u32) -> bool {
        self.policy.max_attempts.is_some_and(|max| attempts >= max)
    }
}

fn poll_timeout(snapshot_id: &str, attempts: u32) -> Error {
    tracing::warn!(snapshot_id, attempts, "poll attempts exhausted");
    Error::PollTimeout {
        snapshot_id: snapshot_id.to_string(),
        attempts,
    }
}
