use crate::config::AppConfig;
use crate::core::analysis::{AnalysisPipeline, LanguageModel, join_paths};
use crate::core::command::CommandRunner;
use crate::core::poll::{
    EventSender, PipelineEvent, PollOrchestrator, PollPolicy, VideoSummary, emit,
};
use crate::core::sanitize::CleanRecord;
use crate::core::scrape::{ChannelQuery, ScrapeClient};
use crate::core::storage::StorageService;
use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::path::PathBuf;

/// Everything one analysis run needs to remember between screens.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSession {
    pub channel_urls: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub run_analysis: bool,

    pub snapshot_id: Option<String>,
    pub records: Vec<CleanRecord>,
    pub transcript_files: Vec<PathBuf>,
    pub report: Option<String>,
    pub report_path: Option<PathBuf>,
    pub status: String,
    pub error: Option<String>,
}

impl AnalysisSession {
    pub fn new(channel_urls: Vec<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            channel_urls,
            start_date,
            end_date,
            run_analysis: true,
            snapshot_id: None,
            records: Vec::new(),
            transcript_files: Vec::new(),
            report: None,
            report_path: None,
            status: String::new(),
            error: None,
        }
    }

    pub fn with_analysis(mut self, run_analysis: bool) -> Self {
        self.run_analysis = run_analysis;
        self
    }

    /// The transcript paths in the form handed to the analysis stages.
    pub fn file_paths(&self) -> String {
        join_paths(&self.transcript_files)
    }

    pub fn videos(&self) -> Vec<VideoSummary> {
        self.records.iter().map(VideoSummary::from).collect()
    }

    fn reset_results(&mut self) {
        self.snapshot_id = None;
        self.records.clear();
        self.transcript_files.clear();
        self.report = None;
        self.report_path = None;
        self.error = None;
    }
}

/// Wires the scrape, storage and analysis pieces into one run.
pub struct TrendService<R, M> {
    orchestrator: PollOrchestrator<R>,
    storage: StorageService,
    pipeline: AnalysisPipeline,
    model: M,
    config: AppConfig,
}

impl<R: CommandRunner, M: LanguageModel> TrendService<R, M> {
    pub fn new(config: AppConfig, runner: R, model: M) -> Result<Self> {
        let client = ScrapeClient::new(runner, &config.scraper);
        let orchestrator = PollOrchestrator::new(
            client,
            PollPolicy::from_config(&config.scraper),
            config.scraper.output_format.clone(),
        );
        let pipeline = AnalysisPipeline::new(&config.stages)?;

        Ok(Self {
            orchestrator,
            storage: StorageService::new(&config.storage),
            pipeline,
            model,
            config,
        })
    }

    pub fn storage(&self) -> &StorageService {
        &self.storage
    }

    /// Takes a session, runs it to completion, and hands it back with results or an
    /// error message.
    pub async fn run_session(
        &self,
        api_key: Option<&str>,
        mut session: AnalysisSession,
        events: Option<&EventSender>,
    ) -> AnalysisSession {
        session.reset_results();

        if let Err(e) = self.scrape_into(api_key, &mut session, events).await {
            tracing::warn!("scrape failed: {e}");
            fail(&mut session, e.to_string(), events);
            return session;
        }

        if session.transcript_files.is_empty() || !session.run_analysis {
            emit(events, PipelineEvent::Progress(1.0));
            emit(events, PipelineEvent::Finished);
            return session;
        }

        emit(events, PipelineEvent::Status("Data ready! Analyzing trends...".to_string()));
        emit(events, PipelineEvent::Progress(0.7));
        session.status = "Analyzing trends...".to_string();

        match self.analyze_into(&mut session, events).await {
            Ok(()) => {
                session.status = "Analysis complete".to_string();
                emit(events, PipelineEvent::Status(session.status.clone()));
                emit(events, PipelineEvent::Progress(1.0));
                emit(events, PipelineEvent::Finished);
            }
            Err(e) => {
                tracing::warn!("analysis failed: {e}");
                fail(&mut session, format!("AI Agent Error: {e}"), events);
            }
        }

        session
    }

    async fn scrape_into(
        &self,
        api_key: Option<&str>,
        session: &mut AnalysisSession,
        events: Option<&EventSender>,
    ) -> Result<()> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::configuration("BRIGHT_DATA_API_KEY is missing!"))?;

        let query = ChannelQuery::from_config(
            session.channel_urls.clone(),
            session.start_date,
            session.end_date,
            &self.config.scraper,
        );

        emit(events, PipelineEvent::Progress(0.1));
        let harvest = self.orchestrator.run(api_key, &query, events).await?;
        session.snapshot_id = Some(harvest.snapshot_id.clone());
        emit(events, PipelineEvent::Progress(0.4));

        if let Some(reason) = harvest.empty_reason() {
            session.status = reason.clone();
            emit(events, PipelineEvent::Status(reason));
            return Ok(());
        }

        session.records = harvest.records;
        emit(events, PipelineEvent::Videos(session.videos()));
        emit(events, PipelineEvent::Status("Processing transcripts...".to_string()));

        session.transcript_files = self.storage.save_transcripts(&session.records).await?;
        emit(
            events,
            PipelineEvent::Log(format!("Saved {} transcripts", session.transcript_files.len())),
        );
        emit(events, PipelineEvent::Progress(0.6));
        session.status = "Transcripts saved".to_string();
        Ok(())
    }

    async fn analyze_into(
        &self,
        session: &mut AnalysisSession,
        events: Option<&EventSender>,
    ) -> Result<()> {
        let report = self
            .pipeline
            .report(&self.model, &session.transcript_files, events)
            .await?;
        let path = self.storage.save_report(&report).await?;
        emit(events, PipelineEvent::Log(format!("Report saved to {}", path.display())));

        session.report = Some(report);
        session.report_path = Some(path);
        Ok(())
    }

    /// Saves the transcripts of a snapshot submitted by an earlier run, e.g. one that
    /// timed out while polling.
    pub async fn collect_snapshot(
        &self,
        api_key: Option<&str>,
        snapshot_id: &str,
    ) -> Result<(Vec<CleanRecord>, Vec<PathBuf>)> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::configuration("BRIGHT_DATA_API_KEY is missing!"))?;

        let records = self.orchestrator.collect(api_key, snapshot_id).await;
        if records.is_empty() {
            return Err(Error::custom(format!(
                "Snapshot {snapshot_id} has no valid videos"
            )));
        }
        let files = self.storage.save_transcripts(&records).await?;
        Ok((records, files))
    }

    /// Analyzes transcripts that are already on disk; no scraping happens.
    pub async fn analyze_stored(
        &self,
        shortcodes: &[String],
        events: Option<&EventSender>,
    ) -> Result<(String, PathBuf)> {
        let files = self.storage.stored_transcripts(shortcodes)?;
        let report = self.pipeline.report(&self.model, &files, events).await?;
        let path = self.storage.save_report(&report).await?;
        Ok((report, path))
    }
}

fn fail(session: &mut AnalysisSession, message: String, events: Option<&EventSender>) {
    session.status = message.clone();
    session.error = Some(message.clone());
    emit(events, PipelineEvent::Status(message));
    emit(events, PipelineEvent::Finished);
}
