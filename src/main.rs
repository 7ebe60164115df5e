mod cli;
mod config;
mod core;
mod error;
mod logging;
mod tui;

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::core::{
    AnalysisSession, CurlRunner, EventSender, FileType, OpenAiModel, PipelineEvent,
    StorageService, TrendService, VideoSummary,
};
use crate::error::{Error, Result};
use crate::logging::LogTarget;
use crate::tui::components::format_size;
use chrono::Local;
use clap::Parser;
use std::path::Path;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let target = match cli.command {
        Some(Commands::Tui) | None => LogTarget::File,
        _ => LogTarget::Stderr,
    };
    logging::init(target);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Analyze {
            channels,
            start_date,
            end_date,
            posts,
            order_by,
            country,
            no_report,
        }) => {
            let mut config = AppConfig::load(&cli.config)?;
            if let Some(posts) = posts {
                config.scraper.post_limit = posts;
            }
            if let Some(order_by) = order_by {
                config.scraper.order_by = order_by;
            }
            if let Some(country) = country {
                config.scraper.country = country;
            }

            let today = Local::now().date_naive();
            let session = AnalysisSession::new(
                channels,
                start_date.unwrap_or(today),
                end_date.unwrap_or(today),
            )
            .with_analysis(!no_report);

            run_cli_analyze(config, session).await
        }
        Some(Commands::Report { shortcodes }) => {
            let config = AppConfig::load(&cli.config)?;
            run_cli_report(config, shortcodes).await
        }
        Some(Commands::Fetch { snapshot_id }) => {
            let config = AppConfig::load(&cli.config)?;
            run_cli_fetch(config, &snapshot_id).await
        }
        Some(Commands::List) => run_cli_list(&cli.config),
        Some(Commands::Tui) | None => tui::run(tui::App::new(AppConfig::load(&cli.config))),
    }
}

fn build_service(config: AppConfig) -> Result<TrendService<CurlRunner, OpenAiModel>> {
    let runner = CurlRunner::new(config.scraper.curl_path.clone());
    let model = OpenAiModel::new(&config.model);
    TrendService::new(config, runner, model)
}

/// Prints pipeline events as they arrive until every sender is dropped.
fn spawn_printer() -> (EventSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::Status(line) | PipelineEvent::Log(line) => println!("{line}"),
                PipelineEvent::Videos(videos) => print_videos(&videos),
                PipelineEvent::Progress(_) | PipelineEvent::Finished => {}
            }
        }
    });
    (tx, printer)
}

fn print_videos(videos: &[VideoSummary]) {
    println!("Found {} videos:", videos.len());
    for video in videos {
        match &video.title {
            Some(title) => println!("  {:<14} {}  {}", video.shortcode, title, video.url),
            None => println!("  {:<14} {}", video.shortcode, video.url),
        }
    }
}

async fn run_cli_analyze(config: AppConfig, session: AnalysisSession) -> Result<()> {
    println!(
        "Scraping {} channel(s) from {} to {}",
        session.channel_urls.len(),
        session.start_date,
        session.end_date
    );

    let service = build_service(config)?;
    let api_key = crate::config::bright_data_api_key().ok();

    let (tx, printer) = spawn_printer();
    let session = service
        .run_session(api_key.as_deref(), session, Some(&tx))
        .await;
    drop(tx);
    let _ = printer.await;

    if let Some(error) = session.error {
        return Err(Error::custom(error));
    }

    for path in &session.transcript_files {
        println!("Transcript saved to: {}", path.display());
    }
    if let Some(path) = &session.report_path {
        println!("Report saved to: {}", path.display());
    }

    Ok(())
}

async fn run_cli_report(config: AppConfig, shortcodes: Vec<String>) -> Result<()> {
    let service = build_service(config)?;
    let files = service.storage().stored_transcripts(&shortcodes)?;
    if files.is_empty() {
        return Err(Error::custom("No stored transcripts to analyze"));
    }
    println!("Analyzing {} stored transcript(s)...", files.len());

    let (tx, printer) = spawn_printer();
    let result = service.analyze_stored(&shortcodes, Some(&tx)).await;
    drop(tx);
    let _ = printer.await;

    let (report, path) = result?;
    println!();
    println!("{report}");
    println!();
    println!("Report saved to: {}", path.display());
    Ok(())
}

async fn run_cli_fetch(config: AppConfig, snapshot_id: &str) -> Result<()> {
    let service = build_service(config)?;
    let api_key = crate::config::bright_data_api_key().ok();

    println!("Fetching snapshot {snapshot_id}...");
    let (records, files) = service
        .collect_snapshot(api_key.as_deref(), snapshot_id)
        .await?;

    let videos: Vec<VideoSummary> = records.iter().map(VideoSummary::from).collect();
    print_videos(&videos);
    for path in &files {
        println!("Transcript saved to: {}", path.display());
    }
    Ok(())
}

fn run_cli_list(config_path: &Path) -> Result<()> {
    let storage_config = match AppConfig::load(config_path) {
        Ok(config) => config.storage,
        Err(e) => {
            tracing::debug!("using default storage locations: {e}");
            Default::default()
        }
    };
    let files = StorageService::new(&storage_config).list_files()?;

    if files.is_empty() {
        println!("No files found.");
        return Ok(());
    }

    println!("Found {} files:", files.len());
    println!();

    for file in files {
        let file_type = match file.file_type {
            FileType::Transcript => "Transcript",
            FileType::Report => "Report",
        };
        let label = file.shortcode().unwrap_or(&file.name);
        println!("{:<12} {:<40} {}", file_type, label, format_size(file.size));
    }

    Ok(())
}

