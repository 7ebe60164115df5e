use crate::config::DEFAULT_CONFIG_PATH;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vidtrend")]
#[command(about = "YouTube channel trend analysis from scraped transcripts")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the YAML config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scrape channels, save transcripts and analyze trends
    Analyze {
        /// Channel URLs to scrape
        #[arg(required = true)]
        channels: Vec<String>,

        /// First publication date to include (YYYY-MM-DD, default today)
        #[arg(long, value_parser = parse_cli_date)]
        start_date: Option<NaiveDate>,

        /// Last publication date to include (YYYY-MM-DD, default today)
        #[arg(long, value_parser = parse_cli_date)]
        end_date: Option<NaiveDate>,

        /// Videos to collect per channel
        #[arg(long)]
        posts: Option<u32>,

        /// Provider ordering, e.g. "Latest"
        #[arg(long)]
        order_by: Option<String>,

        /// Country filter passed to the provider
        #[arg(long)]
        country: Option<String>,

        /// Stop after saving transcripts
        #[arg(long)]
        no_report: bool,
    },

    /// Analyze transcripts that were already downloaded
    Report {
        /// Shortcodes to analyze (default: every stored transcript)
        shortcodes: Vec<String>,
    },

    /// Save the transcripts of a snapshot an earlier run submitted
    Fetch {
        /// Snapshot id printed by the earlier run
        snapshot_id: String,
    },

    /// List all saved transcripts and reports
    List,

    /// Open TUI interface
    Tui,
}

fn parse_cli_date(raw: &str) -> Result<NaiveDate, String> {
    crate::core::parse_date(raw).ok_or_else(|| format!("'{raw}' is not a YYYY-MM-DD date"))
}
