use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use hlsmon::{
    CheckLog, ConcurrentChecker, FileConfig, HttpFetcher, Monitor, MonitorConfig, Overrides,
    PlaylistTree,
};

use super::output;
use crate::OutputFormat;

#[derive(Args)]
pub struct PlaylistArgs {
    /// Master playlist URLs (comma-separated)
    #[arg(value_name = "PLAYLIST_URLS")]
    pub playlist_urls: String,

    /// Maximum simultaneous fetches per pass [default: 10]
    #[arg(short, long, allow_negative_numbers = true)]
    pub concurrency: Option<i64>,

    /// Append a [GOOD]/[BAD] line per checked URL to this file
    #[arg(short, long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Per-request timeout in seconds [default: 30]
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Connect timeout in seconds [default: 10]
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<u64>,

    /// User-Agent header sent with every request
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Config file (default: ~/.config/hlsmon/config.toml if present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

pub async fn cmd_playlist(args: PlaylistArgs) -> Result<ExitCode> {
    let file = FileConfig::load(args.config.as_deref())?;
    let config = MonitorConfig::resolve(
        Overrides {
            playlist_urls: args.playlist_urls,
            concurrency: args.concurrency,
            log_file: args.log,
            timeout_secs: args.timeout,
            connect_timeout_secs: args.connect_timeout,
            user_agent: args.user_agent,
        },
        file,
    )?;

    if args.format == OutputFormat::Text {
        print!("{}", output::banner(&config));
    }

    let fetcher = HttpFetcher::new(&config.fetch).context("failed to build HTTP client")?;
    let checker = ConcurrentChecker::new(Arc::new(fetcher));
    let monitor = Monitor::new(checker, PlaylistTree::new(), config.concurrency);

    let run = monitor.run(&config.playlist_urls).await?;

    if let Some(path) = &config.log_file {
        CheckLog::new(path)
            .record(&run.tree)
            .with_context(|| format!("failed to append to log file {}", path.display()))?;
    }

    match args.format {
        OutputFormat::Text => print!("{}", output::render_text(&run)),
        OutputFormat::Json => println!("{}", output::render_json(&run)?),
    }

    Ok(ExitCode::from(run.report.exit_code()))
}
