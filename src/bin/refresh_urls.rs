#![forbid(unsafe_code)]

//! Refreshes the video links of an annotation dataset.
//!
//! Every distinct `(title, url, duration)` triple is probed once with yt-dlp.
//! Dead links are replaced through a YouTube Data API search when an API key
//! is available (`--yt-key`, `$YOUTUBE_API_KEY` or the `.env` file) and
//! otherwise just marked unavailable. The updated dataset and a JSON change
//! report are written at the end of the run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use video_refresh_tools::catalog::Catalog;
use video_refresh_tools::config::{DEFAULT_ENV_PATH, RuntimeOverrides, resolve_runtime_settings};
use video_refresh_tools::dataset::{load_records, records_to_value, write_json};
use video_refresh_tools::liveness::YtDlpProbe;
use video_refresh_tools::refresh::{LivenessMode, RefreshSummary, Refresher};
use video_refresh_tools::youtube::YouTubeCatalog;

#[derive(Debug, Parser)]
#[command(
    name = "refresh_urls",
    about = "Update video links in a dataset and generate a change report."
)]
struct RefreshArgs {
    /// Input dataset (JSON array of records).
    #[arg(long)]
    annotations: PathBuf,

    /// Where to write the updated dataset.
    #[arg(long)]
    output: PathBuf,

    /// Where to write the change report.
    #[arg(long = "report-output", alias = "report_output")]
    report_output: PathBuf,

    /// YouTube Data API v3 key. Falls back to $YOUTUBE_API_KEY.
    #[arg(long = "yt-key", alias = "yt_key")]
    api_key: Option<String>,

    /// Never search for replacements, even when a key is available.
    #[arg(long)]
    no_search: bool,

    /// yt-dlp executable used for liveness checks.
    #[arg(long = "yt-dlp")]
    yt_dlp: Option<PathBuf>,

    /// Leave groups whose liveness could not be checked untouched instead of
    /// marking them unavailable.
    #[arg(long)]
    strict_liveness: bool,

    #[arg(long)]
    similarity_threshold: Option<f64>,

    /// Allowed duration difference in seconds.
    #[arg(long)]
    duration_tolerance: Option<u64>,

    #[arg(long)]
    max_results: Option<usize>,

    /// Pause between catalog searches, in milliseconds.
    #[arg(long)]
    pause_ms: Option<u64>,

    #[arg(long, default_value = DEFAULT_ENV_PATH)]
    env_file: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = RefreshArgs::parse();
    let summary = run(&args)?;

    println!(
        "{} group(s): {} live, {} replaced, {} unavailable, {} unchecked",
        summary.groups, summary.live, summary.replaced, summary.unavailable, summary.unchecked
    );
    println!("Dataset updated: {}", args.output.display());
    println!("Change report : {}", args.report_output.display());
    Ok(())
}

fn run(args: &RefreshArgs) -> Result<RefreshSummary> {
    let settings = resolve_runtime_settings(RuntimeOverrides {
        api_key: args.api_key.clone(),
        yt_dlp: args.yt_dlp.clone(),
        similarity_threshold: args.similarity_threshold,
        duration_tolerance: args.duration_tolerance,
        max_results: args.max_results,
        pause_ms: args.pause_ms,
        env_path: Some(args.env_file.clone()),
    })
    .context("resolving settings")?;

    let catalog = match (&settings.api_key, args.no_search) {
        (Some(key), false) => Some(YouTubeCatalog::new(key.clone())),
        (Some(_), true) => {
            info!("replacement search disabled by --no-search");
            None
        }
        (None, _) => {
            eprintln!("[WARN] No API key provided. Replacement search is disabled.");
            None
        }
    };

    let mut records = load_records(&args.annotations)?;
    let probe = YtDlpProbe::new(settings.yt_dlp.clone());
    let mode = if args.strict_liveness {
        LivenessMode::Strict
    } else {
        LivenessMode::Compatible
    };
    let refresher = Refresher::new(
        &probe,
        catalog.as_ref().map(|catalog| catalog as &dyn Catalog),
        &settings.matcher,
    )
    .with_mode(mode);

    let (report, summary) = refresher.run(&mut records);

    write_json(&args.output, &records_to_value(records))?;
    write_json(&args.report_output, &report)?;
    Ok(summary)
}
