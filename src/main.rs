//! HSV Analyzer CLI
//!
//! Splits images into hue, saturation and brightness planes, records each
//! plane's mean and median to a CSV table and a JSON report, and renders a
//! normalized histogram per plane.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod discovery;
mod error;
mod imaging;
mod labels;
mod output;
mod pipeline;
mod stats;

use config::{AnalyzerConfig, Language, OutputLayout, Verbosity, DEFAULT_EQUAL_WIDTH_BINS};
use imaging::{
    FigureFont, HsvExtractor, PngHistogramSink, DEFAULT_FIGURE_HEIGHT, DEFAULT_FIGURE_WIDTH,
};
use pipeline::{BatchOrchestrator, RunMode, RunSummary};

#[derive(Parser, Debug)]
#[command(name = "hsv-analyzer")]
#[command(
    about = "Create HSV channel statistics and normalized histograms for images",
    long_about = None
)]
struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    verbosity: u8,

    /// Number of equal-width histogram bins
    #[arg(short, long, default_value_t = DEFAULT_EQUAL_WIDTH_BINS)]
    equal_width: usize,

    /// Name prefix for single-file results (ignored in batch mode)
    #[arg(short = 'o', long)]
    output_prefix: Option<String>,

    /// Do not write the per-channel HSV images
    #[arg(short, long)]
    deny_output: bool,

    /// Do not render histogram figures
    #[arg(long)]
    no_figures: bool,

    /// Analyze a single image instead of scanning the input root
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Directory scanned for images in batch mode
    #[arg(short = 'I', long, default_value = "input")]
    input_root: PathBuf,

    /// Directory receiving streams, figures and channel images
    #[arg(short = 'O', long, default_value = "output")]
    output_root: PathBuf,

    /// Language of table headers, report keys and figure titles
    #[arg(long, value_enum, default_value_t = Language::Japanese)]
    lang: Language,

    /// TrueType/OpenType font for figure text (default: search installed fonts)
    #[arg(long)]
    font: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> AnalyzerConfig {
        AnalyzerConfig {
            input_root: self.input_root,
            output: OutputLayout::new(self.output_root),
            single_file: self.file,
            output_prefix: self.output_prefix,
            bins: self.equal_width,
            verbosity: Verbosity::from_count(self.verbosity),
            language: self.lang,
            deny_output: self.deny_output,
            render_figures: !self.no_figures,
            font: self.font,
            ..Default::default()
        }
    }
}

/// How a run ended without an error
enum Outcome {
    Completed(RunSummary),
    Interrupted,
}

fn main() -> ExitCode {
    let config = Cli::parse().into_config();

    // Logs go to stderr so stdout carries only the progress line and results
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_directive())),
        )
        .init();

    match try_main(config) {
        Ok(Outcome::Completed(summary)) => {
            tracing::info!(
                mode = ?summary.mode,
                processed = summary.processed,
                started_at = %summary.started_at.to_rfc3339(),
                elapsed_secs = summary.elapsed_secs(),
                "run finished"
            );
            ExitCode::SUCCESS
        }
        Ok(Outcome::Interrupted) => {
            println!("\nKeyboard Interrupt: The script aborted.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("\nUnexpected error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn try_main(config: AnalyzerConfig) -> Result<Outcome> {
    config.validate()?;

    if config.verbosity >= Verbosity::VeryNoisy {
        println!("{}", serde_json::to_string_pretty(&config)?);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let config = Arc::new(config);
    let outcome = runtime.block_on(async {
        tokio::select! {
            summary = analyze(config) => summary.map(Outcome::Completed),
            _ = tokio::signal::ctrl_c() => Ok(Outcome::Interrupted),
        }
    });

    // An interrupted decode or render may still occupy a blocking thread
    runtime.shutdown_timeout(Duration::from_secs(1));
    outcome
}

async fn analyze(config: Arc<AnalyzerConfig>) -> Result<RunSummary> {
    let (items, mode) = match &config.single_file {
        Some(file) => {
            println!("Enter single file process mode:");
            (vec![file.clone()], RunMode::Single)
        }
        None => {
            println!("Enter batch mode:");
            let items = discovery::discover_images(&config.input_root).with_context(|| {
                format!("failed to scan {}", config.input_root.display())
            })?;
            println!("🔍 Found {} images in {}", items.len(), config.input_root.display());
            (items, RunMode::Batch)
        }
    };

    let font = if config.render_figures {
        // Scanning the system font database touches many files
        let path = config.font.clone();
        let font = tokio::task::spawn_blocking(move || FigureFont::load(path.as_deref()))
            .await?
            .context("failed to load figure font")?;
        tracing::info!("figure text drawn with {}", font.describe());
        font
    } else {
        FigureFont::Bitmap
    };
    let sink = PngHistogramSink::new(DEFAULT_FIGURE_WIDTH, DEFAULT_FIGURE_HEIGHT, Arc::new(font));

    let orchestrator = BatchOrchestrator::new(
        Arc::clone(&config),
        Arc::new(HsvExtractor),
        Arc::new(sink),
    )
    .with_context(|| format!("failed to open outputs in {}", config.output.root().display()))?;

    let summary = orchestrator.run(items, mode).await?;

    if mode == RunMode::Batch {
        println!("The process has been completed🎉");
    }
    Ok(summary)
}
