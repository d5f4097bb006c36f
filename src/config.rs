//! Run configuration.
//!
//! Built once from the command line, validated, then shared read-only with
//! the orchestrator and its collaborators.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AnalyzerError, Result};

/// Default number of equal-width histogram bins
pub const DEFAULT_EQUAL_WIDTH_BINS: usize = 255;

/// Upper bound on histogram bins; larger counts only waste memory
pub const MAX_EQUAL_WIDTH_BINS: usize = 65_536;

/// Number of processed items between compaction passes
pub const COMPACTION_PERIOD: usize = 10;

/// How much diagnostic output a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Verbosity {
    Normal,
    Noisy,
    VeryNoisy,
}

impl Verbosity {
    /// Map a repeated `-v` count onto a level, clamping at the noisiest.
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Verbosity::Normal,
            1 => Verbosity::Noisy,
            _ => Verbosity::VeryNoisy,
        }
    }

    /// Default tracing filter directive for this level
    pub fn log_directive(self) -> &'static str {
        match self {
            Verbosity::Normal => "warn",
            Verbosity::Noisy => "info",
            Verbosity::VeryNoisy => "debug",
        }
    }
}

/// Language used for headers, record keys and figure titles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
pub enum Language {
    English,
    Japanese,
}

/// Timing of the orchestrator/reporter hand-off.
///
/// The delays are best-effort: they give the reporter a chance to observe a
/// signal, they do not guarantee it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressTiming {
    /// Animation tick; the reporter polls the signal channel once per tick
    pub tick: Duration,
    /// Sleep after sending `Paused` before diagnostics are printed
    pub handoff: Duration,
    /// How long to wait for the reporter to exit after `Finished`
    pub grace: Duration,
}

impl Default for ProgressTiming {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            handoff: Duration::from_millis(500),
            grace: Duration::from_millis(500),
        }
    }
}

/// Locations of every file the analyzer writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for per-channel grayscale images
    pub fn image_dir(&self) -> PathBuf {
        self.root.join("Image")
    }

    /// Directory for histogram figures
    pub fn figure_dir(&self) -> PathBuf {
        self.root.join("Figure")
    }

    pub fn csv_path(&self) -> PathBuf {
        self.root.join("csv").join("Image_statistics.csv")
    }

    pub fn json_path(&self) -> PathBuf {
        self.root.join("json").join("statistics_report.json")
    }

    /// Create every output directory that does not exist yet.
    pub fn prepare(&self) -> Result<()> {
        let dirs = [
            self.image_dir(),
            self.figure_dir(),
            self.root.join("csv"),
            self.root.join("json"),
        ];
        for dir in dirs {
            std::fs::create_dir_all(&dir).map_err(|e| AnalyzerError::io(&dir, e))?;
        }
        Ok(())
    }
}

/// Immutable configuration for one analyzer run
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzerConfig {
    /// Root scanned for images in batch mode
    pub input_root: PathBuf,
    /// Where streams, figures and channel images go
    pub output: OutputLayout,
    /// Single file to analyze; batch mode when `None`
    pub single_file: Option<PathBuf>,
    /// Name prefix for single-file outputs (ignored in batch mode)
    pub output_prefix: Option<String>,
    /// Equal-width histogram bins
    pub bins: usize,
    pub verbosity: Verbosity,
    pub language: Language,
    /// Skip writing the per-channel grayscale images
    pub deny_output: bool,
    /// Render histogram figures
    pub render_figures: bool,
    /// Font file for figure text; the system font database is searched when `None`
    pub font: Option<PathBuf>,
    pub timing: ProgressTiming,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("input"),
            output: OutputLayout::new("output"),
            single_file: None,
            output_prefix: None,
            bins: DEFAULT_EQUAL_WIDTH_BINS,
            verbosity: Verbosity::Normal,
            language: Language::Japanese,
            deny_output: false,
            render_figures: true,
            font: None,
            timing: ProgressTiming::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.bins == 0 {
            return Err(AnalyzerError::Config(
                "equal-width bins must be at least 1".to_string(),
            ));
        }
        if self.bins > MAX_EQUAL_WIDTH_BINS {
            return Err(AnalyzerError::Config(format!(
                "equal-width bins must be at most {}, got {}",
                MAX_EQUAL_WIDTH_BINS, self.bins
            )));
        }
        if let Some(prefix) = &self.output_prefix {
            if prefix.contains(['/', '\\']) {
                return Err(AnalyzerError::Config(format!(
                    "output prefix '{}' must not contain path separators",
                    prefix
                )));
            }
        }
        if self.timing.tick.is_zero() {
            return Err(AnalyzerError::Config(
                "progress tick must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
