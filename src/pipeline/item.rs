//! Per-item naming and results.

use std::path::{Path, PathBuf};

use crate::config::AnalyzerConfig;
use crate::error::{AnalyzerError, Result};
use crate::imaging::Channel;
use crate::labels::Labels;
use crate::stats::ChannelStatistics;

/// Delimiter between the structured fields of a batch-mode file name
pub const FIELD_DELIMITER: char = '_';

/// Whether the run analyzes one named file or a discovered collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Single,
    Batch,
}

/// Structured fields carried by a batch-mode file name:
/// `<count>_<maker>_<date>_<title words...>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFields {
    pub count: i64,
    pub maker: String,
    pub date: String,
    /// Remaining fields joined with spaces
    pub title: String,
}

impl ItemFields {
    /// Split a base identifier into its four fields.
    pub fn decompose(base: &str) -> Result<Self> {
        let parts: Vec<&str> = base.split(FIELD_DELIMITER).collect();
        if parts.len() < 4 {
            return Err(AnalyzerError::Decomposition {
                name: base.to_string(),
                reason: format!(
                    "expected count{d}maker{d}date{d}title, found {} field(s)",
                    parts.len(),
                    d = FIELD_DELIMITER
                ),
            });
        }

        let count = parts[0]
            .trim()
            .parse::<i64>()
            .map_err(|_| AnalyzerError::Decomposition {
                name: base.to_string(),
                reason: format!("count '{}' is not an integer", parts[0]),
            })?;

        Ok(Self {
            count,
            maker: parts[1].to_string(),
            date: parts[2].to_string(),
            title: parts[3..].join(" "),
        })
    }
}

/// One input image with its resolved output naming
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub path: PathBuf,
    /// File name up to the first '.'
    pub base_name: String,
    /// Present in batch mode only
    pub fields: Option<ItemFields>,
    /// Prepended to figure and channel image file names
    pub output_prefix: String,
    title_prefix: String,
    title_suffix: String,
}

impl Item {
    /// Resolve naming for `path`. Batch mode fails if the file name cannot
    /// be decomposed.
    pub fn resolve(path: &Path, mode: RunMode, config: &AnalyzerConfig) -> Result<Self> {
        let base_name = base_name(path);

        match mode {
            RunMode::Batch => {
                let fields = ItemFields::decompose(&base_name)?;
                Ok(Self {
                    path: path.to_path_buf(),
                    output_prefix: format!("{}_", base_name),
                    title_prefix: String::new(),
                    title_suffix: format!(" - {}", base_name),
                    fields: Some(fields),
                    base_name,
                })
            }
            RunMode::Single => {
                let (output_prefix, title_prefix) = match &config.output_prefix {
                    Some(prefix) if !prefix.is_empty() => {
                        (format!("{}_", prefix), format!("【 {} 】 ", prefix))
                    }
                    _ => (String::new(), String::new()),
                };
                Ok(Self {
                    path: path.to_path_buf(),
                    base_name,
                    fields: None,
                    output_prefix,
                    title_prefix,
                    title_suffix: String::new(),
                })
            }
        }
    }

    pub fn figure_title(&self, labels: &Labels, channel: Channel) -> String {
        format!(
            "{}{}{}",
            self.title_prefix,
            labels.figure_title(channel),
            self.title_suffix
        )
    }

    /// File name used for this item's figure or channel image of `channel`
    pub fn artifact_name(&self, channel: Channel) -> String {
        format!("{}{}", self.output_prefix, channel.file_suffix())
    }
}

fn base_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy();
    file_name.split('.').next().unwrap_or_default().to_string()
}

/// Statistics of one item, written once to each stream and then dropped
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResult {
    pub fields: Option<ItemFields>,
    /// Indexed by `Channel::index`
    pub channels: [ChannelStatistics; 3],
}

impl ItemResult {
    pub fn channel(&self, channel: Channel) -> &ChannelStatistics {
        &self.channels[channel.index()]
    }
}
