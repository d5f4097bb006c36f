//! CSV stream of per-item statistics.

use csv::{QuoteStyle, Writer, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{AnalyzerError, Result};
use crate::imaging::Channel;
use crate::pipeline::ItemResult;

/// Append-only tabular stream.
///
/// The header is written only when the file is created; later runs append
/// rows to the existing table.
pub struct TabularStream {
    writer: Writer<File>,
    path: PathBuf,
}

impl TabularStream {
    /// Open `path` for appending, writing `header` if the file is new.
    pub fn open(path: &Path, header: &[&str]) -> Result<Self> {
        let existed = path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AnalyzerError::io(path, e))?;

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::NonNumeric)
            .from_writer(file);

        if !existed {
            writer.write_record(header)?;
            writer.flush().map_err(|e| AnalyzerError::io(path, e))?;
            tracing::debug!("created tabular stream {}", path.display());
        }

        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    /// Append one row: count, maker, date, title, then mean/median per channel.
    pub fn append(&mut self, result: &ItemResult) -> Result<()> {
        self.writer.write_record(row(result))?;
        Ok(())
    }

    /// Flush buffered rows and push them to durable storage.
    pub fn flush_durable(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| AnalyzerError::io(&self.path, e))?;
        self.writer
            .get_ref()
            .sync_data()
            .map_err(|e| AnalyzerError::io(&self.path, e))
    }

    pub fn close(mut self) -> Result<()> {
        self.flush_durable()
    }
}

/// Cells of one tabular row. Field cells are empty in single-file mode.
fn row(result: &ItemResult) -> Vec<String> {
    let mut cells = match &result.fields {
        Some(fields) => vec![
            fields.count.to_string(),
            fields.maker.clone(),
            fields.date.clone(),
            fields.title.clone(),
        ],
        None => vec![String::new(); 4],
    };

    for channel in Channel::ALL {
        let stats = result.channel(channel);
        cells.push(format!("{:.1}", stats.mean));
        cells.push(format!("{:.1}", stats.median));
    }
    cells
}
