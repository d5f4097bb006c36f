//! JSON array stream of per-item records.
//!
//! The file is framed as one array: `[` on creation, `,` before every
//! record but the first, `]` on `finish`. A run that aborts before
//! `finish` leaves the array unterminated, and readers must treat such a
//! file as corrupt. No repair is attempted on the next run.

use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{AnalyzerError, Result};
use crate::imaging::Channel;
use crate::labels::Labels;
use crate::pipeline::ItemResult;

pub struct RecordStream {
    writer: BufWriter<File>,
    path: PathBuf,
    /// True until the first record is written; never reset
    first: bool,
    records: usize,
}

impl RecordStream {
    /// Create (truncating) the record file and write the opening delimiter.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| AnalyzerError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(b"[")
            .map_err(|e| AnalyzerError::io(path, e))?;

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            first: true,
            records: 0,
        })
    }

    pub fn append(&mut self, record: &Value) -> Result<()> {
        if self.first {
            self.first = false;
        } else {
            self.writer
                .write_all(b",")
                .map_err(|e| AnalyzerError::io(&self.path, e))?;
        }
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| AnalyzerError::io(&self.path, e))?;
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| AnalyzerError::io(&self.path, e))
    }

    /// Write the closing delimiter. Only the normal completion path calls this.
    pub fn finish(mut self) -> Result<()> {
        self.writer
            .write_all(b"]")
            .map_err(|e| AnalyzerError::io(&self.path, e))?;
        self.flush()?;
        self.writer
            .get_ref()
            .sync_data()
            .map_err(|e| AnalyzerError::io(&self.path, e))
    }
}

/// Build the record object for one item.
///
/// Structured fields appear in batch mode only; each channel holds a
/// one-element array with its mean and median.
pub fn record(result: &ItemResult, labels: &Labels) -> Value {
    let mut object = Map::new();

    if let Some(fields) = &result.fields {
        object.insert(labels.key_maker.to_string(), Value::from(fields.maker.clone()));
        object.insert(labels.key_date.to_string(), Value::from(fields.date.clone()));
        object.insert(labels.key_count.to_string(), Value::from(fields.count));
        object.insert(labels.key_title.to_string(), Value::from(fields.title.clone()));
    }

    for channel in Channel::ALL {
        let stats = result.channel(channel);
        let mut pair = Map::new();
        pair.insert(labels.key_mean.to_string(), Value::from(stats.mean));
        pair.insert(labels.key_median.to_string(), Value::from(stats.median));
        object.insert(
            labels.channel_key(channel).to_string(),
            Value::Array(vec![Value::Object(pair)]),
        );
    }

    Value::Object(object)
}
