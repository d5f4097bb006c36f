/// Output streams for analysis results
///
/// This module handles:
/// - The append-only CSV table of statistics (tabular.rs)
/// - The JSON array of per-item records (records.rs)
/// - Keeping both well-formed across incremental appends

pub mod records;
pub mod tabular;

pub use records::RecordStream;
pub use tabular::TabularStream;

use crate::config::OutputLayout;
use crate::error::Result;
use crate::labels::Labels;
use crate::pipeline::ItemResult;

/// Both result streams of a run.
///
/// Opened once at startup, appended to once per item, closed once by
/// `finish`. Dropping without `finish` leaves the record stream
/// unterminated; tabular rows flushed so far stay valid.
pub struct OutputStreams {
    tabular: TabularStream,
    records: RecordStream,
    labels: &'static Labels,
}

impl OutputStreams {
    pub fn open(layout: &OutputLayout, labels: &'static Labels) -> Result<Self> {
        let tabular = TabularStream::open(&layout.csv_path(), &labels.csv_header)?;
        let records = RecordStream::create(&layout.json_path())?;
        Ok(Self {
            tabular,
            records,
            labels,
        })
    }

    pub fn append(&mut self, result: &ItemResult) -> Result<()> {
        self.tabular.append(result)?;
        self.records.append(&records::record(result, self.labels))
    }

    /// Compaction pass: push tabular rows to durable storage and drain the
    /// record buffer.
    pub fn compact(&mut self) -> Result<()> {
        self.tabular.flush_durable()?;
        self.records.flush()
    }

    /// Items appended during this run
    pub fn appended(&self) -> usize {
        self.records.records()
    }

    /// Close both streams; the record stream gets its closing delimiter.
    pub fn finish(self) -> Result<()> {
        self.tabular.close()?;
        self.records.finish()
    }
}
