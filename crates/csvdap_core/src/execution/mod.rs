//! Streaming execution of a query over a csv file.
//!
//! Every execution opens its own handle to the file, reads the header, and
//! then pulls one record at a time through a [`Pipeline`]. The handle is
//! owned by the returned stream and released as soon as the stream is
//! exhausted, errors, or is dropped.
pub mod pipeline;

use std::fs::File;
use std::path::PathBuf;

use csv::StringRecord;
use tracing::{debug, trace, warn};

use crate::errors::{CsvDapError, Result};
use crate::expr::Predicate;
use crate::scalar::{Row, ScalarValue};
use crate::slice::Range;
use crate::source::CsvSource;

pub use pipeline::{Flow, Pipeline, Projection, RangeCursor, Record, Stage, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    /// File handle acquired.
    Opened,
    /// Header read and the pipeline built.
    HeaderRead,
    /// At least one record pulled.
    Streaming,
    /// Handle released. Terminal.
    Closed,
}

/// Lazy sequence of rows.
#[derive(Debug)]
pub struct RowStream {
    path: PathBuf,
    /// `None` once closed.
    reader: Option<csv::Reader<File>>,
    pipeline: Pipeline,
    state: ExecState,
    header_len: usize,
    /// Reusable record buffer.
    record: StringRecord,
}

impl RowStream {
    /// Open the file and build the pipeline.
    ///
    /// Column positions are taken from the header as read now, not from the
    /// header cached by the source.
    pub(crate) fn open(
        source: &CsvSource,
        columns: &[String],
        selection: &[String],
        range: &Range,
    ) -> Result<RowStream> {
        let (reader, header) = source.reader()?;
        let mut state = ExecState::Opened;
        trace!(path = %source.path().display(), ?state, "execution state");

        let predicate = Predicate::conjunction(selection, &header)?;
        let projection = Projection::new(columns, &header)?;

        let resolved = match range.resolve_forward() {
            Some(resolved) => resolved,
            None => {
                let len = count_matching(source, &predicate)?;
                debug!(%range, len, "resolved range with counting pass");
                range.resolve(len)
            }
        };

        let pipeline = Pipeline::build(predicate, projection, resolved);
        state = ExecState::HeaderRead;
        debug!(
            path = %source.path().display(),
            columns = ?columns,
            selection = ?selection,
            %range,
            stages = pipeline.stages().len(),
            "executing query"
        );

        Ok(RowStream {
            path: source.path().to_path_buf(),
            reader: Some(reader),
            pipeline,
            state,
            header_len: header.len(),
            record: StringRecord::new(),
        })
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    fn close(&mut self) {
        if self.state != ExecState::Closed {
            self.reader = None;
            self.state = ExecState::Closed;
            trace!(path = %self.path.display(), "closed stream");
        }
    }

    fn next_inner(&mut self) -> Result<Option<Row>> {
        loop {
            if self.pipeline.is_finished() {
                return Ok(None);
            }
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };
            if !reader.read_record(&mut self.record)? {
                return Ok(None);
            }
            self.state = ExecState::Streaming;

            if is_blank(&self.record) {
                trace!(line = ?self.record.position().map(|p| p.line()), "skipped blank record");
                continue;
            }
            check_len(&self.record, self.header_len)?;

            match self.pipeline.run(&self.record) {
                Step::Emit(row) => {
                    trace!(?row, "yielded row");
                    return Ok(Some(row));
                }
                Step::Skip => continue,
                Step::Stop => return Ok(None),
            }
        }
    }
}

impl Iterator for RowStream {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ExecState::Closed {
            return None;
        }
        match self.next_inner() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.close();
                None
            }
            Err(e) => {
                self.close();
                Some(Err(e))
            }
        }
    }
}

/// Lazy sequence of bare values from a single column query.
#[derive(Debug)]
pub struct ValueStream {
    rows: RowStream,
}

impl ValueStream {
    pub(crate) fn new(rows: RowStream) -> Self {
        ValueStream { rows }
    }

    pub fn state(&self) -> ExecState {
        self.rows.state()
    }
}

impl Iterator for ValueStream {
    type Item = Result<ScalarValue>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.rows.next()? {
                Ok(row) => match row.into_iter().next() {
                    Some(value) => return Some(Ok(value)),
                    None => continue,
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(str::is_empty) && record.len() <= 1
}

fn check_len(record: &StringRecord, expected: usize) -> Result<()> {
    if record.len() != expected {
        warn!(expected, found = record.len(), "ragged record");
        return Err(CsvDapError::RaggedRecord {
            line: record.position().map(|p| p.line()).unwrap_or_default(),
            expected,
            found: record.len(),
        });
    }
    Ok(())
}

/// Count records passing the predicate, on a separate handle.
fn count_matching(source: &CsvSource, predicate: &Predicate) -> Result<u64> {
    let (mut reader, header) = source.reader()?;
    let mut record = StringRecord::new();
    let mut count = 0;
    while reader.read_record(&mut record)? {
        if is_blank(&record) {
            continue;
        }
        check_len(&record, header.len())?;
        if predicate.evaluate(&record) {
            count += 1;
        }
    }
    Ok(count)
}
