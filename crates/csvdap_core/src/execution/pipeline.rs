//! Stages applied to each record of a scan.
//!
//! A [`Pipeline`] is an ordered list of stages: filter, range, project. Each
//! stage looks at the record in turn and decides whether it continues down
//! the pipeline, gets skipped, or ends the scan.
use csv::StringRecord;

use crate::errors::{CsvDapError, Result};
use crate::expr::Predicate;
use crate::scalar::{Row, ScalarValue};
use crate::slice::ResolvedRange;
use crate::source::Header;

/// A record moving through the pipeline.
#[derive(Debug)]
pub struct Record<'a> {
    /// Raw cells in header order.
    pub fields: &'a StringRecord,
    /// Coerced cells in projection order, set by the project stage.
    pub row: Option<Row>,
}

impl<'a> Record<'a> {
    pub fn new(fields: &'a StringRecord) -> Self {
        Record { fields, row: None }
    }

    pub fn into_row(self) -> Row {
        match self.row {
            Some(row) => row,
            None => self.fields.iter().map(ScalarValue::coerce).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Pass the record to the next stage.
    Continue,
    /// Drop this record, keep scanning.
    Skip,
    /// Drop this record and end the scan.
    Stop,
}

/// Header positions to emit, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    indices: Vec<usize>,
}

impl Projection {
    pub fn new<S: AsRef<str>>(columns: &[S], header: &Header) -> Result<Self> {
        let indices = columns
            .iter()
            .map(|col| {
                let col = col.as_ref();
                header
                    .position(col)
                    .ok_or_else(|| CsvDapError::unknown_column(col))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Projection { indices })
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn apply(&self, fields: &StringRecord) -> Row {
        self.indices
            .iter()
            .map(|idx| ScalarValue::coerce(fields.get(*idx).unwrap_or_default()))
            .collect()
    }
}

/// Tracks position in the post-filter stream.
#[derive(Debug, Clone)]
pub struct RangeCursor {
    range: ResolvedRange,
    position: u64,
}

impl RangeCursor {
    pub fn new(range: ResolvedRange) -> Self {
        RangeCursor { range, position: 0 }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.range.is_exhausted(self.position)
    }

    pub fn advance(&mut self) -> Flow {
        if self.is_exhausted() {
            return Flow::Stop;
        }
        let keep = self.range.contains(self.position);
        self.position += 1;
        if keep { Flow::Continue } else { Flow::Skip }
    }
}

#[derive(Debug, Clone)]
pub enum Stage {
    Filter(Predicate),
    Project(Projection),
    Range(RangeCursor),
}

impl Stage {
    pub fn apply(&mut self, record: &mut Record<'_>) -> Flow {
        match self {
            Stage::Filter(predicate) => {
                if predicate.evaluate(record.fields) {
                    Flow::Continue
                } else {
                    Flow::Skip
                }
            }
            Stage::Project(projection) => {
                record.row = Some(projection.apply(record.fields));
                Flow::Continue
            }
            Stage::Range(cursor) => cursor.advance(),
        }
    }

    /// Returns true if this stage won't let any further record through.
    pub fn is_finished(&self) -> bool {
        match self {
            Stage::Range(cursor) => cursor.is_exhausted(),
            _ => false,
        }
    }
}

/// Outcome of running one record through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Emit(Row),
    Skip,
    Stop,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Pipeline { stages }
    }

    /// Standard filter, range, project pipeline. Stages that would be no-ops
    /// are left out.
    ///
    /// Projection keeps every row, so range positions are the same before
    /// and after it. Only rows inside the range get coerced.
    pub fn build(predicate: Predicate, projection: Projection, range: ResolvedRange) -> Self {
        let mut stages = Vec::with_capacity(3);
        if !predicate.is_always() {
            stages.push(Stage::Filter(predicate));
        }
        if range != ResolvedRange::ALL {
            stages.push(Stage::Range(RangeCursor::new(range)));
        }
        stages.push(Stage::Project(projection));
        Pipeline::new(stages)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_finished(&self) -> bool {
        self.stages.iter().any(Stage::is_finished)
    }

    pub fn run(&mut self, fields: &StringRecord) -> Step {
        let mut record = Record::new(fields);
        for stage in &mut self.stages {
            match stage.apply(&mut record) {
                Flow::Continue => (),
                Flow::Skip => return Step::Skip,
                Flow::Stop => return Step::Stop,
            }
        }
        Step::Emit(record.into_row())
    }
}
