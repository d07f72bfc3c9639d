//! Lazy, read-only queries over csv files.
//!
//! A file is opened as a [`SequenceQuery`] (or a [`CsvDataset`] wrapping
//! one). Queries are immutable descriptors: projections, selections and
//! row ranges build new descriptors without touching the file. Rows are
//! only read when a query is executed, one record at a time.
pub mod constraint;
pub mod dataset;
pub mod errors;
pub mod execution;
pub mod expr;
pub mod query;
pub mod scalar;
pub mod slice;
pub mod source;

pub use constraint::{ConstraintExpression, ProjectionItem};
pub use dataset::CsvDataset;
pub use errors::{CsvDapError, Result};
pub use execution::{ExecState, RowStream, ValueStream};
pub use expr::{ColumnRef, Comparand, Expression};
pub use query::{ColumnQuery, SequenceQuery};
pub use scalar::{Row, ScalarKind, ScalarValue};
pub use slice::Range;
pub use source::{CsvSource, DialectOptions, Header};
