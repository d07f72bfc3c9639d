//! A csv file exposed as a dataset holding a single sequence.
//!
//! The dataset is named after the file. Its only child is a sequence whose
//! children are the header columns, so a column is addressed as
//! `sequence.<column>` in constraint expressions.
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::constraint::ConstraintExpression;
use crate::errors::{CsvDapError, Result};
use crate::query::{ColumnQuery, SequenceQuery};
use crate::slice::Range;
use crate::source::DialectOptions;

#[derive(Debug, Clone)]
pub struct CsvDataset {
    name: String,
    sequence: SequenceQuery,
}

impl CsvDataset {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_dialect(path, DialectOptions::default())
    }

    pub fn open_with_dialect(path: impl AsRef<Path>, dialect: DialectOptions) -> Result<Self> {
        let path = path.as_ref();
        let sequence = SequenceQuery::open_with_dialect(path, dialect)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(CsvDataset { name, sequence })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unconstrained sequence.
    pub fn sequence(&self) -> &SequenceQuery {
        &self.sequence
    }

    /// One single column query per header column, in header order.
    pub fn children(&self) -> Result<Vec<ColumnQuery>> {
        self.sequence
            .header()
            .names()
            .iter()
            .map(|name| self.sequence.project_single(name))
            .collect()
    }

    pub fn child(&self, name: &str) -> Result<ColumnQuery> {
        self.sequence.project_single(name)
    }

    pub fn last_modified(&self) -> Result<DateTime<Utc>> {
        self.sequence.last_modified()
    }

    pub fn last_modified_http(&self) -> Result<String> {
        self.sequence.source().last_modified_http()
    }

    /// Parse a constraint expression and apply it.
    pub fn query(&self, constraint: &str) -> Result<SequenceQuery> {
        self.apply(&ConstraintExpression::parse(constraint)?)
    }

    /// Apply a parsed constraint expression to the sequence.
    ///
    /// Projected columns are emitted in the order they're named, with
    /// repeats dropped. An empty projection keeps every column. All items
    /// carrying a hyperslab must carry the same one.
    pub fn apply(&self, constraint: &ConstraintExpression) -> Result<SequenceQuery> {
        let identity = self.sequence.identity();
        let header = self.sequence.header();

        let mut columns: Vec<String> = Vec::new();
        let mut slice: Option<Range> = None;

        for item in constraint.projection() {
            match item.path.as_slice() {
                [seq] if seq == identity => columns.extend(header.names().iter().cloned()),
                [seq, column] if seq == identity => columns.push(column.clone()),
                [column] if header.position(column).is_some() => columns.push(column.clone()),
                _ => return Err(CsvDapError::unknown_column(item.path.join("."))),
            }

            if let Some(item_slice) = item.slice {
                match slice {
                    Some(existing) if existing != item_slice => {
                        return Err(CsvDapError::AmbiguousSlice {
                            sequence: identity.to_string(),
                        });
                    }
                    _ => slice = Some(item_slice),
                }
            }
        }

        let mut deduped: Vec<String> = Vec::with_capacity(columns.len());
        for column in columns {
            if !deduped.contains(&column) {
                deduped.push(column);
            }
        }

        let mut query = self.sequence.clone();
        if !deduped.is_empty() {
            query = query.select_columns(&deduped)?;
        }
        for clause in constraint.selection() {
            query = query.filter(clause.as_str())?;
        }
        if let Some(slice) = slice {
            query = query.restrict(slice)?;
        }

        debug!(
            dataset = %self.name,
            columns = ?query.columns(),
            selection = ?query.selection(),
            range = %query.range(),
            "applied constraint expression"
        );

        Ok(query)
    }
}
