//! Immutable query descriptors.
//!
//! A [`SequenceQuery`] describes which columns, rows and positions of a csv
//! file to read. Every transformation returns a new descriptor and leaves the
//! original untouched. Nothing is read from the file until
//! [`SequenceQuery::execute`] is called, apart from the header which is read
//! once when the query is opened.
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::errors::{CsvDapError, Result};
use crate::execution::{RowStream, ValueStream};
use crate::expr::{ColumnRef, Comparand, Comparison, Expression};
use crate::scalar::{ScalarKind, ScalarValue};
use crate::slice::Range;
use crate::source::{CsvSource, DialectOptions, Header};

#[derive(Debug, Clone)]
pub struct SequenceQuery {
    source: Arc<CsvSource>,
    /// Name used to qualify column references.
    identity: Arc<str>,
    /// Emitted columns, in order.
    columns: Arc<[String]>,
    /// Selection clauses, AND-ed.
    selection: Arc<[String]>,
    range: Range,
}

impl SequenceQuery {
    pub const DEFAULT_IDENTITY: &'static str = "sequence";

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_dialect(path, DialectOptions::default())
    }

    pub fn open_with_dialect(path: impl AsRef<Path>, dialect: DialectOptions) -> Result<Self> {
        let source = CsvSource::open(path, dialect)?;
        Ok(Self::from_source(Arc::new(source)))
    }

    /// Query over all columns and rows of an already opened source.
    pub fn from_source(source: Arc<CsvSource>) -> Self {
        let columns: Arc<[String]> = source.header().names().into();
        SequenceQuery {
            source,
            identity: Self::DEFAULT_IDENTITY.into(),
            columns,
            selection: Arc::from([]),
            range: Range::full(),
        }
    }

    pub fn source(&self) -> &Arc<CsvSource> {
        &self.source
    }

    pub fn path(&self) -> &Path {
        self.source.path()
    }

    pub fn header(&self) -> &Header {
        self.source.header()
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn with_identity(&self, identity: &str) -> Self {
        SequenceQuery {
            identity: identity.into(),
            ..self.clone()
        }
    }

    /// Handle for building comparisons against a header column.
    pub fn column(&self, name: &str) -> Result<ColumnRef> {
        let idx = self
            .header()
            .resolve(name)
            .ok_or_else(|| CsvDapError::unknown_column(name))?;
        Ok(ColumnRef::new(&self.identity, &self.header().names()[idx]))
    }

    /// Replace the emitted columns.
    ///
    /// Names may be qualified (`sequence.index`). Order is kept, duplicates
    /// and names missing from the header are rejected.
    pub fn select_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let header = self.header();
        let mut seen = HashSet::with_capacity(names.len());
        let mut columns = Vec::with_capacity(names.len());

        for name in names {
            let name = name.as_ref();
            let idx = header
                .resolve(name)
                .ok_or_else(|| CsvDapError::unknown_column(name))?;
            let canonical = &header.names()[idx];
            if !seen.insert(idx) {
                return Err(CsvDapError::DuplicateColumn {
                    column: canonical.clone(),
                });
            }
            columns.push(canonical.clone());
        }

        Ok(SequenceQuery {
            columns: columns.into(),
            ..self.clone()
        })
    }

    /// Narrow to a single column whose stream yields bare values.
    pub fn project_single(&self, name: &str) -> Result<ColumnQuery> {
        Ok(ColumnQuery {
            query: self.select_columns(&[name])?,
        })
    }

    /// Add a selection.
    ///
    /// Every clause is checked against the header before it's added.
    pub fn filter(&self, expr: impl Into<Expression>) -> Result<Self> {
        let expr = expr.into();
        if expr.clauses().is_empty() {
            return Err(CsvDapError::invalid_expression(
                &expr.to_string(),
                "empty selection",
            ));
        }
        for clause in expr.clauses() {
            Comparison::parse(clause, self.header())?;
        }

        let selection: Vec<String> = self
            .selection
            .iter()
            .cloned()
            .chain(expr.into_clauses())
            .collect();

        Ok(SequenceQuery {
            selection: selection.into(),
            ..self.clone()
        })
    }

    /// Restrict to a range of the rows this query currently produces.
    pub fn restrict(&self, range: Range) -> Result<Self> {
        let range = self.range.compose(&range)?;
        Ok(SequenceQuery {
            range,
            ..self.clone()
        })
    }

    /// Restrict to a single row.
    pub fn get(&self, idx: i64) -> Result<Self> {
        self.restrict(Range::index(idx))
    }

    /// Start a scan of the file.
    pub fn execute(&self) -> Result<RowStream> {
        RowStream::open(&self.source, &self.columns, &self.selection, &self.range)
    }

    /// Kinds of the emitted columns, peeked from the first row.
    ///
    /// Returns `None` if the query produces no rows.
    pub fn kinds(&self) -> Result<Option<Vec<ScalarKind>>> {
        let mut stream = self.execute()?;
        let row = stream.next().transpose()?;
        Ok(row.map(|row| row.iter().map(ScalarValue::kind).collect()))
    }

    pub fn last_modified(&self) -> Result<DateTime<Utc>> {
        self.source.last_modified()
    }
}

/// Query over a single column, yielding bare values.
#[derive(Debug, Clone)]
pub struct ColumnQuery {
    query: SequenceQuery,
}

impl ColumnQuery {
    pub fn name(&self) -> &str {
        // Always exactly one column.
        self.query.columns()[0].as_str()
    }

    /// The underlying single column row query.
    pub fn sequence(&self) -> &SequenceQuery {
        &self.query
    }

    pub fn column_ref(&self) -> ColumnRef {
        ColumnRef::new(self.query.identity(), self.name())
    }

    /// Add a selection. May reference any column of the file.
    pub fn filter(&self, expr: impl Into<Expression>) -> Result<Self> {
        Ok(ColumnQuery {
            query: self.query.filter(expr)?,
        })
    }

    pub fn restrict(&self, range: Range) -> Result<Self> {
        Ok(ColumnQuery {
            query: self.query.restrict(range)?,
        })
    }

    pub fn get(&self, idx: i64) -> Result<Self> {
        self.restrict(Range::index(idx))
    }

    pub fn execute(&self) -> Result<ValueStream> {
        Ok(ValueStream::new(self.query.execute()?))
    }

    /// Kind of this column, peeked from the first value.
    ///
    /// Returns `None` if the query produces no values.
    pub fn kind(&self) -> Result<Option<ScalarKind>> {
        let mut stream = self.execute()?;
        let value = stream.next().transpose()?;
        Ok(value.map(|v| v.kind()))
    }

    pub fn eq(&self, other: impl Into<Comparand>) -> Expression {
        self.column_ref().eq(other)
    }

    pub fn ne(&self, other: impl Into<Comparand>) -> Expression {
        self.column_ref().ne(other)
    }

    pub fn lt(&self, other: impl Into<Comparand>) -> Expression {
        self.column_ref().lt(other)
    }

    pub fn gt(&self, other: impl Into<Comparand>) -> Expression {
        self.column_ref().gt(other)
    }

    pub fn le(&self, other: impl Into<Comparand>) -> Expression {
        self.column_ref().le(other)
    }

    pub fn ge(&self, other: impl Into<Comparand>) -> Expression {
        self.column_ref().ge(other)
    }

    pub fn matches(&self, pattern: &str) -> Expression {
        self.column_ref().matches(pattern)
    }
}

impl From<&ColumnQuery> for Comparand {
    fn from(value: &ColumnQuery) -> Self {
        Comparand::Column(value.column_ref())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const CONTENT: &str = "index,temperature,site
10,15.2,Diamond_St
11,13.1,Blacktail_Loop
12,13.3,Platinum_St
13,12.1,Kodiak_Trail
";

    fn fixture() -> (tempfile::NamedTempFile, SequenceQuery) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONTENT.as_bytes()).unwrap();
        let query = SequenceQuery::open(file.path()).unwrap();
        (file, query)
    }

    #[test]
    fn defaults() {
        let (_file, query) = fixture();
        assert_eq!("sequence", query.identity());
        assert_eq!(&["index", "temperature", "site"], query.columns());
        assert!(query.selection().is_empty());
        assert!(query.range().is_full());
    }

    #[test]
    fn transformations_leave_original_untouched() {
        let (_file, query) = fixture();
        let derived = query
            .select_columns(&["site"])
            .unwrap()
            .filter("index>10")
            .unwrap()
            .restrict(Range::new(None, None, Some(2)).unwrap())
            .unwrap();

        assert_eq!(&["index", "temperature", "site"], query.columns());
        assert!(query.selection().is_empty());
        assert!(query.range().is_full());

        assert_eq!(&["site"], derived.columns());
        assert_eq!(&["index>10"], derived.selection());
        assert_eq!(Some(2), derived.range().step());
    }

    #[test]
    fn select_qualified_names() {
        let (_file, query) = fixture();
        let query = query
            .select_columns(&["sequence.site", "index"])
            .unwrap();
        assert_eq!(&["site", "index"], query.columns());
    }

    #[test]
    fn select_duplicates_rejected() {
        let (_file, query) = fixture();
        let err = query.select_columns(&["site", "sequence.site"]).unwrap_err();
        assert!(matches!(err, CsvDapError::DuplicateColumn { column } if column == "site"));
    }

    #[test]
    fn filter_validated_eagerly() {
        let (_file, query) = fixture();
        assert!(matches!(
            query.filter("nope>1"),
            Err(CsvDapError::InvalidExpression { .. })
        ));
        assert!(matches!(
            query.filter(""),
            Err(CsvDapError::InvalidExpression { .. })
        ));
        // Nothing partially applied from a compound expression.
        assert!(query.filter("index>1&nope<2").is_err());
    }

    #[test]
    fn filter_compound_text_splits() {
        let (_file, query) = fixture();
        let query = query.filter("index>10&site=~K").unwrap();
        assert_eq!(&["index>10", "site=~K"], query.selection());
    }

    #[test]
    fn filter_with_builder() {
        let (_file, query) = fixture();
        let index = query.column("index").unwrap();
        let temp = query.column("temperature").unwrap();
        let query = query.filter(index.gt(10) & temp.lt(13.2)).unwrap();
        assert_eq!(
            &["sequence.index>10", "sequence.temperature<13.2"],
            query.selection()
        );
    }

    #[test]
    fn restrict_composes() {
        let (_file, query) = fixture();
        let query = query
            .restrict(Range::new(Some(1), None, None).unwrap())
            .unwrap()
            .get(1)
            .unwrap();
        assert_eq!(Range::new(Some(2), Some(3), Some(1)).unwrap(), query.range());
    }

    #[test]
    fn with_identity_qualifies_builder() {
        let (_file, query) = fixture();
        let query = query.with_identity("stations");
        let site = query.project_single("site").unwrap();
        assert_eq!("stations.site", site.column_ref().qualified_name());
        assert_eq!("stations.site=~\"K\"", site.matches("K").to_string());
    }

    #[test]
    fn column_query_compares_with_column() {
        let (_file, query) = fixture();
        let index = query.project_single("index").unwrap();
        let temp = query.project_single("temperature").unwrap();
        assert_eq!(
            "sequence.index<sequence.temperature",
            index.lt(&temp).to_string()
        );
    }

    #[test]
    fn descriptor_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SequenceQuery>();
        assert_send_sync::<ColumnQuery>();
    }
}
