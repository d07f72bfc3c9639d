use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CsvDapError {
    #[error("Unable to open file {}: {source}", path.display())]
    OpenFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File {} has no header row", path.display())]
    EmptyFile { path: PathBuf },

    #[error("Unknown column: {column}")]
    UnknownColumn { column: String },

    #[error("Duplicate column: {column}")]
    DuplicateColumn { column: String },

    #[error("Invalid expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Invalid slice: {0}")]
    InvalidSlice(String),

    #[error("Ambiguous slice requested for '{sequence}'")]
    AmbiguousSlice { sequence: String },

    #[error("Record on line {line} has {found} fields, expected {expected}")]
    RaggedRecord {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = CsvDapError> = std::result::Result<T, E>;

impl CsvDapError {
    pub(crate) fn invalid_expression(expression: &str, reason: impl Into<String>) -> Self {
        CsvDapError::InvalidExpression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_column(column: impl Into<String>) -> Self {
        CsvDapError::UnknownColumn {
            column: column.into(),
        }
    }
}

#[allow(unused_macros)]
macro_rules! invalid_slice {
    ($($arg:tt)*) => {
        crate::errors::CsvDapError::InvalidSlice(std::format!($($arg)*))
    };
}
pub(crate) use invalid_slice;
