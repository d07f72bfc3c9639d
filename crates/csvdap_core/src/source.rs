use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{CsvDapError, Result};

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialectOptions {
    /// Delimiter character.
    pub delimiter: u8,
    /// Quote character.
    pub quote: u8,
}

impl Default for DialectOptions {
    fn default() -> Self {
        DialectOptions {
            delimiter: b',',
            quote: b'"',
        }
    }
}

impl fmt::Debug for DialectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialectOptions")
            .field("delimiter", &(self.delimiter as char))
            .field("quote", &(self.quote as char))
            .finish()
    }
}

impl DialectOptions {
    pub(crate) fn csv_reader<R: std::io::Read>(&self, read: R) -> csv::Reader<R> {
        // Record lengths are checked by the executor so blank lines can be
        // skipped instead of erroring.
        csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote)
            .has_headers(true)
            .flexible(true)
            .from_reader(read)
    }
}

/// Column names of a file in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Header {
    pub fn try_new(names: impl IntoIterator<Item = impl Into<String>>) -> Result<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut positions = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            if positions.insert(name.clone(), idx).is_some() {
                return Err(CsvDapError::DuplicateColumn {
                    column: name.clone(),
                });
            }
        }
        Ok(Header { names, positions })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of an exact column name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Position of a possibly qualified column reference.
    ///
    /// An exact match wins, otherwise only the last `.` separated segment is
    /// matched, so `sequence.index` resolves to `index`.
    pub fn resolve(&self, ident: &str) -> Option<usize> {
        self.position(ident).or_else(|| {
            let name = ident.rsplit('.').next().unwrap_or(ident);
            self.position(name)
        })
    }
}

/// A csv file along with its header as read when the source was opened.
#[derive(Debug)]
pub struct CsvSource {
    path: PathBuf,
    dialect: DialectOptions,
    header: Header,
}

impl CsvSource {
    pub fn open(path: impl AsRef<Path>, dialect: DialectOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (_, header) = open_reader(&path, dialect)?;
        debug!(path = %path.display(), columns = header.len(), "opened csv source");

        Ok(CsvSource {
            path,
            dialect,
            header,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dialect(&self) -> DialectOptions {
        self.dialect
    }

    /// Header cached at open time.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Open a fresh reader positioned after the header.
    ///
    /// The header is read again, the file may have changed since the source
    /// was opened.
    pub(crate) fn reader(&self) -> Result<(csv::Reader<File>, Header)> {
        open_reader(&self.path, self.dialect)
    }

    pub fn last_modified(&self) -> Result<DateTime<Utc>> {
        let modified = std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map_err(|source| CsvDapError::OpenFailure {
                path: self.path.clone(),
                source,
            })?;
        Ok(DateTime::<Utc>::from(modified))
    }

    /// Modification time formatted for a `Last-Modified` response header.
    pub fn last_modified_http(&self) -> Result<String> {
        Ok(self
            .last_modified()?
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string())
    }
}

fn open_reader(path: &Path, dialect: DialectOptions) -> Result<(csv::Reader<File>, Header)> {
    let open_failure = |source: std::io::Error| CsvDapError::OpenFailure {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(open_failure)?;
    let mut reader = dialect.csv_reader(file);
    let record = reader
        .headers()
        .map_err(|e| open_failure(std::io::Error::other(e)))?;

    if record.is_empty() || (record.len() == 1 && record[0].is_empty()) {
        return Err(CsvDapError::EmptyFile {
            path: path.to_path_buf(),
        });
    }

    let header = Header::try_new(record.iter())?;
    Ok((reader, header))
}
