use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The inferred kind of a scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Int64,
    Float64,
    Utf8,
    Boolean,
    Null,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarKind::Int64 => write!(f, "Int64"),
            ScalarKind::Float64 => write!(f, "Float64"),
            ScalarKind::Utf8 => write!(f, "Utf8"),
            ScalarKind::Boolean => write!(f, "Boolean"),
            ScalarKind::Null => write!(f, "Null"),
        }
    }
}

/// A single coerced cell, or a literal from a selection expression.
///
/// Cells read from a file are only ever `Int64`, `Float64` or `Utf8`.
/// `Boolean` and `Null` come from expression literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Boolean(bool),
    Null,
}

/// A row in projection order.
pub type Row = Vec<ScalarValue>;

impl ScalarValue {
    /// Coerce a raw cell to the most specific scalar.
    ///
    /// Tries an integer, then a float, and falls back to text. Never fails.
    pub fn coerce(text: &str) -> ScalarValue {
        if let Ok(v) = text.parse::<i64>() {
            return ScalarValue::Int64(v);
        }
        if let Ok(v) = text.parse::<f64>() {
            return ScalarValue::Float64(v);
        }
        ScalarValue::Utf8(text.to_string())
    }

    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarValue::Int64(_) => ScalarKind::Int64,
            ScalarValue::Float64(_) => ScalarKind::Float64,
            ScalarValue::Utf8(_) => ScalarKind::Utf8,
            ScalarValue::Boolean(_) => ScalarKind::Boolean,
            ScalarValue::Null => ScalarKind::Null,
        }
    }

    /// Compare two values.
    ///
    /// Numbers compare numerically regardless of integer/float, text
    /// compares by bytes. Any other pairing is incomparable and returns
    /// `None`.
    pub fn compare(&self, other: &ScalarValue) -> Option<Ordering> {
        match (self, other) {
            (ScalarValue::Int64(a), ScalarValue::Int64(b)) => Some(a.cmp(b)),
            (ScalarValue::Int64(a), ScalarValue::Float64(b)) => (*a as f64).partial_cmp(b),
            (ScalarValue::Float64(a), ScalarValue::Int64(b)) => a.partial_cmp(&(*b as f64)),
            (ScalarValue::Float64(a), ScalarValue::Float64(b)) => a.partial_cmp(b),
            (ScalarValue::Utf8(a), ScalarValue::Utf8(b)) => Some(a.as_str().cmp(b.as_str())),
            (ScalarValue::Boolean(a), ScalarValue::Boolean(b)) => Some(a.cmp(b)),
            (ScalarValue::Null, ScalarValue::Null) => Some(Ordering::Equal),
            _ => None,
        }
    }

    /// Text form used as the subject of a regex match.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            ScalarValue::Utf8(s) => Cow::Borrowed(s.as_str()),
            other => Cow::Owned(other.to_string()),
        }
    }

    /// Encode as a literal the expression parser reads back to the same
    /// value.
    pub fn encode(&self) -> String {
        match self {
            ScalarValue::Int64(v) => v.to_string(),
            ScalarValue::Float64(v) => format!("{v:?}"),
            ScalarValue::Utf8(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('"');
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push('"');
                out
            }
            ScalarValue::Boolean(v) => v.to_string(),
            ScalarValue::Null => "none".to_string(),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Int64(v) => write!(f, "{v}"),
            // Debug keeps the trailing '.0' for whole floats.
            ScalarValue::Float64(v) => write!(f, "{v:?}"),
            ScalarValue::Utf8(v) => write!(f, "{v}"),
            ScalarValue::Boolean(v) => write!(f, "{v}"),
            ScalarValue::Null => write!(f, "None"),
        }
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int64(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Int64(value as i64)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float64(value)
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Utf8(value)
    }
}
