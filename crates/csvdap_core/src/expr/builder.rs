//! Build selection expressions from column handles.
//!
//! Comparing a [`ColumnRef`] doesn't evaluate anything, it produces an
//! [`Expression`] holding the textual form of the comparison which can later
//! be passed to a query's `filter`.
use std::fmt;
use std::ops::BitAnd;

use super::Operator;
use super::parse::split_conjunction;
use crate::scalar::ScalarValue;

/// Conjunction of textual comparison clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    clauses: Vec<String>,
}

impl Expression {
    /// Split raw selection text into an expression.
    pub fn from_text(text: &str) -> Self {
        Expression {
            clauses: split_conjunction(text)
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn clauses(&self) -> &[String] {
        &self.clauses
    }

    pub fn into_clauses(self) -> Vec<String> {
        self.clauses
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clauses.join("&"))
    }
}

impl BitAnd for Expression {
    type Output = Expression;

    fn bitand(mut self, rhs: Expression) -> Expression {
        self.clauses.extend(rhs.clauses);
        self
    }
}

impl From<&str> for Expression {
    fn from(value: &str) -> Self {
        Expression::from_text(value)
    }
}

impl From<String> for Expression {
    fn from(value: String) -> Self {
        Expression::from_text(&value)
    }
}

impl From<&String> for Expression {
    fn from(value: &String) -> Self {
        Expression::from_text(value)
    }
}

/// Fully qualified reference to a column, e.g. `sequence.index`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    qualified: String,
}

impl ColumnRef {
    pub fn new(identity: &str, column: &str) -> Self {
        let qualified = if identity.is_empty() {
            column.to_string()
        } else {
            format!("{identity}.{column}")
        };
        ColumnRef { qualified }
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified
    }

    /// Bare column name.
    pub fn name(&self) -> &str {
        self.qualified
            .rsplit('.')
            .next()
            .unwrap_or(self.qualified.as_str())
    }

    fn compare(&self, op: Operator, other: Comparand) -> Expression {
        Expression {
            clauses: vec![format!("{}{}{}", self.qualified, op.token(), other.encode())],
        }
    }

    pub fn eq(&self, other: impl Into<Comparand>) -> Expression {
        self.compare(Operator::Eq, other.into())
    }

    pub fn ne(&self, other: impl Into<Comparand>) -> Expression {
        self.compare(Operator::NotEq, other.into())
    }

    pub fn lt(&self, other: impl Into<Comparand>) -> Expression {
        self.compare(Operator::Lt, other.into())
    }

    pub fn gt(&self, other: impl Into<Comparand>) -> Expression {
        self.compare(Operator::Gt, other.into())
    }

    pub fn le(&self, other: impl Into<Comparand>) -> Expression {
        self.compare(Operator::LtEq, other.into())
    }

    pub fn ge(&self, other: impl Into<Comparand>) -> Expression {
        self.compare(Operator::GtEq, other.into())
    }

    /// Regex match anchored at the start of the column's text.
    pub fn matches(&self, pattern: &str) -> Expression {
        self.compare(Operator::Match, Comparand::Value(ScalarValue::from(pattern)))
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified)
    }
}

/// The other side of a built comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparand {
    Column(ColumnRef),
    Value(ScalarValue),
}

impl Comparand {
    fn encode(&self) -> String {
        match self {
            Comparand::Column(col) => col.qualified.clone(),
            Comparand::Value(v) => v.encode(),
        }
    }
}

impl From<ColumnRef> for Comparand {
    fn from(value: ColumnRef) -> Self {
        Comparand::Column(value)
    }
}

impl From<&ColumnRef> for Comparand {
    fn from(value: &ColumnRef) -> Self {
        Comparand::Column(value.clone())
    }
}

impl From<ScalarValue> for Comparand {
    fn from(value: ScalarValue) -> Self {
        Comparand::Value(value)
    }
}

impl From<i64> for Comparand {
    fn from(value: i64) -> Self {
        Comparand::Value(value.into())
    }
}

impl From<i32> for Comparand {
    fn from(value: i32) -> Self {
        Comparand::Value(value.into())
    }
}

impl From<f64> for Comparand {
    fn from(value: f64) -> Self {
        Comparand::Value(value.into())
    }
}

impl From<bool> for Comparand {
    fn from(value: bool) -> Self {
        Comparand::Value(value.into())
    }
}

impl From<&str> for Comparand {
    fn from(value: &str) -> Self {
        Comparand::Value(value.into())
    }
}

impl From<String> for Comparand {
    fn from(value: String) -> Self {
        Comparand::Value(value.into())
    }
}
