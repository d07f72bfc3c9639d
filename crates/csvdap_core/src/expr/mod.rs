//! Selection expressions.
//!
//! An expression is a comparison `lhs OP rhs` where `lhs` names a column and
//! `rhs` is either another column or a literal. Expressions are only ever
//! combined by conjunction.
pub mod builder;
pub mod parse;

use std::cmp::Ordering;
use std::fmt;

use regex::Regex;

use crate::scalar::ScalarValue;

pub use builder::{ColumnRef, Comparand, Expression};
pub use parse::split_conjunction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    /// Regex match anchored at the start of the left side.
    Match,
}

impl Operator {
    pub fn token(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::LtEq => "<=",
            Operator::GtEq => ">=",
            Operator::Match => "=~",
        }
    }

    pub(crate) fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "=" => Operator::Eq,
            "!=" => Operator::NotEq,
            "<" => Operator::Lt,
            ">" => Operator::Gt,
            "<=" => Operator::LtEq,
            ">=" => Operator::GtEq,
            "=~" => Operator::Match,
            _ => return None,
        })
    }

    /// Apply an ordering operator to two values.
    ///
    /// Incomparable values only satisfy `!=`.
    pub fn holds(&self, left: &ScalarValue, right: &ScalarValue) -> bool {
        let ord = left.compare(right);
        match self {
            Operator::Eq => ord == Some(Ordering::Equal),
            Operator::NotEq => ord != Some(Ordering::Equal),
            Operator::Lt => ord == Some(Ordering::Less),
            Operator::Gt => ord == Some(Ordering::Greater),
            Operator::LtEq => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
            Operator::GtEq => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            Operator::Match => anchored_regex(&right.as_text())
                .map(|re| re.is_match(&left.as_text()))
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Right side of a parsed comparison.
#[derive(Debug, Clone)]
pub enum Operand {
    /// Position of a column in the header.
    Column(usize),
    Literal(ScalarValue),
    /// Precompiled literal pattern for `=~`.
    Pattern(Regex),
}

/// Compile a pattern that must match at the start of the subject.
pub(crate) fn anchored_regex(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})"))
}

/// A single comparison resolved against a header.
#[derive(Debug, Clone)]
pub struct Comparison {
    /// Source text, kept for error messages and display.
    pub text: String,
    pub lhs: usize,
    pub op: Operator,
    pub rhs: Operand,
}

impl Comparison {
    /// Evaluate against the raw cells of a record in header order.
    ///
    /// Only the referenced cells are coerced.
    pub fn evaluate(&self, record: &csv::StringRecord) -> bool {
        let Some(left) = record.get(self.lhs) else {
            return false;
        };

        match (&self.op, &self.rhs) {
            (Operator::Match, Operand::Pattern(re)) => re.is_match(left),
            (Operator::Match, Operand::Column(idx)) => match record.get(*idx) {
                Some(pattern) => anchored_regex(pattern)
                    .map(|re| re.is_match(left))
                    .unwrap_or(false),
                None => false,
            },
            (Operator::Match, Operand::Literal(pattern)) => anchored_regex(&pattern.as_text())
                .map(|re| re.is_match(left))
                .unwrap_or(false),
            (op, Operand::Column(idx)) => match record.get(*idx) {
                Some(right) => op.holds(&ScalarValue::coerce(left), &ScalarValue::coerce(right)),
                None => false,
            },
            (op, Operand::Literal(right)) => op.holds(&ScalarValue::coerce(left), right),
            (op, Operand::Pattern(re)) => {
                op.holds(&ScalarValue::coerce(left), &ScalarValue::from(re.as_str()))
            }
        }
    }

    /// Header positions this comparison reads.
    pub fn columns(&self) -> impl Iterator<Item = usize> + '_ {
        let rhs = match &self.rhs {
            Operand::Column(idx) => Some(*idx),
            _ => None,
        };
        std::iter::once(self.lhs).chain(rhs)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Conjunction of comparisons. Empty matches everything.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
    comparisons: Vec<Comparison>,
}

impl Predicate {
    pub fn always() -> Self {
        Predicate::default()
    }

    pub fn new(comparisons: Vec<Comparison>) -> Self {
        Predicate { comparisons }
    }

    pub fn comparisons(&self) -> &[Comparison] {
        &self.comparisons
    }

    pub fn is_always(&self) -> bool {
        self.comparisons.is_empty()
    }

    /// Returns true if every comparison holds, stopping at the first that
    /// does not.
    pub fn evaluate(&self, record: &csv::StringRecord) -> bool {
        self.comparisons.iter().all(|c| c.evaluate(record))
    }
}
