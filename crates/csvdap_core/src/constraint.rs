//! DAP constraint expressions.
//!
//! A constraint expression is the query string of a data request:
//!
//! ```text
//! sequence.site,sequence.index[0:2:10]&sequence.index>10&sequence.site=~"K"
//! ```
//!
//! The part before the first `&` is the projection, a comma separated list
//! of variable paths with optional hyperslabs. Everything after it is the
//! selection. If the first part contains a comparison operator there's no
//! projection at all.
//!
//! Hyperslabs use DAP order `[start:step:stop]` with an inclusive stop.
use std::fmt;
use std::str::FromStr;

use crate::errors::{CsvDapError, Result, invalid_slice};
use crate::expr::parse::has_operator;
use crate::expr::split_conjunction;
use crate::slice::Range;

/// A projected variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionItem {
    /// Dot separated path, e.g. `["sequence", "index"]`.
    pub path: Vec<String>,
    /// Combined hyperslabs found along the path.
    pub slice: Option<Range>,
}

impl fmt::Display for ProjectionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.join("."))?;
        if let Some(slice) = &self.slice {
            write!(f, "{slice}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConstraintExpression {
    projection: Vec<ProjectionItem>,
    selection: Vec<String>,
}

impl ConstraintExpression {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let text = text.strip_prefix('?').unwrap_or(text);
        let tokens = split_conjunction(text);

        let Some(first) = tokens.first() else {
            return Ok(ConstraintExpression::default());
        };

        if has_operator(first) {
            return Ok(ConstraintExpression {
                projection: Vec::new(),
                selection: tokens.iter().map(|s| s.to_string()).collect(),
            });
        }

        let projection = split_projection(first)
            .into_iter()
            .map(parse_item)
            .collect::<Result<Vec<_>>>()?;

        Ok(ConstraintExpression {
            projection,
            selection: tokens[1..].iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn projection(&self) -> &[ProjectionItem] {
        &self.projection
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn is_empty(&self) -> bool {
        self.projection.is_empty() && self.selection.is_empty()
    }
}

impl FromStr for ConstraintExpression {
    type Err = CsvDapError;

    fn from_str(s: &str) -> Result<Self> {
        ConstraintExpression::parse(s)
    }
}

/// Split on commas outside of brackets.
fn split_projection(text: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => (),
        }
    }
    items.push(&text[start..]);
    items
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_item(text: &str) -> Result<ProjectionItem> {
    let mut path = Vec::new();
    let mut slice: Option<Range> = None;

    for segment in text.split('.') {
        let (name, mut rest) = match segment.find('[') {
            Some(idx) => (&segment[..idx], &segment[idx..]),
            None => (segment, ""),
        };
        if name.is_empty() {
            return Err(CsvDapError::invalid_expression(text, "empty variable name"));
        }

        while !rest.is_empty() {
            let end = rest
                .find(']')
                .ok_or_else(|| invalid_slice!("unterminated hyperslab in '{text}'"))?;
            let hyperslab = parse_hyperslab(&rest[1..end])?;
            slice = Some(match slice {
                Some(prev) => prev.compose(&hyperslab)?,
                None => hyperslab,
            });

            rest = &rest[end + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(invalid_slice!("unexpected '{rest}' after hyperslab in '{text}'"));
            }
        }

        path.push(name.to_string());
    }

    Ok(ProjectionItem { path, slice })
}

/// Parse the inside of a `[start:step:stop]` hyperslab.
fn parse_hyperslab(text: &str) -> Result<Range> {
    let parse = |part: &str| -> Result<i64> {
        part.trim()
            .parse::<u32>()
            .map(i64::from)
            .map_err(|_| invalid_slice!("'{part}' is not a valid hyperslab index"))
    };

    let parts: Vec<&str> = text.split(':').collect();
    match parts.as_slice() {
        [idx] => Ok(Range::index(parse(idx)?)),
        [start, stop] => Range::new(Some(parse(start)?), Some(parse(stop)? + 1), None),
        [start, step, stop] => Range::new(
            Some(parse(start)?),
            Some(parse(stop)? + 1),
            Some(parse(step)?),
        ),
        _ => Err(invalid_slice!("malformed hyperslab '[{text}]'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(path: &[&str], slice: Option<Range>) -> ProjectionItem {
        ProjectionItem {
            path: path.iter().map(|s| s.to_string()).collect(),
            slice,
        }
    }

    #[test]
    fn empty() {
        assert!(ConstraintExpression::parse("").unwrap().is_empty());
        assert!(ConstraintExpression::parse("?").unwrap().is_empty());
    }

    #[test]
    fn projection_only() {
        let ce = ConstraintExpression::parse("sequence.site,sequence.index").unwrap();
        assert_eq!(
            &[
                item(&["sequence", "site"], None),
                item(&["sequence", "index"], None)
            ],
            ce.projection()
        );
        assert!(ce.selection().is_empty());
    }

    #[test]
    fn selection_only() {
        let ce = ConstraintExpression::parse("&sequence.index>10&sequence.site=~\"K&\"").unwrap();
        assert!(ce.projection().is_empty());
        assert_eq!(
            &["sequence.index>10", "sequence.site=~\"K&\""],
            ce.selection()
        );

        let ce = ConstraintExpression::parse("sequence.index>10").unwrap();
        assert!(ce.projection().is_empty());
        assert_eq!(&["sequence.index>10"], ce.selection());
    }

    #[test]
    fn projection_and_selection() {
        let ce = ConstraintExpression::parse("?sequence.site&sequence.index>10").unwrap();
        assert_eq!(&[item(&["sequence", "site"], None)], ce.projection());
        assert_eq!(&["sequence.index>10"], ce.selection());
    }

    #[test]
    fn hyperslabs() {
        let ce = ConstraintExpression::parse("sequence[0:2:6],sequence.index[1:3],x[4]").unwrap();
        assert_eq!(
            &[
                item(&["sequence"], Some(Range::new(Some(0), Some(7), Some(2)).unwrap())),
                item(
                    &["sequence", "index"],
                    Some(Range::new(Some(1), Some(4), None).unwrap())
                ),
                item(&["x"], Some(Range::index(4))),
            ],
            ce.projection()
        );
    }

    #[test]
    fn nested_hyperslabs_compose() {
        let ce = ConstraintExpression::parse("sequence[2:9].index[1:2]").unwrap();
        let slice = ce.projection()[0].slice.unwrap();
        assert_eq!(vec![3, 4], slice.indices(100).collect::<Vec<_>>());
    }

    #[test]
    fn malformed() {
        assert!(ConstraintExpression::parse("sequence[0:1").is_err());
        assert!(ConstraintExpression::parse("sequence[a]").is_err());
        assert!(ConstraintExpression::parse("sequence[-1]").is_err());
        assert!(ConstraintExpression::parse("sequence[0]x").is_err());
        assert!(ConstraintExpression::parse("sequence[1:2:3:4]").is_err());
        assert!(ConstraintExpression::parse("sequence..index").is_err());
        assert!(ConstraintExpression::parse("sequence[0:0:4]").is_err());
    }

    #[test]
    fn display_item() {
        let ce = ConstraintExpression::parse("sequence.index[1:3]").unwrap();
        assert_eq!("sequence.index[1:4]", ce.projection()[0].to_string());
    }
}
