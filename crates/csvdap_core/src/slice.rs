//! Positional restrictions over a row stream.
//!
//! A [`Range`] follows Python slice semantics: bounds may be missing
//! (unbounded) or negative (counted from the end, unresolved until the
//! length of the stream is known), and a missing step means 1. Streams are
//! forward only, so steps must be positive.
//!
//! Successive restrictions are merged with [`Range::compose`], producing one
//! range over the original index space.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{CsvDapError, Result, invalid_slice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
}

impl Range {
    /// The unrestricted range.
    pub const fn full() -> Self {
        Range {
            start: None,
            stop: None,
            step: None,
        }
    }

    pub fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Result<Self> {
        match step {
            Some(0) => return Err(invalid_slice!("slice step cannot be zero")),
            Some(s) if s < 0 => {
                return Err(invalid_slice!(
                    "negative slice step {s} is not supported for forward-only streams"
                ));
            }
            _ => (),
        }
        Ok(Range { start, stop, step })
    }

    /// Range selecting a single element.
    ///
    /// `-1` and `i64::MAX` have no representable stop and are left unbounded.
    pub const fn index(idx: i64) -> Self {
        let stop = match idx.checked_add(1) {
            Some(0) | None => None,
            stop => stop,
        };
        Range {
            start: Some(idx),
            stop,
            step: Some(1),
        }
    }

    pub fn start(&self) -> Option<i64> {
        self.start
    }

    pub fn stop(&self) -> Option<i64> {
        self.stop
    }

    pub fn step(&self) -> Option<i64> {
        self.step
    }

    /// Returns true if this range selects every element.
    pub fn is_full(&self) -> bool {
        matches!(self.start, None | Some(0))
            && self.stop.is_none()
            && matches!(self.step, None | Some(1))
    }

    /// Returns true if no bound counts from the end.
    pub fn is_forward(&self) -> bool {
        self.start.is_none_or(|v| v >= 0) && self.stop.is_none_or(|v| v >= 0)
    }

    /// Compose two successive restrictions.
    ///
    /// The returned range applied to the original sequence selects the same
    /// elements, in the same order, as applying `self` and then `inner` to
    /// the result.
    pub fn compose(&self, inner: &Range) -> Result<Range> {
        if inner.is_full() {
            return Ok(*self);
        }
        if self.is_full() {
            return Ok(*inner);
        }
        if !self.is_forward() || !inner.is_forward() {
            return Err(invalid_slice!(
                "cannot combine {self} with {inner}, negative indices require the sequence length"
            ));
        }

        let a1 = self.start.unwrap_or(0);
        let s1 = self.step.unwrap_or(1);
        let a2 = inner.start.unwrap_or(0);
        let s2 = inner.step.unwrap_or(1);

        // Position k in the outer output is a1 + k*s1 in the original.
        let start = a1.saturating_add(a2.saturating_mul(s1));
        let step = s1.saturating_mul(s2);
        let stop = match (self.stop, inner.stop) {
            (None, None) => None,
            (Some(b1), None) => Some(b1),
            (None, Some(b2)) => Some(a1.saturating_add(b2.saturating_mul(s1))),
            (Some(b1), Some(b2)) => Some(i64::min(b1, a1.saturating_add(b2.saturating_mul(s1)))),
        };

        Ok(Range {
            start: Some(start),
            stop,
            step: Some(step),
        })
    }

    /// Resolve without knowing the length.
    ///
    /// Returns `None` if a bound counts from the end.
    pub fn resolve_forward(&self) -> Option<ResolvedRange> {
        if !self.is_forward() {
            return None;
        }
        Some(ResolvedRange {
            start: self.start.unwrap_or(0) as u64,
            stop: self.stop.map(|v| v as u64),
            step: self.step.unwrap_or(1) as u64,
        })
    }

    /// Resolve against a known length using Python clamping rules.
    pub fn resolve(&self, len: u64) -> ResolvedRange {
        let clamp = |v: i64| -> u64 {
            if v < 0 {
                let from_end = len as i128 + v as i128;
                from_end.max(0) as u64
            } else {
                (v as u64).min(len)
            }
        };

        ResolvedRange {
            start: self.start.map(clamp).unwrap_or(0),
            stop: Some(self.stop.map(clamp).unwrap_or(len)),
            step: self.step.unwrap_or(1) as u64,
        }
    }

    /// Positions selected from a sequence of `len` elements.
    pub fn indices(&self, len: u64) -> impl Iterator<Item = u64> {
        let resolved = self.resolve(len);
        (0..len).filter(move |pos| resolved.contains(*pos))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |v: Option<i64>| v.map(|v| v.to_string()).unwrap_or_default();
        write!(f, "[{}:{}", opt(self.start), opt(self.stop))?;
        if let Some(step) = self.step {
            write!(f, ":{step}")?;
        }
        write!(f, "]")
    }
}

impl FromStr for Range {
    type Err = CsvDapError;

    /// Parse `start:stop:step` (any part may be empty) or a single index.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(s);

        let parse_part = |part: &str| -> Result<Option<i64>> {
            let part = part.trim();
            if part.is_empty() {
                return Ok(None);
            }
            part.parse::<i64>()
                .map(Some)
                .map_err(|_| invalid_slice!("'{part}' is not an integer"))
        };

        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [idx] => match parse_part(idx)? {
                Some(idx) => Ok(Range::index(idx)),
                None => Ok(Range::full()),
            },
            [start, stop] => Range::new(parse_part(start)?, parse_part(stop)?, None),
            [start, stop, step] => {
                Range::new(parse_part(start)?, parse_part(stop)?, parse_part(step)?)
            }
            _ => Err(invalid_slice!("too many components in '{s}'")),
        }
    }
}

/// A range with every bound made non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: u64,
    /// Exclusive, `None` when unbounded.
    pub stop: Option<u64>,
    pub step: u64,
}

impl ResolvedRange {
    /// Every position.
    pub const ALL: ResolvedRange = ResolvedRange {
        start: 0,
        stop: None,
        step: 1,
    };

    pub fn contains(&self, pos: u64) -> bool {
        pos >= self.start
            && self.stop.is_none_or(|stop| pos < stop)
            && (pos - self.start) % self.step == 0
    }

    /// Returns true once no position at or after `pos` can be selected.
    pub fn is_exhausted(&self, pos: u64) -> bool {
        self.stop.is_some_and(|stop| pos >= stop || self.start >= stop)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn r(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Range {
        Range::new(start, stop, step).unwrap()
    }

    /// Apply ranges one after the other to `0..len`, the reference result.
    fn apply_successively(ranges: &[Range], len: u64) -> Vec<u64> {
        let mut items: Vec<u64> = (0..len).collect();
        for range in ranges {
            items = range
                .indices(items.len() as u64)
                .map(|idx| items[idx as usize])
                .collect();
        }
        items
    }

    #[test]
    fn zero_step_rejected() {
        assert!(matches!(
            Range::new(None, None, Some(0)),
            Err(CsvDapError::InvalidSlice(_))
        ));
    }

    #[test]
    fn negative_step_rejected() {
        assert!(Range::new(None, None, Some(-1)).is_err());
    }

    #[test]
    fn index_range() {
        assert_eq!(vec![3], Range::index(3).indices(10).collect::<Vec<_>>());
        assert_eq!(vec![9], Range::index(-1).indices(10).collect::<Vec<_>>());
        assert_eq!(vec![8], Range::index(-2).indices(10).collect::<Vec<_>>());
    }

    #[test]
    fn index_at_max_does_not_overflow() {
        let range: Range = i64::MAX.to_string().parse().unwrap();
        assert_eq!(Range::index(i64::MAX), range);
        assert_eq!(None, range.stop());
        assert!(range.indices(10).next().is_none());
        assert_eq!(
            Vec::<u64>::new(),
            r(Some(2), None, None)
                .compose(&range)
                .unwrap()
                .indices(10)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn resolve_clamps() {
        let range = r(Some(-3), Some(100), None);
        assert_eq!(
            ResolvedRange {
                start: 2,
                stop: Some(5),
                step: 1
            },
            range.resolve(5)
        );
        let range = r(Some(-30), Some(-1), Some(2));
        assert_eq!(vec![0, 2], range.indices(5).collect::<Vec<_>>());
    }

    #[test]
    fn compose_strides() {
        let outer = r(None, None, Some(2));
        let inner = r(None, None, Some(2));
        assert_eq!(r(Some(0), None, Some(4)), outer.compose(&inner).unwrap());

        let outer = r(Some(1), None, Some(2));
        let inner = r(Some(1), None, Some(2));
        // outer: 1,3,5,7,9,... inner picks 3,7,11,...
        assert_eq!(r(Some(3), None, Some(4)), outer.compose(&inner).unwrap());
        assert_eq!(
            apply_successively(&[outer, inner], 20),
            outer.compose(&inner).unwrap().indices(20).collect::<Vec<_>>()
        );
    }

    #[test]
    fn compose_narrower_later() {
        let outer = r(Some(2), Some(10), None);
        let inner = r(Some(1), Some(3), None);
        let composed = outer.compose(&inner).unwrap();
        assert_eq!(r(Some(3), Some(5), Some(1)), composed);
    }

    #[test]
    fn compose_later_wider_is_clipped() {
        let outer = r(Some(2), Some(4), None);
        let inner = r(None, Some(100), None);
        let composed = outer.compose(&inner).unwrap();
        assert_eq!(vec![2, 3], composed.indices(50).collect::<Vec<_>>());
    }

    #[test]
    fn compose_with_full_is_identity() {
        let range = r(Some(-2), None, None);
        assert_eq!(range, range.compose(&Range::full()).unwrap());
        assert_eq!(range, Range::full().compose(&range).unwrap());
    }

    #[test]
    fn compose_negative_chain_rejected() {
        let outer = r(Some(1), None, None);
        let inner = r(Some(-2), None, None);
        assert!(matches!(
            outer.compose(&inner),
            Err(CsvDapError::InvalidSlice(_))
        ));
    }

    #[test]
    fn parse_python_order() {
        assert_eq!(r(Some(1), Some(10), Some(2)), "1:10:2".parse().unwrap());
        assert_eq!(r(None, None, Some(2)), "::2".parse().unwrap());
        assert_eq!(r(Some(3), None, None), "3:".parse().unwrap());
        assert_eq!(Range::index(4), "4".parse().unwrap());
        assert_eq!(Range::full(), "".parse().unwrap());
        assert!("1:2:3:4".parse::<Range>().is_err());
        assert!("a:b".parse::<Range>().is_err());
        assert!("::0".parse::<Range>().is_err());
    }

    #[test]
    fn display() {
        assert_eq!("[1:10:2]", r(Some(1), Some(10), Some(2)).to_string());
        assert_eq!("[:]", Range::full().to_string());
    }

    #[test]
    fn exhausted() {
        let resolved = r(Some(1), Some(3), None).resolve_forward().unwrap();
        assert!(!resolved.is_exhausted(2));
        assert!(resolved.is_exhausted(3));
        assert!(!Range::full().resolve_forward().unwrap().is_exhausted(1_000_000));
    }

    fn forward_range() -> impl Strategy<Value = Range> {
        (
            proptest::option::of(0i64..12),
            proptest::option::of(0i64..24),
            proptest::option::of(1i64..4),
        )
            .prop_map(|(start, stop, step)| Range::new(start, stop, step).unwrap())
    }

    proptest! {
        #[test]
        fn compose_matches_successive_application(
            a in forward_range(),
            b in forward_range(),
            len in 0u64..40,
        ) {
            let composed = a.compose(&b).unwrap();
            prop_assert_eq!(
                apply_successively(&[a, b], len),
                composed.indices(len).collect::<Vec<_>>()
            );
        }

        #[test]
        fn compose_is_associative(
            a in forward_range(),
            b in forward_range(),
            c in forward_range(),
            len in 0u64..40,
        ) {
            let left = a.compose(&b).unwrap().compose(&c).unwrap();
            let right = a.compose(&b.compose(&c).unwrap()).unwrap();
            let expected = apply_successively(&[a, b, c], len);

            prop_assert_eq!(&expected, &left.indices(len).collect::<Vec<_>>());
            prop_assert_eq!(&expected, &right.indices(len).collect::<Vec<_>>());
        }
    }
}
