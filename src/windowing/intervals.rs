//! Eligible-row intervals

use crate::error::{Result, WindowError};
use serde::{Deserialize, Serialize};

/// Half-open position range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Interval {
    pub start: usize,
    pub end: usize,
}

impl Interval {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl From<(usize, usize)> for Interval {
    fn from((start, end): (usize, usize)) -> Self {
        Self { start, end }
    }
}

/// A set of disjoint intervals. `None` means the whole table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalSet {
    ranges: Option<Vec<Interval>>,
}

impl IntervalSet {
    /// Every row is eligible
    pub fn all() -> Self {
        Self { ranges: None }
    }

    /// Only rows inside the given ranges are eligible
    pub fn from_ranges<I, R>(ranges: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Interval>,
    {
        Self {
            ranges: Some(ranges.into_iter().map(Into::into).collect()),
        }
    }

    /// Build from the optional config field
    pub fn from_config(intervals: Option<&[(usize, usize)]>) -> Self {
        match intervals {
            Some(ranges) => Self::from_ranges(ranges.iter().copied()),
            None => Self::all(),
        }
    }

    /// Resolve against a table of `len` rows.
    ///
    /// Ranges are sorted by start; empty, overlapping or out-of-bounds ranges
    /// are rejected.
    pub fn resolve(&self, len: usize) -> Result<Eligibility> {
        let mut ranges = match &self.ranges {
            None => {
                let whole = if len == 0 { Vec::new() } else { vec![Interval::new(0, len)] };
                return Ok(Eligibility::from_sorted(len, whole));
            }
            Some(ranges) => ranges.clone(),
        };
        ranges.sort();

        for r in &ranges {
            if r.is_empty() {
                return Err(WindowError::InvalidInterval(format!(
                    "empty range [{}, {})",
                    r.start, r.end
                )));
            }
            if r.end > len {
                return Err(WindowError::InvalidInterval(format!(
                    "range [{}, {}) exceeds table of {} rows",
                    r.start, r.end, len
                )));
            }
        }

        if let Some(w) = ranges.windows(2).find(|w| w[1].start < w[0].end) {
            return Err(WindowError::InvalidInterval(format!(
                "ranges [{}, {}) and [{}, {}) overlap",
                w[0].start, w[0].end, w[1].start, w[1].end
            )));
        }

        Ok(Eligibility::from_sorted(len, ranges))
    }
}

/// Per-row eligibility resolved from an [`IntervalSet`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    intervals: Vec<Interval>,
    membership: Vec<Option<u32>>,
}

impl Eligibility {
    fn from_sorted(len: usize, intervals: Vec<Interval>) -> Self {
        let mut membership = vec![None; len];
        for (id, r) in intervals.iter().enumerate() {
            for slot in &mut membership[r.start..r.end] {
                *slot = Some(id as u32);
            }
        }
        Self {
            intervals,
            membership,
        }
    }

    /// Number of rows in the underlying table
    pub fn table_len(&self) -> usize {
        self.membership.len()
    }

    /// Sorted disjoint intervals
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Number of eligible rows
    pub fn len(&self) -> usize {
        self.intervals.iter().map(Interval::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted eligible row positions
    pub fn positions(&self) -> Vec<usize> {
        self.intervals.iter().flat_map(|r| r.start..r.end).collect()
    }

    pub fn contains(&self, pos: usize) -> bool {
        matches!(self.membership.get(pos), Some(Some(_)))
    }

    /// Whether both positions are eligible and inside the same interval
    pub fn same_interval(&self, a: usize, b: usize) -> bool {
        match (self.membership.get(a), self.membership.get(b)) {
            (Some(Some(x)), Some(Some(y))) => x == y,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_covers_table() {
        let eligibility = IntervalSet::all().resolve(5).unwrap();
        assert_eq!(eligibility.positions(), vec![0, 1, 2, 3, 4]);
        assert!(eligibility.same_interval(0, 4));
    }

    #[test]
    fn test_ranges_sorted_and_resolved() {
        let eligibility = IntervalSet::from_ranges([(6, 8), (0, 2)]).resolve(10).unwrap();
        assert_eq!(eligibility.positions(), vec![0, 1, 6, 7]);
        assert!(!eligibility.contains(2));
        assert!(!eligibility.same_interval(1, 6));
        assert_eq!(eligibility.intervals()[0], Interval::new(0, 2));
    }

    #[test]
    fn test_adjacent_ranges_stay_separate() {
        let eligibility = IntervalSet::from_ranges([(0, 5), (5, 10)]).resolve(10).unwrap();
        assert_eq!(eligibility.len(), 10);
        assert!(eligibility.same_interval(0, 4));
        assert!(!eligibility.same_interval(4, 5));
    }

    #[test]
    fn test_overlap_rejected() {
        let result = IntervalSet::from_ranges([(0, 5), (4, 8)]).resolve(10);
        assert!(matches!(result, Err(WindowError::InvalidInterval(_))));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let result = IntervalSet::from_ranges([(0, 11)]).resolve(10);
        assert!(matches!(result, Err(WindowError::InvalidInterval(_))));
    }

    #[test]
    fn test_empty_range_rejected() {
        let result = IntervalSet::from_ranges([(3, 3)]).resolve(10);
        assert!(matches!(result, Err(WindowError::InvalidInterval(_))));
    }
}
