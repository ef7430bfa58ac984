//! Anchor enumeration and window position arithmetic
//!
//! An anchor is the row position of the last row of the primary input window.
//! For a group with `lookback` L and stride s the input positions are
//! `anchor - (L-1)*s, ..., anchor - s, anchor`; the output positions are
//! `anchor + forecast_step, ..., anchor + forecast_step + forecast_length - 1`.

use super::intervals::Eligibility;
use crate::config::WindowConfig;
use crate::error::{Result, WindowError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Half-open `[start, end)` restriction on row positions.
///
/// Bounds intersect interval eligibility rather than replacing it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowBounds {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl RowBounds {
    /// No restriction
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn from_start(start: usize) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn until(end: usize) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    /// Concrete `(start, end)` for a table of `len` rows
    pub fn resolve(&self, len: usize) -> Result<(usize, usize)> {
        let start = self.start.unwrap_or(0);
        let end = self.end.unwrap_or(len);
        if end > len {
            return Err(WindowError::InvalidConfig(format!(
                "bound end {} exceeds table of {} rows",
                end, len
            )));
        }
        if start >= end {
            return Err(WindowError::InvalidConfig(format!(
                "bound start {} must be below end {}",
                start, end
            )));
        }
        Ok((start, end))
    }
}

/// Lookback and stride of one input group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupGeometry {
    pub name: String,
    pub lookback: usize,
    pub input_step: usize,
}

impl GroupGeometry {
    /// Rows between the first sampled input row and the anchor
    pub fn span(&self) -> usize {
        self.lookback.saturating_sub(1).saturating_mul(self.input_step)
    }
}

/// Shape of every example window relative to its anchor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub groups: Vec<GroupGeometry>,
    pub forecast_step: usize,
    pub forecast_length: usize,
}

impl WindowGeometry {
    /// Derive from a validated configuration
    pub fn from_config(config: &WindowConfig) -> Self {
        Self {
            groups: config
                .input_groups()
                .into_iter()
                .map(|g| GroupGeometry {
                    name: g.name,
                    lookback: g.lookback,
                    input_step: g.input_step,
                })
                .collect(),
            forecast_step: config.forecast_step,
            forecast_length: config.forecast_length,
        }
    }

    /// Rows an anchor reaches backwards across all input groups
    pub fn back_reach(&self) -> usize {
        self.groups.iter().map(GroupGeometry::span).max().unwrap_or(0)
    }

    /// Rows an anchor reaches forwards through the output horizon
    pub fn forward_reach(&self) -> usize {
        self.forecast_step
            .saturating_add(self.forecast_length.saturating_sub(1))
    }

    /// Rows covered by one window, or `None` when it does not fit in `usize`
    pub fn checked_extent(&self) -> Option<usize> {
        let back = self
            .groups
            .iter()
            .map(|g| g.lookback.checked_sub(1)?.checked_mul(g.input_step))
            .try_fold(0usize, |acc, span| span.map(|s| acc.max(s)))?;
        let forward = self
            .forecast_step
            .checked_add(self.forecast_length.checked_sub(1)?)?;
        back.checked_add(forward)?.checked_add(1)
    }
}

/// Enumerates valid anchors and the window positions they imply
#[derive(Debug, Clone)]
pub struct WindowIndexer {
    geometry: WindowGeometry,
}

impl WindowIndexer {
    pub fn new(geometry: WindowGeometry) -> Self {
        Self { geometry }
    }

    pub fn from_config(config: &WindowConfig) -> Self {
        Self::new(WindowGeometry::from_config(config))
    }

    pub fn geometry(&self) -> &WindowGeometry {
        &self.geometry
    }

    /// Input positions of group `group` for `anchor`, oldest first
    pub fn input_positions(&self, group: usize, anchor: usize) -> impl Iterator<Item = usize> {
        let g = &self.geometry.groups[group];
        let (first, step) = (anchor - g.span(), g.input_step);
        (0..g.lookback).map(move |k| first + k * step)
    }

    /// Output positions for `anchor`
    pub fn output_positions(&self, anchor: usize) -> std::ops::Range<usize> {
        let first = anchor + self.geometry.forecast_step;
        first..first + self.geometry.forecast_length
    }

    /// All valid anchors in ascending order.
    ///
    /// An anchor is valid when its whole window, from the earliest input row
    /// of any group to the last output row, lies inside the table, inside
    /// `bounds`, and inside a single eligible interval.
    pub fn anchors(&self, eligibility: &Eligibility, bounds: RowBounds) -> Result<Vec<usize>> {
        if eligibility.table_len() == 0 {
            return Err(WindowError::InsufficientData("table has no rows".to_string()));
        }
        let (lo, hi) = bounds.resolve(eligibility.table_len())?;
        let extent = self.geometry.checked_extent().ok_or_else(|| {
            WindowError::InvalidConfig("window extent overflows the row index".to_string())
        })?;
        let back = self.geometry.back_reach();
        let forward = self.geometry.forward_reach();

        let mut anchors = Vec::new();
        for r in eligibility.intervals() {
            let start = r.start.max(lo);
            let end = r.end.min(hi);
            // the window needs back + forward + 1 consecutive rows
            if end <= start || end - start < extent {
                continue;
            }
            anchors.extend(start + back..end - forward);
        }

        debug!(
            anchors = anchors.len(),
            intervals = eligibility.intervals().len(),
            lo,
            hi,
            "Enumerated window anchors"
        );

        if anchors.is_empty() {
            return Err(WindowError::InsufficientData(format!(
                "no anchor fits a window reaching {} rows back and {} rows forward within rows [{}, {})",
                back, forward, lo, hi
            )));
        }
        Ok(anchors)
    }

    /// Check a caller-supplied anchor against table bounds and eligibility
    pub fn check_anchor(&self, eligibility: &Eligibility, anchor: usize) -> Result<()> {
        let back = self.geometry.back_reach();
        let forward = self.geometry.forward_reach();

        if anchor < back {
            return Err(WindowError::InvalidAnchor {
                anchor,
                reason: format!("input window needs {} earlier rows", back),
            });
        }
        if anchor
            .checked_add(forward)
            .map_or(true, |last| last >= eligibility.table_len())
        {
            return Err(WindowError::InvalidAnchor {
                anchor,
                reason: format!(
                    "output horizon ends past the table of {} rows",
                    eligibility.table_len()
                ),
            });
        }
        if !eligibility.same_interval(anchor - back, anchor + forward) {
            return Err(WindowError::InvalidAnchor {
                anchor,
                reason: "window is not inside a single eligible interval".to_string(),
            });
        }
        Ok(())
    }
}
