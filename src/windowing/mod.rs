//! Windowing module
//!
//! Turns a table into supervised examples:
//! - Interval resolution (which rows may take part in a window)
//! - Anchor enumeration under lookback, stride and forecast offsets
//! - Dense tensor materialization for one or more input groups

mod builder;
mod indexer;
mod intervals;

pub use builder::{TensorBuilder, WindowedExamples};
pub use indexer::{GroupGeometry, RowBounds, WindowGeometry, WindowIndexer};
pub use intervals::{Eligibility, Interval, IntervalSet};
