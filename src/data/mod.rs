//! Source data module
//!
//! Provides the datetime-indexed table consumed by the windowing code:
//! - `TimeTable` with strictly increasing timestamps and named numeric columns
//! - `TableSource` adapters (polars `DataFrame`)
//! - Optional column scaling with inverse mapping

mod scaler;
mod table;

pub use scaler::{Scaler, ScalerType};
pub use table::{DataFrameSource, TableSource, TimeTable};
