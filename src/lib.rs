//! seq-windows - Windowed supervised-learning examples from time series
//!
//! This crate turns a datetime-indexed multivariate table into dense
//! `(X, Y)` tensors for sequence models, while keeping track of which source
//! row every example came from.
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - Source table, table sources (polars), column scaling
//! - [`config`] - Window, split and input-group configuration
//!
//! ## Windowing
//! - [`windowing`] - Interval filter, window indexer, tensor builder
//! - [`split`] - Train/test partitioning of the anchor pool
//! - [`deindex`] - Mapping example tensors back to source rows
//!
//! ## Façade
//! - [`pipeline`] - [`SequenceDataset`](pipeline::SequenceDataset) tying the above together

// Core error handling
pub mod error;

// Data
pub mod config;
pub mod data;

// Windowing
pub mod windowing;
pub mod split;
pub mod deindex;

// Façade
pub mod pipeline;

pub use error::{Result, WindowError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, WindowError};

    // Configuration
    pub use crate::config::{InputGroupConfig, SplitConfig, SplitMethod, WindowConfig};

    // Data
    pub use crate::data::{DataFrameSource, Scaler, ScalerType, TableSource, TimeTable};

    // Windowing
    pub use crate::windowing::{
        Eligibility, Interval, IntervalSet, RowBounds, TensorBuilder, WindowIndexer,
        WindowedExamples,
    };

    // Splitting
    pub use crate::split::{SplitIndices, SplitManager, Subset};

    // Deindexing
    pub use crate::deindex::{DeindexOptions, DeindexedFrame, Deindexifier, RowKey};

    // Façade
    pub use crate::pipeline::SequenceDataset;
}
