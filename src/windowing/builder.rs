//! Dense tensor materialization
//!
//! Layout:
//! - each input group: `(examples, lookback, num_inputs)`, rows oldest to newest
//! - outputs: `(examples, num_outputs, forecast_length)`

use super::indexer::WindowIndexer;
use super::intervals::Eligibility;
use crate::config::WindowConfig;
use crate::data::TimeTable;
use crate::error::{Result, WindowError};
use ndarray::{Array3, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, warn};

/// Examples built from a list of anchors, aligned example-for-example
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedExamples {
    /// One array per input group, primary group first
    pub inputs: Vec<Array3<f64>>,
    /// Output horizons
    pub outputs: Array3<f64>,
    /// Anchor of each example, in tensor order
    pub anchors: Vec<usize>,
}

impl WindowedExamples {
    /// Number of examples
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Primary input group
    pub fn x(&self) -> &Array3<f64> {
        &self.inputs[0]
    }

    pub fn y(&self) -> &Array3<f64> {
        &self.outputs
    }

    /// Reorder or subset examples by position, keeping anchors aligned
    pub fn select(&self, order: &[usize]) -> Result<Self> {
        if let Some(&bad) = order.iter().find(|&&i| i >= self.len()) {
            return Err(WindowError::ShapeMismatch {
                expected: format!("example index below {}", self.len()),
                actual: bad.to_string(),
            });
        }

        Ok(Self {
            inputs: self.inputs.iter().map(|x| x.select(Axis(0), order)).collect(),
            outputs: self.outputs.select(Axis(0), order),
            anchors: order.iter().map(|&i| self.anchors[i]).collect(),
        })
    }

    /// Seeded shuffle of the example order
    pub fn shuffled(&self, seed: u64) -> Self {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
        Self {
            inputs: self.inputs.iter().map(|x| x.select(Axis(0), &order)).collect(),
            outputs: self.outputs.select(Axis(0), &order),
            anchors: order.iter().map(|&i| self.anchors[i]).collect(),
        }
    }

    /// Drop trailing examples so the count is a whole number of batches
    pub fn truncate_to_batches(self, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(WindowError::InvalidConfig("batch_size must be >= 1".to_string()));
        }
        let keep = self.len() - self.len() % batch_size;
        if keep == self.len() {
            return Ok(self);
        }
        if keep == 0 {
            return Err(WindowError::InsufficientData(format!(
                "{} examples do not fill a batch of {}",
                self.len(),
                batch_size
            )));
        }

        warn!(
            dropped = self.len() - keep,
            batch_size,
            "Truncating examples to whole batches"
        );
        let order: Vec<usize> = (0..keep).collect();
        self.select(&order)
    }
}

/// Gathers window values for anchors into dense arrays
#[derive(Debug, Clone)]
pub struct TensorBuilder {
    indexer: WindowIndexer,
    group_columns: Vec<Vec<usize>>,
    output_columns: Vec<usize>,
    table_columns: Vec<String>,
}

impl TensorBuilder {
    /// Resolve column offsets once for `table`
    pub fn new(table: &TimeTable, config: &WindowConfig) -> Result<Self> {
        let group_columns = config
            .input_groups()
            .iter()
            .map(|g| table.resolve_columns(&g.columns))
            .collect::<Result<Vec<_>>>()?;
        let output_columns = table.resolve_columns(&config.outputs)?;

        Ok(Self {
            indexer: WindowIndexer::from_config(config),
            group_columns,
            output_columns,
            table_columns: table.columns().to_vec(),
        })
    }

    pub fn indexer(&self) -> &WindowIndexer {
        &self.indexer
    }

    /// Build examples for `anchors`, in the given order.
    ///
    /// Every anchor is validated first, so either all examples are produced
    /// or none.
    pub fn build(
        &self,
        table: &TimeTable,
        eligibility: &Eligibility,
        anchors: &[usize],
    ) -> Result<WindowedExamples> {
        if table.columns() != self.table_columns.as_slice() {
            return Err(WindowError::ShapeMismatch {
                expected: format!("table columns {:?}", self.table_columns),
                actual: format!("{:?}", table.columns()),
            });
        }
        if eligibility.table_len() != table.len() {
            return Err(WindowError::ShapeMismatch {
                expected: format!("eligibility over {} rows", table.len()),
                actual: eligibility.table_len().to_string(),
            });
        }
        for &anchor in anchors {
            self.indexer.check_anchor(eligibility, anchor)?;
        }

        let geometry = self.indexer.geometry();
        let n = anchors.len();

        let inputs = self
            .group_columns
            .iter()
            .enumerate()
            .map(|(g, columns)| {
                let lookback = geometry.groups[g].lookback;
                let flat: Vec<f64> = anchors
                    .par_iter()
                    .flat_map_iter(|&anchor| {
                        self.indexer
                            .input_positions(g, anchor)
                            .flat_map(move |row| columns.iter().map(move |&c| table.value(row, c)))
                    })
                    .collect();
                Array3::from_shape_vec((n, lookback, columns.len()), flat)
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let forecast_length = geometry.forecast_length;
        let flat: Vec<f64> = anchors
            .par_iter()
            .flat_map_iter(|&anchor| {
                let horizon = self.indexer.output_positions(anchor);
                self.output_columns
                    .iter()
                    .flat_map(move |&c| horizon.clone().map(move |row| table.value(row, c)))
            })
            .collect();
        let outputs = Array3::from_shape_vec((n, self.output_columns.len(), forecast_length), flat)?;

        let non_finite = inputs
            .iter()
            .map(|x| x.iter().filter(|v| !v.is_finite()).count())
            .sum::<usize>()
            + outputs.iter().filter(|v| !v.is_finite()).count();
        if non_finite > 0 {
            warn!(non_finite, "Built windows contain non-finite values; consider intervals to exclude them");
        }

        debug!(
            examples = n,
            groups = inputs.len(),
            outputs = ?outputs.shape(),
            "Materialized example tensors"
        );

        Ok(WindowedExamples {
            inputs,
            outputs,
            anchors: anchors.to_vec(),
        })
    }
}
