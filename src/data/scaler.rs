//! Column scaling applied before windowing

use super::TimeTable;
use crate::error::{Result, WindowError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// No scaling
    None,
}

/// Parameters for a fitted column
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean or min
    scale: f64,  // std or range
}

/// Per-column feature scaler keyed by column name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: HashMap<String, ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: HashMap::new(),
            is_fitted: false,
        }
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    /// Fit on every column of the table. Non-finite values are skipped.
    pub fn fit(&mut self, table: &TimeTable) -> Result<&mut Self> {
        self.params.clear();
        for (j, name) in table.columns().iter().enumerate() {
            let finite: Vec<f64> = table
                .values()
                .column(j)
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .collect();
            self.params.insert(name.clone(), self.compute_params(&finite));
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Scale every fitted column of the table
    pub fn transform(&self, table: &TimeTable) -> Result<TimeTable> {
        if !self.is_fitted {
            return Err(WindowError::InvalidConfig("scaler not fitted".to_string()));
        }

        let mut values = table.values().clone();
        for (j, name) in table.columns().iter().enumerate() {
            if let Some(params) = self.params.get(name) {
                values
                    .column_mut(j)
                    .mapv_inplace(|v| (v - params.center) / params.scale);
            }
        }

        table.with_values(values)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, table: &TimeTable) -> Result<TimeTable> {
        self.fit(table)?;
        self.transform(table)
    }

    /// Map scaled values of a named column back to original units
    pub fn inverse_transform_column(&self, name: &str, values: &mut [f64]) -> Result<()> {
        if !self.is_fitted {
            return Err(WindowError::InvalidConfig("scaler not fitted".to_string()));
        }
        let params = self
            .params
            .get(name)
            .ok_or_else(|| WindowError::ColumnNotFound(name.to_string()))?;

        for v in values.iter_mut() {
            *v = *v * params.scale + params.center;
        }
        Ok(())
    }

    fn compute_params(&self, values: &[f64]) -> ScalerParams {
        match self.scaler_type {
            ScalerType::Standard if values.len() > 1 => {
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
                let std = var.sqrt();
                ScalerParams {
                    center: mean,
                    scale: if std == 0.0 { 1.0 } else { std },
                }
            }
            ScalerType::Standard => ScalerParams {
                center: values.first().copied().unwrap_or(0.0),
                scale: 1.0,
            },
            ScalerType::MinMax if values.is_empty() => ScalerParams {
                center: 0.0,
                scale: 1.0,
            },
            ScalerType::MinMax => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                ScalerParams {
                    center: min,
                    scale: if range == 0.0 { 1.0 } else { range },
                }
            }
            ScalerType::None => ScalerParams {
                center: 0.0,
                scale: 1.0,
            },
        }
    }
}
