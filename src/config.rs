//! Windowing configuration
//!
//! A single explicit record replaces per-call keyword options. Every field has
//! a documented default and unknown keys are rejected on deserialization.

use crate::data::{ScalerType, TimeTable};
use crate::error::{Result, WindowError};
use crate::windowing::WindowGeometry;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Name given to the input group built from `inputs`/`lookback`/`input_step`
pub const PRIMARY_GROUP: &str = "main";

/// How anchors are assigned to train and test subsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMethod {
    /// First `train_fraction` of anchors (by position) go to train
    Sequential,
    /// Anchors are shuffled with a seeded RNG before splitting
    Random,
}

/// Train/test split settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitConfig {
    /// Share of the anchor pool assigned to train, in (0, 1)
    pub train_fraction: f64,
    /// Split strategy
    pub method: SplitMethod,
    /// Seed for the random strategy
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.7,
            method: SplitMethod::Sequential,
            seed: 313,
        }
    }
}

impl SplitConfig {
    /// Sequential split with the given train fraction
    pub fn sequential(train_fraction: f64) -> Self {
        Self {
            train_fraction,
            method: SplitMethod::Sequential,
            ..Self::default()
        }
    }

    /// Random split with the given train fraction and seed
    pub fn random(train_fraction: f64, seed: u64) -> Self {
        Self {
            train_fraction,
            method: SplitMethod::Random,
            seed,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(WindowError::InvalidConfig(format!(
                "train_fraction must lie in (0, 1), got {}",
                self.train_fraction
            )));
        }
        Ok(())
    }
}

/// An auxiliary input group sharing the anchor of the primary window.
///
/// A static-feature input is a group with `lookback = 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputGroupConfig {
    pub name: String,
    pub columns: Vec<String>,
    pub lookback: usize,
    #[serde(default = "default_step")]
    pub input_step: usize,
}

fn default_step() -> usize {
    1
}

impl InputGroupConfig {
    /// Create a group with unit stride
    pub fn new(name: impl Into<String>, columns: Vec<String>, lookback: usize) -> Self {
        Self {
            name: name.into(),
            columns,
            lookback,
            input_step: 1,
        }
    }

    /// Set the stride between sampled rows
    pub fn with_input_step(mut self, input_step: usize) -> Self {
        self.input_step = input_step;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(WindowError::InvalidConfig(format!(
                "input group '{}' has no columns",
                self.name
            )));
        }
        if self.lookback == 0 || self.input_step == 0 {
            return Err(WindowError::InvalidConfig(format!(
                "input group '{}' needs lookback >= 1 and input_step >= 1",
                self.name
            )));
        }
        Ok(())
    }
}

/// Configuration for turning a table into windowed examples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    /// Input column names of the primary group
    pub inputs: Vec<String>,

    /// Output column names
    pub outputs: Vec<String>,

    /// Number of input rows per example
    pub lookback: usize,

    /// Stride between consecutive sampled input rows
    pub input_step: usize,

    /// Rows between the last input row and the first output row
    pub forecast_step: usize,

    /// Consecutive output rows per example
    pub forecast_length: usize,

    /// Disjoint `[start, end)` position ranges of eligible rows (None = whole table)
    pub intervals: Option<Vec<(usize, usize)>>,

    /// Extra input groups aligned example-for-example with the primary one
    pub aux_inputs: Vec<InputGroupConfig>,

    /// Train/test split settings
    pub split: SplitConfig,

    /// Truncate train/test tensors to whole batches of this size
    pub batch_size: Option<usize>,

    /// Normalization applied before windowing
    pub scaler: ScalerType,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            lookback: 1,
            input_step: 1,
            forecast_step: 0,
            forecast_length: 1,
            intervals: None,
            aux_inputs: Vec::new(),
            split: SplitConfig::default(),
            batch_size: None,
            scaler: ScalerType::None,
        }
    }
}

impl WindowConfig {
    /// Create a configuration for the given input and output columns
    pub fn new<I, O, S, T>(inputs: I, outputs: O) -> Self
    where
        I: IntoIterator<Item = S>,
        O: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Builder method to set the lookback
    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    /// Builder method to set the input stride
    pub fn with_input_step(mut self, input_step: usize) -> Self {
        self.input_step = input_step;
        self
    }

    /// Builder method to set the forecast offset
    pub fn with_forecast_step(mut self, forecast_step: usize) -> Self {
        self.forecast_step = forecast_step;
        self
    }

    /// Builder method to set the forecast horizon length
    pub fn with_forecast_length(mut self, forecast_length: usize) -> Self {
        self.forecast_length = forecast_length;
        self
    }

    /// Builder method to restrict eligible rows
    pub fn with_intervals(mut self, intervals: Vec<(usize, usize)>) -> Self {
        self.intervals = Some(intervals);
        self
    }

    /// Builder method to add an auxiliary input group
    pub fn with_aux_input(mut self, group: InputGroupConfig) -> Self {
        self.aux_inputs.push(group);
        self
    }

    /// Builder method to set the split settings
    pub fn with_split(mut self, split: SplitConfig) -> Self {
        self.split = split;
        self
    }

    /// Builder method to set the batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Builder method to set the scaler
    pub fn with_scaler(mut self, scaler: ScalerType) -> Self {
        self.scaler = scaler;
        self
    }

    /// Number of primary input columns
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output columns
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// All input groups in tensor order, the primary group first
    pub fn input_groups(&self) -> Vec<InputGroupConfig> {
        let mut groups = Vec::with_capacity(1 + self.aux_inputs.len());
        groups.push(InputGroupConfig {
            name: PRIMARY_GROUP.to_string(),
            columns: self.inputs.clone(),
            lookback: self.lookback,
            input_step: self.input_step,
        });
        groups.extend(self.aux_inputs.iter().cloned());
        groups
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(WindowError::InvalidConfig("no input columns".to_string()));
        }
        if self.outputs.is_empty() {
            return Err(WindowError::InvalidConfig("no output columns".to_string()));
        }
        if self.lookback == 0 {
            return Err(WindowError::InvalidConfig("lookback must be >= 1".to_string()));
        }
        if self.input_step == 0 {
            return Err(WindowError::InvalidConfig("input_step must be >= 1".to_string()));
        }
        if self.forecast_length == 0 {
            return Err(WindowError::InvalidConfig(
                "forecast_length must be >= 1".to_string(),
            ));
        }
        if self.batch_size == Some(0) {
            return Err(WindowError::InvalidConfig("batch_size must be >= 1".to_string()));
        }

        let mut names = vec![PRIMARY_GROUP];
        for group in &self.aux_inputs {
            group.validate()?;
            if names.contains(&group.name.as_str()) {
                return Err(WindowError::InvalidConfig(format!(
                    "duplicate input group name '{}'",
                    group.name
                )));
            }
            names.push(&group.name);
        }

        if WindowGeometry::from_config(self).checked_extent().is_none() {
            return Err(WindowError::InvalidConfig(
                "lookback, input_step and forecast reach overflow the row index".to_string(),
            ));
        }

        self.split.validate()
    }

    /// Fingerprint of this configuration applied to `table`.
    ///
    /// Split indices are tagged with it so a split produced under different
    /// parameters, intervals or data is never silently reused.
    pub fn fingerprint(&self, table: &TimeTable) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(self)?);
        hasher.update((table.len() as u64).to_le_bytes());
        for name in table.columns() {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
        }
        if let (Some(first), Some(last)) = (table.timestamps().first(), table.timestamps().last()) {
            hasher.update(first.and_utc().timestamp_millis().to_le_bytes());
            hasher.update(last.and_utc().timestamp_millis().to_le_bytes());
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WindowConfig::default();
        assert_eq!(config.lookback, 1);
        assert_eq!(config.input_step, 1);
        assert_eq!(config.forecast_step, 0);
        assert_eq!(config.forecast_length, 1);
        assert!(config.intervals.is_none());
        assert_eq!(config.split.method, SplitMethod::Sequential);
    }

    #[test]
    fn test_builder_pattern() {
        let config = WindowConfig::new(["a", "b"], ["c"])
            .with_lookback(7)
            .with_forecast_step(2)
            .with_forecast_length(3)
            .with_input_step(2)
            .with_split(SplitConfig::random(0.8, 7));

        assert_eq!(config.num_inputs(), 2);
        assert_eq!(config.num_outputs(), 1);
        assert_eq!(config.lookback, 7);
        assert_eq!(config.forecast_length, 3);
        assert_eq!(config.split.method, SplitMethod::Random);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_lookback() {
        let config = WindowConfig::new(["a"], ["b"]).with_lookback(0);
        assert!(matches!(config.validate(), Err(WindowError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_bad_fraction() {
        let config = WindowConfig::new(["a"], ["b"]).with_split(SplitConfig::sequential(1.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_group() {
        let config = WindowConfig::new(["a"], ["b"])
            .with_aux_input(InputGroupConfig::new("main", vec!["a".into()], 1));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overflowing_reach() {
        let json = r#"{"inputs": ["a"], "outputs": ["b"], "forecast_step": 18446744073709551615}"#;
        let config: WindowConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(config.validate(), Err(WindowError::InvalidConfig(_))));

        let config = WindowConfig::new(["a"], ["b"])
            .with_lookback(usize::MAX)
            .with_input_step(2);
        assert!(matches!(config.validate(), Err(WindowError::InvalidConfig(_))));
    }

    #[test]
    fn test_input_groups_order() {
        let config = WindowConfig::new(["a"], ["b"])
            .with_lookback(5)
            .with_aux_input(InputGroupConfig::new("static", vec!["c".into()], 1));
        let groups = config.input_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, PRIMARY_GROUP);
        assert_eq!(groups[0].lookback, 5);
        assert_eq!(groups[1].name, "static");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let json = r#"{"inputs": ["a"], "outputs": ["b"], "lookbak": 3}"#;
        assert!(serde_json::from_str::<WindowConfig>(json).is_err());

        let json = r#"{"inputs": ["a"], "outputs": ["b"], "lookback": 3,
                       "split": {"method": "random", "seed": 1}}"#;
        let config: WindowConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.lookback, 3);
        assert_eq!(config.split.method, SplitMethod::Random);
        assert_eq!(config.split.train_fraction, 0.7);
    }
}
