//! Mapping example tensors back to source rows
//!
//! Example tensors may be shuffled, split or truncated before they reach this
//! module. The anchor stored for each example identifies its source row, so
//! each example becomes one timestamp-keyed row holding the last input-window
//! row of the primary group followed by its output horizon.

use crate::config::WindowConfig;
use crate::data::{Scaler, TimeTable};
use crate::error::{Result, WindowError};
use crate::windowing::{Eligibility, WindowIndexer};
use chrono::NaiveDateTime;
use ndarray::{Array2, Array3, ArrayView1, Axis};
use polars::prelude::*;
use tracing::debug;

/// Options for [`Deindexifier::deindexify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeindexOptions {
    /// Order rows by their source position
    pub sort: bool,
    /// Key rows by timestamp instead of row position
    pub use_datetime_index: bool,
}

impl Default for DeindexOptions {
    fn default() -> Self {
        Self {
            sort: true,
            use_datetime_index: true,
        }
    }
}

/// Row key of a reconstructed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowKey {
    Timestamp(NaiveDateTime),
    Position(usize),
}

/// Table-like reconstruction of examples
#[derive(Debug, Clone, PartialEq)]
pub struct DeindexedFrame {
    pub keys: Vec<RowKey>,
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl DeindexedFrame {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Values of a named column
    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let j = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| WindowError::ColumnNotFound(name.to_string()))?;
        Ok(self.values.column(j))
    }

    /// Whether keys are non-decreasing
    pub fn is_sorted(&self) -> bool {
        self.keys.windows(2).all(|w| w[0] <= w[1])
    }

    /// Rows sorted by key (stable)
    pub fn sorted(&self) -> Self {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| self.keys[a].cmp(&self.keys[b]));
        self.take(&order)
    }

    /// Rows with timestamp keys inside `[start, end]`
    pub fn between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        let mut order = Vec::new();
        for (i, key) in self.keys.iter().enumerate() {
            match key {
                RowKey::Timestamp(ts) if *ts >= start && *ts <= end => order.push(i),
                RowKey::Timestamp(_) => {}
                RowKey::Position(_) => {
                    return Err(WindowError::InvalidConfig(
                        "timestamp range lookup needs a datetime-keyed frame".to_string(),
                    ))
                }
            }
        }
        Ok(self.take(&order))
    }

    fn take(&self, order: &[usize]) -> Self {
        Self {
            keys: order.iter().map(|&i| self.keys[i]).collect(),
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), order),
        }
    }

    /// Convert to a polars `DataFrame` with the keys in an `index` column
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.columns.len() + 1);

        let index = match self.keys.first() {
            Some(RowKey::Position(_)) => {
                let positions: Vec<u64> = self
                    .keys
                    .iter()
                    .map(|k| match k {
                        RowKey::Position(p) => Ok(*p as u64),
                        RowKey::Timestamp(_) => Err(mixed_keys()),
                    })
                    .collect::<Result<_>>()?;
                Series::new("index".into(), positions)
            }
            _ => {
                let stamps: Vec<NaiveDateTime> = self
                    .keys
                    .iter()
                    .map(|k| match k {
                        RowKey::Timestamp(ts) => Ok(*ts),
                        RowKey::Position(_) => Err(mixed_keys()),
                    })
                    .collect::<Result<_>>()?;
                Series::new("index".into(), stamps)
            }
        };
        columns.push(index.into());

        for (j, name) in self.columns.iter().enumerate() {
            let data: Vec<f64> = self.values.column(j).to_vec();
            columns.push(Series::new(name.as_str().into(), data).into());
        }

        Ok(DataFrame::new(columns)?)
    }
}

fn mixed_keys() -> WindowError {
    WindowError::DataError("frame mixes timestamp and position keys".to_string())
}

/// Rebuilds source-aligned rows from example tensors and their anchors
pub struct Deindexifier<'a> {
    table: &'a TimeTable,
    eligibility: &'a Eligibility,
    indexer: WindowIndexer,
    inputs: Vec<String>,
    outputs: Vec<String>,
    forecast_length: usize,
    scaler: Option<&'a Scaler>,
}

impl<'a> Deindexifier<'a> {
    pub fn new(table: &'a TimeTable, eligibility: &'a Eligibility, config: &WindowConfig) -> Self {
        Self {
            table,
            eligibility,
            indexer: WindowIndexer::from_config(config),
            inputs: config.inputs.clone(),
            outputs: config.outputs.clone(),
            forecast_length: config.forecast_length,
            scaler: None,
        }
    }

    /// Report values in original units using a fitted scaler
    pub fn with_scaler(mut self, scaler: &'a Scaler) -> Self {
        self.scaler = Some(scaler);
        self
    }

    /// Column names of the reconstructed frame for the given parts
    pub fn column_names(&self, with_inputs: bool, with_outputs: bool) -> Vec<String> {
        let mut names = Vec::new();
        if with_inputs {
            names.extend(self.inputs.iter().cloned());
        }
        if with_outputs {
            for name in &self.outputs {
                let base = if with_inputs && self.inputs.contains(name) {
                    format!("{}_target", name)
                } else {
                    name.clone()
                };
                if self.forecast_length == 1 {
                    names.push(base);
                } else {
                    names.extend((0..self.forecast_length).map(|k| format!("{}_{}", base, k)));
                }
            }
        }
        names
    }

    /// Reconstruct rows for examples in their current order.
    ///
    /// `inputs` is the primary input tensor `(examples, lookback, num_inputs)`
    /// and `outputs` a target or prediction tensor
    /// `(examples, num_outputs, forecast_length)`; at least one is required.
    /// Both leading dimensions must equal `anchors.len()`.
    pub fn deindexify(
        &self,
        inputs: Option<&Array3<f64>>,
        outputs: Option<&Array3<f64>>,
        anchors: &[usize],
        options: DeindexOptions,
    ) -> Result<DeindexedFrame> {
        if inputs.is_none() && outputs.is_none() {
            return Err(WindowError::InvalidConfig(
                "deindexify needs input or output tensors".to_string(),
            ));
        }
        if let Some(x) = inputs {
            self.check_shape("inputs", x, [Some(anchors.len()), None, Some(self.inputs.len())])?;
        }
        if let Some(y) = outputs {
            self.check_shape(
                "outputs",
                y,
                [
                    Some(anchors.len()),
                    Some(self.outputs.len()),
                    Some(self.forecast_length),
                ],
            )?;
        }
        for &anchor in anchors {
            self.indexer.check_anchor(self.eligibility, anchor)?;
        }

        let columns = self.column_names(inputs.is_some(), outputs.is_some());
        let mut values = Array2::<f64>::zeros((anchors.len(), columns.len()));

        for i in 0..anchors.len() {
            let mut row = values.row_mut(i);
            let mut j = 0;
            if let Some(x) = inputs {
                let last = x.shape()[1] - 1;
                for c in 0..self.inputs.len() {
                    row[j] = x[[i, last, c]];
                    j += 1;
                }
            }
            if let Some(y) = outputs {
                for o in 0..self.outputs.len() {
                    for h in 0..self.forecast_length {
                        row[j] = y[[i, o, h]];
                        j += 1;
                    }
                }
            }
        }

        if let Some(scaler) = self.scaler {
            self.unscale(scaler, &mut values, inputs.is_some(), outputs.is_some())?;
        }

        let keys = anchors
            .iter()
            .map(|&a| {
                if options.use_datetime_index {
                    self.table
                        .timestamp(a)
                        .map(RowKey::Timestamp)
                        .ok_or_else(|| WindowError::InvalidAnchor {
                            anchor: a,
                            reason: "no such row".to_string(),
                        })
                } else {
                    Ok(RowKey::Position(a))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let frame = DeindexedFrame {
            keys,
            columns,
            values,
        };

        debug!(rows = frame.len(), sort = options.sort, "Deindexified examples");

        Ok(if options.sort { frame.sorted() } else { frame })
    }

    /// Reconstruct model predictions shaped like the output tensor
    pub fn deindexify_predictions(
        &self,
        predictions: &Array3<f64>,
        anchors: &[usize],
        options: DeindexOptions,
    ) -> Result<DeindexedFrame> {
        self.deindexify(None, Some(predictions), anchors, options)
    }

    fn check_shape(&self, what: &str, tensor: &Array3<f64>, expected: [Option<usize>; 3]) -> Result<()> {
        let shape = tensor.shape();
        let ok = shape[1] > 0
            && shape
                .iter()
                .zip(expected.iter())
                .all(|(&got, want)| want.map_or(true, |w| w == got));
        if ok {
            Ok(())
        } else {
            Err(WindowError::ShapeMismatch {
                expected: format!("{} of shape {:?}", what, expected),
                actual: format!("{:?}", shape),
            })
        }
    }

    fn unscale(
        &self,
        scaler: &Scaler,
        values: &mut Array2<f64>,
        with_inputs: bool,
        with_outputs: bool,
    ) -> Result<()> {
        let mut sources: Vec<&str> = Vec::new();
        if with_inputs {
            sources.extend(self.inputs.iter().map(String::as_str));
        }
        if with_outputs {
            for name in &self.outputs {
                sources.extend(std::iter::repeat(name.as_str()).take(self.forecast_length));
            }
        }

        for (j, name) in sources.into_iter().enumerate() {
            let mut col = values.column(j).to_vec();
            scaler.inverse_transform_column(name, &mut col)?;
            values.column_mut(j).assign(&ArrayView1::from(&col));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windowing::{IntervalSet, RowBounds, TensorBuilder};
    use chrono::{Duration, NaiveDate};

    fn table(n: usize) -> TimeTable {
        let start = NaiveDate::from_ymd_opt(2011, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let ts = (0..n).map(|i| start + Duration::days(i as i64)).collect();
        TimeTable::from_columns(
            ts,
            vec![
                ("a".to_string(), (0..n).map(|i| i as f64).collect()),
                ("b".to_string(), (0..n).map(|i| 1000.0 + i as f64).collect()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_roundtrip_after_shuffle() {
        let table = table(40);
        let config = WindowConfig::new(["a"], ["b"]).with_lookback(3);
        let eligibility = IntervalSet::all().resolve(table.len()).unwrap();
        let builder = TensorBuilder::new(&table, &config).unwrap();
        let anchors = builder.indexer().anchors(&eligibility, RowBounds::all()).unwrap();
        let examples = builder.build(&table, &eligibility, &anchors).unwrap().shuffled(5);

        let frame = Deindexifier::new(&table, &eligibility, &config)
            .deindexify(Some(examples.x()), Some(examples.y()), &examples.anchors, DeindexOptions::default())
            .unwrap();

        assert_eq!(frame.len(), anchors.len());
        assert_eq!(frame.columns, vec!["a".to_string(), "b".to_string()]);
        assert!(frame.is_sorted());
        for (i, &a) in anchors.iter().enumerate() {
            assert_eq!(frame.keys[i], RowKey::Timestamp(table.timestamp(a).unwrap()));
            assert_eq!(frame.values[[i, 0]], a as f64);
            assert_eq!(frame.values[[i, 1]], 1000.0 + a as f64);
        }
    }

    #[test]
    fn test_unsorted_positions() {
        let table = table(20);
        let config = WindowConfig::new(["a"], ["b"]).with_lookback(2);
        let eligibility = IntervalSet::all().resolve(table.len()).unwrap();
        let builder = TensorBuilder::new(&table, &config).unwrap();
        let examples = builder.build(&table, &eligibility, &[9, 3, 5]).unwrap();

        let options = DeindexOptions {
            sort: false,
            use_datetime_index: false,
        };
        let frame = Deindexifier::new(&table, &eligibility, &config)
            .deindexify(Some(examples.x()), None, &examples.anchors, options)
            .unwrap();
        assert_eq!(
            frame.keys,
            vec![RowKey::Position(9), RowKey::Position(3), RowKey::Position(5)]
        );
        assert_eq!(frame.columns, vec!["a".to_string()]);
        assert!(frame.between(table.timestamps()[0], table.timestamps()[5]).is_err());
    }

    #[test]
    fn test_shape_mismatch() {
        let table = table(20);
        let config = WindowConfig::new(["a"], ["b"]).with_lookback(2);
        let eligibility = IntervalSet::all().resolve(table.len()).unwrap();
        let builder = TensorBuilder::new(&table, &config).unwrap();
        let examples = builder.build(&table, &eligibility, &[4, 5, 6]).unwrap();

        let result = Deindexifier::new(&table, &eligibility, &config).deindexify(
            None,
            Some(examples.y()),
            &[4, 5],
            DeindexOptions::default(),
        );
        assert!(matches!(result, Err(WindowError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_multi_horizon_columns() {
        let table = table(20);
        let config = WindowConfig::new(["a", "b"], ["b"])
            .with_lookback(2)
            .with_forecast_length(2);
        let eligibility = IntervalSet::all().resolve(table.len()).unwrap();
        let deindexifier = Deindexifier::new(&table, &eligibility, &config);
        assert_eq!(
            deindexifier.column_names(true, true),
            vec!["a", "b", "b_target_0", "b_target_1"]
        );
        assert_eq!(deindexifier.column_names(false, true), vec!["b_0", "b_1"]);
    }

    #[test]
    fn test_excluded_anchor_rejected() {
        let table = table(30);
        let config = WindowConfig::new(["a"], ["b"]).with_lookback(2);
        let eligibility = IntervalSet::from_ranges([(0, 10), (20, 30)])
            .resolve(table.len())
            .unwrap();
        let y = Array3::<f64>::zeros((1, 1, 1));
        let result = Deindexifier::new(&table, &eligibility, &config).deindexify(
            None,
            Some(&y),
            &[15],
            DeindexOptions::default(),
        );
        assert!(matches!(result, Err(WindowError::InvalidAnchor { anchor: 15, .. })));
    }

    #[test]
    fn test_to_dataframe() {
        let table = table(10);
        let config = WindowConfig::new(["a"], ["b"]).with_lookback(2);
        let eligibility = IntervalSet::all().resolve(table.len()).unwrap();
        let builder = TensorBuilder::new(&table, &config).unwrap();
        let examples = builder.build(&table, &eligibility, &[2, 3]).unwrap();

        let df = Deindexifier::new(&table, &eligibility, &config)
            .deindexify(Some(examples.x()), Some(examples.y()), &examples.anchors, DeindexOptions::default())
            .unwrap()
            .to_dataframe()
            .unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 3);
        let b = df.column("b").unwrap().as_materialized_series().f64().unwrap();
        assert_eq!(b.get(1), Some(1003.0));
    }
}
