//! Datetime-indexed source table

use crate::error::{Result, WindowError};
use chrono::{DateTime, NaiveDateTime};
use ndarray::{Array2, ArrayView1};
use polars::prelude::*;
use std::collections::HashSet;

/// Ordered rows keyed by strictly increasing timestamps, with named numeric columns.
///
/// Values are stored row-major as `(rows, columns)`. `NaN` marks missing
/// values; they are never imputed, only excluded through intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeTable {
    timestamps: Vec<NaiveDateTime>,
    columns: Vec<String>,
    values: Array2<f64>,
}

impl TimeTable {
    /// Create a table, checking ordering, column uniqueness and shape
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        columns: Vec<String>,
        values: Array2<f64>,
    ) -> Result<Self> {
        if values.nrows() != timestamps.len() || values.ncols() != columns.len() {
            return Err(WindowError::ShapeMismatch {
                expected: format!("({}, {})", timestamps.len(), columns.len()),
                actual: format!("{:?}", values.shape()),
            });
        }

        if let Some(pos) = timestamps.windows(2).position(|w| w[0] >= w[1]) {
            return Err(WindowError::DataError(format!(
                "timestamps must be strictly increasing (row {} = {}, row {} = {})",
                pos,
                timestamps[pos],
                pos + 1,
                timestamps[pos + 1]
            )));
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(WindowError::DataError(format!("duplicate column '{}'", name)));
            }
        }

        Ok(Self {
            timestamps,
            columns,
            values,
        })
    }

    /// Create a table from named column vectors
    pub fn from_columns(
        timestamps: Vec<NaiveDateTime>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self> {
        let n_rows = timestamps.len();
        let n_cols = columns.len();
        let mut values = Array2::<f64>::zeros((n_rows, n_cols));
        let mut names = Vec::with_capacity(n_cols);

        for (j, (name, data)) in columns.into_iter().enumerate() {
            if data.len() != n_rows {
                return Err(WindowError::ShapeMismatch {
                    expected: format!("{} values in column '{}'", n_rows, name),
                    actual: data.len().to_string(),
                });
            }
            values.column_mut(j).assign(&ArrayView1::from(&data));
            names.push(name);
        }

        Self::new(timestamps, names, values)
    }

    /// Same timestamps and columns, different values
    pub fn with_values(&self, values: Array2<f64>) -> Result<Self> {
        Self::new(self.timestamps.clone(), self.columns.clone(), values)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Timestamp of a row position
    pub fn timestamp(&self, pos: usize) -> Option<NaiveDateTime> {
        self.timestamps.get(pos).copied()
    }

    /// Value at a row position and column offset
    #[inline]
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.values[[row, col]]
    }

    /// Offset of a named column
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| WindowError::ColumnNotFound(name.to_string()))
    }

    /// Resolve names to offsets once, so hot loops only index
    pub fn resolve_columns(&self, names: &[String]) -> Result<Vec<usize>> {
        names.iter().map(|n| self.column_index(n)).collect()
    }

    /// Row position holding exactly this timestamp
    pub fn position_of(&self, ts: NaiveDateTime) -> Option<usize> {
        self.timestamps.binary_search(&ts).ok()
    }

    /// Row positions whose timestamps fall in `[start, end]`
    pub fn positions_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> std::ops::Range<usize> {
        let lo = self.timestamps.partition_point(|t| *t < start);
        let hi = self.timestamps.partition_point(|t| *t <= end);
        lo..hi.max(lo)
    }
}

/// Supplier of source tables
pub trait TableSource {
    /// Names of the value columns the source can provide
    fn column_names(&self) -> Vec<String>;

    /// Materialize the table
    fn load(&self) -> Result<TimeTable>;
}

impl TableSource for TimeTable {
    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn load(&self) -> Result<TimeTable> {
        Ok(self.clone())
    }
}

/// Table source over a polars `DataFrame`.
///
/// The time column may be a `Datetime` of any unit or an `Int64` of epoch
/// milliseconds. Every other column is cast to `Float64`; nulls become `NaN`.
pub struct DataFrameSource {
    df: DataFrame,
    time_column: String,
}

impl DataFrameSource {
    pub fn new(df: DataFrame, time_column: impl Into<String>) -> Self {
        Self {
            df,
            time_column: time_column.into(),
        }
    }

    fn load_timestamps(&self) -> Result<Vec<NaiveDateTime>> {
        let column = self
            .df
            .column(&self.time_column)
            .map_err(|_| WindowError::ColumnNotFound(self.time_column.clone()))?;
        let series = column.as_materialized_series();

        let unit = match series.dtype() {
            DataType::Datetime(unit, _) => *unit,
            DataType::Int64 => TimeUnit::Milliseconds,
            other => {
                return Err(WindowError::DataError(format!(
                    "time column '{}' has unsupported type {}",
                    self.time_column, other
                )))
            }
        };

        let raw = series.cast(&DataType::Int64)?;
        raw.i64()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.and_then(|v| match unit {
                    TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v)),
                    TimeUnit::Microseconds => DateTime::from_timestamp_micros(v),
                    TimeUnit::Milliseconds => DateTime::from_timestamp_millis(v),
                })
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| {
                    WindowError::DataError(format!(
                        "missing or out-of-range timestamp at row {}",
                        row
                    ))
                })
            })
            .collect()
    }
}

impl TableSource for DataFrameSource {
    fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.as_str().to_string())
            .filter(|name| *name != self.time_column)
            .collect()
    }

    fn load(&self) -> Result<TimeTable> {
        let timestamps = self.load_timestamps()?;

        let columns = self
            .df
            .get_columns()
            .iter()
            .filter(|c| c.name().as_str() != self.time_column)
            .map(|c| {
                let series = c.as_materialized_series().cast(&DataType::Float64)?;
                let data: Vec<f64> = series
                    .f64()?
                    .into_iter()
                    .map(|v| v.unwrap_or(f64::NAN))
                    .collect();
                Ok((c.name().as_str().to_string(), data))
            })
            .collect::<Result<Vec<_>>>()?;

        TimeTable::from_columns(timestamps, columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn days(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2011, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    #[test]
    fn test_from_columns() {
        let table = TimeTable::from_columns(
            days(3),
            vec![
                ("a".to_string(), vec![1.0, 2.0, 3.0]),
                ("b".to_string(), vec![10.0, 20.0, 30.0]),
            ],
        )
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.value(1, 1), 20.0);
        assert_eq!(table.column_index("b").unwrap(), 1);
    }

    #[test]
    fn test_missing_column() {
        let table =
            TimeTable::from_columns(days(2), vec![("a".to_string(), vec![1.0, 2.0])]).unwrap();
        let err = table.resolve_columns(&["a".to_string(), "z".to_string()]).unwrap_err();
        assert!(matches!(err, WindowError::ColumnNotFound(name) if name == "z"));
    }

    #[test]
    fn test_rejects_unordered_timestamps() {
        let mut ts = days(3);
        ts.swap(1, 2);
        let result = TimeTable::from_columns(ts, vec![("a".to_string(), vec![1.0, 2.0, 3.0])]);
        assert!(matches!(result, Err(WindowError::DataError(_))));
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        let result = TimeTable::from_columns(
            days(1),
            vec![("a".to_string(), vec![1.0]), ("a".to_string(), vec![2.0])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_positions_between() {
        let ts = days(10);
        let table = TimeTable::from_columns(ts.clone(), vec![("a".to_string(), vec![0.0; 10])])
            .unwrap();
        assert_eq!(table.positions_between(ts[2], ts[5]), 2..6);
        assert_eq!(table.position_of(ts[7]), Some(7));
        assert!(table.positions_between(ts[5], ts[2]).is_empty());
    }

    #[test]
    fn test_dataframe_source() {
        let df = df!(
            "time" => &[0i64, 86_400_000, 172_800_000],
            "x" => &[1.0, 2.0, 3.0],
            "y" => &[4i32, 5, 6]
        )
        .unwrap();

        let source = DataFrameSource::new(df, "time");
        assert_eq!(source.column_names(), vec!["x".to_string(), "y".to_string()]);

        let table = source.load().unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.value(2, 1), 6.0);
        assert_eq!(table.timestamp(1).unwrap().to_string(), "1970-01-02 00:00:00");
    }

    #[test]
    fn test_dataframe_source_microsecond_resolution() {
        let start = days(1)[0].and_utc().timestamp_micros();
        let micros: Vec<i64> = (0..5).map(|i| start + i * 250).collect();
        let time = Series::new("time".into(), micros)
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
            .unwrap();
        let x = Series::new("x".into(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let df = DataFrame::new(vec![time.into(), x.into()]).unwrap();

        let table = DataFrameSource::new(df, "time").load().unwrap();
        assert_eq!(table.len(), 5);
        let ts = table.timestamps();
        assert_eq!((ts[1] - ts[0]).num_microseconds(), Some(250));
        assert_eq!((ts[4] - ts[0]).num_microseconds(), Some(1000));
    }

    #[test]
    fn test_dataframe_source_missing_time_column() {
        let df = df!("x" => &[1.0, 2.0]).unwrap();
        let source = DataFrameSource::new(df, "time");
        assert!(matches!(source.load(), Err(WindowError::ColumnNotFound(_))));
    }
}
