#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use seq_windows::data::TimeTable;

pub const ROWS: usize = 2000;

pub const INPUTS: [&str; 5] = ["input_0", "input_1", "input_2", "input_3", "input_4"];

/// Enable log output for a test run with `RUST_LOG=seq_windows=debug`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seq_windows=warn".into()),
        )
        .with_test_writer()
        .try_init();
}

pub fn day(year: i32, month: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Daily table from 2011-01-01 where column `j` holds `2000 * j + row`.
///
/// Columns are `input_0` to `input_4` followed by `output`.
pub fn reference_table() -> TimeTable {
    let start = day(2011, 1, 1);
    let timestamps = (0..ROWS).map(|i| start + Duration::days(i as i64)).collect();
    let names = INPUTS.iter().map(|s| s.to_string()).chain(["output".to_string()]);
    let columns = names
        .enumerate()
        .map(|(j, name)| {
            let values = (0..ROWS).map(|r| (ROWS * j + r) as f64).collect();
            (name, values)
        })
        .collect();
    TimeTable::from_columns(timestamps, columns).unwrap()
}

/// Reference table with `output` missing on rows 100 to 199
pub fn reference_table_with_gap() -> TimeTable {
    let table = reference_table();
    let mut values = table.values().clone();
    for r in 100..200 {
        values[[r, 5]] = f64::NAN;
    }
    table.with_values(values).unwrap()
}
