//! CSV bar files.
//!
//! Columns: `timestamp,open,high,low,close,volume`, header row first. The
//! base path is either one file used for every symbol or a directory holding
//! `<SYMBOL>.csv` per symbol.

use crate::domain::bar::{Bar, is_strictly_ordered};
use crate::domain::error::TraderError;
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y%m%d %H:%M:%S",
];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn bar_path(&self, symbol: &str) -> PathBuf {
        if self.base_path.is_dir() {
            self.base_path.join(format!("{}.csv", symbol))
        } else {
            self.base_path.clone()
        }
    }

    pub fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, TraderError> {
        read_bars(&self.bar_path(symbol))
    }
}

pub fn read_bars(path: &Path) -> Result<Vec<Bar>, TraderError> {
    let content = fs::read_to_string(path).map_err(|e| TraderError::Data {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;
    parse_bars(&content)
}

/// Parse bar rows, returned in strictly increasing timestamp order. Rows
/// sharing a timestamp merge into one bar; the later row in the file wins,
/// as a repeated broker callback replaces the newest bar.
pub fn parse_bars(content: &str) -> Result<Vec<Bar>, TraderError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for (index, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| TraderError::Data {
            reason: format!("CSV parse error: {}", e),
        })?;
        let row = index + 2;

        let raw_ts = record.get(0).ok_or_else(|| TraderError::Data {
            reason: format!("row {}: missing timestamp column", row),
        })?;
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| TraderError::Data {
            reason: format!("row {}: invalid timestamp '{}'", row, raw_ts),
        })?;

        let bar = Bar {
            timestamp,
            open: number(&record, 1, "open", row)?,
            high: number(&record, 2, "high", row)?,
            low: number(&record, 3, "low", row)?,
            close: number(&record, 4, "close", row)?,
            volume: number(&record, 5, "volume", row)?,
        };
        if !bar.is_well_formed() {
            return Err(TraderError::Data {
                reason: format!("row {}: malformed bar at {}", row, bar.timestamp),
            });
        }
        bars.push(bar);
    }

    bars.sort_by_key(|b| b.timestamp);
    let mut merged: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match merged.last_mut() {
            Some(last) if last.timestamp == bar.timestamp => {
                log::warn!("duplicate bar at {}; keeping the later row", bar.timestamp);
                *last = bar;
            }
            _ => merged.push(bar),
        }
    }
    debug_assert!(is_strictly_ordered(&merged));
    Ok(merged)
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&value, fmt).ok())
}

fn number(record: &csv::StringRecord, column: usize, name: &str, row: usize) -> Result<f64, TraderError> {
    record
        .get(column)
        .ok_or_else(|| TraderError::Data {
            reason: format!("row {}: missing {} column", row, name),
        })?
        .parse()
        .map_err(|e| TraderError::Data {
            reason: format!("row {}: invalid {} value: {}", row, name, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const HEADER: &str = "timestamp,open,high,low,close,volume\n";

    fn setup_test_data() -> TempDir {
        let dir = TempDir::new().unwrap();
        let content = format!(
            "{HEADER}\
            2022-06-14 09:35:00,4500.0,4504.0,4499.0,4503.0,1200\n\
            2022-06-14 09:30:00,4498.0,4501.0,4497.5,4500.0,1500\n\
            2022-06-14 09:40:00,4503.0,4506.25,4502.0,4505.5,900\n"
        );
        fs::write(dir.path().join("MES.csv"), content).unwrap();
        fs::write(dir.path().join("MNQ.csv"), HEADER).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        dir
    }

    #[test]
    fn fetch_bars_sorted_by_timestamp() {
        let dir = setup_test_data();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let bars = adapter.fetch_bars("MES").unwrap();

        assert_eq!(bars.len(), 3);
        let first = NaiveDate::from_ymd_opt(2022, 6, 14)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(bars[0].timestamp, first);
        assert_eq!(bars[0].low, 4497.5);
        assert_eq!(bars[2].high, 4506.25);
        assert_eq!(bars[2].volume, 900.0);
    }

    #[test]
    fn single_file_serves_every_symbol() {
        let dir = setup_test_data();
        let adapter = CsvAdapter::new(dir.path().join("MES.csv"));
        assert_eq!(adapter.fetch_bars("ANY").unwrap().len(), 3);
    }

    #[test]
    fn missing_file_is_data_error() {
        let dir = setup_test_data();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        assert!(matches!(adapter.fetch_bars("XYZ"), Err(TraderError::Data { .. })));
    }

    #[test]
    fn repeated_timestamp_keeps_later_row() {
        let bars = parse_bars(&format!(
            "{HEADER}\
            2022-06-14 10:20:00,100,101,99,100,10\n\
            2022-06-14 10:21:00,100,101,99,100.5,10\n\
            2022-06-14 10:25:00,101,102,100,101,10\n\
            2022-06-14 10:21:00,50,51,49,50,10\n"
        ))
        .unwrap();

        assert_eq!(bars.len(), 3);
        assert!(is_strictly_ordered(&bars));
        assert_eq!(bars[1].timestamp.to_string(), "2022-06-14 10:21:00");
        assert_eq!(bars[1].close, 50.0);
        assert_eq!(bars[2].close, 101.0);
    }

    #[test]
    fn broker_timestamp_format_accepted() {
        let bars = parse_bars(&format!("{HEADER}20220614  09:30:00,1,2,0.5,1.5,10\n")).unwrap();
        assert_eq!(bars[0].timestamp.to_string(), "2022-06-14 09:30:00");
    }

    #[test]
    fn invalid_number_reports_row() {
        let err = parse_bars(&format!("{HEADER}2022-06-14 09:30,1,x,0.5,1.5,10\n")).unwrap_err();
        assert!(err.to_string().contains("row 2: invalid high value"));
    }

    #[test]
    fn malformed_bar_rejected() {
        let err = parse_bars(&format!("{HEADER}2022-06-14 09:30,1,0.5,2,1.5,10\n")).unwrap_err();
        assert!(err.to_string().contains("malformed bar"));
    }
}
