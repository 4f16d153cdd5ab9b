//! CSV file market data adapter.
//!
//! One `<CODE>.csv` file per symbol with a
//! `date,open,high,low,close,volume,turnover` header. Empty numeric cells
//! are missing values; the bar-sequence builder later coerces them to 0.0.
//!
//! The CSV store carries no classification or industry data: universe
//! filters are ignored and aggregate lookups return nothing, so screening
//! needs the SQLite store.

use crate::domain::bar::RawDailyRecord;
use crate::domain::error::MarketscanError;
use crate::ports::data_port::{
    AggregateRecord, MarketDataPort, SymbolInfo, UniverseFilter,
};
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

#[derive(Debug)]
pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }

    fn read_all(&self, code: &str) -> Result<Vec<RawDailyRecord>, MarketscanError> {
        let path = self.csv_path(code);
        let content = fs::read_to_string(&path).map_err(|e| MarketscanError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut records = Vec::new();

        for result in rdr.records() {
            let row = result.map_err(|e| MarketscanError::Database {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = row.get(0).ok_or_else(|| MarketscanError::Database {
                reason: "missing date column".into(),
            })?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                MarketscanError::Database {
                    reason: format!("invalid date format: {}", e),
                }
            })?;

            records.push(RawDailyRecord {
                date,
                open: optional_field(&row, 1, "open")?,
                high: optional_field(&row, 2, "high")?,
                low: optional_field(&row, 3, "low")?,
                close: optional_field(&row, 4, "close")?,
                volume: optional_field(&row, 5, "volume")?,
                turnover: optional_field(&row, 6, "turnover")?,
            });
        }

        records.sort_by_key(|r| r.date);
        Ok(records)
    }
}

fn optional_field(
    row: &csv::StringRecord,
    index: usize,
    name: &str,
) -> Result<Option<f64>, MarketscanError> {
    match row.get(index) {
        None => Ok(None),
        Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| MarketscanError::Database {
                reason: format!("invalid {} value: {}", name, e),
            }),
    }
}

impl MarketDataPort for CsvAdapter {
    fn latest_by_code(
        &self,
        code: &str,
        limit: usize,
    ) -> Result<Vec<RawDailyRecord>, MarketscanError> {
        let records = self.read_all(code)?;
        let start = records.len().saturating_sub(limit);
        let mut recent: Vec<RawDailyRecord> = records[start..].to_vec();
        recent.reverse();
        Ok(recent)
    }

    fn range_by_code(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawDailyRecord>, MarketscanError> {
        let records = self.read_all(code)?;
        Ok(records
            .into_iter()
            .filter(|r| r.date >= start && r.date <= end)
            .collect())
    }

    fn latest_single(&self, code: &str) -> Result<Option<RawDailyRecord>, MarketscanError> {
        Ok(self.read_all(code)?.pop())
    }

    fn universe(&self, _filter: &UniverseFilter) -> Result<Vec<SymbolInfo>, MarketscanError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| MarketscanError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MarketscanError::Database {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(code) = name_str.strip_suffix(".csv") {
                symbols.push(SymbolInfo {
                    code: code.to_string(),
                    name: String::new(),
                    exchange: String::new(),
                    asset_type: String::new(),
                    industry: String::new(),
                    status: String::new(),
                });
            }
        }

        symbols.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(symbols)
    }

    fn industry_aggregate(
        &self,
        _industry: &str,
    ) -> Result<Option<AggregateRecord>, MarketscanError> {
        Ok(None)
    }

    fn data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, MarketscanError> {
        let records = self.read_all(code)?;
        match (records.first(), records.last()) {
            (Some(first), Some(last)) => Ok(Some((first.date, last.date, records.len()))),
            _ => Ok(None),
        }
    }
}
