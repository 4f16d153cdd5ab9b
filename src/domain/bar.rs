//! Daily bar representation and bar-sequence construction.

use chrono::NaiveDate;

/// One raw persisted daily row. Numeric fields may be missing in the store.
#[derive(Debug, Clone, Default)]
pub struct RawDailyRecord {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub turnover: Option<f64>,
}

/// A fully materialised daily bar. Immutable once built for a window.
#[derive(Debug, Clone)]
pub struct DailyBar {
    pub code: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub turnover: f64,
}

/// Build a date-ascending bar sequence from raw records.
///
/// Missing numeric fields map to 0.0. This is a known approximation (a
/// missing volume reads as a volume crash) and is preserved deliberately:
/// changing it would silently alter strategy outcomes.
pub fn build_bar_sequence(code: &str, mut records: Vec<RawDailyRecord>) -> Vec<DailyBar> {
    records.sort_by_key(|r| r.date);
    records
        .into_iter()
        .map(|r| DailyBar {
            code: code.to_string(),
            date: r.date,
            open: r.open.unwrap_or(0.0),
            high: r.high.unwrap_or(0.0),
            low: r.low.unwrap_or(0.0),
            close: r.close.unwrap_or(0.0),
            volume: r.volume.unwrap_or(0.0),
            turnover: r.turnover.unwrap_or(0.0),
        })
        .collect()
}
