#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use marketscan::domain::bar::RawDailyRecord;
use marketscan::domain::error::MarketscanError;
use marketscan::ports::data_port::{
    AggregateRecord, MarketDataPort, SymbolInfo, UniverseFilter,
};
use std::collections::HashMap;

/// In-memory data port. Records are stored date-ascending per code.
#[derive(Debug)]
pub struct MockDataPort {
    pub data: HashMap<String, Vec<RawDailyRecord>>,
    pub errors: HashMap<String, String>,
    pub symbols: Vec<SymbolInfo>,
    pub aggregates: HashMap<String, AggregateRecord>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            symbols: Vec::new(),
            aggregates: HashMap::new(),
        }
    }

    /// Register a symbol in the universe along with its bar history.
    pub fn with_symbol(mut self, code: &str, industry: &str, records: Vec<RawDailyRecord>) -> Self {
        self.symbols.push(SymbolInfo {
            code: code.to_string(),
            name: format!("{code} Co"),
            exchange: "SSE".to_string(),
            asset_type: "stock".to_string(),
            industry: industry.to_string(),
            status: "listed".to_string(),
        });
        self.data.insert(code.to_string(), records);
        self
    }

    /// Register bar history without a universe entry (aggregate indexes).
    pub fn with_bars(mut self, code: &str, records: Vec<RawDailyRecord>) -> Self {
        self.data.insert(code.to_string(), records);
        self
    }

    /// Make every fetch for `code` fail.
    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }

    pub fn with_aggregate(mut self, industry: &str, code: &str, date: NaiveDate) -> Self {
        self.aggregates.insert(
            industry.to_string(),
            AggregateRecord {
                industry: industry.to_string(),
                code: code.to_string(),
                date,
            },
        );
        self
    }

    fn fetch(&self, code: &str) -> Result<&[RawDailyRecord], MarketscanError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(MarketscanError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(code).map(Vec::as_slice).unwrap_or_default())
    }
}

impl MarketDataPort for MockDataPort {
    fn latest_by_code(
        &self,
        code: &str,
        limit: usize,
    ) -> Result<Vec<RawDailyRecord>, MarketscanError> {
        let records = self.fetch(code)?;
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
        Ok(self
            .fetch(code)?
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .cloned()
            .collect())
    }

    fn latest_single(&self, code: &str) -> Result<Option<RawDailyRecord>, MarketscanError> {
        Ok(self.fetch(code)?.last().cloned())
    }

    fn universe(&self, filter: &UniverseFilter) -> Result<Vec<SymbolInfo>, MarketscanError> {
        Ok(self
            .symbols
            .iter()
            .filter(|s| {
                filter
                    .exchange
                    .as_ref()
                    .is_none_or(|exchange| &s.exchange == exchange)
                    && filter
                        .asset_type
                        .as_ref()
                        .is_none_or(|asset_type| &s.asset_type == asset_type)
                    && filter.status.as_ref().is_none_or(|status| &s.status == status)
            })
            .cloned()
            .collect())
    }

    fn industry_aggregate(
        &self,
        industry: &str,
    ) -> Result<Option<AggregateRecord>, MarketscanError> {
        Ok(self.aggregates.get(industry).cloned())
    }

    fn data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, MarketscanError> {
        let records = self.fetch(code)?;
        match (records.first(), records.last()) {
            (Some(first), Some(last)) => Ok(Some((first.date, last.date, records.len()))),
            _ => Ok(None),
        }
    }
}

pub fn trading_date(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + Duration::days(i as i64)
}

pub fn record(i: usize, close: f64, volume: f64) -> RawDailyRecord {
    RawDailyRecord {
        date: trading_date(i),
        open: Some(close),
        high: Some(close),
        low: Some(close),
        close: Some(close),
        volume: Some(volume),
        turnover: Some(close * volume),
    }
}

pub fn records_from_closes(closes: &[f64]) -> Vec<RawDailyRecord> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| record(i, close, 10_000.0))
        .collect()
}

pub fn records_from_volumes(volumes: &[f64]) -> Vec<RawDailyRecord> {
    volumes
        .iter()
        .enumerate()
        .map(|(i, &volume)| record(i, 10.0, volume))
        .collect()
}

/// A decline followed by a rally: golden cross after the turn, bullish tail.
pub fn v_shape_closes(down: usize, up: usize) -> Vec<f64> {
    let mut closes = Vec::with_capacity(down + up);
    let mut price = 90.0 + down as f64;
    for _ in 0..down {
        price -= 1.0;
        closes.push(price);
    }
    for _ in 0..up {
        price += 3.0;
        closes.push(price);
    }
    closes
}
