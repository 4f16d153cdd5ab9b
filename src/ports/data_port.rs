//! Market data access port trait.

use crate::domain::bar::RawDailyRecord;
use crate::domain::error::MarketscanError;
use chrono::NaiveDate;

/// One symbol in the scan universe, with its classification attributes.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub code: String,
    pub name: String,
    pub exchange: String,
    pub asset_type: String,
    pub industry: String,
    pub status: String,
}

/// Optional pre-filters applied by the store when listing the universe.
#[derive(Debug, Clone, Default)]
pub struct UniverseFilter {
    pub exchange: Option<String>,
    pub asset_type: Option<String>,
    pub status: Option<String>,
}

/// The chronologically latest aggregate-index record for an industry.
#[derive(Debug, Clone)]
pub struct AggregateRecord {
    pub industry: String,
    pub code: String,
    pub date: NaiveDate,
}

pub trait MarketDataPort: std::fmt::Debug {
    /// Most recent `limit` daily records for a symbol, newest first.
    fn latest_by_code(
        &self,
        code: &str,
        limit: usize,
    ) -> Result<Vec<RawDailyRecord>, MarketscanError>;

    /// Inclusive date-range records for a symbol, oldest first.
    fn range_by_code(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawDailyRecord>, MarketscanError>;

    /// Most recent single record, for current-state checks.
    fn latest_single(&self, code: &str) -> Result<Option<RawDailyRecord>, MarketscanError>;

    /// The scan universe, optionally pre-filtered.
    fn universe(&self, filter: &UniverseFilter) -> Result<Vec<SymbolInfo>, MarketscanError>;

    /// Latest aggregate-index record for an industry name.
    fn industry_aggregate(
        &self,
        industry: &str,
    ) -> Result<Option<AggregateRecord>, MarketscanError>;

    /// First/last date and row count for a symbol, for inspection commands.
    fn data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, MarketscanError>;
}
