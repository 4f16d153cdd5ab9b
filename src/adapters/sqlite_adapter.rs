//! SQLite market data adapter.
//!
//! Numeric bar columns are nullable on purpose: upstream feeds drop fields,
//! and the bar-sequence builder coerces missing values to 0.0.

use crate::domain::bar::RawDailyRecord;
use crate::domain::error::MarketscanError;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{
    AggregateRecord, MarketDataPort, SymbolInfo, UniverseFilter,
};
use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, params_from_iter, Row};

#[derive(Debug)]
pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn db_err(e: r2d2::Error) -> MarketscanError {
    MarketscanError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> MarketscanError {
    MarketscanError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_date(date_str: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            date_str.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

fn record_from_row(row: &Row<'_>) -> Result<RawDailyRecord, rusqlite::Error> {
    let date_str: String = row.get(0)?;
    Ok(RawDailyRecord {
        date: parse_date(&date_str)?,
        open: row.get(1)?,
        high: row.get(2)?,
        low: row.get(3)?,
        close: row.get(4)?,
        volume: row.get(5)?,
        turnover: row.get(6)?,
    })
}

const RECORD_COLUMNS: &str = "date, open, high, low, close, volume, turnover";

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, MarketscanError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| MarketscanError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_err)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, MarketscanError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(db_err)?;
        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), MarketscanError> {
        let conn = self.pool.get().map_err(db_err)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS daily_bar (
                code TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL,
                high REAL,
                low REAL,
                close REAL,
                volume REAL,
                turnover REAL,
                PRIMARY KEY (code, date)
            );
            CREATE INDEX IF NOT EXISTS idx_daily_bar_date ON daily_bar(date);
            CREATE TABLE IF NOT EXISTS symbol (
                code TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                exchange TEXT NOT NULL,
                asset_type TEXT NOT NULL,
                industry TEXT NOT NULL,
                status TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS industry_aggregate (
                industry TEXT NOT NULL,
                code TEXT NOT NULL,
                date TEXT NOT NULL,
                PRIMARY KEY (industry, date)
            );",
        )
        .map_err(query_err)?;

        Ok(())
    }

    pub fn insert_records(
        &self,
        code: &str,
        records: &[RawDailyRecord],
    ) -> Result<(), MarketscanError> {
        let mut conn = self.pool.get().map_err(db_err)?;
        let tx = conn.transaction().map_err(query_err)?;

        for record in records {
            tx.execute(
                "INSERT OR REPLACE INTO daily_bar
                 (code, date, open, high, low, close, volume, turnover)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    code,
                    record.date.format("%Y-%m-%d").to_string(),
                    record.open,
                    record.high,
                    record.low,
                    record.close,
                    record.volume,
                    record.turnover
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    pub fn insert_symbols(&self, symbols: &[SymbolInfo]) -> Result<(), MarketscanError> {
        let mut conn = self.pool.get().map_err(db_err)?;
        let tx = conn.transaction().map_err(query_err)?;

        for symbol in symbols {
            tx.execute(
                "INSERT OR REPLACE INTO symbol (code, name, exchange, asset_type, industry, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    symbol.code,
                    symbol.name,
                    symbol.exchange,
                    symbol.asset_type,
                    symbol.industry,
                    symbol.status
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    pub fn insert_aggregates(&self, records: &[AggregateRecord]) -> Result<(), MarketscanError> {
        let mut conn = self.pool.get().map_err(db_err)?;
        let tx = conn.transaction().map_err(query_err)?;

        for record in records {
            tx.execute(
                "INSERT OR REPLACE INTO industry_aggregate (industry, code, date)
                 VALUES (?1, ?2, ?3)",
                params![
                    record.industry,
                    record.code,
                    record.date.format("%Y-%m-%d").to_string()
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    fn fetch_records(
        &self,
        query: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<RawDailyRecord>, MarketscanError> {
        let conn = self.pool.get().map_err(db_err)?;
        let mut stmt = conn.prepare(query).map_err(query_err)?;
        let rows = stmt
            .query_map(args, record_from_row)
            .map_err(query_err)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(query_err)?);
        }
        Ok(records)
    }
}

impl MarketDataPort for SqliteAdapter {
    fn latest_by_code(
        &self,
        code: &str,
        limit: usize,
    ) -> Result<Vec<RawDailyRecord>, MarketscanError> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM daily_bar
             WHERE code = ?1 ORDER BY date DESC LIMIT ?2"
        );
        self.fetch_records(&query, &[&code, &(limit as i64)])
    }

    fn range_by_code(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawDailyRecord>, MarketscanError> {
        let start_str = start.format("%Y-%m-%d").to_string();
        let end_str = end.format("%Y-%m-%d").to_string();
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM daily_bar
             WHERE code = ?1 AND date >= ?2 AND date <= ?3 ORDER BY date ASC"
        );
        self.fetch_records(&query, &[&code, &start_str, &end_str])
    }

    fn latest_single(&self, code: &str) -> Result<Option<RawDailyRecord>, MarketscanError> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM daily_bar
             WHERE code = ?1 ORDER BY date DESC LIMIT 1"
        );
        Ok(self.fetch_records(&query, &[&code])?.into_iter().next())
    }

    fn universe(&self, filter: &UniverseFilter) -> Result<Vec<SymbolInfo>, MarketscanError> {
        let mut query =
            String::from("SELECT code, name, exchange, asset_type, industry, status FROM symbol");
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(exchange) = &filter.exchange {
            clauses.push("exchange = ?");
            args.push(exchange.clone());
        }
        if let Some(asset_type) = &filter.asset_type {
            clauses.push("asset_type = ?");
            args.push(asset_type.clone());
        }
        if let Some(status) = &filter.status {
            clauses.push("status = ?");
            args.push(status.clone());
        }
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }
        query.push_str(" ORDER BY code");

        let conn = self.pool.get().map_err(db_err)?;
        let mut stmt = conn.prepare(&query).map_err(query_err)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok(SymbolInfo {
                    code: row.get(0)?,
                    name: row.get(1)?,
                    exchange: row.get(2)?,
                    asset_type: row.get(3)?,
                    industry: row.get(4)?,
                    status: row.get(5)?,
                })
            })
            .map_err(query_err)?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row.map_err(query_err)?);
        }
        Ok(symbols)
    }

    fn industry_aggregate(
        &self,
        industry: &str,
    ) -> Result<Option<AggregateRecord>, MarketscanError> {
        let conn = self.pool.get().map_err(db_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT industry, code, date FROM industry_aggregate
                 WHERE industry = ?1 ORDER BY date DESC LIMIT 1",
            )
            .map_err(query_err)?;

        let mut rows = stmt
            .query_map(params![industry], |row| {
                let date_str: String = row.get(2)?;
                Ok(AggregateRecord {
                    industry: row.get(0)?,
                    code: row.get(1)?,
                    date: parse_date(&date_str)?,
                })
            })
            .map_err(query_err)?;

        rows.next().transpose().map_err(query_err)
    }

    fn data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, MarketscanError> {
        let conn = self.pool.get().map_err(db_err)?;

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM daily_bar WHERE code = ?1",
                params![code],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let min = NaiveDate::parse_from_str(&min_str, "%Y-%m-%d").map_err(|e| {
                    MarketscanError::Database {
                        reason: e.to_string(),
                    }
                })?;
                let max = NaiveDate::parse_from_str(&max_str, "%Y-%m-%d").map_err(|e| {
                    MarketscanError::Database {
                        reason: e.to_string(),
                    }
                })?;
                Ok(Some((min, max, count as usize)))
            }
            _ => Ok(None),
        }
    }
}
