//! SQLite data adapter.
//!
//! Local cache of downloaded data: `prices(code, date, close)` and
//! `fundamentals(code, period_end, field, value)` in long form.

use crate::domain::error::FundtraderError;
use crate::domain::fundamental::FundamentalRecord;
use crate::domain::price::PriceBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::fundamental_port::FundamentalProvider;
use crate::ports::price_port::PriceProvider;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_err(e: rusqlite::Error) -> FundtraderError {
    FundtraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_sql_date(value: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, FundtraderError> {
        let db_path = config
            .get_string("data", "path")
            .ok_or_else(|| FundtraderError::missing("data", "path"))?;

        let pool_size = config.get_int("data", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| FundtraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, FundtraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| FundtraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, FundtraderError> {
        self.pool.get().map_err(|e: r2d2::Error| FundtraderError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), FundtraderError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS prices (
                    code TEXT NOT NULL,
                    date TEXT NOT NULL,
                    close REAL NOT NULL,
                    PRIMARY KEY (code, date)
                );
                CREATE TABLE IF NOT EXISTS fundamentals (
                    code TEXT NOT NULL,
                    period_end TEXT NOT NULL,
                    field TEXT NOT NULL,
                    value REAL NOT NULL,
                    PRIMARY KEY (code, period_end, field)
                );
                CREATE INDEX IF NOT EXISTS idx_prices_date ON prices(date);",
            )
            .map_err(query_err)
    }

    pub fn insert_prices(&self, code: &str, bars: &[PriceBar]) -> Result<(), FundtraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO prices (code, date, close) VALUES (?1, ?2, ?3)",
                params![code, bar.date.format("%Y-%m-%d").to_string(), bar.close],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    pub fn insert_fundamentals(
        &self,
        code: &str,
        records: &[FundamentalRecord],
    ) -> Result<(), FundtraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for record in records {
            let period_end = record.period_end.format("%Y-%m-%d").to_string();
            for (field, value) in &record.fields {
                tx.execute(
                    "INSERT OR REPLACE INTO fundamentals (code, period_end, field, value)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![code, period_end, field, value],
                )
                .map_err(query_err)?;
            }
        }

        tx.commit().map_err(query_err)
    }
}

impl PriceProvider for SqliteAdapter {
    fn fetch_prices(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, FundtraderError> {
        let conn = self.conn()?;
        let start_str = start_date.format("%Y-%m-%d").to_string();
        let end_str = end_date.format("%Y-%m-%d").to_string();

        let mut stmt = conn
            .prepare(
                "SELECT date, close FROM prices
                 WHERE code = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![code, start_str, end_str], |row| {
                let date = parse_sql_date(row.get(0)?)?;
                Ok(PriceBar::new(date, row.get(1)?))
            })
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn list_codes(&self) -> Result<Vec<String>, FundtraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT code FROM prices ORDER BY code")
            .map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_err)
    }
}

impl FundamentalProvider for SqliteAdapter {
    fn fetch_fundamentals(&self, code: &str) -> Result<Vec<FundamentalRecord>, FundtraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT period_end, field, value FROM fundamentals
                 WHERE code = ?1
                 ORDER BY period_end ASC, field ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![code], |row| {
                let period_end = parse_sql_date(row.get(0)?)?;
                let field: String = row.get(1)?;
                let value: f64 = row.get(2)?;
                Ok((period_end, field, value))
            })
            .map_err(query_err)?;

        let mut records: Vec<FundamentalRecord> = Vec::new();
        for row in rows {
            let (period_end, field, value) = row.map_err(query_err)?;
            match records.last_mut() {
                Some(last) if last.period_end == period_end => {
                    last.fields.insert(field, value);
                }
                _ => records.push(FundamentalRecord::new(period_end).with_field(&field, value)),
            }
        }

        Ok(records)
    }
}
