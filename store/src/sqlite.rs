//! SQLite-backed durable store.
//!
//! Each [`WriteBatch`] runs inside one SQLite transaction. Rows are written
//! with `INSERT ... ON CONFLICT` upserts, so a batch only touches the rows it
//! names and a failing op rolls the whole transaction back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use fxcache_common::{CurrencyCode, Timestamp};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info};

use crate::batch::{WriteBatch, WriteOp};
use crate::error::{StoreError, StoreResult};
use crate::record::{CurrencyRecord, HistoricalRate, Rate};
use crate::repository::RateStore;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS currencies (
        code TEXT PRIMARY KEY NOT NULL,
        is_base INTEGER NOT NULL DEFAULT 0,
        last_updated TEXT
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_currencies_single_base
        ON currencies(is_base) WHERE is_base = 1;

    CREATE TABLE IF NOT EXISTS rates (
        base TEXT NOT NULL,
        target TEXT NOT NULL,
        value REAL NOT NULL,
        date TEXT NOT NULL,
        PRIMARY KEY (base, target)
    );

    CREATE TABLE IF NOT EXISTS historical_rates (
        base TEXT NOT NULL,
        target TEXT NOT NULL,
        day TEXT NOT NULL,
        value REAL NOT NULL,
        PRIMARY KEY (base, target, day)
    );
";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Rate store persisted in a SQLite database.
pub struct SqliteRateStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteRateStore {
    /// Open the database at `path`, creating it and its schema if needed.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self::with_connection(conn, Some(path.to_path_buf()))?;

        info!(path = %path.display(), "Opened rate store");
        Ok(store)
    }

    /// Create a store that lives only as long as this value.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl RateStore for SqliteRateStore {
    fn base_currency(&self) -> StoreResult<Option<CurrencyRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT code, is_base, last_updated FROM currencies WHERE is_base = 1",
                [],
                currency_row,
            )
            .optional()?;
        Ok(record)
    }

    fn currency(&self, code: &CurrencyCode) -> StoreResult<Option<CurrencyRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT code, is_base, last_updated FROM currencies WHERE code = ?1",
                params![code.as_str()],
                currency_row,
            )
            .optional()?;
        Ok(record)
    }

    fn currencies(&self) -> StoreResult<Vec<CurrencyRecord>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT code, is_base, last_updated FROM currencies ORDER BY code")?;
        let records = stmt
            .query_map([], currency_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn rates_for_base(&self, base: &CurrencyCode) -> StoreResult<Vec<Rate>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT base, target, value, date FROM rates WHERE base = ?1 ORDER BY target",
        )?;
        let rates = stmt
            .query_map(params![base.as_str()], rate_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rates)
    }

    fn rate(&self, base: &CurrencyCode, target: &CurrencyCode) -> StoreResult<Option<Rate>> {
        let conn = self.conn.lock();
        let rate = conn
            .query_row(
                "SELECT base, target, value, date FROM rates WHERE base = ?1 AND target = ?2",
                params![base.as_str(), target.as_str()],
                rate_row,
            )
            .optional()?;
        Ok(rate)
    }

    fn historical_rates(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<HistoricalRate>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT base, target, day, value FROM historical_rates
             WHERE base = ?1 AND target = ?2 AND day BETWEEN ?3 AND ?4
             ORDER BY day",
        )?;
        let rows = stmt
            .query_map(
                params![base.as_str(), target.as_str(), from, to],
                historical_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        // Dropping an uncommitted transaction rolls it back.
        let tx = conn.transaction()?;
        for op in batch.ops() {
            apply_op(&tx, op)?;
            debug!(op = op.kind(), "Staged store write");
        }
        tx.commit()?;
        Ok(())
    }
}

fn apply_op(tx: &Transaction<'_>, op: &WriteOp) -> StoreResult<()> {
    match op {
        WriteOp::SetBase(code) => set_base(tx, code)?,
        WriteOp::SetBaseIfUnset(code) => {
            let has_base: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM currencies WHERE is_base = 1)",
                [],
                |row| row.get(0),
            )?;
            if !has_base {
                set_base(tx, code)?;
            }
        }
        WriteOp::UpsertRates {
            base,
            rates,
            fetched_at,
        } => {
            for (target, value) in rates {
                ensure_finite(*value, || format!("rate {}/{}", base, target))?;
            }

            tx.execute(
                "INSERT INTO currencies (code, is_base, last_updated) VALUES (?1, 0, ?2)
                 ON CONFLICT(code) DO UPDATE SET last_updated = excluded.last_updated",
                params![base.as_str(), fetched_at],
            )?;

            let mut currency = tx.prepare_cached(
                "INSERT INTO currencies (code) VALUES (?1) ON CONFLICT(code) DO NOTHING",
            )?;
            let mut rate = tx.prepare_cached(
                "INSERT INTO rates (base, target, value, date) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(base, target) DO UPDATE SET
                     value = excluded.value,
                     date = excluded.date",
            )?;
            for (target, value) in rates {
                currency.execute(params![target.as_str()])?;
                rate.execute(params![base.as_str(), target.as_str(), value, fetched_at])?;
            }
        }
        WriteOp::UpsertHistorical {
            base,
            target,
            points,
        } => {
            for (date, value) in points {
                ensure_finite(*value, || {
                    format!("historical rate {}/{} on {}", base, target, date)
                })?;
            }

            let mut stmt = tx.prepare_cached(
                "INSERT INTO historical_rates (base, target, day, value) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(base, target, day) DO UPDATE SET value = excluded.value",
            )?;
            for (date, value) in points {
                stmt.execute(params![base.as_str(), target.as_str(), date, value])?;
            }
        }
    }
    Ok(())
}

fn set_base(tx: &Transaction<'_>, code: &CurrencyCode) -> rusqlite::Result<()> {
    tx.execute("UPDATE currencies SET is_base = 0 WHERE is_base = 1", [])?;
    tx.execute(
        "INSERT INTO currencies (code, is_base) VALUES (?1, 1)
         ON CONFLICT(code) DO UPDATE SET is_base = 1",
        params![code.as_str()],
    )?;
    Ok(())
}

fn ensure_finite(value: f64, what: impl FnOnce() -> String) -> StoreResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StoreError::InvalidRecord(format!("{} is not finite", what())))
    }
}

fn currency_row(row: &Row<'_>) -> rusqlite::Result<CurrencyRecord> {
    Ok(CurrencyRecord {
        code: CurrencyCode::new(row.get::<_, String>(0)?),
        is_base: row.get(1)?,
        last_updated: row.get::<_, Option<Timestamp>>(2)?,
    })
}

fn rate_row(row: &Row<'_>) -> rusqlite::Result<Rate> {
    Ok(Rate {
        base_currency: CurrencyCode::new(row.get::<_, String>(0)?),
        currency_code: CurrencyCode::new(row.get::<_, String>(1)?),
        value: row.get(2)?,
        date: row.get(3)?,
    })
}

fn historical_row(row: &Row<'_>) -> rusqlite::Result<HistoricalRate> {
    Ok(HistoricalRate {
        base_currency_code: CurrencyCode::new(row.get::<_, String>(0)?),
        target_currency_code: CurrencyCode::new(row.get::<_, String>(1)?),
        date: row.get(2)?,
        value: row.get(3)?,
    })
}
