//! fxcache Rate Store
//!
//! Transactional storage for currencies, current rates and historical rates.
//! All writes go through [`WriteBatch`]es that are applied atomically: readers
//! observe either the state before a batch or the state after it.

pub mod batch;
pub mod error;
pub mod memory;
pub mod record;
pub mod repository;
pub mod sqlite;
mod state;

pub use batch::{WriteBatch, WriteOp};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryRateStore;
pub use record::{CurrencyRecord, HistoricalRate, Rate};
pub use repository::RateStore;
pub use sqlite::SqliteRateStore;
