//! Volatile in-memory store.

use chrono::NaiveDate;
use fxcache_common::CurrencyCode;
use parking_lot::RwLock;

use crate::batch::WriteBatch;
use crate::error::StoreResult;
use crate::record::{CurrencyRecord, HistoricalRate, Rate};
use crate::repository::RateStore;
use crate::state::StoreState;

/// Rate store kept entirely in memory.
///
/// Used for tests and for sessions that should not touch disk.
#[derive(Debug, Default)]
pub struct MemoryRateStore {
    state: RwLock<StoreState>,
}

impl MemoryRateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateStore for MemoryRateStore {
    fn base_currency(&self) -> StoreResult<Option<CurrencyRecord>> {
        Ok(self.state.read().base_currency())
    }

    fn currency(&self, code: &CurrencyCode) -> StoreResult<Option<CurrencyRecord>> {
        Ok(self.state.read().currency(code))
    }

    fn currencies(&self) -> StoreResult<Vec<CurrencyRecord>> {
        Ok(self.state.read().currencies())
    }

    fn rates_for_base(&self, base: &CurrencyCode) -> StoreResult<Vec<Rate>> {
        Ok(self.state.read().rates_for_base(base))
    }

    fn rate(&self, base: &CurrencyCode, target: &CurrencyCode) -> StoreResult<Option<Rate>> {
        Ok(self.state.read().rate(base, target))
    }

    fn historical_rates(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<HistoricalRate>> {
        Ok(self.state.read().historical_rates(base, target, from, to))
    }

    fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut state = self.state.write();
        let next = state.staged(&batch)?;
        *state = next;
        Ok(())
    }
}
