//! The rate store interface.

use chrono::NaiveDate;
use fxcache_common::CurrencyCode;

use crate::batch::WriteBatch;
use crate::error::StoreResult;
use crate::record::{CurrencyRecord, HistoricalRate, Rate};

/// Transactional storage for currencies, current rates and historical rates.
///
/// Reads return owned snapshots. The only way to mutate state is
/// [`RateStore::apply`], which commits a whole batch or nothing.
pub trait RateStore: Send + Sync {
    /// The currency currently flagged as base, if any.
    fn base_currency(&self) -> StoreResult<Option<CurrencyRecord>>;

    /// Look up a single currency.
    fn currency(&self, code: &CurrencyCode) -> StoreResult<Option<CurrencyRecord>>;

    /// All known currencies, ordered by code.
    fn currencies(&self) -> StoreResult<Vec<CurrencyRecord>>;

    /// Current rates owned by `base`, ordered by target code.
    fn rates_for_base(&self, base: &CurrencyCode) -> StoreResult<Vec<Rate>>;

    /// The current rate `base -> target`.
    fn rate(&self, base: &CurrencyCode, target: &CurrencyCode) -> StoreResult<Option<Rate>>;

    /// Historical rates for a pair with `from <= date <= to`, ascending by date.
    fn historical_rates(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<HistoricalRate>>;

    /// Apply a batch atomically.
    ///
    /// On error the store is left exactly as it was before the call.
    fn apply(&self, batch: WriteBatch) -> StoreResult<()>;
}
