//! Record types handed out by the store.
//!
//! Records are immutable snapshots. Mutation only happens through
//! [`WriteBatch`](crate::WriteBatch)es applied by a [`RateStore`](crate::RateStore).

use chrono::NaiveDate;
use fxcache_common::{CurrencyCode, Timestamp};
use serde::{Deserialize, Serialize};

/// A known currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRecord {
    /// Currency code (unique key).
    pub code: CurrencyCode,
    /// Whether this is the current base currency.
    pub is_base: bool,
    /// Last successful refresh with this currency as base.
    pub last_updated: Option<Timestamp>,
}

impl CurrencyRecord {
    /// Create a non-base currency that has never been refreshed.
    pub fn new(code: CurrencyCode) -> Self {
        Self {
            code,
            is_base: false,
            last_updated: None,
        }
    }
}

/// Current exchange rate from a base currency to a target currency.
///
/// `1 base = value target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    /// Target currency.
    pub currency_code: CurrencyCode,
    /// Owning base currency.
    pub base_currency: CurrencyCode,
    /// Rate value.
    pub value: f64,
    /// When this rate was last written.
    pub date: Timestamp,
}

/// Exchange rate for a single past calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRate {
    pub base_currency_code: CurrencyCode,
    pub target_currency_code: CurrencyCode,
    pub date: NaiveDate,
    pub value: f64,
}

impl HistoricalRate {
    /// The `(day, value)` point used for charting.
    pub fn point(&self) -> (NaiveDate, f64) {
        (self.date, self.value)
    }
}
