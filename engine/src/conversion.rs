//! Currency conversion over cached rates.
//!
//! Every route goes through the base currency: stored rates are always
//! `1 base = value target`, so `from -> to` is `amount / rate(from) * rate(to)`.
//! No rounding happens here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fxcache_common::CurrencyCode;
use fxcache_store::RateStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::catalog::CurrencyCatalog;
use crate::error::{FxError, FxResult};

/// A completed conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    /// Unique conversion ID.
    pub id: Uuid,
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    /// Input amount, in `from`.
    pub amount: f64,
    /// Output amount, in `to`.
    pub result: f64,
    /// Base currency the rates were read against.
    pub base: CurrencyCode,
    pub executed_at: DateTime<Utc>,
}

impl Conversion {
    /// Get the effective rate used (`to` per `from`).
    pub fn effective_rate(&self) -> f64 {
        if self.amount == 0.0 {
            return 0.0;
        }
        self.result / self.amount
    }
}

/// Amount and currency pair to convert.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub amount: f64,
    pub from: CurrencyCode,
    pub to: CurrencyCode,
}

impl ConversionRequest {
    pub fn new(amount: f64, from: CurrencyCode, to: CurrencyCode) -> Self {
        Self { amount, from, to }
    }

    /// Same amount, opposite direction.
    pub fn swap(self) -> Self {
        Self {
            amount: self.amount,
            from: self.to,
            to: self.from,
        }
    }
}

/// Converts amounts using the rates cached for the current base currency.
///
/// Performs no I/O beyond store reads.
#[derive(Clone)]
pub struct ConversionEngine {
    catalog: CurrencyCatalog,
    store: Arc<dyn RateStore>,
}

impl ConversionEngine {
    pub fn new(catalog: CurrencyCatalog, store: Arc<dyn RateStore>) -> Self {
        Self { catalog, store }
    }

    /// Convert `amount` from one currency to another.
    pub fn convert(&self, amount: f64, from: &CurrencyCode, to: &CurrencyCode) -> FxResult<f64> {
        if from == to {
            return Ok(amount);
        }

        let base = self.catalog.base_code()?;
        self.convert_against(&base, amount, from, to)
    }

    /// Convert and return a full record of the conversion.
    #[instrument(skip(self), fields(from = %from, to = %to))]
    pub fn quote(&self, amount: f64, from: &CurrencyCode, to: &CurrencyCode) -> FxResult<Conversion> {
        let base = self.catalog.base_code()?;
        let result = if from == to {
            amount
        } else {
            self.convert_against(&base, amount, from, to)?
        };

        debug!(amount, result, base = %base, "Conversion quoted");

        Ok(Conversion {
            id: Uuid::now_v7(),
            from: from.clone(),
            to: to.clone(),
            amount,
            result,
            base,
            executed_at: Utc::now(),
        })
    }

    /// Quote a [`ConversionRequest`].
    pub fn quote_request(&self, request: &ConversionRequest) -> FxResult<Conversion> {
        self.quote(request.amount, &request.from, &request.to)
    }

    fn convert_against(
        &self,
        base: &CurrencyCode,
        amount: f64,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> FxResult<f64> {
        if from == base {
            return Ok(amount * self.rate(base, to)?);
        }

        let from_rate = self.divisor(base, from)?;
        if to == base {
            return Ok(amount / from_rate);
        }

        let to_rate = self.rate(base, to)?;
        Ok(amount / from_rate * to_rate)
    }

    fn rate(&self, base: &CurrencyCode, currency: &CurrencyCode) -> FxResult<f64> {
        self.store
            .rate(base, currency)?
            .map(|rate| rate.value)
            .ok_or_else(|| FxError::RateNotFound {
                base: base.clone(),
                currency: currency.clone(),
            })
    }

    /// A rate that is about to be divided by.
    fn divisor(&self, base: &CurrencyCode, currency: &CurrencyCode) -> FxResult<f64> {
        let value = self.rate(base, currency)?;
        if value <= 0.0 {
            return Err(FxError::InvalidRate {
                base: base.clone(),
                currency: currency.clone(),
                value,
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxcache_common::now;
    use fxcache_store::{MemoryRateStore, WriteBatch, WriteOp};

    fn engine(rates: &[(&str, f64)]) -> ConversionEngine {
        let store = Arc::new(MemoryRateStore::new());
        store
            .apply(
                WriteBatch::new()
                    .push(WriteOp::SetBase(CurrencyCode::usd()))
                    .push(WriteOp::UpsertRates {
                        base: CurrencyCode::usd(),
                        rates: rates
                            .iter()
                            .map(|(c, v)| (CurrencyCode::new(*c), *v))
                            .collect(),
                        fetched_at: now(),
                    }),
            )
            .unwrap();
        let catalog = CurrencyCatalog::new(store.clone(), CurrencyCode::eur());
        ConversionEngine::new(catalog, store)
    }

    #[test]
    fn test_identity() {
        let engine = engine(&[]);
        let xyz = CurrencyCode::new("XYZ");

        assert_eq!(engine.convert(42.5, &xyz, &xyz), Ok(42.5));
    }

    #[test]
    fn test_from_base() {
        let engine = engine(&[("EUR", 0.9)]);

        let result = engine
            .convert(100.0, &CurrencyCode::usd(), &CurrencyCode::eur())
            .unwrap();

        assert_eq!(result, 100.0 * 0.9);
    }

    #[test]
    fn test_to_base() {
        let engine = engine(&[("EUR", 0.9)]);

        let result = engine
            .convert(90.0, &CurrencyCode::eur(), &CurrencyCode::usd())
            .unwrap();

        assert_eq!(result, 90.0 / 0.9);
    }

    #[test]
    fn test_triangulation() {
        let engine = engine(&[("EUR", 0.9), ("GBP", 0.8)]);

        let result = engine
            .convert(100.0, &CurrencyCode::eur(), &CurrencyCode::gbp())
            .unwrap();

        assert_eq!(result, (100.0 / 0.9) * 0.8);
        assert!((result - 88.888_888).abs() < 1e-5);
    }

    #[test]
    fn test_missing_rate() {
        let engine = engine(&[("EUR", 0.9)]);

        let result = engine.convert(1.0, &CurrencyCode::eur(), &CurrencyCode::jpy());

        assert_eq!(
            result,
            Err(FxError::RateNotFound {
                base: CurrencyCode::usd(),
                currency: CurrencyCode::jpy(),
            })
        );
    }

    #[test]
    fn test_zero_rate_is_never_divided_by() {
        let engine = engine(&[("EUR", 0.0), ("GBP", 0.8)]);

        for to in [CurrencyCode::usd(), CurrencyCode::gbp()] {
            let result = engine.convert(10.0, &CurrencyCode::eur(), &to);
            assert!(matches!(result, Err(FxError::InvalidRate { value, .. }) if value == 0.0));
        }
    }

    #[test]
    fn test_quote_and_swap() {
        let engine = engine(&[("EUR", 0.5)]);
        let request = ConversionRequest::new(10.0, CurrencyCode::usd(), CurrencyCode::eur());

        let quote = engine.quote_request(&request).unwrap();
        assert_eq!(quote.result, 5.0);
        assert_eq!(quote.base, CurrencyCode::usd());
        assert_eq!(quote.effective_rate(), 0.5);

        let back = engine.quote_request(&request.swap()).unwrap();
        assert_eq!(back.from, CurrencyCode::eur());
        assert_eq!(back.result, 20.0);
        assert_ne!(quote.id, back.id);
    }
}
