//! Known currencies and the base currency.

use std::sync::Arc;

use fxcache_common::CurrencyCode;
use fxcache_store::{CurrencyRecord, RateStore, WriteOp};
use tracing::{info, instrument};

use crate::error::FxResult;

/// Tracks the known currencies and which one is the base.
#[derive(Clone)]
pub struct CurrencyCatalog {
    store: Arc<dyn RateStore>,
    default_base: CurrencyCode,
}

impl CurrencyCatalog {
    /// Create a catalog that falls back to `default_base` when no base is set.
    pub fn new(store: Arc<dyn RateStore>, default_base: CurrencyCode) -> Self {
        Self {
            store,
            default_base,
        }
    }

    /// The current base currency.
    ///
    /// If no currency is flagged as base yet, the default is created and
    /// flagged in one transaction, so callers never observe "no base".
    pub fn base_currency(&self) -> FxResult<CurrencyRecord> {
        if let Some(base) = self.store.base_currency()? {
            return Ok(base);
        }

        info!(code = %self.default_base, "No base currency set, using default");
        self.store
            .apply(WriteOp::SetBaseIfUnset(self.default_base.clone()).into())?;

        Ok(self.store.base_currency()?.unwrap_or_else(|| CurrencyRecord {
            code: self.default_base.clone(),
            is_base: true,
            last_updated: None,
        }))
    }

    /// Code of the current base currency.
    pub fn base_code(&self) -> FxResult<CurrencyCode> {
        Ok(self.base_currency()?.code)
    }

    /// Make `code` the base currency, creating it if unknown.
    ///
    /// Cached rates of the previous base are kept.
    #[instrument(skip(self), fields(code = %code))]
    pub fn set_base_currency(&self, code: &CurrencyCode) -> FxResult<()> {
        self.store.apply(WriteOp::SetBase(code.clone()).into())?;
        info!("Base currency changed");
        Ok(())
    }

    /// Snapshot of every known currency.
    pub fn all_currencies(&self) -> FxResult<Vec<CurrencyRecord>> {
        Ok(self.store.currencies()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxcache_store::MemoryRateStore;

    fn catalog() -> (Arc<MemoryRateStore>, CurrencyCatalog) {
        let store = Arc::new(MemoryRateStore::new());
        let catalog = CurrencyCatalog::new(store.clone(), CurrencyCode::eur());
        (store, catalog)
    }

    #[test]
    fn test_default_base_is_created() {
        let (store, catalog) = catalog();

        let base = catalog.base_currency().unwrap();

        assert_eq!(base.code, CurrencyCode::eur());
        assert!(base.is_base);
        assert_eq!(
            store.base_currency().unwrap().map(|c| c.code),
            Some(CurrencyCode::eur())
        );
    }

    #[test]
    fn test_set_base_currency_moves_flag() {
        let (_, catalog) = catalog();
        catalog.base_currency().unwrap();

        catalog.set_base_currency(&CurrencyCode::usd()).unwrap();

        assert_eq!(catalog.base_code().unwrap(), CurrencyCode::usd());
        let bases: Vec<_> = catalog
            .all_currencies()
            .unwrap()
            .into_iter()
            .filter(|c| c.is_base)
            .collect();
        assert_eq!(bases.len(), 1);
        assert_eq!(catalog.all_currencies().unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_code_is_accepted() {
        let (_, catalog) = catalog();

        catalog.set_base_currency(&CurrencyCode::new("xyz")).unwrap();

        assert_eq!(catalog.base_code().unwrap(), CurrencyCode::new("XYZ"));
    }
}
