//! Engine facade wiring the caches and the converter over shared collaborators.

use std::sync::Arc;

use fxcache_common::CurrencyCode;
use fxcache_store::{CurrencyRecord, Rate, RateStore};
use tracing::{info, instrument};

use crate::cache::RateCache;
use crate::catalog::CurrencyCatalog;
use crate::config::FxEngineConfig;
use crate::connectivity::ConnectivityProbe;
use crate::conversion::{Conversion, ConversionEngine};
use crate::error::FxResult;
use crate::historical::{HistoricalRateCache, HistoricalSeries};
use crate::metrics::{CacheMetrics, MetricsSnapshot};
use crate::provider::RemoteRateSource;

/// The main FX engine.
pub struct FxEngine {
    catalog: CurrencyCatalog,
    rates: RateCache,
    history: HistoricalRateCache,
    converter: ConversionEngine,
    metrics: Arc<CacheMetrics>,
    config: FxEngineConfig,
}

impl FxEngine {
    /// Create a new engine. All components share `store`, `source` and `probe`.
    pub fn new(
        store: Arc<dyn RateStore>,
        source: Arc<dyn RemoteRateSource>,
        probe: Arc<dyn ConnectivityProbe>,
        config: FxEngineConfig,
    ) -> Self {
        let metrics = Arc::new(CacheMetrics::new());
        let catalog = CurrencyCatalog::new(store.clone(), config.default_base.clone());

        let rates = RateCache::new(
            catalog.clone(),
            store.clone(),
            source.clone(),
            probe.clone(),
            metrics.clone(),
        )
        .with_coalescing(config.coalesce_refreshes);

        let history = HistoricalRateCache::new(
            catalog.clone(),
            store.clone(),
            source.clone(),
            probe,
            metrics.clone(),
        )
        .with_gap_tolerance(config.history_gap_tolerance);

        let converter = ConversionEngine::new(catalog.clone(), store);

        info!(
            source = source.name(),
            default_base = %config.default_base,
            coalesce = config.coalesce_refreshes,
            "FX engine initialized"
        );

        Self {
            catalog,
            rates,
            history,
            converter,
            metrics,
            config,
        }
    }

    pub fn catalog(&self) -> &CurrencyCatalog {
        &self.catalog
    }

    pub fn rate_cache(&self) -> &RateCache {
        &self.rates
    }

    pub fn historical_cache(&self) -> &HistoricalRateCache {
        &self.history
    }

    pub fn converter(&self) -> &ConversionEngine {
        &self.converter
    }

    pub fn config(&self) -> &FxEngineConfig {
        &self.config
    }

    /// Get current metrics snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn base_currency(&self) -> FxResult<CurrencyRecord> {
        self.catalog.base_currency()
    }

    pub fn currencies(&self) -> FxResult<Vec<CurrencyRecord>> {
        self.catalog.all_currencies()
    }

    pub async fn current_rates(&self) -> FxResult<Vec<Rate>> {
        self.rates.current_rates().await
    }

    pub async fn refresh(&self) -> FxResult<()> {
        self.rates.refresh().await
    }

    /// Switch the base currency and load its rates.
    ///
    /// The base change is committed even if the refresh fails.
    #[instrument(skip(self), fields(code = %code))]
    pub async fn switch_base(&self, code: &CurrencyCode) -> FxResult<()> {
        self.catalog.set_base_currency(code)?;
        self.rates.refresh().await
    }

    pub fn convert(&self, amount: f64, from: &CurrencyCode, to: &CurrencyCode) -> FxResult<f64> {
        self.converter.convert(amount, from, to)
    }

    pub fn quote(&self, amount: f64, from: &CurrencyCode, to: &CurrencyCode) -> FxResult<Conversion> {
        self.converter.quote(amount, from, to)
    }

    /// Quote a conversion, loading the base currency's rates first when the
    /// pair needs them.
    ///
    /// Converting a currency to itself never touches the cache or the network.
    pub async fn quote_with_rates(
        &self,
        amount: f64,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> FxResult<Conversion> {
        if from != to {
            self.rates.current_rates().await?;
        }
        self.converter.quote(amount, from, to)
    }

    /// Historical rates of `target` against the base currency.
    ///
    /// `window_days` defaults to the configured window.
    pub async fn history(
        &self,
        target: &CurrencyCode,
        window_days: Option<u32>,
    ) -> FxResult<HistoricalSeries> {
        let days = window_days.unwrap_or(self.config.history_window_days);
        self.history.rates_against_base(target, days).await
    }
}
