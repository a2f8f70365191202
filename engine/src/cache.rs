//! Current-rate cache with offline fallback and refresh coalescing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use fxcache_common::{now, CurrencyCode, Timestamp};
use fxcache_store::{Rate, RateStore, WriteOp};
use tracing::{debug, info, instrument, warn};

use crate::catalog::CurrencyCatalog;
use crate::connectivity::ConnectivityProbe;
use crate::error::{FxError, FxResult};
use crate::metrics::CacheMetrics;
use crate::provider::{RemoteRateSource, SourceError};

/// Collaborators a refresh needs. Shared with spawned refresh tasks.
struct RefreshContext {
    store: Arc<dyn RateStore>,
    source: Arc<dyn RemoteRateSource>,
    probe: Arc<dyn ConnectivityProbe>,
    metrics: Arc<CacheMetrics>,
}

impl RefreshContext {
    async fn refresh(&self, base: CurrencyCode) -> FxResult<()> {
        CacheMetrics::incr(&self.metrics.refreshes_started);

        let result = self.fetch_and_store(&base).await;
        match &result {
            Ok(()) => CacheMetrics::incr(&self.metrics.refreshes_succeeded),
            Err(e) => {
                CacheMetrics::incr(&self.metrics.refreshes_failed);
                warn!(base = %base, error = %e, code = e.error_code(), "Rate refresh failed");
            }
        }
        result
    }

    async fn fetch_and_store(&self, base: &CurrencyCode) -> FxResult<()> {
        if !self.probe.is_reachable() {
            let cached = self.store.rates_for_base(base)?.len();
            if cached == 0 {
                return Err(FxError::NoConnectivity);
            }
            CacheMetrics::incr(&self.metrics.offline_fallbacks);
            info!(base = %base, cached, "Offline, serving cached rates");
            return Ok(());
        }

        CacheMetrics::incr(&self.metrics.remote_calls);
        let response = self.source.fetch_latest(base).await?;

        if response.base != *base {
            return Err(SourceError::InvalidResponse(format!(
                "requested rates for {}, received {}",
                base, response.base
            ))
            .into());
        }

        let rates: Vec<(CurrencyCode, f64)> = response
            .rates
            .into_iter()
            .filter_map(|(code, value)| {
                if value.is_finite() {
                    Some((CurrencyCode::new(code), value))
                } else {
                    warn!(base = %base, currency = %code, "Skipping non-finite rate");
                    None
                }
            })
            .collect();
        let count = rates.len();

        self.store.apply(
            WriteOp::UpsertRates {
                base: base.clone(),
                rates,
                fetched_at: now(),
            }
            .into(),
        )?;

        info!(
            base = %base,
            source = self.source.name(),
            rates = count,
            "Stored latest rates"
        );
        Ok(())
    }
}

/// One refresh in progress for a base currency.
#[derive(Clone)]
struct Flight {
    outcome: Shared<BoxFuture<'static, FxResult<()>>>,
    finished: Arc<AtomicBool>,
}

/// Serves current rates for the base currency from the store and refreshes
/// them from the remote source.
pub struct RateCache {
    context: Arc<RefreshContext>,
    catalog: CurrencyCatalog,
    in_flight: DashMap<CurrencyCode, Flight>,
    coalesce: bool,
}

impl RateCache {
    /// Create a new rate cache. Refresh coalescing is enabled.
    pub fn new(
        catalog: CurrencyCatalog,
        store: Arc<dyn RateStore>,
        source: Arc<dyn RemoteRateSource>,
        probe: Arc<dyn ConnectivityProbe>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            context: Arc::new(RefreshContext {
                store,
                source,
                probe,
                metrics,
            }),
            catalog,
            in_flight: DashMap::new(),
            coalesce: true,
        }
    }

    /// Enable or disable sharing of in-flight refreshes.
    ///
    /// Without coalescing, concurrent refreshes race and the last commit wins.
    pub fn with_coalescing(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }

    /// Current rates for the base currency, ordered by currency code.
    ///
    /// Served from cache when the base already owns rates; otherwise a refresh
    /// runs first.
    #[instrument(skip(self))]
    pub async fn current_rates(&self) -> FxResult<Vec<Rate>> {
        let base = self.catalog.base_code()?;

        let cached = self.context.store.rates_for_base(&base)?;
        if !cached.is_empty() {
            debug!(base = %base, rates = cached.len(), "Cache hit");
            return Ok(sorted(cached));
        }

        debug!(base = %base, "Cache miss");
        self.refresh_base(base.clone()).await?;

        Ok(sorted(self.context.store.rates_for_base(&base)?))
    }

    /// Refresh the rates of the current base currency.
    ///
    /// Offline, this succeeds only if cached rates exist. Online, remote
    /// failures are returned as-is without falling back to the cache.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> FxResult<()> {
        let base = self.catalog.base_code()?;
        self.refresh_base(base).await
    }

    /// When the current base currency's rates were last refreshed.
    pub fn last_updated(&self) -> FxResult<Option<Timestamp>> {
        Ok(self.catalog.base_currency()?.last_updated)
    }

    async fn refresh_base(&self, base: CurrencyCode) -> FxResult<()> {
        if !self.coalesce {
            return self.context.refresh(base).await;
        }

        let flight = self.join_or_start(&base);
        let result = flight.outcome.clone().await;
        self.in_flight
            .remove_if(&base, |_, f| f.outcome.ptr_eq(&flight.outcome));
        result
    }

    fn join_or_start(&self, base: &CurrencyCode) -> Flight {
        match self.in_flight.entry(base.clone()) {
            Entry::Occupied(entry) if !entry.get().finished.load(Ordering::SeqCst) => {
                CacheMetrics::incr(&self.context.metrics.coalesced_joins);
                debug!(base = %base, "Joining in-flight refresh");
                entry.get().clone()
            }
            entry => {
                let flight = self.start(base.clone());
                entry.insert(flight.clone());
                flight
            }
        }
    }

    /// Spawn the refresh so it completes even if every caller stops waiting.
    fn start(&self, base: CurrencyCode) -> Flight {
        let context = self.context.clone();
        let finished = Arc::new(AtomicBool::new(false));
        let done = finished.clone();

        let task = tokio::spawn(async move {
            let result = context.refresh(base).await;
            done.store(true, Ordering::SeqCst);
            result
        });

        let outcome = async move {
            task.await.unwrap_or_else(|e| {
                Err(FxError::RemoteFetchFailed(SourceError::RequestFailed(
                    format!("refresh task failed: {}", e),
                )))
            })
        }
        .boxed()
        .shared();

        Flight { outcome, finished }
    }
}

fn sorted(mut rates: Vec<Rate>) -> Vec<Rate> {
    rates.sort_by(|a, b| a.currency_code.cmp(&b.currency_code));
    rates
}
