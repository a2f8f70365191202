//! Bounded historical-rate cache.
//!
//! Past days never change once published, so a cached day is treated as
//! authoritative forever. A window is served from cache as long as it is
//! missing no more than `gap_tolerance` days (weekends and holidays leave
//! gaps that no fetch would fill).

use std::sync::Arc;

use chrono::NaiveDate;
use fxcache_common::{parse_day, today, window_start, CurrencyCode};
use fxcache_store::{HistoricalRate, RateStore, WriteOp};
use tracing::{debug, info, instrument, warn};

use crate::catalog::CurrencyCatalog;
use crate::connectivity::ConnectivityProbe;
use crate::error::{FxError, FxResult};
use crate::metrics::CacheMetrics;
use crate::provider::{HistoricalRates, RemoteRateSource};

/// Daily rates for one currency pair, ascending by day.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalSeries {
    pub base: CurrencyCode,
    pub target: CurrencyCode,
    points: Vec<(NaiveDate, f64)>,
}

/// Extremes and mean of a [`HistoricalSeries`].
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSummary {
    pub min: (NaiveDate, f64),
    pub max: (NaiveDate, f64),
    pub average: f64,
}

impl HistoricalSeries {
    fn from_rows(base: &CurrencyCode, target: &CurrencyCode, rows: Vec<HistoricalRate>) -> Self {
        let mut points: Vec<_> = rows.iter().map(HistoricalRate::point).collect();
        points.sort_by_key(|(date, _)| *date);
        Self {
            base: base.clone(),
            target: target.clone(),
            points,
        }
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    pub fn into_points(self) -> Vec<(NaiveDate, f64)> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Minimum, maximum and average rate, or `None` for an empty series.
    ///
    /// Ties resolve to the earliest day.
    pub fn summary(&self) -> Option<SeriesSummary> {
        let first = *self.points.first()?;
        let (min, max, sum) = self.points.iter().fold(
            (first, first, 0.0),
            |(min, max, sum), &(date, value)| {
                let min = if value < min.1 { (date, value) } else { min };
                let max = if value > max.1 { (date, value) } else { max };
                (min, max, sum + value)
            },
        );

        Some(SeriesSummary {
            min,
            max,
            average: sum / self.points.len() as f64,
        })
    }
}

/// Serves historical rates per currency pair, fetching only when the cached
/// window has too many gaps.
pub struct HistoricalRateCache {
    store: Arc<dyn RateStore>,
    source: Arc<dyn RemoteRateSource>,
    probe: Arc<dyn ConnectivityProbe>,
    catalog: CurrencyCatalog,
    metrics: Arc<CacheMetrics>,
    gap_tolerance: u32,
}

impl HistoricalRateCache {
    /// Create a new cache tolerating one missing day per window.
    pub fn new(
        catalog: CurrencyCatalog,
        store: Arc<dyn RateStore>,
        source: Arc<dyn RemoteRateSource>,
        probe: Arc<dyn ConnectivityProbe>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            store,
            source,
            probe,
            catalog,
            metrics,
            gap_tolerance: 1,
        }
    }

    /// Set how many days a cached window may miss and still be served.
    pub fn with_gap_tolerance(mut self, days: u32) -> Self {
        self.gap_tolerance = days;
        self
    }

    /// Historical rates of `target` against the current base currency.
    pub async fn rates_against_base(
        &self,
        target: &CurrencyCode,
        window_days: u32,
    ) -> FxResult<HistoricalSeries> {
        let base = self.catalog.base_code()?;
        self.historical_rates(&base, target, window_days).await
    }

    /// Daily rates `base -> target` for the last `window_days` days up to today.
    ///
    /// If the remote fetch fails but some days are cached, the cached days are
    /// returned instead of the error.
    #[instrument(skip(self), fields(base = %base, target = %target))]
    pub async fn historical_rates(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
        window_days: u32,
    ) -> FxResult<HistoricalSeries> {
        let end = today();
        let start = window_start(end, window_days);

        let cached = self.store.historical_rates(base, target, start, end)?;
        let threshold = self.hit_threshold(window_days);

        if cached.len() >= threshold {
            CacheMetrics::incr(&self.metrics.history_cache_hits);
            debug!(cached = cached.len(), threshold, "Historical cache hit");
            return Ok(HistoricalSeries::from_rows(base, target, cached));
        }

        let fetched = if self.probe.is_reachable() {
            CacheMetrics::incr(&self.metrics.remote_calls);
            self.source
                .fetch_historical(base, target, start, end)
                .await
                .map_err(FxError::from)
        } else {
            Err(FxError::NoConnectivity)
        };

        match fetched {
            Ok(response) => {
                CacheMetrics::incr(&self.metrics.history_fetches);
                self.merge(base, target, &response)?;
                let rows = self.store.historical_rates(base, target, start, end)?;
                Ok(HistoricalSeries::from_rows(base, target, rows))
            }
            Err(e) if !cached.is_empty() => {
                CacheMetrics::incr(&self.metrics.history_fallbacks);
                warn!(
                    error = %e,
                    cached = cached.len(),
                    "Historical fetch failed, serving partial cache"
                );
                Ok(HistoricalSeries::from_rows(base, target, cached))
            }
            Err(e) => Err(e),
        }
    }

    /// Minimum number of cached days for a window to be served without a fetch.
    fn hit_threshold(&self, window_days: u32) -> usize {
        window_days.saturating_sub(self.gap_tolerance) as usize
    }

    /// Upsert every parseable day of `response` that carries a `target` rate.
    fn merge(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
        response: &HistoricalRates,
    ) -> FxResult<()> {
        if response.base != *base {
            warn!(
                requested = %base,
                received = %response.base,
                "Historical response base differs, keying rows by requested base"
            );
        }

        let mut points = Vec::with_capacity(response.rates.len());
        let mut skipped = 0u64;

        for (day, rates) in &response.rates {
            let date = match parse_day(day) {
                Ok(date) => date,
                Err(e) => {
                    let err = FxError::ParseFailure {
                        context: format!("{} for {}/{}", e, base, target),
                    };
                    warn!(error = %err, "Skipping historical row");
                    skipped += 1;
                    continue;
                }
            };

            let value = rates
                .iter()
                .find(|(code, _)| CurrencyCode::new(code.as_str()) == *target)
                .map(|(_, value)| *value);

            match value {
                Some(value) if value.is_finite() => points.push((date, value)),
                Some(_) => {
                    warn!(day = %date, "Skipping non-finite historical rate");
                    skipped += 1;
                }
                None => debug!(day = %date, "No rate for target on day"),
            }
        }

        CacheMetrics::add(&self.metrics.history_rows_skipped, skipped);
        let stored = points.len();

        self.store.apply(
            WriteOp::UpsertHistorical {
                base: base.clone(),
                target: target.clone(),
                points,
            }
            .into(),
        )?;

        info!(
            source = self.source.name(),
            stored,
            skipped,
            "Merged historical rates"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::StaticConnectivity;
    use crate::provider::{MockRateSource, SourceError};
    use chrono::Duration;
    use fxcache_common::format_day;
    use fxcache_store::{CurrencyRecord, MemoryRateStore, Rate, StoreError, StoreResult, WriteBatch};

    struct Fixture {
        store: Arc<MemoryRateStore>,
        source: Arc<MockRateSource>,
        probe: Arc<StaticConnectivity>,
        cache: HistoricalRateCache,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryRateStore::new());
        let source = Arc::new(MockRateSource::new("test"));
        let probe = Arc::new(StaticConnectivity::online());
        let cache = HistoricalRateCache::new(
            CurrencyCatalog::new(store.clone(), CurrencyCode::usd()),
            store.clone(),
            source.clone(),
            probe.clone(),
            Arc::new(CacheMetrics::new()),
        );
        Fixture {
            store,
            source,
            probe,
            cache,
        }
    }

    fn days_ago(n: i64) -> NaiveDate {
        today() - Duration::days(n)
    }

    fn seed(store: &MemoryRateStore, days: &[i64]) {
        store
            .apply(
                WriteOp::UpsertHistorical {
                    base: CurrencyCode::usd(),
                    target: CurrencyCode::eur(),
                    points: days.iter().map(|d| (days_ago(*d), 0.9 + *d as f64 / 100.0)).collect(),
                }
                .into(),
            )
            .unwrap();
    }

    fn serve_remote(source: &MockRateSource, days: &[i64]) {
        for d in days {
            source.set_historical("USD", "EUR", &format_day(days_ago(*d)), 0.8);
        }
    }

    #[tokio::test]
    async fn test_window_with_one_gap_is_served_from_cache() {
        let f = fixture();
        seed(&f.store, &[1, 2, 3, 4, 5, 6]);

        let series = f
            .cache
            .historical_rates(&CurrencyCode::usd(), &CurrencyCode::eur(), 7)
            .await
            .unwrap();

        assert_eq!(series.len(), 6);
        assert_eq!(f.source.historical_calls(), 0);
        let dates: Vec<_> = series.points().iter().map(|(d, _)| *d).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
    }

    #[tokio::test]
    async fn test_sparse_cache_is_merged_with_fetch() {
        let f = fixture();
        seed(&f.store, &[1, 2]);
        serve_remote(&f.source, &[0, 1, 2, 3, 4, 5, 6, 7]);

        let series = f
            .cache
            .historical_rates(&CurrencyCode::usd(), &CurrencyCode::eur(), 7)
            .await
            .unwrap();

        assert_eq!(f.source.historical_calls(), 1);
        assert_eq!(series.len(), 8);
        assert_eq!(series.points().first().unwrap().0, days_ago(7));
        assert_eq!(series.points().last().unwrap().0, days_ago(0));
        // Fetched values overwrite cached ones for the same day.
        assert!(series.points().iter().all(|(_, v)| *v == 0.8));
    }

    #[tokio::test]
    async fn test_fetch_failure_returns_partial_cache() {
        let f = fixture();
        seed(&f.store, &[2, 3]);
        f.source.fail_with(SourceError::RequestFailed("timeout".into()));

        let series = f
            .cache
            .historical_rates(&CurrencyCode::usd(), &CurrencyCode::eur(), 7)
            .await
            .unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(f.source.historical_calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_without_cache_propagates() {
        let f = fixture();
        f.source.fail_with(SourceError::Server("quota".into()));

        let result = f
            .cache
            .historical_rates(&CurrencyCode::usd(), &CurrencyCode::eur(), 7)
            .await;

        assert_eq!(
            result,
            Err(FxError::RemoteFetchFailed(SourceError::Server("quota".into())))
        );
    }

    #[tokio::test]
    async fn test_offline_skips_remote() {
        let f = fixture();
        f.probe.set_reachable(false);

        let result = f
            .cache
            .historical_rates(&CurrencyCode::usd(), &CurrencyCode::eur(), 7)
            .await;
        assert_eq!(result, Err(FxError::NoConnectivity));

        seed(&f.store, &[1]);
        let series = f
            .cache
            .historical_rates(&CurrencyCode::usd(), &CurrencyCode::eur(), 7)
            .await
            .unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(f.source.historical_calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_days_are_skipped() {
        let f = fixture();
        serve_remote(&f.source, &[1, 2, 3]);
        f.source.set_historical("USD", "EUR", "not-a-day", 0.7);
        f.source.set_historical("USD", "EUR", "2024/01/01", 0.7);

        let series = f
            .cache
            .historical_rates(&CurrencyCode::usd(), &CurrencyCode::eur(), 7)
            .await
            .unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(f.cache.metrics.snapshot().history_rows_skipped, 2);
    }

    #[tokio::test]
    async fn test_rates_against_base_uses_catalog() {
        let f = fixture();
        serve_remote(&f.source, &[1, 2]);

        let series = f.cache.rates_against_base(&CurrencyCode::eur(), 7).await.unwrap();

        assert_eq!(series.base, CurrencyCode::usd());
        assert_eq!(series.len(), 2);
    }

    #[tokio::test]
    async fn test_huge_window_falls_back_to_cache() {
        let f = fixture();
        seed(&f.store, &[1, 2]);
        f.probe.set_reachable(false);

        let series = f
            .cache
            .historical_rates(&CurrencyCode::usd(), &CurrencyCode::eur(), 200_000_000)
            .await
            .unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(f.cache.metrics.snapshot().history_fallbacks, 1);
    }

    #[test]
    fn test_hit_threshold_allows_gaps() {
        let f = fixture();
        assert_eq!(f.cache.hit_threshold(7), 6);
        assert_eq!(f.cache.hit_threshold(1), 0);
        assert_eq!(f.cache.hit_threshold(0), 0);

        let strict = fixture().cache.with_gap_tolerance(0);
        assert_eq!(strict.hit_threshold(7), 7);
    }

    /// Store whose writes always fail.
    struct ReadOnlyStore(MemoryRateStore);

    impl RateStore for ReadOnlyStore {
        fn base_currency(&self) -> StoreResult<Option<CurrencyRecord>> {
            self.0.base_currency()
        }
        fn currency(&self, code: &CurrencyCode) -> StoreResult<Option<CurrencyRecord>> {
            self.0.currency(code)
        }
        fn currencies(&self) -> StoreResult<Vec<CurrencyRecord>> {
            self.0.currencies()
        }
        fn rates_for_base(&self, base: &CurrencyCode) -> StoreResult<Vec<Rate>> {
            self.0.rates_for_base(base)
        }
        fn rate(&self, base: &CurrencyCode, target: &CurrencyCode) -> StoreResult<Option<Rate>> {
            self.0.rate(base, target)
        }
        fn historical_rates(
            &self,
            base: &CurrencyCode,
            target: &CurrencyCode,
            from: NaiveDate,
            to: NaiveDate,
        ) -> StoreResult<Vec<HistoricalRate>> {
            self.0.historical_rates(base, target, from, to)
        }
        fn apply(&self, _batch: WriteBatch) -> StoreResult<()> {
            Err(StoreError::Io("read-only".into()))
        }
    }

    #[tokio::test]
    async fn test_merge_failure_is_surfaced_over_cache() {
        let inner = MemoryRateStore::new();
        seed(&inner, &[2, 3]);
        let store: Arc<dyn RateStore> = Arc::new(ReadOnlyStore(inner));
        let source = Arc::new(MockRateSource::new("test"));
        serve_remote(&source, &[0, 1, 2, 3, 4, 5, 6, 7]);
        let metrics = Arc::new(CacheMetrics::new());
        let cache = HistoricalRateCache::new(
            CurrencyCatalog::new(store.clone(), CurrencyCode::usd()),
            store.clone(),
            source.clone(),
            Arc::new(StaticConnectivity::online()),
            metrics.clone(),
        );

        let result = cache
            .historical_rates(&CurrencyCode::usd(), &CurrencyCode::eur(), 7)
            .await;

        assert_eq!(
            result,
            Err(FxError::PersistenceFailure(StoreError::Io("read-only".into())))
        );
        assert_eq!(source.historical_calls(), 1);
        assert_eq!(metrics.snapshot().history_fallbacks, 0);

        let rows = store
            .historical_rates(&CurrencyCode::usd(), &CurrencyCode::eur(), days_ago(7), today())
            .unwrap();
        let days: Vec<_> = rows.iter().map(|r| r.date).collect();
        assert_eq!(days, vec![days_ago(3), days_ago(2)]);
        assert!(rows.iter().all(|r| r.value != 0.8));
    }

    #[test]
    fn test_summary() {
        let d = |n| NaiveDate::from_ymd_opt(2024, 6, n).unwrap();
        let series = HistoricalSeries {
            base: CurrencyCode::usd(),
            target: CurrencyCode::eur(),
            points: vec![(d(1), 0.90), (d(2), 0.95), (d(3), 0.85), (d(4), 0.90)],
        };

        let summary = series.summary().unwrap();

        assert_eq!(summary.min, (d(3), 0.85));
        assert_eq!(summary.max, (d(2), 0.95));
        assert!((summary.average - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_empty_summary() {
        let series = HistoricalSeries::from_rows(&CurrencyCode::usd(), &CurrencyCode::eur(), Vec::new());
        assert!(series.summary().is_none());
    }
}
