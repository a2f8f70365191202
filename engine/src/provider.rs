//! Remote rate source trait and payloads.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use fxcache_common::CurrencyCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Latest rates for a base currency, as returned by a remote source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestRates {
    /// Base currency the rates are expressed against.
    pub base: CurrencyCode,
    /// Target code -> rate (`1 base = rate target`).
    pub rates: HashMap<String, f64>,
}

/// Historical rates for a base currency over a span of days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRates {
    pub base: CurrencyCode,
    /// `YYYY-MM-DD` day -> (target code -> rate).
    ///
    /// Days are kept as the remote sent them; the cache parses and skips
    /// malformed ones individually.
    pub rates: BTreeMap<String, HashMap<String, f64>>,
}

/// Failure reported by a remote source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The source itself detected there is no connection.
    #[error("No internet connection")]
    NoInternet,

    /// Transport-level failure (connect, timeout, TLS).
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Well-formed response that does not answer the request.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Body could not be decoded.
    #[error("Failed to decode response: {0}")]
    DecodingFailed(String),

    /// The server reported an error.
    #[error("Server error: {0}")]
    Server(String),
}

/// Trait for remote exchange rate sources.
///
/// Implementations own their timeouts; the caches never cancel a call.
#[async_trait]
pub trait RemoteRateSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Fetch the latest rates for `base`.
    async fn fetch_latest(&self, base: &CurrencyCode) -> Result<LatestRates, SourceError>;

    /// Fetch daily rates `base -> target` for `start..=end`.
    async fn fetch_historical(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HistoricalRates, SourceError>;
}

/// Scripted rate source for testing.
#[cfg(test)]
pub struct MockRateSource {
    name: String,
    latest: dashmap::DashMap<CurrencyCode, LatestRates>,
    historical: dashmap::DashMap<(CurrencyCode, CurrencyCode), BTreeMap<String, f64>>,
    failure: parking_lot::Mutex<Option<SourceError>>,
    delay: parking_lot::Mutex<Option<std::time::Duration>>,
    latest_calls: std::sync::atomic::AtomicUsize,
    historical_calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockRateSource {
    /// Create a new mock source with no data.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latest: dashmap::DashMap::new(),
            historical: dashmap::DashMap::new(),
            failure: parking_lot::Mutex::new(None),
            delay: parking_lot::Mutex::new(None),
            latest_calls: std::sync::atomic::AtomicUsize::new(0),
            historical_calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Set the latest rates served for `base`.
    pub fn set_latest(&self, base: &str, rates: &[(&str, f64)]) {
        let base = CurrencyCode::new(base);
        let response = LatestRates {
            base: base.clone(),
            rates: rates.iter().map(|(c, v)| (c.to_string(), *v)).collect(),
        };
        self.latest.insert(base, response);
    }

    /// Serve `response` verbatim when `requested` is asked for.
    pub fn set_latest_response(&self, requested: &str, response: LatestRates) {
        self.latest.insert(CurrencyCode::new(requested), response);
    }

    /// Set one historical day for a pair. `day` is sent to callers verbatim.
    pub fn set_historical(&self, base: &str, target: &str, day: &str, value: f64) {
        self.historical
            .entry((CurrencyCode::new(base), CurrencyCode::new(target)))
            .or_default()
            .insert(day.to_string(), value);
    }

    /// Make every subsequent call fail with `error`.
    pub fn fail_with(&self, error: SourceError) {
        *self.failure.lock() = Some(error);
    }

    /// Stop failing.
    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    /// Delay every call by `delay`.
    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn latest_calls(&self) -> usize {
        self.latest_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn historical_calls(&self) -> usize {
        self.historical_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    async fn before_call(&self) -> Result<(), SourceError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failure.lock().clone();
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl RemoteRateSource for MockRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_latest(&self, base: &CurrencyCode) -> Result<LatestRates, SourceError> {
        self.latest_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.before_call().await?;

        self.latest
            .get(base)
            .map(|r| r.clone())
            .ok_or_else(|| SourceError::Server(format!("base {} not supported", base)))
    }

    async fn fetch_historical(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HistoricalRates, SourceError> {
        self.historical_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.before_call().await?;

        let days = self
            .historical
            .get(&(base.clone(), target.clone()))
            .map(|d| d.clone())
            .unwrap_or_default();

        let rates = days
            .into_iter()
            .filter(|(day, _)| match fxcache_common::parse_day(day) {
                Ok(date) => date >= start && date <= end,
                // Malformed days are passed through untouched.
                Err(_) => true,
            })
            .map(|(day, value)| (day, HashMap::from([(target.to_string(), value)])))
            .collect();

        Ok(HistoricalRates {
            base: base.clone(),
            rates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_source_latest() {
        let source = MockRateSource::new("test");
        source.set_latest("USD", &[("EUR", 0.9), ("GBP", 0.8)]);

        let result = source.fetch_latest(&CurrencyCode::usd()).await.unwrap();

        assert_eq!(result.base, CurrencyCode::usd());
        assert_eq!(result.rates.get("EUR"), Some(&0.9));
        assert_eq!(source.latest_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_source_failure() {
        let source = MockRateSource::new("test");
        source.set_latest("USD", &[("EUR", 0.9)]);
        source.fail_with(SourceError::RequestFailed("timeout".into()));

        let result = source.fetch_latest(&CurrencyCode::usd()).await;
        assert_eq!(result, Err(SourceError::RequestFailed("timeout".into())));

        source.recover();
        assert!(source.fetch_latest(&CurrencyCode::usd()).await.is_ok());
    }

    #[test]
    fn test_historical_payload_shape() {
        let json = r#"{"base":"USD","rates":{"2024-01-02":{"EUR":0.91}}}"#;
        let parsed: HistoricalRates = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.base, CurrencyCode::usd());
        assert_eq!(parsed.rates["2024-01-02"]["EUR"], 0.91);
    }
}
