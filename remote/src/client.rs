//! HTTP rate source for exchangeratesapi-style JSON APIs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use fxcache_common::{format_day, CurrencyCode};
use fxcache_engine::{ConnectivityProbe, HistoricalRates, LatestRates, RemoteRateSource, SourceError};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};

/// `GET /latest` payload.
#[derive(Debug, Deserialize)]
struct RatesResponse {
    success: bool,
    #[allow(dead_code)]
    #[serde(default)]
    timestamp: i64,
    base: String,
    #[allow(dead_code)]
    #[serde(default)]
    date: String,
    rates: HashMap<String, f64>,
}

/// `GET /timeseries` payload.
#[derive(Debug, Deserialize)]
struct TimeseriesResponse {
    success: bool,
    #[allow(dead_code)]
    #[serde(default)]
    timeseries: bool,
    base: String,
    #[allow(dead_code)]
    #[serde(default)]
    start_date: String,
    #[allow(dead_code)]
    #[serde(default)]
    end_date: String,
    rates: BTreeMap<String, HashMap<String, f64>>,
}

/// Error envelope returned with `success: false`.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    success: bool,
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    /// Numeric or string depending on the provider.
    #[allow(dead_code)]
    #[serde(default)]
    code: serde_json::Value,
    #[serde(default, alias = "info")]
    message: String,
}

/// Rate source backed by an HTTP JSON API.
pub struct HttpRateSource {
    client: Client,
    base_url: String,
    access_key: String,
    probe: Option<Arc<dyn ConnectivityProbe>>,
}

impl HttpRateSource {
    /// Create a new source from `config`.
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        if config.base_url.is_empty() {
            return Err(RemoteError::InvalidConfig("API URL cannot be empty".to_string()));
        }

        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_key: config.access_key.clone(),
            probe: None,
        })
    }

    /// Fail fast with [`SourceError::NoInternet`] while `probe` reports offline.
    pub fn with_probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, SourceError> {
        if let Some(probe) = &self.probe {
            if !probe.is_reachable() {
                return Err(SourceError::NoInternet);
            }
        }

        let url = format!("{}/{}", self.base_url, path);
        let mut query = vec![("access_key", self.access_key.clone())];
        query.extend(params.iter().cloned());

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| SourceError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::RequestFailed(e.to_string()))?;

        debug!(path, status = status.as_u16(), bytes = body.len(), "Received response");
        decode(status, &body)
    }
}

/// Decode a response body, preferring the API's own error envelope.
fn decode<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, SourceError> {
    if let Ok(envelope) = serde_json::from_slice::<ErrorResponse>(body) {
        if !envelope.success {
            return Err(SourceError::Server(envelope.error.message));
        }
    }

    if !status.is_success() {
        return Err(SourceError::Server(format!("HTTP {}", status)));
    }

    serde_json::from_slice(body).map_err(|e| SourceError::DecodingFailed(e.to_string()))
}

fn latest_from(response: RatesResponse) -> Result<LatestRates, SourceError> {
    if !response.success {
        return Err(SourceError::InvalidResponse("success flag not set".to_string()));
    }

    Ok(LatestRates {
        base: CurrencyCode::new(response.base),
        rates: response.rates,
    })
}

fn historical_from(response: TimeseriesResponse) -> Result<HistoricalRates, SourceError> {
    if !response.success {
        return Err(SourceError::InvalidResponse("success flag not set".to_string()));
    }

    Ok(HistoricalRates {
        base: CurrencyCode::new(response.base),
        rates: response.rates,
    })
}

#[async_trait]
impl RemoteRateSource for HttpRateSource {
    fn name(&self) -> &str {
        "exchangeratesapi"
    }

    #[instrument(skip(self), fields(base = %base))]
    async fn fetch_latest(&self, base: &CurrencyCode) -> Result<LatestRates, SourceError> {
        let response: RatesResponse = self
            .get("latest", &[("base", base.to_string())])
            .await?;
        latest_from(response)
    }

    #[instrument(skip(self), fields(base = %base, target = %target))]
    async fn fetch_historical(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HistoricalRates, SourceError> {
        let response: TimeseriesResponse = self
            .get(
                "timeseries",
                &[
                    ("base", base.to_string()),
                    ("symbols", target.to_string()),
                    ("start_date", format_day(start)),
                    ("end_date", format_day(end)),
                ],
            )
            .await?;
        historical_from(response)
    }
}
