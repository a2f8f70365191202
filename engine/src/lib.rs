//! fxcache FX Engine
//!
//! Offline-tolerant exchange rate cache and currency converter.
//!
//! # Features
//!
//! - Current rates per base currency, refreshed from a remote source and
//!   served from the store when offline
//! - Concurrent refreshes for the same base share one remote call
//! - Historical daily rates with a gap-tolerant cache
//! - Conversion between any two currencies via the base currency
//!
//! # Example
//!
//! ```rust,ignore
//! use fxcache_engine::{FxEngine, FxEngineConfig, StaticConnectivity};
//! use fxcache_store::MemoryRateStore;
//!
//! let engine = FxEngine::new(
//!     Arc::new(MemoryRateStore::new()),
//!     source,
//!     Arc::new(StaticConnectivity::online()),
//!     FxEngineConfig::default(),
//! );
//!
//! let rates = engine.current_rates().await?;
//! let gbp = engine.convert(100.0, &"EUR".into(), &"GBP".into())?;
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod connectivity;
pub mod conversion;
pub mod engine;
pub mod error;
pub mod historical;
pub mod metrics;
pub mod provider;

pub use cache::RateCache;
pub use catalog::CurrencyCatalog;
pub use config::FxEngineConfig;
pub use connectivity::{ConnectivityProbe, StaticConnectivity};
pub use conversion::{Conversion, ConversionEngine, ConversionRequest};
pub use engine::FxEngine;
pub use error::{FxError, FxResult};
pub use historical::{HistoricalRateCache, HistoricalSeries, SeriesSummary};
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use provider::{HistoricalRates, LatestRates, RemoteRateSource, SourceError};

#[cfg(test)]
pub use provider::MockRateSource;
