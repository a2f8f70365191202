//! fxcache Remote Bindings
//!
//! Network-facing implementations of the engine's collaborator traits: an
//! HTTP [`RemoteRateSource`](fxcache_engine::RemoteRateSource) for
//! exchangeratesapi-style APIs and a background
//! [`ConnectivityProbe`](fxcache_engine::ConnectivityProbe).

pub mod client;
pub mod config;
pub mod error;
pub mod monitor;

pub use client::HttpRateSource;
pub use config::RemoteConfig;
pub use error::{RemoteError, RemoteResult};
pub use monitor::NetworkMonitor;
