//! Remote crate error types.

use thiserror::Error;

/// Errors raised while setting up remote components.
///
/// Failures of individual requests are reported as
/// [`SourceError`](fxcache_engine::SourceError) instead.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result type for remote setup.
pub type RemoteResult<T> = Result<T, RemoteError>;
