//! Engine error types.

use fxcache_common::CurrencyCode;
use fxcache_store::StoreError;
use thiserror::Error;

use crate::provider::SourceError;

/// Errors that can occur in the rate caches and the conversion engine.
///
/// The enum is `Clone` so a single refresh outcome can be handed to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FxError {
    /// Offline and nothing cached to fall back on.
    #[error("No network connectivity and no cached rates available")]
    NoConnectivity,

    /// The remote source was reached but the fetch failed.
    #[error("Remote fetch failed: {0}")]
    RemoteFetchFailed(#[from] SourceError),

    /// No cached rate for the currency relative to the base.
    #[error("Rate not found for {currency} against base {base}")]
    RateNotFound {
        base: CurrencyCode,
        currency: CurrencyCode,
    },

    /// A cached rate that cannot be divided by.
    #[error("Invalid rate {value} for {currency} against base {base}")]
    InvalidRate {
        base: CurrencyCode,
        currency: CurrencyCode,
        value: f64,
    },

    /// Reading or writing the store failed.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),

    /// A single remote row could not be parsed. Skipped, never fatal to a batch.
    #[error("Parse failure: {context}")]
    ParseFailure { context: String },
}

impl FxError {
    /// Stable code for callers that render distinct messaging per kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::NoConnectivity => "NO_CONNECTIVITY",
            FxError::RemoteFetchFailed(_) => "REMOTE_FETCH_FAILED",
            FxError::RateNotFound { .. } => "RATE_NOT_FOUND",
            FxError::InvalidRate { .. } => "INVALID_RATE",
            FxError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            FxError::ParseFailure { .. } => "PARSE_FAILURE",
        }
    }

    /// Whether retrying later could succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FxError::NoConnectivity | FxError::RemoteFetchFailed(_)
        )
    }
}

/// Result type for engine operations.
pub type FxResult<T> = Result<T, FxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_and_remote_failure_are_distinct() {
        let offline = FxError::NoConnectivity;
        let remote = FxError::from(SourceError::Server("quota exceeded".into()));

        assert_ne!(offline.error_code(), remote.error_code());
        assert!(offline.is_retryable());
        assert!(remote.is_retryable());
    }

    #[test]
    fn test_store_error_converts() {
        let err: FxError = StoreError::Io("disk full".into()).into();
        assert_eq!(err.error_code(), "PERSISTENCE_FAILURE");
        assert!(!err.is_retryable());
    }
}
