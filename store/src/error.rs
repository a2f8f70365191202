//! Store error types.

use thiserror::Error;

/// Errors raised by a [`RateStore`](crate::RateStore).
///
/// Errors carry rendered messages so they can be cloned into every waiter of a
/// shared refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Preparing the database location failed.
    #[error("Store I/O error: {0}")]
    Io(String),

    /// The database rejected a query or transaction.
    #[error("Store database error: {0}")]
    Database(String),

    /// A stored row could not be decoded.
    #[error("Store data corrupted: {0}")]
    Corrupted(String),

    /// A write would have stored a value the store cannot represent.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => StoreError::Corrupted(err.to_string()),
            _ => StoreError::Database(err.to_string()),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
