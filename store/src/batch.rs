//! Write batches.
//!
//! Every mutation of the store is expressed as a [`WriteOp`]. A [`WriteBatch`]
//! groups the ops of one logical operation and is applied atomically.

use chrono::NaiveDate;
use fxcache_common::{CurrencyCode, Timestamp};

/// A single store mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Clear the base flag on every currency, then flag (or create) `code`.
    SetBase(CurrencyCode),
    /// Like [`WriteOp::SetBase`], but does nothing if a base already exists.
    SetBaseIfUnset(CurrencyCode),
    /// Upsert the current rates owned by `base`.
    ///
    /// Every written rate and the base currency's `last_updated` are stamped
    /// with `fetched_at`. Currencies referenced here are created on demand.
    UpsertRates {
        base: CurrencyCode,
        rates: Vec<(CurrencyCode, f64)>,
        fetched_at: Timestamp,
    },
    /// Upsert historical rates for one currency pair, keyed by day.
    UpsertHistorical {
        base: CurrencyCode,
        target: CurrencyCode,
        points: Vec<(NaiveDate, f64)>,
    },
}

impl WriteOp {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WriteOp::SetBase(_) => "set_base",
            WriteOp::SetBaseIfUnset(_) => "set_base_if_unset",
            WriteOp::UpsertRates { .. } => "upsert_rates",
            WriteOp::UpsertHistorical { .. } => "upsert_historical",
        }
    }
}

/// Ordered set of operations applied as one transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation.
    pub fn push(mut self, op: WriteOp) -> Self {
        self.ops.push(op);
        self
    }

    /// Operations in application order.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl From<WriteOp> for WriteBatch {
    fn from(op: WriteOp) -> Self {
        Self { ops: vec![op] }
    }
}

impl FromIterator<WriteOp> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = WriteOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}
