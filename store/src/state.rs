//! In-memory representation of the store and batch application.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use fxcache_common::{CurrencyCode, Timestamp};
use tracing::debug;

use crate::batch::{WriteBatch, WriteOp};
use crate::error::{StoreError, StoreResult};
use crate::record::{CurrencyRecord, HistoricalRate, Rate};

/// Stored value of a current rate, keyed by base then target.
#[derive(Debug, Clone, PartialEq)]
struct RateEntry {
    value: f64,
    date: Timestamp,
}

/// Complete contents of the in-memory store.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct StoreState {
    currencies: BTreeMap<CurrencyCode, CurrencyRecord>,
    rates: BTreeMap<CurrencyCode, BTreeMap<CurrencyCode, RateEntry>>,
    historical: BTreeMap<CurrencyCode, BTreeMap<CurrencyCode, BTreeMap<NaiveDate, f64>>>,
}

impl StoreState {
    pub(crate) fn base_currency(&self) -> Option<CurrencyRecord> {
        self.currencies.values().find(|c| c.is_base).cloned()
    }

    pub(crate) fn currency(&self, code: &CurrencyCode) -> Option<CurrencyRecord> {
        self.currencies.get(code).cloned()
    }

    pub(crate) fn currencies(&self) -> Vec<CurrencyRecord> {
        self.currencies.values().cloned().collect()
    }

    pub(crate) fn rates_for_base(&self, base: &CurrencyCode) -> Vec<Rate> {
        self.rates
            .get(base)
            .map(|targets| {
                targets
                    .iter()
                    .map(|(target, entry)| Self::rate_record(base, target, entry))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn rate(&self, base: &CurrencyCode, target: &CurrencyCode) -> Option<Rate> {
        self.rates
            .get(base)
            .and_then(|targets| targets.get(target))
            .map(|entry| Self::rate_record(base, target, entry))
    }

    pub(crate) fn historical_rates(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<HistoricalRate> {
        if from > to {
            return Vec::new();
        }

        self.historical
            .get(base)
            .and_then(|targets| targets.get(target))
            .map(|days| {
                days.range(from..=to)
                    .map(|(date, value)| HistoricalRate {
                        base_currency_code: base.clone(),
                        target_currency_code: target.clone(),
                        date: *date,
                        value: *value,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Apply `batch` to a copy of this state and return the copy.
    ///
    /// `self` is never modified, so a failing op leaves nothing behind.
    pub(crate) fn staged(&self, batch: &WriteBatch) -> StoreResult<StoreState> {
        let mut next = self.clone();
        for op in batch.ops() {
            next.apply_op(op)?;
            debug!(op = op.kind(), "Staged store write");
        }
        Ok(next)
    }

    fn apply_op(&mut self, op: &WriteOp) -> StoreResult<()> {
        match op {
            WriteOp::SetBase(code) => {
                self.set_base(code);
            }
            WriteOp::SetBaseIfUnset(code) => {
                if !self.currencies.values().any(|c| c.is_base) {
                    self.set_base(code);
                }
            }
            WriteOp::UpsertRates {
                base,
                rates,
                fetched_at,
            } => {
                for (target, value) in rates {
                    ensure_finite(*value, || format!("rate {}/{}", base, target))?;
                }

                self.ensure_currency(base).last_updated = Some(*fetched_at);

                for (target, value) in rates {
                    self.ensure_currency(target);
                    self.rates.entry(base.clone()).or_default().insert(
                        target.clone(),
                        RateEntry {
                            value: *value,
                            date: *fetched_at,
                        },
                    );
                }
            }
            WriteOp::UpsertHistorical {
                base,
                target,
                points,
            } => {
                for (date, value) in points {
                    ensure_finite(*value, || format!("historical rate {}/{} on {}", base, target, date))?;
                }

                let days = self
                    .historical
                    .entry(base.clone())
                    .or_default()
                    .entry(target.clone())
                    .or_default();
                for (date, value) in points {
                    days.insert(*date, *value);
                }
            }
        }
        Ok(())
    }

    fn set_base(&mut self, code: &CurrencyCode) {
        for currency in self.currencies.values_mut() {
            currency.is_base = false;
        }
        self.ensure_currency(code).is_base = true;
    }

    fn ensure_currency(&mut self, code: &CurrencyCode) -> &mut CurrencyRecord {
        self.currencies
            .entry(code.clone())
            .or_insert_with(|| CurrencyRecord::new(code.clone()))
    }

    fn rate_record(base: &CurrencyCode, target: &CurrencyCode, entry: &RateEntry) -> Rate {
        Rate {
            currency_code: target.clone(),
            base_currency: base.clone(),
            value: entry.value,
            date: entry.date,
        }
    }
}

fn ensure_finite(value: f64, what: impl FnOnce() -> String) -> StoreResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StoreError::InvalidRecord(format!("{} is not finite", what())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxcache_common::now;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn base_count(state: &StoreState) -> usize {
        state.currencies().iter().filter(|c| c.is_base).count()
    }

    #[test]
    fn test_set_base_clears_previous() {
        let state = StoreState::default();
        let batch = WriteBatch::new()
            .push(WriteOp::SetBase(CurrencyCode::usd()))
            .push(WriteOp::SetBase(CurrencyCode::gbp()));

        let state = state.staged(&batch).unwrap();

        assert_eq!(base_count(&state), 1);
        assert_eq!(state.base_currency().unwrap().code, CurrencyCode::gbp());
        assert!(!state.currency(&CurrencyCode::usd()).unwrap().is_base);
    }

    #[test]
    fn test_set_base_if_unset_keeps_existing() {
        let state = StoreState::default()
            .staged(&WriteOp::SetBase(CurrencyCode::usd()).into())
            .unwrap();

        let state = state
            .staged(&WriteOp::SetBaseIfUnset(CurrencyCode::eur()).into())
            .unwrap();

        assert_eq!(state.base_currency().unwrap().code, CurrencyCode::usd());
        assert!(state.currency(&CurrencyCode::eur()).is_none());
    }

    #[test]
    fn test_upsert_rates_never_duplicates() {
        let first = now();
        let second = first + chrono::Duration::seconds(5);
        let rates = vec![(CurrencyCode::eur(), 0.9), (CurrencyCode::gbp(), 0.8)];

        let state = StoreState::default()
            .staged(&WriteBatch::from_iter([
                WriteOp::UpsertRates {
                    base: CurrencyCode::usd(),
                    rates: rates.clone(),
                    fetched_at: first,
                },
                WriteOp::UpsertRates {
                    base: CurrencyCode::usd(),
                    rates,
                    fetched_at: second,
                },
            ]))
            .unwrap();

        let stored = state.rates_for_base(&CurrencyCode::usd());
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|r| r.date == second));
        assert_eq!(
            state.currency(&CurrencyCode::usd()).unwrap().last_updated,
            Some(second)
        );
        // Targets are created lazily, base flag untouched.
        assert!(state.currency(&CurrencyCode::gbp()).is_some());
        assert_eq!(base_count(&state), 0);
    }

    #[test]
    fn test_failed_batch_leaves_state_untouched() {
        let state = StoreState::default()
            .staged(&WriteOp::SetBase(CurrencyCode::usd()).into())
            .unwrap();

        let batch = WriteBatch::new()
            .push(WriteOp::SetBase(CurrencyCode::eur()))
            .push(WriteOp::UpsertRates {
                base: CurrencyCode::eur(),
                rates: vec![(CurrencyCode::gbp(), f64::NAN)],
                fetched_at: now(),
            });

        assert!(matches!(
            state.staged(&batch),
            Err(StoreError::InvalidRecord(_))
        ));
        assert_eq!(state.base_currency().unwrap().code, CurrencyCode::usd());
        assert!(state.currency(&CurrencyCode::eur()).is_none());
    }

    #[test]
    fn test_historical_range_is_inclusive_and_sorted() {
        let points = vec![(day(3), 1.3), (day(1), 1.1), (day(2), 1.2), (day(5), 1.5)];
        let state = StoreState::default()
            .staged(
                &WriteOp::UpsertHistorical {
                    base: CurrencyCode::usd(),
                    target: CurrencyCode::eur(),
                    points,
                }
                .into(),
            )
            .unwrap();

        let rows = state.historical_rates(&CurrencyCode::usd(), &CurrencyCode::eur(), day(1), day(3));
        let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(1), day(2), day(3)]);

        assert!(state
            .historical_rates(&CurrencyCode::usd(), &CurrencyCode::eur(), day(4), day(1))
            .is_empty());
    }

    #[test]
    fn test_historical_upsert_overwrites_day() {
        let op = |value| WriteOp::UpsertHistorical {
            base: CurrencyCode::usd(),
            target: CurrencyCode::eur(),
            points: vec![(day(1), value)],
        };
        let state = StoreState::default()
            .staged(&WriteBatch::from_iter([op(1.0), op(2.0)]))
            .unwrap();

        let rows = state.historical_rates(&CurrencyCode::usd(), &CurrencyCode::eur(), day(1), day(1));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 2.0);
    }
}
