//! fxcache Common Types
//!
//! Shared types used across the fxcache workspace: currency codes and the
//! timestamp / calendar-day helpers the rate caches are keyed on.

pub mod currency;
pub mod time;

pub use currency::*;
pub use time::*;
