//! Engine configuration.

use fxcache_common::CurrencyCode;

/// Configuration for the rate caches and conversion engine.
#[derive(Debug, Clone)]
pub struct FxEngineConfig {
    /// Base currency created when none has been chosen yet.
    pub default_base: CurrencyCode,
    /// Default historical window in days.
    pub history_window_days: u32,
    /// Number of missing days a cached window may have and still be served.
    pub history_gap_tolerance: u32,
    /// Share one in-flight refresh between concurrent callers for the same base.
    pub coalesce_refreshes: bool,
}

impl Default for FxEngineConfig {
    fn default() -> Self {
        Self {
            default_base: CurrencyCode::eur(),
            history_window_days: 7,
            history_gap_tolerance: 1,
            coalesce_refreshes: true,
        }
    }
}

impl FxEngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(code) = std::env::var("FX_DEFAULT_BASE") {
            config.default_base = CurrencyCode::new(code);
        }

        if let Ok(days) = std::env::var("FX_HISTORY_DAYS") {
            if let Ok(days) = days.parse() {
                config.history_window_days = days;
            }
        }

        if let Ok(tolerance) = std::env::var("FX_HISTORY_GAP_TOLERANCE") {
            if let Ok(tolerance) = tolerance.parse() {
                config.history_gap_tolerance = tolerance;
            }
        }

        if let Ok(coalesce) = std::env::var("FX_COALESCE_REFRESHES") {
            if let Ok(coalesce) = coalesce.parse() {
                config.coalesce_refreshes = coalesce;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.default_base.is_well_formed() {
            return Err(format!(
                "Default base currency must be a three-letter code, got {:?}",
                self.default_base.as_str()
            ));
        }

        if self.history_window_days == 0 {
            return Err("History window cannot be zero days".to_string());
        }

        if self.history_gap_tolerance >= self.history_window_days {
            return Err("History gap tolerance must be smaller than the window".to_string());
        }

        Ok(())
    }
}
