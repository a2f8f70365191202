//! Plain-text rendering. All rounding for display happens here.

use std::fmt::Write;

use fxcache_common::format_day;
use fxcache_engine::{Conversion, FxError, HistoricalSeries, SourceError};
use fxcache_store::{CurrencyRecord, Rate};

pub fn rates(base: &CurrencyRecord, rates: &[Rate]) -> String {
    let mut out = String::new();
    let updated = base
        .last_updated
        .map(|ts| ts.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    let _ = writeln!(out, "Base {} (updated {})", base.code, updated);

    for rate in rates {
        let _ = writeln!(out, "  {:<5}{:>14.4}", rate.currency_code.as_str(), rate.value);
    }
    out
}

pub fn conversion(conversion: &Conversion) -> String {
    format!(
        "{:.4} {} = {:.4} {} (rate {:.4})",
        conversion.amount,
        conversion.from,
        conversion.result,
        conversion.to,
        conversion.effective_rate()
    )
}

pub fn history(series: &HistoricalSeries) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} -> {}", series.base, series.target);

    for (day, value) in series.points() {
        let _ = writeln!(out, "  {}  {:.4}", format_day(*day), value);
    }

    match series.summary() {
        Some(summary) => {
            let _ = writeln!(
                out,
                "Minimum: {:.4} on {}",
                summary.min.1,
                format_day(summary.min.0)
            );
            let _ = writeln!(
                out,
                "Maximum: {:.4} on {}",
                summary.max.1,
                format_day(summary.max.0)
            );
            let _ = writeln!(out, "Average: {:.4}", summary.average);
        }
        None => out.push_str("No historical data available\n"),
    }
    out
}

pub fn currencies(records: &[CurrencyRecord]) -> String {
    records
        .iter()
        .map(|c| format!("{} {}\n", if c.is_base { "*" } else { " " }, c.code))
        .collect()
}

/// User-facing message for an engine error.
pub fn error(error: &FxError) -> String {
    match error {
        FxError::NoConnectivity => {
            "No internet connection and no cached rates. Connect and try again.".to_string()
        }
        FxError::RemoteFetchFailed(SourceError::NoInternet) => {
            "No internet connection. Please check your connection and try again.".to_string()
        }
        FxError::RemoteFetchFailed(SourceError::RequestFailed(_)) => {
            "Failed to connect to the server. Please try again later.".to_string()
        }
        FxError::RemoteFetchFailed(SourceError::InvalidResponse(_)) => {
            "Received an invalid response from the server.".to_string()
        }
        FxError::RemoteFetchFailed(SourceError::DecodingFailed(_)) => {
            "Failed to process the server response.".to_string()
        }
        FxError::RemoteFetchFailed(SourceError::Server(message)) => {
            format!("Server error: {}", message)
        }
        FxError::RateNotFound { base, currency } => format!(
            "No rate for {} against {}. Run `fxcache refresh` first.",
            currency, base
        ),
        other => format!("Error: {}", other),
    }
}
