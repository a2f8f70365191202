//! fxcache CLI
//!
//! Shows cached exchange rates, converts amounts and prints rate history,
//! refreshing from the remote API when the network allows.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fxcache_common::CurrencyCode;
use fxcache_engine::{ConnectivityProbe, FxEngine, FxEngineConfig, FxError, StaticConnectivity};
use fxcache_remote::{HttpRateSource, NetworkMonitor, RemoteConfig};
use fxcache_store::SqliteRateStore;

mod render;

/// fxcache CLI
#[derive(Parser, Debug)]
#[command(name = "fxcache")]
#[command(about = "Offline-tolerant exchange rate cache and converter")]
struct Args {
    /// Path of the SQLite rate database
    #[arg(long, default_value = "fxcache.db")]
    store: PathBuf,

    /// Never contact the remote API
    #[arg(long)]
    offline: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show current rates for the base currency
    Rates,
    /// Fetch the latest rates for the base currency
    Refresh,
    /// Change the base currency and load its rates
    SetBase { code: String },
    /// Convert an amount between two currencies
    Convert { amount: f64, from: String, to: String },
    /// Show daily rates of a currency against the base
    History {
        target: String,
        /// Window size in days
        #[arg(long)]
        days: Option<u32>,
    },
    /// List known currencies
    Currencies,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(
            args.json_logs
                .then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
        )
        .with(
            (!args.json_logs)
                .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        )
        .init();

    // Load configuration
    let engine_config = FxEngineConfig::from_env();
    if let Err(e) = engine_config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow!("Configuration error: {}", e));
    }

    let remote_config = RemoteConfig::from_env();
    if !args.offline {
        if let Err(e) = remote_config.validate() {
            error!(error = %e, "Invalid remote configuration");
            return Err(anyhow!("Configuration error: {}", e));
        }
    }

    let store = Arc::new(
        SqliteRateStore::open(&args.store)
            .with_context(|| format!("opening rate store {}", args.store.display()))?,
    );

    let monitor = (!args.offline).then(|| Arc::new(NetworkMonitor::start(&remote_config)));
    let probe: Arc<dyn ConnectivityProbe> = match &monitor {
        Some(monitor) => monitor.clone(),
        None => Arc::new(StaticConnectivity::offline()),
    };

    let source = Arc::new(
        HttpRateSource::new(&remote_config)
            .context("creating HTTP rate source")?
            .with_probe(probe.clone()),
    );

    let engine = FxEngine::new(store, source, probe, engine_config);
    info!(store = %args.store.display(), offline = args.offline, "fxcache ready");

    let result = run(&engine, args.command).await;

    if let Some(monitor) = monitor {
        monitor.stop();
    }

    match result {
        Ok(output) => {
            print!("{}", output);
            Ok(())
        }
        Err(e) => Err(failure(e)),
    }
}

/// The single user-facing error for a failed command.
fn failure(e: FxError) -> anyhow::Error {
    debug!(code = e.error_code(), error = %e, "Command failed");
    anyhow!(render::error(&e))
}

async fn run(engine: &FxEngine, command: Command) -> Result<String, FxError> {
    match command {
        Command::Rates => {
            let rates = engine.current_rates().await?;
            Ok(render::rates(&engine.base_currency()?, &rates))
        }
        Command::Refresh => {
            engine.refresh().await?;
            let rates = engine.current_rates().await?;
            Ok(render::rates(&engine.base_currency()?, &rates))
        }
        Command::SetBase { code } => {
            engine.switch_base(&CurrencyCode::new(code)).await?;
            let rates = engine.current_rates().await?;
            Ok(render::rates(&engine.base_currency()?, &rates))
        }
        Command::Convert { amount, from, to } => {
            let quote = engine
                .quote_with_rates(amount, &CurrencyCode::new(from), &CurrencyCode::new(to))
                .await?;
            Ok(format!("{}\n", render::conversion(&quote)))
        }
        Command::History { target, days } => {
            let series = engine.history(&CurrencyCode::new(target), days).await?;
            Ok(render::history(&series))
        }
        Command::Currencies => Ok(render::currencies(&engine.currencies()?)),
    }
}
