//! Panel monitor probe binary.
//!
//! Sends a GET request to every URL given on the command line through an
//! instrumented client, then prints the collected monitoring data as JSON.
//! All logs go to stderr; stdout only carries the export.
//!
//! Coverage is excluded because the main function needs live endpoints.

// Enable the coverage attribute when running with nightly for llvm-cov exclusions
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use std::sync::Arc;

use panel_monitoring::config::MonitoringConfig;
use panel_monitoring::error::MonitoringError;
use panel_monitoring::monitoring::Monitoring;
use panel_monitoring::performance::EntryBus;
use panel_monitoring::storage::FileStore;

#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() {
    // Initialize logging to stderr only (stdout is for the export)
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "info".to_string())
                .parse()
                .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("panel-monitor starting...");

    if let Err(e) = run().await {
        tracing::error!("{e}");
        std::process::exit(1);
    }

    tracing::info!("panel-monitor finished");
}

#[cfg_attr(coverage_nightly, coverage(off))]
async fn run() -> Result<(), MonitoringError> {
    let config = MonitoringConfig::from_env()?;

    tracing::info!(
        "Configuration loaded: storage={}, page={}",
        config.storage_dir,
        config.page_url
    );

    let store = FileStore::open(&config.storage_dir)?;
    let monitoring = Monitoring::new(config, Arc::new(store), Arc::new(EntryBus::new()));
    let handle = monitoring.initialize();
    let client = monitoring.client(reqwest::Client::new());

    for url in std::env::args().skip(1) {
        match client.send(client.get(&url)).await {
            Ok(response) => tracing::info!(url = %url, status = %response.status(), "Probe finished"),
            Err(e) => tracing::warn!(url = %url, error = %e, "Probe failed"),
        }
    }

    let export = monitoring.export_data();
    handle.stop_and_wait().await;
    println!("{}", export?);
    Ok(())
}
