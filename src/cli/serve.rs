//! `quickmc run`: acquire, launch, report, serve.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use quickmc::config::Config;
use quickmc::health::ServiceMetrics;
use quickmc::service::run_service;
use quickmc::supervisor::LaunchSpec;
use quickmc::utils::shutdown;

use super::common::{catalog, describe};

pub(crate) async fn cmd_run(config: Config) -> Result<()> {
    let client = catalog(&config)?;
    let metrics = Arc::new(ServiceMetrics::new());
    let (shutdown_tx, _shutdown_rx) = shutdown::channel();
    let shutdown_tx = Arc::new(shutdown_tx);
    tokio::spawn(shutdown::listen_for_signals(Arc::clone(&shutdown_tx)));

    run_service(
        &client,
        &config,
        |artifact| {
            info!("Using {}", describe(artifact));
            LaunchSpec::java(&config.server, &artifact.path)
        },
        metrics,
        shutdown_tx,
    )
    .await?;
    Ok(())
}
