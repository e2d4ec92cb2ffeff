//! The long-running service behind `quickmc run`.
//!
//! Order matters: the jar is acquired, the server is launched, and only then
//! are the status report and the health facade started. Shutdown is honoured
//! at every step, including while the jar is still being acquired.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::artifact::{acquire, ArtifactOrigin, CoordinateHints, LocalArtifact};
use crate::config::Config;
use crate::error::{QuickError, Result};
use crate::health::{start_health_server, ServiceMetrics};
use crate::papermc::BuildCatalog;
use crate::status::spawn_status_report;
use crate::supervisor::{LaunchSpec, ProcessState, ProcessSupervisor};
use crate::utils::shutdown;

/// Bound on how long background tasks get to wind down after shutdown.
const TASK_DRAIN_SECS: u64 = 5;

/// Run the acquisition pipeline and record its outcome in `metrics`.
pub async fn acquire_recorded(
    catalog: &dyn BuildCatalog,
    config: &Config,
    metrics: &ServiceMetrics,
) -> Result<LocalArtifact> {
    let hints = CoordinateHints::from_config(&config.paper);
    info!(
        project = hints.effective_project(),
        version = hints.version.as_deref().unwrap_or("latest"),
        build = hints.build.as_deref().unwrap_or("latest"),
        "Acquiring server artifact"
    );

    let artifact = acquire(catalog, &config.server, &hints).await?;

    match artifact.origin {
        ArtifactOrigin::Downloaded => metrics.record_download(artifact.size),
        ArtifactOrigin::Cached | ArtifactOrigin::LegacyCached => metrics.record_cache_hit(),
    }
    crate::log_component!(
        info,
        "artifact",
        "Artifact ready",
        path = tracing::field::display(artifact.path.display()),
        origin = artifact.origin.as_str(),
        bytes = artifact.size
    );
    Ok(artifact)
}

/// Acquire, launch, report and serve until shutdown is requested on `shutdown_tx`.
///
/// `launch_spec` turns the acquired artifact into the command to supervise.
/// Returns `Ok(())` without launching anything when shutdown arrives during
/// acquisition. If the health facade cannot bind, the already running server
/// is stopped before the error is returned.
pub async fn run_service<F>(
    catalog: &dyn BuildCatalog,
    config: &Config,
    launch_spec: F,
    metrics: Arc<ServiceMetrics>,
    shutdown_tx: Arc<watch::Sender<bool>>,
) -> Result<()>
where
    F: FnOnce(&LocalArtifact) -> LaunchSpec,
{
    let mut shutdown_rx = shutdown_tx.subscribe();

    let artifact = tokio::select! {
        biased;
        _ = shutdown::requested(&mut shutdown_rx) => {
            info!("Shutdown requested during acquisition; server not launched");
            return Ok(());
        }
        artifact = acquire_recorded(catalog, config, &metrics) => artifact?,
    };
    if !artifact.accepted {
        warn!(
            file = %config.server.eula_path().display(),
            "EULA marker missing or not accepted; the server may refuse to start"
        );
    }

    let supervisor = match ProcessSupervisor::launch(
        launch_spec(&artifact),
        config.server.restart.clone(),
        Duration::from_secs(config.server.stop_timeout_secs),
        Arc::clone(&metrics),
        shutdown_rx.clone(),
    ) {
        Ok(supervisor) => supervisor,
        Err(QuickError::Cancelled(reason)) => {
            info!(reason = %reason, "Server not launched");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let status_task = config.status.enabled.then(|| {
        crate::log_component!(
            info,
            "status",
            "Status probe scheduled",
            grace_secs = config.status.grace_secs,
            port = config.status.port
        );
        spawn_status_report(
            config.status.clone(),
            Arc::clone(&metrics),
            shutdown_rx.clone(),
        )
    });

    let health_task = match start_health_server(
        &config.health.host,
        config.health.port,
        Arc::clone(&metrics),
        shutdown_rx.clone(),
    )
    .await
    {
        Ok(handle) => handle,
        Err(e) => {
            // The child is already running; stop it before failing.
            let _ = shutdown_tx.send(true);
            let state = supervisor.wait().await;
            info!(state = %state, "Server process finished");
            return Err(e);
        }
    };

    let state = supervisor.wait().await;
    crate::log_component!(
        info,
        "supervisor",
        "Server process finished",
        state = tracing::field::display(&state)
    );

    if state != ProcessState::Stopped {
        info!("Health endpoints stay up until shutdown is requested");
        shutdown::requested(&mut shutdown_rx).await;
    }
    let _ = shutdown_tx.send(true);

    let drain = Duration::from_secs(TASK_DRAIN_SECS);
    if tokio::time::timeout(drain, health_task).await.is_err() {
        warn!("Health server did not stop in time");
    }
    if let Some(task) = status_task {
        let _ = tokio::time::timeout(drain, task).await;
    }

    info!("quickmc stopped");
    Ok(())
}
