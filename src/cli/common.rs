//! Shared CLI helpers used across multiple command handlers.

use anyhow::{Context, Result};

use quickmc::artifact::LocalArtifact;
use quickmc::config::Config;
use quickmc::health::ServiceMetrics;
use quickmc::papermc::PaperClient;
use quickmc::service::acquire_recorded;

/// Build the catalog client from config.
pub(crate) fn catalog(config: &Config) -> Result<PaperClient> {
    PaperClient::new(&config.paper).with_context(|| "Failed to build PaperMC API client")
}

/// Run the acquisition pipeline and record its outcome in `metrics`.
pub(crate) async fn acquire_artifact(
    config: &Config,
    metrics: &ServiceMetrics,
) -> Result<LocalArtifact> {
    let client = catalog(config)?;
    Ok(acquire_recorded(&client, config, metrics).await?)
}

/// One-line description of an artifact for command output.
pub(crate) fn describe(artifact: &LocalArtifact) -> String {
    let coordinate = artifact
        .coordinate
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown build".to_string());
    format!(
        "{} ({}, {}, {} bytes)",
        artifact.path.display(),
        coordinate,
        artifact.origin.as_str(),
        artifact.size
    )
}
