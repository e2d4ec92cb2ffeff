//! Server artifact acquisition.
//!
//! The pipeline runs strictly in order and stops at the first error:
//!
//! 1. [`inspect_cache`]: reuse the jar on disk when its manifest still matches
//! 2. [`resolve_coordinate`]: fill in missing project/version/build
//! 3. [`VerifiedDownloader`]: fetch and checksum the jar
//! 4. [`preparer::prepare`]: executable bit, EULA marker, manifest
//!
//! A cache hit skips steps 2–4 entirely and makes no network request.

pub mod downloader;
pub mod manifest;
pub mod preparer;
pub mod resolver;

#[cfg(test)]
pub(crate) mod test_support;

use std::path::{Path, PathBuf};

use tracing::{info, warn};

pub use downloader::{ArtifactDescriptor, DownloadOutcome, VerifiedDownloader};
pub use manifest::{file_sha256, manifest_path, ArtifactManifest};
pub use resolver::{resolve_coordinate, BuildCoordinate, CoordinateHints, DEFAULT_PROJECT};

use crate::config::ServerConfig;
use crate::error::{CoordinateField, QuickError, Result};
use crate::papermc::BuildCatalog;

/// How the local artifact came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOrigin {
    /// Downloaded and verified during this run
    Downloaded,
    /// Reused; manifest and checksum matched
    Cached,
    /// Reused by presence only; no manifest was found
    LegacyCached,
}

impl ArtifactOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactOrigin::Downloaded => "downloaded",
            ArtifactOrigin::Cached => "cached",
            ArtifactOrigin::LegacyCached => "legacy_cached",
        }
    }
}

/// The server jar ready to be launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    pub path: PathBuf,
    pub executable: bool,
    /// EULA marker present with the expected content
    pub accepted: bool,
    /// Unknown for legacy artifacts without a manifest
    pub coordinate: Option<BuildCoordinate>,
    pub sha256: Option<String>,
    pub size: u64,
    pub origin: ArtifactOrigin,
}

/// Result of looking at the server directory before acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState {
    /// No jar on disk
    Missing,
    /// Jar and manifest agree with each other and with the pinned hints
    Valid(ArtifactManifest),
    /// Jar present without a manifest
    Legacy,
    /// Jar present but must be replaced
    Stale(String),
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.exists()
    }
}

/// Decide whether the jar at `jar` can be reused for `hints`.
///
/// Never touches the network. The jar is re-hashed and compared against the
/// manifest so a truncated or replaced file is not trusted.
pub fn inspect_cache(jar: &Path, hints: &CoordinateHints) -> Result<CacheState> {
    if !jar.exists() {
        return Ok(CacheState::Missing);
    }

    let manifest = match ArtifactManifest::load(&manifest_path(jar)) {
        Ok(Some(manifest)) => manifest,
        Ok(None) => return Ok(CacheState::Legacy),
        Err(e) => return Ok(CacheState::Stale(format!("manifest unreadable: {}", e))),
    };

    if !hints.accepts(&manifest.coordinate) {
        return Ok(CacheState::Stale(format!(
            "cached build {} does not match the configured pins",
            manifest.coordinate
        )));
    }

    match file_sha256(jar) {
        Ok(actual) if actual == downloader::normalize_digest(&manifest.sha256) => {
            Ok(CacheState::Valid(manifest))
        }
        Ok(actual) => Ok(CacheState::Stale(format!(
            "checksum {} does not match manifest {}",
            actual, manifest.sha256
        ))),
        Err(e) => Ok(CacheState::Stale(format!("jar unreadable: {}", e))),
    }
}

/// Resolve the coordinate and fetch the build metadata describing its jar.
pub async fn resolve_artifact(
    catalog: &dyn BuildCatalog,
    hints: &CoordinateHints,
) -> Result<(BuildCoordinate, ArtifactDescriptor)> {
    let coordinate = resolve_coordinate(catalog, hints).await?;
    let build = catalog
        .build(&coordinate.project, &coordinate.version, coordinate.build)
        .await
        .map_err(|e| QuickError::resolution(CoordinateField::Build, e))?;
    let descriptor = ArtifactDescriptor::from_build(catalog.api_base(), &coordinate, &build);
    info!(link = %descriptor.download_link, sha256 = %descriptor.expected_sha256, "Download link");
    Ok((coordinate, descriptor))
}

fn local_artifact(
    jar: &Path,
    eula: &Path,
    manifest: Option<ArtifactManifest>,
    origin: ArtifactOrigin,
) -> LocalArtifact {
    let size = std::fs::metadata(jar).map(|m| m.len()).unwrap_or(0);
    let (coordinate, sha256) = match manifest {
        Some(m) => (Some(m.coordinate), Some(m.sha256)),
        None => (None, None),
    };
    LocalArtifact {
        path: jar.to_path_buf(),
        executable: is_executable(jar),
        accepted: preparer::is_accepted(eula),
        coordinate,
        sha256,
        size,
        origin,
    }
}

/// Make sure a verified, prepared server jar exists at `server.jar_path()`.
pub async fn acquire(
    catalog: &dyn BuildCatalog,
    server: &ServerConfig,
    hints: &CoordinateHints,
) -> Result<LocalArtifact> {
    let jar = server.jar_path();
    let eula = server.eula_path();

    match inspect_cache(&jar, hints)? {
        CacheState::Valid(manifest) => {
            info!(
                file = %jar.display(),
                coordinate = %manifest.coordinate,
                "Using cached artifact"
            );
            return Ok(local_artifact(&jar, &eula, Some(manifest), ArtifactOrigin::Cached));
        }
        CacheState::Legacy => {
            warn!(
                file = %jar.display(),
                "Using existing artifact without a manifest; its checksum cannot be verified"
            );
            return Ok(local_artifact(&jar, &eula, None, ArtifactOrigin::LegacyCached));
        }
        CacheState::Stale(reason) => {
            info!(file = %jar.display(), reason = %reason, "Cached artifact is stale, re-acquiring");
        }
        CacheState::Missing => {}
    }

    std::fs::create_dir_all(&server.dir).map_err(|e| QuickError::filesystem(&server.dir, e))?;

    let (coordinate, descriptor) = resolve_artifact(catalog, hints).await?;
    let outcome = VerifiedDownloader::new(catalog)
        .download(&descriptor, &jar)
        .await?;
    let manifest = preparer::prepare(
        &jar,
        &eula,
        &coordinate,
        &descriptor.file_name,
        &outcome.sha256,
    )?;

    Ok(local_artifact(&jar, &eula, Some(manifest), ArtifactOrigin::Downloaded))
}
