//! Makes a verified artifact runnable.

use std::path::Path;

use tracing::info;

use super::manifest::{manifest_path, ArtifactManifest};
use super::resolver::BuildCoordinate;
use crate::error::{QuickError, Result};

/// Exact content of the EULA acceptance marker.
pub const EULA_CONTENTS: &str = "eula=true";

/// Set mode `0755` on `path`. No-op on non-Unix targets.
pub fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o755);
        std::fs::set_permissions(path, perms).map_err(|e| QuickError::filesystem(path, e))?;
    }
    #[cfg(not(unix))]
    {
        if !path.exists() {
            return Err(QuickError::filesystem(
                path,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
    }
    Ok(())
}

/// Write the EULA acceptance marker with mode `0644`, replacing any existing content.
pub fn write_acceptance_marker(path: &Path) -> Result<()> {
    std::fs::write(path, EULA_CONTENTS).map_err(|e| QuickError::filesystem(path, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
            .map_err(|e| QuickError::filesystem(path, e))?;
    }
    Ok(())
}

/// Whether `path` holds exactly the acceptance marker content.
pub fn is_accepted(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .map(|content| content.trim() == EULA_CONTENTS)
        .unwrap_or(false)
}

/// First-time setup of a freshly verified artifact: executable bit,
/// acceptance marker and manifest, in that order.
pub fn prepare(
    artifact: &Path,
    eula: &Path,
    coordinate: &BuildCoordinate,
    file_name: &str,
    sha256: &str,
) -> Result<ArtifactManifest> {
    set_executable(artifact)?;
    write_acceptance_marker(eula)?;

    let manifest = ArtifactManifest::new(coordinate.clone(), file_name, sha256);
    manifest.save(&manifest_path(artifact))?;

    info!(
        artifact = %artifact.display(),
        eula = %eula.display(),
        coordinate = %coordinate,
        "Artifact prepared"
    );
    Ok(manifest)
}
