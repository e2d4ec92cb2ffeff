//! Artifact manifest persisted next to the server jar.
//!
//! Records which coordinate the jar was built from and its verified digest so
//! a later run can decide, without network access, whether the jar on disk is
//! still the one it wants.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use super::resolver::BuildCoordinate;
use crate::error::{QuickError, Result};

/// Persisted record of a verified artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub coordinate: BuildCoordinate,
    /// File name as published by the catalog (e.g. `paper-1.21-12.jar`)
    pub file_name: String,
    pub sha256: String,
    /// RFC 3339 time of verification
    pub recorded_at: String,
}

/// Manifest location for an artifact: `<artifact>.manifest.json`.
pub fn manifest_path(artifact: &Path) -> PathBuf {
    let mut name = artifact
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".manifest.json");
    artifact.with_file_name(name)
}

/// SHA-256 of a file on disk, lowercase hex.
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

impl ArtifactManifest {
    pub fn new(coordinate: BuildCoordinate, file_name: &str, sha256: &str) -> Self {
        Self {
            coordinate,
            file_name: file_name.to_string(),
            sha256: sha256.to_string(),
            recorded_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Load a manifest. Returns `Ok(None)` when the file does not exist.
    ///
    /// A manifest that exists but cannot be parsed is an error; callers treat
    /// it as unverifiable.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(QuickError::filesystem(path, e)),
        };
        match serde_json::from_str(&content) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Unreadable artifact manifest");
                Err(QuickError::Json(e))
            }
        }
    }

    /// Save atomically (write temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("tmp");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, json).map_err(|e| QuickError::filesystem(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| QuickError::filesystem(path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord() -> BuildCoordinate {
        BuildCoordinate {
            project: "paper".into(),
            version: "1.21".into(),
            build: 12,
        }
    }

    #[test]
    fn test_manifest_path() {
        assert_eq!(
            manifest_path(Path::new("/srv/papermc.jar")),
            PathBuf::from("/srv/papermc.jar.manifest.json")
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papermc.jar.manifest.json");
        let manifest = ArtifactManifest::new(coord(), "paper-1.21-12.jar", "abcd");

        manifest.save(&path).unwrap();
        let loaded = ArtifactManifest::load(&path).unwrap().unwrap();

        assert_eq!(loaded, manifest);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = ArtifactManifest::load(&dir.path().join("missing.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_malformed_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papermc.jar.manifest.json");
        std::fs::write(&path, "{\"coordinate\":").unwrap();
        assert!(ArtifactManifest::load(&path).is_err());
    }

    #[test]
    fn test_file_sha256_known_vector() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            file_sha256(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
