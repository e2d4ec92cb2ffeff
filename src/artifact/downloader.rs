//! Checksum-verified artifact download.
//!
//! Bytes are streamed into `<dest>.part` while being hashed. Only a file whose
//! SHA-256 matches the catalog's declared digest is renamed onto `dest`; every
//! failure path removes the partial file, so `dest` never holds unverified bytes.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::resolver::BuildCoordinate;
use crate::error::{QuickError, Result};
use crate::papermc::{download_link, BuildCatalog, BuildInfo};

/// Where to fetch an artifact from and what it must hash to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub download_link: String,
    pub file_name: String,
    /// Lowercase hex SHA-256
    pub expected_sha256: String,
}

impl ArtifactDescriptor {
    /// Derive the descriptor of `coordinate` from its build metadata.
    pub fn from_build(api_base: &str, coordinate: &BuildCoordinate, build: &BuildInfo) -> Self {
        let file_name = build.downloads.application.name.clone();
        Self {
            download_link: download_link(
                api_base,
                &coordinate.project,
                &coordinate.version,
                coordinate.build,
                &file_name,
            ),
            file_name,
            expected_sha256: normalize_digest(&build.downloads.application.sha256),
        }
    }
}

/// A verified file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: u64,
}

pub(crate) fn normalize_digest(digest: &str) -> String {
    digest.trim().to_ascii_lowercase()
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Downloads artifacts from a [`BuildCatalog`] and verifies them.
pub struct VerifiedDownloader<'a> {
    catalog: &'a dyn BuildCatalog,
}

impl<'a> VerifiedDownloader<'a> {
    pub fn new(catalog: &'a dyn BuildCatalog) -> Self {
        Self { catalog }
    }

    /// Fetch `descriptor` into `dest`, verifying its checksum first.
    ///
    /// # Errors
    ///
    /// - [`QuickError::Download`] on transport failure
    /// - [`QuickError::Integrity`] when the digest does not match
    /// - [`QuickError::Filesystem`] when the file cannot be written or renamed
    pub async fn download(
        &self,
        descriptor: &ArtifactDescriptor,
        dest: &Path,
    ) -> Result<DownloadOutcome> {
        let part = partial_path(dest);
        info!(link = %descriptor.download_link, file = %dest.display(), "Downloading artifact");

        let (actual, bytes) = match self.stream_to_file(descriptor, &part).await {
            Ok(result) => result,
            Err(e) => {
                discard(&part).await;
                return Err(e);
            }
        };

        let expected = normalize_digest(&descriptor.expected_sha256);
        if actual != expected {
            discard(&part).await;
            warn!(
                file = %descriptor.file_name,
                expected = %expected,
                actual = %actual,
                "Checksum mismatch, artifact discarded"
            );
            return Err(QuickError::Integrity {
                file: descriptor.file_name.clone(),
                expected,
                actual,
            });
        }

        if let Err(e) = tokio::fs::rename(&part, dest).await {
            discard(&part).await;
            return Err(QuickError::filesystem(dest, e));
        }

        info!(file = %dest.display(), bytes, sha256 = %actual, "Artifact verified");
        Ok(DownloadOutcome {
            path: dest.to_path_buf(),
            sha256: actual,
            bytes,
        })
    }

    async fn stream_to_file(
        &self,
        descriptor: &ArtifactDescriptor,
        part: &Path,
    ) -> Result<(String, u64)> {
        let link = &descriptor.download_link;
        let download_error = |e: QuickError| QuickError::Download {
            link: link.clone(),
            source: Box::new(e),
        };

        let mut stream = self.catalog.download(link).await.map_err(download_error)?;
        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|e| QuickError::filesystem(part, e))?;

        let mut hasher = Sha256::new();
        let mut bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(download_error)?;
            hasher.update(&chunk);
            bytes += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|e| QuickError::filesystem(part, e))?;
        }
        file.flush()
            .await
            .map_err(|e| QuickError::filesystem(part, e))?;
        file.sync_all()
            .await
            .map_err(|e| QuickError::filesystem(part, e))?;

        debug!(link = %link, bytes, "Artifact stream complete");
        Ok((hex::encode(hasher.finalize()), bytes))
    }
}

async fn discard(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => debug!(file = %part.display(), "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(file = %part.display(), error = %e, "Failed to remove partial download"),
    }
}
