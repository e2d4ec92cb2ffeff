//! In-memory catalog used by the pipeline unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::artifact::BuildCoordinate;
use crate::error::{QuickError, Result};
use crate::papermc::{
    download_link, BuildCatalog, BuildDownloads, BuildInfo, ByteStream, DownloadEntry,
    ProjectInfo, VersionInfo,
};

pub(crate) const MOCK_API_BASE: &str = "http://catalog.test/v2";

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[derive(Default)]
pub(crate) struct MockCatalog {
    projects: HashMap<String, Vec<String>>,
    versions: HashMap<(String, String), Vec<u32>>,
    builds: HashMap<(String, String, u32), BuildInfo>,
    bodies: HashMap<String, Vec<u8>>,
    broken: HashMap<String, Vec<u8>>,
    project_calls: AtomicUsize,
    version_calls: AtomicUsize,
    build_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

impl MockCatalog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_versions(mut self, project: &str, versions: &[&str]) -> Self {
        self.projects.insert(
            project.to_string(),
            versions.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    pub(crate) fn with_builds(mut self, project: &str, version: &str, builds: &[u32]) -> Self {
        self.versions
            .insert((project.to_string(), version.to_string()), builds.to_vec());
        self
    }

    /// Register build metadata declaring `sha256` and serve `body` at its link.
    pub(crate) fn with_artifact(
        mut self,
        coord: &BuildCoordinate,
        file_name: &str,
        body: &[u8],
        sha256: &str,
    ) -> Self {
        let info = BuildInfo {
            project_id: coord.project.clone(),
            project_name: coord.project.clone(),
            version: coord.version.clone(),
            build: coord.build,
            time: None,
            channel: Some("default".into()),
            promoted: false,
            changes: Vec::new(),
            downloads: BuildDownloads {
                application: DownloadEntry {
                    name: file_name.to_string(),
                    sha256: sha256.to_string(),
                },
                extra: HashMap::new(),
            },
        };
        self.builds.insert(
            (coord.project.clone(), coord.version.clone(), coord.build),
            info,
        );
        let link = download_link(
            MOCK_API_BASE,
            &coord.project,
            &coord.version,
            coord.build,
            file_name,
        );
        self.bodies.insert(link, body.to_vec());
        self
    }

    /// Serve `prefix` at `link` and then fail the stream.
    pub(crate) fn with_broken_body(mut self, link: &str, prefix: &[u8]) -> Self {
        self.broken.insert(link.to_string(), prefix.to_vec());
        self
    }

    pub(crate) fn project_queries(&self) -> usize {
        self.project_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn version_queries(&self) -> usize {
        self.version_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn download_queries(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn total_queries(&self) -> usize {
        self.project_calls.load(Ordering::SeqCst)
            + self.version_calls.load(Ordering::SeqCst)
            + self.build_calls.load(Ordering::SeqCst)
            + self.download_calls.load(Ordering::SeqCst)
    }
}

fn not_found(url: String) -> QuickError {
    QuickError::Api { status: 404, url }
}

#[async_trait]
impl BuildCatalog for MockCatalog {
    fn api_base(&self) -> &str {
        MOCK_API_BASE
    }

    async fn project(&self, project: &str) -> Result<ProjectInfo> {
        self.project_calls.fetch_add(1, Ordering::SeqCst);
        let versions = self
            .projects
            .get(project)
            .cloned()
            .ok_or_else(|| not_found(format!("/projects/{project}")))?;
        Ok(ProjectInfo {
            project_id: project.to_string(),
            project_name: project.to_string(),
            version_groups: Vec::new(),
            versions,
        })
    }

    async fn version(&self, project: &str, version: &str) -> Result<VersionInfo> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        let builds = self
            .versions
            .get(&(project.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("/projects/{project}/versions/{version}")))?;
        Ok(VersionInfo {
            project_id: project.to_string(),
            project_name: project.to_string(),
            version: version.to_string(),
            builds,
        })
    }

    async fn build(&self, project: &str, version: &str, build: u32) -> Result<BuildInfo> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);
        self.builds
            .get(&(project.to_string(), version.to_string(), build))
            .cloned()
            .ok_or_else(|| {
                not_found(format!(
                    "/projects/{project}/versions/{version}/builds/{build}"
                ))
            })
    }

    async fn download(&self, link: &str) -> Result<ByteStream> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(prefix) = self.broken.get(link) {
            let chunks: Vec<Result<Bytes>> = vec![
                Ok(Bytes::from(prefix.clone())),
                Err(QuickError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                ))),
            ];
            return Ok(Box::pin(futures::stream::iter(chunks)));
        }
        let body = self
            .bodies
            .get(link)
            .cloned()
            .ok_or_else(|| not_found(link.to_string()))?;
        // Split into small chunks to exercise incremental hashing.
        let chunks: Vec<Result<Bytes>> = body
            .chunks(7)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}
