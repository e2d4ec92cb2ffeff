//! PaperMC build catalog.
//!
//! [`BuildCatalog`] is the seam between the acquisition pipeline and the
//! remote build API: the pipeline only ever talks to the trait, so tests can
//! substitute an in-memory catalog and count the queries made against it.
//! [`PaperClient`] is the production implementation.

pub mod client;
pub mod types;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

pub use client::PaperClient;
pub use types::{BuildChange, BuildDownloads, BuildInfo, DownloadEntry, ProjectInfo, VersionInfo};

use crate::error::Result;

/// Chunked artifact body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Read access to a PaperMC-style build catalog.
#[async_trait]
pub trait BuildCatalog: Send + Sync {
    /// API base URL used to derive download links.
    fn api_base(&self) -> &str;

    /// List the versions of a project.
    async fn project(&self, project: &str) -> Result<ProjectInfo>;

    /// List the builds of a project version.
    async fn version(&self, project: &str, version: &str) -> Result<VersionInfo>;

    /// Fetch metadata (file name, checksum) of one build.
    async fn build(&self, project: &str, version: &str, build: u32) -> Result<BuildInfo>;

    /// Open the artifact body at `link`.
    async fn download(&self, link: &str) -> Result<ByteStream>;
}

/// Download link of a build's file. Pure; no request is made.
///
/// ```
/// use quickmc::papermc::download_link;
/// assert_eq!(
///     download_link("https://api.papermc.io/v2", "paper", "1.21", 12, "paper-1.21-12.jar"),
///     "https://api.papermc.io/v2/projects/paper/versions/1.21/builds/12/downloads/paper-1.21-12.jar",
/// );
/// ```
pub fn download_link(
    api_base: &str,
    project: &str,
    version: &str,
    build: u32,
    file_name: &str,
) -> String {
    format!(
        "{}/projects/{}/versions/{}/builds/{}/downloads/{}",
        api_base.trim_end_matches('/'),
        project,
        version,
        build,
        file_name
    )
}
