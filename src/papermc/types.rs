//! PaperMC v2 API response types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `GET /projects/{project}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub project_id: String,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub version_groups: Vec<String>,
    /// Ordered as returned by the API (oldest first).
    pub versions: Vec<String>,
}

/// `GET /projects/{project}/versions/{version}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub project_id: String,
    #[serde(default)]
    pub project_name: String,
    pub version: String,
    /// Ordered as returned by the API (oldest first).
    pub builds: Vec<u32>,
}

/// `GET /projects/{project}/versions/{version}/builds/{build}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub project_id: String,
    #[serde(default)]
    pub project_name: String,
    pub version: String,
    pub build: u32,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub promoted: bool,
    #[serde(default)]
    pub changes: Vec<BuildChange>,
    pub downloads: BuildDownloads,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildChange {
    pub commit: String,
    pub summary: String,
    #[serde(default)]
    pub message: String,
}

/// Download entries of a build. `application` is the server jar; other
/// entries (e.g. `mojang-mappings`) are kept but unused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildDownloads {
    pub application: DownloadEntry,
    #[serde(flatten)]
    pub extra: HashMap<String, DownloadEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadEntry {
    pub name: String,
    /// Lowercase hex SHA-256 of the file
    pub sha256: String,
}
