//! Reqwest-backed [`BuildCatalog`] for the PaperMC v2 API.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{BuildInfo, ProjectInfo, VersionInfo};
use super::{BuildCatalog, ByteStream};
use crate::config::PaperConfig;
use crate::error::{QuickError, Result};

/// HTTP client for `api.papermc.io` (or a compatible mirror).
#[derive(Debug, Clone)]
pub struct PaperClient {
    api_base: String,
    /// Short timeout, used for catalog queries
    client: Client,
    /// Long timeout, used for artifact downloads
    download_client: Client,
}

impl PaperClient {
    /// Build a client from the `paper` config section.
    pub fn new(config: &PaperConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;
        let download_client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client,
            download_client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url = %url, "PaperMC API request");
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(QuickError::Api {
                status: resp.status().as_u16(),
                url: url.to_string(),
            });
        }
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl BuildCatalog for PaperClient {
    fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn project(&self, project: &str) -> Result<ProjectInfo> {
        let url = format!("{}/projects/{}", self.api_base, project);
        self.get_json(&url).await
    }

    async fn version(&self, project: &str, version: &str) -> Result<VersionInfo> {
        let url = format!("{}/projects/{}/versions/{}", self.api_base, project, version);
        self.get_json(&url).await
    }

    async fn build(&self, project: &str, version: &str, build: u32) -> Result<BuildInfo> {
        let url = format!(
            "{}/projects/{}/versions/{}/builds/{}",
            self.api_base, project, version, build
        );
        self.get_json(&url).await
    }

    async fn download(&self, link: &str) -> Result<ByteStream> {
        debug!(link = %link, "PaperMC artifact request");
        let resp = self.download_client.get(link).send().await?;
        if !resp.status().is_success() {
            return Err(QuickError::Api {
                status: resp.status().as_u16(),
                url: link.to_string(),
            });
        }
        Ok(Box::pin(resp.bytes_stream().map_err(QuickError::from)))
    }
}
