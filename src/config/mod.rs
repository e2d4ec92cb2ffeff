//! Configuration management for quickmc
//!
//! Configuration is read once at startup from an optional JSON file
//! (`quickmc.json` in the working directory by default) and then overridden by
//! environment variables. The resulting [`Config`] is passed explicitly to every
//! component; nothing re-reads the environment later.

mod types;
pub mod validate;

pub use types::*;

use std::path::{Path, PathBuf};

use crate::error::{QuickError, Result};

/// Default config file name, resolved relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "quickmc.json";

impl Config {
    /// Returns the config file path: `QUICKMC_CONFIG` if set, else `./quickmc.json`.
    pub fn path() -> PathBuf {
        std::env::var("QUICKMC_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load configuration from `path` (or the default path) with environment overrides.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::path);
        let mut config = Self::load_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file without environment overrides.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            QuickError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// `PAPERMC_PROJECT`, `PAPERMC_VERSION` and `PAPERMC_BUILD` are the
    /// historical coordinate variables; everything else follows the pattern
    /// `QUICKMC_SECTION_KEY`. Numeric values that fail to parse are ignored.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Coordinate pins
        if let Some(val) = lookup("PAPERMC_PROJECT") {
            self.paper.project = val.trim().to_string();
        }
        if let Some(val) = lookup("PAPERMC_VERSION") {
            self.paper.version = val.trim().to_string();
        }
        if let Some(val) = lookup("PAPERMC_BUILD") {
            self.paper.build = val.trim().to_string();
        }
        if let Some(val) = lookup("QUICKMC_PAPER_API_BASE") {
            self.paper.api_base = val.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("QUICKMC_PAPER_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.paper.timeout_secs = v;
        }

        // Server
        if let Some(val) = lookup("QUICKMC_SERVER_DIR") {
            self.server.dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("QUICKMC_SERVER_JAVA") {
            self.server.java = val;
        }
        if let Some(val) = lookup("QUICKMC_SERVER_HEAP") {
            self.server.heap = val;
        }
        if let Some(v) = lookup("QUICKMC_SERVER_MAX_RESTARTS").and_then(|v| v.parse().ok()) {
            self.server.restart.max_restarts = v;
        }

        // Status probe
        if let Some(v) = lookup("QUICKMC_STATUS_ENABLED").and_then(|v| v.parse().ok()) {
            self.status.enabled = v;
        }
        if let Some(val) = lookup("QUICKMC_STATUS_HOST") {
            self.status.host = val;
        }
        if let Some(v) = lookup("QUICKMC_STATUS_PORT").and_then(|v| v.parse().ok()) {
            self.status.port = v;
        }
        if let Some(v) = lookup("QUICKMC_STATUS_GRACE_SECS").and_then(|v| v.parse().ok()) {
            self.status.grace_secs = v;
        }

        // Health server
        if let Some(val) = lookup("QUICKMC_HEALTH_HOST") {
            self.health.host = val;
        }
        if let Some(v) = lookup("QUICKMC_HEALTH_PORT").and_then(|v| v.parse().ok()) {
            self.health.port = v;
        }

        // Logging
        if let Some(v) = lookup("QUICKMC_LOG_FORMAT").and_then(|v| v.parse().ok()) {
            self.logging.format = v;
        }
        if let Some(val) = lookup("QUICKMC_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Reject values that cannot produce a working launch.
    ///
    /// Build pins are not checked here; the resolver reports those as format errors.
    pub fn validate(&self) -> Result<()> {
        if self.server.heap.trim().is_empty() {
            return Err(QuickError::Config("server.heap must not be empty".into()));
        }
        if self.server.java.trim().is_empty() {
            return Err(QuickError::Config("server.java must not be empty".into()));
        }
        if self.server.jar_name.trim().is_empty() {
            return Err(QuickError::Config("server.jar_name must not be empty".into()));
        }
        if self.health.port == 0 {
            return Err(QuickError::Config("health.port must not be 0".into()));
        }
        let timeouts = [
            ("paper.timeout_secs", self.paper.timeout_secs),
            ("paper.download_timeout_secs", self.paper.download_timeout_secs),
            ("status.timeout_secs", self.status.timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(QuickError::Config(format!("{} must not be 0", name)));
        }
        if !self.paper.api_base.starts_with("http://") && !self.paper.api_base.starts_with("https://")
        {
            return Err(QuickError::Config(format!(
                "paper.api_base must be an http(s) URL, got '{}'",
                self.paper.api_base
            )));
        }
        Ok(())
    }
}
