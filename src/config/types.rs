//! Configuration type definitions for quickmc
//!
//! All types implement serde traits for JSON serialization and have sensible defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration struct for quickmc
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// PaperMC build API and coordinate pins
    pub paper: PaperConfig,
    /// Local server directory and launch settings
    pub server: ServerConfig,
    /// Delayed status probe settings
    pub status: StatusConfig,
    /// Health/metrics HTTP server
    pub health: HealthConfig,
    /// Logging output
    pub logging: LoggingConfig,
}

// ============================================================================
// PaperMC
// ============================================================================

/// Default PaperMC v2 API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.papermc.io/v2";

/// Build API settings. Empty `project`/`version`/`build` mean "resolve automatically".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub project: String,
    pub version: String,
    pub build: String,
    /// API base URL, without trailing slash
    pub api_base: String,
    /// Timeout for catalog queries
    pub timeout_secs: u64,
    /// Timeout for the artifact download as a whole
    pub download_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            version: String::new(),
            build: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: 30,
            download_timeout_secs: 600,
            user_agent: format!("quickmc/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// Local artifact layout and JVM launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Working directory of the server; artifact and marker live here
    pub dir: PathBuf,
    pub jar_name: String,
    pub eula_name: String,
    /// Java executable
    pub java: String,
    /// Value for both -Xms and -Xmx
    pub heap: String,
    /// Extra JVM flags inserted before `-jar`
    pub jvm_args: Vec<String>,
    /// Grace period after sending `stop` before the process is killed
    pub stop_timeout_secs: u64,
    pub restart: RestartPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            jar_name: "papermc.jar".to_string(),
            eula_name: "eula.txt".to_string(),
            java: "java".to_string(),
            heap: "4G".to_string(),
            jvm_args: Vec::new(),
            stop_timeout_secs: 30,
            restart: RestartPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Path of the server jar.
    pub fn jar_path(&self) -> PathBuf {
        self.dir.join(&self.jar_name)
    }

    /// Path of the EULA acceptance marker.
    pub fn eula_path(&self) -> PathBuf {
        self.dir.join(&self.eula_name)
    }
}

/// Restart behaviour after the server process exits on its own.
///
/// The default (`max_restarts = 0`) never restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartPolicy {
    pub max_restarts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 0,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 300_000,
        }
    }
}

// ============================================================================
// Status probe
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Delay before the one-shot probe runs
    pub grace_secs: u64,
    /// Connect/read timeout of the probe
    pub timeout_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".to_string(),
            port: 25565,
            grace_secs: 30,
            timeout_secs: 5,
        }
    }
}

// ============================================================================
// Health server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human readable output
    Pretty,
    /// Compact single-line output with component fields
    #[default]
    Component,
    /// JSON lines for log aggregators
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "component" => Ok(LogFormat::Component),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Optional file to append log lines to
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            level: "info".to_string(),
            file: None,
        }
    }
}
