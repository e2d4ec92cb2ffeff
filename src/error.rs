//! Error types for quickmc
//!
//! This module defines all error types used throughout quickmc.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed underlying cause carried by the pipeline error variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coordinate field that failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateField {
    Project,
    Version,
    Build,
}

impl std::fmt::Display for CoordinateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CoordinateField::Project => "project",
            CoordinateField::Version => "version",
            CoordinateField::Build => "build",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for quickmc operations.
#[derive(Error, Debug)]
pub enum QuickError {
    /// Remote catalog query failed or returned unusable data.
    #[error("Resolution error ({field}): {source}")]
    Resolution {
        field: CoordinateField,
        #[source]
        source: BoxError,
    },

    /// User-supplied build number could not be parsed.
    #[error("Format error: build {value:?} is not a positive integer")]
    Format {
        value: String,
        #[source]
        source: Option<std::num::ParseIntError>,
    },

    /// Transport failure while fetching artifact bytes.
    #[error("Download error ({link}): {source}")]
    Download {
        link: String,
        #[source]
        source: BoxError,
    },

    /// Downloaded bytes did not match the declared checksum.
    #[error("Integrity error ({file}): expected sha256 {expected}, got {actual}")]
    Integrity {
        file: String,
        expected: String,
        actual: String,
    },

    /// Permission or write failure while preparing the artifact.
    #[error("Filesystem error ({}): {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The server process could not be started.
    #[error("Launch error ({command}): {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The health/metrics server failed to bind or serve.
    #[error("Server error ({addr}): {source}")]
    Server {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Shutdown was requested before the operation could start.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Configuration-related errors (invalid values, unreadable file, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog API answered with something other than a success status.
    #[error("API error: {status} for {url}")]
    Api { status: u16, url: String },

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl QuickError {
    /// Stable short name of the error kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            QuickError::Resolution { .. } => "resolution",
            QuickError::Format { .. } => "format",
            QuickError::Download { .. } => "download",
            QuickError::Integrity { .. } => "integrity",
            QuickError::Filesystem { .. } => "filesystem",
            QuickError::Launch { .. } => "launch",
            QuickError::Server { .. } => "server",
            QuickError::Cancelled(_) => "cancelled",
            QuickError::Config(_) => "config",
            QuickError::Api { .. } => "api",
            QuickError::Io(_) => "io",
            QuickError::Json(_) => "json",
            QuickError::Http(_) => "http",
        }
    }

    /// Wrap a catalog failure as a resolution error for `field`.
    pub fn resolution(field: CoordinateField, source: impl Into<BoxError>) -> Self {
        QuickError::Resolution {
            field,
            source: source.into(),
        }
    }

    /// Wrap a filesystem failure with the path it happened on.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        QuickError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

/// A specialized `Result` type for quickmc operations.
pub type Result<T> = std::result::Result<T, QuickError>;
