//! Build coordinate resolution.
//!
//! Turns user hints (any of project/version/build may be missing) into a
//! fully-qualified [`BuildCoordinate`], asking the catalog only for the
//! fields that were not supplied.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PaperConfig;
use crate::error::{CoordinateField, QuickError, Result};
use crate::papermc::BuildCatalog;

/// Project used when none is configured.
pub const DEFAULT_PROJECT: &str = "paper";

/// A fully resolved (project, version, build) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildCoordinate {
    pub project: String,
    pub version: String,
    pub build: u32,
}

impl fmt::Display for BuildCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.project, self.version, self.build)
    }
}

/// Partially specified coordinate. `None` means "resolve automatically".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinateHints {
    pub project: Option<String>,
    pub version: Option<String>,
    pub build: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl CoordinateHints {
    /// Build hints from raw strings; blank strings become `None`.
    pub fn new(project: &str, version: &str, build: &str) -> Self {
        Self {
            project: non_empty(project),
            version: non_empty(version),
            build: non_empty(build),
        }
    }

    pub fn from_config(config: &PaperConfig) -> Self {
        Self::new(&config.project, &config.version, &config.build)
    }

    /// Parse the pinned build number, if any.
    pub fn parsed_build(&self) -> Result<Option<u32>> {
        let Some(raw) = self.build.as_deref() else {
            return Ok(None);
        };
        match raw.parse::<u32>() {
            Ok(0) => Err(QuickError::Format {
                value: raw.to_string(),
                source: None,
            }),
            Ok(n) => Ok(Some(n)),
            Err(e) => Err(QuickError::Format {
                value: raw.to_string(),
                source: Some(e),
            }),
        }
    }

    /// Project that resolution will use.
    pub fn effective_project(&self) -> &str {
        self.project.as_deref().unwrap_or(DEFAULT_PROJECT)
    }

    /// True when every pinned field agrees with `coordinate`.
    ///
    /// Unpinned fields match anything; an unparsable build pin matches nothing.
    pub fn accepts(&self, coordinate: &BuildCoordinate) -> bool {
        if self.effective_project() != coordinate.project {
            return false;
        }
        if let Some(version) = &self.version {
            if version != &coordinate.version {
                return false;
            }
        }
        match self.parsed_build() {
            Ok(Some(build)) => build == coordinate.build,
            Ok(None) => true,
            Err(_) => false,
        }
    }
}

/// Resolve `hints` into a concrete coordinate.
///
/// - project defaults to [`DEFAULT_PROJECT`]
/// - a missing version is the last entry of the project's version list
/// - a missing build is the last entry of the version's build list
///
/// The catalog's ordering is trusted as-is. A pinned build is parsed before
/// any query is made, so a malformed pin fails without touching the network.
pub async fn resolve_coordinate(
    catalog: &dyn BuildCatalog,
    hints: &CoordinateHints,
) -> Result<BuildCoordinate> {
    let pinned_build = hints.parsed_build()?;
    let project = hints.effective_project().to_string();

    let version = match &hints.version {
        Some(version) => version.clone(),
        None => {
            let info = catalog
                .project(&project)
                .await
                .map_err(|e| QuickError::resolution(CoordinateField::Version, e))?;
            let latest = info.versions.last().cloned().ok_or_else(|| {
                QuickError::resolution(
                    CoordinateField::Version,
                    format!("project '{}' lists no versions", project),
                )
            })?;
            debug!(project = %project, version = %latest, "Resolved latest version");
            latest
        }
    };

    let build = match pinned_build {
        Some(build) => build,
        None => {
            let info = catalog
                .version(&project, &version)
                .await
                .map_err(|e| QuickError::resolution(CoordinateField::Build, e))?;
            let latest = info.builds.last().copied().ok_or_else(|| {
                QuickError::resolution(
                    CoordinateField::Build,
                    format!("{} {} lists no builds", project, version),
                )
            })?;
            debug!(project = %project, version = %version, build = latest, "Resolved latest build");
            latest
        }
    };

    let coordinate = BuildCoordinate {
        project,
        version,
        build,
    };
    info!(
        project = %coordinate.project,
        version = %coordinate.version,
        build = coordinate.build,
        "Resolved build coordinate"
    );
    Ok(coordinate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::test_support::MockCatalog;

    #[tokio::test]
    async fn test_fully_pinned_makes_no_queries() {
        let catalog = MockCatalog::new();
        let hints = CoordinateHints::new("velocity", "3.3.0", "436");

        let coord = resolve_coordinate(&catalog, &hints).await.unwrap();

        assert_eq!(
            coord,
            BuildCoordinate {
                project: "velocity".into(),
                version: "3.3.0".into(),
                build: 436,
            }
        );
        assert_eq!(catalog.total_queries(), 0);
    }

    #[tokio::test]
    async fn test_all_empty_resolves_latest() {
        let catalog = MockCatalog::new()
            .with_versions("paper", &["1.20", "1.21"])
            .with_builds("paper", "1.21", &[10, 11, 12]);

        let coord = resolve_coordinate(&catalog, &CoordinateHints::default())
            .await
            .unwrap();

        assert_eq!(coord.project, "paper");
        assert_eq!(coord.version, "1.21");
        assert_eq!(coord.build, 12);
        assert_eq!(catalog.project_queries(), 1);
        assert_eq!(catalog.version_queries(), 1);
    }

    #[tokio::test]
    async fn test_empty_version_queries_project_once() {
        let catalog = MockCatalog::new().with_versions("folia", &["1.19.4", "1.20.6", "1.21.4"]);
        let hints = CoordinateHints::new("folia", "", "7");

        let coord = resolve_coordinate(&catalog, &hints).await.unwrap();

        assert_eq!(coord.version, "1.21.4");
        assert_eq!(coord.build, 7);
        assert_eq!(catalog.project_queries(), 1);
        assert_eq!(catalog.version_queries(), 0);
    }

    #[tokio::test]
    async fn test_last_element_not_resorted() {
        // The catalog order is trusted even when it is not sorted.
        let catalog = MockCatalog::new().with_builds("paper", "1.21", &[130, 7, 42]);
        let hints = CoordinateHints::new("paper", "1.21", "");

        let coord = resolve_coordinate(&catalog, &hints).await.unwrap();

        assert_eq!(coord.build, 42);
        assert_eq!(catalog.version_queries(), 1);
        assert_eq!(catalog.project_queries(), 0);
    }

    #[tokio::test]
    async fn test_unparsable_build_is_format_error() {
        let catalog = MockCatalog::new().with_versions("paper", &["1.21"]);
        let hints = CoordinateHints::new("paper", "1.21", "abc");

        let err = resolve_coordinate(&catalog, &hints).await.unwrap_err();

        match err {
            QuickError::Format { value, .. } => assert_eq!(value, "abc"),
            other => panic!("expected format error, got {other:?}"),
        }
        assert_eq!(catalog.total_queries(), 0);
    }

    #[tokio::test]
    async fn test_latest_keyword_is_format_error() {
        let catalog = MockCatalog::new().with_versions("paper", &["1.21"]);
        let hints = CoordinateHints::new("", "", "latest");

        let err = resolve_coordinate(&catalog, &hints).await.unwrap_err();

        assert_eq!(err.kind(), "format");
        assert_eq!(catalog.total_queries(), 0);
    }

    #[tokio::test]
    async fn test_zero_build_is_format_error() {
        let catalog = MockCatalog::new();
        let hints = CoordinateHints::new("paper", "1.21", "0");
        assert!(matches!(
            resolve_coordinate(&catalog, &hints).await,
            Err(QuickError::Format { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_project_is_resolution_error() {
        let catalog = MockCatalog::new();
        let hints = CoordinateHints::new("nope", "", "");

        let err = resolve_coordinate(&catalog, &hints).await.unwrap_err();

        assert!(matches!(
            err,
            QuickError::Resolution {
                field: CoordinateField::Version,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_build_list_is_resolution_error() {
        let catalog = MockCatalog::new().with_builds("paper", "1.22", &[]);
        let hints = CoordinateHints::new("paper", "1.22", "");

        let err = resolve_coordinate(&catalog, &hints).await.unwrap_err();

        assert!(matches!(
            err,
            QuickError::Resolution {
                field: CoordinateField::Build,
                ..
            }
        ));
    }

    #[test]
    fn test_hints_blank_strings_are_none() {
        let hints = CoordinateHints::new("  ", "", "\t");
        assert_eq!(hints, CoordinateHints::default());
        assert_eq!(hints.effective_project(), DEFAULT_PROJECT);
    }

    #[test]
    fn test_hints_accepts() {
        let coord = BuildCoordinate {
            project: "paper".into(),
            version: "1.21".into(),
            build: 12,
        };
        assert!(CoordinateHints::default().accepts(&coord));
        assert!(CoordinateHints::new("paper", "1.21", "12").accepts(&coord));
        assert!(CoordinateHints::new("", "1.21", "").accepts(&coord));
        assert!(!CoordinateHints::new("folia", "", "").accepts(&coord));
        assert!(!CoordinateHints::new("", "1.20", "").accepts(&coord));
        assert!(!CoordinateHints::new("", "", "11").accepts(&coord));
        assert!(!CoordinateHints::new("", "", "abc").accepts(&coord));
    }

    #[test]
    fn test_coordinate_display() {
        let coord = BuildCoordinate {
            project: "paper".into(),
            version: "1.21".into(),
            build: 12,
        };
        assert_eq!(coord.to_string(), "paper-1.21-12");
    }
}
