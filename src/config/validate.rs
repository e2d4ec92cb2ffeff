//! Configuration validation with unknown field detection.

use serde_json::Value;
use std::collections::HashSet;

/// Known top-level config field names.
const KNOWN_TOP_LEVEL: &[&str] = &["paper", "server", "status", "health", "logging"];

/// Known fields for each section.
const KNOWN_PAPER: &[&str] = &[
    "project",
    "version",
    "build",
    "api_base",
    "timeout_secs",
    "download_timeout_secs",
    "user_agent",
];

const KNOWN_SERVER: &[&str] = &[
    "dir",
    "jar_name",
    "eula_name",
    "java",
    "heap",
    "jvm_args",
    "stop_timeout_secs",
    "restart",
];

const KNOWN_RESTART: &[&str] = &["max_restarts", "initial_backoff_ms", "max_backoff_ms"];

const KNOWN_STATUS: &[&str] = &["enabled", "host", "port", "grace_secs", "timeout_secs"];

const KNOWN_HEALTH: &[&str] = &["host", "port"];

const KNOWN_LOGGING: &[&str] = &["format", "level", "file"];

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Simple Levenshtein distance for "did you mean?" suggestions.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut matrix = vec![vec![0usize; b.len() + 1]; a.len() + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, val) in matrix[0].iter_mut().enumerate() {
        *val = j;
    }

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            matrix[i + 1][j + 1] = std::cmp::min(
                std::cmp::min(matrix[i][j + 1] + 1, matrix[i + 1][j] + 1),
                matrix[i][j] + cost,
            );
        }
    }
    matrix[a.len()][b.len()]
}

/// Suggest the closest known field name (if distance <= 3).
pub fn suggest_field(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

fn check_keys(
    obj: &serde_json::Map<String, Value>,
    prefix: &str,
    known: &[&str],
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    let known_set: HashSet<&str> = known.iter().copied().collect();
    let mut has_unknown = false;
    for key in obj.keys() {
        if known_set.contains(key.as_str()) {
            continue;
        }
        has_unknown = true;
        let msg = match suggest_field(key, known) {
            Some(suggestion) => format!("Unknown field '{}' ({})", key, suggestion),
            None => format!("Unknown field '{}'", key),
        };
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Error,
            path,
            message: msg,
        });
    }
    has_unknown
}

/// Validate a raw JSON config value against known field names.
pub fn validate_config(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match raw.as_object() {
        Some(o) => o,
        None => {
            diagnostics.push(Diagnostic {
                level: DiagnosticLevel::Error,
                path: String::new(),
                message: "Config must be a JSON object".to_string(),
            });
            return diagnostics;
        }
    };

    diagnostics.push(Diagnostic {
        level: DiagnosticLevel::Ok,
        path: String::new(),
        message: "Valid JSON".to_string(),
    });

    let mut has_unknown = check_keys(obj, "", KNOWN_TOP_LEVEL, &mut diagnostics);
    let sections: [(&str, &[&str]); 6] = [
        ("paper", KNOWN_PAPER),
        ("server", KNOWN_SERVER),
        ("server.restart", KNOWN_RESTART),
        ("status", KNOWN_STATUS),
        ("health", KNOWN_HEALTH),
        ("logging", KNOWN_LOGGING),
    ];
    for (path, known) in sections {
        let section = path
            .split('.')
            .try_fold(raw, |value, key| value.get(key))
            .and_then(|v| v.as_object());
        if let Some(section) = section {
            has_unknown |= check_keys(section, path, known, &mut diagnostics);
        }
    }

    if !has_unknown {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Ok,
            path: String::new(),
            message: "All fields recognized".to_string(),
        });
    }

    // A pinned build that is not a number fails at startup, not here.
    if let Some(build) = obj
        .get("paper")
        .and_then(|p| p.get("build"))
        .and_then(|b| b.as_str())
    {
        if !build.trim().is_empty() && build.trim().parse::<u32>().is_err() {
            diagnostics.push(Diagnostic {
                level: DiagnosticLevel::Warn,
                path: "paper.build".to_string(),
                message: format!("'{}' is not a build number; startup will fail", build),
            });
        }
    }

    // Pinning a build without a version resolves the build against the latest version.
    let pinned = |key: &str| {
        obj.get("paper")
            .and_then(|p| p.get(key))
            .and_then(|v| v.as_str())
            .is_some_and(|s| !s.trim().is_empty())
    };
    if pinned("build") && !pinned("version") {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Warn,
            path: "paper.version".to_string(),
            message: "Build is pinned but version is not; the build number will be \
                      combined with whatever version is latest"
                .to_string(),
        });
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("heap", "heap"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("server", "sever"), 1);
    }

    #[test]
    fn test_levenshtein_different() {
        assert!(levenshtein("paper", "logging") > 3);
    }

    #[test]
    fn test_suggest_field_match() {
        let result = suggest_field("helth", KNOWN_TOP_LEVEL);
        assert!(result.unwrap().contains("health"));
    }

    #[test]
    fn test_suggest_field_no_match() {
        assert!(suggest_field("xyzabcdef", KNOWN_TOP_LEVEL).is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        let raw = json!({
            "paper": {"project": "paper", "version": "1.21"},
            "health": {"port": 8080}
        });
        let diags = validate_config(&raw);
        assert!(diags.iter().all(|d| d.level != DiagnosticLevel::Error));
    }

    #[test]
    fn test_validate_unknown_top_level() {
        let diags = validate_config(&json!({"papers": {}}));
        let err = diags
            .iter()
            .find(|d| d.level == DiagnosticLevel::Error)
            .unwrap();
        assert_eq!(err.path, "papers");
        assert!(err.message.contains("did you mean 'paper'"));
    }

    #[test]
    fn test_validate_unknown_nested_field() {
        let diags = validate_config(&json!({"server": {"heapsize": "4G"}}));
        assert!(diags
            .iter()
            .any(|d| d.level == DiagnosticLevel::Error && d.path == "server.heapsize"));
    }

    #[test]
    fn test_validate_unknown_restart_field() {
        let diags = validate_config(&json!({"server": {"restart": {"max_restart": 3}}}));
        let err = diags
            .iter()
            .find(|d| d.level == DiagnosticLevel::Error)
            .unwrap();
        assert_eq!(err.path, "server.restart.max_restart");
        assert!(err.message.contains("did you mean 'max_restarts'"));
    }

    #[test]
    fn test_validate_known_restart_fields() {
        let diags = validate_config(&json!({
            "server": {"restart": {"max_restarts": 3, "initial_backoff_ms": 500, "max_backoff_ms": 8000}}
        }));
        assert!(diags.iter().all(|d| d.level != DiagnosticLevel::Error));
    }

    #[test]
    fn test_validate_warns_non_numeric_build() {
        let diags = validate_config(&json!({"paper": {"version": "1.21", "build": "latest"}}));
        assert!(diags
            .iter()
            .any(|d| d.level == DiagnosticLevel::Warn && d.path == "paper.build"));
    }

    #[test]
    fn test_validate_warns_build_without_version() {
        let diags = validate_config(&json!({"paper": {"build": "12"}}));
        assert!(diags
            .iter()
            .any(|d| d.level == DiagnosticLevel::Warn && d.path == "paper.version"));
    }

    #[test]
    fn test_validate_not_an_object() {
        let diags = validate_config(&json!("not an object"));
        assert!(diags.iter().any(|d| {
            d.level == DiagnosticLevel::Error && d.message.contains("must be a JSON object")
        }));
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic {
            level: DiagnosticLevel::Warn,
            path: "paper.build".into(),
            message: "bad".into(),
        };
        assert_eq!(d.to_string(), "[WARN] paper.build: bad");
    }
}
