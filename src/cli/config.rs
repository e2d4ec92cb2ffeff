//! Config check command handler.

use std::path::Path;

use anyhow::{bail, Context, Result};

use quickmc::config::validate::{validate_config, DiagnosticLevel};
use quickmc::config::Config;

use super::ConfigAction;

/// Validate configuration file.
pub(crate) fn cmd_config(action: ConfigAction, path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check => {
            let config_path = path.map(Path::to_path_buf).unwrap_or_else(Config::path);
            println!("Config file: {}", config_path.display());

            let mut errors = 0;
            let mut warnings = 0;

            if config_path.exists() {
                let content = std::fs::read_to_string(&config_path)
                    .context("Failed to read config file")?;
                let raw: serde_json::Value = match serde_json::from_str(&content) {
                    Ok(v) => v,
                    Err(e) => {
                        println!("[ERROR] Invalid JSON: {}", e);
                        bail!("config file {} is not valid JSON", config_path.display());
                    }
                };

                for diag in validate_config(&raw) {
                    println!("{}", diag);
                    match diag.level {
                        DiagnosticLevel::Error => errors += 1,
                        DiagnosticLevel::Warn => warnings += 1,
                        DiagnosticLevel::Ok => {}
                    }
                }
            } else {
                println!("[OK] No config file found (using defaults)");
            }

            // Catches bad values from the environment as well as the file.
            match Config::load(Some(&config_path)) {
                Ok(config) => {
                    println!(
                        "[OK] Effective coordinate: project={} version={} build={}",
                        or_auto(&config.paper.project),
                        or_auto(&config.paper.version),
                        or_auto(&config.paper.build)
                    );
                    println!(
                        "[OK] Server: {} (heap {})",
                        config.server.jar_path().display(),
                        config.server.heap
                    );
                }
                Err(e) => {
                    println!("[ERROR] {}", e);
                    errors += 1;
                }
            }

            if errors == 0 && warnings == 0 {
                println!("\nConfiguration looks good!");
            } else {
                println!("\nFound {} error(s), {} warning(s)", errors, warnings);
            }
            if errors > 0 {
                bail!("configuration has {} error(s)", errors);
            }
        }
    }
    Ok(())
}

fn or_auto(value: &str) -> &str {
    if value.is_empty() {
        "auto"
    } else {
        value
    }
}
