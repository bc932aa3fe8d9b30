//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses
//! the vetteam-core research team and tool protocol.

pub mod config;
pub mod run;
pub mod tool_host;
pub mod tools;

use std::path::Path;

use vetteam_core::AppConfig;

/// Load configuration using the standard lookup order.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, String> {
    let (config, path) = AppConfig::load(explicit).map_err(|e| e.to_string())?;
    match path {
        Some(path) => tracing::debug!("[CLI] Using config {}", path.display()),
        None => tracing::debug!("[CLI] Using built-in defaults"),
    }
    Ok(config)
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
