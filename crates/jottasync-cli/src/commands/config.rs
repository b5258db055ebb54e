//! Config command - View and manage jottasync configuration
//!
//! Provides the `jottasync config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Prints where the configuration file lives

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Subcommand;
use jottasync_core::config::Config;
use tracing::info;

use super::Context;

/// Keys accepted by `config set`, with a short description
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("sync.prune_files", "true|false"),
    ("sync.prune_folders", "true|false"),
    ("sync.dry_run", "true|false"),
    ("sync.follow_links", "true|false"),
    ("sync.exclude", "Comma-separated regular expressions"),
    ("sync.remote_root", "Remote folder, e.g. /Jotta/Sync"),
    ("transfer.workers", "Concurrent uploads (1-32)"),
    ("transfer.max_retries", "Retries for transient failures"),
    ("transfer.retry_base_delay_ms", "First retry delay (ms)"),
    ("fingerprint.backend", "xattr|sqlite|memory|none"),
    ("fingerprint.db_path", "SQLite fingerprint database"),
    ("remote.base_url", "JFS metadata endpoint"),
    ("remote.upload_url", "JFS upload endpoint"),
    ("remote.api_version", "X-JottaAPIVersion header"),
    ("remote.device_name", "Device uploads are attributed to"),
    ("remote.username", "Account name, or none"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("logging.error_file", "JSON-lines failure log, or none"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "transfer.workers")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Print the configuration file location
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(ctx),
            ConfigCommand::Set { key, value } => execute_set(ctx, key, value),
            ConfigCommand::Validate => execute_validate(ctx),
            ConfigCommand::Path => execute_path(ctx),
        }
    }
}

fn execute_show(ctx: &Context) -> Result<()> {
    let formatter = ctx.formatter();
    let config = ctx.load_config();

    if ctx.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
        return Ok(());
    }

    formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
    formatter.info("");
    let yaml =
        serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
    for line in yaml.lines() {
        formatter.info(line);
    }
    Ok(())
}

fn execute_set(ctx: &Context, key: &str, value: &str) -> Result<()> {
    let formatter = ctx.formatter();
    let mut config = ctx.load_config();

    info!(key = %key, value = %value, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut config, key, value) {
        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "error": e.to_string(),
            }));
        } else {
            formatter.error(&format!("Failed to set '{key}': {e}"));
            formatter.info("");
            formatter.info("Supported keys:");
            for (name, help) in SUPPORTED_KEYS {
                formatter.info(&format!("  {name:<30} - {help}"));
            }
        }
        return Ok(());
    }

    let errors: Vec<String> = config.validate().iter().map(ToString::to_string).collect();
    if !errors.is_empty() {
        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "errors": errors,
            }));
        } else {
            formatter.error(&format!("Invalid value for '{key}': {}", errors.join("; ")));
        }
        return Ok(());
    }

    save(&config, &ctx.config_path)?;

    if ctx.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "value": value,
            "config_path": ctx.config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Set {key} = {value}"));
        formatter.info(&format!("Saved to {}", ctx.config_path.display()));
    }
    Ok(())
}

fn execute_validate(ctx: &Context) -> Result<()> {
    let formatter = ctx.formatter();
    let path = &ctx.config_path;

    if !path.exists() {
        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "valid": true,
                "config_path": path.display().to_string(),
                "errors": [],
                "note": "Configuration file not found. Using defaults.",
            }));
        } else {
            formatter.info(&format!("Configuration file not found at {}", path.display()));
            formatter.info(
                "Using default configuration. Run 'jottasync config set <key> <value>' to create one.",
            );
        }
        return Ok(());
    }

    let config = match Config::load(path) {
        Ok(config) => config,
        Err(e) => {
            if ctx.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": path.display().to_string(),
                    "errors": [format!("Failed to parse configuration: {e:#}")],
                }));
            } else {
                formatter.error(&format!("Failed to parse configuration: {e:#}"));
                formatter.info(&format!("File: {}", path.display()));
            }
            anyhow::bail!("Configuration is invalid");
        }
    };

    info!(config_path = %path.display(), "Validating configuration");
    let errors = config.validate();

    if ctx.is_json() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": path.display().to_string(),
            "errors": messages,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("Configuration is invalid")
    }
}

fn execute_path(ctx: &Context) -> Result<()> {
    let path = ctx.config_path.display().to_string();
    if ctx.is_json() {
        ctx.formatter().print_json(&serde_json::json!({
            "config_path": path,
            "exists": ctx.config_path.exists(),
        }));
    } else {
        println!("{path}");
    }
    Ok(())
}

fn save(config: &Config, path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    std::fs::write(path, yaml).context("Failed to write configuration file")
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => anyhow::bail!("Expected true or false for {key}"),
    }
}

/// `none` or an empty string clears an optional value
fn optional(value: &str) -> Option<&str> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value)
    }
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- sync ---
        "sync.prune_files" => config.sync.prune_files = parse_bool(key, value)?,
        "sync.prune_folders" => config.sync.prune_folders = parse_bool(key, value)?,
        "sync.dry_run" => config.sync.dry_run = parse_bool(key, value)?,
        "sync.follow_links" => config.sync.follow_links = parse_bool(key, value)?,
        "sync.exclude" => {
            config.sync.exclude = value
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
        "sync.remote_root" => config.sync.remote_root = value.to_string(),

        // --- transfer ---
        "transfer.workers" => {
            config.transfer.workers = value
                .parse::<u32>()
                .context("Expected a positive integer for transfer.workers")?;
        }
        "transfer.max_retries" => {
            config.transfer.max_retries = value
                .parse::<u32>()
                .context("Expected a positive integer for transfer.max_retries")?;
        }
        "transfer.retry_base_delay_ms" => {
            config.transfer.retry_base_delay_ms = value
                .parse::<u64>()
                .context("Expected a positive integer for transfer.retry_base_delay_ms")?;
        }

        // --- fingerprint ---
        "fingerprint.backend" => config.fingerprint.backend = value.to_string(),
        "fingerprint.db_path" => config.fingerprint.db_path = PathBuf::from(value),

        // --- remote ---
        "remote.base_url" => config.remote.base_url = value.to_string(),
        "remote.upload_url" => config.remote.upload_url = value.to_string(),
        "remote.api_version" => config.remote.api_version = value.to_string(),
        "remote.device_name" => config.remote.device_name = value.to_string(),
        "remote.username" => config.remote.username = optional(value).map(String::from),

        // --- logging ---
        "logging.level" => config.logging.level = value.to_string(),
        "logging.error_file" => config.logging.error_file = optional(value).map(PathBuf::from),

        _ => anyhow::bail!("Unknown configuration key: '{key}'"),
    }

    Ok(())
}
