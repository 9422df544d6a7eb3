//! Configuration file reading and parsing.
//!
//! This module handles locating, reading, and parsing INI-format
//! configuration files, with support for layered overrides.

use std::env;
use std::path::{Path, PathBuf};

use configparser::ini::Ini;
use thiserror::Error;

use super::{Config, DEFAULT_API_URL};

// =============================================================================
// Constants
// =============================================================================

const ENV_CONFIG_FILE: &str = "FORGEFS_CONFIG_FILE";
const ENV_TOKEN: &str = "FORGEFS_TOKEN";
const DEFAULT_CONFIG_FILENAME: &str = ".forgefsconfig";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid override key '{key}': {message}")]
    InvalidOverrideKey { key: String, message: String },
}

/// Result type for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// =============================================================================
// ConfigSource
// =============================================================================

/// Specifies how to locate and layer configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// Explicit config file path from CLI. If specified and doesn't exist,
    /// error. If None, fall back to FORGEFS_CONFIG_FILE env var, then
    /// ~/.forgefsconfig.
    pub config_file: Option<PathBuf>,

    /// Individual key=value overrides (applied last).
    /// Keys use dot-notation: "api.url", "commit.update_message".
    pub overrides: Vec<(String, String)>,
}

// =============================================================================
// Config File Resolution
// =============================================================================

/// Information about how the config file was resolved.
#[derive(Debug)]
pub struct ResolvedConfigFile {
    /// The path to the config file, if one was found.
    pub path: Option<PathBuf>,
    /// Warning message if env var pointed to nonexistent file.
    pub warning: Option<String>,
}

/// Resolve which config file to use based on the ConfigSource and environment.
fn resolve_config_file(source: &ConfigSource) -> Result<ResolvedConfigFile> {
    // If explicit path provided, it must exist
    if let Some(ref path) = source.config_file {
        if path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(path.clone()),
                warning: None,
            });
        } else {
            return Err(ConfigError::FileNotFound(path.clone()));
        }
    }

    // Check environment variable
    if let Ok(env_path) = env::var(ENV_CONFIG_FILE) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(path),
                warning: None,
            });
        } else {
            // Warn but continue with defaults
            return Ok(ResolvedConfigFile {
                path: None,
                warning: Some(format!(
                    "config file specified by {} does not exist: {}",
                    ENV_CONFIG_FILE, env_path
                )),
            });
        }
    }

    // Check ~/.forgefsconfig
    if let Some(home) = home_dir() {
        let default_path = home.join(DEFAULT_CONFIG_FILENAME);
        if default_path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(default_path),
                warning: None,
            });
        }
    }

    // No config file found
    Ok(ResolvedConfigFile {
        path: None,
        warning: None,
    })
}

/// Get the user's home directory.
fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

// =============================================================================
// INI Parsing
// =============================================================================

/// Apply an INI file's contents to a Config, layering on top of existing
/// values.
fn apply_ini_to_config(config: &mut Config, ini: &Ini) {
    // [api] section
    if let Some(url) = ini.get("api", "url") {
        config.api.url = url;
    }
    if let Some(token) = ini.get("api", "token") {
        config.api.token = Some(token);
    }

    // [commit] section
    if let Some(message) = ini.get("commit", "create_message") {
        config.commit.create_message = message;
    }
    if let Some(message) = ini.get("commit", "update_message") {
        config.commit.update_message = message;
    }
    if let Some(message) = ini.get("commit", "delete_message") {
        config.commit.delete_message = message;
    }
    if let Some(message) = ini.get("commit", "rename_message") {
        config.commit.rename_message = message;
    }
}

/// Load and parse an INI file.
fn load_ini(path: &Path) -> Result<Ini> {
    let mut ini = Ini::new();
    ini.load(path).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e,
    })?;
    Ok(ini)
}

// =============================================================================
// Override Application
// =============================================================================

/// Apply a single key=value override to the config.
fn apply_override(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key.split_once('.') {
        Some(("api", "url")) => {
            config.api.url = value.to_string();
            Ok(())
        }
        Some(("api", "token")) => {
            config.api.token = Some(value.to_string());
            Ok(())
        }
        Some(("commit", "create_message")) => {
            config.commit.create_message = value.to_string();
            Ok(())
        }
        Some(("commit", "update_message")) => {
            config.commit.update_message = value.to_string();
            Ok(())
        }
        Some(("commit", "delete_message")) => {
            config.commit.delete_message = value.to_string();
            Ok(())
        }
        Some(("commit", "rename_message")) => {
            config.commit.rename_message = value.to_string();
            Ok(())
        }
        _ => Err(ConfigError::InvalidOverrideKey {
            key: key.to_string(),
            message: "unrecognized key".to_string(),
        }),
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

/// Result of reading configuration, including any warnings.
#[derive(Debug)]
pub struct ConfigResult {
    /// The parsed configuration.
    pub config: Config,
    /// Any warnings generated during config loading.
    pub warnings: Vec<String>,
}

/// Read and parse configuration from the specified sources.
///
/// Configuration is layered in this order:
/// 1. Built-in defaults
/// 2. Config file (from CLI, env var, or ~/.forgefsconfig)
/// 3. FORGEFS_TOKEN environment variable
/// 4. Individual overrides (applied last)
pub fn read_config(source: &ConfigSource) -> Result<ConfigResult> {
    let mut warnings = Vec::new();

    // Start with defaults
    let mut config = Config::default();

    // Resolve and apply base config file
    let resolved = resolve_config_file(source)?;
    if let Some(warning) = resolved.warning {
        warnings.push(warning);
    }
    if let Some(ref path) = resolved.path {
        let ini = load_ini(path)?;
        apply_ini_to_config(&mut config, &ini);
    }

    // Token from the environment beats the config file
    if let Ok(token) = env::var(ENV_TOKEN) {
        if !token.is_empty() {
            config.api.token = Some(token);
        }
    }

    // Apply individual overrides
    for (key, value) in &source.overrides {
        apply_override(&mut config, key, value)?;
    }

    Ok(ConfigResult { config, warnings })
}

// =============================================================================
// Tests
// =============================================================================
