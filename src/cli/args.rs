//! Command-line argument definitions and helpers.

use std::path::PathBuf;

use clap::Args;
use thiserror::Error;
use tokio::io::AsyncReadExt;

use crate::app::AppContext;
use crate::config::ConfigSource;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during argument processing.
#[derive(Debug, Error)]
pub enum ArgsError {
    /// I/O error reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid argument combination.
    #[error("{0}")]
    InvalidArgs(String),
}

/// Result type for argument operations.
pub type Result<T> = std::result::Result<T, ArgsError>;

// =============================================================================
// Global Arguments
// =============================================================================

/// Global arguments that apply to all commands.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Path to the configuration file.
    #[arg(long = "config-file", global = true)]
    pub config_file: Option<PathBuf>,

    /// Configuration overrides in the form name=value.
    #[arg(long = "config", value_parser = parse_config_override, global = true)]
    pub config_overrides: Vec<(String, String)>,

    /// Path to the session file.
    #[arg(long = "session-file", global = true)]
    pub session_file: Option<PathBuf>,
}

impl GlobalArgs {
    /// Convert to a ConfigSource for reading configuration.
    pub fn to_config_source(&self) -> ConfigSource {
        ConfigSource {
            config_file: self.config_file.clone(),
            overrides: self.config_overrides.clone(),
        }
    }

    /// Convert to an AppContext for creating an App.
    pub fn to_app_context(&self) -> AppContext {
        let mut ctx = AppContext::default().with_config_source(self.to_config_source());
        if let Some(ref path) = self.session_file {
            ctx = ctx.with_session_file(path.clone());
        }
        ctx
    }
}

/// Parse a config override from "name=value" format.
fn parse_config_override(s: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid config override '{}': expected name=value", s))?;
    Ok((name.to_string(), value.to_string()))
}

// =============================================================================
// Input Helpers
// =============================================================================

/// Helper for commands that read content from a file or stdin.
#[derive(Args, Debug, Default)]
pub struct InputSource {
    /// Read content from this file instead of stdin.
    #[arg(id = "input_file", short = 'i', long = "input")]
    pub file: Option<PathBuf>,
}

impl InputSource {
    /// Read the input bytes from the file, or stdin when no file is given.
    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        match &self.file {
            Some(path) => Ok(tokio::fs::read(path).await?),
            None => {
                let mut contents = Vec::new();
                tokio::io::stdin().read_to_end(&mut contents).await?;
                Ok(contents)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_override() {
        assert_eq!(
            parse_config_override("api.url=https://x").unwrap(),
            ("api.url".to_string(), "https://x".to_string())
        );
        assert!(parse_config_override("no-equals").is_err());
    }
}
