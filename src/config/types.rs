//! Configuration types.
//!
//! This module defines the structures used to represent application
//! configuration as parsed from an INI-format config file.

// =============================================================================
// Constants - Default Values
// =============================================================================

/// Default REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const DEFAULT_CREATE_MESSAGE: &str = "Create {path}";
const DEFAULT_UPDATE_MESSAGE: &str = "Update {path}";
const DEFAULT_DELETE_MESSAGE: &str = "Delete {path}";
const DEFAULT_RENAME_MESSAGE: &str = "Rename {path} to {to}";

// =============================================================================
// Config Sections
// =============================================================================

/// [api] section - remote endpoint and authentication.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// REST API base URL.
    pub url: String,
    /// Bearer token; unauthenticated requests work for public repositories
    /// but are heavily rate-limited and cannot write.
    pub token: Option<String>,
}

/// [commit] section - commit message templates. `{path}` expands to the
/// affected path, and `{to}` to the rename target.
#[derive(Debug, Clone)]
pub struct CommitConfig {
    pub create_message: String,
    pub update_message: String,
    pub delete_message: String,
    pub rename_message: String,
}

// =============================================================================
// Top-Level Config
// =============================================================================

/// Complete application configuration as parsed from config file.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub commit: CommitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                url: DEFAULT_API_URL.to_string(),
                token: None,
            },
            commit: CommitConfig {
                create_message: DEFAULT_CREATE_MESSAGE.to_string(),
                update_message: DEFAULT_UPDATE_MESSAGE.to_string(),
                delete_message: DEFAULT_DELETE_MESSAGE.to_string(),
                rename_message: DEFAULT_RENAME_MESSAGE.to_string(),
            },
        }
    }
}
