//! Repository session commands.

use clap::Args;

use crate::app::App;
use crate::cli::{CliError, Result};
use crate::session::{SortDirection, SortKey, SortState};
use crate::store::RepoId;

// =============================================================================
// Open
// =============================================================================

/// Arguments for the open command.
#[derive(Args, Debug)]
pub struct OpenArgs {
    /// Repository in owner/name form.
    pub repo: String,
}

impl OpenArgs {
    pub async fn run(self, app: &App) -> Result<()> {
        let handle = app.open_repository(&self.repo).await?;
        println!(
            "opened {} (default branch: {})",
            handle.id, handle.default_branch
        );
        Ok(())
    }
}

// =============================================================================
// Close
// =============================================================================

/// Arguments for the close command.
#[derive(Args, Debug)]
pub struct CloseArgs {
    /// Repository in owner/name form.
    pub repo: String,
}

impl CloseArgs {
    pub async fn run(self, app: &App) -> Result<()> {
        if app.close_repository(&self.repo).await? {
            println!("closed {}", self.repo);
        } else {
            println!("{} was not open", self.repo);
        }
        Ok(())
    }
}

// =============================================================================
// Repos
// =============================================================================

/// Arguments for the repos command.
#[derive(Args, Debug)]
pub struct ReposArgs {
    /// Sort key: name or owner. Persisted as the session preference.
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort in descending order.
    #[arg(long)]
    pub desc: bool,
}

impl ReposArgs {
    pub async fn run(self, app: &App) -> Result<()> {
        if let Some(ref key) = self.sort {
            let key = match key.as_str() {
                "name" => SortKey::Name,
                "owner" => SortKey::Owner,
                other => {
                    return Err(CliError::Other(format!(
                        "invalid sort key '{}': expected 'name' or 'owner'",
                        other
                    )))
                }
            };
            let direction = if self.desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            app.set_sort(SortState { key, direction }).await?;
        }

        for handle in app.list_repositories().await {
            let mut flags = Vec::new();
            if handle.private {
                flags.push("private");
            }
            if handle.fork {
                flags.push("fork");
            }
            if flags.is_empty() {
                println!("{}", handle.id);
            } else {
                println!("{} ({})", handle.id, flags.join(", "));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Refresh
// =============================================================================

/// Arguments for the refresh command.
#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Repository in owner/name form.
    pub repo: String,
}

impl RefreshArgs {
    pub async fn run(self, app: &App) -> Result<()> {
        let id: RepoId = self
            .repo
            .parse()
            .map_err(|e| CliError::Other(format!("{}", e)))?;
        let snapshot = app.store().refresh_tree(&id).await.map_err(|e| {
            CliError::Other(format!("failed to refresh {}: {}", id, e))
        })?;
        println!("{}: {} files at tree {}", id, snapshot.len(), snapshot.tree_sha);
        Ok(())
    }
}
