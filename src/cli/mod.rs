//! Command-line interface for forgefs.

pub mod args;
mod commands;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::app::{App, AppError};
use crate::fs::{FsError, RepoUri, UriError};
use crate::store::RepoId;

pub use args::{GlobalArgs, InputSource};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during CLI execution.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument processing error.
    #[error("{0}")]
    Args(#[from] args::ArgsError),

    /// App error.
    #[error("{0}")]
    App(#[from] AppError),

    /// Filesystem error.
    #[error("{0}")]
    Fs(#[from] FsError),

    /// Invalid target path.
    #[error("{0}")]
    Uri(#[from] UriError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// Parse a target path argument.
///
/// Accepts the full `forgefs://owner/repo/path` form or the bare
/// `owner/repo/path` shorthand.
pub(crate) fn parse_target(s: &str) -> Result<RepoUri> {
    if s.contains("://") {
        return Ok(s.parse()?);
    }
    let mut segments = s.splitn(3, '/');
    let owner = segments.next().unwrap_or_default();
    let name = segments.next().unwrap_or_default();
    if owner.is_empty() || name.is_empty() {
        return Err(CliError::Other(format!(
            "invalid target '{}': expected owner/repo[/path]",
            s
        )));
    }
    let path = segments.next().unwrap_or_default();
    Ok(RepoUri::new(RepoId::new(owner, name), path))
}

// =============================================================================
// CLI Definition
// =============================================================================

/// forgefs - mount remote repositories as a virtual filesystem.
#[derive(Parser, Debug)]
#[command(name = "ffs", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a repository and add it to the session.
    Open(commands::repos::OpenArgs),

    /// Close a repository and remove it from the session.
    Close(commands::repos::CloseArgs),

    /// List repositories in the session.
    Repos(commands::repos::ReposArgs),

    /// Re-fetch a repository's tree from the remote.
    Refresh(commands::repos::RefreshArgs),

    /// List a directory.
    Ls(commands::files::LsArgs),

    /// Print a file's contents.
    Cat(commands::files::CatArgs),

    /// Write a file from stdin or a local file.
    Put(commands::files::PutArgs),

    /// Delete files or directories.
    Rm(commands::files::RmArgs),

    /// Rename or move a file or directory.
    Mv(commands::files::MvArgs),

    /// Create a directory.
    Mkdir(commands::files::MkdirArgs),

    /// Show file metadata.
    Stat(commands::files::StatArgs),
}

// =============================================================================
// CLI Execution
// =============================================================================

impl Cli {
    /// Parse command-line arguments and return the CLI instance.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let app = App::new(self.global.to_app_context())?;
        app.hydrate().await?;

        match self.command {
            Command::Open(args) => args.run(&app).await,
            Command::Close(args) => args.run(&app).await,
            Command::Repos(args) => args.run(&app).await,
            Command::Refresh(args) => args.run(&app).await,
            Command::Ls(args) => args.run(&app).await,
            Command::Cat(args) => args.run(&app).await,
            Command::Put(args) => args.run(&app).await,
            Command::Rm(args) => args.run(&app).await,
            Command::Mv(args) => args.run(&app).await,
            Command::Mkdir(args) => args.run(&app).await,
            Command::Stat(args) => args.run(&app).await,
        }
    }
}

/// Main entry point for the CLI.
pub async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_shorthand() {
        let uri = parse_target("octo/widgets/src/lib.rs").unwrap();
        assert_eq!(uri.repo, RepoId::new("octo", "widgets"));
        assert_eq!(uri.path, "src/lib.rs");

        let root = parse_target("octo/widgets").unwrap();
        assert!(root.is_root());
    }

    #[test]
    fn test_parse_target_uri() {
        let uri = parse_target("forgefs://octo/widgets/a.txt").unwrap();
        assert_eq!(uri.path, "a.txt");
        assert!(parse_target("http://octo/widgets").is_err());
        assert!(parse_target("justowner").is_err());
    }
}
