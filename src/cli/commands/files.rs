//! File and directory commands.

use bytes::Bytes;
use clap::Args;
use tokio::io::AsyncWriteExt;

use crate::app::App;
use crate::cli::{parse_target, CliError, InputSource, Result};
use crate::fs::{RenameOptions, WriteOptions};
use crate::store::NodeKind;

// =============================================================================
// Ls
// =============================================================================

/// Arguments for the ls command.
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Target directory (owner/repo[/path]).
    pub target: String,
}

impl LsArgs {
    pub async fn run(self, app: &App) -> Result<()> {
        let uri = parse_target(&self.target)?;
        for (name, kind) in app.provider().read_directory(&uri)? {
            match kind {
                NodeKind::Directory => println!("{}/", name),
                NodeKind::File => println!("{}", name),
            }
        }
        Ok(())
    }
}

// =============================================================================
// Cat
// =============================================================================

/// Arguments for the cat command.
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Target file (owner/repo/path).
    pub target: String,
}

impl CatArgs {
    pub async fn run(self, app: &App) -> Result<()> {
        let uri = parse_target(&self.target)?;
        let bytes = app.provider().read_file(&uri).await?;
        let mut stdout = tokio::io::stdout();
        stdout.write_all(&bytes).await?;
        stdout.flush().await?;
        Ok(())
    }
}

// =============================================================================
// Put
// =============================================================================

/// Arguments for the put command.
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Target file (owner/repo/path).
    pub target: String,

    #[command(flatten)]
    pub input: InputSource,

    /// Fail if the file does not already exist.
    #[arg(long = "no-create")]
    pub no_create: bool,

    /// Fail if the file already exists.
    #[arg(long = "no-overwrite")]
    pub no_overwrite: bool,
}

impl PutArgs {
    pub async fn run(self, app: &App) -> Result<()> {
        let uri = parse_target(&self.target)?;
        let contents = self.input.read_bytes().await?;
        let options = WriteOptions {
            create: !self.no_create,
            overwrite: !self.no_overwrite,
        };
        app.provider()
            .write_file(&uri, Bytes::from(contents), options)
            .await?;
        println!("wrote {}", uri);
        Ok(())
    }
}

// =============================================================================
// Rm
// =============================================================================

/// Arguments for the rm command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Targets to delete (owner/repo/path). All must be in one repository.
    #[arg(required = true)]
    pub targets: Vec<String>,

    /// Confirm the deletion. Required; each delete is a commit.
    #[arg(long)]
    pub force: bool,
}

impl RmArgs {
    pub async fn run(self, app: &App) -> Result<()> {
        if !self.force {
            return Err(CliError::Other(
                "rm creates a commit on the default branch; pass --force to confirm".to_string(),
            ));
        }
        let uris = self
            .targets
            .iter()
            .map(|t| parse_target(t))
            .collect::<Result<Vec<_>>>()?;
        app.provider().delete(&uris).await?;
        for uri in &uris {
            println!("deleted {}", uri);
        }
        Ok(())
    }
}

// =============================================================================
// Mv
// =============================================================================

/// Arguments for the mv command.
#[derive(Args, Debug)]
pub struct MvArgs {
    /// Source (owner/repo/path).
    pub from: String,

    /// Destination (owner/repo/path), in the same repository.
    pub to: String,

    /// Replace the destination if it exists.
    #[arg(long)]
    pub overwrite: bool,
}

impl MvArgs {
    pub async fn run(self, app: &App) -> Result<()> {
        let from = parse_target(&self.from)?;
        let to = parse_target(&self.to)?;
        app.provider()
            .rename(&from, &to, RenameOptions { overwrite: self.overwrite })
            .await?;
        println!("renamed {} -> {}", from, to);
        Ok(())
    }
}

// =============================================================================
// Mkdir
// =============================================================================

/// Arguments for the mkdir command.
#[derive(Args, Debug)]
pub struct MkdirArgs {
    /// Target directory (owner/repo/path).
    pub target: String,
}

impl MkdirArgs {
    pub async fn run(self, app: &App) -> Result<()> {
        let uri = parse_target(&self.target)?;
        app.provider().create_directory(&uri)?;
        // Directories materialize remotely only once a file is written under
        // them.
        println!("created {}", uri);
        Ok(())
    }
}

// =============================================================================
// Stat
// =============================================================================

/// Arguments for the stat command.
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Target (owner/repo[/path]).
    pub target: String,
}

impl StatArgs {
    pub async fn run(self, app: &App) -> Result<()> {
        let uri = parse_target(&self.target)?;
        let stat = app.provider().stat(&uri)?;
        let kind = match stat.kind {
            NodeKind::File => "file",
            NodeKind::Directory => "directory",
        };
        println!("{}", uri);
        println!("  kind: {}", kind);
        println!("  size: {}", stat.size);
        if let Some(modified) = stat.modified {
            println!("  modified: {}", modified.to_rfc3339());
        }
        Ok(())
    }
}
