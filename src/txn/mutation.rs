//! Pending mutations awaiting commit.

use bytes::Bytes;

use crate::client::Sha;

/// One queued path mutation.
///
/// Directories are never represented directly: deleting or renaming a folder
/// expands to one mutation per file whose path lies under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingMutation {
    /// Create a file that has no prior descriptor.
    Create {
        /// Target path.
        path: String,
        /// File bytes.
        bytes: Bytes,
    },
    /// Update an existing file.
    Update {
        /// Target path.
        path: String,
        /// File bytes.
        bytes: Bytes,
        /// The descriptor's last-known SHA, sent as the remote precondition.
        base_sha: Sha,
    },
    /// Delete an existing file.
    Delete {
        /// Target path.
        path: String,
        /// The descriptor's last-known SHA.
        base_sha: Sha,
    },
    /// Move a file's content to a new path in one transaction.
    Rename {
        /// Current path.
        old_path: String,
        /// New path.
        new_path: String,
        /// SHA of the content being carried over.
        base_sha: Sha,
    },
}

impl PendingMutation {
    /// The mutation's primary target path.
    pub fn path(&self) -> &str {
        match self {
            PendingMutation::Create { path, .. } => path,
            PendingMutation::Update { path, .. } => path,
            PendingMutation::Delete { path, .. } => path,
            PendingMutation::Rename { new_path, .. } => new_path,
        }
    }
}

/// Base-tree policy for a batch transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchBase {
    /// Send only the touched entries against the cached tree SHA; deletions
    /// are explicit null-SHA entries.
    Incremental,
    /// Full-repository rebuild: send every surviving entry with no base tree,
    /// so deletion is omission. Used for whole-directory deletes and renames.
    Rebuild,
}
