//! Remote tree client interface.
//!
//! The hosting service is treated as a black box exposing content, tree,
//! branch, commit, and ref operations. Implementations parse responses into
//! the typed payloads of [`crate::client::types`] at this boundary.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{
    BranchHead, CommitInfo, ContentInfo, NewTreeEntry, RepoInfo, Sha, TreeListing, WrittenContent,
};

// =============================================================================
// Error Types
// =============================================================================

/// Error type for remote tree client operations.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The repository, branch, path, or object was not found.
    #[error("not found")]
    NotFound,

    /// The remote rejected a write because its SHA precondition failed: a
    /// stale content SHA on create-or-update/delete-content, or a
    /// non-fast-forward ref update.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Network or transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be parsed into the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The remote returned an unexpected status code.
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },
}

/// Result type for remote tree client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

// =============================================================================
// TreeClient
// =============================================================================

/// The remote tree API consumed by the filesystem core.
///
/// All operations are asynchronous and suspend the caller until the remote
/// responds; none support mid-flight cancellation. Timeout policy belongs to
/// the transport.
#[async_trait]
pub trait TreeClient: Send + Sync {
    /// Get repository metadata.
    async fn get_repository(&self, owner: &str, repo: &str) -> Result<RepoInfo>;

    /// Get a branch's head commit and root tree SHA.
    async fn get_branch(&self, owner: &str, repo: &str, branch: &str) -> Result<BranchHead>;

    /// Get the recursive listing of a tree.
    async fn get_tree(&self, owner: &str, repo: &str, tree_sha: &str) -> Result<TreeListing>;

    /// Get a file's content and metadata at the default branch head.
    async fn get_content(&self, owner: &str, repo: &str, path: &str) -> Result<ContentInfo>;

    /// Create or update a single file directly on a branch.
    ///
    /// For updates, `prior_sha` must match the file's current remote SHA; a
    /// mismatch fails with [`ClientError::Conflict`]. This is the sole
    /// conflict-detection mechanism on the single-file write path.
    #[allow(clippy::too_many_arguments)]
    async fn write_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content: &[u8],
        message: &str,
        prior_sha: Option<&str>,
        branch: &str,
    ) -> Result<WrittenContent>;

    /// Delete a single file directly on a branch.
    ///
    /// `sha` must match the file's current remote SHA; a mismatch fails with
    /// [`ClientError::Conflict`].
    async fn delete_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        message: &str,
        sha: &str,
        branch: &str,
    ) -> Result<CommitInfo>;

    /// Create a tree from the given entries.
    ///
    /// With `base_tree`, entries are applied as mutations of that tree and a
    /// `None` SHA deletes the path. Without it, the new tree contains exactly
    /// the listed entries.
    async fn create_tree(
        &self,
        owner: &str,
        repo: &str,
        base_tree: Option<&str>,
        entries: &[NewTreeEntry],
    ) -> Result<Sha>;

    /// Create a commit pointing at `tree_sha` with the given parents.
    ///
    /// Does not move any ref.
    async fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        message: &str,
        tree_sha: &str,
        parents: &[Sha],
    ) -> Result<CommitInfo>;

    /// Fast-forward a ref (e.g. `heads/main`) to `commit_sha`.
    ///
    /// A non-fast-forward update fails with [`ClientError::Conflict`].
    async fn update_ref(
        &self,
        owner: &str,
        repo: &str,
        ref_name: &str,
        commit_sha: &str,
    ) -> Result<()>;
}
