//! Cached repository and tree types.
//!
//! Directories are synthetic: they exist only as path prefixes of tracked
//! files and are never stored as descriptors in a snapshot.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::{FileMode, RepoInfo, Sha, TreeListing};
use crate::client::types::EntryType;

// =============================================================================
// Repository Identity
// =============================================================================

/// Error parsing a repository identity from its `owner/name` form.
#[derive(Debug, Clone, Error)]
#[error("invalid repository '{0}': expected owner/name")]
pub struct ParseRepoIdError(pub String);

/// Identity of one remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoId {
    /// Owner login.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoId {
    /// Create a new repository identity.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// The `owner/name` form.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = ParseRepoIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(RepoId::new(owner, name))
            }
            _ => Err(ParseRepoIdError(s.to_string())),
        }
    }
}

/// A tracked repository: identity plus the metadata fetched when it was
/// opened. Immutable except for flags the remote reports on re-open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoHandle {
    /// Repository identity.
    pub id: RepoId,
    /// Name of the default branch; the target of every write.
    pub default_branch: String,
    /// Clone URL, if reported.
    pub clone_url: Option<String>,
    /// Browser URL, if reported.
    pub html_url: Option<String>,
    /// Whether the repository is a fork.
    pub fork: bool,
    /// Whether the repository is private.
    pub private: bool,
}

impl From<RepoInfo> for RepoHandle {
    fn from(info: RepoInfo) -> Self {
        Self {
            id: RepoId::new(info.owner, info.name),
            default_branch: info.default_branch,
            clone_url: info.clone_url,
            html_url: info.html_url,
            fork: info.fork,
            private: info.private,
        }
    }
}

// =============================================================================
// Content Descriptors
// =============================================================================

/// Kind of a resolved node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeKind {
    /// A file (remote blob).
    File,
    /// A directory, inferred lexically from file paths.
    Directory,
}

/// One cached tree entry plus its lazily-fetched payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDescriptor {
    /// Slash-separated path relative to the repository root.
    pub path: String,
    /// Node kind.
    pub kind: NodeKind,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Content SHA; the precondition for the next single-file write.
    pub sha: Sha,
    /// File mode from the tree listing.
    pub mode: FileMode,
    /// Remote URL, if reported.
    pub url: Option<String>,
    /// Blob bytes, populated on first read and kept through updates.
    pub payload: Option<Bytes>,
    /// Best-effort modification time: set for entries this process wrote,
    /// absent for entries known only from a tree listing.
    pub modified: Option<DateTime<Utc>>,
}

impl ContentDescriptor {
    /// Descriptor for a file.
    pub fn file(path: impl Into<String>, sha: Sha, size: u64) -> Self {
        Self {
            path: path.into(),
            kind: NodeKind::File,
            size,
            sha,
            mode: FileMode::Regular,
            url: None,
            payload: None,
            modified: None,
        }
    }

    /// Synthetic descriptor for a directory.
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: NodeKind::Directory,
            size: 0,
            sha: Sha::new(),
            mode: FileMode::Directory,
            url: None,
            payload: None,
            modified: None,
        }
    }
}

// =============================================================================
// Mutation Outcomes
// =============================================================================

/// The store-facing result of a successful write transaction, applied
/// incrementally to the cached snapshot without a refetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// A single-file fast-path write landed.
    Written {
        /// Path that was created or updated.
        path: String,
        /// New content SHA.
        sha: Sha,
        /// New size in bytes.
        size: u64,
        /// The written bytes, cached as the descriptor payload.
        payload: Bytes,
        /// Root tree SHA of the commit the remote created.
        tree_sha: Sha,
        /// SHA of the commit the remote created.
        commit_sha: Sha,
    },
    /// A batch tree/commit/ref transaction landed.
    Batch {
        /// Paths whose descriptors are removed.
        removed: Vec<String>,
        /// Descriptors added (renamed-in content).
        added: Vec<ContentDescriptor>,
        /// The new tree SHA.
        tree_sha: Sha,
        /// The new head commit SHA.
        commit_sha: Sha,
    },
}

// =============================================================================
// Tree Snapshots
// =============================================================================

/// The recursive listing of a repository's default-branch tree at a specific
/// commit, keyed by path.
///
/// The tree SHA is the base for the next batch write transaction and must
/// track the tree of every commit this core creates, or subsequent writes are
/// rejected by the remote for using a stale base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeSnapshot {
    /// SHA of the snapshot's tree.
    pub tree_sha: Sha,
    /// SHA of the branch-head commit the tree belongs to; the parent of the
    /// next batch commit.
    pub head_commit_sha: Sha,
    descriptors: BTreeMap<String, ContentDescriptor>,
}

impl TreeSnapshot {
    /// Create an empty snapshot.
    pub fn new(tree_sha: Sha, head_commit_sha: Sha) -> Self {
        Self {
            tree_sha,
            head_commit_sha,
            descriptors: BTreeMap::new(),
        }
    }

    /// Build a snapshot from a recursive tree listing.
    ///
    /// Subtree entries are dropped; directories are inferred lexically.
    pub fn from_listing(head_commit_sha: Sha, listing: TreeListing) -> Self {
        let mut snapshot = Self::new(listing.sha, head_commit_sha);
        for entry in listing.entries {
            if entry.entry_type != EntryType::Blob {
                continue;
            }
            snapshot.insert(ContentDescriptor {
                path: entry.path,
                kind: NodeKind::File,
                size: entry.size.unwrap_or(0),
                sha: entry.sha,
                mode: entry.mode,
                url: entry.url,
                payload: None,
                modified: None,
            });
        }
        snapshot
    }

    /// Exact-match lookup by path.
    pub fn get(&self, path: &str) -> Option<&ContentDescriptor> {
        self.descriptors.get(path)
    }

    /// Mutable exact-match lookup by path.
    pub fn get_mut(&mut self, path: &str) -> Option<&mut ContentDescriptor> {
        self.descriptors.get_mut(path)
    }

    /// Insert or replace a descriptor, keyed by its path.
    pub fn insert(&mut self, descriptor: ContentDescriptor) {
        self.descriptors.insert(descriptor.path.clone(), descriptor);
    }

    /// Remove the descriptor at `path`.
    pub fn remove(&mut self, path: &str) -> Option<ContentDescriptor> {
        self.descriptors.remove(path)
    }

    /// Whether `path` is a directory prefix of any tracked file.
    pub fn has_directory(&self, path: &str) -> bool {
        if path.is_empty() {
            return true;
        }
        let prefix = format!("{}/", path);
        self.descriptors
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(p, _)| p.starts_with(&prefix))
    }

    /// Immediate children of a directory path: file names and lexically
    /// inferred directory names, sorted.
    pub fn children(&self, path: &str) -> Vec<(String, NodeKind)> {
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path)
        };
        let mut out: BTreeMap<String, NodeKind> = BTreeMap::new();
        for key in self.descriptors.range(prefix.clone()..).map(|(k, _)| k) {
            if !key.starts_with(&prefix) {
                break;
            }
            let remainder = &key[prefix.len()..];
            match remainder.split_once('/') {
                Some((dir, _)) => {
                    out.insert(dir.to_string(), NodeKind::Directory);
                }
                None => {
                    out.insert(remainder.to_string(), NodeKind::File);
                }
            }
        }
        out.into_iter().collect()
    }

    /// All file descriptors whose paths lie under the directory `path`.
    pub fn descendants(&self, path: &str) -> Vec<&ContentDescriptor> {
        let prefix = format!("{}/", path);
        self.descriptors
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .map(|(_, d)| d)
            .collect()
    }

    /// Iterate all descriptors in path order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ContentDescriptor> {
        self.descriptors.values()
    }

    /// Number of tracked files.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the snapshot tracks no files.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(paths: &[&str]) -> TreeSnapshot {
        let mut snapshot = TreeSnapshot::new("t0".into(), "c0".into());
        for path in paths {
            snapshot.insert(ContentDescriptor::file(*path, format!("sha-{}", path), 1));
        }
        snapshot
    }

    #[test]
    fn test_repo_id_parse() {
        let id: RepoId = "octo/widgets".parse().unwrap();
        assert_eq!(id, RepoId::new("octo", "widgets"));
        assert_eq!(id.to_string(), "octo/widgets");

        assert!("widgets".parse::<RepoId>().is_err());
        assert!("a/b/c".parse::<RepoId>().is_err());
        assert!("/widgets".parse::<RepoId>().is_err());
    }

    #[test]
    fn test_children_infers_directories() {
        let snapshot = snapshot_with(&["src/a.txt", "src/b/c.txt"]);
        assert_eq!(
            snapshot.children("src"),
            vec![
                ("a.txt".to_string(), NodeKind::File),
                ("b".to_string(), NodeKind::Directory),
            ]
        );
    }

    #[test]
    fn test_children_of_root() {
        let snapshot = snapshot_with(&["README.md", "src/lib.rs"]);
        assert_eq!(
            snapshot.children(""),
            vec![
                ("README.md".to_string(), NodeKind::File),
                ("src".to_string(), NodeKind::Directory),
            ]
        );
    }

    #[test]
    fn test_has_directory_is_prefix_exact() {
        let snapshot = snapshot_with(&["src/a.txt", "srcdir/b.txt"]);
        assert!(snapshot.has_directory("src"));
        assert!(!snapshot.has_directory("sr"));
        assert!(!snapshot.has_directory("src/a.txt"));
        // Root is always a directory.
        assert!(snapshot.has_directory(""));
    }

    #[test]
    fn test_descendants() {
        let snapshot = snapshot_with(&["docs/a.md", "docs/sub/b.md", "other.txt"]);
        let paths: Vec<_> = snapshot.descendants("docs").iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["docs/a.md", "docs/sub/b.md"]);
    }
}
