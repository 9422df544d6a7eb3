//! Process-wide node cache for tracked repositories.
//!
//! The [`Store`] owns every [`RepoHandle`] and [`TreeSnapshot`] for the
//! process lifetime. The filesystem provider holds no state of its own and
//! always resolves through the store, so overlapping operations observe a
//! single consistent view.
//!
//! Locking follows the cooperative model: the interior `RwLock` is never held
//! across an await; remote fetches complete before the lock is taken. A
//! per-repository write gate (an async mutex) serializes batch-transaction
//! construction against tree refreshes of the same repository.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::client::{ClientError, TreeClient};

use super::types::{
    ContentDescriptor, MutationOutcome, NodeKind, RepoHandle, RepoId, TreeSnapshot,
};

// =============================================================================
// Error Types
// =============================================================================

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The repository is not in the tracked set. Given correct URI routing
    /// this is a programming error, so it fails loudly instead of returning
    /// an empty result.
    #[error("repository not tracked: {0}")]
    UntrackedRepository(RepoId),

    /// The path does not exist in the repository's current snapshot.
    #[error("not found: {0}")]
    NotFound(String),

    /// A remote call failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

// =============================================================================
// Store
// =============================================================================

struct RepoState {
    handle: RepoHandle,
    snapshot: TreeSnapshot,
    write_gate: Arc<Mutex<()>>,
}

/// In-memory mapping from repository identity to its cached tree snapshot.
pub struct Store {
    client: Arc<dyn TreeClient>,
    repos: RwLock<HashMap<RepoId, RepoState>>,
}

impl Store {
    /// Create a new store resolving through the given remote client.
    pub fn new(client: Arc<dyn TreeClient>) -> Self {
        Self {
            client,
            repos: RwLock::new(HashMap::new()),
        }
    }

    /// Open a repository: fetch its metadata, branch head, and recursive
    /// tree, and add it to the tracked set. Re-opening replaces the snapshot
    /// but keeps the repository's write gate.
    pub async fn open_repository(&self, id: &RepoId) -> Result<RepoHandle> {
        let info = self.client.get_repository(&id.owner, &id.name).await?;
        let handle = RepoHandle::from(info);
        let branch = self
            .client
            .get_branch(&id.owner, &id.name, &handle.default_branch)
            .await?;
        let listing = self
            .client
            .get_tree(&id.owner, &id.name, &branch.tree_sha)
            .await?;
        let snapshot = TreeSnapshot::from_listing(branch.commit_sha, listing);
        tracing::info!(repo = %id, tree = %snapshot.tree_sha, files = snapshot.len(), "opened repository");

        let mut repos = self.repos.write().unwrap();
        let write_gate = repos
            .get(id)
            .map(|state| Arc::clone(&state.write_gate))
            .unwrap_or_default();
        repos.insert(
            id.clone(),
            RepoState {
                handle: handle.clone(),
                snapshot,
                write_gate,
            },
        );
        Ok(handle)
    }

    /// Remove a repository from the tracked set. Returns whether it was
    /// tracked.
    pub fn remove_repository(&self, id: &RepoId) -> bool {
        self.repos.write().unwrap().remove(id).is_some()
    }

    /// Whether the repository is tracked.
    pub fn is_tracked(&self, id: &RepoId) -> bool {
        self.repos.read().unwrap().contains_key(id)
    }

    /// Handles of every tracked repository.
    pub fn tracked(&self) -> Vec<RepoHandle> {
        self.repos
            .read()
            .unwrap()
            .values()
            .map(|state| state.handle.clone())
            .collect()
    }

    /// Handle of a tracked repository.
    pub fn handle(&self, id: &RepoId) -> Result<RepoHandle> {
        let repos = self.repos.read().unwrap();
        repos
            .get(id)
            .map(|state| state.handle.clone())
            .ok_or_else(|| StoreError::UntrackedRepository(id.clone()))
    }

    /// The per-repository write gate serializing batch transactions and
    /// refreshes.
    pub fn write_gate(&self, id: &RepoId) -> Result<Arc<Mutex<()>>> {
        let repos = self.repos.read().unwrap();
        repos
            .get(id)
            .map(|state| Arc::clone(&state.write_gate))
            .ok_or_else(|| StoreError::UntrackedRepository(id.clone()))
    }

    /// A copy of the repository's current snapshot.
    pub fn snapshot(&self, id: &RepoId) -> Result<TreeSnapshot> {
        let repos = self.repos.read().unwrap();
        repos
            .get(id)
            .map(|state| state.snapshot.clone())
            .ok_or_else(|| StoreError::UntrackedRepository(id.clone()))
    }

    /// Exact-match lookup of `path` in the repository's snapshot.
    ///
    /// The empty path resolves to the synthetic root directory. A path that
    /// matches no file but prefixes tracked files resolves to a synthetic
    /// directory descriptor.
    pub fn resolve(&self, id: &RepoId, path: &str) -> Result<ContentDescriptor> {
        let repos = self.repos.read().unwrap();
        let state = repos
            .get(id)
            .ok_or_else(|| StoreError::UntrackedRepository(id.clone()))?;
        if path.is_empty() {
            return Ok(ContentDescriptor::directory(""));
        }
        if let Some(descriptor) = state.snapshot.get(path) {
            return Ok(descriptor.clone());
        }
        if state.snapshot.has_directory(path) {
            return Ok(ContentDescriptor::directory(path));
        }
        Err(StoreError::NotFound(path.to_string()))
    }

    /// Enumerate the immediate children of a directory path, inferring
    /// directories lexically from cached paths. Never touches the remote.
    pub fn read_directory(&self, id: &RepoId, path: &str) -> Result<Vec<(String, NodeKind)>> {
        let repos = self.repos.read().unwrap();
        let state = repos
            .get(id)
            .ok_or_else(|| StoreError::UntrackedRepository(id.clone()))?;
        if !path.is_empty() && !state.snapshot.has_directory(path) {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(state.snapshot.children(path))
    }

    /// Re-fetch the branch head and recursive tree, replacing the snapshot
    /// wholesale. Serializes against in-flight batch transactions via the
    /// repository's write gate; cached payloads are carried over for entries
    /// whose SHA did not change.
    pub async fn refresh_tree(&self, id: &RepoId) -> Result<TreeSnapshot> {
        let (handle, gate) = {
            let repos = self.repos.read().unwrap();
            let state = repos
                .get(id)
                .ok_or_else(|| StoreError::UntrackedRepository(id.clone()))?;
            (state.handle.clone(), Arc::clone(&state.write_gate))
        };
        let _guard = gate.lock().await;

        let branch = self
            .client
            .get_branch(&id.owner, &id.name, &handle.default_branch)
            .await?;
        let listing = self
            .client
            .get_tree(&id.owner, &id.name, &branch.tree_sha)
            .await?;
        let mut snapshot = TreeSnapshot::from_listing(branch.commit_sha, listing);

        let mut repos = self.repos.write().unwrap();
        let state = repos
            .get_mut(id)
            .ok_or_else(|| StoreError::UntrackedRepository(id.clone()))?;
        let paths: Vec<String> = snapshot.descriptors().map(|d| d.path.clone()).collect();
        for path in paths {
            if let (Some(old), Some(new)) = (state.snapshot.get(&path), snapshot.get_mut(&path)) {
                if old.sha == new.sha {
                    new.payload = old.payload.clone();
                }
            }
        }
        tracing::debug!(repo = %id, tree = %snapshot.tree_sha, "refreshed tree");
        state.snapshot = snapshot.clone();
        Ok(snapshot)
    }

    /// Apply the result of a successful write transaction: mutate exactly the
    /// affected descriptors and advance the snapshot's tree and head SHAs.
    /// No network round trip.
    pub fn apply_mutation(&self, id: &RepoId, outcome: &MutationOutcome) -> Result<()> {
        let mut repos = self.repos.write().unwrap();
        let state = repos
            .get_mut(id)
            .ok_or_else(|| StoreError::UntrackedRepository(id.clone()))?;
        match outcome {
            MutationOutcome::Written {
                path,
                sha,
                size,
                payload,
                tree_sha,
                commit_sha,
            } => {
                let mode = state
                    .snapshot
                    .get(path)
                    .map(|d| d.mode)
                    .unwrap_or_default();
                let mut descriptor = ContentDescriptor::file(path.clone(), sha.clone(), *size);
                descriptor.mode = mode;
                descriptor.payload = Some(payload.clone());
                descriptor.modified = Some(chrono::Utc::now());
                state.snapshot.insert(descriptor);
                state.snapshot.tree_sha = tree_sha.clone();
                state.snapshot.head_commit_sha = commit_sha.clone();
            }
            MutationOutcome::Batch {
                removed,
                added,
                tree_sha,
                commit_sha,
            } => {
                for path in removed {
                    state.snapshot.remove(path);
                }
                for descriptor in added {
                    let mut descriptor = descriptor.clone();
                    descriptor.modified = Some(chrono::Utc::now());
                    state.snapshot.insert(descriptor);
                }
                state.snapshot.tree_sha = tree_sha.clone();
                state.snapshot.head_commit_sha = commit_sha.clone();
            }
        }
        Ok(())
    }

    /// Record a fetched blob payload on its descriptor.
    pub fn cache_payload(&self, id: &RepoId, path: &str, payload: Bytes) -> Result<()> {
        let mut repos = self.repos.write().unwrap();
        let state = repos
            .get_mut(id)
            .ok_or_else(|| StoreError::UntrackedRepository(id.clone()))?;
        let descriptor = state
            .snapshot
            .get_mut(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        descriptor.size = payload.len() as u64;
        descriptor.payload = Some(payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryTreeClient;

    async fn tracked_store() -> (Arc<MemoryTreeClient>, Store, RepoId) {
        let client = Arc::new(MemoryTreeClient::new());
        client.add_repository(
            "octo",
            "widgets",
            "main",
            &[
                ("README.md", b"hello".as_ref()),
                ("src/a.txt", b"a".as_ref()),
                ("src/b/c.txt", b"c".as_ref()),
            ],
        );
        let store = Store::new(Arc::clone(&client) as Arc<dyn TreeClient>);
        let id = RepoId::new("octo", "widgets");
        store.open_repository(&id).await.unwrap();
        (client, store, id)
    }

    #[tokio::test]
    async fn test_open_tracks_repository() {
        let (_, store, id) = tracked_store().await;
        assert!(store.is_tracked(&id));
        let handle = store.handle(&id).unwrap();
        assert_eq!(handle.default_branch, "main");
        assert_eq!(store.snapshot(&id).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_resolve_file_directory_and_root() {
        let (_, store, id) = tracked_store().await;

        let file = store.resolve(&id, "src/a.txt").unwrap();
        assert_eq!(file.kind, NodeKind::File);

        let dir = store.resolve(&id, "src/b").unwrap();
        assert_eq!(dir.kind, NodeKind::Directory);

        let root = store.resolve(&id, "").unwrap();
        assert_eq!(root.kind, NodeKind::Directory);

        assert!(matches!(
            store.resolve(&id, "missing.txt"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_untracked_repository_fails_loudly() {
        let (_, store, _) = tracked_store().await;
        let other = RepoId::new("octo", "gadgets");
        assert!(matches!(
            store.resolve(&other, "README.md"),
            Err(StoreError::UntrackedRepository(_))
        ));
    }

    #[tokio::test]
    async fn test_read_directory_inference() {
        let (_, store, id) = tracked_store().await;
        let entries = store.read_directory(&id, "src").unwrap();
        assert_eq!(
            entries,
            vec![
                ("a.txt".to_string(), NodeKind::File),
                ("b".to_string(), NodeKind::Directory),
            ]
        );
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent_without_remote_change() {
        let (_, store, id) = tracked_store().await;
        let first = store.refresh_tree(&id).await.unwrap();
        let second = store.refresh_tree(&id).await.unwrap();
        assert_eq!(first.tree_sha, second.tree_sha);
        let first_paths: Vec<_> = first.descriptors().map(|d| d.path.clone()).collect();
        let second_paths: Vec<_> = second.descriptors().map(|d| d.path.clone()).collect();
        assert_eq!(first_paths, second_paths);
    }

    #[tokio::test]
    async fn test_refresh_picks_up_remote_change_and_keeps_payloads() {
        let (client, store, id) = tracked_store().await;
        store
            .cache_payload(&id, "README.md", Bytes::from_static(b"hello"))
            .unwrap();

        client.commit_external("octo", "widgets", "new.txt", b"new");
        let snapshot = store.refresh_tree(&id).await.unwrap();

        assert!(snapshot.get("new.txt").is_some());
        // README.md did not change, so its cached payload survives.
        let readme = snapshot.get("README.md").unwrap();
        assert_eq!(readme.payload.as_deref(), Some(b"hello".as_ref()));
    }

    #[tokio::test]
    async fn test_apply_written_mutation_updates_shas() {
        let (_, store, id) = tracked_store().await;
        let outcome = MutationOutcome::Written {
            path: "README.md".to_string(),
            sha: "new-blob".to_string(),
            size: 3,
            payload: Bytes::from_static(b"xyz"),
            tree_sha: "new-tree".to_string(),
            commit_sha: "new-commit".to_string(),
        };
        store.apply_mutation(&id, &outcome).unwrap();

        let snapshot = store.snapshot(&id).unwrap();
        assert_eq!(snapshot.tree_sha, "new-tree");
        assert_eq!(snapshot.head_commit_sha, "new-commit");
        let readme = snapshot.get("README.md").unwrap();
        assert_eq!(readme.sha, "new-blob");
        assert_eq!(readme.payload.as_deref(), Some(b"xyz".as_ref()));
    }
}
