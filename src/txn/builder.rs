//! Write pipeline: turns pending mutations into remote write transactions.
//!
//! Two strategies with different conflict and atomicity guarantees:
//!
//! - **Single-file fast path** ([`WritePipeline::submit_single`]): one
//!   create/update goes through create-or-update-content directly. The
//!   descriptor's last-known SHA is the remote precondition; a mismatch is a
//!   conflict, never a merge.
//! - **Batch path** ([`WritePipeline::submit_batch`]): multi-file deletes and
//!   renames run the tree → commit → ref-update pipeline. Any step failing
//!   aborts the transaction with no ref update and no cache mutation.

use std::sync::Arc;

use thiserror::Error;

use crate::client::{ClientError, NewTreeEntry, TreeClient};
use crate::store::{ContentDescriptor, MutationOutcome, RepoId, Store, StoreError};

use super::mutation::{BatchBase, PendingMutation};

// =============================================================================
// Error Types
// =============================================================================

/// Error type for write transactions.
#[derive(Debug, Error)]
pub enum TxnError {
    /// The remote rejected the write for a stale SHA precondition or a
    /// non-fast-forward ref update. The caller must re-read and re-apply;
    /// the cache is left matching the pre-transaction state.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// The mutation kind is not supported by the chosen write path. Batch
    /// transactions carry only deletes and renames: the remote contract has
    /// no create-blob operation, so batch content writes cannot be expressed.
    #[error("mutation not supported by this write path")]
    Unsupported,

    /// A batch transaction was submitted with no mutations.
    #[error("empty transaction")]
    Empty,

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Remote client error.
    #[error("remote error: {0}")]
    Client(ClientError),
}

impl From<ClientError> for TxnError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Conflict(message) => TxnError::Conflict(message),
            other => TxnError::Client(other),
        }
    }
}

/// Result type for write transactions.
pub type Result<T> = std::result::Result<T, TxnError>;

// =============================================================================
// WritePipeline
// =============================================================================

/// Builds and submits write transactions, updating the store on success.
pub struct WritePipeline {
    client: Arc<dyn TreeClient>,
    store: Arc<Store>,
}

impl WritePipeline {
    /// Create a new pipeline over the given client and store.
    pub fn new(client: Arc<dyn TreeClient>, store: Arc<Store>) -> Self {
        Self { client, store }
    }

    /// Single-file fast path: submit one create or update directly against
    /// the default branch and apply the result to the store.
    ///
    /// Runs without the repository write gate; the remote SHA precondition is
    /// the only fencing this path needs.
    pub async fn submit_single(
        &self,
        id: &RepoId,
        mutation: PendingMutation,
        message: &str,
    ) -> Result<MutationOutcome> {
        let handle = self.store.handle(id)?;
        let (path, bytes, prior_sha) = match mutation {
            PendingMutation::Create { path, bytes } => (path, bytes, None),
            PendingMutation::Update { path, bytes, base_sha } => (path, bytes, Some(base_sha)),
            _ => return Err(TxnError::Unsupported),
        };

        let written = self
            .client
            .write_content(
                &id.owner,
                &id.name,
                &path,
                &bytes,
                message,
                prior_sha.as_deref(),
                &handle.default_branch,
            )
            .await?;
        tracing::debug!(repo = %id, path = %path, sha = %written.sha, "single-file write landed");

        let outcome = MutationOutcome::Written {
            path,
            sha: written.sha,
            size: bytes.len() as u64,
            payload: bytes,
            tree_sha: written.commit.tree_sha,
            commit_sha: written.commit.sha,
        };
        self.store.apply_mutation(id, &outcome)?;
        Ok(outcome)
    }

    /// Batch path: submit deletes and renames as one tree → commit →
    /// ref-update transaction and apply the result to the store.
    ///
    /// Holds the repository write gate from base capture through the ref
    /// update, so a concurrent refresh can never replace the snapshot the
    /// transaction's base tree SHA was read from. All-or-nothing: a failure
    /// at any step leaves the cache untouched.
    pub async fn submit_batch(
        &self,
        id: &RepoId,
        mutations: Vec<PendingMutation>,
        base: BatchBase,
        message: &str,
    ) -> Result<MutationOutcome> {
        if mutations.is_empty() {
            return Err(TxnError::Empty);
        }
        let handle = self.store.handle(id)?;
        let gate = self.store.write_gate(id)?;
        let _guard = gate.lock().await;

        // Base captured under the gate; valid for the whole transaction.
        let snapshot = self.store.snapshot(id)?;

        let mut removed: Vec<String> = Vec::new();
        let mut added: Vec<ContentDescriptor> = Vec::new();
        for mutation in &mutations {
            match mutation {
                PendingMutation::Delete { path, .. } => {
                    removed.push(path.clone());
                }
                PendingMutation::Rename { old_path, new_path, .. } => {
                    let mut descriptor = snapshot
                        .get(old_path)
                        .cloned()
                        .ok_or_else(|| StoreError::NotFound(old_path.clone()))?;
                    descriptor.path = new_path.clone();
                    removed.push(old_path.clone());
                    added.push(descriptor);
                }
                _ => return Err(TxnError::Unsupported),
            }
        }

        let (base_tree, entries) = match base {
            BatchBase::Incremental => {
                let mut entries: Vec<NewTreeEntry> = Vec::new();
                for path in &removed {
                    let mode = snapshot.get(path).map(|d| d.mode).unwrap_or_default();
                    entries.push(NewTreeEntry::deletion(path.clone(), mode));
                }
                for descriptor in &added {
                    entries.push(NewTreeEntry::blob(
                        descriptor.path.clone(),
                        descriptor.mode,
                        descriptor.sha.clone(),
                    ));
                }
                (Some(snapshot.tree_sha.clone()), entries)
            }
            BatchBase::Rebuild => {
                let entries = snapshot
                    .descriptors()
                    .filter(|d| !removed.contains(&d.path))
                    .chain(added.iter())
                    .map(|d| NewTreeEntry::blob(d.path.clone(), d.mode, d.sha.clone()))
                    .collect();
                (None, entries)
            }
        };

        let tree_sha = self
            .client
            .create_tree(&id.owner, &id.name, base_tree.as_deref(), &entries)
            .await?;
        let commit = self
            .client
            .create_commit(
                &id.owner,
                &id.name,
                message,
                &tree_sha,
                &[snapshot.head_commit_sha.clone()],
            )
            .await?;
        self.client
            .update_ref(
                &id.owner,
                &id.name,
                &format!("heads/{}", handle.default_branch),
                &commit.sha,
            )
            .await?;
        tracing::debug!(repo = %id, commit = %commit.sha, removed = removed.len(), added = added.len(), "batch transaction landed");

        let outcome = MutationOutcome::Batch {
            removed,
            added,
            tree_sha,
            commit_sha: commit.sha,
        };
        self.store.apply_mutation(id, &outcome)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MemoryTreeClient, RecordedCall};
    use crate::store::NodeKind;
    use bytes::Bytes;

    async fn pipeline() -> (Arc<MemoryTreeClient>, Arc<Store>, WritePipeline, RepoId) {
        let client = Arc::new(MemoryTreeClient::new());
        client.add_repository(
            "octo",
            "widgets",
            "main",
            &[
                ("a.txt", b"aaa".as_ref()),
                ("b.txt", b"bbb".as_ref()),
                ("docs/guide.md", b"guide".as_ref()),
            ],
        );
        let store = Arc::new(Store::new(Arc::clone(&client) as Arc<dyn TreeClient>));
        let id = RepoId::new("octo", "widgets");
        store.open_repository(&id).await.unwrap();
        client.clear_calls();
        let pipeline = WritePipeline::new(Arc::clone(&client) as Arc<dyn TreeClient>, Arc::clone(&store));
        (client, store, pipeline, id)
    }

    #[tokio::test]
    async fn test_single_create_then_cached_read() {
        let (client, store, pipeline, id) = pipeline().await;
        let mutation = PendingMutation::Create {
            path: "docs/readme.md".to_string(),
            bytes: Bytes::from_static(b"hello"),
        };
        pipeline.submit_single(&id, mutation, "Create docs/readme.md").await.unwrap();

        // Call shape: create path with no prior SHA.
        assert_eq!(
            client.calls(),
            vec![RecordedCall::WriteContent {
                path: "docs/readme.md".to_string(),
                prior_sha: None,
            }]
        );

        // Cache: descriptor carries the response SHA and the payload.
        let descriptor = store.resolve(&id, "docs/readme.md").unwrap();
        assert_eq!(descriptor.payload.as_deref(), Some(b"hello".as_ref()));
        let remote_head = client.head_commit("octo", "widgets").unwrap();
        assert_eq!(store.snapshot(&id).unwrap().tree_sha, remote_head.tree_sha);
    }

    #[tokio::test]
    async fn test_single_update_sends_prior_sha() {
        let (client, store, pipeline, id) = pipeline().await;
        let base_sha = store.resolve(&id, "a.txt").unwrap().sha;
        let mutation = PendingMutation::Update {
            path: "a.txt".to_string(),
            bytes: Bytes::from_static(b"updated"),
            base_sha: base_sha.clone(),
        };
        pipeline.submit_single(&id, mutation, "Update a.txt").await.unwrap();

        assert_eq!(
            client.calls(),
            vec![RecordedCall::WriteContent {
                path: "a.txt".to_string(),
                prior_sha: Some(base_sha),
            }]
        );
        assert_eq!(client.file_bytes("octo", "widgets", "a.txt").unwrap(), b"updated");
    }

    #[tokio::test]
    async fn test_stale_update_conflicts_and_cache_unchanged() {
        let (_, store, pipeline, id) = pipeline().await;
        let before = store.snapshot(&id).unwrap();

        let mutation = PendingMutation::Update {
            path: "a.txt".to_string(),
            bytes: Bytes::from_static(b"clobber"),
            base_sha: "stale-sha".to_string(),
        };
        let result = pipeline.submit_single(&id, mutation, "Update a.txt").await;
        assert!(matches!(result, Err(TxnError::Conflict(_))));

        let after = store.snapshot(&id).unwrap();
        assert_eq!(before.tree_sha, after.tree_sha);
        assert_eq!(before.get("a.txt").unwrap().sha, after.get("a.txt").unwrap().sha);
    }

    #[tokio::test]
    async fn test_batch_delete_call_shapes_and_cache() {
        let (client, store, pipeline, id) = pipeline().await;
        let snapshot = store.snapshot(&id).unwrap();
        let prior_head = snapshot.head_commit_sha.clone();
        let prior_tree = snapshot.tree_sha.clone();
        let mutations = vec![
            PendingMutation::Delete {
                path: "a.txt".to_string(),
                base_sha: snapshot.get("a.txt").unwrap().sha.clone(),
            },
            PendingMutation::Delete {
                path: "b.txt".to_string(),
                base_sha: snapshot.get("b.txt").unwrap().sha.clone(),
            },
        ];
        pipeline
            .submit_batch(&id, mutations, BatchBase::Incremental, "Delete 2 files")
            .await
            .unwrap();

        // One create-tree with two null-SHA entries against the cached base,
        // one commit with the prior head as sole parent, one ref update.
        let calls = client.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[0],
            RecordedCall::CreateTree {
                base_tree: Some(prior_tree),
                entries: vec![
                    ("a.txt".to_string(), None),
                    ("b.txt".to_string(), None),
                ],
            }
        );
        let RecordedCall::CreateCommit { parents, .. } = &calls[1] else {
            panic!("expected create-commit, got {:?}", calls[1]);
        };
        assert_eq!(parents, &[prior_head]);
        let remote_head = client.head_commit("octo", "widgets").unwrap();
        assert_eq!(
            calls[2],
            RecordedCall::UpdateRef {
                ref_name: "heads/main".to_string(),
                commit_sha: remote_head.sha.clone(),
            }
        );

        // Cache: both descriptors removed, tree SHA advanced to the new
        // commit's tree.
        assert!(matches!(store.resolve(&id, "a.txt"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.resolve(&id, "b.txt"), Err(StoreError::NotFound(_))));
        assert_eq!(store.snapshot(&id).unwrap().tree_sha, remote_head.tree_sha);
    }

    #[tokio::test]
    async fn test_rename_is_atomic() {
        let (client, store, pipeline, id) = pipeline().await;
        let base_sha = store.resolve(&id, "a.txt").unwrap().sha;
        let mutations = vec![PendingMutation::Rename {
            old_path: "a.txt".to_string(),
            new_path: "renamed.txt".to_string(),
            base_sha,
        }];
        pipeline
            .submit_batch(&id, mutations, BatchBase::Incremental, "Rename a.txt")
            .await
            .unwrap();

        assert!(matches!(store.resolve(&id, "a.txt"), Err(StoreError::NotFound(_))));
        assert_eq!(store.resolve(&id, "renamed.txt").unwrap().kind, NodeKind::File);
        assert_eq!(client.file_bytes("octo", "widgets", "renamed.txt").unwrap(), b"aaa");
        assert!(client.file_bytes("octo", "widgets", "a.txt").is_none());
    }

    #[tokio::test]
    async fn test_batch_rejects_content_writes() {
        let (_, _, pipeline, id) = pipeline().await;
        let mutations = vec![PendingMutation::Create {
            path: "x.txt".to_string(),
            bytes: Bytes::from_static(b"x"),
        }];
        let result = pipeline
            .submit_batch(&id, mutations, BatchBase::Incremental, "nope")
            .await;
        assert!(matches!(result, Err(TxnError::Unsupported)));
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let (_, _, pipeline, id) = pipeline().await;
        let result = pipeline
            .submit_batch(&id, Vec::new(), BatchBase::Incremental, "empty")
            .await;
        assert!(matches!(result, Err(TxnError::Empty)));
    }

    #[tokio::test]
    async fn test_batch_on_stale_base_surfaces_conflict() {
        let (client, store, pipeline, id) = pipeline().await;
        let base_sha = store.resolve(&id, "a.txt").unwrap().sha;

        // A remote writer advances the branch after our snapshot was taken.
        client.commit_external("octo", "widgets", "c.txt", b"ccc");

        let mutations = vec![PendingMutation::Delete {
            path: "a.txt".to_string(),
            base_sha,
        }];
        let result = pipeline
            .submit_batch(&id, mutations, BatchBase::Incremental, "Delete a.txt")
            .await;
        assert!(matches!(result, Err(TxnError::Conflict(_))));

        // No partial application: the cache still holds the old snapshot.
        assert!(store.resolve(&id, "a.txt").is_ok());
    }
}
