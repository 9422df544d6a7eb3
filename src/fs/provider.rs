//! Virtual filesystem provider.
//!
//! Implements the stat/read/write/delete/rename/list-directory contract the
//! host editor requires, translating virtual path URIs into (repository,
//! path), resolving through the [`Store`], and driving the write pipeline.
//! The provider holds no tree state of its own.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::client::{decode_content, ClientError, TreeClient};
use crate::store::{NodeKind, Store, StoreError};
use crate::txn::{BatchBase, PendingMutation, TxnError, WritePipeline};

use super::events::{ChangeKind, FileChangeEvent, WatchHandle};
use super::uri::{RepoUri, UriError};

// =============================================================================
// Error Types
// =============================================================================

/// Error type for filesystem provider operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// The path does not exist.
    #[error("file not found: {0}")]
    NotFound(String),

    /// A file already exists at the target path.
    #[error("file exists: {0}")]
    FileExists(String),

    /// The path is a directory where a file was expected.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// The remote rejected the write; the caller must re-read and re-apply.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// A batch operation addressed more than one repository.
    #[error("operation may not span repositories")]
    CrossRepository,

    /// The operation has no remote primitive and is not emulated.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Invalid virtual path.
    #[error(transparent)]
    Uri(#[from] UriError),

    /// Store error.
    #[error(transparent)]
    Store(StoreError),

    /// Transaction error.
    #[error(transparent)]
    Txn(TxnError),

    /// Remote client error.
    #[error("remote error: {0}")]
    Client(ClientError),
}

impl FsError {
    fn from_store(uri: &RepoUri, e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => FsError::NotFound(uri.to_string()),
            other => FsError::Store(other),
        }
    }

    fn from_txn(e: TxnError) -> Self {
        match e {
            TxnError::Conflict(message) => FsError::Conflict(message),
            other => FsError::Txn(other),
        }
    }

    fn from_client(uri: &RepoUri, e: ClientError) -> Self {
        match e {
            ClientError::NotFound => FsError::NotFound(uri.to_string()),
            ClientError::Conflict(message) => FsError::Conflict(message),
            other => FsError::Client(other),
        }
    }
}

/// Result type for filesystem provider operations.
pub type Result<T> = std::result::Result<T, FsError>;

// =============================================================================
// Options and Metadata
// =============================================================================

/// Options for [`FsProvider::write_file`].
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Allow creating the file if it does not exist.
    pub create: bool,
    /// Allow overwriting an existing file.
    pub overwrite: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            create: true,
            overwrite: true,
        }
    }
}

/// Options for [`FsProvider::rename`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameOptions {
    /// Allow replacing an existing file at the target path.
    pub overwrite: bool,
}

/// Best-effort file metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// Node kind.
    pub kind: NodeKind,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Modification time, known only for entries this process wrote.
    pub modified: Option<DateTime<Utc>>,
}

/// Commit message templates; `{path}` is replaced with the affected path.
#[derive(Debug, Clone)]
pub struct CommitMessages {
    /// Message for file creation.
    pub create: String,
    /// Message for file updates.
    pub update: String,
    /// Message for deletions.
    pub delete: String,
    /// Message for renames; `{to}` is replaced with the new path.
    pub rename: String,
}

impl Default for CommitMessages {
    fn default() -> Self {
        Self {
            create: "Create {path}".to_string(),
            update: "Update {path}".to_string(),
            delete: "Delete {path}".to_string(),
            rename: "Rename {path} to {to}".to_string(),
        }
    }
}

fn render(template: &str, path: &str) -> String {
    template.replace("{path}", path)
}

// =============================================================================
// FsProvider
// =============================================================================

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The virtual filesystem provider.
pub struct FsProvider {
    store: Arc<Store>,
    client: Arc<dyn TreeClient>,
    pipeline: WritePipeline,
    events: broadcast::Sender<FileChangeEvent>,
    messages: CommitMessages,
}

impl FsProvider {
    /// Create a new provider over the given store and remote client.
    pub fn new(
        store: Arc<Store>,
        client: Arc<dyn TreeClient>,
        messages: CommitMessages,
    ) -> Self {
        let pipeline = WritePipeline::new(Arc::clone(&client), Arc::clone(&store));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            client,
            pipeline,
            events,
            messages,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<FileChangeEvent> {
        self.events.subscribe()
    }

    /// Watch a path for external changes.
    ///
    /// The remote offers no push notifications; the returned handle is a
    /// no-op disposable.
    pub fn watch(&self, _uri: &RepoUri) -> WatchHandle {
        WatchHandle
    }

    /// File metadata. The repository root always reports as a directory.
    pub fn stat(&self, uri: &RepoUri) -> Result<FileStat> {
        let descriptor = self
            .store
            .resolve(&uri.repo, &uri.path)
            .map_err(|e| FsError::from_store(uri, e))?;
        Ok(FileStat {
            kind: descriptor.kind,
            size: descriptor.size,
            modified: descriptor.modified,
        })
    }

    /// Enumerate a directory from the cached snapshot. Directory existence
    /// and contents are inferred lexically over file paths; no remote call.
    pub fn read_directory(&self, uri: &RepoUri) -> Result<Vec<(String, NodeKind)>> {
        self.store
            .read_directory(&uri.repo, &uri.path)
            .map_err(|e| FsError::from_store(uri, e))
    }

    /// Create a directory.
    ///
    /// Directories are synthetic path prefixes with no remote representation,
    /// so this succeeds unconditionally.
    pub fn create_directory(&self, _uri: &RepoUri) -> Result<()> {
        Ok(())
    }

    /// Read a file's bytes.
    ///
    /// Returns the cached payload when present; otherwise fetches the blob,
    /// decodes it from the transport encoding, and caches it on the
    /// descriptor. The bytes are the exact remote content at the last-known
    /// SHA; no freshness check is made against the current remote head.
    pub async fn read_file(&self, uri: &RepoUri) -> Result<Bytes> {
        let descriptor = self
            .store
            .resolve(&uri.repo, &uri.path)
            .map_err(|e| FsError::from_store(uri, e))?;
        if descriptor.kind == NodeKind::Directory {
            return Err(FsError::NotAFile(uri.to_string()));
        }
        if let Some(payload) = descriptor.payload {
            return Ok(payload);
        }

        let info = self
            .client
            .get_content(&uri.repo.owner, &uri.repo.name, &uri.path)
            .await
            .map_err(|e| FsError::from_client(uri, e))?;
        let encoded = info
            .content
            .ok_or_else(|| FsError::Client(ClientError::Decode("missing content".to_string())))?;
        let bytes = decode_content(&encoded)
            .map_err(|e| FsError::Client(ClientError::Decode(e.to_string())))?;
        let bytes = Bytes::from(bytes);
        self.store
            .cache_payload(&uri.repo, &uri.path, bytes.clone())
            .map_err(|e| FsError::from_store(uri, e))?;
        Ok(bytes)
    }

    /// Write a file through the single-file fast path.
    ///
    /// Chooses create vs. update from the cached descriptor; updates send the
    /// last-known SHA as the remote precondition, so a concurrent remote
    /// change surfaces as [`FsError::Conflict`].
    pub async fn write_file(&self, uri: &RepoUri, bytes: Bytes, options: WriteOptions) -> Result<()> {
        if uri.is_root() {
            return Err(FsError::NotAFile(uri.to_string()));
        }
        let existing = match self.store.resolve(&uri.repo, &uri.path) {
            Ok(descriptor) if descriptor.kind == NodeKind::Directory => {
                return Err(FsError::NotAFile(uri.to_string()))
            }
            Ok(descriptor) => Some(descriptor),
            Err(StoreError::NotFound(_)) => None,
            Err(e) => return Err(FsError::Store(e)),
        };

        let (mutation, message, change) = match existing {
            Some(descriptor) => {
                if !options.overwrite {
                    return Err(FsError::FileExists(uri.to_string()));
                }
                (
                    PendingMutation::Update {
                        path: uri.path.clone(),
                        bytes,
                        base_sha: descriptor.sha,
                    },
                    render(&self.messages.update, &uri.path),
                    ChangeKind::Changed,
                )
            }
            None => {
                if !options.create {
                    return Err(FsError::NotFound(uri.to_string()));
                }
                (
                    PendingMutation::Create {
                        path: uri.path.clone(),
                        bytes,
                    },
                    render(&self.messages.create, &uri.path),
                    ChangeKind::Created,
                )
            }
        };

        self.pipeline
            .submit_single(&uri.repo, mutation, &message)
            .await
            .map_err(FsError::from_txn)?;
        self.emit(change, uri.clone());
        Ok(())
    }

    /// Delete files or directories in one atomic batch transaction.
    ///
    /// Directories expand to every descendant file. All targets must belong
    /// to one repository. A failure at any pipeline step leaves both the
    /// remote branch and the cache untouched. Confirmation is the caller's
    /// concern.
    pub async fn delete(&self, uris: &[RepoUri]) -> Result<()> {
        let Some(first) = uris.first() else {
            return Ok(());
        };
        let repo = &first.repo;
        if uris.iter().any(|u| &u.repo != repo) {
            return Err(FsError::CrossRepository);
        }
        if let Some(root) = uris.iter().find(|u| u.is_root()) {
            return Err(FsError::Unsupported(format!(
                "cannot delete repository root {}",
                root
            )));
        }

        let snapshot = self.store.snapshot(repo).map_err(FsError::Store)?;
        let mut mutations = Vec::new();
        let mut rebuild = false;
        for uri in uris {
            let descriptor = self
                .store
                .resolve(repo, &uri.path)
                .map_err(|e| FsError::from_store(uri, e))?;
            match descriptor.kind {
                NodeKind::File => mutations.push(PendingMutation::Delete {
                    path: descriptor.path,
                    base_sha: descriptor.sha,
                }),
                NodeKind::Directory => {
                    rebuild = true;
                    for d in snapshot.descendants(&uri.path) {
                        mutations.push(PendingMutation::Delete {
                            path: d.path.clone(),
                            base_sha: d.sha.clone(),
                        });
                    }
                }
            }
        }

        let message = if uris.len() == 1 {
            render(&self.messages.delete, &uris[0].path)
        } else {
            format!("Delete {} paths", uris.len())
        };
        let base = if rebuild {
            BatchBase::Rebuild
        } else {
            BatchBase::Incremental
        };
        self.pipeline
            .submit_batch(repo, mutations, base, &message)
            .await
            .map_err(FsError::from_txn)?;
        for uri in uris {
            self.emit(ChangeKind::Deleted, uri.clone());
        }
        Ok(())
    }

    /// Rename a file or directory: delete-old plus create-new in one
    /// transaction, so no intermediate state where both or neither exist is
    /// ever observable.
    pub async fn rename(&self, old: &RepoUri, new: &RepoUri, options: RenameOptions) -> Result<()> {
        if old.repo != new.repo {
            return Err(FsError::CrossRepository);
        }
        if old.is_root() || new.is_root() {
            return Err(FsError::Unsupported(
                "cannot rename a repository root".to_string(),
            ));
        }
        // Checked before any remote traffic.
        if !options.overwrite && self.store.resolve(&new.repo, &new.path).is_ok() {
            return Err(FsError::FileExists(new.to_string()));
        }

        let descriptor = self
            .store
            .resolve(&old.repo, &old.path)
            .map_err(|e| FsError::from_store(old, e))?;
        let (mutations, base) = match descriptor.kind {
            NodeKind::File => (
                vec![PendingMutation::Rename {
                    old_path: old.path.clone(),
                    new_path: new.path.clone(),
                    base_sha: descriptor.sha,
                }],
                BatchBase::Incremental,
            ),
            NodeKind::Directory => {
                let snapshot = self.store.snapshot(&old.repo).map_err(FsError::Store)?;
                let prefix_len = old.path.len();
                let mutations = snapshot
                    .descendants(&old.path)
                    .into_iter()
                    .map(|d| PendingMutation::Rename {
                        old_path: d.path.clone(),
                        new_path: format!("{}{}", new.path, &d.path[prefix_len..]),
                        base_sha: d.sha.clone(),
                    })
                    .collect();
                (mutations, BatchBase::Rebuild)
            }
        };

        let message = render(&self.messages.rename, &old.path).replace("{to}", &new.path);
        self.pipeline
            .submit_batch(&old.repo, mutations, base, &message)
            .await
            .map_err(FsError::from_txn)?;
        self.emit(ChangeKind::Deleted, old.clone());
        self.emit(ChangeKind::Created, new.clone());
        Ok(())
    }

    fn emit(&self, kind: ChangeKind, uri: RepoUri) {
        // Nobody listening is fine.
        let _ = self.events.send(FileChangeEvent::new(kind, uri));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MemoryTreeClient, RecordedCall};
    use crate::store::RepoId;

    async fn provider() -> (Arc<MemoryTreeClient>, Arc<Store>, FsProvider, RepoId) {
        let client = Arc::new(MemoryTreeClient::new());
        client.add_repository(
            "octo",
            "widgets",
            "main",
            &[
                ("README.md", b"hello".as_ref()),
                ("docs/guide.md", b"guide".as_ref()),
                ("docs/api/index.md", b"api".as_ref()),
                ("src/lib.rs", b"pub fn f() {}".as_ref()),
            ],
        );
        let store = Arc::new(Store::new(Arc::clone(&client) as Arc<dyn TreeClient>));
        let id = RepoId::new("octo", "widgets");
        store.open_repository(&id).await.unwrap();
        client.clear_calls();
        let provider = FsProvider::new(
            Arc::clone(&store),
            Arc::clone(&client) as Arc<dyn TreeClient>,
            CommitMessages::default(),
        );
        (client, store, provider, id)
    }

    fn uri(id: &RepoId, path: &str) -> RepoUri {
        RepoUri::new(id.clone(), path)
    }

    #[tokio::test]
    async fn test_create_then_read_roundtrip() {
        let (client, _, provider, id) = provider().await;
        let target = uri(&id, "docs/readme.md");
        provider
            .write_file(&target, Bytes::from_static(b"hello"), WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(
            client.calls(),
            vec![RecordedCall::WriteContent {
                path: "docs/readme.md".to_string(),
                prior_sha: None,
            }]
        );

        // The payload is served from cache without a content fetch.
        client.clear_calls();
        let bytes = provider.read_file(&target).await.unwrap();
        assert_eq!(bytes.as_ref(), b"hello");
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_read_fetches_once_then_caches() {
        let (client, _, provider, id) = provider().await;
        let target = uri(&id, "README.md");

        let first = provider.read_file(&target).await.unwrap();
        assert_eq!(first.as_ref(), b"hello");
        assert_eq!(
            client.calls(),
            vec![RecordedCall::GetContent {
                path: "README.md".to_string()
            }]
        );

        client.clear_calls();
        let second = provider.read_file(&target).await.unwrap();
        assert_eq!(second, first);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_write_respects_create_and_overwrite_flags() {
        let (client, _, provider, id) = provider().await;

        let existing = uri(&id, "README.md");
        let no_overwrite = WriteOptions {
            create: true,
            overwrite: false,
        };
        let result = provider
            .write_file(&existing, Bytes::from_static(b"x"), no_overwrite)
            .await;
        assert!(matches!(result, Err(FsError::FileExists(_))));

        let missing = uri(&id, "missing.txt");
        let no_create = WriteOptions {
            create: false,
            overwrite: true,
        };
        let result = provider
            .write_file(&missing, Bytes::from_static(b"x"), no_create)
            .await;
        assert!(matches!(result, Err(FsError::NotFound(_))));

        // Neither failure touched the remote.
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stat_and_read_directory() {
        let (_, _, provider, id) = provider().await;

        let root = provider.stat(&uri(&id, "")).unwrap();
        assert_eq!(root.kind, NodeKind::Directory);

        let docs = provider.stat(&uri(&id, "docs")).unwrap();
        assert_eq!(docs.kind, NodeKind::Directory);

        let entries = provider.read_directory(&uri(&id, "docs")).unwrap();
        assert_eq!(
            entries,
            vec![
                ("api".to_string(), NodeKind::Directory),
                ("guide.md".to_string(), NodeKind::File),
            ]
        );

        assert!(matches!(
            provider.stat(&uri(&id, "nope.txt")),
            Err(FsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_directory_rebuilds_tree() {
        let (client, store, provider, id) = provider().await;
        provider.delete(&[uri(&id, "docs")]).await.unwrap();

        // Whole-directory delete omits the base tree and lists only the
        // surviving entries.
        let create_tree = client
            .calls()
            .into_iter()
            .find_map(|c| match c {
                RecordedCall::CreateTree { base_tree, entries } => Some((base_tree, entries)),
                _ => None,
            })
            .expect("create-tree call");
        assert_eq!(create_tree.0, None);
        let paths: Vec<_> = create_tree.1.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "src/lib.rs"]);
        assert!(create_tree.1.iter().all(|(_, sha)| sha.is_some()));

        assert!(matches!(
            store.resolve(&id, "docs/guide.md"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.resolve(&id, "docs"),
            Err(StoreError::NotFound(_))
        ));
        assert!(store.resolve(&id, "src/lib.rs").is_ok());
    }

    #[tokio::test]
    async fn test_rename_without_overwrite_checks_target_first() {
        let (client, _, provider, id) = provider().await;
        let result = provider
            .rename(
                &uri(&id, "README.md"),
                &uri(&id, "docs/guide.md"),
                RenameOptions { overwrite: false },
            )
            .await;
        assert!(matches!(result, Err(FsError::FileExists(_))));
        // Failed before contacting the remote.
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rename_directory_moves_descendants() {
        let (client, store, provider, id) = provider().await;
        provider
            .rename(&uri(&id, "docs"), &uri(&id, "manual"), RenameOptions::default())
            .await
            .unwrap();

        assert!(store.resolve(&id, "manual/guide.md").is_ok());
        assert!(store.resolve(&id, "manual/api/index.md").is_ok());
        assert!(matches!(store.resolve(&id, "docs"), Err(StoreError::NotFound(_))));
        assert_eq!(
            client.file_bytes("octo", "widgets", "manual/guide.md").unwrap(),
            b"guide"
        );
    }

    #[tokio::test]
    async fn test_delete_rejects_mixed_repositories() {
        let (client, _, provider, id) = provider().await;
        client.add_repository("octo", "gadgets", "main", &[("x.txt", b"x".as_ref())]);
        let other = RepoId::new("octo", "gadgets");
        let result = provider
            .delete(&[uri(&id, "README.md"), uri(&other, "x.txt")])
            .await;
        assert!(matches!(result, Err(FsError::CrossRepository)));
    }

    #[tokio::test]
    async fn test_create_directory_is_synthetic() {
        let (client, _, provider, id) = provider().await;
        provider.create_directory(&uri(&id, "brand/new/dir")).unwrap();
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_change_events() {
        let (_, _, provider, id) = provider().await;
        let mut events = provider.subscribe();
        let target = uri(&id, "note.txt");
        provider
            .write_file(&target, Bytes::from_static(b"n"), WriteOptions::default())
            .await
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event, FileChangeEvent::new(ChangeKind::Created, target));
    }
}
