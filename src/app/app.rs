//! Top-level application component.
//!
//! The [`App`] owns all global services: configuration, the remote client,
//! the repository store, the filesystem provider, and the persisted session.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::client::{ClientError, HttpTreeClient, TreeClient};
use crate::config::{read_config, Config, ConfigSource};
use crate::fs::{CommitMessages, FsProvider};
use crate::session::{
    FsSessionStore, SessionError, SessionState, SessionStore, SortDirection, SortKey, SortState,
};
use crate::store::{ParseRepoIdError, RepoHandle, RepoId, Store, StoreError};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during App operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid repository specification.
    #[error(transparent)]
    BadRepoSpec(#[from] ParseRepoIdError),

    /// Repository store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Remote client error.
    #[error("remote error: {0}")]
    Client(#[from] ClientError),

    /// Session persistence error.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Result type for App operations.
pub type Result<T> = std::result::Result<T, AppError>;

// =============================================================================
// Context Types
// =============================================================================

/// Context for creating an App.
#[derive(Default)]
pub struct AppContext {
    /// Source for configuration files.
    pub config_source: ConfigSource,
    /// Session file path; `~/.forgefs-session.json` when unset.
    pub session_file: Option<PathBuf>,
    /// Remote client override, for tests.
    pub client: Option<Arc<dyn TreeClient>>,
}

impl AppContext {
    /// Set the configuration source.
    pub fn with_config_source(mut self, source: ConfigSource) -> Self {
        self.config_source = source;
        self
    }

    /// Set the session file path.
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    /// Inject a remote client instead of building one from config.
    pub fn with_client(mut self, client: Arc<dyn TreeClient>) -> Self {
        self.client = Some(client);
        self
    }
}

const DEFAULT_SESSION_FILENAME: &str = ".forgefs-session.json";

fn default_session_file() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(DEFAULT_SESSION_FILENAME),
        None => PathBuf::from(DEFAULT_SESSION_FILENAME),
    }
}

// =============================================================================
// App
// =============================================================================

/// The top-level application component.
pub struct App {
    config: Config,
    store: Arc<Store>,
    provider: FsProvider,
    session_store: Box<dyn SessionStore>,
    session: Mutex<SessionState>,
}

impl App {
    /// Create a new App with the given context. Reads configuration and the
    /// persisted session but does not contact the remote.
    pub fn new(ctx: AppContext) -> Result<Self> {
        let config_result =
            read_config(&ctx.config_source).map_err(|e| AppError::Config(e.to_string()))?;
        for warning in &config_result.warnings {
            tracing::warn!("{}", warning);
        }
        let config = config_result.config;

        let client: Arc<dyn TreeClient> = match ctx.client {
            Some(client) => client,
            None => Arc::new(HttpTreeClient::new(
                config.api.url.clone(),
                config.api.token.clone(),
            )),
        };

        let store = Arc::new(Store::new(Arc::clone(&client)));
        let messages = CommitMessages {
            create: config.commit.create_message.clone(),
            update: config.commit.update_message.clone(),
            delete: config.commit.delete_message.clone(),
            rename: config.commit.rename_message.clone(),
        };
        let provider = FsProvider::new(Arc::clone(&store), client, messages);

        let session_file = ctx.session_file.unwrap_or_else(default_session_file);
        let session_store = Box::new(FsSessionStore::new(session_file));
        let session = Mutex::new(session_store.load()?);

        Ok(Self {
            config,
            store,
            provider,
            session_store,
            session,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the repository store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Get the filesystem provider.
    pub fn provider(&self) -> &FsProvider {
        &self.provider
    }

    /// Re-open every repository in the persisted session.
    ///
    /// A repository that fails to open (deleted remotely, revoked access) is
    /// logged and skipped rather than failing the whole restore; it stays in
    /// the session so a later hydrate can pick it up again.
    pub async fn hydrate(&self) -> Result<()> {
        let repositories = {
            let session = self.session.lock().await;
            session.repositories.clone()
        };
        for full_name in repositories {
            let id: RepoId = match full_name.parse() {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!("skipping malformed session entry '{}': {}", full_name, e);
                    continue;
                }
            };
            if let Err(e) = self.store.open_repository(&id).await {
                tracing::warn!("failed to reopen {}: {}", id, e);
            }
        }
        Ok(())
    }

    /// Open a repository from its `owner/name` spec, track it in the store,
    /// and persist it in the session.
    pub async fn open_repository(&self, spec: &str) -> Result<RepoHandle> {
        let id: RepoId = spec.parse()?;
        let handle = self.store.open_repository(&id).await?;

        let mut session = self.session.lock().await;
        session.add_repository(&id.full_name());
        self.session_store.save(&session)?;
        Ok(handle)
    }

    /// Stop tracking a repository. Cached tree state is dropped; nothing is
    /// touched remotely.
    pub async fn close_repository(&self, spec: &str) -> Result<bool> {
        let id: RepoId = spec.parse()?;
        let removed = self.store.remove_repository(&id);

        let mut session = self.session.lock().await;
        let was_in_session = session.remove_repository(&id.full_name());
        if was_in_session {
            self.session_store.save(&session)?;
        }
        Ok(removed || was_in_session)
    }

    /// All tracked repositories, ordered per the session's sort preference.
    pub async fn list_repositories(&self) -> Vec<RepoHandle> {
        let sort = {
            let session = self.session.lock().await;
            session.sort
        };
        let mut handles = self.store.tracked();
        handles.sort_by(|a, b| {
            let ordering = match sort.key {
                SortKey::Name => a.id.name.cmp(&b.id.name).then(a.id.owner.cmp(&b.id.owner)),
                SortKey::Owner => a.id.owner.cmp(&b.id.owner).then(a.id.name.cmp(&b.id.name)),
            };
            match sort.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
        handles
    }

    /// Change and persist the repository list sort preference.
    pub async fn set_sort(&self, sort: SortState) -> Result<()> {
        let mut session = self.session.lock().await;
        session.sort = sort;
        self.session_store.save(&session)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryTreeClient;

    fn test_app(client: Arc<MemoryTreeClient>, dir: &tempfile::TempDir) -> App {
        let ctx = AppContext::default()
            .with_session_file(dir.path().join("session.json"))
            .with_client(client as Arc<dyn TreeClient>);
        App::new(ctx).unwrap()
    }

    #[tokio::test]
    async fn test_open_persists_session() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryTreeClient::new());
        client.add_repository("octo", "widgets", "main", &[("a.txt", b"a".as_ref())]);

        {
            let app = test_app(Arc::clone(&client), &dir);
            app.open_repository("octo/widgets").await.unwrap();
            assert_eq!(app.list_repositories().await.len(), 1);
        }

        // A fresh App over the same session file restores the repository.
        let app = test_app(client, &dir);
        assert!(app.list_repositories().await.is_empty());
        app.hydrate().await.unwrap();
        let handles = app.list_repositories().await;
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].id, RepoId::new("octo", "widgets"));
    }

    #[tokio::test]
    async fn test_close_removes_from_session() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryTreeClient::new());
        client.add_repository("octo", "widgets", "main", &[("a.txt", b"a".as_ref())]);

        let app = test_app(Arc::clone(&client), &dir);
        app.open_repository("octo/widgets").await.unwrap();
        assert!(app.close_repository("octo/widgets").await.unwrap());
        assert!(!app.close_repository("octo/widgets").await.unwrap());

        let app = test_app(client, &dir);
        app.hydrate().await.unwrap();
        assert!(app.list_repositories().await.is_empty());
    }

    #[tokio::test]
    async fn test_hydrate_skips_unreachable_repository() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryTreeClient::new());
        client.add_repository("octo", "widgets", "main", &[("a.txt", b"a".as_ref())]);

        let app = test_app(Arc::clone(&client), &dir);
        app.open_repository("octo/widgets").await.unwrap();
        drop(app);

        // The repository disappears remotely between sessions.
        let fresh = Arc::new(MemoryTreeClient::new());
        let app = test_app(fresh, &dir);
        app.hydrate().await.unwrap();
        assert!(app.list_repositories().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_sorting() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryTreeClient::new());
        client.add_repository("zeta", "alpha", "main", &[("a", b"a".as_ref())]);
        client.add_repository("acme", "zulu", "main", &[("a", b"a".as_ref())]);

        let app = test_app(client, &dir);
        app.open_repository("zeta/alpha").await.unwrap();
        app.open_repository("acme/zulu").await.unwrap();

        // Default sort is by name ascending: "alpha" before "zulu".
        let by_name: Vec<_> = app
            .list_repositories()
            .await
            .into_iter()
            .map(|h| h.id.full_name())
            .collect();
        assert_eq!(by_name, vec!["zeta/alpha", "acme/zulu"]);

        app.set_sort(SortState {
            key: SortKey::Owner,
            direction: SortDirection::Descending,
        })
        .await
        .unwrap();
        let by_owner_desc: Vec<_> = app
            .list_repositories()
            .await
            .into_iter()
            .map(|h| h.id.full_name())
            .collect();
        assert_eq!(by_owner_desc, vec!["zeta/alpha", "acme/zulu"]);
    }

    #[tokio::test]
    async fn test_open_rejects_bad_spec() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryTreeClient::new());
        let app = test_app(client, &dir);
        assert!(matches!(
            app.open_repository("not-a-repo").await,
            Err(AppError::BadRepoSpec(_))
        ));
    }
}
