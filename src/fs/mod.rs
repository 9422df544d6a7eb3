//! Virtual filesystem layer: path addressing, the provider, and change
//! notifications.

pub mod events;
pub mod provider;
pub mod uri;

pub use events::{ChangeKind, FileChangeEvent, WatchHandle};
pub use provider::{
    CommitMessages, FileStat, FsError, FsProvider, RenameOptions, WriteOptions,
};
pub use uri::{normalize_path, RepoUri, UriError, URI_SCHEME};
