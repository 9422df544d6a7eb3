//! Filesystem change notifications.

use super::uri::RepoUri;

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The path came into existence.
    Created,
    /// The path's content changed.
    Changed,
    /// The path was removed.
    Deleted,
}

/// One change notification emitted after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChangeEvent {
    /// What happened.
    pub kind: ChangeKind,
    /// The affected path.
    pub uri: RepoUri,
}

impl FileChangeEvent {
    /// Create a new event.
    pub fn new(kind: ChangeKind, uri: RepoUri) -> Self {
        Self { kind, uri }
    }
}

/// Handle returned by `watch`.
///
/// The remote service offers no push notifications, so there is nothing to
/// subscribe to; disposing is a no-op. External change polling, if any, is
/// driven by a timer outside this core.
#[derive(Debug, Default)]
pub struct WatchHandle;

impl WatchHandle {
    /// Release the watch. No-op.
    pub fn dispose(self) {}
}
