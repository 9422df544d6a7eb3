//! Session persistence: the opened-repository set and list preferences.

mod store;
mod types;

pub use store::{FsSessionStore, MemorySessionStore, SessionError, SessionStore};
pub use types::{SessionState, SortDirection, SortKey, SortState};
