//! Node cache: tracked repositories and their tree snapshots.
//!
//! The store is the single source of truth the filesystem provider resolves
//! through. It maps each tracked repository to the cached recursive listing
//! of its default-branch tree and applies write results incrementally.

#[allow(clippy::module_inception)]
mod store;
mod types;

pub use store::{Result, Store, StoreError};
pub use types::{
    ContentDescriptor, MutationOutcome, NodeKind, ParseRepoIdError, RepoHandle, RepoId,
    TreeSnapshot,
};
