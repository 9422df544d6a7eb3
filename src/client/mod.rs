//! Remote tree client: the hosting service's content/tree/commit API.
//!
//! [`TreeClient`] is the black-box contract the rest of the core programs
//! against. [`HttpTreeClient`] talks to the real REST API; [`MemoryTreeClient`]
//! is an in-memory fake for tests that honors the same write preconditions.

mod http_client;
mod memory_client;
mod tree_client;
pub mod types;

pub use http_client::HttpTreeClient;
pub use memory_client::{MemoryTreeClient, RecordedCall};
pub use tree_client::{ClientError, Result, TreeClient};
pub use types::{
    decode_content, encode_content, BranchHead, CommitInfo, ContentInfo, EntryType, FileMode,
    NewTreeEntry, RepoInfo, Sha, TreeEntry, TreeListing, WrittenContent,
};
