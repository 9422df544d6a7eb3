//! Write-transaction protocol against the remote tree API.
//!
//! Pending path mutations become either a direct single-file content write or
//! a blob/tree/commit/ref-update batch, with correct base-tree selection and
//! all-or-nothing semantics for multi-file deletes and renames.

mod builder;
mod mutation;

pub use builder::{Result, TxnError, WritePipeline};
pub use mutation::{BatchBase, PendingMutation};
