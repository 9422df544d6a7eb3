//! forgefs-rs - mount remote repository-hosting-service repositories as a
//! virtual filesystem.
//!
//! Files are read through a lazily-populated tree cache and written back as
//! commits on each repository's default branch, either through the
//! single-file content endpoint or as atomic tree/commit/ref transactions.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod fs;
pub mod session;
pub mod store;
pub mod txn;

pub use client::{HttpTreeClient, MemoryTreeClient, TreeClient};
pub use fs::{FsProvider, RepoUri};
pub use store::{RepoId, Store};
