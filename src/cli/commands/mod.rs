//! CLI command implementations.

pub mod files;
pub mod repos;
