//! projvault core library.
//!
//! This crate provides the foundational components for versioned, branchable
//! project state: the file-tree model, the project aggregate with its version
//! store and branch/tag index, the three-way merge engine, configuration, and
//! SQLite persistence.

pub mod config;
pub mod db;
pub mod errors;
pub mod merge;
pub mod models;
pub mod project;
pub mod tree;

// Re-exports for convenience.
pub use config::AppConfig;
pub use db::Database;
pub use merge::{MergeApplier, MergeEngine, MergeOptions, MergeResult};
pub use models::{ProjectState, Version};
pub use project::{Project, ProjectSettings};
pub use tree::TreeNode;
