//! Error types for the projvault core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! Structural mismatches found while merging are *not* errors: they surface as
//! conflicts in the merge result. Likewise a missing common ancestor only
//! degrades the merge to a two-way comparison.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// Tree errors
// ---------------------------------------------------------------------------

/// Violations of the file-tree invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// A node has an empty name.
    #[error("tree node name must not be empty (under '{parent}')")]
    EmptyName { parent: String },

    /// Two siblings share a name.
    #[error("duplicate entry '{name}' in directory '{parent}'")]
    DuplicateName { parent: String, name: String },

    /// A file node carries children.
    #[error("file '{path}' cannot have children")]
    FileWithChildren { path: String },

    /// A directory node carries content.
    #[error("directory '{path}' cannot have content")]
    DirectoryWithContent { path: String },

    /// A node name contains a path separator.
    #[error("tree node name '{name}' under '{parent}' must not contain '/'")]
    InvalidName { parent: String, name: String },
}

// ---------------------------------------------------------------------------
// Merge errors
// ---------------------------------------------------------------------------

/// Errors raised while applying resolutions to a merge result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    /// One or more conflicts have no chosen resolution.
    #[error("unresolved conflicts: {}", paths.join(", "))]
    UnresolvedConflicts { paths: Vec<String> },

    /// A custom resolution value does not fit the conflict's path.
    #[error("invalid resolution for '{path}': {detail}")]
    InvalidResolution { path: String, detail: String },

    /// A resolution was supplied for a path that is not in conflict.
    #[error("no conflict at path '{0}'")]
    UnknownPath(String),

    /// A textual path could not be parsed.
    #[error("invalid merge path '{0}'")]
    InvalidPath(String),
}

// ---------------------------------------------------------------------------
// Project errors
// ---------------------------------------------------------------------------

/// Invariant violations on the project aggregate.
///
/// Every operation checks its preconditions before touching any state, so
/// returning one of these means the project is unchanged.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// The referenced version does not exist.
    #[error("version not found: {0}")]
    VersionNotFound(String),

    /// The referenced branch does not exist.
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// The referenced tag does not exist.
    #[error("tag not found: {0}")]
    TagNotFound(String),

    /// The default branch cannot be deleted.
    #[error("branch '{0}' is the default branch and cannot be deleted")]
    DefaultBranchProtected(String),

    /// The active branch cannot be deleted.
    #[error("branch '{0}' is currently active; switch away before deleting it")]
    ActiveBranch(String),

    /// The checked-out version cannot be deleted.
    #[error("version {0} is the current version and cannot be deleted")]
    CurrentVersion(String),

    /// A branch head cannot be deleted.
    #[error("version {version} is the head of branch '{branch}'")]
    BranchHead { version: String, branch: String },

    /// A tagged version cannot be deleted.
    #[error("version {version} is referenced by tag '{tag}'")]
    VersionTagged { version: String, tag: String },

    /// Branch names are unique within a project.
    #[error("a branch named '{0}' already exists")]
    DuplicateBranchName(String),

    /// Tag names are unique within a project.
    #[error("a tag named '{0}' already exists")]
    DuplicateTagName(String),

    /// Protected tags are immutable.
    #[error("tag '{0}' is protected")]
    ProtectedTag(String),

    /// Names must not be blank.
    #[error("{entity} name must not be empty")]
    EmptyName { entity: String },

    /// In-place merge would rewrite another branch's head.
    #[error("cannot overwrite version {version} in place: it is the head of branch '{branch}'")]
    InPlaceForbidden { version: String, branch: String },

    /// The merge was analysed against a version that is no longer current.
    #[error("merge was prepared against version {prepared} but the current version is {current}")]
    StaleMerge { prepared: String, current: String },

    /// The supplied state carries an invalid file tree.
    #[error("invalid project state: {0}")]
    Tree(#[from] TreeError),

    /// Applying a merge failed.
    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Database errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite persistence layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed { version: u32, detail: String },

    /// A record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A stored project document could not be encoded or decoded.
    #[error("project document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic I/O error (e.g. file permissions).
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
