//! Typed addressing for merge changes and conflicts.
//!
//! A [`MergePath`] names one independently mergeable item of a
//! [`ProjectState`](crate::models::ProjectState). Its textual form
//! (`name`, `languages/go`, `fileTree/app/src/main.rs`) is only used at the
//! edges: display, the CLI and JSON maps keyed by path.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::MergeError;
use crate::models::ScalarField;
use crate::tree::TreeNode;

const LANGUAGES_PREFIX: &str = "languages";
const TREE_PREFIX: &str = "fileTree";

/// Location of a mergeable item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MergePath {
    /// A scalar text field.
    Field(ScalarField),
    /// Membership of one language in the language set.
    LanguageEntry(String),
    /// A node in the file tree; the first segment is the root.
    TreeEntry(Vec<String>),
}

impl MergePath {
    pub fn tree(segments: &[String]) -> Self {
        Self::TreeEntry(segments.to_vec())
    }
}

impl std::fmt::Display for MergePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(field) => write!(f, "{}", field),
            Self::LanguageEntry(lang) => write!(f, "{}/{}", LANGUAGES_PREFIX, lang),
            Self::TreeEntry(segments) => write!(f, "{}/{}", TREE_PREFIX, segments.join("/")),
        }
    }
}

impl FromStr for MergePath {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MergeError::InvalidPath(s.to_string());

        if let Some(lang) = s.strip_prefix(LANGUAGES_PREFIX).and_then(|r| r.strip_prefix('/')) {
            if lang.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::LanguageEntry(lang.to_string()));
        }

        if let Some(rest) = s.strip_prefix(TREE_PREFIX).and_then(|r| r.strip_prefix('/')) {
            let segments: Vec<String> = rest.split('/').map(str::to_string).collect();
            if segments.iter().any(String::is_empty) {
                return Err(invalid());
            }
            return Ok(Self::TreeEntry(segments));
        }

        s.parse::<ScalarField>().map(Self::Field).map_err(|_| invalid())
    }
}

impl Serialize for MergePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MergePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A value at a [`MergePath`]. Absence (a removed language, a deleted node)
/// is expressed as `Option::None` around this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MergeValue {
    /// Scalar field text, or a language name for language entries.
    Text(String),
    /// A file-tree node (and its subtree).
    Node(TreeNode),
}

impl MergeValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&TreeNode> {
        match self {
            Self::Node(node) => Some(node),
            Self::Text(_) => None,
        }
    }
}

impl std::fmt::Display for MergeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{:?}", s),
            Self::Node(node) if node.is_file() => {
                write!(f, "file {} ({} bytes)", node.name, node.content_str().len())
            }
            Self::Node(node) => write!(
                f,
                "directory {} ({} entries)",
                node.name,
                node.children.len()
            ),
        }
    }
}
