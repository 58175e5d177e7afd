//! Labelled ordered tree describing a project's file/directory layout.
//!
//! Nodes are addressed by name within their parent directory. A segment path
//! such as `["app", "src", "main.rs"]` walks from the root: the first segment
//! names the root itself and is matched positionally, the remaining segments
//! are matched by child name.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::errors::TreeError;

/// Whether a node is a file or a directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// A single file or directory.
///
/// Equality is structural and order-independent: two directories are equal
/// when they hold the same set of children by name, regardless of the stored
/// order. Absent file content compares equal to empty content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Create a file node.
    pub fn file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
            content: Some(content.into()),
            children: Vec::new(),
        }
    }

    /// Create a directory node.
    pub fn directory(name: impl Into<String>, children: Vec<TreeNode>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Directory,
            content: None,
            children,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// File content, treating absent content as empty.
    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Direct child by name.
    pub fn child(&self, name: &str) -> Option<&TreeNode> {
        self.children.iter().find(|c| c.name == name)
    }

    fn child_mut(&mut self, name: &str) -> Option<&mut TreeNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Number of file nodes in this subtree.
    pub fn file_count(&self) -> usize {
        match self.kind {
            NodeKind::File => 1,
            NodeKind::Directory => self.children.iter().map(TreeNode::file_count).sum(),
        }
    }

    /// Check the tree invariants for this subtree.
    pub fn validate(&self) -> Result<(), TreeError> {
        if self.name.is_empty() {
            return Err(TreeError::EmptyName {
                parent: String::new(),
            });
        }
        if self.name.contains('/') {
            return Err(TreeError::InvalidName {
                parent: String::new(),
                name: self.name.clone(),
            });
        }
        self.validate_at(&self.name)
    }

    fn validate_at(&self, path: &str) -> Result<(), TreeError> {
        match self.kind {
            NodeKind::File => {
                if !self.children.is_empty() {
                    return Err(TreeError::FileWithChildren {
                        path: path.to_string(),
                    });
                }
            }
            NodeKind::Directory => {
                if self.content.is_some() {
                    return Err(TreeError::DirectoryWithContent {
                        path: path.to_string(),
                    });
                }
                let mut seen = HashSet::new();
                for child in &self.children {
                    if child.name.is_empty() {
                        return Err(TreeError::EmptyName {
                            parent: path.to_string(),
                        });
                    }
                    if child.name.contains('/') {
                        return Err(TreeError::InvalidName {
                            parent: path.to_string(),
                            name: child.name.clone(),
                        });
                    }
                    if !seen.insert(child.name.as_str()) {
                        return Err(TreeError::DuplicateName {
                            parent: path.to_string(),
                            name: child.name.clone(),
                        });
                    }
                    child.validate_at(&format!("{}/{}", path, child.name))?;
                }
            }
        }
        Ok(())
    }

    /// Look up a node by segment path (first segment is the root).
    pub fn get(&self, segments: &[String]) -> Option<&TreeNode> {
        let (_, rest) = segments.split_first()?;
        let mut node = self;
        for seg in rest {
            node = node.child(seg)?;
        }
        Some(node)
    }

    /// Replace (or insert) the node at `segments` with `node`.
    ///
    /// An existing entry keeps its position among its siblings; a new entry
    /// is appended. Missing intermediate directories are created. Returns
    /// `false` when an intermediate segment is an existing file.
    pub fn replace_at(&mut self, segments: &[String], node: TreeNode) -> bool {
        let Some((_, rest)) = segments.split_first() else {
            return false;
        };
        let Some((last, parents)) = rest.split_last() else {
            *self = node;
            return true;
        };

        let mut dir = self;
        for seg in parents {
            if dir.child(seg).is_none() {
                dir.children.push(TreeNode::directory(seg.clone(), Vec::new()));
            }
            let Some(next) = dir.child_mut(seg) else {
                return false;
            };
            if !next.is_directory() {
                return false;
            }
            dir = next;
        }
        if !dir.is_directory() {
            return false;
        }

        match dir.child_mut(last) {
            Some(existing) => *existing = node,
            None => dir.children.push(node),
        }
        true
    }

    /// Remove the node at `segments`, returning it. The root itself cannot be
    /// removed through this method.
    pub fn remove_at(&mut self, segments: &[String]) -> Option<TreeNode> {
        let (_, rest) = segments.split_first()?;
        let (last, parents) = rest.split_last()?;

        let mut dir = self;
        for seg in parents {
            dir = dir.child_mut(seg)?;
        }
        let idx = dir.children.iter().position(|c| &c.name == last)?;
        Some(dir.children.remove(idx))
    }
}

impl PartialEq for TreeNode {
    fn eq(&self, other: &Self) -> bool {
        if self.kind != other.kind || self.name != other.name {
            return false;
        }
        match self.kind {
            NodeKind::File => self.content_str() == other.content_str(),
            NodeKind::Directory => {
                if self.children.len() != other.children.len() {
                    return false;
                }
                let by_name: HashMap<&str, &TreeNode> = self
                    .children
                    .iter()
                    .map(|c| (c.name.as_str(), c))
                    .collect();
                other
                    .children
                    .iter()
                    .all(|c| by_name.get(c.name.as_str()).is_some_and(|mine| *mine == c))
            }
        }
    }
}

impl Eq for TreeNode {}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> Vec<String> {
        s.split('/').map(str::to_string).collect()
    }

    fn sample() -> TreeNode {
        TreeNode::directory(
            "app",
            vec![
                TreeNode::directory(
                    "src",
                    vec![
                        TreeNode::file("main.rs", "fn main() {}"),
                        TreeNode::file("lib.rs", ""),
                    ],
                ),
                TreeNode::file("README.md", "# app"),
            ],
        )
    }

    #[test]
    fn test_equality_ignores_child_order() {
        let a = sample();
        let mut b = sample();
        b.children.reverse();
        b.children[1].children.reverse();
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_detects_content_and_kind() {
        let a = sample();
        let mut b = sample();
        b.children[0].children[0].content = Some("fn main() { run() }".into());
        assert_ne!(a, b);

        let file = TreeNode::file("x", "");
        let dir = TreeNode::directory("x", Vec::new());
        assert_ne!(file, dir);
    }

    #[test]
    fn test_missing_content_equals_empty() {
        let mut a = TreeNode::file("a.txt", "");
        a.content = None;
        assert_eq!(a, TreeNode::file("a.txt", ""));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let tree = TreeNode::directory(
            "root",
            vec![TreeNode::file("a", "1"), TreeNode::file("a", "2")],
        );
        assert_eq!(
            tree.validate(),
            Err(TreeError::DuplicateName {
                parent: "root".into(),
                name: "a".into()
            })
        );
    }

    #[test]
    fn test_validate_rejects_file_children() {
        let mut file = TreeNode::file("a", "1");
        file.children.push(TreeNode::file("b", "2"));
        let tree = TreeNode::directory("root", vec![file]);
        assert!(matches!(
            tree.validate(),
            Err(TreeError::FileWithChildren { .. })
        ));
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_slash_in_names() {
        let mut tree = sample();
        tree.children[0].children[0].name = "bin/main.rs".into();
        assert_eq!(
            tree.validate(),
            Err(TreeError::InvalidName {
                parent: "app/src".into(),
                name: "bin/main.rs".into()
            })
        );

        let root = TreeNode::directory("app/v2", Vec::new());
        assert!(matches!(
            root.validate(),
            Err(TreeError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_get_by_path() {
        let tree = sample();
        assert_eq!(
            tree.get(&path("app/src/main.rs")).map(TreeNode::content_str),
            Some("fn main() {}")
        );
        // The root segment is positional.
        assert!(tree.get(&path("renamed/README.md")).is_some());
        assert!(tree.get(&path("app/missing")).is_none());
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut tree = sample();
        assert!(tree.replace_at(&path("app/src/main.rs"), TreeNode::file("main.rs", "new")));
        let src = tree.child("src").unwrap();
        assert_eq!(src.children[0].name, "main.rs");
        assert_eq!(src.children[0].content_str(), "new");
    }

    #[test]
    fn test_replace_creates_parents() {
        let mut tree = sample();
        assert!(tree.replace_at(
            &path("app/docs/guide/intro.md"),
            TreeNode::file("intro.md", "hi")
        ));
        assert!(tree.get(&path("app/docs/guide/intro.md")).is_some());
        assert!(!tree.replace_at(
            &path("app/README.md/nested"),
            TreeNode::file("nested", "")
        ));
    }

    #[test]
    fn test_remove_at() {
        let mut tree = sample();
        let removed = tree.remove_at(&path("app/src/lib.rs")).unwrap();
        assert_eq!(removed.name, "lib.rs");
        assert_eq!(tree.file_count(), 2);
        assert!(tree.remove_at(&path("app")).is_none());
    }
}
