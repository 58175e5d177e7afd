//! Applying chosen resolutions to a merge result.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::detector::{Conflict, MergeResult, Suggestion};
use super::path::{MergePath, MergeValue};
use crate::errors::MergeError;
use crate::models::ProjectState;
use crate::tree::TreeNode;

/// A chosen resolution for one conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "choice", content = "value", rename_all = "snake_case")]
pub enum Resolution {
    /// Keep the current side's value.
    Current,
    /// Take the target side's value.
    Target,
    /// Revert to the ancestor's value.
    Ancestor,
    /// Use a caller-supplied value.
    Custom(MergeValue),
}

/// Resolutions keyed by conflict path.
pub type Resolutions = BTreeMap<MergePath, Resolution>;

impl From<Suggestion> for Resolution {
    fn from(suggestion: Suggestion) -> Self {
        match suggestion {
            Suggestion::Current | Suggestion::Merge => Self::Current,
            Suggestion::Target => Self::Target,
            Suggestion::Ancestor => Self::Ancestor,
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    /// Parse one of the side choices. Custom values are built by the caller.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "current" | "ours" => Ok(Self::Current),
            "target" | "theirs" => Ok(Self::Target),
            "ancestor" | "base" => Ok(Self::Ancestor),
            other => Err(format!(
                "unknown resolution '{}' (expected current, target or ancestor)",
                other
            )),
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Current => write!(f, "current"),
            Self::Target => write!(f, "target"),
            Self::Ancestor => write!(f, "ancestor"),
            Self::Custom(value) => write!(f, "custom {}", value),
        }
    }
}

/// Stateless merge application.
pub struct MergeApplier;

impl MergeApplier {
    /// Conflict paths with no entry in `resolutions`, in result order.
    pub fn missing_resolutions(result: &MergeResult, resolutions: &Resolutions) -> Vec<MergePath> {
        result
            .conflicts
            .iter()
            .filter(|c| !resolutions.contains_key(&c.path))
            .map(|c| c.path.clone())
            .collect()
    }

    /// The engine's suggestions for every auto-resolvable conflict.
    pub fn suggested_resolutions(result: &MergeResult) -> Resolutions {
        result
            .conflicts
            .iter()
            .filter(|c| c.auto_resolvable)
            .filter_map(|c| Some((c.path.clone(), c.suggested_resolution?.into())))
            .collect()
    }

    /// Produce the merged state.
    ///
    /// Starts from `base` (normally the current version's state), applies
    /// every auto-resolved change and then every conflict resolution. Fails
    /// without producing anything when a conflict has no resolution, when a
    /// resolution names a path that is not in conflict, or when a custom
    /// value does not fit its path. Applying the same inputs twice yields the
    /// same state.
    pub fn apply(
        base: &ProjectState,
        result: &MergeResult,
        resolutions: &Resolutions,
    ) -> Result<ProjectState, MergeError> {
        if let Some(path) = resolutions
            .keys()
            .find(|path| result.conflict(path).is_none())
        {
            return Err(MergeError::UnknownPath(path.to_string()));
        }

        let missing = Self::missing_resolutions(result, resolutions);
        if !missing.is_empty() {
            return Err(MergeError::UnresolvedConflicts {
                paths: missing.iter().map(ToString::to_string).collect(),
            });
        }

        let mut state = base.clone();
        for change in &result.auto_resolved {
            set_value(&mut state, &change.path, change.final_value.as_ref())?;
        }
        for conflict in &result.conflicts {
            let resolution = &resolutions[&conflict.path];
            let value = chosen_value(conflict, resolution)?;
            debug!(path = %conflict.path, resolution = %resolution, "applying resolution");
            set_value(&mut state, &conflict.path, value.as_ref())?;
        }

        state
            .validate()
            .map_err(|e| MergeError::InvalidResolution {
                path: "fileTree".into(),
                detail: e.to_string(),
            })?;

        info!(
            changes = result.auto_resolved.len(),
            resolutions = resolutions.len(),
            "merge applied"
        );
        Ok(state)
    }
}

fn chosen_value(
    conflict: &Conflict,
    resolution: &Resolution,
) -> Result<Option<MergeValue>, MergeError> {
    Ok(match resolution {
        Resolution::Current => conflict.current_value.clone(),
        Resolution::Target => conflict.target_value.clone(),
        Resolution::Ancestor => conflict.ancestor_value.clone(),
        Resolution::Custom(value) => {
            check_custom(&conflict.path, value)?;
            Some(value.clone())
        }
    })
}

fn check_custom(path: &MergePath, value: &MergeValue) -> Result<(), MergeError> {
    let invalid = |detail: String| MergeError::InvalidResolution {
        path: path.to_string(),
        detail,
    };
    match (path, value) {
        (MergePath::Field(_), MergeValue::Text(_)) => Ok(()),
        (MergePath::LanguageEntry(lang), MergeValue::Text(s)) if s == lang => Ok(()),
        (MergePath::LanguageEntry(lang), MergeValue::Text(s)) => Err(invalid(format!(
            "language entry '{}' cannot be resolved to '{}'",
            lang, s
        ))),
        (MergePath::TreeEntry(segments), MergeValue::Node(node)) => {
            if segments.last() != Some(&node.name) {
                return Err(invalid(format!(
                    "node is named '{}' but the path ends in '{}'",
                    node.name,
                    segments.last().map(String::as_str).unwrap_or_default()
                )));
            }
            node.validate().map_err(|e| invalid(e.to_string()))
        }
        (_, MergeValue::Node(_)) => Err(invalid("expected text, got a tree node".into())),
        (MergePath::TreeEntry(_), MergeValue::Text(_)) => {
            Err(invalid("expected a tree node, got text".into()))
        }
    }
}

/// Write `value` at `path` in `state`; `None` removes the entry.
fn set_value(
    state: &mut ProjectState,
    path: &MergePath,
    value: Option<&MergeValue>,
) -> Result<(), MergeError> {
    let mismatch = |expected: &str| MergeError::InvalidResolution {
        path: path.to_string(),
        detail: format!("expected {}", expected),
    };

    match path {
        MergePath::Field(field) => match value {
            Some(MergeValue::Text(s)) => field.set(state, s.clone()),
            None => field.set(state, String::new()),
            Some(MergeValue::Node(_)) => return Err(mismatch("text")),
        },
        MergePath::LanguageEntry(lang) => match value {
            Some(MergeValue::Text(_)) => {
                state.languages.insert(lang.clone());
            }
            None => {
                state.languages.remove(lang);
            }
            Some(MergeValue::Node(_)) => return Err(mismatch("a language name")),
        },
        MergePath::TreeEntry(segments) => match value {
            Some(MergeValue::Node(node)) => {
                if segments.len() <= 1 {
                    state.file_tree = Some(node.clone());
                } else {
                    let tree = state
                        .file_tree
                        .get_or_insert_with(|| TreeNode::directory(segments[0].clone(), Vec::new()));
                    if !tree.replace_at(segments, node.clone()) {
                        return Err(MergeError::InvalidResolution {
                            path: path.to_string(),
                            detail: "a parent entry is a file".into(),
                        });
                    }
                }
            }
            None => {
                if segments.len() <= 1 {
                    state.file_tree = None;
                } else if let Some(tree) = state.file_tree.as_mut() {
                    tree.remove_at(segments);
                }
            }
            Some(MergeValue::Text(_)) => return Err(mismatch("a tree node")),
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::MergeEngine;
    use crate::models::{BranchId, ScalarField, Version};

    fn version(state: ProjectState) -> Version {
        Version::new(state, BranchId::from("main"), None)
    }

    fn state(name: &str, langs: &[&str], tree: Option<TreeNode>) -> ProjectState {
        let mut s = ProjectState::named(name);
        s.languages = langs.iter().map(|l| l.to_string()).collect();
        s.file_tree = tree;
        s
    }

    fn merge(a: ProjectState, c: ProjectState, t: ProjectState) -> (ProjectState, MergeResult) {
        let result = MergeEngine::default().perform_three_way_merge(
            Some(&version(a)),
            &version(c.clone()),
            &version(t),
        );
        (c, result)
    }

    fn name_path() -> MergePath {
        MergePath::Field(ScalarField::Name)
    }

    #[test]
    fn test_clean_merge_takes_target_changes() {
        let (base, result) = merge(
            state("X", &["A", "B"], None),
            state("X", &["A"], None),
            state("Z", &["A", "B", "C"], None),
        );
        let merged = MergeApplier::apply(&base, &result, &Resolutions::new()).unwrap();
        assert_eq!(merged.name, "Z");
        let langs: Vec<&str> = merged.languages.iter().map(String::as_str).collect();
        assert_eq!(langs, vec!["A", "C"]);
    }

    #[test]
    fn test_missing_resolution_rejected() {
        let (base, result) = merge(state("X", &[], None), state("Y", &[], None), state("Z", &[], None));
        let err = MergeApplier::apply(&base, &result, &Resolutions::new()).unwrap_err();
        assert_eq!(
            err,
            MergeError::UnresolvedConflicts {
                paths: vec!["name".into()]
            }
        );
    }

    #[test]
    fn test_side_resolutions() {
        let (base, result) = merge(state("X", &[], None), state("Y", &[], None), state("Z", &[], None));
        for (choice, expected) in [
            (Resolution::Current, "Y"),
            (Resolution::Target, "Z"),
            (Resolution::Ancestor, "X"),
            (Resolution::Custom(MergeValue::text("W")), "W"),
        ] {
            let resolutions = Resolutions::from([(name_path(), choice)]);
            let merged = MergeApplier::apply(&base, &result, &resolutions).unwrap();
            assert_eq!(merged.name, expected);
        }
    }

    #[test]
    fn test_unknown_path_rejected() {
        let (base, result) = merge(state("X", &[], None), state("Y", &[], None), state("Z", &[], None));
        let resolutions = Resolutions::from([
            (name_path(), Resolution::Target),
            (MergePath::Field(ScalarField::Goals), Resolution::Target),
        ]);
        let err = MergeApplier::apply(&base, &result, &resolutions).unwrap_err();
        assert_eq!(err, MergeError::UnknownPath("goals".into()));
    }

    #[test]
    fn test_custom_value_must_fit_path() {
        let (base, result) = merge(state("X", &[], None), state("Y", &[], None), state("Z", &[], None));
        let resolutions = Resolutions::from([(
            name_path(),
            Resolution::Custom(MergeValue::Node(TreeNode::file("x", ""))),
        )]);
        let err = MergeApplier::apply(&base, &result, &resolutions).unwrap_err();
        assert!(matches!(err, MergeError::InvalidResolution { .. }));
    }

    #[test]
    fn test_tree_conflict_resolutions() {
        let tree = |content: &str| {
            Some(TreeNode::directory(
                "app",
                vec![TreeNode::file("f.txt", content), TreeNode::file("keep", "k")],
            ))
        };
        let (base, result) = merge(
            state("p", &[], tree("a")),
            state("p", &[], tree("ab")),
            state("p", &[], tree("ac")),
        );
        let path: MergePath = "fileTree/app/f.txt".parse().unwrap();
        assert!(result.conflict(&path).is_some());

        let resolutions = Resolutions::from([(path.clone(), Resolution::Target)]);
        let merged = MergeApplier::apply(&base, &result, &resolutions).unwrap();
        let root = merged.file_tree.as_ref().unwrap();
        assert_eq!(root.child("f.txt").unwrap().content_str(), "ac");
        assert_eq!(root.child("keep").unwrap().content_str(), "k");

        let custom = Resolutions::from([(
            path.clone(),
            Resolution::Custom(MergeValue::Node(TreeNode::file("f.txt", "abc"))),
        )]);
        let merged = MergeApplier::apply(&base, &result, &custom).unwrap();
        let root = merged.file_tree.as_ref().unwrap();
        assert_eq!(root.child("f.txt").unwrap().content_str(), "abc");

        let renamed = Resolutions::from([(
            path,
            Resolution::Custom(MergeValue::Node(TreeNode::file("other", "abc"))),
        )]);
        assert!(MergeApplier::apply(&base, &result, &renamed).is_err());
    }

    #[test]
    fn test_deletions_apply() {
        let (base, result) = merge(
            state(
                "p",
                &[],
                Some(TreeNode::directory("app", vec![TreeNode::file("old", "o")])),
            ),
            state(
                "p",
                &[],
                Some(TreeNode::directory("app", vec![TreeNode::file("old", "o")])),
            ),
            state("p", &[], Some(TreeNode::directory("app", vec![]))),
        );
        let merged = MergeApplier::apply(&base, &result, &Resolutions::new()).unwrap();
        assert!(merged.file_tree.unwrap().children.is_empty());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let (base, result) = merge(
            state("X", &["A"], None),
            state("Y", &["A", "B"], None),
            state("Z", &[], None),
        );
        let resolutions = Resolutions::from([(name_path(), Resolution::Current)]);
        let first = MergeApplier::apply(&base, &result, &resolutions).unwrap();
        let second = MergeApplier::apply(&base, &result, &resolutions).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.name, "Y");
        assert!(first.languages.contains("B"));
        assert!(!first.languages.contains("A"));
    }

    #[test]
    fn test_suggested_resolutions() {
        let (_, result) = merge(
            state("Inventory", &[], None),
            state("Inventory Service", &[], None),
            state("Inventory Servic", &[], None),
        );
        let suggested = MergeApplier::suggested_resolutions(&result);
        assert_eq!(suggested.get(&name_path()), Some(&Resolution::Current));
    }

    #[test]
    fn test_parse_resolution() {
        assert_eq!("theirs".parse::<Resolution>(), Ok(Resolution::Target));
        assert_eq!("Current".parse::<Resolution>(), Ok(Resolution::Current));
        assert!("both".parse::<Resolution>().is_err());
    }
}
