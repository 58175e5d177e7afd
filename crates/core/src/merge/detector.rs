//! Three-way change classification.
//!
//! Given an ancestor and two divergent versions, the engine walks every
//! scalar field, every language and every file-tree node, and sorts each
//! difference into an auto-resolved [`Change`] or a [`Conflict`] that needs a
//! human decision.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::merger::{Merger, TextMerge};
use super::path::{MergePath, MergeValue};
use super::similarity;
use super::MergeOptions;
use crate::models::{ScalarField, Version, VersionId};
use crate::tree::{NodeKind, TreeNode};

/// Confidence for a file modified on one side and deleted on the other.
const DELETE_MODIFY_CONFIDENCE: f64 = 0.3;
/// Confidence for a node whose kind changed.
const TYPE_CONFIDENCE: f64 = 0.2;
/// Confidence for file content that could not be merged.
const CONTENT_CONFIDENCE: f64 = 0.4;
/// Confidence for an entry added differently on both sides.
const BOTH_ADDED_CONFIDENCE: f64 = 0.3;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Categorisation of a conflict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictType {
    /// Content differs and could not be merged (also used for every
    /// difference found without a common ancestor).
    Content,
    /// File on one side, directory on the other.
    Type,
    /// Both sides changed the same item differently, or one side deleted what
    /// the other modified.
    BothModified,
    /// Both sides added the same entry with different content.
    BothAdded,
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Content => write!(f, "content"),
            Self::Type => write!(f, "type"),
            Self::BothModified => write!(f, "both-modified"),
            Self::BothAdded => write!(f, "both-added"),
        }
    }
}

/// What an auto-resolved change does relative to the ancestor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
    Unchanged,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Removed => write!(f, "removed"),
            Self::Modified => write!(f, "modified"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Which side an auto-resolved value came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    Current,
    Target,
    Both,
}

impl std::fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Current => write!(f, "current"),
            Self::Target => write!(f, "target"),
            Self::Both => write!(f, "both"),
        }
    }
}

/// Suggested resolution for a conflict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Suggestion {
    Current,
    Target,
    Ancestor,
    /// The sides are near-identical; either is acceptable.
    Merge,
}

impl std::fmt::Display for Suggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Current => write!(f, "current"),
            Self::Target => write!(f, "target"),
            Self::Ancestor => write!(f, "ancestor"),
            Self::Merge => write!(f, "merge"),
        }
    }
}

/// A difference the engine resolved without human input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub path: MergePath,
    pub change_type: ChangeType,
    pub source: ChangeSource,
    pub ancestor_value: Option<MergeValue>,
    pub current_value: Option<MergeValue>,
    pub target_value: Option<MergeValue>,
    /// The value the merged state takes; `None` means absent.
    pub final_value: Option<MergeValue>,
}

/// A difference that needs a chosen resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub path: MergePath,
    pub conflict_type: ConflictType,
    pub ancestor_value: Option<MergeValue>,
    pub current_value: Option<MergeValue>,
    pub target_value: Option<MergeValue>,
    pub conflict_reason: String,
    pub auto_resolvable: bool,
    pub suggested_resolution: Option<Suggestion>,
    /// Heuristic safety score in `[0, 1]`.
    pub confidence: f64,
}

/// Output of a merge analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
    pub conflicts: Vec<Conflict>,
    pub auto_resolved: Vec<Change>,
    /// The ancestor used, or `None` when the analysis fell back to a two-way
    /// comparison.
    pub common_ancestor: Option<Version>,
    pub merge_base: Option<VersionId>,
    pub current_version: VersionId,
    pub target_version: VersionId,
}

impl MergeResult {
    /// No conflicts remain.
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// The analysis ran without a common ancestor, so automatic resolution is
    /// less reliable.
    pub fn is_two_way(&self) -> bool {
        self.common_ancestor.is_none()
    }

    pub fn conflict(&self, path: &MergePath) -> Option<&Conflict> {
        self.conflicts.iter().find(|c| &c.path == path)
    }

    pub fn change(&self, path: &MergePath) -> Option<&Change> {
        self.auto_resolved.iter().find(|c| &c.path == path)
    }

    /// Auto-resolved changes that actually alter something.
    pub fn effective_changes(&self) -> impl Iterator<Item = &Change> {
        self.auto_resolved
            .iter()
            .filter(|c| c.change_type != ChangeType::Unchanged)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// How two sides moved relative to their ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delta {
    Unchanged,
    CurrentOnly,
    TargetOnly,
    BothSame,
    Diverged,
}

fn classify<T: PartialEq + ?Sized>(ancestor: &T, current: &T, target: &T) -> Delta {
    match (current != ancestor, target != ancestor) {
        (false, false) => Delta::Unchanged,
        (true, false) => Delta::CurrentOnly,
        (false, true) => Delta::TargetOnly,
        (true, true) if current == target => Delta::BothSame,
        (true, true) => Delta::Diverged,
    }
}

fn text(s: &str) -> Option<MergeValue> {
    Some(MergeValue::text(s))
}

fn node(n: &TreeNode) -> Option<MergeValue> {
    Some(MergeValue::Node(n.clone()))
}

fn opt_node(n: Option<&TreeNode>) -> Option<MergeValue> {
    n.map(|n| MergeValue::Node(n.clone()))
}

fn child_path(parent: &[String], name: &str) -> Vec<String> {
    let mut path = parent.to_vec();
    path.push(name.to_string());
    path
}

/// Accumulates the engine's output while walking a project.
#[derive(Default)]
struct Analysis {
    conflicts: Vec<Conflict>,
    auto_resolved: Vec<Change>,
}

impl Analysis {
    fn resolve(
        &mut self,
        path: MergePath,
        change_type: ChangeType,
        source: ChangeSource,
        values: [Option<MergeValue>; 3],
        final_value: Option<MergeValue>,
    ) {
        debug!(path = %path, change = %change_type, source = %source, "auto-resolved");
        let [ancestor_value, current_value, target_value] = values;
        self.auto_resolved.push(Change {
            path,
            change_type,
            source,
            ancestor_value,
            current_value,
            target_value,
            final_value,
        });
    }

    fn conflict(
        &mut self,
        path: MergePath,
        conflict_type: ConflictType,
        values: [Option<MergeValue>; 3],
        reason: impl Into<String>,
        confidence: f64,
    ) {
        debug!(path = %path, conflict_type = %conflict_type, "conflict detected");
        let [ancestor_value, current_value, target_value] = values;
        self.conflicts.push(Conflict {
            path,
            conflict_type,
            ancestor_value,
            current_value,
            target_value,
            conflict_reason: reason.into(),
            auto_resolvable: false,
            suggested_resolution: None,
            confidence,
        });
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Three-way merge engine.
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    options: MergeOptions,
}

impl MergeEngine {
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Compare `current` and `target` against `ancestor`.
    ///
    /// Without an ancestor the engine degrades to a two-way comparison in
    /// which every differing scalar field is an unresolvable low-confidence
    /// conflict; the result's `common_ancestor` is then `None`.
    pub fn perform_three_way_merge(
        &self,
        ancestor: Option<&Version>,
        current: &Version,
        target: &Version,
    ) -> MergeResult {
        let Some(ancestor) = ancestor else {
            return self.perform_two_way_merge(current, target);
        };

        info!(
            ancestor = %ancestor.id,
            current = %current.id,
            target = %target.id,
            "performing three-way merge"
        );

        let mut analysis = Analysis::default();
        self.analyze_scalars(ancestor, current, target, &mut analysis);
        self.analyze_languages(ancestor, current, target, &mut analysis);
        self.analyze_tree(
            ancestor.project_state.file_tree.as_ref(),
            current.project_state.file_tree.as_ref(),
            target.project_state.file_tree.as_ref(),
            &mut analysis,
        );

        info!(
            conflicts = analysis.conflicts.len(),
            auto_resolved = analysis.auto_resolved.len(),
            "three-way merge analysis complete"
        );

        MergeResult {
            conflicts: analysis.conflicts,
            auto_resolved: analysis.auto_resolved,
            common_ancestor: Some(ancestor.clone()),
            merge_base: Some(ancestor.id.clone()),
            current_version: current.id.clone(),
            target_version: target.id.clone(),
        }
    }

    fn perform_two_way_merge(&self, current: &Version, target: &Version) -> MergeResult {
        warn!(
            current = %current.id,
            target = %target.id,
            "no common ancestor, falling back to two-way comparison"
        );

        let mut analysis = Analysis::default();
        for field in ScalarField::ALL {
            let c = field.get(&current.project_state);
            let t = field.get(&target.project_state);
            let path = MergePath::Field(field);
            if c == t {
                analysis.resolve(
                    path,
                    ChangeType::Unchanged,
                    ChangeSource::Both,
                    [None, text(c), text(t)],
                    text(c),
                );
            } else {
                analysis.conflict(
                    path,
                    ConflictType::Content,
                    [None, text(c), text(t)],
                    format!(
                        "Both versions modified {} differently (no common ancestor)",
                        field
                    ),
                    self.options.two_way_confidence,
                );
            }
        }

        MergeResult {
            conflicts: analysis.conflicts,
            auto_resolved: analysis.auto_resolved,
            common_ancestor: None,
            merge_base: None,
            current_version: current.id.clone(),
            target_version: target.id.clone(),
        }
    }

    fn analyze_scalars(
        &self,
        ancestor: &Version,
        current: &Version,
        target: &Version,
        analysis: &mut Analysis,
    ) {
        for field in ScalarField::ALL {
            let a = field.get(&ancestor.project_state);
            let c = field.get(&current.project_state);
            let t = field.get(&target.project_state);
            let path = MergePath::Field(field);
            let values = [text(a), text(c), text(t)];
            let edit = |v: &str| {
                if v.is_empty() {
                    ChangeType::Removed
                } else {
                    ChangeType::Modified
                }
            };

            match classify(a, c, t) {
                Delta::Unchanged => analysis.resolve(
                    path,
                    ChangeType::Unchanged,
                    ChangeSource::Both,
                    values,
                    text(a),
                ),
                Delta::CurrentOnly => {
                    analysis.resolve(path, edit(c), ChangeSource::Current, values, text(c))
                }
                Delta::TargetOnly => {
                    analysis.resolve(path, edit(t), ChangeSource::Target, values, text(t))
                }
                Delta::BothSame => {
                    analysis.resolve(path, ChangeType::Modified, ChangeSource::Both, values, text(c))
                }
                Delta::Diverged => {
                    let similarity = similarity::similarity(c, t);
                    let confidence = similarity::confidence(a, c, t);
                    let suggestion = similarity::suggest(a, c, t, similarity, &self.options);
                    debug!(path = %path, similarity, confidence, "scalar conflict");
                    analysis.conflicts.push(Conflict {
                        path,
                        conflict_type: ConflictType::BothModified,
                        ancestor_value: text(a),
                        current_value: text(c),
                        target_value: text(t),
                        conflict_reason: format!("Both versions modified {} differently", field),
                        auto_resolvable: similarity > self.options.similarity_threshold,
                        suggested_resolution: suggestion,
                        confidence,
                    });
                }
            }
        }
    }

    fn analyze_languages(
        &self,
        ancestor: &Version,
        current: &Version,
        target: &Version,
        analysis: &mut Analysis,
    ) {
        let a_set = &ancestor.project_state.languages;
        let c_set = &current.project_state.languages;
        let t_set = &target.project_state.languages;
        let all: BTreeSet<&String> = a_set.iter().chain(c_set).chain(t_set).collect();

        for lang in all {
            let in_a = a_set.contains(lang);
            let in_c = c_set.contains(lang);
            let in_t = t_set.contains(lang);
            let present = |flag: bool| flag.then(|| MergeValue::text(lang.as_str()));
            let membership = |flag: bool| {
                if flag {
                    ChangeType::Added
                } else {
                    ChangeType::Removed
                }
            };
            let path = MergePath::LanguageEntry(lang.clone());
            let values = [present(in_a), present(in_c), present(in_t)];

            match classify(&in_a, &in_c, &in_t) {
                Delta::Unchanged => analysis.resolve(
                    path,
                    ChangeType::Unchanged,
                    ChangeSource::Both,
                    values,
                    present(in_a),
                ),
                Delta::CurrentOnly => analysis.resolve(
                    path,
                    membership(in_c),
                    ChangeSource::Current,
                    values,
                    present(in_c),
                ),
                Delta::TargetOnly => analysis.resolve(
                    path,
                    membership(in_t),
                    ChangeSource::Target,
                    values,
                    present(in_t),
                ),
                // Membership is boolean: if both sides moved away from the
                // ancestor they moved to the same place.
                Delta::BothSame | Delta::Diverged => analysis.resolve(
                    path,
                    membership(in_c),
                    ChangeSource::Both,
                    values,
                    present(in_c),
                ),
            }
        }
    }

    fn analyze_tree(
        &self,
        ancestor: Option<&TreeNode>,
        current: Option<&TreeNode>,
        target: Option<&TreeNode>,
        analysis: &mut Analysis,
    ) {
        match ancestor {
            Some(a) => self.diff_node(a, current, target, &[a.name.clone()], analysis),
            None => {
                let Some(name) = current.or(target).map(|n| n.name.clone()) else {
                    return;
                };
                self.diff_added(&[name], current, target, analysis);
            }
        }
    }

    /// Diff a node that existed in the ancestor.
    fn diff_node(
        &self,
        a: &TreeNode,
        current: Option<&TreeNode>,
        target: Option<&TreeNode>,
        path: &[String],
        analysis: &mut Analysis,
    ) {
        let merge_path = MergePath::tree(path);

        let (c, t) = match (current, target) {
            (None, None) => {
                analysis.resolve(
                    merge_path,
                    ChangeType::Removed,
                    ChangeSource::Both,
                    [node(a), None, None],
                    None,
                );
                return;
            }
            (Some(c), None) => {
                if c == a {
                    analysis.resolve(
                        merge_path,
                        ChangeType::Removed,
                        ChangeSource::Target,
                        [node(a), node(c), None],
                        None,
                    );
                } else {
                    analysis.conflict(
                        merge_path,
                        ConflictType::BothModified,
                        [node(a), node(c), None],
                        "File was modified in current but deleted in target",
                        DELETE_MODIFY_CONFIDENCE,
                    );
                }
                return;
            }
            (None, Some(t)) => {
                if t == a {
                    analysis.resolve(
                        merge_path,
                        ChangeType::Removed,
                        ChangeSource::Current,
                        [node(a), None, node(t)],
                        None,
                    );
                } else {
                    analysis.conflict(
                        merge_path,
                        ConflictType::BothModified,
                        [node(a), None, node(t)],
                        "File was deleted in current but modified in target",
                        DELETE_MODIFY_CONFIDENCE,
                    );
                }
                return;
            }
            (Some(c), Some(t)) => (c, t),
        };

        let values = [node(a), node(c), node(t)];

        if c.kind != t.kind {
            analysis.conflict(
                merge_path,
                ConflictType::Type,
                values,
                format!("Entry is a {} in current but a {} in target", c.kind, t.kind),
                TYPE_CONFIDENCE,
            );
            return;
        }
        if c.kind != a.kind {
            // Both sides replaced the entry with the other kind.
            if c == t {
                analysis.resolve(
                    merge_path,
                    ChangeType::Modified,
                    ChangeSource::Both,
                    values,
                    node(c),
                );
            } else {
                analysis.conflict(
                    merge_path,
                    ConflictType::Type,
                    values,
                    "File type changed differently in current and target",
                    TYPE_CONFIDENCE,
                );
            }
            return;
        }

        match a.kind {
            NodeKind::File => {
                let (a_text, c_text, t_text) = (a.content_str(), c.content_str(), t.content_str());
                match classify(a_text, c_text, t_text) {
                    Delta::Unchanged => analysis.resolve(
                        merge_path,
                        ChangeType::Unchanged,
                        ChangeSource::Both,
                        values,
                        node(a),
                    ),
                    Delta::CurrentOnly => analysis.resolve(
                        merge_path,
                        ChangeType::Modified,
                        ChangeSource::Current,
                        values,
                        node(c),
                    ),
                    Delta::TargetOnly => analysis.resolve(
                        merge_path,
                        ChangeType::Modified,
                        ChangeSource::Target,
                        values,
                        node(t),
                    ),
                    Delta::BothSame => analysis.resolve(
                        merge_path,
                        ChangeType::Modified,
                        ChangeSource::Both,
                        values,
                        node(c),
                    ),
                    Delta::Diverged => match Merger::merge_text(a_text, c_text, t_text) {
                        TextMerge::Merged(content) => {
                            let mut merged = c.clone();
                            merged.content = Some(content);
                            analysis.resolve(
                                merge_path,
                                ChangeType::Modified,
                                ChangeSource::Both,
                                values,
                                Some(MergeValue::Node(merged)),
                            );
                        }
                        TextMerge::Conflict => analysis.conflict(
                            merge_path,
                            ConflictType::Content,
                            values,
                            "File content was modified differently in both versions",
                            CONTENT_CONFIDENCE,
                        ),
                    },
                }
            }
            NodeKind::Directory => {
                for name in child_names(a, c, t) {
                    let child = child_path(path, name);
                    match a.child(name) {
                        Some(a_child) => {
                            self.diff_node(a_child, c.child(name), t.child(name), &child, analysis)
                        }
                        None => self.diff_added(&child, c.child(name), t.child(name), analysis),
                    }
                }
            }
        }
    }

    /// Diff an entry that did not exist in the ancestor.
    fn diff_added(
        &self,
        path: &[String],
        current: Option<&TreeNode>,
        target: Option<&TreeNode>,
        analysis: &mut Analysis,
    ) {
        let merge_path = MergePath::tree(path);
        let values = [None, opt_node(current), opt_node(target)];
        match (current, target) {
            (Some(c), Some(t)) if c == t => analysis.resolve(
                merge_path,
                ChangeType::Added,
                ChangeSource::Both,
                values,
                node(c),
            ),
            (Some(_), Some(_)) => analysis.conflict(
                merge_path,
                ConflictType::BothAdded,
                values,
                "File was added differently in both versions",
                BOTH_ADDED_CONFIDENCE,
            ),
            (Some(c), None) => analysis.resolve(
                merge_path,
                ChangeType::Added,
                ChangeSource::Current,
                values,
                node(c),
            ),
            (None, Some(t)) => analysis.resolve(
                merge_path,
                ChangeType::Added,
                ChangeSource::Target,
                values,
                node(t),
            ),
            (None, None) => {}
        }
    }
}

/// Child names of three directories: ancestor order first, then entries new
/// in current, then entries new in target.
fn child_names<'a>(a: &'a TreeNode, c: &'a TreeNode, t: &'a TreeNode) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    a.children
        .iter()
        .chain(&c.children)
        .chain(&t.children)
        .map(|n| n.name.as_str())
        .filter(|name| seen.insert(*name))
        .collect()
}
