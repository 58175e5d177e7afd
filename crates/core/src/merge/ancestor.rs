//! Common-ancestor lookup over the version history.
//!
//! The history keeps no parent pointers apart from branch fork points, so the
//! search is order based: versions are sorted by timestamp (ties keep
//! insertion order) and the ancestor is picked relative to the earlier of the
//! two merge sides. This can select the wrong ancestor when both sides forked
//! later than the true divergence point; confidence scoring downstream is
//! calibrated against exactly this behaviour.

use tracing::debug;

use crate::models::{Version, VersionId};

/// Stateless common-ancestor finder.
pub struct AncestorResolver;

impl AncestorResolver {
    /// Find a plausible common ancestor of `current` and `target` from the
    /// history alone. See [`AncestorResolver::find_with_fork_points`].
    pub fn find_common_ancestor<'a, V: AsRef<Version>>(
        current: &Version,
        target: &Version,
        all_versions: &'a [V],
    ) -> Option<&'a Version> {
        Self::find_with_fork_points(current, target, all_versions, |_| None)
    }

    /// Find a plausible common ancestor of `current` and `target`.
    ///
    /// `fork_point` returns the version a version's branch was forked from.
    ///
    /// * Two distinct versions on the same branch form a linear history: the
    ///   earlier of the two is the ancestor.
    /// * A side that is the fork point of the other side's branch is the
    ///   ancestor.
    /// * Otherwise the history is scanned backward from the position just
    ///   before the earlier side, and the first version that is neither side
    ///   is returned.
    ///
    /// `None` means nothing precedes the fork point; the caller then falls
    /// back to a two-way comparison.
    pub fn find_with_fork_points<'a, V, F>(
        current: &Version,
        target: &Version,
        all_versions: &'a [V],
        fork_point: F,
    ) -> Option<&'a Version>
    where
        V: AsRef<Version>,
        F: Fn(&Version) -> Option<VersionId>,
    {
        let mut sorted: Vec<&'a Version> = all_versions.iter().map(AsRef::as_ref).collect();
        sorted.sort_by_key(|v| v.timestamp);

        let position = |version: &Version| -> usize {
            sorted
                .iter()
                .position(|v| v.id == version.id)
                .unwrap_or_else(|| sorted.partition_point(|v| v.timestamp < version.timestamp))
        };
        let current_pos = position(current);
        let target_pos = position(target);
        let (earlier, fork_pos) = if current_pos <= target_pos {
            (current, current_pos)
        } else {
            (target, target_pos)
        };

        if current.id != target.id && current.branch_id == target.branch_id {
            if let Some(found) = sorted.iter().copied().find(|v| v.id == earlier.id) {
                debug!(ancestor = %found.id, "linear history, earlier side is the ancestor");
                return Some(found);
            }
        }

        if current.id != target.id {
            let forked_from = if fork_point(target).as_ref() == Some(&current.id) {
                Some(&current.id)
            } else if fork_point(current).as_ref() == Some(&target.id) {
                Some(&target.id)
            } else {
                None
            };
            let found = forked_from.and_then(|id| sorted.iter().copied().find(|v| &v.id == id));
            if let Some(found) = found {
                debug!(ancestor = %found.id, "one side is the other's fork point");
                return Some(found);
            }
        }

        let ancestor = sorted[..fork_pos]
            .iter()
            .rev()
            .copied()
            .find(|v| v.id != current.id && v.id != target.id);

        match ancestor {
            Some(v) => debug!(ancestor = %v.id, "common ancestor found"),
            None => debug!("no version precedes the fork point"),
        }
        ancestor
    }
}

impl AsRef<Version> for Version {
    fn as_ref(&self) -> &Version {
        self
    }
}
