//! Merge orchestration on the project aggregate.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::Project;
use crate::errors::ProjectError;
use crate::merge::{AncestorResolver, MergeApplier, MergeEngine, MergeResult, Resolutions};
use crate::models::{BranchId, Version, VersionId};

/// How a merged state is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCommit {
    /// Append a new version to the active branch. When `false` the merged
    /// state overwrites the merge's current version.
    pub create_new_version: bool,
    pub notes: Option<String>,
}

impl Default for MergeCommit {
    fn default() -> Self {
        Self {
            create_new_version: true,
            notes: None,
        }
    }
}

impl Project {
    /// Analyse merging `target` into the current version.
    ///
    /// Nothing is written; the result is applied with
    /// [`Project::apply_merge`].
    pub fn prepare_merge(
        &self,
        engine: &MergeEngine,
        target: &VersionId,
    ) -> Result<MergeResult, ProjectError> {
        let current = self.current_version()?;
        let target = self.require_version(target)?;
        let ancestor =
            AncestorResolver::find_with_fork_points(current, target, &self.versions, |v| {
                self.branch(&v.branch_id).map(|b| b.source_version_id.clone())
            });
        Ok(engine.perform_three_way_merge(ancestor, current, target))
    }

    /// Analyse merging the head of `branch` into the current version.
    pub fn prepare_branch_merge(
        &self,
        engine: &MergeEngine,
        branch: &BranchId,
    ) -> Result<MergeResult, ProjectError> {
        let head = self.require_branch(branch)?.head_version_id.clone();
        self.prepare_merge(engine, &head)
    }

    /// Fails with [`ProjectError::StaleMerge`] when `result` was prepared
    /// against a version other than the current one.
    pub fn ensure_merge_is_current(&self, result: &MergeResult) -> Result<(), ProjectError> {
        if result.current_version != self.current_version_id {
            return Err(ProjectError::StaleMerge {
                prepared: result.current_version.to_string(),
                current: self.current_version_id.to_string(),
            });
        }
        Ok(())
    }

    /// Apply `resolutions` to `result` and commit the merged state.
    ///
    /// Returns the id of the version holding the merged state.
    pub fn apply_merge(
        &mut self,
        result: &MergeResult,
        resolutions: &Resolutions,
        commit: MergeCommit,
    ) -> Result<VersionId, ProjectError> {
        self.ensure_merge_is_current(result)?;
        let base = self.require_version(&result.current_version)?;
        let owner = base.branch_id.clone();
        let merged = MergeApplier::apply(&base.project_state, result, resolutions)?;
        let notes = commit
            .notes
            .or_else(|| Some(format!("Merged version {}", result.target_version)));

        if commit.create_new_version {
            let branch_idx = self.branch_index(&self.current_branch_id)?;
            let version = Version::new(merged, self.current_branch_id.clone(), notes);
            let id = version.id.clone();
            self.push_version(branch_idx, version);
            info!(
                version = %id,
                target = %result.target_version,
                branch = %self.branches[branch_idx].name,
                "merge committed as new version"
            );
            return Ok(id);
        }

        let id = result.current_version.clone();
        if let Some(other) = self
            .branches
            .iter()
            .find(|b| b.head_version_id == id && b.id != owner)
        {
            return Err(ProjectError::InPlaceForbidden {
                version: id.to_string(),
                branch: other.name.clone(),
            });
        }

        let Some(slot) = self.versions.iter_mut().find(|v| v.id == id) else {
            return Err(ProjectError::VersionNotFound(id.to_string()));
        };
        let version = Arc::make_mut(slot);
        version.project_state = merged;
        version.notes = notes;
        self.last_updated = Utc::now();
        info!(version = %id, target = %result.target_version, "merge applied in place");
        Ok(id)
    }
}
