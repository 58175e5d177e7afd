//! The project aggregate: version store, branch index and tag index.
//!
//! A [`Project`] owns its whole history. Versions are shared behind [`Arc`],
//! so cloning a project is cheap and a clone can be handed to a background
//! task for merge analysis. Every mutating operation checks all of its
//! preconditions before touching any field; an `Err` always leaves the
//! project exactly as it was.

pub mod branches;
pub mod colors;
pub mod merge;
pub mod tags;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::ProjectError;
use crate::models::{Branch, BranchId, ProjectId, ProjectState, Tag, Version, VersionId};

pub use colors::{default_palette, ColorAllocator};
pub use merge::MergeCommit;
pub use tags::{NewTag, TagUpdate};

/// Settings applied when a project is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSettings {
    /// Name of the default branch.
    pub default_branch_name: String,
    /// Branch colour palette.
    pub palette: Vec<String>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            default_branch_name: "main".into(),
            palette: default_palette(),
        }
    }
}

/// A versioned, branchable project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Insertion order is creation order.
    versions: Vec<Arc<Version>>,
    branches: Vec<Branch>,
    tags: Vec<Tag>,
    current_version_id: VersionId,
    current_branch_id: BranchId,
    colors: ColorAllocator,
}

impl Project {
    /// Create a project with a default branch holding `initial_state` as its
    /// first version.
    pub fn new(
        name: &str,
        initial_state: ProjectState,
        settings: &ProjectSettings,
    ) -> Result<Self, ProjectError> {
        let name = checked_name("project", name)?;
        let branch_name = checked_name("branch", &settings.default_branch_name)?;
        initial_state.validate()?;

        let now = Utc::now();
        let branch_id = BranchId::new();
        let version = Version::new(initial_state, branch_id.clone(), Some("Initial version".into()));
        let mut colors = ColorAllocator::new(settings.palette.clone());
        let branch = Branch {
            id: branch_id.clone(),
            name: branch_name,
            description: "Default branch".into(),
            created_at: now,
            last_updated: now,
            source_version_id: version.id.clone(),
            head_version_id: version.id.clone(),
            is_default: true,
            color: colors.allocate(),
        };

        info!(project = %name, branch = %branch.name, "project created");

        Ok(Self {
            id: ProjectId::new(),
            name,
            created_at: now,
            last_updated: now,
            current_version_id: version.id.clone(),
            current_branch_id: branch_id,
            versions: vec![Arc::new(version)],
            branches: vec![branch],
            tags: Vec::new(),
            colors,
        })
    }

    /// Check the cross-references of a project loaded from storage.
    pub fn check_integrity(&self) -> Result<(), ProjectError> {
        self.require_version(&self.current_version_id)?;
        self.require_branch(&self.current_branch_id)?;
        for branch in &self.branches {
            self.require_version(&branch.head_version_id)?;
        }
        for tag in &self.tags {
            self.require_version(&tag.version_id)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Versions
    // -----------------------------------------------------------------------

    /// Append a new version to the active branch and make it current.
    pub fn save_version(
        &mut self,
        state: ProjectState,
        notes: Option<String>,
    ) -> Result<VersionId, ProjectError> {
        state.validate()?;
        let branch_idx = self.branch_index(&self.current_branch_id)?;

        let version = Version::new(state, self.current_branch_id.clone(), notes);
        let id = version.id.clone();
        self.push_version(branch_idx, version);

        info!(version = %id, branch = %self.branches[branch_idx].name, "version saved");
        Ok(id)
    }

    /// Append `version` and advance the head of the branch at `branch_idx`.
    fn push_version(&mut self, branch_idx: usize, version: Version) {
        let id = version.id.clone();
        let now = version.timestamp;
        self.versions.push(Arc::new(version));
        let branch = &mut self.branches[branch_idx];
        branch.head_version_id = id.clone();
        branch.last_updated = now;
        self.current_version_id = id;
        self.last_updated = now;
    }

    pub fn version(&self, id: &VersionId) -> Option<&Version> {
        self.versions.iter().find(|v| &v.id == id).map(Arc::as_ref)
    }

    /// All versions in creation order.
    pub fn versions(&self) -> &[Arc<Version>] {
        &self.versions
    }

    /// Versions created on `branch_id`, oldest first.
    pub fn versions_on_branch(&self, branch_id: &BranchId) -> Vec<&Version> {
        self.versions
            .iter()
            .filter(|v| &v.branch_id == branch_id)
            .map(Arc::as_ref)
            .collect()
    }

    pub fn current_version_id(&self) -> &VersionId {
        &self.current_version_id
    }

    pub fn current_version(&self) -> Result<&Version, ProjectError> {
        self.require_version(&self.current_version_id)
    }

    /// Make `id` the current version. The active branch follows the
    /// version's branch when that branch still exists.
    pub fn checkout_version(&mut self, id: &VersionId) -> Result<(), ProjectError> {
        let version = self.require_version(id)?;
        let branch_id = version.branch_id.clone();

        if self.branch(&branch_id).is_some() {
            self.current_branch_id = branch_id;
        }
        self.current_version_id = id.clone();
        info!(version = %id, "version checked out");
        Ok(())
    }

    /// Delete a version. The current version, any branch head and any
    /// tagged version are kept.
    pub fn delete_version(&mut self, id: &VersionId) -> Result<(), ProjectError> {
        let idx = self
            .versions
            .iter()
            .position(|v| &v.id == id)
            .ok_or_else(|| ProjectError::VersionNotFound(id.to_string()))?;

        if id == &self.current_version_id {
            return Err(ProjectError::CurrentVersion(id.to_string()));
        }
        if let Some(branch) = self.branches.iter().find(|b| &b.head_version_id == id) {
            return Err(ProjectError::BranchHead {
                version: id.to_string(),
                branch: branch.name.clone(),
            });
        }
        if let Some(tag) = self.tags.iter().find(|t| &t.version_id == id) {
            return Err(ProjectError::VersionTagged {
                version: id.to_string(),
                tag: tag.name.clone(),
            });
        }

        self.versions.remove(idx);
        self.last_updated = Utc::now();
        info!(version = %id, "version deleted");
        Ok(())
    }

    /// Attach, replace or clear a version's notes.
    pub fn set_version_notes(
        &mut self,
        id: &VersionId,
        notes: Option<String>,
    ) -> Result<(), ProjectError> {
        let version = self
            .versions
            .iter_mut()
            .find(|v| &v.id == id)
            .ok_or_else(|| ProjectError::VersionNotFound(id.to_string()))?;
        Arc::make_mut(version).notes = notes;
        self.last_updated = Utc::now();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lookup helpers
    // -----------------------------------------------------------------------

    fn require_version(&self, id: &VersionId) -> Result<&Version, ProjectError> {
        self.version(id)
            .ok_or_else(|| ProjectError::VersionNotFound(id.to_string()))
    }

    fn require_branch(&self, id: &BranchId) -> Result<&Branch, ProjectError> {
        self.branch(id)
            .ok_or_else(|| ProjectError::BranchNotFound(id.to_string()))
    }

    fn branch_index(&self, id: &BranchId) -> Result<usize, ProjectError> {
        self.branches
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| ProjectError::BranchNotFound(id.to_string()))
    }
}

/// Trim `name`, rejecting blank names.
fn checked_name(entity: &str, name: &str) -> Result<String, ProjectError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ProjectError::EmptyName {
            entity: entity.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TreeError;
    use crate::tree::TreeNode;

    pub(crate) fn sample_project() -> Project {
        Project::new("atlas", ProjectState::named("atlas"), &ProjectSettings::default()).unwrap()
    }

    #[test]
    fn test_new_project_has_default_branch_and_initial_version() {
        let project = sample_project();
        assert_eq!(project.versions().len(), 1);
        assert_eq!(project.branches().len(), 1);

        let branch = project.current_branch().unwrap();
        assert!(branch.is_default);
        assert_eq!(branch.name, "main");
        assert_eq!(branch.color, "#3b82f6");
        assert_eq!(&branch.head_version_id, project.current_version_id());
        assert_eq!(project.current_version().unwrap().project_state.name, "atlas");
        project.check_integrity().unwrap();
    }

    #[test]
    fn test_new_project_rejects_bad_input() {
        let err = Project::new("  ", ProjectState::default(), &ProjectSettings::default()).unwrap_err();
        assert!(matches!(err, ProjectError::EmptyName { .. }));

        let mut state = ProjectState::named("p");
        state.file_tree = Some(TreeNode::directory(
            "root",
            vec![TreeNode::file("a", ""), TreeNode::file("a", "")],
        ));
        let err = Project::new("p", state, &ProjectSettings::default()).unwrap_err();
        assert!(matches!(
            err,
            ProjectError::Tree(TreeError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_save_version_advances_head() {
        let mut project = sample_project();
        let id = project
            .save_version(ProjectState::named("atlas v2"), Some("second".into()))
            .unwrap();

        assert_eq!(project.versions().len(), 2);
        assert_eq!(project.current_version_id(), &id);
        assert_eq!(project.current_branch().unwrap().head_version_id, id);
        assert_eq!(project.version(&id).unwrap().notes.as_deref(), Some("second"));
    }

    #[test]
    fn test_checkout_version_follows_branch() {
        let mut project = sample_project();
        let first = project.current_version_id().clone();
        let feature = project
            .create_branch("feature", &first, "", true)
            .unwrap();
        let on_feature = project.save_version(ProjectState::named("f"), None).unwrap();

        project.checkout_version(&first).unwrap();
        assert_eq!(project.current_version_id(), &first);
        assert!(project.current_branch().unwrap().is_default);

        project.checkout_version(&on_feature).unwrap();
        assert_eq!(project.current_branch().unwrap().id, feature);

        let missing = VersionId::from("nope");
        assert!(matches!(
            project.checkout_version(&missing),
            Err(ProjectError::VersionNotFound(_))
        ));
    }

    #[test]
    fn test_delete_version_guards() {
        let mut project = sample_project();
        let first = project.current_version_id().clone();
        let middle = project.save_version(ProjectState::named("m"), None).unwrap();
        let head = project.save_version(ProjectState::named("h"), None).unwrap();

        assert!(matches!(
            project.delete_version(&head),
            Err(ProjectError::CurrentVersion(_))
        ));

        project.checkout_version(&first).unwrap();
        assert!(matches!(
            project.delete_version(&head),
            Err(ProjectError::BranchHead { .. })
        ));

        project
            .create_tag(NewTag::new("v0", middle.clone()))
            .unwrap();
        assert!(matches!(
            project.delete_version(&middle),
            Err(ProjectError::VersionTagged { .. })
        ));
        assert_eq!(project.versions().len(), 3);

        let tag = project.tag_by_name("v0").unwrap().id.clone();
        project.delete_tag(&tag).unwrap();
        project.delete_version(&middle).unwrap();
        assert_eq!(project.versions().len(), 2);
        assert!(project.version(&middle).is_none());
    }

    #[test]
    fn test_set_notes_does_not_touch_clones() {
        let mut project = sample_project();
        let id = project.current_version_id().clone();
        let snapshot = project.clone();

        project
            .set_version_notes(&id, Some("annotated".into()))
            .unwrap();
        assert_eq!(project.version(&id).unwrap().notes.as_deref(), Some("annotated"));
        assert_eq!(
            snapshot.version(&id).unwrap().notes.as_deref(),
            Some("Initial version")
        );
    }

    #[test]
    fn test_project_json_round_trip() {
        let mut project = sample_project();
        project.save_version(ProjectState::named("two"), None).unwrap();
        let json = serde_json::to_string(&project).unwrap();
        let back: Project = serde_json::from_str(&json).unwrap();
        assert_eq!(back, project);
        back.check_integrity().unwrap();
    }
}
