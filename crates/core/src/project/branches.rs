//! Branch index operations.

use chrono::Utc;
use tracing::info;

use super::{checked_name, Project};
use crate::errors::ProjectError;
use crate::models::{Branch, BranchId, VersionId};

impl Project {
    /// Fork a new branch at `source`. Its head starts at the source version.
    pub fn create_branch(
        &mut self,
        name: &str,
        source: &VersionId,
        description: &str,
        switch_to: bool,
    ) -> Result<BranchId, ProjectError> {
        let name = checked_name("branch", name)?;
        if self.branch_by_name(&name).is_some() {
            return Err(ProjectError::DuplicateBranchName(name));
        }
        self.require_version(source)?;

        let now = Utc::now();
        let branch = Branch {
            id: BranchId::new(),
            name,
            description: description.trim().to_string(),
            created_at: now,
            last_updated: now,
            source_version_id: source.clone(),
            head_version_id: source.clone(),
            is_default: false,
            color: self.colors.allocate(),
        };
        let id = branch.id.clone();
        info!(branch = %branch.name, source = %source, color = %branch.color, "branch created");
        self.branches.push(branch);

        if switch_to {
            self.current_branch_id = id.clone();
            self.current_version_id = source.clone();
        }
        self.last_updated = now;
        Ok(id)
    }

    /// Activate a branch and check out its head.
    pub fn switch_branch(&mut self, id: &BranchId) -> Result<(), ProjectError> {
        let branch = self.require_branch(id)?;
        let head = branch.head_version_id.clone();
        self.require_version(&head)?;

        info!(branch = %branch.name, head = %head, "switched branch");
        self.current_branch_id = id.clone();
        self.current_version_id = head;
        Ok(())
    }

    pub fn rename_branch(&mut self, id: &BranchId, name: &str) -> Result<(), ProjectError> {
        let name = checked_name("branch", name)?;
        let idx = self.branch_index(id)?;
        if self.branches.iter().any(|b| &b.id != id && b.name == name) {
            return Err(ProjectError::DuplicateBranchName(name));
        }

        let now = Utc::now();
        let branch = &mut self.branches[idx];
        info!(from = %branch.name, to = %name, "branch renamed");
        branch.name = name;
        branch.last_updated = now;
        self.last_updated = now;
        Ok(())
    }

    /// Delete a branch. Its versions stay in the store and its colour goes
    /// back to the palette.
    pub fn delete_branch(&mut self, id: &BranchId) -> Result<(), ProjectError> {
        let idx = self.branch_index(id)?;
        let branch = &self.branches[idx];
        if branch.is_default {
            return Err(ProjectError::DefaultBranchProtected(branch.name.clone()));
        }
        if id == &self.current_branch_id {
            return Err(ProjectError::ActiveBranch(branch.name.clone()));
        }

        let branch = self.branches.remove(idx);
        self.colors.release(&branch.color);
        self.last_updated = Utc::now();
        info!(branch = %branch.name, "branch deleted");
        Ok(())
    }

    pub fn branch(&self, id: &BranchId) -> Option<&Branch> {
        self.branches.iter().find(|b| &b.id == id)
    }

    pub fn branch_by_name(&self, name: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.name == name)
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn current_branch_id(&self) -> &BranchId {
        &self.current_branch_id
    }

    pub fn current_branch(&self) -> Result<&Branch, ProjectError> {
        self.require_branch(&self.current_branch_id)
    }

    /// Branches whose head is `version`.
    pub fn branches_headed_at(&self, version: &VersionId) -> Vec<&Branch> {
        self.branches
            .iter()
            .filter(|b| &b.head_version_id == version)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::ProjectError;
    use crate::models::ProjectState;
    use crate::project::tests::sample_project;

    #[test]
    fn test_create_branch_without_switching() {
        let mut project = sample_project();
        let source = project.current_version_id().clone();
        let id = project
            .create_branch("feature/login", &source, " adds login ", false)
            .unwrap();

        let branch = project.branch(&id).unwrap();
        assert_eq!(branch.head_version_id, source);
        assert_eq!(branch.source_version_id, source);
        assert_eq!(branch.description, "adds login");
        assert!(!branch.is_default);
        assert_eq!(branch.color, "#ef4444");
        assert!(project.current_branch().unwrap().is_default);
    }

    #[test]
    fn test_create_branch_and_switch() {
        let mut project = sample_project();
        let source = project.current_version_id().clone();
        let id = project.create_branch("dev", &source, "", true).unwrap();
        assert_eq!(project.current_branch_id(), &id);

        let saved = project.save_version(ProjectState::named("dev work"), None).unwrap();
        assert_eq!(project.branch(&id).unwrap().head_version_id, saved);
        let main = project.branch_by_name("main").unwrap();
        assert_eq!(main.head_version_id, source);
    }

    #[test]
    fn test_create_branch_rejections() {
        let mut project = sample_project();
        let source = project.current_version_id().clone();
        assert!(matches!(
            project.create_branch("main", &source, "", false),
            Err(ProjectError::DuplicateBranchName(_))
        ));
        assert!(matches!(
            project.create_branch("", &source, "", false),
            Err(ProjectError::EmptyName { .. })
        ));
        assert!(matches!(
            project.create_branch("x", &"missing".into(), "", false),
            Err(ProjectError::VersionNotFound(_))
        ));
        assert_eq!(project.branches().len(), 1);
        // Failed attempts do not consume colours.
        let id = project.create_branch("x", &source, "", false).unwrap();
        assert_eq!(project.branch(&id).unwrap().color, "#ef4444");
    }

    #[test]
    fn test_switch_branch_checks_out_head() {
        let mut project = sample_project();
        let source = project.current_version_id().clone();
        let dev = project.create_branch("dev", &source, "", true).unwrap();
        let dev_head = project.save_version(ProjectState::named("d"), None).unwrap();

        let main = project.branch_by_name("main").unwrap().id.clone();
        project.switch_branch(&main).unwrap();
        assert_eq!(project.current_version_id(), &source);

        project.switch_branch(&dev).unwrap();
        assert_eq!(project.current_version_id(), &dev_head);
    }

    #[test]
    fn test_rename_branch() {
        let mut project = sample_project();
        let source = project.current_version_id().clone();
        let id = project.create_branch("dev", &source, "", false).unwrap();

        project.rename_branch(&id, "develop").unwrap();
        assert_eq!(project.branch(&id).unwrap().name, "develop");
        // Renaming to its own name is allowed.
        project.rename_branch(&id, "develop").unwrap();
        assert!(matches!(
            project.rename_branch(&id, "main"),
            Err(ProjectError::DuplicateBranchName(_))
        ));
    }

    #[test]
    fn test_delete_branch_keeps_versions() {
        let mut project = sample_project();
        let source = project.current_version_id().clone();
        let dev = project.create_branch("dev", &source, "", true).unwrap();
        let on_dev = project.save_version(ProjectState::named("d"), None).unwrap();

        assert!(matches!(
            project.delete_branch(&dev),
            Err(ProjectError::ActiveBranch(_))
        ));

        let main = project.branch_by_name("main").unwrap().id.clone();
        assert!(matches!(
            project.delete_branch(&main),
            Err(ProjectError::DefaultBranchProtected(_))
        ));

        project.switch_branch(&main).unwrap();
        project.delete_branch(&dev).unwrap();
        assert!(project.branch(&dev).is_none());
        assert_eq!(project.version(&on_dev).unwrap().branch_id, dev);
        assert_eq!(project.versions().len(), 2);

        // The colour is free again.
        let next = project.create_branch("next", &source, "", false).unwrap();
        assert_eq!(project.branch(&next).unwrap().color, "#ef4444");
    }

    #[test]
    fn test_checkout_version_of_deleted_branch_keeps_active_branch() {
        let mut project = sample_project();
        let source = project.current_version_id().clone();
        let dev = project.create_branch("dev", &source, "", true).unwrap();
        let on_dev = project.save_version(ProjectState::named("d"), None).unwrap();
        let main = project.branch_by_name("main").unwrap().id.clone();
        project.switch_branch(&main).unwrap();
        project.delete_branch(&dev).unwrap();

        project.checkout_version(&on_dev).unwrap();
        assert_eq!(project.current_branch_id(), &main);
        assert_eq!(project.current_version_id(), &on_dev);
    }
}
