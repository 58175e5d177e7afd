//! Subcommands that operate on stored projects.
//!
//! Every command loads the active project from the database, applies one
//! operation to it, and writes it back together with an audit entry.

pub mod branch;
pub mod merge;
pub mod project;
pub mod tag;
pub mod version;

use anyhow::{Context, Result};
use dialoguer::Confirm;

use projvault_core::config::AppConfig;
use projvault_core::db::Database;
use projvault_core::models::{BranchId, ProjectId, TagId, VersionId};
use projvault_core::project::Project;

pub use branch::BranchAction;
pub use merge::MergeAction;
pub use project::ProjectAction;
pub use tag::TagAction;
pub use version::VersionAction;

/// `kv_state` key holding the id of the selected project.
const ACTIVE_PROJECT_KEY: &str = "active_project";

/// Shortest id prefix accepted in place of a full id.
const MIN_PREFIX_LEN: usize = 4;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Loaded configuration and open database shared by all subcommands.
pub struct Session {
    pub config: AppConfig,
    pub db: Database,
    assume_yes: bool,
}

impl Session {
    pub fn new(config: AppConfig, db: Database, assume_yes: bool) -> Self {
        Self {
            config,
            db,
            assume_yes,
        }
    }

    /// Load the selected project and check its references.
    pub fn active_project(&self) -> Result<Project> {
        let id = self
            .db
            .get_state(ACTIVE_PROJECT_KEY)
            .context("failed to read active project")?
            .ok_or_else(|| {
                anyhow::anyhow!("no active project; run `projvault project use <name>` first")
            })?;
        let project = self
            .db
            .load_project(&ProjectId::from(id))
            .context("failed to load active project")?;
        project
            .check_integrity()
            .context("stored project is inconsistent")?;
        Ok(project)
    }

    pub fn set_active(&self, id: &ProjectId) -> Result<()> {
        self.db
            .set_state(ACTIVE_PROJECT_KEY, id.as_str())
            .context("failed to store active project")
    }

    pub fn clear_active(&self) -> Result<()> {
        self.db
            .delete_state(ACTIVE_PROJECT_KEY)
            .context("failed to clear active project")
    }

    pub fn active_project_id(&self) -> Result<Option<ProjectId>> {
        Ok(self
            .db
            .get_state(ACTIVE_PROJECT_KEY)
            .context("failed to read active project")?
            .map(ProjectId::from))
    }

    /// Persist `project` and record `action` in the audit log.
    pub fn commit(&self, project: &Project, action: &str, details: Option<&str>) -> Result<()> {
        self.db
            .commit_project(project, action, details)
            .with_context(|| format!("failed to save project '{}'", project.name))
    }

    /// Ask before a destructive operation; `--yes` skips the prompt.
    pub fn confirm(&self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("failed to read confirmation")
    }
}

// ---------------------------------------------------------------------------
// Reference resolution
// ---------------------------------------------------------------------------

/// Resolve a version reference: `HEAD`, a full id, a tag name, a branch name
/// (its head), or a unique id prefix.
pub fn resolve_version(project: &Project, reference: &str) -> Result<VersionId> {
    if reference.eq_ignore_ascii_case("head") {
        return Ok(project.current_version_id().clone());
    }
    let exact = VersionId::from(reference);
    if project.version(&exact).is_some() {
        return Ok(exact);
    }
    if let Some(tag) = project.tag_by_name(reference) {
        return Ok(tag.version_id.clone());
    }
    if let Some(branch) = project.branch_by_name(reference) {
        return Ok(branch.head_version_id.clone());
    }
    let ids = project.versions().iter().map(|v| v.id.as_str());
    unique_prefix("version", reference, ids).map(VersionId::from)
}

/// Resolve a branch by name, full id or unique id prefix.
pub fn resolve_branch(project: &Project, reference: &str) -> Result<BranchId> {
    if let Some(branch) = project.branch_by_name(reference) {
        return Ok(branch.id.clone());
    }
    let ids = project.branches().iter().map(|b| b.id.as_str());
    unique_prefix("branch", reference, ids).map(BranchId::from)
}

/// Resolve a tag by name, full id or unique id prefix.
pub fn resolve_tag(project: &Project, reference: &str) -> Result<TagId> {
    if let Some(tag) = project.tag_by_name(reference) {
        return Ok(tag.id.clone());
    }
    let ids = project.tags().iter().map(|t| t.id.as_str());
    unique_prefix("tag", reference, ids).map(TagId::from)
}

fn unique_prefix<'a>(
    entity: &str,
    reference: &str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<String> {
    let matches: Vec<&str> = ids.filter(|id| id.starts_with(reference)).collect();
    match matches.as_slice() {
        [id] if *id == reference || reference.len() >= MIN_PREFIX_LEN => Ok(id.to_string()),
        [] | [_] => anyhow::bail!("{} '{}' not found", entity, reference),
        _ => anyhow::bail!(
            "{} reference '{}' is ambiguous ({} matches)",
            entity,
            reference,
            matches.len()
        ),
    }
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

/// First eight characters of an id, for tables.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Split a `key=value` argument.
pub fn split_assignment(arg: &str) -> Result<(&str, &str)> {
    arg.split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected KEY=VALUE, got '{}'", arg))
}

#[cfg(test)]
mod tests {
    use super::*;

    use projvault_core::models::ProjectState;
    use projvault_core::project::NewTag;

    fn project() -> Project {
        Project::new("demo", ProjectState::named("demo"), &Default::default()).unwrap()
    }

    #[test]
    fn test_resolve_version_by_head_tag_branch_and_prefix() {
        let mut project = project();
        let first = project.current_version_id().clone();
        let second = project
            .save_version(ProjectState::named("demo 2"), None)
            .unwrap();
        project
            .create_tag(NewTag::new("v1", first.clone()))
            .unwrap();

        assert_eq!(resolve_version(&project, "HEAD").unwrap(), second);
        assert_eq!(resolve_version(&project, "v1").unwrap(), first);
        assert_eq!(resolve_version(&project, "main").unwrap(), second);
        assert_eq!(resolve_version(&project, first.as_str()).unwrap(), first);
        assert_eq!(
            resolve_version(&project, &first.as_str()[..8]).unwrap(),
            first
        );
        assert!(resolve_version(&project, "nope").is_err());
    }

    #[test]
    fn test_short_prefix_is_rejected() {
        let project = project();
        let id = project.current_version_id().as_str().to_string();
        assert!(resolve_version(&project, &id[..2]).is_err());
    }

    #[test]
    fn test_resolve_branch_by_name() {
        let project = project();
        let main = resolve_branch(&project, "main").unwrap();
        assert_eq!(&main, project.current_branch_id());
    }

    #[test]
    fn test_truncate_and_split() {
        assert_eq!(truncate("abcdef", 10), "abcdef");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(split_assignment("a=b=c").unwrap(), ("a", "b=c"));
        assert!(split_assignment("nothing").is_err());
    }
}
