//! `projvault project` subcommands.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing::info;

use projvault_core::models::ProjectState;
use projvault_core::project::Project;

use super::version::StateArgs;
use super::{short_id, Session};
use crate::style;

#[derive(Subcommand, Debug)]
pub enum ProjectAction {
    /// Create a project and make it active.
    Create {
        /// Project name (must be unique).
        name: String,

        #[command(flatten)]
        edit: StateArgs,
    },

    /// List stored projects.
    List,

    /// Select the project other commands operate on.
    Use {
        /// Project name.
        name: String,
    },

    /// Summarise the active project.
    Show,

    /// Delete a project and all of its history.
    Delete {
        /// Project name.
        name: String,
    },
}

pub fn run(session: &Session, action: ProjectAction) -> Result<()> {
    match action {
        ProjectAction::Create { name, edit } => {
            if session
                .db
                .find_project_by_name(&name)
                .context("failed to look up project")?
                .is_some()
            {
                anyhow::bail!("a project named '{}' already exists", name);
            }

            let state = edit.apply(ProjectState::named(name.clone()))?;
            let project = Project::new(&name, state, &session.config.branches.settings())
                .context("failed to create project")?;
            session.commit(&project, "project_created", Some(&project.name))?;
            session.set_active(&project.id)?;

            info!(project = %project.id, name = %project.name, "created project");
            println!(
                "{}",
                style::success(&format!(
                    "Created project '{}' on branch {}",
                    project.name,
                    project.current_branch()?.name
                ))
            );
        }

        ProjectAction::List => {
            let projects = session.db.list_projects().context("failed to list projects")?;
            if projects.is_empty() {
                println!("No projects found.");
                return Ok(());
            }
            let active = session.active_project_id()?;

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["", "ID", "NAME", "CREATED", "UPDATED"]);
            for p in &projects {
                let is_active = active.as_ref().is_some_and(|a| a.as_str() == p.id);
                table.add_row(vec![
                    Cell::new(style::current_marker(is_active)),
                    Cell::new(short_id(&p.id)),
                    Cell::new(&p.name),
                    Cell::new(&p.created_at),
                    Cell::new(&p.updated_at),
                ]);
            }
            println!("{table}");
        }

        ProjectAction::Use { name } => {
            let project = session
                .db
                .find_project_by_name(&name)
                .context("failed to look up project")?
                .ok_or_else(|| anyhow::anyhow!("project '{}' not found", name))?;
            session.set_active(&project.id)?;
            println!(
                "{}",
                style::success(&format!("Now using project '{}'", project.name))
            );
        }

        ProjectAction::Show => {
            let project = session.active_project()?;
            let current = project.current_version()?;
            let pending = session
                .db
                .load_pending_merge(&project.id)
                .context("failed to read pending merge")?;

            println!("{}", style::header(&format!("Project {}", project.name)));
            println!();
            println!("  ID              : {}", project.id);
            println!("  Created         : {}", project.created_at.to_rfc3339());
            println!("  Last updated    : {}", project.last_updated.to_rfc3339());
            println!("  Current branch  : {}", project.current_branch()?.name);
            println!("  Current version : {}", current.id);
            println!("  Versions        : {}", project.versions().len());
            println!("  Branches        : {}", project.branches().len());
            println!("  Tags            : {}", project.tags().len());
            println!(
                "  Pending merge   : {}",
                match &pending {
                    Some(result) if result.is_clean() => "clean".to_string(),
                    Some(result) => format!("{} conflict(s)", result.conflicts.len()),
                    None => style::dim("none"),
                }
            );
        }

        ProjectAction::Delete { name } => {
            let project = session
                .db
                .find_project_by_name(&name)
                .context("failed to look up project")?
                .ok_or_else(|| anyhow::anyhow!("project '{}' not found", name))?;
            if !session.confirm(&format!(
                "Delete project '{}' and its {} version(s)?",
                project.name,
                project.versions().len()
            ))? {
                println!("{}", style::warn("Delete cancelled."));
                return Ok(());
            }

            session
                .db
                .delete_project(&project.id)
                .context("failed to delete project")?;
            if session.active_project_id()?.as_ref() == Some(&project.id) {
                session.clear_active()?;
            }
            session
                .db
                .insert_audit_log(
                    "project_deleted",
                    Some(project.id.as_str()),
                    Some(&project.name),
                )
                .context("failed to write audit log")?;
            println!(
                "{}",
                style::success(&format!("Deleted project '{}'", project.name))
            );
        }
    }

    Ok(())
}
