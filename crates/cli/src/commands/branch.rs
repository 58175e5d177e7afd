//! `projvault branch` subcommands.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use console::Style;

use super::{resolve_branch, resolve_version, short_id, Session};
use crate::style;

#[derive(Subcommand, Debug)]
pub enum BranchAction {
    /// Fork a branch from a version.
    Create {
        /// Branch name.
        name: String,

        /// Version to fork from (defaults to the current version).
        #[arg(short, long, default_value = "HEAD")]
        from: String,

        /// Free-form description.
        #[arg(short, long, default_value = "")]
        description: String,

        /// Stay on the current branch instead of switching.
        #[arg(long)]
        no_switch: bool,
    },

    /// List branches.
    List,

    /// Switch to a branch and check out its head.
    Switch {
        /// Branch name or id.
        branch: String,
    },

    /// Rename a branch.
    Rename {
        /// Branch name or id.
        branch: String,

        /// New name.
        new_name: String,
    },

    /// Delete a branch. Its versions are kept.
    Delete {
        /// Branch name or id.
        branch: String,
    },
}

pub fn run(session: &Session, action: BranchAction) -> Result<()> {
    let mut project = session.active_project()?;

    match action {
        BranchAction::Create {
            name,
            from,
            description,
            no_switch,
        } => {
            let source = resolve_version(&project, &from)?;
            project
                .create_branch(&name, &source, &description, !no_switch)
                .context("failed to create branch")?;
            session.commit(&project, "branch_created", Some(&name))?;
            println!(
                "{}",
                style::success(&format!(
                    "Created branch {} at {}",
                    name,
                    short_id(source.as_str())
                ))
            );
        }

        BranchAction::List => {
            let current = project.current_branch_id().clone();

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["", "NAME", "HEAD", "VERSIONS", "COLOR", "DESCRIPTION"]);
            for branch in project.branches() {
                let mut name = branch.name.clone();
                if branch.is_default {
                    name.push_str(" (default)");
                }
                table.add_row(vec![
                    Cell::new(style::current_marker(branch.id == current)),
                    Cell::new(name),
                    Cell::new(short_id(branch.head_version_id.as_str())),
                    Cell::new(project.versions_on_branch(&branch.id).len()),
                    Cell::new(swatch(&branch.color)),
                    Cell::new(&branch.description),
                ]);
            }
            println!("{table}");
        }

        BranchAction::Switch { branch } => {
            let id = resolve_branch(&project, &branch)?;
            project
                .switch_branch(&id)
                .context("failed to switch branch")?;
            let name = project.current_branch()?.name.clone();
            session.commit(&project, "branch_switched", Some(&name))?;
            println!("{}", style::success(&format!("Switched to {}", name)));
        }

        BranchAction::Rename { branch, new_name } => {
            let id = resolve_branch(&project, &branch)?;
            project
                .rename_branch(&id, &new_name)
                .context("failed to rename branch")?;
            let details = format!("{} -> {}", branch, new_name);
            session.commit(&project, "branch_renamed", Some(&details))?;
            println!("{}", style::success(&format!("Renamed {}", details)));
        }

        BranchAction::Delete { branch } => {
            let id = resolve_branch(&project, &branch)?;
            if !session.confirm(&format!("Delete branch {}?", branch))? {
                println!("{}", style::warn("Delete cancelled."));
                return Ok(());
            }
            project
                .delete_branch(&id)
                .context("failed to delete branch")?;
            session.commit(&project, "branch_deleted", Some(&branch))?;
            println!("{}", style::success(&format!("Deleted branch {}", branch)));
        }
    }

    Ok(())
}

/// The colour code preceded by a block in the nearest terminal colour.
fn swatch(color: &str) -> String {
    let block = match nearest_ansi(color) {
        Some(code) => Style::new().color256(code).apply_to("■").to_string(),
        None => "■".to_string(),
    };
    format!("{} {}", block, color)
}

/// Map `#rrggbb` onto the 6x6x6 cube of the 256-colour palette.
fn nearest_ansi(color: &str) -> Option<u8> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| {
        u8::from_str_radix(hex.get(i..i + 2)?, 16)
            .ok()
            .map(|v| ((v as u16 * 5 + 127) / 255) as u8)
    };
    Some(16 + 36 * channel(0)? + 6 * channel(2)? + channel(4)?)
}
