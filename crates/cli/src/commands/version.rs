//! `projvault version` subcommands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing::info;

use projvault_core::models::{ProjectState, ScalarField};
use projvault_core::tree::TreeNode;

use super::{resolve_branch, resolve_version, short_id, split_assignment, truncate, Session};
use crate::style;

#[derive(Subcommand, Debug)]
pub enum VersionAction {
    /// Save a new version on the active branch.
    Save {
        /// Notes describing the change.
        #[arg(short, long)]
        notes: Option<String>,

        #[command(flatten)]
        edit: StateArgs,
    },

    /// List versions, newest first.
    List {
        /// Only versions on this branch.
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Show one version's state.
    Show {
        /// Version reference (id, id prefix, tag, branch or HEAD).
        #[arg(default_value = "HEAD")]
        version: String,

        /// Print the state as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Make a version current.
    Checkout {
        /// Version reference.
        version: String,
    },

    /// Delete a version.
    Delete {
        /// Version reference.
        version: String,
    },

    /// Replace a version's notes.
    Notes {
        /// Version reference.
        version: String,

        /// New notes; omit to clear them.
        notes: Option<String>,
    },
}

/// Edits applied on top of a base state.
#[derive(Args, Debug, Default)]
pub struct StateArgs {
    /// Replace the whole state with a JSON file before other edits.
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Set a field: name, description, type, framework, teamSize, goals.
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    pub sets: Vec<String>,

    /// Add a language.
    #[arg(long = "add-language", value_name = "LANG")]
    pub add_languages: Vec<String>,

    /// Remove a language.
    #[arg(long = "remove-language", value_name = "LANG")]
    pub remove_languages: Vec<String>,

    /// Write a local file into the tree, e.g. `app/src/main.rs=./main.rs`.
    #[arg(long = "put", value_name = "TREE_PATH=FILE")]
    pub puts: Vec<String>,

    /// Remove a tree entry, e.g. `app/docs`.
    #[arg(long = "remove-path", value_name = "TREE_PATH")]
    pub removals: Vec<String>,
}

impl StateArgs {
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
            && self.sets.is_empty()
            && self.add_languages.is_empty()
            && self.remove_languages.is_empty()
            && self.puts.is_empty()
            && self.removals.is_empty()
    }

    /// Apply every edit to `base`.
    pub fn apply(&self, base: ProjectState) -> Result<ProjectState> {
        let mut state = match &self.state {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("invalid project state in {}", path.display()))?
            }
            None => base,
        };

        for assignment in &self.sets {
            let (field, value) = split_assignment(assignment)?;
            let field: ScalarField = field.parse().map_err(anyhow::Error::msg)?;
            field.set(&mut state, value.to_string());
        }
        state.languages.extend(self.add_languages.iter().cloned());
        for lang in &self.remove_languages {
            state.languages.remove(lang);
        }

        for put in &self.puts {
            let (tree_path, local) = split_assignment(put)?;
            let content = std::fs::read_to_string(local)
                .with_context(|| format!("failed to read {}", local))?;
            let segments = tree_segments(tree_path)?;
            put_file(&mut state, &segments, content)?;
        }
        for removal in &self.removals {
            let segments = tree_segments(removal)?;
            let root = state
                .file_tree
                .as_mut()
                .ok_or_else(|| anyhow::anyhow!("project has no file tree"))?;
            if segments.len() == 1 && root.name == segments[0] {
                state.file_tree = None;
            } else if root.remove_at(&segments).is_none() {
                anyhow::bail!("tree path '{}' does not exist", removal);
            }
        }

        Ok(state)
    }
}

fn tree_segments(path: &str) -> Result<Vec<String>> {
    let segments: Vec<String> = path
        .trim_matches('/')
        .split('/')
        .map(str::to_string)
        .collect();
    if segments.iter().any(String::is_empty) {
        anyhow::bail!("invalid tree path '{}'", path);
    }
    Ok(segments)
}

/// Write a file at `segments`, creating the root directory when the state
/// has no tree yet.
fn put_file(state: &mut ProjectState, segments: &[String], content: String) -> Result<()> {
    let Some(name) = segments.last() else {
        anyhow::bail!("empty tree path");
    };
    if segments.len() < 2 {
        anyhow::bail!("tree path '{}' must name a file below the root", name);
    }
    let root = state
        .file_tree
        .get_or_insert_with(|| TreeNode::directory(segments[0].clone(), Vec::new()));
    if root.name != segments[0] {
        anyhow::bail!(
            "tree path must start with the root '{}', got '{}'",
            root.name,
            segments[0]
        );
    }
    if !root.replace_at(segments, TreeNode::file(name.clone(), content)) {
        anyhow::bail!("'{}' passes through a file", segments.join("/"));
    }
    Ok(())
}

pub fn run(session: &Session, action: VersionAction) -> Result<()> {
    let mut project = session.active_project()?;

    match action {
        VersionAction::Save { notes, edit } => {
            if edit.is_empty() {
                anyhow::bail!("nothing to save; pass --state, --set, --put or a language edit");
            }
            let base = project.current_version()?.project_state.clone();
            let state = edit.apply(base)?;
            let id = project
                .save_version(state, notes)
                .context("failed to save version")?;
            let branch = project.current_branch()?.name.clone();
            session.commit(&project, "version_saved", Some(id.as_str()))?;
            info!(version = %id, branch = %branch, "saved version");
            println!(
                "{}",
                style::success(&format!("Saved version {} on {}", short_id(id.as_str()), branch))
            );
        }

        VersionAction::List { branch } => {
            let filter = branch
                .map(|b| resolve_branch(&project, &b))
                .transpose()?;
            let current = project.current_version_id().clone();

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["", "ID", "BRANCH", "CREATED", "TAGS", "NOTES"]);

            let mut shown = 0;
            for version in project.versions().iter().rev() {
                if filter.as_ref().is_some_and(|b| &version.branch_id != b) {
                    continue;
                }
                let branch_name = project
                    .branch(&version.branch_id)
                    .map(|b| b.name.as_str())
                    .unwrap_or("(deleted)");
                let tags: Vec<&str> = project
                    .tags_for_version(&version.id)
                    .iter()
                    .map(|t| t.name.as_str())
                    .collect();
                table.add_row(vec![
                    Cell::new(style::current_marker(version.id == current)),
                    Cell::new(short_id(version.id.as_str())),
                    Cell::new(branch_name),
                    Cell::new(version.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
                    Cell::new(tags.join(", ")),
                    Cell::new(truncate(version.notes.as_deref().unwrap_or(""), 40)),
                ]);
                shown += 1;
            }

            println!("{table}");
            println!("{} version(s) shown", shown);
        }

        VersionAction::Show { version, json } => {
            let id = resolve_version(&project, &version)?;
            let version = project
                .version(&id)
                .ok_or_else(|| anyhow::anyhow!("version '{}' not found", id))?;
            if json {
                let rendered = serde_json::to_string_pretty(&version.project_state)
                    .context("failed to render state")?;
                println!("{}", rendered);
                return Ok(());
            }

            let state = &version.project_state;
            println!("{}", style::header(&format!("Version {}", version.id)));
            println!();
            println!("  Created     : {}", version.timestamp.to_rfc3339());
            println!(
                "  Branch      : {}",
                project
                    .branch(&version.branch_id)
                    .map(|b| b.name.as_str())
                    .unwrap_or("(deleted)")
            );
            println!("  Notes       : {}", version.notes.as_deref().unwrap_or("-"));
            println!();
            for field in ScalarField::ALL {
                println!("  {:<12}: {}", field.as_str(), field.get(state));
            }
            let langs: Vec<&str> = state.languages.iter().map(String::as_str).collect();
            println!("  {:<12}: {}", "languages", langs.join(", "));
            match &state.file_tree {
                Some(root) => {
                    println!("  {:<12}: {} ({} files)", "fileTree", root.name, root.file_count())
                }
                None => println!("  {:<12}: -", "fileTree"),
            }
        }

        VersionAction::Checkout { version } => {
            let id = resolve_version(&project, &version)?;
            project
                .checkout_version(&id)
                .context("failed to check out version")?;
            let branch = project.current_branch()?.name.clone();
            session.commit(&project, "version_checked_out", Some(id.as_str()))?;
            println!(
                "{}",
                style::success(&format!("Checked out {} on {}", short_id(id.as_str()), branch))
            );
        }

        VersionAction::Delete { version } => {
            let id = resolve_version(&project, &version)?;
            if !session.confirm(&format!("Delete version {}?", short_id(id.as_str())))? {
                println!("{}", style::warn("Delete cancelled."));
                return Ok(());
            }
            project
                .delete_version(&id)
                .context("failed to delete version")?;
            session.commit(&project, "version_deleted", Some(id.as_str()))?;
            println!(
                "{}",
                style::success(&format!("Deleted version {}", short_id(id.as_str())))
            );
        }

        VersionAction::Notes { version, notes } => {
            let id = resolve_version(&project, &version)?;
            project
                .set_version_notes(&id, notes)
                .context("failed to update notes")?;
            session.commit(&project, "version_notes_updated", Some(id.as_str()))?;
            println!("{}", style::success("Notes updated"));
        }
    }

    Ok(())
}
