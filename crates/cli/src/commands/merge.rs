//! `projvault merge` subcommands.
//!
//! A merge runs in two steps. `preview` analyses the merge and stores the
//! result as the project's pending merge; `apply` resolves the pending
//! merge's conflicts and commits the merged state.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing::{info, warn};

use projvault_core::merge::{
    MergeApplier, MergeEngine, MergePath, MergeResult, MergeValue, Merger, Resolution, Resolutions,
};
use projvault_core::project::{MergeCommit, Project};
use projvault_core::tree::TreeNode;

use super::{resolve_branch, resolve_version, short_id, split_assignment, truncate, Session};
use crate::style;

#[derive(Subcommand, Debug)]
pub enum MergeAction {
    /// Analyse merging a branch or version into the current version.
    Preview {
        /// Merge the head of this branch.
        #[arg(short, long, conflicts_with = "version", required_unless_present = "version")]
        branch: Option<String>,

        /// Merge this version.
        #[arg(short, long)]
        version: Option<String>,

        /// Show content diffs for conflicting files.
        #[arg(long)]
        diff: bool,
    },

    /// Show the pending merge.
    Show {
        /// Show content diffs for conflicting files.
        #[arg(long)]
        diff: bool,

        /// Print the pending result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Resolve the pending merge's conflicts and commit the result.
    Apply {
        /// Choose a side for a conflict: PATH=current|target|ancestor.
        #[arg(short, long = "resolve", value_name = "PATH=SIDE")]
        resolves: Vec<String>,

        /// Supply a value for a conflict. For tree paths VALUE is a local
        /// file whose content is used.
        #[arg(long = "custom", value_name = "PATH=VALUE")]
        customs: Vec<String>,

        /// Take the engine's suggestion for unresolved auto-resolvable
        /// conflicts.
        #[arg(long)]
        accept_suggestions: bool,

        /// Overwrite the current version instead of adding a new one.
        #[arg(long)]
        in_place: bool,

        /// Notes for the merged version.
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Discard the pending merge.
    Abort,
}

pub async fn run(session: &Session, action: MergeAction) -> Result<()> {
    let mut project = session.active_project()?;

    match action {
        MergeAction::Preview {
            branch,
            version,
            diff,
        } => {
            let engine = MergeEngine::new(session.config.merge.options());
            let result = analyse(&project, engine, branch, version).await?;

            session
                .db
                .save_pending_merge(&project.id, &result)
                .context("failed to store pending merge")?;
            session
                .db
                .insert_audit_log(
                    "merge_previewed",
                    Some(project.id.as_str()),
                    Some(result.target_version.as_str()),
                )
                .context("failed to write audit log")?;

            print_result(&project, &result, diff);
        }

        MergeAction::Show { diff, json } => {
            let result = pending(session, &project)?;
            if json {
                let rendered =
                    serde_json::to_string_pretty(&result).context("failed to render merge")?;
                println!("{}", rendered);
            } else {
                print_result(&project, &result, diff);
            }
        }

        MergeAction::Apply {
            resolves,
            customs,
            accept_suggestions,
            in_place,
            notes,
        } => {
            let result = pending(session, &project)?;
            project
                .ensure_merge_is_current(&result)
                .context("run `projvault merge preview` again")?;

            let mut resolutions = parse_resolutions(&resolves, &customs)?;
            if accept_suggestions || session.config.merge.auto_apply_suggestions {
                for (path, resolution) in MergeApplier::suggested_resolutions(&result) {
                    resolutions.entry(path).or_insert(resolution);
                }
            }

            let missing = MergeApplier::missing_resolutions(&result, &resolutions);
            if !missing.is_empty() {
                for path in &missing {
                    println!("{}", style::error(&format!("unresolved: {}", path)));
                }
                anyhow::bail!(
                    "{} conflict(s) need a resolution (use --resolve or --custom)",
                    missing.len()
                );
            }

            let commit = MergeCommit {
                create_new_version: session.config.merge.create_new_version && !in_place,
                notes,
            };
            let merged = project
                .apply_merge(&result, &resolutions, commit)
                .context("failed to apply merge")?;

            session.commit(&project, "merge_applied", Some(result.target_version.as_str()))?;
            session
                .db
                .clear_pending_merge(&project.id)
                .context("failed to clear pending merge")?;

            info!(
                version = %merged,
                conflicts = result.conflicts.len(),
                "merge committed"
            );
            println!(
                "{}",
                style::success(&format!(
                    "Merged {} into {} ({} change(s), {} resolution(s))",
                    short_id(result.target_version.as_str()),
                    short_id(merged.as_str()),
                    result.auto_resolved.len(),
                    resolutions.len()
                ))
            );
        }

        MergeAction::Abort => {
            session
                .db
                .clear_pending_merge(&project.id)
                .context("failed to clear pending merge")?;
            println!("{}", style::success("Pending merge discarded"));
        }
    }

    Ok(())
}

/// Run the analysis off the async runtime; large trees make it CPU bound.
async fn analyse(
    project: &Project,
    engine: MergeEngine,
    branch: Option<String>,
    version: Option<String>,
) -> Result<MergeResult> {
    let snapshot = project.clone();
    let task = match (branch, version) {
        (Some(branch), _) => {
            let id = resolve_branch(project, &branch)?;
            tokio::task::spawn_blocking(move || snapshot.prepare_branch_merge(&engine, &id))
        }
        (None, Some(version)) => {
            let id = resolve_version(project, &version)?;
            tokio::task::spawn_blocking(move || snapshot.prepare_merge(&engine, &id))
        }
        (None, None) => anyhow::bail!("pass --branch or --version"),
    };
    let result = task
        .await
        .context("merge analysis task failed")?
        .context("failed to analyse merge")?;
    if result.is_two_way() {
        warn!("no common ancestor found, every difference needs a decision");
    }
    Ok(result)
}

fn pending(session: &Session, project: &Project) -> Result<MergeResult> {
    session
        .db
        .load_pending_merge(&project.id)
        .context("failed to read pending merge")?
        .ok_or_else(|| anyhow::anyhow!("no pending merge; run `projvault merge preview` first"))
}

/// Build resolutions from `PATH=SIDE` and `PATH=VALUE` arguments.
fn parse_resolutions(resolves: &[String], customs: &[String]) -> Result<Resolutions> {
    let mut resolutions = Resolutions::new();

    for arg in resolves {
        let (path, side) = split_assignment(arg)?;
        let path: MergePath = path.parse()?;
        let resolution: Resolution = side.parse().map_err(anyhow::Error::msg)?;
        resolutions.insert(path, resolution);
    }

    for arg in customs {
        let (path, value) = split_assignment(arg)?;
        let path: MergePath = path.parse()?;
        let value = match &path {
            MergePath::TreeEntry(segments) => {
                let content = std::fs::read_to_string(value)
                    .with_context(|| format!("failed to read {}", value))?;
                let name = segments
                    .last()
                    .ok_or_else(|| anyhow::anyhow!("empty tree path"))?;
                MergeValue::Node(TreeNode::file(name.clone(), content))
            }
            _ => MergeValue::text(value),
        };
        resolutions.insert(path, Resolution::Custom(value));
    }

    Ok(resolutions)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn print_result(project: &Project, result: &MergeResult, diff: bool) {
    let describe = |id: &projvault_core::models::VersionId| {
        let branch = project
            .version(id)
            .and_then(|v| project.branch(&v.branch_id))
            .map(|b| b.name.as_str())
            .unwrap_or("?");
        format!("{} ({})", short_id(id.as_str()), branch)
    };

    println!(
        "{}",
        style::header(&format!(
            "Merge {} into {}",
            describe(&result.target_version),
            describe(&result.current_version)
        ))
    );
    match &result.merge_base {
        Some(base) => println!("  Common ancestor: {}", describe(base)),
        None => println!(
            "{}",
            style::warn("No common ancestor; only scalar fields were compared")
        ),
    }
    println!();

    if !result.auto_resolved.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["PATH", "CHANGE", "FROM", "RESULT"]);
        for change in result.effective_changes() {
            table.add_row(vec![
                Cell::new(change.path.to_string()),
                Cell::new(change.change_type),
                Cell::new(style::source_label(change.source)),
                Cell::new(value_summary(change.final_value.as_ref())),
            ]);
        }
        println!("{}", style::header("Auto-resolved changes"));
        println!("{table}");
        println!();
    }

    if result.is_clean() {
        println!("{}", style::success("No conflicts"));
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "PATH",
        "TYPE",
        "CURRENT",
        "TARGET",
        "CONFIDENCE",
        "SUGGESTED",
        "REASON",
    ]);
    for conflict in &result.conflicts {
        let suggested = match (conflict.auto_resolvable, conflict.suggested_resolution) {
            (true, Some(s)) => s.to_string(),
            (false, Some(s)) => format!("{} (manual)", s),
            (_, None) => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(conflict.path.to_string()),
            Cell::new(style::conflict_label(conflict.conflict_type)),
            Cell::new(value_summary(conflict.current_value.as_ref())),
            Cell::new(value_summary(conflict.target_value.as_ref())),
            Cell::new(style::confidence(conflict.confidence)),
            Cell::new(suggested),
            Cell::new(&conflict.conflict_reason),
        ]);
    }
    println!("{}", style::header("Conflicts"));
    println!("{table}");

    if diff {
        for conflict in &result.conflicts {
            let (Some(current), Some(target)) = (
                file_content(conflict.current_value.as_ref()),
                file_content(conflict.target_value.as_ref()),
            ) else {
                continue;
            };
            println!();
            println!("{}", style::header(&conflict.path.to_string()));
            print!("{}", Merger::content_patch(current, target));
        }
    }

    println!();
    println!(
        "{}",
        style::dim(&format!(
            "{} conflict(s). Resolve with: projvault merge apply --resolve PATH=current|target|ancestor",
            result.conflicts.len()
        ))
    );
}

fn value_summary(value: Option<&MergeValue>) -> String {
    match value {
        None => style::dim("(absent)"),
        Some(MergeValue::Text(s)) if s.is_empty() => style::dim("(empty)"),
        Some(MergeValue::Text(s)) => truncate(s, 30),
        Some(MergeValue::Node(node)) if node.is_file() => {
            format!("file, {} bytes", node.content_str().len())
        }
        Some(MergeValue::Node(node)) => format!("dir, {} files", node.file_count()),
    }
}

fn file_content(value: Option<&MergeValue>) -> Option<&str> {
    value
        .and_then(MergeValue::as_node)
        .filter(|n| n.is_file())
        .map(TreeNode::content_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    use projvault_core::models::ScalarField;

    #[test]
    fn test_parse_resolutions() {
        let resolutions = parse_resolutions(
            &["description=target".into(), "languages/go=ours".into()],
            &["goals=ship it".into()],
        )
        .unwrap();

        assert_eq!(
            resolutions[&MergePath::Field(ScalarField::Description)],
            Resolution::Target
        );
        assert_eq!(
            resolutions[&MergePath::LanguageEntry("go".into())],
            Resolution::Current
        );
        assert_eq!(
            resolutions[&MergePath::Field(ScalarField::Goals)],
            Resolution::Custom(MergeValue::text("ship it"))
        );
    }

    #[test]
    fn test_custom_tree_value_reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("readme");
        std::fs::write(&local, "merged\n").unwrap();

        let resolutions =
            parse_resolutions(&[], &[format!("fileTree/app/README.md={}", local.display())])
                .unwrap();
        let path: MergePath = "fileTree/app/README.md".parse().unwrap();
        assert_eq!(
            resolutions[&path],
            Resolution::Custom(MergeValue::Node(TreeNode::file("README.md", "merged\n")))
        );
    }

    #[test]
    fn test_bad_side_is_rejected() {
        assert!(parse_resolutions(&["description=both".into()], &[]).is_err());
        assert!(parse_resolutions(&["nonsense".into()], &[]).is_err());
    }

    #[test]
    fn test_value_summary() {
        assert_eq!(value_summary(Some(&MergeValue::text("abc"))), "abc");
        assert_eq!(
            value_summary(Some(&MergeValue::Node(TreeNode::file("a", "1234")))),
            "file, 4 bytes"
        );
    }
}
