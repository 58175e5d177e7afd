//! End-to-end tests for the branch / edit / merge / persist workflow.
//!
//! These tests exercise the real project aggregate, merge engine and an
//! on-disk SQLite database configured through a TOML file.

use std::path::Path;

use tempfile::TempDir;

use projvault_core::config::AppConfig;
use projvault_core::db::Database;
use projvault_core::errors::{MergeError, ProjectError};
use projvault_core::merge::{
    ChangeSource, MergeApplier, MergeEngine, MergePath, MergeValue, Resolution, Resolutions,
};
use projvault_core::models::{ProjectState, ScalarField, TagType};
use projvault_core::project::{MergeCommit, NewTag, Project};
use projvault_core::tree::TreeNode;

// ===========================================================================
// Helpers
// ===========================================================================

fn write_config(dir: &Path) -> AppConfig {
    let path = dir.join("config.toml");
    let toml = format!(
        r#"
[storage]
data_dir = "{}"

[merge]
similarity_threshold = 0.8

[branches]
default_name = "main"
"#,
        dir.join("data").display()
    );
    std::fs::write(&path, toml).unwrap();
    AppConfig::load_and_validate(&path).unwrap()
}

fn open_db(config: &AppConfig) -> Database {
    let db = Database::new(config.database_path()).unwrap();
    db.initialize().unwrap();
    db
}

fn tree(readme: &str, main_rs: &str, extra: Option<TreeNode>) -> TreeNode {
    let mut src = vec![TreeNode::file("main.rs", main_rs)];
    src.extend(extra);
    TreeNode::directory(
        "app",
        vec![
            TreeNode::file("README.md", readme),
            TreeNode::directory("src", src),
        ],
    )
}

fn initial_state() -> ProjectState {
    let mut state = ProjectState::named("atlas");
    state.languages.insert("rust".into());
    state.file_tree = Some(tree("intro\n", "fn main() {}\n", None));
    state
}

fn path(s: &str) -> MergePath {
    s.parse().unwrap()
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn test_branch_edit_merge_and_persist() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let db = open_db(&config);
    let engine = MergeEngine::new(config.merge.options());

    let mut project = Project::new("atlas", initial_state(), &config.branches.settings()).unwrap();
    let fork = project.current_version_id().clone();
    db.commit_project(&project, "project_created", None).unwrap();

    // Feature branch: storage layer.
    let feature = project.create_branch("feature/storage", &fork, "", true).unwrap();
    let mut state = initial_state();
    state.description = "with storage".into();
    state.languages.insert("sql".into());
    state.file_tree = Some(tree(
        "intro\nfeature notes\n",
        "fn main() {}\n",
        Some(TreeNode::file("db.rs", "pub fn open() {}\n")),
    ));
    let feature_head = project.save_version(state, Some("storage".into())).unwrap();

    // Main: CLI work.
    let main = project.branch_by_name("main").unwrap().id.clone();
    project.switch_branch(&main).unwrap();
    let mut state = initial_state();
    state.description = "cli tool".into();
    state.file_tree = Some(tree("intro\nmain notes\n", "fn main() { run() }\n", None));
    project.save_version(state, None).unwrap();

    let result = project.prepare_branch_merge(&engine, &feature).unwrap();
    assert_eq!(result.merge_base.as_ref(), Some(&fork));
    assert_eq!(result.target_version, feature_head);

    // Only the description really conflicts.
    assert_eq!(result.conflicts.len(), 1);
    let description = MergePath::Field(ScalarField::Description);
    assert_eq!(
        MergeApplier::missing_resolutions(&result, &Resolutions::new()),
        vec![description.clone()]
    );

    let readme = result.change(&path("fileTree/app/README.md")).unwrap();
    assert_eq!(readme.source, ChangeSource::Both);
    assert_eq!(
        result.change(&path("fileTree/app/src/main.rs")).unwrap().source,
        ChangeSource::Current
    );
    assert_eq!(
        result.change(&path("fileTree/app/src/db.rs")).unwrap().source,
        ChangeSource::Target
    );
    assert_eq!(
        result.change(&path("languages/sql")).unwrap().source,
        ChangeSource::Target
    );

    // Applying without a resolution is refused and changes nothing.
    let before = project.clone();
    let err = project
        .apply_merge(&result, &Resolutions::new(), MergeCommit::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ProjectError::Merge(MergeError::UnresolvedConflicts { .. })
    ));
    assert_eq!(project, before);

    let resolutions = Resolutions::from([(
        description,
        Resolution::Custom(MergeValue::text("cli tool with storage")),
    )]);
    let merged_id = project
        .apply_merge(&result, &resolutions, MergeCommit::default())
        .unwrap();

    let merged = &project.version(&merged_id).unwrap().project_state;
    assert_eq!(merged.description, "cli tool with storage");
    assert!(merged.languages.contains("sql"));
    let root = merged.file_tree.as_ref().unwrap();
    assert_eq!(
        root.child("README.md").unwrap().content_str(),
        "intro\nmain notes\nfeature notes\n"
    );
    let src = root.child("src").unwrap();
    assert_eq!(src.child("main.rs").unwrap().content_str(), "fn main() { run() }\n");
    assert!(src.child("db.rs").is_some());
    assert_eq!(project.current_branch().unwrap().head_version_id, merged_id);

    // Protect the merge with a release tag.
    project
        .create_tag(NewTag {
            tag_type: TagType::Release,
            is_protected: true,
            ..NewTag::new("v1.0.0", merged_id.clone())
        })
        .unwrap();

    // Retire the feature branch; its versions stay.
    project.delete_branch(&feature).unwrap();
    assert!(project.version(&feature_head).is_some());

    db.commit_project(&project, "merge_applied", Some("feature/storage"))
        .unwrap();
    drop(db);

    // Reopen from disk.
    let db = open_db(&config);
    let loaded = db.find_project_by_name("atlas").unwrap().unwrap();
    assert_eq!(loaded, project);
    loaded.check_integrity().unwrap();
    assert_eq!(loaded.tag_by_name("v1.0.0").unwrap().version_id, merged_id);
    assert_eq!(db.list_audit_log(10).unwrap().len(), 2);
}

#[test]
fn test_merge_without_common_ancestor_is_two_way() {
    let mut project =
        Project::new("atlas", ProjectState::named("atlas"), &Default::default()).unwrap();
    let first = project.current_version_id().clone();
    let second = project
        .save_version(ProjectState::named("atlas"), None)
        .unwrap();
    let feature = project.create_branch("rewrite", &second, "", true).unwrap();
    let mut state = ProjectState::named("atlas-next");
    state.framework = "axum".into();
    project.save_version(state, None).unwrap();

    // The very first version is neither the branch's fork point nor preceded
    // by anything.
    project.checkout_version(&first).unwrap();
    let result = project
        .prepare_branch_merge(&MergeEngine::default(), &feature)
        .unwrap();

    assert!(result.is_two_way());
    assert!(result.common_ancestor.is_none());
    assert_eq!(result.conflicts.len(), 2);
    for conflict in &result.conflicts {
        assert_eq!(conflict.confidence, 0.3);
        assert!(!conflict.auto_resolvable);
        assert!(conflict.suggested_resolution.is_none());
    }

    let resolutions: Resolutions = result
        .conflicts
        .iter()
        .map(|c| (c.path.clone(), Resolution::Target))
        .collect();
    let merged = project
        .apply_merge(&result, &resolutions, MergeCommit::default())
        .unwrap();
    let state = &project.version(&merged).unwrap().project_state;
    assert_eq!(state.name, "atlas-next");
    assert_eq!(state.framework, "axum");
}

#[test]
fn test_rejected_operations_leave_project_untouched() {
    let mut project =
        Project::new("atlas", ProjectState::named("atlas"), &Default::default()).unwrap();
    let head = project.current_version_id().clone();
    let main = project.current_branch_id().clone();
    let snapshot = project.clone();

    assert!(project.delete_version(&head).is_err());
    assert!(project.delete_branch(&main).is_err());
    assert!(project.create_branch("main", &head, "", true).is_err());
    assert!(project.create_tag(NewTag::new("", head.clone())).is_err());
    let mut bad = ProjectState::named("bad");
    bad.file_tree = Some(TreeNode {
        children: vec![TreeNode::file("x", "")],
        ..TreeNode::file("f", "")
    });
    assert!(project.save_version(bad, None).is_err());

    assert_eq!(project, snapshot);
}
