//! Domain model types: project state snapshots, versions, branches and tags.
//!
//! These types bridge the project aggregate, the merge engine, the
//! persistence layer and the CLI. All of them round-trip through JSON with
//! structural equality.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::TreeError;
use crate::tree::TreeNode;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

id_type!(
    /// Identifier of a [`Version`].
    VersionId
);
id_type!(
    /// Identifier of a [`Branch`].
    BranchId
);
id_type!(
    /// Identifier of a [`Tag`].
    TagId
);
id_type!(
    /// Identifier of a project.
    ProjectId
);

// ---------------------------------------------------------------------------
// Project state
// ---------------------------------------------------------------------------

/// A snapshot of a project's metadata and file tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectState {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub project_type: String,
    #[serde(default)]
    pub framework: String,
    #[serde(default)]
    pub languages: BTreeSet<String>,
    #[serde(default)]
    pub team_size: String,
    #[serde(default)]
    pub goals: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_tree: Option<TreeNode>,
}

impl ProjectState {
    /// Create a state with only a name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Check the file-tree invariants.
    pub fn validate(&self) -> Result<(), TreeError> {
        match &self.file_tree {
            Some(tree) => tree.validate(),
            None => Ok(()),
        }
    }
}

/// The single-valued text fields of a [`ProjectState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarField {
    Name,
    Description,
    ProjectType,
    Framework,
    TeamSize,
    Goals,
}

impl ScalarField {
    /// Every scalar field, in comparison order.
    pub const ALL: [ScalarField; 6] = [
        ScalarField::Name,
        ScalarField::Description,
        ScalarField::ProjectType,
        ScalarField::Framework,
        ScalarField::TeamSize,
        ScalarField::Goals,
    ];

    /// The wire name of the field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::ProjectType => "type",
            Self::Framework => "framework",
            Self::TeamSize => "teamSize",
            Self::Goals => "goals",
        }
    }

    pub fn get(self, state: &ProjectState) -> &str {
        match self {
            Self::Name => &state.name,
            Self::Description => &state.description,
            Self::ProjectType => &state.project_type,
            Self::Framework => &state.framework,
            Self::TeamSize => &state.team_size,
            Self::Goals => &state.goals,
        }
    }

    pub fn set(self, state: &mut ProjectState, value: String) {
        match self {
            Self::Name => state.name = value,
            Self::Description => state.description = value,
            Self::ProjectType => state.project_type = value,
            Self::Framework => state.framework = value,
            Self::TeamSize => state.team_size = value,
            Self::Goals => state.goals = value,
        }
    }
}

impl std::fmt::Display for ScalarField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalarField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "description" => Ok(Self::Description),
            "type" | "projectType" => Ok(Self::ProjectType),
            "framework" => Ok(Self::Framework),
            "teamSize" | "team_size" => Ok(Self::TeamSize),
            "goals" => Ok(Self::Goals),
            other => Err(format!("unknown project field '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// An immutable snapshot of project state on a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: VersionId,
    pub project_state: ProjectState,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub branch_id: BranchId,
}

impl Version {
    /// Create a version stamped with the current time.
    pub fn new(project_state: ProjectState, branch_id: BranchId, notes: Option<String>) -> Self {
        Self {
            id: VersionId::new(),
            project_state,
            timestamp: Utc::now(),
            notes,
            branch_id,
        }
    }

    /// Override the creation timestamp (used when importing history).
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

// ---------------------------------------------------------------------------
// Branch
// ---------------------------------------------------------------------------

/// A named, movable pointer to the latest version in a line of development.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub source_version_id: VersionId,
    pub head_version_id: VersionId,
    pub is_default: bool,
    pub color: String,
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// Categorisation of a tag.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    Release,
    Milestone,
    Hotfix,
    Feature,
    #[default]
    Custom,
}

impl std::fmt::Display for TagType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Release => write!(f, "release"),
            Self::Milestone => write!(f, "milestone"),
            Self::Hotfix => write!(f, "hotfix"),
            Self::Feature => write!(f, "feature"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for TagType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "release" => Ok(Self::Release),
            "milestone" => Ok(Self::Milestone),
            "hotfix" => Ok(Self::Hotfix),
            "feature" => Ok(Self::Feature),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown tag type '{}'", other)),
        }
    }
}

/// Free-form release information attached to a tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagMetadata {
    /// Semantic version text, e.g. `1.4.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
}

impl TagMetadata {
    pub fn is_empty(&self) -> bool {
        self.version.is_none() && self.changelog.is_none() && self.release_notes.is_none()
    }
}

/// A named pointer to one specific version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub version_id: VersionId,
    #[serde(rename = "type")]
    pub tag_type: TagType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "TagMetadata::is_empty")]
    pub metadata: TagMetadata,
    pub is_protected: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> ProjectState {
        ProjectState {
            name: "atlas".into(),
            description: "mapping service".into(),
            project_type: "web".into(),
            framework: "axum".into(),
            languages: ["rust".to_string(), "sql".to_string()].into_iter().collect(),
            team_size: "3".into(),
            goals: "ship v1".into(),
            file_tree: Some(TreeNode::directory(
                "atlas",
                vec![TreeNode::file("Cargo.toml", "[package]")],
            )),
        }
    }

    #[test]
    fn test_state_json_round_trip() {
        let state = sample_state();
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"type\":\"web\""));
        assert!(json.contains("\"teamSize\":\"3\""));
        let back: ProjectState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_version_round_trip() {
        let version = Version::new(sample_state(), BranchId::new(), Some("first".into()));
        let json = serde_json::to_string(&version).unwrap();
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, version);
    }

    #[test]
    fn test_scalar_field_access() {
        let mut state = sample_state();
        for field in ScalarField::ALL {
            assert_eq!(field.as_str().parse::<ScalarField>(), Ok(field));
        }
        ScalarField::Framework.set(&mut state, "actix".into());
        assert_eq!(ScalarField::Framework.get(&state), "actix");
        assert!("colour".parse::<ScalarField>().is_err());
    }

    #[test]
    fn test_tag_type_parse() {
        assert_eq!("Release".parse::<TagType>(), Ok(TagType::Release));
        assert_eq!(TagType::Hotfix.to_string(), "hotfix");
        assert!("epic".parse::<TagType>().is_err());
    }
}
