//! Tag index operations.

use chrono::Utc;
use tracing::info;

use super::{checked_name, Project};
use crate::errors::ProjectError;
use crate::models::{Tag, TagId, TagMetadata, TagType, VersionId};

/// Input for [`Project::create_tag`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTag {
    pub name: String,
    pub version_id: VersionId,
    pub tag_type: TagType,
    pub description: Option<String>,
    pub metadata: TagMetadata,
    pub is_protected: bool,
}

impl NewTag {
    /// An unprotected custom tag with no description or metadata.
    pub fn new(name: impl Into<String>, version_id: VersionId) -> Self {
        Self {
            name: name.into(),
            version_id,
            tag_type: TagType::default(),
            description: None,
            metadata: TagMetadata::default(),
            is_protected: false,
        }
    }
}

/// Changes for [`Project::update_tag`]; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagUpdate {
    pub name: Option<String>,
    pub tag_type: Option<TagType>,
    pub description: Option<String>,
    pub metadata: Option<TagMetadata>,
    pub is_protected: Option<bool>,
}

impl Project {
    pub fn create_tag(&mut self, new: NewTag) -> Result<TagId, ProjectError> {
        let name = checked_name("tag", &new.name)?;
        if self.tag_by_name(&name).is_some() {
            return Err(ProjectError::DuplicateTagName(name));
        }
        self.require_version(&new.version_id)?;

        let tag = Tag {
            id: TagId::new(),
            name,
            version_id: new.version_id,
            tag_type: new.tag_type,
            description: new.description.filter(|d| !d.trim().is_empty()),
            metadata: new.metadata,
            is_protected: new.is_protected,
            created_at: Utc::now(),
        };
        let id = tag.id.clone();
        info!(tag = %tag.name, version = %tag.version_id, tag_type = %tag.tag_type, "tag created");
        self.tags.push(tag);
        self.last_updated = Utc::now();
        Ok(id)
    }

    /// Edit a tag's descriptive fields. The pointee is changed only through
    /// [`Project::move_tag`].
    pub fn update_tag(&mut self, id: &TagId, update: TagUpdate) -> Result<(), ProjectError> {
        let idx = self.tag_index(id)?;
        let name = match &update.name {
            Some(name) => {
                let name = checked_name("tag", name)?;
                if self.tags.iter().any(|t| &t.id != id && t.name == name) {
                    return Err(ProjectError::DuplicateTagName(name));
                }
                Some(name)
            }
            None => None,
        };

        let tag = &mut self.tags[idx];
        if let Some(name) = name {
            tag.name = name;
        }
        if let Some(tag_type) = update.tag_type {
            tag.tag_type = tag_type;
        }
        if let Some(description) = update.description {
            tag.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(metadata) = update.metadata {
            tag.metadata = metadata;
        }
        if let Some(is_protected) = update.is_protected {
            tag.is_protected = is_protected;
        }
        info!(tag = %tag.name, "tag updated");
        self.last_updated = Utc::now();
        Ok(())
    }

    /// Point a tag at another version. Protected tags do not move.
    pub fn move_tag(&mut self, id: &TagId, version: &VersionId) -> Result<(), ProjectError> {
        let idx = self.tag_index(id)?;
        if self.tags[idx].is_protected {
            return Err(ProjectError::ProtectedTag(self.tags[idx].name.clone()));
        }
        self.require_version(version)?;

        let tag = &mut self.tags[idx];
        info!(tag = %tag.name, from = %tag.version_id, to = %version, "tag moved");
        tag.version_id = version.clone();
        self.last_updated = Utc::now();
        Ok(())
    }

    pub fn delete_tag(&mut self, id: &TagId) -> Result<(), ProjectError> {
        let idx = self.tag_index(id)?;
        if self.tags[idx].is_protected {
            return Err(ProjectError::ProtectedTag(self.tags[idx].name.clone()));
        }

        let tag = self.tags.remove(idx);
        info!(tag = %tag.name, "tag deleted");
        self.last_updated = Utc::now();
        Ok(())
    }

    pub fn tag(&self, id: &TagId) -> Option<&Tag> {
        self.tags.iter().find(|t| &t.id == id)
    }

    pub fn tag_by_name(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name == name)
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tags_for_version(&self, version: &VersionId) -> Vec<&Tag> {
        self.tags
            .iter()
            .filter(|t| &t.version_id == version)
            .collect()
    }

    fn tag_index(&self, id: &TagId) -> Result<usize, ProjectError> {
        self.tags
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| ProjectError::TagNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProjectState;
    use crate::project::tests::sample_project;

    fn release(name: &str, version: VersionId) -> NewTag {
        NewTag {
            tag_type: TagType::Release,
            metadata: TagMetadata {
                version: Some("1.0.0".into()),
                changelog: Some("first cut".into()),
                release_notes: None,
            },
            ..NewTag::new(name, version)
        }
    }

    #[test]
    fn test_create_and_lookup_tags() {
        let mut project = sample_project();
        let v1 = project.current_version_id().clone();
        let id = project.create_tag(release("v1.0.0", v1.clone())).unwrap();

        let tag = project.tag(&id).unwrap();
        assert_eq!(tag.tag_type, TagType::Release);
        assert_eq!(tag.metadata.version.as_deref(), Some("1.0.0"));
        assert_eq!(project.tag_by_name("v1.0.0").unwrap().id, id);
        assert_eq!(project.tags_for_version(&v1).len(), 1);

        assert!(matches!(
            project.create_tag(NewTag::new("v1.0.0", v1.clone())),
            Err(ProjectError::DuplicateTagName(_))
        ));
        assert!(matches!(
            project.create_tag(NewTag::new("dangling", "missing".into())),
            Err(ProjectError::VersionNotFound(_))
        ));
        assert_eq!(project.tags().len(), 1);
    }

    #[test]
    fn test_update_tag() {
        let mut project = sample_project();
        let v1 = project.current_version_id().clone();
        let id = project.create_tag(NewTag::new("beta", v1.clone())).unwrap();
        project.create_tag(NewTag::new("other", v1)).unwrap();

        project
            .update_tag(
                &id,
                TagUpdate {
                    name: Some("beta-1".into()),
                    description: Some("first beta".into()),
                    tag_type: Some(TagType::Milestone),
                    ..TagUpdate::default()
                },
            )
            .unwrap();
        let tag = project.tag(&id).unwrap();
        assert_eq!(tag.name, "beta-1");
        assert_eq!(tag.description.as_deref(), Some("first beta"));
        assert_eq!(tag.tag_type, TagType::Milestone);

        let clash = TagUpdate {
            name: Some("other".into()),
            ..TagUpdate::default()
        };
        assert!(matches!(
            project.update_tag(&id, clash),
            Err(ProjectError::DuplicateTagName(_))
        ));
        assert_eq!(project.tag(&id).unwrap().name, "beta-1");
    }

    #[test]
    fn test_move_tag() {
        let mut project = sample_project();
        let v1 = project.current_version_id().clone();
        let id = project.create_tag(NewTag::new("stable", v1)).unwrap();
        let v2 = project.save_version(ProjectState::named("v2"), None).unwrap();

        project.move_tag(&id, &v2).unwrap();
        assert_eq!(project.tag(&id).unwrap().version_id, v2);
        assert!(matches!(
            project.move_tag(&id, &"missing".into()),
            Err(ProjectError::VersionNotFound(_))
        ));
    }

    #[test]
    fn test_protected_tags_are_immutable() {
        let mut project = sample_project();
        let v1 = project.current_version_id().clone();
        let id = project
            .create_tag(NewTag {
                is_protected: true,
                ..release("v1", v1)
            })
            .unwrap();
        let v2 = project.save_version(ProjectState::named("v2"), None).unwrap();

        assert!(matches!(
            project.delete_tag(&id),
            Err(ProjectError::ProtectedTag(_))
        ));
        assert!(matches!(
            project.move_tag(&id, &v2),
            Err(ProjectError::ProtectedTag(_))
        ));

        // Lifting protection makes the tag deletable.
        project
            .update_tag(
                &id,
                TagUpdate {
                    is_protected: Some(false),
                    ..TagUpdate::default()
                },
            )
            .unwrap();
        project.delete_tag(&id).unwrap();
        assert!(project.tags().is_empty());
    }
}
