//! `projvault tag` subcommands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use projvault_core::models::{TagMetadata, TagType};
use projvault_core::project::{NewTag, TagUpdate};

use super::{resolve_tag, resolve_version, short_id, truncate, Session};
use crate::style;

#[derive(Subcommand, Debug)]
pub enum TagAction {
    /// Tag a version.
    Create {
        /// Tag name (must be unique).
        name: String,

        /// Version to tag.
        #[arg(short, long, default_value = "HEAD")]
        version: String,

        /// release, milestone, hotfix, feature or custom.
        #[arg(short = 't', long = "type", default_value = "custom")]
        tag_type: TagType,

        #[arg(short, long)]
        description: Option<String>,

        /// Refuse to move or delete this tag.
        #[arg(long)]
        protected: bool,

        #[command(flatten)]
        metadata: MetadataArgs,
    },

    /// List tags.
    List,

    /// Point a tag at another version.
    Move {
        /// Tag name or id.
        tag: String,

        /// New target version.
        version: String,
    },

    /// Edit a tag's fields.
    Update {
        /// Tag name or id.
        tag: String,

        #[arg(long)]
        rename: Option<String>,

        #[arg(short = 't', long = "type")]
        tag_type: Option<TagType>,

        #[arg(short, long)]
        description: Option<String>,

        /// Set or clear protection.
        #[arg(long)]
        protected: Option<bool>,

        #[command(flatten)]
        metadata: MetadataArgs,
    },

    /// Delete a tag.
    Delete {
        /// Tag name or id.
        tag: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct MetadataArgs {
    /// Semantic version recorded on the tag.
    #[arg(long = "semver")]
    pub semver: Option<String>,

    #[arg(long)]
    pub changelog: Option<String>,

    #[arg(long)]
    pub release_notes: Option<String>,
}

impl MetadataArgs {
    fn into_metadata(self) -> Option<TagMetadata> {
        let metadata = TagMetadata {
            version: self.semver,
            changelog: self.changelog,
            release_notes: self.release_notes,
        };
        (!metadata.is_empty()).then_some(metadata)
    }
}

pub fn run(session: &Session, action: TagAction) -> Result<()> {
    let mut project = session.active_project()?;

    match action {
        TagAction::Create {
            name,
            version,
            tag_type,
            description,
            protected,
            metadata,
        } => {
            let version_id = resolve_version(&project, &version)?;
            project
                .create_tag(NewTag {
                    tag_type,
                    description,
                    metadata: metadata.into_metadata().unwrap_or_default(),
                    is_protected: protected,
                    ..NewTag::new(name.clone(), version_id.clone())
                })
                .context("failed to create tag")?;
            session.commit(&project, "tag_created", Some(&name))?;
            println!(
                "{}",
                style::success(&format!(
                    "Tagged {} as {}",
                    short_id(version_id.as_str()),
                    name
                ))
            );
        }

        TagAction::List => {
            if project.tags().is_empty() {
                println!("No tags found.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["NAME", "TYPE", "VERSION", "PROTECTED", "SEMVER", "DESCRIPTION"]);
            for tag in project.tags() {
                table.add_row(vec![
                    Cell::new(&tag.name),
                    Cell::new(tag.tag_type),
                    Cell::new(short_id(tag.version_id.as_str())),
                    Cell::new(if tag.is_protected { "yes" } else { "" }),
                    Cell::new(tag.metadata.version.as_deref().unwrap_or("")),
                    Cell::new(truncate(tag.description.as_deref().unwrap_or(""), 40)),
                ]);
            }
            println!("{table}");
        }

        TagAction::Move { tag, version } => {
            let id = resolve_tag(&project, &tag)?;
            let version_id = resolve_version(&project, &version)?;
            project
                .move_tag(&id, &version_id)
                .context("failed to move tag")?;
            session.commit(&project, "tag_moved", Some(&tag))?;
            println!(
                "{}",
                style::success(&format!(
                    "Moved {} to {}",
                    tag,
                    short_id(version_id.as_str())
                ))
            );
        }

        TagAction::Update {
            tag,
            rename,
            tag_type,
            description,
            protected,
            metadata,
        } => {
            let id = resolve_tag(&project, &tag)?;
            let update = TagUpdate {
                name: rename,
                tag_type,
                description,
                metadata: metadata.into_metadata(),
                is_protected: protected,
            };
            if update == TagUpdate::default() {
                anyhow::bail!("nothing to update");
            }
            project
                .update_tag(&id, update)
                .context("failed to update tag")?;
            session.commit(&project, "tag_updated", Some(&tag))?;
            println!("{}", style::success(&format!("Updated tag {}", tag)));
        }

        TagAction::Delete { tag } => {
            let id = resolve_tag(&project, &tag)?;
            if !session.confirm(&format!("Delete tag {}?", tag))? {
                println!("{}", style::warn("Delete cancelled."));
                return Ok(());
            }
            project.delete_tag(&id).context("failed to delete tag")?;
            session.commit(&project, "tag_deleted", Some(&tag))?;
            println!("{}", style::success(&format!("Deleted tag {}", tag)));
        }
    }

    Ok(())
}
