//! File-content merging.
//!
//! The automatic merge is deliberately conservative: it only combines two
//! pure append-style edits, where each side kept the ancestor text intact as a
//! prefix and added whole lines after it. Anything else is left to a human.

use tracing::debug;

/// Outcome of a text merge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMerge {
    /// Both sides combined cleanly.
    Merged(String),
    /// The edits cannot be combined automatically.
    Conflict,
}

impl TextMerge {
    pub fn merged(self) -> Option<String> {
        match self {
            Self::Merged(content) => Some(content),
            Self::Conflict => None,
        }
    }
}

/// Stateless text merger.
pub struct Merger;

impl Merger {
    /// Merge file content edited on both sides of a merge.
    pub fn merge_text(ancestor: &str, current: &str, target: &str) -> TextMerge {
        // Fast paths: one side untouched, or both sides agree.
        if current == ancestor {
            return TextMerge::Merged(target.to_string());
        }
        if target == ancestor || current == target {
            return TextMerge::Merged(current.to_string());
        }

        let (Some(current_addition), Some(target_addition)) = (
            appended_lines(ancestor, current),
            appended_lines(ancestor, target),
        ) else {
            debug!("at least one side is not a pure append, cannot merge");
            return TextMerge::Conflict;
        };

        if current_addition.contains(target_addition) || target_addition.contains(current_addition)
        {
            debug!("appended text overlaps, cannot merge");
            return TextMerge::Conflict;
        }

        debug!("combining two appended edits");
        TextMerge::Merged(format!("{}{}{}", ancestor, current_addition, target_addition))
    }

    /// Render a unified diff from `from` to `to` for display.
    pub fn content_patch(from: &str, to: &str) -> String {
        diffy::create_patch(from, to).to_string()
    }
}

/// The non-empty text appended to `ancestor` by `edited`, if `edited` is
/// `ancestor` followed by new lines.
fn appended_lines<'a>(ancestor: &str, edited: &'a str) -> Option<&'a str> {
    let addition = edited.strip_prefix(ancestor)?;
    if addition.is_empty() {
        return None;
    }
    let on_line_boundary =
        ancestor.is_empty() || ancestor.ends_with('\n') || addition.starts_with('\n');
    on_line_boundary.then_some(addition)
}
