//! Three-way merging of project states.
//!
//! The merge subsystem is responsible for:
//! 1. **Ancestry** -- picking a common ancestor from the version history.
//! 2. **Detection** -- classifying every field, language and tree node as an
//!    auto-resolved change or a conflict.
//! 3. **Resolution** -- applying chosen resolutions to produce a merged state.

pub mod ancestor;
pub mod detector;
pub mod merger;
pub mod path;
pub mod resolver;
pub mod similarity;

pub use ancestor::AncestorResolver;
pub use detector::{
    Change, ChangeSource, ChangeType, Conflict, ConflictType, MergeEngine, MergeResult, Suggestion,
};
pub use merger::{Merger, TextMerge};
pub use path::{MergePath, MergeValue};
pub use resolver::{MergeApplier, Resolution, Resolutions};

/// Tunables for conflict scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOptions {
    /// Current/target similarity above which a scalar conflict is considered
    /// auto-resolvable.
    pub similarity_threshold: f64,
    /// Minimum gap between the sides' similarity to the ancestor before one
    /// side is suggested.
    pub suggestion_margin: f64,
    /// Confidence assigned to conflicts found without a common ancestor.
    pub two_way_confidence: f64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            suggestion_margin: 0.3,
            two_way_confidence: 0.3,
        }
    }
}
