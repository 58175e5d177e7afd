//! String similarity, confidence scoring and resolution suggestions.

use super::detector::Suggestion;
use super::MergeOptions;

/// Levenshtein edit distance between two strings, counted in chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            row[j + 1] = substitution.min(prev[j + 1] + 1).min(row[j] + 1);
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

/// Normalized similarity in `[0, 1]`: one minus the edit distance over the
/// length of the longer string. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longer = a.chars().count().max(b.chars().count());
    if longer == 0 {
        return 1.0;
    }
    let distance = levenshtein(a, b);
    (longer - distance) as f64 / longer as f64
}

/// Confidence for a scalar conflict: the mean of the three pairwise
/// similarities between ancestor, current and target.
pub fn confidence(ancestor: &str, current: &str, target: &str) -> f64 {
    let current_sim = similarity(ancestor, current);
    let target_sim = similarity(ancestor, target);
    let both_sim = similarity(current, target);
    ((current_sim + target_sim + both_sim) / 3.0).clamp(0.0, 1.0)
}

/// Suggest how to resolve a scalar conflict.
///
/// Near-identical sides suggest `Merge`. Otherwise, when one side strayed
/// clearly further from the ancestor than the other, that side is suggested
/// as the deliberate change.
pub fn suggest(
    ancestor: &str,
    current: &str,
    target: &str,
    current_target_similarity: f64,
    options: &MergeOptions,
) -> Option<Suggestion> {
    if current_target_similarity > options.similarity_threshold {
        return Some(Suggestion::Merge);
    }

    let current_sim = similarity(ancestor, current);
    let target_sim = similarity(ancestor, target);
    if (current_sim - target_sim).abs() > options.suggestion_margin {
        if current_sim < target_sim {
            Some(Suggestion::Current)
        } else {
            Some(Suggestion::Target)
        }
    } else {
        None
    }
}
