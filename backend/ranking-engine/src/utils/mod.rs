// Utility functions for ranking-engine

use std::cmp::Ordering;
use std::collections::HashSet;

/// Normalize a score to [0, 1] range
pub fn normalize_score(score: f32, min: f32, max: f32) -> f32 {
    if max - min < f32::EPSILON || !score.is_finite() {
        0.5
    } else {
        ((score - min) / (max - min)).clamp(0.0, 1.0)
    }
}

/// Lowercased alphanumeric tokens of a text
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Jaccard similarity of two token sets. `None` when either side is empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> Option<f32> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let intersection = a.intersection(b).count();
    let union = a.union(b).count();

    if union == 0 {
        None
    } else {
        Some(intersection as f32 / union as f32)
    }
}

/// Descending order for scores; NaN sorts last
pub fn desc_score(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
