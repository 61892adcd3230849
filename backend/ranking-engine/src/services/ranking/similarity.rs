use crate::models::UserProfile;
use crate::utils::{jaccard, tokenize};
use std::collections::HashSet;

/// Contribution of a bucket that cannot be compared
pub const NEUTRAL_SIMILARITY: f32 = 0.5;

const GOALS_WEIGHT: f32 = 0.3;
const PROJECTS_WEIGHT: f32 = 0.4;
const INTERESTS_WEIGHT: f32 = 0.3;

/// Lexical proxy for semantic similarity: token Jaccard overlap between item
/// text and each profile bucket.
#[derive(Debug, Clone, Default)]
pub struct ProfileSimilarity {
    goals: HashSet<String>,
    projects: HashSet<String>,
    interests: HashSet<String>,
}

impl ProfileSimilarity {
    pub fn new(profile: &UserProfile) -> Self {
        Self {
            goals: tokenize(&profile.goals.join(" ")),
            projects: tokenize(&profile.active_projects.join(" ")),
            interests: tokenize(&profile.implicit_interests.join(" ")),
        }
    }

    /// Weighted similarity in [0, 1]
    pub fn score(&self, text: &str) -> f32 {
        let tokens = tokenize(text);

        let bucket = |profile_tokens: &HashSet<String>| {
            jaccard(&tokens, profile_tokens).unwrap_or(NEUTRAL_SIMILARITY)
        };

        GOALS_WEIGHT * bucket(&self.goals)
            + PROJECTS_WEIGHT * bucket(&self.projects)
            + INTERESTS_WEIGHT * bucket(&self.interests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            goals: vec!["ship rust agents".to_string()],
            active_projects: vec!["ranking engine".to_string()],
            implicit_interests: vec!["llm evaluation".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_text_is_neutral() {
        let similarity = ProfileSimilarity::new(&profile());
        assert!((similarity.score("") - NEUTRAL_SIMILARITY).abs() < 1e-6);
    }

    #[test]
    fn test_empty_profile_is_neutral() {
        let similarity = ProfileSimilarity::new(&UserProfile::default());
        assert!((similarity.score("rust ranking engine") - NEUTRAL_SIMILARITY).abs() < 1e-6);
    }

    #[test]
    fn test_project_overlap_weighs_most() {
        let similarity = ProfileSimilarity::new(&profile());
        // projects: {ranking, engine} vs {ranking, engine} -> 1.0
        let score = similarity.score("Ranking Engine");
        assert!((score - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_more_overlap_scores_higher() {
        let similarity = ProfileSimilarity::new(&profile());
        let related = similarity.score("rust agents for ranking");
        let unrelated = similarity.score("gardening tips for spring");
        assert!(related > unrelated);
    }
}
