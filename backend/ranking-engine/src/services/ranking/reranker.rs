use super::similarity::ProfileSimilarity;
use crate::models::{RankedItem, ScoreBreakdown, SelectedItem, UserProfile};
use crate::services::activity::ActivityTracker;
use crate::services::weights::{
    WeightKey, WeightStore, ACTIVITY_WEIGHT, BASE_WEIGHT, SIMILARITY_WEIGHT,
};
use crate::utils::{desc_score, normalize_score};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Blend weights of the three relevance signals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    pub base: f32,
    pub similarity: f32,
    pub activity: f32,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            base: 0.3,
            similarity: 0.4,
            activity: 0.3,
        }
    }
}

impl BlendWeights {
    /// Read `global:base`, `global:similarity`, `global:activity`
    pub fn from_store(store: &WeightStore) -> Self {
        Self {
            base: store.get(&WeightKey::global(BASE_WEIGHT)) as f32,
            similarity: store.get(&WeightKey::global(SIMILARITY_WEIGHT)) as f32,
            activity: store.get(&WeightKey::global(ACTIVITY_WEIGHT)) as f32,
        }
    }
}

/// Relevance Reranker - personalized ordering of selected items
pub struct RelevanceReranker {
    similarity: ProfileSimilarity,
    activity: ActivityTracker,
}

impl RelevanceReranker {
    pub fn new(profile: &UserProfile) -> Self {
        Self {
            similarity: ProfileSimilarity::new(profile),
            activity: ActivityTracker::from_profile(profile),
        }
    }

    /// Create with an externally maintained activity tracker
    pub fn with_activity(profile: &UserProfile, activity: ActivityTracker) -> Self {
        Self {
            similarity: ProfileSimilarity::new(profile),
            activity,
        }
    }

    pub fn activity_tracker(&self) -> &ActivityTracker {
        &self.activity
    }

    /// Score one selected item against the store snapshot
    pub fn score(&self, selected: &SelectedItem, weights: &BlendWeights, store: &WeightStore) -> ScoreBreakdown {
        let item = &selected.item;

        let base_norm = normalize_score(item.base_score, 0.0, 10.0);
        let similarity = self.similarity.score(&item.similarity_text());
        let activity = self.activity.item_activity(&item.related_entities);

        let blend = base_norm * weights.base
            + similarity * weights.similarity
            + activity * weights.activity;

        let source_weight = store.get(&WeightKey::source(selected.source_key.as_str())) as f32;
        let category_weight = if item.category.trim().is_empty() {
            1.0
        } else {
            store.get(&WeightKey::category(item.category.as_str())) as f32
        };

        ScoreBreakdown {
            base_norm,
            similarity,
            activity,
            blend,
            source_weight,
            category_weight,
        }
    }

    /// Reorder the selection by composite score. Never adds or drops items.
    pub fn rerank(&self, selected: Vec<SelectedItem>, store: &WeightStore) -> Vec<RankedItem> {
        let weights = BlendWeights::from_store(store);
        let count = selected.len();

        let mut scored: Vec<(usize, RankedItem)> = selected
            .into_iter()
            .enumerate()
            .map(|(position, entry)| {
                let breakdown = self.score(&entry, &weights, store);
                let composite_score =
                    breakdown.blend * breakdown.source_weight * breakdown.category_weight;

                debug!(
                    item_id = %entry.item.id,
                    composite = composite_score,
                    similarity = breakdown.similarity,
                    activity = breakdown.activity,
                    "Item scored"
                );

                (
                    position,
                    RankedItem {
                        item: entry.item,
                        source_key: entry.source_key,
                        composite_score,
                        selection_pass: entry.pass,
                        breakdown,
                    },
                )
            })
            .collect();

        scored.sort_by(|(pos_a, a), (pos_b, b)| {
            desc_score(a.composite_score, b.composite_score)
                .then_with(|| desc_score(a.item.base_score, b.item.base_score))
                .then_with(|| pos_a.cmp(pos_b))
        });

        info!(
            count = count,
            w_base = weights.base,
            w_similarity = weights.similarity,
            w_activity = weights.activity,
            "Reranked selection"
        );

        scored.into_iter().map(|(_, ranked)| ranked).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateItem, PriorityTier, SelectionPass};
    use crate::services::weights::WeightBounds;
    use chrono::Utc;

    fn selected(id: &str, source_key: &str, score: f32, title: &str) -> SelectedItem {
        SelectedItem {
            item: CandidateItem {
                id: id.to_string(),
                title: title.to_string(),
                url: None,
                source: source_key.to_string(),
                category: "article".to_string(),
                base_score: score,
                related_entities: Vec::new(),
                summary: None,
                relevance_note: None,
                published_at: None,
            },
            source_key: source_key.to_string(),
            pass: SelectionPass::High,
        }
    }

    fn profile() -> UserProfile {
        let mut profile = UserProfile {
            active_projects: vec!["rust ranking engine".to_string()],
            ..Default::default()
        };
        profile.activity.insert("Rust".to_string(), PriorityTier::High);
        profile
    }

    #[test]
    fn test_blend_with_neutral_profile() {
        let reranker = RelevanceReranker::new(&UserProfile::default());
        let store = WeightStore::new(WeightBounds::default());
        let breakdown = reranker.score(
            &selected("a", "hn", 8.0, "anything"),
            &BlendWeights::default(),
            &store,
        );

        // 0.8 * 0.3 + 0.5 * 0.4 + 0.5 * 0.3
        assert!((breakdown.blend - 0.59).abs() < 1e-6);
        assert_eq!(breakdown.source_weight, 1.0);
        assert_eq!(breakdown.category_weight, 1.0);
    }

    #[test]
    fn test_source_weight_multiplies() {
        let reranker = RelevanceReranker::new(&UserProfile::default());
        let mut store = WeightStore::new(WeightBounds::default());
        store.set(&WeightKey::source("arxiv"), 1.5, 5, "test", Utc::now());

        let ranked = reranker.rerank(
            vec![selected("hn", "hn", 8.0, "x"), selected("ax", "arxiv", 8.0, "y")],
            &store,
        );

        assert_eq!(ranked[0].item.id, "ax");
        assert!((ranked[0].composite_score - ranked[1].composite_score * 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_similarity_and_activity_reorder() {
        let reranker = RelevanceReranker::new(&profile());
        let store = WeightStore::new(WeightBounds::default());

        let plain = selected("plain", "hn", 9.0, "Gardening newsletter");
        let mut relevant = selected("relevant", "blog", 8.0, "Rust ranking engine internals");
        relevant.item.related_entities = vec!["rust".to_string()];

        let ranked = reranker.rerank(vec![plain, relevant], &store);
        let ids: Vec<_> = ranked.iter().map(|r| r.item.id.as_str()).collect();
        assert_eq!(ids, vec!["relevant", "plain"]);
        assert!((ranked[0].breakdown.activity - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_updated_activity_flows_into_rerank() {
        let mut activity = ActivityTracker::from_profile(&UserProfile::default());
        activity.update_activity("Kafka", 1.0);

        let reranker = RelevanceReranker::with_activity(&UserProfile::default(), activity);
        assert!((reranker.activity_tracker().get_activity("kafka") - 1.0).abs() < 1e-6);

        let store = WeightStore::new(WeightBounds::default());
        let plain = selected("plain", "hn", 8.0, "x");
        let mut streaming = selected("streaming", "blog", 8.0, "y");
        streaming.item.related_entities = vec!["kafka".to_string()];

        let ranked = reranker.rerank(vec![plain, streaming], &store);
        assert_eq!(ranked[0].item.id, "streaming");
        assert!((ranked[0].breakdown.activity - 1.0).abs() < 1e-6);
        assert!((ranked[1].breakdown.activity - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_ties_keep_selection_order() {
        let reranker = RelevanceReranker::new(&UserProfile::default());
        let store = WeightStore::new(WeightBounds::default());

        let ranked = reranker.rerank(
            vec![
                selected("first", "a", 7.0, "x"),
                selected("second", "b", 7.0, "y"),
                selected("third", "c", 7.0, "z"),
            ],
            &store,
        );
        let ids: Vec<_> = ranked.iter().map(|r| r.item.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_store_blend_weights_used() {
        let mut store = WeightStore::new(WeightBounds::default());
        store.set(&WeightKey::global(BASE_WEIGHT), 1.0, 0, "test", Utc::now());
        store.set(&WeightKey::global(SIMILARITY_WEIGHT), 0.0, 0, "test", Utc::now());
        store.set(&WeightKey::global(ACTIVITY_WEIGHT), 0.0, 0, "test", Utc::now());

        let weights = BlendWeights::from_store(&store);
        assert_eq!(weights.base, 1.0);
        assert_eq!(weights.similarity, 0.0);

        let reranker = RelevanceReranker::new(&profile());
        let ranked = reranker.rerank(vec![selected("a", "hn", 6.0, "rust ranking")], &store);
        assert!((ranked[0].composite_score - 0.6).abs() < 1e-6);
    }
}
