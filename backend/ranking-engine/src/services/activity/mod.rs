use crate::models::{PriorityTier, UserProfile};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Score returned for entities the profile does not mention
pub const DEFAULT_ACTIVITY: f32 = 0.5;

/// Activity Tracker - entity activity lookup
///
/// Backed by the static priority-tier map of the user profile, resolved once
/// per run. Lookups are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct ActivityTracker {
    cache: HashMap<String, f32>,
}

impl ActivityTracker {
    pub fn new(tiers: &BTreeMap<String, PriorityTier>) -> Self {
        let cache: HashMap<String, f32> = tiers
            .iter()
            .map(|(entity, tier)| (entity_key(entity), tier.activity()))
            .filter(|(entity, _)| !entity.is_empty())
            .collect();

        debug!(entity_count = cache.len(), "Activity cache built");

        Self { cache }
    }

    pub fn from_profile(profile: &UserProfile) -> Self {
        Self::new(&profile.activity)
    }

    /// Activity score in [0, 1]; 0.5 when unknown
    pub fn get_activity(&self, entity: &str) -> f32 {
        self.cache
            .get(&entity_key(entity))
            .copied()
            .unwrap_or(DEFAULT_ACTIVITY)
    }

    /// Highest activity among the referenced entities; 0.5 when none
    pub fn item_activity(&self, entities: &[String]) -> f32 {
        entities
            .iter()
            .map(|entity| self.get_activity(entity))
            .fold(None, |best: Option<f32>, score| {
                Some(best.map_or(score, |b| b.max(score)))
            })
            .unwrap_or(DEFAULT_ACTIVITY)
    }

    /// Override an entity's score (clamped to [0, 1])
    pub fn update_activity(&mut self, entity: &str, score: f32) {
        let key = entity_key(entity);
        if key.is_empty() {
            return;
        }

        let clamped = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            DEFAULT_ACTIVITY
        };
        self.cache.insert(key, clamped);
    }
}

fn entity_key(entity: &str) -> String {
    entity.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> ActivityTracker {
        let mut tiers = BTreeMap::new();
        tiers.insert("Rust".to_string(), PriorityTier::High);
        tiers.insert("LangChain".to_string(), PriorityTier::Medium);
        tiers.insert("Kafka".to_string(), PriorityTier::Low);
        tiers.insert("Mystery".to_string(), PriorityTier::Unknown);
        ActivityTracker::new(&tiers)
    }

    #[test]
    fn test_tier_scores() {
        let tracker = tracker();
        assert!((tracker.get_activity("rust") - 0.9).abs() < 1e-6);
        assert!((tracker.get_activity("  LANGCHAIN ") - 0.7).abs() < 1e-6);
        assert!((tracker.get_activity("kafka") - 0.5).abs() < 1e-6);
        assert!((tracker.get_activity("mystery") - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_entity_defaults() {
        assert!((tracker().get_activity("cobol") - DEFAULT_ACTIVITY).abs() < 1e-6);
    }

    #[test]
    fn test_item_activity_takes_max() {
        let tracker = tracker();
        let entities = vec!["kafka".to_string(), "Rust".to_string()];
        assert!((tracker.item_activity(&entities) - 0.9).abs() < 1e-6);
        assert!((tracker.item_activity(&[]) - DEFAULT_ACTIVITY).abs() < 1e-6);
    }

    #[test]
    fn test_update_activity_clamps() {
        let mut tracker = tracker();
        tracker.update_activity("Rust", 1.7);
        assert!((tracker.get_activity("rust") - 1.0).abs() < 1e-6);

        tracker.update_activity("new-thing", -0.3);
        assert!(tracker.get_activity("new-thing").abs() < 1e-6);
    }
}
