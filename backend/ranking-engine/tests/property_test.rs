use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use ranking_engine::models::{CandidateItem, FeedbackAction, FeedbackEvent, UserProfile};
use ranking_engine::services::dedup::Deduplicator;
use ranking_engine::services::ranking::RelevanceReranker;
use ranking_engine::services::selection::{DiversitySelector, SelectionConfig};
use ranking_engine::services::weights::{
    AdjusterConfig, WeightAdjuster, WeightBounds, WeightKey, WeightStore,
};
use std::collections::{HashMap, HashSet};

const SOURCES: &[&str] = &["arXiv (cs.AI)", "arXiv cs.LG", "Hacker News", "hn", "GitHub", "Lobsters"];
const URLS: &[&str] = &[
    "https://x.com/a",
    "https://x.com/a?utm_source=1",
    "https://www.x.com/a/",
    "https://x.com/b",
    "https://y.org/post#comments",
    "https://y.org/post",
];

fn arb_item() -> impl Strategy<Value = CandidateItem> {
    (
        0usize..1000,
        0usize..SOURCES.len(),
        proptest::option::of(0usize..URLS.len()),
        0.0f32..=10.0,
    )
        .prop_map(|(id, source, url, score)| CandidateItem {
            id: format!("item-{}", id),
            title: format!("title {}", id % 7),
            url: url.map(|u| URLS[u].to_string()),
            source: SOURCES[source].to_string(),
            category: "article".to_string(),
            base_score: score,
            related_entities: Vec::new(),
            summary: None,
            relevance_note: None,
            published_at: None,
        })
}

fn arb_action() -> impl Strategy<Value = FeedbackAction> {
    prop_oneof![
        Just(FeedbackAction::View),
        Just(FeedbackAction::Click),
        Just(FeedbackAction::Like),
        Just(FeedbackAction::Dislike),
        Just(FeedbackAction::Neutral),
    ]
}

fn events(actions: &[FeedbackAction]) -> Vec<FeedbackEvent> {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    actions
        .iter()
        .map(|action| FeedbackEvent {
            item_id: "x".to_string(),
            action: *action,
            section: "must_read".to_string(),
            source: "hn".to_string(),
            timestamp: now - Duration::hours(1),
        })
        .collect()
}

fn run_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

proptest! {
    #[test]
    fn cap_holds_in_every_pass(
        items in proptest::collection::vec(arb_item(), 0..40),
        target in 0usize..12,
        cap in 1i64..4,
    ) {
        let config = SelectionConfig {
            target_count: target,
            per_source_cap: cap,
            ..Default::default()
        };
        let outcome = DiversitySelector::new(config).select(items);

        prop_assert!(outcome.selected.len() <= target);
        let mut counts: HashMap<&str, i64> = HashMap::new();
        for entry in &outcome.selected {
            *counts.entry(entry.source_key.as_str()).or_insert(0) += 1;
        }
        for (source, count) in counts {
            prop_assert!(count <= cap, "{} has {} > cap {}", source, count, cap);
        }
    }

    #[test]
    fn dedupe_keys_are_unique_in_selection(
        items in proptest::collection::vec(arb_item(), 0..40),
    ) {
        let config = SelectionConfig {
            target_count: 40,
            per_source_cap: 0,
            ..Default::default()
        };
        let outcome = DiversitySelector::new(config).select(items);

        let mut seen = HashSet::new();
        for entry in &outcome.selected {
            prop_assert!(seen.insert(Deduplicator::key(&entry.item)));
        }
    }

    #[test]
    fn weights_stay_in_bounds(
        batches in proptest::collection::vec(proptest::collection::vec(arb_action(), 0..30), 1..8),
    ) {
        let adjuster = WeightAdjuster::default();
        let bounds = WeightBounds::default();
        let mut store = WeightStore::new(bounds);

        for batch in &batches {
            store = adjuster.adjust(&store, &events(batch), run_time()).store;
            adjuster.reinforce(&mut store, &WeightKey::source("hn"), "prop", run_time());
        }

        for entry in store.entries() {
            prop_assert!(bounds.for_scope(entry.key.scope).contains(entry.value));
        }
    }

    #[test]
    fn below_threshold_is_a_no_op(
        actions in proptest::collection::vec(arb_action(), 0..40),
    ) {
        let explicit = actions.iter().filter(|a| a.is_explicit()).count() as u64;
        let config = AdjusterConfig {
            section_min_samples: explicit + 1,
            source_min_samples: explicit + 1,
            ..Default::default()
        };
        let adjuster = WeightAdjuster::new(config);
        let store = WeightStore::new(WeightBounds::default());

        let outcome = adjuster.adjust(&store, &events(&actions), run_time());
        prop_assert_eq!(outcome.store.version(), 0);
        prop_assert!(outcome.report.adjustments.is_empty());
    }

    #[test]
    fn unanimous_feedback_moves_weight_in_its_direction(
        count in 5usize..30,
        start in 0.25f64..1.95,
        positive in any::<bool>(),
    ) {
        let action = if positive { FeedbackAction::Like } else { FeedbackAction::Dislike };
        let key = WeightKey::source("hn");
        let mut store = WeightStore::new(WeightBounds::default());
        store.set(&key, start, 0, "seed", run_time());

        let outcome = WeightAdjuster::default().adjust(&store, &events(&vec![action; count]), run_time());
        let after = outcome.store.get(&key);

        if positive {
            prop_assert!(after > start && after <= 2.0);
        } else {
            prop_assert!(after < start && after >= 0.2);
        }
    }

    #[test]
    fn reranking_is_deterministic(
        items in proptest::collection::vec(arb_item(), 0..20),
    ) {
        let config = SelectionConfig {
            target_count: 20,
            ..Default::default()
        };
        let selector = DiversitySelector::new(config);
        let store = WeightStore::new(WeightBounds::default());
        let reranker = RelevanceReranker::new(&UserProfile::default());

        let first = reranker.rerank(selector.select(items.clone()).selected, &store);
        let second = reranker.rerank(selector.select(items).selected, &store);

        let first_ids: Vec<_> = first.iter().map(|r| r.item.id.clone()).collect();
        let second_ids: Vec<_> = second.iter().map(|r| r.item.id.clone()).collect();
        prop_assert_eq!(first_ids, second_ids);
    }
}
