// ============================================
// Weight Adjuster
// ============================================
//
// Per run:
// 1. Aggregate feedback inside the lookback window by section and by
//    normalized source. Only like / dislike / neutral count as samples.
// 2. Gate on the per-scope minimum sample count.
// 3. delta  = (likes - dislikes) / samples            in [-1, 1]
//    target = old * (1 + step_size * delta)
// 4. new    = old * (1 - alpha) + target * alpha      (EMA)
// 5. Clamp through the store (audited)
//
// `adjust` is pure; persistence goes through `adjust_and_persist`.

use super::repository::WeightRepository;
use super::store::{SharedWeightStore, WeightStore};
use super::{Result, WeightKey, WeightScope};
use crate::models::{FeedbackAction, FeedbackEvent};
use crate::services::source_normalizer::SourceNormalizer;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub const REASON_REINFORCE_PREFIX: &str = "reinforce";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjusterConfig {
    pub lookback_days: i64,
    pub ema_alpha: f64,
    pub step_size: f64,
    pub section_min_samples: u64,
    pub source_min_samples: u64,
    pub reinforcement_factor: f64,
}

impl Default for AdjusterConfig {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            ema_alpha: 0.2,
            step_size: 0.2,
            section_min_samples: 3,
            source_min_samples: 5,
            reinforcement_factor: 1.1,
        }
    }
}

/// Feedback tallies of one scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFeedback {
    pub likes: u64,
    pub dislikes: u64,
    pub neutrals: u64,
    pub views: u64,
    pub clicks: u64,
}

impl ScopeFeedback {
    pub fn count(&self, action: FeedbackAction) -> u64 {
        match action {
            FeedbackAction::Like => self.likes,
            FeedbackAction::Dislike => self.dislikes,
            FeedbackAction::Neutral => self.neutrals,
            FeedbackAction::View => self.views,
            FeedbackAction::Click => self.clicks,
        }
    }

    fn record(&mut self, action: FeedbackAction) {
        match action {
            FeedbackAction::Like => self.likes += 1,
            FeedbackAction::Dislike => self.dislikes += 1,
            FeedbackAction::Neutral => self.neutrals += 1,
            FeedbackAction::View => self.views += 1,
            FeedbackAction::Click => self.clicks += 1,
        }
    }

    /// Explicit feedback only
    pub fn samples(&self) -> u64 {
        FeedbackAction::ALL
            .iter()
            .filter(|action| action.is_explicit())
            .map(|action| self.count(*action))
            .sum()
    }

    /// Net signal in [-1, 1]; 0 without samples
    pub fn delta(&self) -> f64 {
        let samples = self.samples();
        if samples == 0 {
            return 0.0;
        }
        (self.likes as f64 - self.dislikes as f64) / samples as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackAggregate {
    pub sections: BTreeMap<String, ScopeFeedback>,
    pub sources: BTreeMap<String, ScopeFeedback>,
    pub total_events: usize,
    pub events_in_window: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedAdjustment {
    pub key: WeightKey,
    pub old_value: f64,
    pub new_value: f64,
    pub delta: f64,
    pub samples: u64,
    pub likes: u64,
    pub dislikes: u64,
}

/// Scope with feedback below its minimum sample count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedScope {
    pub key: WeightKey,
    pub samples: u64,
    pub required: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentReport {
    pub run_at: DateTime<Utc>,
    pub adjustments: Vec<AppliedAdjustment>,
    pub skipped: Vec<SkippedScope>,
    pub total_events: usize,
    pub events_in_window: usize,
    pub sections_analyzed: usize,
    pub sources_analyzed: usize,
    pub store_version: u64,
}

impl AdjustmentReport {
    pub fn has_changes(&self) -> bool {
        !self.adjustments.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AdjustmentOutcome {
    pub store: WeightStore,
    pub report: AdjustmentReport,
}

/// Weight Adjuster - bounded online tuning from explicit feedback
#[derive(Debug, Clone, Default)]
pub struct WeightAdjuster {
    config: AdjusterConfig,
    normalizer: SourceNormalizer,
}

impl WeightAdjuster {
    pub fn new(config: AdjusterConfig) -> Self {
        Self {
            config,
            normalizer: SourceNormalizer::new(),
        }
    }

    pub fn with_normalizer(config: AdjusterConfig, normalizer: SourceNormalizer) -> Self {
        Self { config, normalizer }
    }

    pub fn config(&self) -> &AdjusterConfig {
        &self.config
    }

    /// Tally events inside the lookback window by section and source
    pub fn aggregate(&self, events: &[FeedbackEvent], now: DateTime<Utc>) -> FeedbackAggregate {
        let cutoff = self.window_start(now);
        let mut aggregate = FeedbackAggregate {
            total_events: events.len(),
            ..Default::default()
        };

        for event in events.iter().filter(|e| e.timestamp >= cutoff) {
            aggregate.events_in_window += 1;

            if let Some(section) = scope_name(&event.section) {
                aggregate
                    .sections
                    .entry(section)
                    .or_default()
                    .record(event.action);
            }

            if scope_name(&event.source).is_some() {
                let source = self.normalizer.normalize(&event.source);
                aggregate.sources.entry(source).or_default().record(event.action);
            }
        }

        aggregate
    }

    /// Oldest timestamp inside the lookback window. A window reaching past
    /// the representable range covers all history.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let days = self.config.lookback_days.max(0);
        match Duration::try_days(days).and_then(|window| now.checked_sub_signed(window)) {
            Some(cutoff) => cutoff,
            None => {
                warn!(
                    lookback_days = self.config.lookback_days,
                    "lookback window out of range, using all feedback"
                );
                DateTime::<Utc>::MIN_UTC
            }
        }
    }

    /// Compute the adjusted store without touching persistence
    pub fn adjust(
        &self,
        store: &WeightStore,
        events: &[FeedbackEvent],
        now: DateTime<Utc>,
    ) -> AdjustmentOutcome {
        let aggregate = self.aggregate(events, now);
        let mut next = store.clone();
        let mut adjustments = Vec::new();
        let mut skipped = Vec::new();

        let scopes = aggregate
            .sections
            .iter()
            .map(|(name, fb)| {
                let key = WeightKey::new(WeightScope::Section, name.as_str());
                (key, *fb, self.config.section_min_samples)
            })
            .chain(aggregate.sources.iter().map(|(name, fb)| {
                let key = WeightKey::new(WeightScope::Source, name.as_str());
                (key, *fb, self.config.source_min_samples)
            }));

        for (key, feedback, required) in scopes {
            let samples = feedback.samples();
            if samples < required {
                debug!(key = %key, samples = samples, required = required, "Insufficient feedback");
                skipped.push(SkippedScope {
                    key,
                    samples,
                    required,
                });
                continue;
            }

            let delta = feedback.delta();
            let old_value = next.get(&key);
            let smoothed = self.smooth(old_value, delta);
            let reason = format!(
                "feedback: {} likes, {} dislikes, {} neutral over {}d",
                feedback.likes, feedback.dislikes, feedback.neutrals, self.config.lookback_days
            );
            let new_value = next.set(&key, smoothed, samples, &reason, now);

            if (new_value - old_value).abs() > f64::EPSILON {
                adjustments.push(AppliedAdjustment {
                    key,
                    old_value,
                    new_value,
                    delta,
                    samples,
                    likes: feedback.likes,
                    dislikes: feedback.dislikes,
                });
            }
        }

        let report = AdjustmentReport {
            run_at: now,
            adjustments,
            skipped,
            total_events: aggregate.total_events,
            events_in_window: aggregate.events_in_window,
            sections_analyzed: aggregate.sections.len(),
            sources_analyzed: aggregate.sources.len(),
            store_version: next.version(),
        };

        info!(
            total_events = report.total_events,
            events_in_window = report.events_in_window,
            adjusted = report.adjustments.len(),
            skipped = report.skipped.len(),
            version = report.store_version,
            "Weight adjustment computed"
        );

        AdjustmentOutcome {
            store: next,
            report,
        }
    }

    /// Adjust the shared store under its lock and persist the result
    pub fn adjust_and_persist<R>(
        &self,
        shared: &SharedWeightStore,
        repository: &R,
        events: &[FeedbackEvent],
        now: DateTime<Utc>,
    ) -> Result<AdjustmentReport>
    where
        R: WeightRepository + ?Sized,
    {
        shared.read_modify_write(repository, |store| {
            let outcome = self.adjust(store, events, now);
            *store = outcome.store;
            outcome.report
        })
    }

    /// One-off multiplicative boost for a confirmed-positive signal
    pub fn reinforce(
        &self,
        store: &mut WeightStore,
        key: &WeightKey,
        reason: &str,
        now: DateTime<Utc>,
    ) -> f64 {
        let old_value = store.get(key);
        let sample_count = store.entry(key).map(|e| e.sample_count).unwrap_or(0);
        let new_value = store.set(
            key,
            old_value * self.config.reinforcement_factor,
            sample_count,
            &format!("{}: {}", REASON_REINFORCE_PREFIX, reason),
            now,
        );

        info!(
            key = %key,
            old_value = old_value,
            new_value = new_value,
            "Weight reinforced"
        );
        new_value
    }

    fn smooth(&self, old_value: f64, delta: f64) -> f64 {
        let alpha = self.config.ema_alpha;
        let target = old_value * (1.0 + self.config.step_size * delta);
        old_value * (1.0 - alpha) + target * alpha
    }
}

/// Section / source label usable as a scope name
fn scope_name(raw: &str) -> Option<String> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() || name == "unknown" {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::weights::repository::{InMemoryWeightRepository, MockWeightRepository};
    use crate::services::weights::WeightBounds;

    fn event(action: FeedbackAction, section: &str, source: &str, now: DateTime<Utc>) -> FeedbackEvent {
        FeedbackEvent {
            item_id: "item".to_string(),
            action,
            section: section.to_string(),
            source: source.to_string(),
            timestamp: now - Duration::hours(1),
        }
    }

    fn repeat(n: usize, action: FeedbackAction, section: &str, source: &str, now: DateTime<Utc>) -> Vec<FeedbackEvent> {
        (0..n).map(|_| event(action, section, source, now)).collect()
    }

    #[test]
    fn test_six_likes_raise_source_weight() {
        let now = Utc::now();
        let adjuster = WeightAdjuster::default();
        let store = WeightStore::new(WeightBounds::default());
        let events = repeat(6, FeedbackAction::Like, "", "Hacker News", now);

        let outcome = adjuster.adjust(&store, &events, now);
        let value = outcome.store.get(&WeightKey::source("hn"));

        assert!((value - 1.04).abs() < 1e-9);
        assert_eq!(outcome.report.adjustments.len(), 1);
        assert_eq!(outcome.report.adjustments[0].samples, 6);
        assert_eq!(store.version(), 0, "input store untouched");
    }

    #[test]
    fn test_below_threshold_is_skipped() {
        let now = Utc::now();
        let adjuster = WeightAdjuster::default();
        let store = WeightStore::new(WeightBounds::default());
        let events = repeat(4, FeedbackAction::Like, "", "hn", now);

        let outcome = adjuster.adjust(&store, &events, now);

        assert_eq!(outcome.store.version(), 0);
        assert_eq!(outcome.report.skipped.len(), 1);
        assert_eq!(outcome.report.skipped[0].required, 5);
        assert_eq!(outcome.report.skipped[0].samples, 4);
    }

    #[test]
    fn test_views_and_clicks_do_not_count() {
        let now = Utc::now();
        let adjuster = WeightAdjuster::default();
        let store = WeightStore::new(WeightBounds::default());
        let mut events = repeat(2, FeedbackAction::Like, "must_read", "", now);
        events.extend(repeat(10, FeedbackAction::View, "must_read", "", now));
        events.extend(repeat(10, FeedbackAction::Click, "must_read", "", now));

        let outcome = adjuster.adjust(&store, &events, now);
        assert_eq!(outcome.report.skipped[0].samples, 2);
        assert_eq!(outcome.store.get(&WeightKey::section("must_read")), 1.0);
    }

    #[test]
    fn test_section_dislikes_lower_weight() {
        let now = Utc::now();
        let adjuster = WeightAdjuster::default();
        let store = WeightStore::new(WeightBounds::default());
        let events = repeat(3, FeedbackAction::Dislike, "Must_Read", "unknown", now);

        let outcome = adjuster.adjust(&store, &events, now);
        let value = outcome.store.get(&WeightKey::section("must_read"));

        assert!((value - 0.96).abs() < 1e-9);
        assert_eq!(outcome.report.sources_analyzed, 0);
    }

    #[test]
    fn test_events_outside_window_ignored() {
        let now = Utc::now();
        let adjuster = WeightAdjuster::default();
        let mut old = repeat(6, FeedbackAction::Like, "", "hn", now);
        for e in &mut old {
            e.timestamp = now - Duration::days(8);
        }

        let aggregate = adjuster.aggregate(&old, now);
        assert_eq!(aggregate.total_events, 6);
        assert_eq!(aggregate.events_in_window, 0);
        assert!(aggregate.sources.is_empty());
    }

    #[test]
    fn test_huge_lookback_covers_all_history() {
        let now = Utc::now();
        let adjuster = WeightAdjuster::new(AdjusterConfig {
            lookback_days: 1_000_000_000,
            ..Default::default()
        });
        let store = WeightStore::new(WeightBounds::default());
        let mut events = repeat(6, FeedbackAction::Like, "", "hn", now);
        for e in &mut events {
            e.timestamp = now - Duration::days(3650);
        }

        assert_eq!(adjuster.window_start(now), DateTime::<Utc>::MIN_UTC);

        let outcome = adjuster.adjust(&store, &events, now);
        assert_eq!(outcome.report.events_in_window, 6);
        assert!((outcome.store.get(&WeightKey::source("hn")) - 1.04).abs() < 1e-9);

        let unbounded = WeightAdjuster::new(AdjusterConfig {
            lookback_days: i64::MAX,
            ..Default::default()
        });
        assert_eq!(unbounded.window_start(now), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_samples_count_explicit_actions_only() {
        let mut feedback = ScopeFeedback::default();
        for action in FeedbackAction::ALL {
            feedback.record(action);
            feedback.record(action);
        }

        assert_eq!(feedback.samples(), 6);
        assert_eq!(feedback.count(FeedbackAction::View), 2);
        assert_eq!(feedback.delta(), 0.0);
    }

    #[test]
    fn test_weight_stays_within_max() {
        let now = Utc::now();
        let adjuster = WeightAdjuster::default();
        let mut store = WeightStore::new(WeightBounds::default());
        store.set(&WeightKey::source("hn"), 1.99, 0, "seed", now);

        let events = repeat(20, FeedbackAction::Like, "", "hn", now);
        let outcome = adjuster.adjust(&store, &events, now);
        assert_eq!(outcome.store.get(&WeightKey::source("hn")), 2.0);
    }

    #[test]
    fn test_reinforce_boosts_and_caps() {
        let now = Utc::now();
        let adjuster = WeightAdjuster::default();
        let mut store = WeightStore::new(WeightBounds::default());
        let key = WeightKey::section("must_read");

        let value = adjuster.reinforce(&mut store, &key, "confirmed useful", now);
        assert!((value - 1.1).abs() < 1e-9);
        assert!(store.audit_log()[0].reason.starts_with(REASON_REINFORCE_PREFIX));

        for _ in 0..20 {
            adjuster.reinforce(&mut store, &key, "again", now);
        }
        assert_eq!(store.get(&key), 2.0);
    }

    #[test]
    fn test_adjust_and_persist_saves_once() {
        let now = Utc::now();
        let adjuster = WeightAdjuster::default();
        let shared = SharedWeightStore::new(WeightStore::new(WeightBounds::default()));
        let mut repository = MockWeightRepository::new();
        repository.expect_save().times(1).returning(|_| Ok(()));

        let events = repeat(6, FeedbackAction::Like, "", "hn", now);
        let report = adjuster
            .adjust_and_persist(&shared, &repository, &events, now)
            .unwrap();

        assert!(report.has_changes());
        assert_eq!(shared.snapshot().unwrap().version(), 1);
    }

    #[test]
    fn test_adjust_and_persist_without_changes_skips_save() {
        let now = Utc::now();
        let adjuster = WeightAdjuster::default();
        let shared = SharedWeightStore::new(WeightStore::new(WeightBounds::default()));
        let repository = InMemoryWeightRepository::new();

        let report = adjuster
            .adjust_and_persist(&shared, &repository, &[], now)
            .unwrap();

        assert!(!report.has_changes());
        assert!(repository.stored().unwrap().is_none());
    }
}
