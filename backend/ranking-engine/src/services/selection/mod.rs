use crate::models::{
    CandidateItem, RankingStats, SelectedItem, SelectionPass, SourceDistribution,
};
use crate::services::dedup::Deduplicator;
use crate::services::source_normalizer::SourceNormalizer;
use crate::utils::desc_score;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    pub target_count: usize,
    /// Maximum items per normalized source; <= 0 means unlimited
    pub per_source_cap: i64,
    pub high_threshold: f32,
    pub mid_threshold: f32,
    pub skew_threshold: f32,
    /// Normalized source keys that never enter any pass
    pub excluded_sources: Vec<String>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            target_count: 5,
            per_source_cap: 2,
            high_threshold: 8.0,
            mid_threshold: 7.0,
            skew_threshold: 0.4,
            excluded_sources: Vec::new(),
        }
    }
}

/// Accumulator shared by every selection pass. `consumed` marks pool
/// positions already accepted or discarded as duplicates.
///
/// Dedupe keys are recorded only when an item is accepted, so a candidate
/// rejected for its source cap never shadows a later duplicate.
#[derive(Debug, Default)]
pub struct SelectionState {
    deduplicator: Deduplicator,
    source_counts: BTreeMap<String, usize>,
    consumed: Vec<bool>,
    selected: Vec<SelectedItem>,
    cap_rejections: usize,
    duplicate_rejections: usize,
}

impl SelectionState {
    fn new(pool_size: usize) -> Self {
        Self {
            consumed: vec![false; pool_size],
            ..Default::default()
        }
    }

    pub fn selected(&self) -> &[SelectedItem] {
        &self.selected
    }

    pub fn source_count(&self, source_key: &str) -> usize {
        self.source_counts.get(source_key).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub selected: Vec<SelectedItem>,
    pub distribution: SourceDistribution,
    pub stats: RankingStats,
}

struct Candidate {
    index: usize,
    source_key: String,
    item: CandidateItem,
}

/// Diversity-Constrained Selector
///
/// Three passes over candidates sorted by base score:
/// high confidence, mid confidence, then fallback on anything left.
/// Source cap and dedupe hold in every pass; the result under-fills
/// rather than violating either.
pub struct DiversitySelector {
    config: SelectionConfig,
    normalizer: SourceNormalizer,
    cap: Option<usize>,
    excluded: HashSet<String>,
}

impl DiversitySelector {
    pub fn new(config: SelectionConfig) -> Self {
        Self::with_normalizer(config, SourceNormalizer::new())
    }

    pub fn with_normalizer(config: SelectionConfig, normalizer: SourceNormalizer) -> Self {
        let cap = if config.per_source_cap <= 0 {
            warn!(
                per_source_cap = config.per_source_cap,
                "per_source_cap <= 0, source cap disabled"
            );
            None
        } else {
            Some(config.per_source_cap as usize)
        };

        let excluded = config
            .excluded_sources
            .iter()
            .map(|s| normalizer.normalize(s))
            .collect();

        Self {
            config,
            normalizer,
            cap,
            excluded,
        }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &SourceNormalizer {
        &self.normalizer
    }

    pub fn select(&self, items: Vec<CandidateItem>) -> SelectionOutcome {
        let input_count = items.len();
        let mut stats = RankingStats {
            input_count,
            target_count: self.config.target_count,
            ..Default::default()
        };

        let mut candidates: Vec<Candidate> = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let source_key = self.normalizer.normalize(&item.source);
            if self.excluded.contains(&source_key) {
                debug!(item_id = %item.id, source = %source_key, "Excluded source");
                stats.excluded_count += 1;
                continue;
            }
            candidates.push(Candidate {
                index,
                source_key,
                item,
            });
        }

        candidates.sort_by(priority_order);

        let mut state = SelectionState::new(candidates.len());

        if self.config.target_count > 0 {
            let high = self.config.high_threshold;
            let mid = self.config.mid_threshold;

            stats.high_pass_count =
                self.run_pass(&candidates, &mut state, SelectionPass::High, |s| s >= high);
            stats.mid_pass_count =
                self.run_pass(&candidates, &mut state, SelectionPass::Mid, |s| s >= mid);
            stats.fallback_pass_count =
                self.run_pass(&candidates, &mut state, SelectionPass::Fallback, |_| true);
        }

        let distribution = source_distribution(&state.selected, self.config.skew_threshold);

        stats.duplicate_count = state.duplicate_rejections;
        stats.final_count = state.selected.len();
        stats.under_filled = stats.final_count < self.config.target_count && state.cap_rejections > 0;

        if stats.under_filled {
            warn!(
                final_count = stats.final_count,
                target_count = self.config.target_count,
                "Selection under-filled: per-source cap left too few candidates"
            );
        }

        info!(
            input_count = input_count,
            excluded = stats.excluded_count,
            high = stats.high_pass_count,
            mid = stats.mid_pass_count,
            fallback = stats.fallback_pass_count,
            final_count = stats.final_count,
            "Selection complete"
        );

        SelectionOutcome {
            selected: state.selected,
            distribution,
            stats,
        }
    }

    /// Accept qualifying candidates until the target is reached. Returns the
    /// number accepted by this pass.
    fn run_pass<F>(
        &self,
        candidates: &[Candidate],
        state: &mut SelectionState,
        pass: SelectionPass,
        qualifies: F,
    ) -> usize
    where
        F: Fn(f32) -> bool,
    {
        let mut accepted = 0;

        for (position, candidate) in candidates.iter().enumerate() {
            if state.selected.len() >= self.config.target_count {
                break;
            }
            if state.consumed[position] || !qualifies(candidate.item.base_score) {
                continue;
            }

            if let Some(cap) = self.cap {
                if state.source_count(&candidate.source_key) >= cap {
                    debug!(
                        item_id = %candidate.item.id,
                        source = %candidate.source_key,
                        pass = pass.as_str(),
                        "Source cap reached"
                    );
                    state.cap_rejections += 1;
                    continue;
                }
            }

            let key = Deduplicator::key(&candidate.item);
            if state.deduplicator.contains(&key) {
                debug!(item_id = %candidate.item.id, key = %key, "Duplicate skipped");
                state.duplicate_rejections += 1;
                state.consumed[position] = true;
                continue;
            }

            state.deduplicator.mark_unique(key);
            state.consumed[position] = true;
            *state
                .source_counts
                .entry(candidate.source_key.clone())
                .or_insert(0) += 1;
            state.selected.push(SelectedItem {
                item: candidate.item.clone(),
                source_key: candidate.source_key.clone(),
                pass,
            });
            accepted += 1;
        }

        debug!(pass = pass.as_str(), accepted = accepted, "Selection pass finished");
        accepted
    }
}

/// Score desc, then newer first (undated last), then input order
fn priority_order(a: &Candidate, b: &Candidate) -> Ordering {
    desc_score(a.item.base_score, b.item.base_score)
        .then_with(|| match (a.item.published_at, b.item.published_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.index.cmp(&b.index))
}

/// Per-source counts of a selection, flagging skew when one source's share
/// is strictly greater than `skew_threshold`
pub fn source_distribution(selected: &[SelectedItem], skew_threshold: f32) -> SourceDistribution {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for entry in selected {
        *counts.entry(entry.source_key.clone()).or_insert(0) += 1;
    }

    let total = selected.len();
    let dominant = counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(source, count)| (source.clone(), *count));

    let (dominant_source, dominant_share) = match dominant {
        Some((source, count)) if total > 0 => (Some(source), count as f32 / total as f32),
        _ => (None, 0.0),
    };

    let skewed = dominant_share > skew_threshold;
    if skewed {
        warn!(
            source = dominant_source.as_deref().unwrap_or_default(),
            share = dominant_share,
            threshold = skew_threshold,
            "Source distribution skewed"
        );
    }

    SourceDistribution {
        counts,
        total,
        skewed,
        dominant_source: if skewed { dominant_source } else { None },
        dominant_share,
    }
}
