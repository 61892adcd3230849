// ============================================
// Ranking Pipeline
// ============================================
//
// validate -> select -> rerank, over one Weight Store snapshot per run.
// Every run gets a `run_id` recorded on its tracing span and in the result.

use crate::config::RankingConfig;
use crate::models::{CandidateItem, RankedResult, UserProfile};
use crate::services::ranking::{RelevanceReranker, Result};
use crate::services::selection::{DiversitySelector, SelectionConfig};
use crate::services::source_normalizer::SourceNormalizer;
use crate::services::validation::partition_valid;
use crate::services::weights::{SharedWeightStore, WeightStore};
use tracing::{info, info_span};
use uuid::Uuid;

pub struct RankingPipeline {
    selector: DiversitySelector,
}

impl RankingPipeline {
    pub fn new(selection: SelectionConfig, normalizer: SourceNormalizer) -> Self {
        Self {
            selector: DiversitySelector::with_normalizer(selection, normalizer),
        }
    }

    pub fn from_config(config: &RankingConfig) -> Self {
        Self::new(config.selection.clone(), config.normalizer())
    }

    /// Rank one candidate pool
    pub fn run(
        &self,
        pool: Vec<CandidateItem>,
        profile: &UserProfile,
        weights: &WeightStore,
    ) -> RankedResult {
        let run_id = Uuid::new_v4();
        let span = info_span!("ranking_run", run_id = %run_id, weights_version = weights.version());
        let _guard = span.enter();

        let input_count = pool.len();
        let (valid, rejected) = partition_valid(pool);

        let outcome = self.selector.select(valid);
        let reranker = RelevanceReranker::new(profile);
        let items = reranker.rerank(outcome.selected, weights);

        let mut stats = outcome.stats;
        stats.input_count = input_count;
        stats.rejected_count = rejected.len();

        info!(
            input_count = stats.input_count,
            rejected = stats.rejected_count,
            final_count = items.len(),
            skewed = outcome.distribution.skewed,
            "Ranking run complete"
        );

        RankedResult {
            run_id,
            weights_version: weights.version(),
            items,
            distribution: outcome.distribution,
            rejected,
            stats,
        }
    }

    /// Rank against a snapshot of a shared store
    pub fn run_shared(
        &self,
        pool: Vec<CandidateItem>,
        profile: &UserProfile,
        shared: &SharedWeightStore,
    ) -> Result<RankedResult> {
        let snapshot = shared.snapshot()?;
        Ok(self.run(pool, profile, &snapshot))
    }
}

/// Parse a JSON array of candidates
pub fn parse_pool(json: &str) -> Result<Vec<CandidateItem>> {
    Ok(serde_json::from_str(json)?)
}
