/// Ranking Module
///
/// Reorders the selector's output by a personalized composite score.
///
/// # Scoring
/// - **Blend**: `base_norm * W_base + similarity * W_sim + activity * W_activity`
///   (weights 0.3 / 0.4 / 0.3 unless the Weight Store overrides them)
/// - **Multipliers**: source weight and category weight from the Weight Store
///
/// # Workflow
/// 1. Normalize base score to [0, 1]
/// 2. Lexical similarity against the three profile buckets
/// 3. Entity activity from the Activity Tracker
/// 4. Blend, multiply, sort (membership never changes)
pub mod reranker;
pub mod similarity;

pub use reranker::{BlendWeights, RelevanceReranker};
pub use similarity::ProfileSimilarity;

use crate::services::weights::WeightError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("Weight store error: {0}")]
    WeightStore(#[from] WeightError),

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RankingError>;
