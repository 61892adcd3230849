use crate::models::{CandidateItem, RejectedItem};
use thiserror::Error;
use tracing::warn;

pub const MAX_BASE_SCORE: f32 = 10.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ItemValidationError {
    #[error("missing item id")]
    MissingId,

    #[error("missing source")]
    MissingSource,

    #[error("base score is not finite")]
    NonFiniteScore,

    #[error("negative base score {0}")]
    NegativeScore(f32),

    #[error("base score {0} exceeds 10")]
    ScoreOutOfRange(f32),
}

pub type Result<T> = std::result::Result<T, ItemValidationError>;

pub fn validate_item(item: &CandidateItem) -> Result<()> {
    if item.id.trim().is_empty() {
        return Err(ItemValidationError::MissingId);
    }
    if item.source.trim().is_empty() {
        return Err(ItemValidationError::MissingSource);
    }
    if !item.base_score.is_finite() {
        return Err(ItemValidationError::NonFiniteScore);
    }
    if item.base_score < 0.0 {
        return Err(ItemValidationError::NegativeScore(item.base_score));
    }
    if item.base_score > MAX_BASE_SCORE {
        return Err(ItemValidationError::ScoreOutOfRange(item.base_score));
    }
    Ok(())
}

/// Split a pool into valid items and rejections, preserving order
pub fn partition_valid(items: Vec<CandidateItem>) -> (Vec<CandidateItem>, Vec<RejectedItem>) {
    let mut valid = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();

    for item in items {
        match validate_item(&item) {
            Ok(()) => valid.push(item),
            Err(e) => {
                warn!(item_id = %item.id, reason = %e, "Rejecting malformed item");
                rejected.push(RejectedItem {
                    item_id: item.id,
                    reason: e.to_string(),
                });
            }
        }
    }

    (valid, rejected)
}
