pub mod activity;
pub mod dedup;
pub mod pipeline;
pub mod ranking;
pub mod selection;
pub mod source_normalizer;
pub mod validation;
pub mod weights;

pub use activity::ActivityTracker;
pub use dedup::{DedupeKey, Deduplicator};
pub use pipeline::RankingPipeline;
pub use ranking::{BlendWeights, RankingError, RelevanceReranker};
pub use selection::{DiversitySelector, SelectionConfig, SelectionOutcome};
pub use source_normalizer::SourceNormalizer;
pub use weights::{
    AdjustmentReport, SharedWeightStore, WeightAdjuster, WeightKey, WeightStore, WeightScope,
};
