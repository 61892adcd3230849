pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use config::RankingConfig;
pub use services::{
    DiversitySelector, RankingPipeline, RelevanceReranker, SourceNormalizer, WeightAdjuster,
    WeightStore,
};
