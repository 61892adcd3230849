use crate::services::selection::SelectionConfig;
use crate::services::source_normalizer::SourceNormalizer;
use crate::services::weights::{AdjusterConfig, ScopeBounds, WeightBounds, WeightScope};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

pub const ENV_PREFIX: &str = "RANKING_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid {field} = {value}: {reason}")]
    Invalid {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Invalid bounds for scope {scope}: [{min}, {max}]")]
    InvalidBounds {
        scope: WeightScope,
        min: f64,
        max: f64,
    },

    #[error("Invalid source alias '{0}', expected raw=key")]
    InvalidAlias(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Flat view of the `RANKING_*` environment variables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct EnvConfig {
    target_count: usize,
    per_source_cap: i64,
    high_threshold: f32,
    mid_threshold: f32,
    skew_threshold: f32,
    excluded_sources: Vec<String>,
    source_aliases: Vec<String>,

    lookback_days: i64,
    ema_alpha: f64,
    step_size: f64,
    section_min_samples: u64,
    source_min_samples: u64,
    reinforcement_factor: f64,

    global_min: f64,
    global_max: f64,
    section_min: f64,
    section_max: f64,
    source_min: f64,
    source_max: f64,
    category_min: f64,
    category_max: f64,

    weights_path: PathBuf,
    log_json: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        let selection = SelectionConfig::default();
        let adjuster = AdjusterConfig::default();
        let bounds = WeightBounds::default();

        Self {
            target_count: selection.target_count,
            per_source_cap: selection.per_source_cap,
            high_threshold: selection.high_threshold,
            mid_threshold: selection.mid_threshold,
            skew_threshold: selection.skew_threshold,
            excluded_sources: selection.excluded_sources,
            source_aliases: Vec::new(),

            lookback_days: adjuster.lookback_days,
            ema_alpha: adjuster.ema_alpha,
            step_size: adjuster.step_size,
            section_min_samples: adjuster.section_min_samples,
            source_min_samples: adjuster.source_min_samples,
            reinforcement_factor: adjuster.reinforcement_factor,

            global_min: bounds.global.min,
            global_max: bounds.global.max,
            section_min: bounds.section.min,
            section_max: bounds.section.max,
            source_min: bounds.source.min,
            source_max: bounds.source.max,
            category_min: bounds.category.min,
            category_max: bounds.category.max,

            weights_path: PathBuf::from("data/weights.json"),
            log_json: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RankingConfig {
    pub selection: SelectionConfig,
    pub adjuster: AdjusterConfig,
    pub bounds: WeightBounds,
    /// `raw=key` entries layered over the built-in source alias table
    pub source_aliases: Vec<String>,
    pub weights_path: PathBuf,
    pub log_json: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        EnvConfig::default().into()
    }
}

impl From<EnvConfig> for RankingConfig {
    fn from(env: EnvConfig) -> Self {
        Self {
            selection: SelectionConfig {
                target_count: env.target_count,
                per_source_cap: env.per_source_cap,
                high_threshold: env.high_threshold,
                mid_threshold: env.mid_threshold,
                skew_threshold: env.skew_threshold,
                excluded_sources: env.excluded_sources,
            },
            adjuster: AdjusterConfig {
                lookback_days: env.lookback_days,
                ema_alpha: env.ema_alpha,
                step_size: env.step_size,
                section_min_samples: env.section_min_samples,
                source_min_samples: env.source_min_samples,
                reinforcement_factor: env.reinforcement_factor,
            },
            bounds: WeightBounds {
                global: ScopeBounds::new(env.global_min, env.global_max),
                section: ScopeBounds::new(env.section_min, env.section_max),
                source: ScopeBounds::new(env.source_min, env.source_max),
                category: ScopeBounds::new(env.category_min, env.category_max),
            },
            source_aliases: env.source_aliases,
            weights_path: env.weights_path,
            log_json: env.log_json,
        }
    }
}

impl RankingConfig {
    /// Load from `RANKING_*` environment variables (after `.env`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let env: EnvConfig = envy::prefixed(ENV_PREFIX).from_env()?;
        Ok(env.into())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env: EnvConfig = envy::prefixed(ENV_PREFIX).from_iter(vars)?;
        Ok(env.into())
    }

    /// Replace invalid values with safe defaults. Returns what was corrected;
    /// each correction is logged.
    pub fn validate(&mut self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let selection_defaults = SelectionConfig::default();
        let adjuster_defaults = AdjusterConfig::default();
        let bounds_defaults = WeightBounds::default();

        let selection = &mut self.selection;
        if !selection.high_threshold.is_finite()
            || !selection.mid_threshold.is_finite()
            || selection.mid_threshold > selection.high_threshold
        {
            errors.push(ConfigError::Invalid {
                field: "mid_threshold",
                value: format!("{} (high {})", selection.mid_threshold, selection.high_threshold),
                reason: "thresholds must be finite with mid <= high",
            });
            selection.high_threshold = selection_defaults.high_threshold;
            selection.mid_threshold = selection_defaults.mid_threshold;
        }

        if !(selection.skew_threshold > 0.0 && selection.skew_threshold <= 1.0) {
            errors.push(ConfigError::Invalid {
                field: "skew_threshold",
                value: selection.skew_threshold.to_string(),
                reason: "must be in (0, 1]",
            });
            selection.skew_threshold = selection_defaults.skew_threshold;
        }

        let adjuster = &mut self.adjuster;
        if !(adjuster.ema_alpha > 0.0 && adjuster.ema_alpha <= 1.0) {
            errors.push(ConfigError::Invalid {
                field: "ema_alpha",
                value: adjuster.ema_alpha.to_string(),
                reason: "must be in (0, 1]",
            });
            adjuster.ema_alpha = adjuster_defaults.ema_alpha;
        }

        if !adjuster.step_size.is_finite() || adjuster.step_size <= 0.0 {
            errors.push(ConfigError::Invalid {
                field: "step_size",
                value: adjuster.step_size.to_string(),
                reason: "must be a positive number",
            });
            adjuster.step_size = adjuster_defaults.step_size;
        }

        if adjuster.lookback_days <= 0 || adjuster.lookback_days > 3650 {
            errors.push(ConfigError::Invalid {
                field: "lookback_days",
                value: adjuster.lookback_days.to_string(),
                reason: "must be between 1 and 3650",
            });
            adjuster.lookback_days = adjuster_defaults.lookback_days;
        }

        if !adjuster.reinforcement_factor.is_finite() || adjuster.reinforcement_factor <= 0.0 {
            errors.push(ConfigError::Invalid {
                field: "reinforcement_factor",
                value: adjuster.reinforcement_factor.to_string(),
                reason: "must be a positive number",
            });
            adjuster.reinforcement_factor = adjuster_defaults.reinforcement_factor;
        }

        for scope in [
            WeightScope::Global,
            WeightScope::Section,
            WeightScope::Source,
            WeightScope::Category,
        ] {
            let slot = match scope {
                WeightScope::Global => &mut self.bounds.global,
                WeightScope::Section => &mut self.bounds.section,
                WeightScope::Source => &mut self.bounds.source,
                WeightScope::Category => &mut self.bounds.category,
            };
            if !slot.is_valid() {
                errors.push(ConfigError::InvalidBounds {
                    scope,
                    min: slot.min,
                    max: slot.max,
                });
                *slot = bounds_defaults.for_scope(scope);
            }
        }

        let (valid_aliases, invalid_aliases): (Vec<String>, Vec<String>) = self
            .source_aliases
            .drain(..)
            .partition(|entry| parse_alias(entry).is_some());
        self.source_aliases = valid_aliases;
        errors.extend(invalid_aliases.into_iter().map(ConfigError::InvalidAlias));

        if self.selection.per_source_cap <= 0 {
            warn!(
                per_source_cap = self.selection.per_source_cap,
                "per_source_cap <= 0 disables the source cap"
            );
        }

        for error in &errors {
            warn!(error = %error, "Configuration corrected");
        }

        errors
    }

    pub fn alias_map(&self) -> HashMap<String, String> {
        self.source_aliases
            .iter()
            .filter_map(|entry| parse_alias(entry))
            .collect()
    }

    pub fn normalizer(&self) -> SourceNormalizer {
        SourceNormalizer::with_aliases(self.alias_map())
    }
}

fn parse_alias(entry: &str) -> Option<(String, String)> {
    let (raw, key) = entry.split_once('=')?;
    let (raw, key) = (raw.trim(), key.trim());
    if raw.is_empty() || key.is_empty() {
        None
    } else {
        Some((raw.to_string(), key.to_string()))
    }
}
