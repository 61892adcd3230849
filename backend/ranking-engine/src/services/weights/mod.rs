//! Weight Store Module
//!
//! Bounded, versioned key -> value store of ranking multipliers, plus the
//! feedback-driven Weight Adjuster that tunes it.
//!
//! # Architecture
//! - **Keys**: `scope:name` (`global:similarity`, `section:must_read`,
//!   `source:hn`, `category:paper`)
//! - **Store**: clamped values, version counter, append-only audit log
//! - **Repository**: injectable persistence (in-memory, JSON file)
//! - **Adjuster**: pure `(store, feedback, now) -> (store, report)`
//!
//! # Bounds (defaults)
//! | scope    | min | max |
//! |----------|-----|-----|
//! | global   | 0.0 | 1.0 |
//! | section  | 0.3 | 2.0 |
//! | source   | 0.2 | 2.0 |
//! | category | 0.3 | 2.0 |

pub mod adjuster;
pub mod repository;
pub mod store;

pub use adjuster::{
    AdjusterConfig, AdjustmentOutcome, AdjustmentReport, AppliedAdjustment, SkippedScope,
    WeightAdjuster,
};
pub use repository::{InMemoryWeightRepository, JsonFileWeightRepository, WeightRepository};
pub use store::{AuditRecord, SharedWeightStore, WeightEntry, WeightStore};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const BASE_WEIGHT: &str = "base";
pub const SIMILARITY_WEIGHT: &str = "similarity";
pub const ACTIVITY_WEIGHT: &str = "activity";

#[derive(Debug, Error)]
pub enum WeightError {
    #[error("Weight store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Weight store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Weight store lock poisoned")]
    LockPoisoned,

    #[error("Invalid weight key: {0}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, WeightError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightScope {
    Global,
    Section,
    Source,
    Category,
}

impl WeightScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightScope::Global => "global",
            WeightScope::Section => "section",
            WeightScope::Source => "source",
            WeightScope::Category => "category",
        }
    }
}

impl fmt::Display for WeightScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeightScope {
    type Err = WeightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "global" => Ok(WeightScope::Global),
            "section" => Ok(WeightScope::Section),
            "source" => Ok(WeightScope::Source),
            "category" => Ok(WeightScope::Category),
            other => Err(WeightError::InvalidKey(format!("unknown scope '{}'", other))),
        }
    }
}

/// Identity of a weight entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeightKey {
    pub scope: WeightScope,
    pub name: String,
}

impl WeightKey {
    pub fn new(scope: WeightScope, name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            scope,
            name: name.trim().to_lowercase(),
        }
    }

    pub fn global(name: impl Into<String>) -> Self {
        Self::new(WeightScope::Global, name)
    }

    pub fn section(name: impl Into<String>) -> Self {
        Self::new(WeightScope::Section, name)
    }

    pub fn source(name: impl Into<String>) -> Self {
        Self::new(WeightScope::Source, name)
    }

    pub fn category(name: impl Into<String>) -> Self {
        Self::new(WeightScope::Category, name)
    }

    /// Value an absent key reads as
    pub fn default_value(&self) -> f64 {
        match (self.scope, self.name.as_str()) {
            (WeightScope::Global, BASE_WEIGHT) => 0.3,
            (WeightScope::Global, SIMILARITY_WEIGHT) => 0.4,
            (WeightScope::Global, ACTIVITY_WEIGHT) => 0.3,
            _ => 1.0,
        }
    }
}

impl fmt::Display for WeightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.name)
    }
}

impl FromStr for WeightKey {
    type Err = WeightError;

    fn from_str(s: &str) -> Result<Self> {
        let (scope, name) = s
            .split_once(':')
            .ok_or_else(|| WeightError::InvalidKey(format!("'{}' is not scope:name", s)))?;

        if name.trim().is_empty() {
            return Err(WeightError::InvalidKey(format!("'{}' has an empty name", s)));
        }

        Ok(WeightKey::new(scope.parse()?, name))
    }
}

impl Serialize for WeightKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WeightKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScopeBounds {
    pub min: f64,
    pub max: f64,
}

impl ScopeBounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min >= 0.0 && self.min <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        // max/min instead of f64::clamp: never panics on inverted bounds
        value.max(self.min).min(self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Per-scope value bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightBounds {
    pub global: ScopeBounds,
    pub section: ScopeBounds,
    pub source: ScopeBounds,
    pub category: ScopeBounds,
}

impl Default for WeightBounds {
    fn default() -> Self {
        Self {
            global: ScopeBounds::new(0.0, 1.0),
            section: ScopeBounds::new(0.3, 2.0),
            source: ScopeBounds::new(0.2, 2.0),
            category: ScopeBounds::new(0.3, 2.0),
        }
    }
}

impl WeightBounds {
    pub fn for_scope(&self, scope: WeightScope) -> ScopeBounds {
        match scope {
            WeightScope::Global => self.global,
            WeightScope::Section => self.section,
            WeightScope::Source => self.source,
            WeightScope::Category => self.category,
        }
    }

    pub fn clamp(&self, key: &WeightKey, value: f64) -> f64 {
        self.for_scope(key.scope).clamp(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_round_trips_through_string() {
        let key: WeightKey = "source:HN".parse().unwrap();
        assert_eq!(key, WeightKey::source("hn"));
        assert_eq!(key.to_string(), "source:hn");
    }

    #[test]
    fn test_invalid_keys_rejected() {
        assert!("hn".parse::<WeightKey>().is_err());
        assert!("planet:hn".parse::<WeightKey>().is_err());
        assert!("source: ".parse::<WeightKey>().is_err());
    }

    #[test]
    fn test_default_values() {
        assert_eq!(WeightKey::global(SIMILARITY_WEIGHT).default_value(), 0.4);
        assert_eq!(WeightKey::global(BASE_WEIGHT).default_value(), 0.3);
        assert_eq!(WeightKey::source("arxiv").default_value(), 1.0);
    }

    #[test]
    fn test_bounds_clamp_per_scope() {
        let bounds = WeightBounds::default();
        assert_eq!(bounds.clamp(&WeightKey::source("hn"), 0.05), 0.2);
        assert_eq!(bounds.clamp(&WeightKey::section("must_read"), 0.05), 0.3);
        assert_eq!(bounds.clamp(&WeightKey::category("paper"), 5.0), 2.0);
        assert_eq!(bounds.clamp(&WeightKey::global("similarity"), 1.5), 1.0);
    }

    #[test]
    fn test_scope_bounds_validity() {
        assert!(ScopeBounds::new(0.2, 2.0).is_valid());
        assert!(!ScopeBounds::new(2.0, 0.2).is_valid());
        assert!(!ScopeBounds::new(f64::NAN, 1.0).is_valid());
    }
}
