use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A scored content candidate produced by the external scorer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Raw source label as reported by the collector, e.g. "arXiv (cs.AI)"
    pub source: String,
    #[serde(default)]
    pub category: String,
    /// LLM-assigned score on a 0-10 scale
    pub base_score: f32,
    #[serde(default)]
    pub related_entities: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Free-text "why this matters to you" note from the scorer
    #[serde(default)]
    pub relevance_note: Option<String>,
    /// Only used to break base_score ties (newer first)
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl CandidateItem {
    /// Text used for lexical similarity against the user profile
    pub fn similarity_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if !self.title.trim().is_empty() {
            parts.push(self.title.as_str());
        }
        if let Some(summary) = self.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(summary);
        }
        if let Some(note) = self.relevance_note.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(note);
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackAction {
    View,
    Click,
    Like,
    Dislike,
    Neutral,
}

impl FeedbackAction {
    pub const ALL: [FeedbackAction; 5] = [
        FeedbackAction::View,
        FeedbackAction::Click,
        FeedbackAction::Like,
        FeedbackAction::Dislike,
        FeedbackAction::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackAction::View => "view",
            FeedbackAction::Click => "click",
            FeedbackAction::Like => "like",
            FeedbackAction::Dislike => "dislike",
            FeedbackAction::Neutral => "neutral",
        }
    }

    /// Explicit feedback counts toward a scope's sample count; implicit
    /// engagement (view, click) does not.
    pub fn is_explicit(&self) -> bool {
        matches!(
            self,
            FeedbackAction::Like | FeedbackAction::Dislike | FeedbackAction::Neutral
        )
    }
}

/// A user behavior event from the tracking collaborator. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackEvent {
    pub item_id: String,
    pub action: FeedbackAction,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    High,
    Medium,
    Low,
    #[default]
    #[serde(other)]
    Unknown,
}

impl PriorityTier {
    pub fn activity(&self) -> f32 {
        match self {
            PriorityTier::High => 0.9,
            PriorityTier::Medium => 0.7,
            PriorityTier::Low => 0.5,
            PriorityTier::Unknown => 0.5,
        }
    }
}

/// User-facing profile: three text buckets for similarity plus the static
/// entity activity map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub active_projects: Vec<String>,
    #[serde(default)]
    pub implicit_interests: Vec<String>,
    /// entity name -> priority tier
    #[serde(default)]
    pub activity: BTreeMap<String, PriorityTier>,
}

/// Which selection pass accepted an item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPass {
    High,
    Mid,
    Fallback,
}

impl SelectionPass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionPass::High => "high",
            SelectionPass::Mid => "mid",
            SelectionPass::Fallback => "fallback",
        }
    }
}

/// An item accepted by the selector, before reranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedItem {
    pub item: CandidateItem,
    pub source_key: String,
    pub pass: SelectionPass,
}

/// Per-source counts of a result plus the skew diagnostic
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceDistribution {
    pub counts: BTreeMap<String, usize>,
    pub total: usize,
    pub skewed: bool,
    /// Most represented source when `skewed` is set
    pub dominant_source: Option<String>,
    pub dominant_share: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub base_norm: f32,
    pub similarity: f32,
    pub activity: f32,
    /// Weighted blend before multipliers
    pub blend: f32,
    pub source_weight: f32,
    pub category_weight: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedItem {
    pub item: CandidateItem,
    pub source_key: String,
    pub composite_score: f32,
    pub selection_pass: SelectionPass,
    pub breakdown: ScoreBreakdown,
}

/// Item excluded before selection, with the reason it was rejected
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RejectedItem {
    pub item_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RankingStats {
    pub input_count: usize,
    pub rejected_count: usize,
    pub excluded_count: usize,
    pub duplicate_count: usize,
    pub high_pass_count: usize,
    pub mid_pass_count: usize,
    pub fallback_pass_count: usize,
    pub final_count: usize,
    pub target_count: usize,
    pub under_filled: bool,
}

/// Ordered output of one ranking run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub run_id: Uuid,
    pub weights_version: u64,
    pub items: Vec<RankedItem>,
    pub distribution: SourceDistribution,
    pub rejected: Vec<RejectedItem>,
    pub stats: RankingStats,
}

impl RankedResult {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
