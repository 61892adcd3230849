// ============================================
// Source Normalizer
// ============================================
//
// Collapses raw source labels into stable keys used for per-source caps,
// distribution diagnostics and source-scope weights:
//
//   "arXiv (cs.AI)"            -> "arxiv"
//   "arXiv cs.LG"              -> "arxiv"
//   "LangChain (v1.0.2)"       -> "langchain"
//   "Hacker News - Front Page" -> "hn"
//
// Steps: strip bracketed and dash/pipe separated suffixes, lower-case,
// collapse whitespace, then look up the alias table (configured aliases
// first, built-in exact aliases second, publisher-family prefixes last).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static BRACKETED_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[\(\[][^\)\]]*[\)\]]").expect("bracket pattern is valid"));

static CATEGORY_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+[-|–—]\s+.*$").expect("suffix pattern is valid"));

/// Exact aliases, keyed by the cleaned lowercase label
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("hacker news", "hn"),
    ("hackernews", "hn"),
    ("news.ycombinator.com", "hn"),
    ("hugging face papers", "huggingface"),
    ("hugging face blog", "huggingface"),
    ("huggingface papers", "huggingface"),
    ("hf daily papers", "huggingface"),
    ("papers with code", "paperswithcode"),
    ("paperswithcode.com", "paperswithcode"),
    ("openai blog", "openai"),
    ("openai news", "openai"),
    ("google ai blog", "google-ai"),
    ("google research blog", "google-ai"),
    ("deepmind blog", "deepmind"),
    ("google deepmind blog", "deepmind"),
    ("towards data science", "towardsdatascience"),
    ("github trending", "github"),
    ("product hunt", "producthunt"),
];

/// Publisher families: every cleaned label starting with the prefix maps to the key
const FAMILY_PREFIXES: &[(&str, &str)] = &[
    ("arxiv", "arxiv"),
    ("r/", "reddit"),
    ("reddit", "reddit"),
    ("hugging face", "huggingface"),
];

/// Pure, total source label normalizer
#[derive(Debug, Clone, Default)]
pub struct SourceNormalizer {
    extra_aliases: HashMap<String, String>,
}

impl SourceNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with additional aliases that take priority over the built-in table
    pub fn with_aliases(aliases: HashMap<String, String>) -> Self {
        let extra_aliases = aliases
            .into_iter()
            .map(|(raw, key)| (clean(&raw), key.trim().to_lowercase()))
            .filter(|(raw, key)| !raw.is_empty() && !key.is_empty())
            .collect();

        Self { extra_aliases }
    }

    /// Normalize a raw source label to its stable key
    pub fn normalize(&self, raw_source: &str) -> String {
        let cleaned = clean(raw_source);
        if cleaned.is_empty() {
            return raw_source.trim().to_lowercase();
        }

        if let Some(key) = self.extra_aliases.get(&cleaned) {
            return key.clone();
        }

        if let Some((_, key)) = BUILTIN_ALIASES.iter().find(|(alias, _)| *alias == cleaned) {
            return (*key).to_string();
        }

        if let Some((_, key)) = FAMILY_PREFIXES
            .iter()
            .find(|(prefix, _)| cleaned.starts_with(prefix))
        {
            return (*key).to_string();
        }

        cleaned
    }
}

/// Convenience wrapper using only the built-in alias table
pub fn normalize_source(raw_source: &str) -> String {
    static DEFAULT: Lazy<SourceNormalizer> = Lazy::new(SourceNormalizer::new);
    DEFAULT.normalize(raw_source)
}

fn clean(raw: &str) -> String {
    let without_brackets = BRACKETED_SUFFIX.replace_all(raw, "");
    let without_suffix = CATEGORY_SUFFIX.replace(without_brackets.trim(), "");

    without_suffix
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
