// ============================================
// Deduplicator
// ============================================
//
// Identity key per candidate:
// 1. Normalized URL (scheme, www., fragment, trailing slash and tracking
//    query parameters stripped)
// 2. Normalized title (lowercased, punctuation stripped, whitespace collapsed)
// 3. Item id, when both of the above are empty
//
// Keys are computed per run and never persisted.

use crate::models::CandidateItem;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;
use url::{form_urlencoded, Url};

const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "ref", "ref_src", "mc_cid", "mc_eid", "igshid", "spm", "si",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupeKey(String);

impl DedupeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tracks which identity keys have already been accepted
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    seen: HashSet<DedupeKey>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the identity key of an item
    pub fn key(item: &CandidateItem) -> DedupeKey {
        if let Some(url) = item.url.as_deref().and_then(normalize_url) {
            return DedupeKey(format!("url:{}", url));
        }

        let title = normalize_title(&item.title);
        if !title.is_empty() {
            return DedupeKey(format!("title:{}", title));
        }

        DedupeKey(format!("id:{}", item.id.trim()))
    }

    pub fn contains(&self, key: &DedupeKey) -> bool {
        self.seen.contains(key)
    }

    /// Record the key; returns false when it was already seen
    pub fn mark_unique(&mut self, key: DedupeKey) -> bool {
        self.seen.insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Keep the first occurrence of every identity key, preserving order
pub fn dedupe(items: Vec<CandidateItem>) -> Vec<CandidateItem> {
    let mut deduplicator = Deduplicator::new();
    let input_count = items.len();

    let unique: Vec<CandidateItem> = items
        .into_iter()
        .filter(|item| deduplicator.mark_unique(Deduplicator::key(item)))
        .collect();

    debug!(
        input_count = input_count,
        unique_count = unique.len(),
        "Deduplicated items"
    );

    unique
}

/// Normalize a URL for identity comparison. `None` for blank input.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    match Url::parse(trimmed) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => {
                let mut key = host.trim_start_matches("www.").to_lowercase();
                if let Some(port) = parsed.port() {
                    key.push_str(&format!(":{}", port));
                }
                key.push_str(parsed.path().trim_end_matches('/'));

                // Re-encode kept pairs so escaped separators stay escaped
                let mut query = form_urlencoded::Serializer::new(String::new());
                let mut kept = 0;
                for (name, value) in parsed.query_pairs() {
                    if is_tracking_param(&name) {
                        continue;
                    }
                    query.append_pair(&name, &value);
                    kept += 1;
                }

                if kept > 0 {
                    key.push('?');
                    key.push_str(&query.finish());
                }
                Some(key)
            }
            None => normalize_url_text(trimmed),
        },
        Err(_) => normalize_url_text(trimmed),
    }
}

/// String-level fallback for inputs the URL parser rejects
fn normalize_url_text(raw: &str) -> Option<String> {
    let without_scheme = raw.split_once("://").map(|(_, rest)| rest).unwrap_or(raw);
    let without_fragment = without_scheme.split('#').next().unwrap_or_default();

    let (path, query) = match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_fragment, None),
    };

    let path = path.trim_start_matches("www.").trim_end_matches('/');
    let mut key = path.to_string();

    if let Some(query) = query {
        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| {
                let name = pair.split('=').next().unwrap_or_default();
                !is_tracking_param(name)
            })
            .collect();
        if !kept.is_empty() {
            key.push('?');
            key.push_str(&kept.join("&"));
        }
    }

    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

fn is_tracking_param(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.starts_with("utm") || TRACKING_PARAMS.contains(&name.as_str())
}

/// Lowercase, drop punctuation, collapse whitespace
pub fn normalize_title(title: &str) -> String {
    let stripped: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
