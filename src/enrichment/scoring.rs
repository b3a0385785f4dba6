//! Popularity, recency and text-assembly functions.
//!
//! All functions are pure over a document snapshot and an explicit
//! reference instant.

use crate::enrichment::config::ScoringWeights;
use crate::models::WorkIndexDocument;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Fractional days from `then` until `now` (negative for future instants)
pub fn days_between(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - then).num_seconds() as f64 / SECONDS_PER_DAY
}

/// Engagement-weighted popularity, normalised by length and decayed by age
pub fn popularity_score(
    doc: &WorkIndexDocument,
    now: DateTime<Utc>,
    weights: &ScoringWeights,
) -> f64 {
    let mut score = doc.kudos as f64 * weights.kudos_weight
        + doc.comments as f64 * weights.comments_weight
        + doc.bookmarks as f64 * weights.bookmarks_weight
        + doc.hits as f64 * weights.hits_weight;

    if doc.word_count > 0 && weights.length_normalization_words > 0.0 {
        score /= 1.0 + doc.word_count as f64 / weights.length_normalization_words;
    }

    let days = days_between(doc.published_at, now);
    if days > 0.0 {
        score *= 0.8 + 0.2 * (1.0 / (1.0 + days / 365.0));
    }

    score
}

/// Step function of days since the last update
pub fn recent_activity_score(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = days_between(updated_at, now);
    if days <= 1.0 {
        1.0
    } else if days <= 7.0 {
        0.8
    } else if days <= 30.0 {
        0.6
    } else if days <= 365.0 {
        0.3
    } else {
        0.1
    }
}

/// Space-joined blob of every human-readable field plus a content prefix
pub fn searchable_text(doc: &WorkIndexDocument, content_chars: usize) -> String {
    let content_prefix: String = doc.content.chars().take(content_chars).collect();

    let parts = [
        doc.title.clone(),
        doc.summary.clone(),
        doc.author_names.join(" "),
        doc.fandoms.join(" "),
        doc.characters.join(" "),
        doc.relationships.join(" "),
        doc.additional_tags.join(" "),
        content_prefix,
    ];

    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case-insensitive occurrence count of every tag on the work
pub fn tag_frequency(doc: &WorkIndexDocument) -> BTreeMap<String, u32> {
    let mut frequency = BTreeMap::new();
    for tag in doc.all_tags() {
        let key = tag.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        *frequency.entry(key).or_insert(0) += 1;
    }
    frequency
}

/// Distinct character, relationship and additional tags, case-insensitive
pub fn unique_tag_count(doc: &WorkIndexDocument) -> usize {
    doc.characters
        .iter()
        .chain(doc.relationships.iter())
        .chain(doc.additional_tags.iter())
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .len()
}
