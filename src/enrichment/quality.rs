//! Tag-quality scoring.
//!
//! Quality is measured along three axes, each on a 0-100 scale:
//!
//! - **completeness**: are the mandatory tag categories filled, and are
//!   there roughly as many additional tags as a work of this length usually
//!   carries?
//! - **cross-tagging**: does every character named by a relationship tag also
//!   appear in the character tags?
//! - **consistency**: how many detectable contradictions does the tag set
//!   contain?
//!
//! The overall score is a weighted mix of the three, reduced per missing tag.

use crate::enrichment::config::ScoringWeights;
use crate::enrichment::relationships::{
    contains_ignore_case, expand_relationships, implied_characters,
};
use crate::models::WorkIndexDocument;
use serde::{Deserialize, Serialize};

/// Tag-quality findings for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagQualityMetrics {
    /// Characters named by relationships but not tagged as characters
    pub implied_characters: Vec<String>,
    /// Relationship candidates from declared characters, not yet tagged
    pub implied_relationships: Vec<String>,
    pub cross_tagging_score: f64,
    pub tag_completeness_score: f64,
    pub tag_inconsistency_count: u32,
    pub missing_tag_count: u32,
    pub tagging_quality_score: f64,
}

/// Additional-tag count a work of this length is expected to carry
pub fn expected_tag_count(word_count: u64) -> usize {
    match word_count {
        0..=999 => 3,
        1000..=4999 => 5,
        5000..=19_999 => 8,
        _ => 12,
    }
}

/// Share of relationship participants that are tagged as characters
pub fn cross_tagging_score(doc: &WorkIndexDocument) -> f64 {
    if doc.relationships.is_empty() {
        return 100.0;
    }

    let participants = implied_characters(&doc.relationships);
    if participants.is_empty() {
        return 100.0;
    }

    let declared = participants
        .iter()
        .filter(|name| contains_ignore_case(&doc.characters, name))
        .count();

    clamp_score(declared as f64 / participants.len() as f64 * 100.0)
}

pub fn tag_completeness_score(doc: &WorkIndexDocument, weights: &ScoringWeights) -> f64 {
    let mut score = 100.0;

    if doc.fandoms.is_empty() {
        score -= weights.missing_fandom_penalty;
    }
    if doc.rating.trim().is_empty() {
        score -= weights.missing_rating_penalty;
    }
    if doc.categories.is_empty() {
        score -= weights.missing_category_penalty;
    }
    if !doc.relationships.is_empty() && doc.characters.is_empty() {
        score -= weights.relationships_without_characters_penalty;
    }
    if doc.additional_tags.len() < expected_tag_count(doc.word_count) / 2 {
        score -= weights.sparse_tags_penalty;
    }

    f64::max(score, 0.0)
}

/// Score every tag-quality axis of the document
pub fn assess(doc: &WorkIndexDocument, weights: &ScoringWeights) -> TagQualityMetrics {
    let implied: Vec<String> = implied_characters(&doc.relationships)
        .into_iter()
        .filter(|name| !contains_ignore_case(&doc.characters, name))
        .collect();

    let implied_relationships: Vec<String> = expand_relationships(&doc.characters)
        .into_iter()
        .filter(|candidate| !contains_ignore_case(&doc.relationships, candidate))
        .collect();

    let inconsistencies = implied.len() as u32;

    let mut missing = implied.len() as u32;
    if doc.fandoms.is_empty() {
        missing += 1;
    }
    if doc.rating.trim().is_empty() {
        missing += 1;
    }
    if doc.categories.is_empty() {
        missing += 1;
    }

    let completeness = tag_completeness_score(doc, weights);
    let cross = cross_tagging_score(doc);
    let consistency = f64::max(0.0, 100.0 - weights.inconsistency_penalty * inconsistencies as f64);

    let overall = weights.completeness_weight * completeness
        + weights.cross_tagging_weight * cross
        + weights.consistency_weight * consistency
        - weights.missing_tag_penalty * missing as f64;

    TagQualityMetrics {
        implied_characters: implied,
        implied_relationships,
        cross_tagging_score: cross,
        tag_completeness_score: clamp_score(completeness),
        tag_inconsistency_count: inconsistencies,
        missing_tag_count: missing,
        tagging_quality_score: clamp_score(overall),
    }
}

fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}
