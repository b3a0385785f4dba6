/// Document enrichment for the search index
///
/// This module turns declared work metadata into an index document:
/// - Relationship tag parsing and candidate generation
/// - Popularity and recency scoring
/// - Tag-quality scoring (completeness, cross-tagging, consistency)
/// - Per-work tag analysis with suggestions
///
/// Everything here is pure and performs no I/O.

pub mod analysis;
pub mod config;
pub mod enhancer;
pub mod quality;
pub mod relationships;
pub mod scoring;

pub use analysis::{
    InconsistencyKind, QualityCategory, Severity, SuggestionKind, TagAnalyzer, TagEnhancement,
    TagInconsistency, TagQualityAnalysis, TagSuggestion,
};
pub use config::{ScoringWeights, ScoringWeightsBuilder};
pub use enhancer::DocumentEnhancer;
pub use quality::TagQualityMetrics;
pub use relationships::{
    expand_character_filter, expand_relationships, implied_characters, parse_characters,
};
