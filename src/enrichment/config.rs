//! Scoring weights for document enhancement

use serde::{Deserialize, Serialize};

/// Weights and penalties used by the tag-quality and popularity scorers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Completeness penalty when no fandom is tagged
    pub missing_fandom_penalty: f64,

    /// Completeness penalty when no rating is set
    pub missing_rating_penalty: f64,

    /// Completeness penalty when no category is set
    pub missing_category_penalty: f64,

    /// Completeness penalty for relationships tagged without any character
    pub relationships_without_characters_penalty: f64,

    /// Completeness penalty for fewer additional tags than half the expected count
    pub sparse_tags_penalty: f64,

    /// Consistency points lost per detected inconsistency
    pub inconsistency_penalty: f64,

    /// Overall score points lost per missing tag
    pub missing_tag_penalty: f64,

    /// Share of completeness in the overall quality score
    pub completeness_weight: f64,

    /// Share of cross-tagging in the overall quality score
    pub cross_tagging_weight: f64,

    /// Share of consistency in the overall quality score
    pub consistency_weight: f64,

    /// Popularity weight per kudos
    pub kudos_weight: f64,

    /// Popularity weight per comment
    pub comments_weight: f64,

    /// Popularity weight per bookmark
    pub bookmarks_weight: f64,

    /// Popularity weight per hit
    pub hits_weight: f64,

    /// Word count at which popularity is halved by length normalisation
    pub length_normalization_words: f64,

    /// Characters of body content included in the searchable text
    pub searchable_content_chars: usize,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            missing_fandom_penalty: 20.0,
            missing_rating_penalty: 10.0,
            missing_category_penalty: 5.0,
            relationships_without_characters_penalty: 15.0,
            sparse_tags_penalty: 10.0,
            inconsistency_penalty: 10.0,
            missing_tag_penalty: 5.0,
            completeness_weight: 0.4,
            cross_tagging_weight: 0.3,
            consistency_weight: 0.3,
            kudos_weight: 2.0,
            comments_weight: 3.0,
            bookmarks_weight: 4.0,
            hits_weight: 0.1,
            length_normalization_words: 10_000.0,
            searchable_content_chars: 1000,
        }
    }
}

/// Builder for ScoringWeights
pub struct ScoringWeightsBuilder {
    weights: ScoringWeights,
}

impl ScoringWeightsBuilder {
    pub fn new() -> Self {
        Self {
            weights: ScoringWeights::default(),
        }
    }

    pub fn missing_fandom_penalty(mut self, penalty: f64) -> Self {
        self.weights.missing_fandom_penalty = penalty;
        self
    }

    pub fn missing_rating_penalty(mut self, penalty: f64) -> Self {
        self.weights.missing_rating_penalty = penalty;
        self
    }

    pub fn missing_category_penalty(mut self, penalty: f64) -> Self {
        self.weights.missing_category_penalty = penalty;
        self
    }

    pub fn inconsistency_penalty(mut self, penalty: f64) -> Self {
        self.weights.inconsistency_penalty = penalty;
        self
    }

    pub fn missing_tag_penalty(mut self, penalty: f64) -> Self {
        self.weights.missing_tag_penalty = penalty;
        self
    }

    pub fn quality_mix(mut self, completeness: f64, cross_tagging: f64, consistency: f64) -> Self {
        self.weights.completeness_weight = completeness;
        self.weights.cross_tagging_weight = cross_tagging;
        self.weights.consistency_weight = consistency;
        self
    }

    pub fn searchable_content_chars(mut self, chars: usize) -> Self {
        self.weights.searchable_content_chars = chars;
        self
    }

    pub fn build(self) -> ScoringWeights {
        self.weights
    }
}

impl Default for ScoringWeightsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
