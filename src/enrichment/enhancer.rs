use crate::enrichment::config::ScoringWeights;
use crate::enrichment::quality;
use crate::enrichment::scoring;
use crate::models::{WorkIndexDocument, WorkRecord};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Computes every derived field of a [`WorkIndexDocument`]
#[derive(Debug, Clone, Default)]
pub struct DocumentEnhancer {
    weights: ScoringWeights,
}

impl DocumentEnhancer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Enhance against the current wall-clock time
    pub fn enhance(&self, doc: WorkIndexDocument) -> WorkIndexDocument {
        self.enhance_at(doc, Utc::now())
    }

    /// Enhance a raw datastore row
    pub fn enhance_record(&self, record: WorkRecord) -> WorkIndexDocument {
        self.enhance(WorkIndexDocument::from(record))
    }

    /// Enhance against a fixed reference instant.
    ///
    /// Derived fields supplied on the input are discarded; the result depends
    /// only on the declared fields and `now`. `version` is left untouched.
    pub fn enhance_at(&self, mut doc: WorkIndexDocument, now: DateTime<Utc>) -> WorkIndexDocument {
        let metrics = quality::assess(&doc, &self.weights);

        doc.popularity_score = scoring::popularity_score(&doc, now, &self.weights);
        doc.recent_activity_score = scoring::recent_activity_score(doc.updated_at, now);
        doc.searchable_text = scoring::searchable_text(&doc, self.weights.searchable_content_chars);
        doc.tag_frequency = scoring::tag_frequency(&doc);
        doc.content_length = doc.content.chars().count();
        doc.unique_tag_count = scoring::unique_tag_count(&doc);

        doc.implied_characters = metrics.implied_characters;
        doc.implied_relationships = metrics.implied_relationships;
        doc.cross_tagging_score = metrics.cross_tagging_score;
        doc.tag_completeness_score = metrics.tag_completeness_score;
        doc.tag_inconsistency_count = metrics.tag_inconsistency_count;
        doc.missing_tag_count = metrics.missing_tag_count;
        doc.tagging_quality_score = metrics.tagging_quality_score;

        doc.indexed_at = Some(now);

        debug!(
            work_id = %doc.work_id,
            quality = doc.tagging_quality_score,
            inconsistencies = doc.tag_inconsistency_count,
            "Enhanced work document"
        );

        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_enhance_overwrites_caller_supplied_derived_fields() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut doc = WorkIndexDocument::new("w1", "Title", now);
        doc.tagging_quality_score = 100.0;
        doc.implied_characters = vec!["Bogus".to_string()];
        doc.content = "abc".to_string();

        let enhanced = DocumentEnhancer::default().enhance_at(doc, now);
        assert!(enhanced.implied_characters.is_empty());
        assert!(enhanced.tagging_quality_score < 100.0);
        assert_eq!(enhanced.content_length, 3);
        assert_eq!(enhanced.indexed_at, Some(now));
    }

    #[test]
    fn test_enhance_keeps_version() {
        let now = Utc::now();
        let mut doc = WorkIndexDocument::new("w1", "Title", now);
        doc.version = 7;
        assert_eq!(DocumentEnhancer::default().enhance_at(doc, now).version, 7);
    }
}
