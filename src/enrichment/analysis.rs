use crate::enrichment::config::ScoringWeights;
use crate::enrichment::quality::{self, expected_tag_count, TagQualityMetrics};
use crate::enrichment::relationships::{contains_ignore_case, parse_characters};
use crate::models::WorkIndexDocument;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Coarse bucket of the overall tagging quality score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QualityCategory {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityCategory {
    pub fn from_score(score: f64) -> Self {
        if score < 25.0 {
            QualityCategory::Poor
        } else if score < 50.0 {
            QualityCategory::Fair
        } else if score < 75.0 {
            QualityCategory::Good
        } else {
            QualityCategory::Excellent
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SuggestionKind {
    Character,
    Relationship,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    MissingCharacter,
    RelationshipsWithoutCharacters,
    MissingFandom,
    MissingRating,
    MissingCategory,
}

/// A tag the author may want to add
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagSuggestion {
    pub tag: String,
    pub kind: SuggestionKind,
    pub confidence: f64,
    pub reason: String,
}

/// A detected contradiction or gap in the tag set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagInconsistency {
    pub kind: InconsistencyKind,
    pub description: String,
    pub suggestions: Vec<String>,
    pub severity: Severity,
}

/// Actionable tagging improvements for one work
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagEnhancement {
    pub missing_characters: Vec<String>,
    pub missing_relationships: Vec<String>,
    pub suggested_tags: Vec<TagSuggestion>,
    pub inconsistencies: Vec<TagInconsistency>,
    pub tagging_quality_score: f64,
}

/// Tag-quality report for one work.
///
/// The axis scores are fractions in `[0, 1]`; `overall_score` stays on the
/// 0-100 scale used in the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagQualityAnalysis {
    pub work_id: String,
    pub completeness: f64,
    pub consistency: f64,
    pub specificity: f64,
    pub cross_tagging: f64,
    pub overall_score: f64,
    pub issue_count: usize,
    pub missing_tag_count: u32,
    pub quality_category: QualityCategory,
    pub enhancement: TagEnhancement,
}

const IMPLIED_CHARACTER_CONFIDENCE: f64 = 0.95;
const CANDIDATE_RELATIONSHIP_CONFIDENCE: f64 = 0.3;

/// Produces tag-quality reports with concrete suggestions
#[derive(Debug, Clone, Default)]
pub struct TagAnalyzer {
    weights: ScoringWeights,
}

impl TagAnalyzer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn analyze(&self, doc: &WorkIndexDocument) -> TagQualityAnalysis {
        let metrics = quality::assess(doc, &self.weights);
        let enhancement = self.enhancement(doc, &metrics);

        let expected = expected_tag_count(doc.word_count) as f64;
        let specificity = (doc.additional_tags.len() as f64 / expected).min(1.0);
        let consistency = f64::max(
            0.0,
            100.0 - self.weights.inconsistency_penalty * metrics.tag_inconsistency_count as f64,
        );

        TagQualityAnalysis {
            work_id: doc.work_id.clone(),
            completeness: metrics.tag_completeness_score / 100.0,
            consistency: consistency / 100.0,
            specificity,
            cross_tagging: metrics.cross_tagging_score / 100.0,
            overall_score: metrics.tagging_quality_score,
            issue_count: enhancement.inconsistencies.len(),
            missing_tag_count: metrics.missing_tag_count,
            quality_category: QualityCategory::from_score(metrics.tagging_quality_score),
            enhancement,
        }
    }

    fn enhancement(&self, doc: &WorkIndexDocument, metrics: &TagQualityMetrics) -> TagEnhancement {
        let mut suggested_tags = Vec::new();
        let mut inconsistencies = Vec::new();

        for character in &metrics.implied_characters {
            let source = doc
                .relationships
                .iter()
                .find(|r| contains_ignore_case(&parse_characters(r), character))
                .cloned()
                .unwrap_or_default();

            suggested_tags.push(TagSuggestion {
                tag: character.clone(),
                kind: SuggestionKind::Character,
                confidence: IMPLIED_CHARACTER_CONFIDENCE,
                reason: format!("Implied by relationship tag '{}'", source),
            });
            inconsistencies.push(TagInconsistency {
                kind: InconsistencyKind::MissingCharacter,
                description: format!(
                    "Relationship '{}' names '{}' who is not tagged as a character",
                    source, character
                ),
                suggestions: vec![character.clone()],
                severity: Severity::Medium,
            });
        }

        for candidate in &metrics.implied_relationships {
            suggested_tags.push(TagSuggestion {
                tag: candidate.clone(),
                kind: SuggestionKind::Relationship,
                confidence: CANDIDATE_RELATIONSHIP_CONFIDENCE,
                reason: "Both characters are tagged on this work".to_string(),
            });
        }

        if !doc.relationships.is_empty() && doc.characters.is_empty() {
            inconsistencies.push(TagInconsistency {
                kind: InconsistencyKind::RelationshipsWithoutCharacters,
                description: "Relationships are tagged but no characters are".to_string(),
                suggestions: metrics.implied_characters.clone(),
                severity: Severity::High,
            });
        }
        if doc.fandoms.is_empty() {
            inconsistencies.push(missing_mandatory(InconsistencyKind::MissingFandom, "fandom", Severity::High));
        }
        if doc.rating.trim().is_empty() {
            inconsistencies.push(missing_mandatory(InconsistencyKind::MissingRating, "rating", Severity::Medium));
        }
        if doc.categories.is_empty() {
            inconsistencies.push(missing_mandatory(InconsistencyKind::MissingCategory, "category", Severity::Low));
        }

        TagEnhancement {
            missing_characters: metrics.implied_characters.clone(),
            missing_relationships: metrics.implied_relationships.clone(),
            suggested_tags,
            inconsistencies,
            tagging_quality_score: metrics.tagging_quality_score,
        }
    }
}

fn missing_mandatory(kind: InconsistencyKind, label: &str, severity: Severity) -> TagInconsistency {
    TagInconsistency {
        kind,
        description: format!("No {} is tagged", label),
        suggestions: Vec::new(),
        severity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_quality_category_boundaries() {
        assert_eq!(QualityCategory::from_score(0.0), QualityCategory::Poor);
        assert_eq!(QualityCategory::from_score(25.0), QualityCategory::Fair);
        assert_eq!(QualityCategory::from_score(50.0), QualityCategory::Good);
        assert_eq!(QualityCategory::from_score(75.0), QualityCategory::Excellent);
        assert_eq!(QualityCategory::Excellent.to_string(), "excellent");
    }

    #[test]
    fn test_reader_suggestion_names_source_relationship() {
        let mut doc = WorkIndexDocument::new("w1", "Title", Utc::now());
        doc.fandoms = vec!["WandaVision".to_string()];
        doc.rating = "Mature".to_string();
        doc.categories = vec!["F/F".to_string()];
        doc.relationships = vec!["Agatha Harkness/Reader".to_string()];
        doc.characters = vec!["Agatha Harkness".to_string()];

        let analysis = TagAnalyzer::default().analyze(&doc);
        let suggestion = &analysis.enhancement.suggested_tags[0];
        assert_eq!(suggestion.tag, "Reader");
        assert_eq!(suggestion.kind, SuggestionKind::Character);
        assert_eq!(
            suggestion.reason,
            "Implied by relationship tag 'Agatha Harkness/Reader'"
        );
        assert_eq!(analysis.issue_count, 1);
        assert_eq!(analysis.cross_tagging, 0.5);
        assert_eq!(analysis.enhancement.missing_characters, vec!["Reader"]);
    }

    #[test]
    fn test_untagged_work_reports_mandatory_gaps() {
        let doc = WorkIndexDocument::new("w2", "Bare", Utc::now());
        let analysis = TagAnalyzer::default().analyze(&doc);
        let kinds: Vec<_> = analysis
            .enhancement
            .inconsistencies
            .iter()
            .map(|i| i.kind)
            .collect();
        assert!(kinds.contains(&InconsistencyKind::MissingFandom));
        assert!(kinds.contains(&InconsistencyKind::MissingRating));
        assert!(kinds.contains(&InconsistencyKind::MissingCategory));
        assert_eq!(analysis.missing_tag_count, 3);
    }
}
