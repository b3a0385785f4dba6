use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

/// Completion status of a work
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CompletionStatus {
    Complete,
    #[default]
    InProgress,
}

impl CompletionStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, CompletionStatus::Complete)
    }
}

/// Raw work row as read from the relational datastore
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author_ids: Vec<String>,
    #[serde(default)]
    pub author_names: Vec<String>,
    #[serde(default)]
    pub fandoms: Vec<String>,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<String>,
    #[serde(default)]
    pub additional_tags: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub word_count: u64,
    #[serde(default)]
    pub chapter_count: u32,
    #[serde(default)]
    pub completion_status: CompletionStatus,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub hits: u64,
    #[serde(default)]
    pub kudos: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub bookmarks: u64,
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub series: Vec<String>,
    #[serde(default)]
    pub is_restricted: bool,
    #[serde(default)]
    pub is_anonymous: bool,
}

/// Enriched, indexable representation of one work.
///
/// The declared fields mirror [`WorkRecord`]. Everything below the
/// "derived" marker is owned by the document enhancer and overwritten on
/// every enhancement, so values supplied by callers are never trusted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkIndexDocument {
    pub work_id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author_ids: Vec<String>,
    #[serde(default)]
    pub author_names: Vec<String>,

    #[serde(default)]
    pub fandoms: Vec<String>,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<String>,
    #[serde(default)]
    pub additional_tags: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub word_count: u64,
    #[serde(default)]
    pub chapter_count: u32,
    #[serde(default)]
    pub completion_status: CompletionStatus,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub hits: u64,
    #[serde(default)]
    pub kudos: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub bookmarks: u64,

    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub series: Vec<String>,
    #[serde(default)]
    pub is_restricted: bool,
    #[serde(default)]
    pub is_anonymous: bool,

    #[serde(default)]
    pub indexed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,

    // derived
    #[serde(default)]
    pub popularity_score: f64,
    #[serde(default)]
    pub recent_activity_score: f64,
    #[serde(default)]
    pub searchable_text: String,
    #[serde(default)]
    pub tag_frequency: BTreeMap<String, u32>,
    #[serde(default)]
    pub content_length: usize,
    #[serde(default)]
    pub unique_tag_count: usize,
    #[serde(default)]
    pub implied_characters: Vec<String>,
    #[serde(default)]
    pub implied_relationships: Vec<String>,
    #[serde(default)]
    pub tagging_quality_score: f64,
    #[serde(default)]
    pub tag_inconsistency_count: u32,
    #[serde(default)]
    pub missing_tag_count: u32,
    #[serde(default)]
    pub cross_tagging_score: f64,
    #[serde(default)]
    pub tag_completeness_score: f64,
}

impl WorkIndexDocument {
    /// Minimal document with the given id and title, timestamps set to `at`
    pub fn new(work_id: impl Into<String>, title: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            work_id: work_id.into(),
            title: title.into(),
            published_at: at,
            updated_at: at,
            ..Default::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completion_status.is_complete()
    }

    /// Every tag on the work across the four tag categories
    pub fn all_tags(&self) -> impl Iterator<Item = &String> {
        self.fandoms
            .iter()
            .chain(self.characters.iter())
            .chain(self.relationships.iter())
            .chain(self.additional_tags.iter())
    }
}

impl From<WorkRecord> for WorkIndexDocument {
    fn from(record: WorkRecord) -> Self {
        Self {
            work_id: record.id,
            title: record.title,
            summary: record.summary,
            content: record.content,
            author_ids: record.author_ids,
            author_names: record.author_names,
            fandoms: record.fandoms,
            characters: record.characters,
            relationships: record.relationships,
            additional_tags: record.additional_tags,
            warnings: record.warnings,
            categories: record.categories,
            rating: record.rating,
            language: record.language,
            word_count: record.word_count,
            chapter_count: record.chapter_count,
            completion_status: record.completion_status,
            published_at: record.published_at,
            updated_at: record.updated_at,
            hits: record.hits,
            kudos: record.kudos,
            comments: record.comments,
            bookmarks: record.bookmarks,
            collections: record.collections,
            series: record.series,
            is_restricted: record.is_restricted,
            is_anonymous: record.is_anonymous,
            ..Default::default()
        }
    }
}

impl From<&WorkIndexDocument> for WorkRecord {
    fn from(doc: &WorkIndexDocument) -> Self {
        Self {
            id: doc.work_id.clone(),
            title: doc.title.clone(),
            summary: doc.summary.clone(),
            content: doc.content.clone(),
            author_ids: doc.author_ids.clone(),
            author_names: doc.author_names.clone(),
            fandoms: doc.fandoms.clone(),
            characters: doc.characters.clone(),
            relationships: doc.relationships.clone(),
            additional_tags: doc.additional_tags.clone(),
            warnings: doc.warnings.clone(),
            categories: doc.categories.clone(),
            rating: doc.rating.clone(),
            language: doc.language.clone(),
            word_count: doc.word_count,
            chapter_count: doc.chapter_count,
            completion_status: doc.completion_status,
            published_at: doc.published_at,
            updated_at: doc.updated_at,
            hits: doc.hits,
            kudos: doc.kudos,
            comments: doc.comments,
            bookmarks: doc.bookmarks,
            collections: doc.collections.clone(),
            series: doc.series.clone(),
            is_restricted: doc.is_restricted,
            is_anonymous: doc.is_anonymous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_completion_status_strings() {
        assert_eq!(CompletionStatus::InProgress.to_string(), "in_progress");
        assert_eq!(
            CompletionStatus::from_str("complete").unwrap(),
            CompletionStatus::Complete
        );
        assert_eq!(
            serde_json::to_string(&CompletionStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
    }

    #[test]
    fn test_document_from_record_drops_nothing_declared() {
        let now = Utc::now();
        let record = WorkRecord {
            id: "w1".to_string(),
            title: "Title".to_string(),
            fandoms: vec!["Marvel".to_string()],
            kudos: 12,
            published_at: now,
            updated_at: now,
            ..Default::default()
        };

        let doc = WorkIndexDocument::from(record.clone());
        assert_eq!(doc.work_id, "w1");
        assert_eq!(doc.fandoms, vec!["Marvel"]);
        assert_eq!(doc.kudos, 12);
        assert_eq!(doc.version, 0);
        assert!(doc.indexed_at.is_none());

        assert_eq!(WorkRecord::from(&doc), record);
    }

    #[test]
    fn test_document_deserializes_without_derived_fields() {
        let json = r#"{
            "work_id": "w2",
            "title": "Minimal",
            "published_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-02-01T00:00:00Z"
        }"#;
        let doc: WorkIndexDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.work_id, "w2");
        assert_eq!(doc.tagging_quality_score, 0.0);
        assert!(doc.tag_frequency.is_empty());
    }
}
