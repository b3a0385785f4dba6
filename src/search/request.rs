//! Caller-facing search request

use crate::search::error::{SearchError, SearchResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};
use validator::{Validate, ValidationError};

/// Largest page size a caller may request
pub const MAX_PAGE_SIZE: u32 = 100;

/// How the values of one tag category combine
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TagLogic {
    /// At least one listed value
    #[default]
    Any,
    /// Every listed value
    All,
    /// None of the listed values
    Exclude,
}

/// Tag category a filter applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TagCategory {
    Fandom,
    Character,
    Relationship,
    Freeform,
}

impl TagCategory {
    pub const ALL: [TagCategory; 4] = [
        TagCategory::Fandom,
        TagCategory::Character,
        TagCategory::Relationship,
        TagCategory::Freeform,
    ];

    /// Exact-match field holding this category
    pub fn keyword_field(&self) -> &'static str {
        match self {
            TagCategory::Fandom => "fandoms.keyword",
            TagCategory::Character => "characters.keyword",
            TagCategory::Relationship => "relationships.keyword",
            TagCategory::Freeform => "additional_tags.keyword",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Sort keys accepted from callers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SortField {
    #[default]
    Relevance,
    UpdatedAt,
    PublishedAt,
    WordCount,
    Title,
    Author,
    Kudos,
    Hits,
    Comments,
    Bookmarks,
}

impl SortField {
    /// Index field sorted on; `None` for relevance
    pub fn index_field(&self) -> Option<&'static str> {
        match self {
            SortField::Relevance => None,
            SortField::UpdatedAt => Some("updated_at"),
            SortField::PublishedAt => Some("published_at"),
            SortField::WordCount => Some("word_count"),
            SortField::Title => Some("title.keyword"),
            SortField::Author => Some("author_names.keyword"),
            SortField::Kudos => Some("kudos"),
            SortField::Hits => Some("hits"),
            SortField::Comments => Some("comments"),
            SortField::Bookmarks => Some("bookmarks"),
        }
    }
}

/// Inclusive numeric bounds, each optional
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl NumericRange {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Inclusive date bounds as caller-supplied strings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub after: Option<String>,
    pub before: Option<String>,
}

/// Parse an RFC 3339 timestamp or a `YYYY-MM-DD` date (midnight UTC)
pub fn parse_date_bound(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn validate_tag_logic(logic: &str) -> Result<(), ValidationError> {
    let logic = logic.trim();
    if logic.is_empty() {
        return Ok(());
    }
    TagLogic::from_str(logic)
        .map(|_| ())
        .map_err(|_| ValidationError::new("unknown_tag_logic"))
}

/// A caller-supplied search
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SearchRequest {
    /// Free text matched across weighted fields
    pub query: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,

    /// Weighted field list (`field^boost`) replacing the default text fields
    pub search_fields: Vec<String>,

    pub fandoms: Vec<String>,
    #[validate(custom(function = "validate_tag_logic"))]
    pub fandom_logic: String,

    pub characters: Vec<String>,
    #[validate(custom(function = "validate_tag_logic"))]
    pub character_logic: String,

    pub relationships: Vec<String>,
    #[validate(custom(function = "validate_tag_logic"))]
    pub relationship_logic: String,

    pub freeform_tags: Vec<String>,
    #[validate(custom(function = "validate_tag_logic"))]
    pub freeform_logic: String,

    /// Widen character filters with characters implied by requested relationships
    pub expand_tags: bool,

    pub ratings: Vec<String>,
    pub categories: Vec<String>,
    pub warnings: Vec<String>,
    pub statuses: Vec<String>,
    pub languages: Vec<String>,
    pub is_complete: Option<bool>,

    pub word_count: NumericRange,
    pub chapter_count: NumericRange,
    pub hits: NumericRange,
    pub kudos: NumericRange,
    pub comments: NumericRange,
    pub bookmarks: NumericRange,

    pub published: DateRange,
    pub updated: DateRange,

    /// Lowest acceptable tagging quality score, clamped to 0-100
    pub min_tagging_quality: Option<f64>,
    /// Drop works with any detected tag inconsistency
    pub exclude_poorly_tagged: bool,

    pub boost_recent: bool,
    pub boost_popular: bool,

    pub sort_by: String,
    pub sort_order: String,

    #[validate(range(min = 1))]
    pub page: u32,
    #[validate(range(min = 1, max = 100))]
    pub limit: u32,

    pub include_facets: bool,
    pub include_highlights: bool,
    pub include_suggestions: bool,
    pub exact_match: bool,

    /// Work ids never returned
    pub exclude_works: Vec<String>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: None,
            title: None,
            author: None,
            summary: None,
            search_fields: Vec::new(),
            fandoms: Vec::new(),
            fandom_logic: TagLogic::Any.to_string(),
            characters: Vec::new(),
            character_logic: TagLogic::Any.to_string(),
            relationships: Vec::new(),
            relationship_logic: TagLogic::Any.to_string(),
            freeform_tags: Vec::new(),
            freeform_logic: TagLogic::Any.to_string(),
            expand_tags: false,
            ratings: Vec::new(),
            categories: Vec::new(),
            warnings: Vec::new(),
            statuses: Vec::new(),
            languages: Vec::new(),
            is_complete: None,
            word_count: NumericRange::default(),
            chapter_count: NumericRange::default(),
            hits: NumericRange::default(),
            kudos: NumericRange::default(),
            comments: NumericRange::default(),
            bookmarks: NumericRange::default(),
            published: DateRange::default(),
            updated: DateRange::default(),
            min_tagging_quality: None,
            exclude_poorly_tagged: false,
            boost_recent: false,
            boost_popular: false,
            sort_by: SortField::Relevance.to_string(),
            sort_order: SortOrder::Desc.to_string(),
            page: 1,
            limit: 20,
            include_facets: false,
            include_highlights: false,
            include_suggestions: false,
            exact_match: false,
            exclude_works: Vec::new(),
        }
    }
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Free-text search
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    /// Reject requests that must never reach the index
    pub fn validate_request(&self) -> SearchResult<()> {
        if self.limit > MAX_PAGE_SIZE {
            return Err(SearchError::Validation(format!(
                "limit {} exceeds maximum of {}",
                self.limit, MAX_PAGE_SIZE
            )));
        }
        if self.page < 1 {
            return Err(SearchError::Validation("page must be at least 1".to_string()));
        }
        for category in TagCategory::ALL {
            self.logic_for(category)?;
        }
        self.validate()?;
        Ok(())
    }

    /// Values requested for a tag category
    pub fn tags_for(&self, category: TagCategory) -> &[String] {
        match category {
            TagCategory::Fandom => &self.fandoms,
            TagCategory::Character => &self.characters,
            TagCategory::Relationship => &self.relationships,
            TagCategory::Freeform => &self.freeform_tags,
        }
    }

    /// Parsed logic mode of a tag category
    pub fn logic_for(&self, category: TagCategory) -> SearchResult<TagLogic> {
        let raw = match category {
            TagCategory::Fandom => &self.fandom_logic,
            TagCategory::Character => &self.character_logic,
            TagCategory::Relationship => &self.relationship_logic,
            TagCategory::Freeform => &self.freeform_logic,
        };
        if raw.trim().is_empty() {
            return Ok(TagLogic::Any);
        }
        TagLogic::from_str(raw.trim()).map_err(|_| {
            SearchError::Validation(format!(
                "unknown {} logic '{}', expected any, all or exclude",
                category, raw
            ))
        })
    }

    /// Sort key, falling back to `updated_at` for unknown keys
    pub fn sort_field(&self) -> SortField {
        if self.sort_by.trim().is_empty() {
            return SortField::Relevance;
        }
        SortField::from_str(self.sort_by.trim()).unwrap_or(SortField::UpdatedAt)
    }

    /// Sort order, falling back to descending
    pub fn sort_direction(&self) -> SortOrder {
        SortOrder::from_str(self.sort_order.trim()).unwrap_or_default()
    }

    /// Offset of the first result
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.limit as usize
    }

    pub fn has_text(&self) -> bool {
        self.query.as_deref().is_some_and(|q| !q.trim().is_empty())
    }

    pub fn with_page(mut self, page: u32, limit: u32) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    pub fn with_tags(mut self, category: TagCategory, values: Vec<&str>, logic: TagLogic) -> Self {
        let values: Vec<String> = values.into_iter().map(String::from).collect();
        let logic = logic.to_string();
        match category {
            TagCategory::Fandom => {
                self.fandoms = values;
                self.fandom_logic = logic;
            }
            TagCategory::Character => {
                self.characters = values;
                self.character_logic = logic;
            }
            TagCategory::Relationship => {
                self.relationships = values;
                self.relationship_logic = logic;
            }
            TagCategory::Freeform => {
                self.freeform_tags = values;
                self.freeform_logic = logic;
            }
        }
        self
    }

    pub fn with_sort(mut self, sort_by: &str, sort_order: &str) -> Self {
        self.sort_by = sort_by.to_string();
        self.sort_order = sort_order.to_string();
        self
    }

    pub fn with_facets(mut self) -> Self {
        self.include_facets = true;
        self
    }

    pub fn with_exact_match(mut self) -> Self {
        self.exact_match = true;
        self
    }
}
