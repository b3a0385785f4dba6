//! Facet aggregations and search analytics

use crate::search::config::FacetConfig;
use crate::search::request::{SearchRequest, TagCategory, TagLogic};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Named bucket of a range aggregation, `[from, to)`
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBucket {
    pub key: &'static str,
    pub from: Option<f64>,
    pub to: Option<f64>,
}

impl RangeBucket {
    pub fn contains(&self, value: f64) -> bool {
        self.from.map_or(true, |from| value >= from) && self.to.map_or(true, |to| value < to)
    }
}

/// Aggregation requested from the index
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    Terms {
        name: &'static str,
        field: &'static str,
        size: usize,
        min_doc_count: u64,
    },
    Range {
        name: &'static str,
        field: &'static str,
        buckets: Vec<RangeBucket>,
    },
    /// Yearly histogram over a date field
    YearHistogram {
        name: &'static str,
        field: &'static str,
    },
}

impl Aggregation {
    pub fn name(&self) -> &'static str {
        match self {
            Aggregation::Terms { name, .. }
            | Aggregation::Range { name, .. }
            | Aggregation::YearHistogram { name, .. } => name,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Aggregation::Terms {
                field,
                size,
                min_doc_count,
                ..
            } => json!({
                "terms": { "field": field, "size": size, "min_doc_count": min_doc_count }
            }),
            Aggregation::Range { field, buckets, .. } => {
                let ranges: Vec<Value> = buckets
                    .iter()
                    .map(|b| {
                        let mut range = Map::new();
                        range.insert("key".into(), json!(b.key));
                        if let Some(from) = b.from {
                            range.insert("from".into(), json!(from));
                        }
                        if let Some(to) = b.to {
                            range.insert("to".into(), json!(to));
                        }
                        Value::Object(range)
                    })
                    .collect();
                json!({ "range": { "field": field, "ranges": ranges } })
            }
            Aggregation::YearHistogram { field, .. } => json!({
                "date_histogram": {
                    "field": field,
                    "calendar_interval": "year",
                    "format": "yyyy",
                    "min_doc_count": 1,
                }
            }),
        }
    }
}

/// Word-count buckets: short, medium, long, epic
pub fn word_count_buckets() -> Vec<RangeBucket> {
    vec![
        RangeBucket { key: "short", from: None, to: Some(1000.0) },
        RangeBucket { key: "medium", from: Some(1000.0), to: Some(10_000.0) },
        RangeBucket { key: "long", from: Some(10_000.0), to: Some(50_000.0) },
        RangeBucket { key: "epic", from: Some(50_000.0), to: None },
    ]
}

/// Tagging-quality buckets at the 25/50/75 boundaries
pub fn quality_buckets() -> Vec<RangeBucket> {
    vec![
        RangeBucket { key: "poor", from: Some(0.0), to: Some(25.0) },
        RangeBucket { key: "fair", from: Some(25.0), to: Some(50.0) },
        RangeBucket { key: "good", from: Some(50.0), to: Some(75.0) },
        // upper bound is inclusive of a perfect score
        RangeBucket { key: "excellent", from: Some(75.0), to: Some(100.000_1) },
    ]
}

/// Every facet aggregation, bounded by `config`
pub fn facet_aggregations(config: &FacetConfig) -> Vec<Aggregation> {
    let terms = |name: &'static str, field: &'static str| Aggregation::Terms {
        name,
        field,
        size: config.max_facet_values,
        min_doc_count: config.min_doc_count,
    };

    vec![
        terms("fandoms", "fandoms.keyword"),
        terms("characters", "characters.keyword"),
        terms("relationships", "relationships.keyword"),
        terms("freeform_tags", "additional_tags.keyword"),
        terms("ratings", "rating"),
        terms("categories", "categories"),
        terms("warnings", "warnings"),
        terms("languages", "language"),
        terms("completion_status", "completion_status"),
        Aggregation::Range {
            name: "word_count_ranges",
            field: "word_count",
            buckets: word_count_buckets(),
        },
        Aggregation::Range {
            name: "tag_quality_distribution",
            field: "tagging_quality_score",
            buckets: quality_buckets(),
        },
        Aggregation::YearHistogram {
            name: "publish_years",
            field: "published_at",
        },
    ]
}

/// One facet value with its share of the result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetValue {
    pub value: String,
    pub count: u64,
    /// Percentage of the total hit count
    pub percentage: f64,
}

/// Convert raw aggregation buckets into facet values.
///
/// Unknown aggregation shapes are skipped. Empty range buckets are dropped.
pub fn summarize_facets(aggregations: &Value, total: u64) -> BTreeMap<String, Vec<FacetValue>> {
    let mut facets = BTreeMap::new();
    let Some(aggregations) = aggregations.as_object() else {
        return facets;
    };

    for (name, body) in aggregations {
        let Some(buckets) = body.get("buckets").and_then(Value::as_array) else {
            continue;
        };

        let values: Vec<FacetValue> = buckets
            .iter()
            .filter_map(|bucket| {
                let count = bucket.get("doc_count")?.as_u64()?;
                let value = bucket
                    .get("key_as_string")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| match bucket.get("key")? {
                        Value::String(s) => Some(s.clone()),
                        other => Some(other.to_string()),
                    })?;
                Some(FacetValue {
                    value,
                    count,
                    percentage: percentage(count, total),
                })
            })
            .filter(|v| v.count > 0)
            .collect();

        facets.insert(name.clone(), values);
    }
    facets
}

fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// Rough cost of a request; feeds response analytics and metrics
pub fn query_complexity(request: &SearchRequest) -> u32 {
    let mut complexity = 0u32;

    if request.has_text() {
        complexity += 2;
    }
    for field in [&request.title, &request.author, &request.summary] {
        if field.as_deref().is_some_and(|v| !v.trim().is_empty()) {
            complexity += 1;
        }
    }

    for category in TagCategory::ALL {
        let count = request.tags_for(category).len() as u32;
        complexity += count;
        if request.logic_for(category).ok() == Some(TagLogic::All) {
            complexity += count;
        }
    }

    if !request.word_count.is_empty() {
        complexity += 1;
    }
    if request.published.after.is_some() || request.published.before.is_some() {
        complexity += 1;
    }
    if request.updated.after.is_some() || request.updated.before.is_some() {
        complexity += 1;
    }
    if request.boost_recent {
        complexity += 2;
    }
    if request.boost_popular {
        complexity += 2;
    }
    if request.include_facets {
        complexity += 3;
    }
    if request.include_highlights {
        complexity += 1;
    }
    if request.include_suggestions {
        complexity += 2;
    }

    complexity
}

/// Heuristic usefulness of a result set given its size and latency
pub fn result_score(total: u64, search_time_ms: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }

    let mut score = 1.0;
    if total > 10_000 {
        score *= 0.8;
    } else if total > 1000 {
        score *= 0.9;
    }
    if (10..=1000).contains(&total) {
        score *= 1.1;
    }

    if search_time_ms > 1000 {
        score *= 0.7;
    } else if search_time_ms > 500 {
        score *= 0.9;
    } else if search_time_ms < 100 {
        score *= 1.2;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facet_aggregations_respect_config() {
        let config = FacetConfig {
            max_facet_values: 7,
            min_doc_count: 3,
        };
        let aggs = facet_aggregations(&config);
        let fandoms = aggs.iter().find(|a| a.name() == "fandoms").unwrap();
        assert_eq!(
            fandoms.to_json(),
            json!({ "terms": { "field": "fandoms.keyword", "size": 7, "min_doc_count": 3 } })
        );
        assert!(aggs.iter().any(|a| a.name() == "tag_quality_distribution"));
    }

    #[test]
    fn test_word_count_buckets() {
        let buckets = word_count_buckets();
        let key_for = |v: f64| buckets.iter().find(|b| b.contains(v)).unwrap().key;
        assert_eq!(key_for(999.0), "short");
        assert_eq!(key_for(1000.0), "medium");
        assert_eq!(key_for(49_999.0), "long");
        assert_eq!(key_for(50_000.0), "epic");
    }

    #[test]
    fn test_quality_buckets_include_perfect_score() {
        let buckets = quality_buckets();
        assert!(buckets.iter().any(|b| b.key == "excellent" && b.contains(100.0)));
        assert!(buckets.iter().any(|b| b.key == "fair" && b.contains(25.0)));
    }

    #[test]
    fn test_summarize_facets() {
        let aggs = json!({
            "fandoms": { "buckets": [
                { "key": "Marvel", "doc_count": 3 },
                { "key": "Harry Potter", "doc_count": 1 }
            ]},
            "word_count_ranges": { "buckets": [
                { "key": "short", "doc_count": 0 },
                { "key": "long", "doc_count": 4 }
            ]},
            "publish_years": { "buckets": [
                { "key": 1704067200000u64, "key_as_string": "2024", "doc_count": 2 }
            ]}
        });

        let facets = summarize_facets(&aggs, 4);
        assert_eq!(facets["fandoms"][0].value, "Marvel");
        assert_eq!(facets["fandoms"][0].percentage, 75.0);
        assert_eq!(facets["word_count_ranges"].len(), 1);
        assert_eq!(facets["publish_years"][0].value, "2024");
    }

    #[test]
    fn test_query_complexity() {
        let mut request = SearchRequest::text("found family");
        request.characters = vec!["A".to_string(), "B".to_string()];
        request.character_logic = "all".to_string();
        request.include_facets = true;
        request.boost_recent = true;
        // 2 + 2 + 2 + 3 + 2
        assert_eq!(query_complexity(&request), 11);
    }

    #[test]
    fn test_result_score() {
        assert_eq!(result_score(0, 10), 0.0);
        assert!((result_score(50, 50) - 1.32).abs() < 1e-9);
        assert!((result_score(20_000, 2000) - 0.56).abs() < 1e-9);
        assert!((result_score(5, 300) - 1.0).abs() < 1e-9);
    }
}
