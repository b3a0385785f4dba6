//! Compiles a [`SearchRequest`] into a [`CompiledQuery`].

use crate::enrichment::relationships::expand_character_filter;
use crate::search::config::FacetConfig;
use crate::search::error::SearchResult;
use crate::search::facets::{facet_aggregations, Aggregation};
use crate::search::query::{BoolQuery, MultiMatchType, Operator, Query, ScoreFunction};
use crate::search::request::{
    parse_date_bound, DateRange, NumericRange, SearchRequest, SortField, SortOrder, TagCategory,
    TagLogic,
};
use chrono::SecondsFormat;
use serde_json::{json, Map, Value};
use std::str::FromStr;

/// Text fields searched by free text when the caller gives none
pub const DEFAULT_SEARCH_FIELDS: [&str; 5] = [
    "title^3",
    "summary^2",
    "content^1",
    "additional_tags^1.5",
    "author_names^1.2",
];

/// Fields stripped from returned documents
pub const SOURCE_EXCLUDES: [&str; 2] = ["content", "searchable_text"];

/// One sort key
#[derive(Debug, Clone, PartialEq)]
pub struct SortClause {
    pub field: String,
    pub order: SortOrder,
}

impl SortClause {
    fn new(field: &str, order: SortOrder) -> Self {
        Self {
            field: field.to_string(),
            order,
        }
    }
}

/// Highlighted field with its fragment budget
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightField {
    pub field: &'static str,
    pub fragment_size: u32,
    pub number_of_fragments: u32,
}

pub const HIGHLIGHT_FIELDS: [HighlightField; 3] = [
    HighlightField { field: "title", fragment_size: 100, number_of_fragments: 1 },
    HighlightField { field: "summary", fragment_size: 150, number_of_fragments: 2 },
    HighlightField { field: "content", fragment_size: 200, number_of_fragments: 3 },
];

/// A compiled, not yet executed, search
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub query: Query,
    pub sort: Vec<SortClause>,
    pub from: usize,
    pub size: usize,
    pub aggregations: Vec<Aggregation>,
    pub highlight: bool,
    /// Text fed to the title term suggester
    pub suggest_text: Option<String>,
    pub source_excludes: Vec<String>,
}

impl CompiledQuery {
    /// Full `_search` request body
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".into(), self.query.to_json());
        body.insert(
            "sort".into(),
            Value::Array(
                self.sort
                    .iter()
                    .map(|s| json!({ s.field.as_str(): { "order": s.order.to_string() } }))
                    .collect(),
            ),
        );
        body.insert("from".into(), json!(self.from));
        body.insert("size".into(), json!(self.size));
        body.insert("track_total_hits".into(), json!(true));
        body.insert(
            "_source".into(),
            json!({ "excludes": self.source_excludes }),
        );

        if !self.aggregations.is_empty() {
            let aggs: Map<String, Value> = self
                .aggregations
                .iter()
                .map(|a| (a.name().to_string(), a.to_json()))
                .collect();
            body.insert("aggs".into(), Value::Object(aggs));
        }

        if self.highlight {
            let fields: Map<String, Value> = HIGHLIGHT_FIELDS
                .iter()
                .map(|h| {
                    (
                        h.field.to_string(),
                        json!({
                            "fragment_size": h.fragment_size,
                            "number_of_fragments": h.number_of_fragments,
                        }),
                    )
                })
                .collect();
            body.insert(
                "highlight".into(),
                json!({ "pre_tags": ["<mark>"], "post_tags": ["</mark>"], "fields": fields }),
            );
        }

        if let Some(text) = &self.suggest_text {
            body.insert(
                "suggest".into(),
                json!({ "text": { "text": text, "term": { "field": "title" } } }),
            );
        }

        Value::Object(body)
    }
}

/// Compiles search requests; holds only facet bounds
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    facets: FacetConfig,
}

impl QueryBuilder {
    pub fn new(facets: FacetConfig) -> Self {
        Self { facets }
    }

    /// Validate and compile a request
    pub fn build(&self, request: &SearchRequest) -> SearchResult<CompiledQuery> {
        request.validate_request()?;

        let mut root = BoolQuery::default();
        text_clauses(request, &mut root);
        tag_filters(request, &mut root)?;
        metadata_filters(request, &mut root);
        range_filters(request, &mut root);
        boosts(request, &mut root);

        if !request.exclude_works.is_empty() {
            root.must_not.push(Query::Ids {
                values: request.exclude_works.clone(),
            });
        }
        if !root.should.is_empty() {
            root.minimum_should_match = Some(0);
        }

        let query = if root.is_empty() {
            Query::MatchAll
        } else {
            Query::Bool(root)
        };

        Ok(CompiledQuery {
            query,
            sort: sort_clauses(request),
            from: request.offset(),
            size: request.limit as usize,
            aggregations: if request.include_facets {
                facet_aggregations(&self.facets)
            } else {
                Vec::new()
            },
            highlight: request.include_highlights,
            suggest_text: if request.include_suggestions && request.has_text() {
                request.query.as_ref().map(|q| q.trim().to_string())
            } else {
                None
            },
            source_excludes: SOURCE_EXCLUDES.iter().map(|f| f.to_string()).collect(),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn text_clauses(request: &SearchRequest, root: &mut BoolQuery) {
    if let Some(text) = non_blank(&request.query) {
        let fields: Vec<String> = if request.search_fields.is_empty() {
            DEFAULT_SEARCH_FIELDS.iter().map(|f| f.to_string()).collect()
        } else {
            request.search_fields.clone()
        };

        let multi = |match_type, operator, slop, boost| Query::MultiMatch {
            query: text.to_string(),
            fields: fields.clone(),
            match_type,
            operator,
            slop,
            boost,
        };

        if request.exact_match {
            root.must
                .push(multi(MultiMatchType::Phrase, Some(Operator::And), None, None));
        } else {
            root.must.push(Query::should(vec![
                multi(MultiMatchType::BestFields, Some(Operator::And), None, Some(2.0)),
                multi(MultiMatchType::Phrase, None, Some(2), Some(1.5)),
                multi(MultiMatchType::CrossFields, Some(Operator::Or), None, Some(1.0)),
            ]));
        }
    }

    if let Some(title) = non_blank(&request.title) {
        if request.exact_match {
            root.must.push(Query::match_phrase("title", title));
        } else {
            root.must.push(Query::should(vec![
                Query::MatchPhrase {
                    field: "title".to_string(),
                    query: title.to_string(),
                    boost: Some(3.0),
                },
                text_match("title", title, Operator::And, 2.0),
                text_match("title", title, Operator::Or, 1.0),
            ]));
        }
    }

    if let Some(author) = non_blank(&request.author) {
        if request.exact_match {
            root.must.push(Query::term("author_names.keyword", author));
        } else {
            root.must.push(Query::should(vec![
                Query::Term {
                    field: "author_names.keyword".to_string(),
                    value: json!(author),
                    boost: Some(3.0),
                },
                text_match("author_names", author, Operator::And, 2.0),
                Query::Wildcard {
                    field: "author_names".to_string(),
                    pattern: format!("*{}*", author.to_lowercase()),
                    boost: Some(1.0),
                },
            ]));
        }
    }

    if let Some(summary) = non_blank(&request.summary) {
        if request.exact_match {
            root.must.push(Query::match_phrase("summary", summary));
        } else {
            root.must.push(Query::Match {
                field: "summary".to_string(),
                query: summary.to_string(),
                operator: Operator::And,
                boost: None,
            });
        }
    }
}

fn text_match(field: &str, query: &str, operator: Operator, boost: f64) -> Query {
    Query::Match {
        field: field.to_string(),
        query: query.to_string(),
        operator,
        boost: Some(boost),
    }
}

fn tag_filters(request: &SearchRequest, root: &mut BoolQuery) -> SearchResult<()> {
    for category in TagCategory::ALL {
        let logic = request.logic_for(category)?;

        let mut values: Vec<String> = match category {
            TagCategory::Character if request.expand_tags && logic != TagLogic::Exclude => {
                expand_character_filter(&request.characters, &request.relationships)
            }
            _ => request.tags_for(category).to_vec(),
        };
        values.retain(|v| !v.trim().is_empty());
        values.dedup();
        if values.is_empty() {
            continue;
        }

        let field = category.keyword_field();
        match logic {
            TagLogic::Any => root.filter.push(Query::terms(field, &values)),
            TagLogic::All => root.filter.push(Query::must(
                values.iter().map(|v| Query::term(field, v.as_str())).collect(),
            )),
            TagLogic::Exclude => root.must_not.push(Query::terms(field, &values)),
        }
    }
    Ok(())
}

fn metadata_filters(request: &SearchRequest, root: &mut BoolQuery) {
    for (field, values) in [
        ("rating", &request.ratings),
        ("categories", &request.categories),
        ("warnings", &request.warnings),
        ("completion_status", &request.statuses),
        ("language", &request.languages),
    ] {
        if !values.is_empty() {
            root.filter.push(Query::terms(field, values));
        }
    }

    if let Some(complete) = request.is_complete {
        let status = if complete { "complete" } else { "in_progress" };
        root.filter.push(Query::term("completion_status", status));
    }
}

fn numeric_range(field: &str, range: &NumericRange) -> Option<Query> {
    if range.is_empty() {
        return None;
    }
    Some(Query::range(
        field,
        range.min.map(|v| json!(v)),
        range.max.map(|v| json!(v)),
    ))
}

/// Unparseable bounds are dropped rather than rejected
fn date_range(field: &str, range: &DateRange) -> Option<Query> {
    let bound = |raw: &Option<String>| {
        raw.as_deref()
            .and_then(parse_date_bound)
            .map(|ts| json!(ts.to_rfc3339_opts(SecondsFormat::Secs, true)))
    };
    let gte = bound(&range.after);
    let lte = bound(&range.before);
    if gte.is_none() && lte.is_none() {
        return None;
    }
    Some(Query::range(field, gte, lte))
}

fn range_filters(request: &SearchRequest, root: &mut BoolQuery) {
    let numeric = [
        ("word_count", &request.word_count),
        ("chapter_count", &request.chapter_count),
        ("hits", &request.hits),
        ("kudos", &request.kudos),
        ("comments", &request.comments),
        ("bookmarks", &request.bookmarks),
    ];
    root.filter
        .extend(numeric.iter().filter_map(|(field, range)| numeric_range(field, range)));

    root.filter.extend(date_range("published_at", &request.published));
    root.filter.extend(date_range("updated_at", &request.updated));

    if let Some(min_quality) = request.min_tagging_quality.filter(|q| q.is_finite()) {
        root.filter.push(Query::range(
            "tagging_quality_score",
            Some(json!(min_quality.clamp(0.0, 100.0))),
            None,
        ));
    }
    if request.exclude_poorly_tagged {
        root.must_not
            .push(Query::range("tag_inconsistency_count", Some(json!(1)), None));
    }
}

fn boosts(request: &SearchRequest, root: &mut BoolQuery) {
    if request.boost_recent {
        root.should.push(Query::FunctionScore {
            query: Box::new(Query::MatchAll),
            functions: vec![ScoreFunction::DateDecay {
                field: "updated_at".to_string(),
                origin: "now".to_string(),
                scale_days: 30,
                decay: 0.5,
                weight: 1.5,
            }],
        });
    }
    if request.boost_popular {
        root.should.push(Query::FunctionScore {
            query: Box::new(Query::MatchAll),
            functions: vec![
                ScoreFunction::FieldValueFactor {
                    field: "kudos".to_string(),
                    factor: 0.1,
                    weight: 1.2,
                },
                ScoreFunction::FieldValueFactor {
                    field: "bookmarks".to_string(),
                    factor: 0.2,
                    weight: 1.3,
                },
            ],
        });
    }
}

fn sort_clauses(request: &SearchRequest) -> Vec<SortClause> {
    let relevance = || {
        vec![
            SortClause::new("_score", SortOrder::Desc),
            SortClause::new("updated_at", SortOrder::Desc),
        ]
    };

    let key = request.sort_by.trim();
    if key.is_empty() {
        return relevance();
    }

    match SortField::from_str(key) {
        Ok(field) => match field.index_field() {
            Some(index_field) => vec![SortClause::new(index_field, request.sort_direction())],
            None => relevance(),
        },
        // unknown keys sort newest first whatever the requested order
        Err(_) => vec![SortClause::new("updated_at", SortOrder::Desc)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(request: &SearchRequest) -> CompiledQuery {
        QueryBuilder::default().build(request).unwrap()
    }

    #[test]
    fn test_empty_request_matches_all() {
        let compiled = compile(&SearchRequest::default());
        assert_eq!(compiled.query, Query::MatchAll);
        assert_eq!(compiled.from, 0);
        assert_eq!(compiled.size, 20);
        assert_eq!(compiled.sort[0].field, "_score");
        assert_eq!(compiled.sort[1].field, "updated_at");
    }

    #[test]
    fn test_exact_free_text_is_single_phrase() {
        let request = SearchRequest::text("found family").with_exact_match();
        let Query::Bool(root) = compile(&request).query else {
            panic!("expected bool query");
        };
        let value = root.must[0].to_json();
        assert_eq!(value["multi_match"]["type"], "phrase");
        assert_eq!(value["multi_match"]["operator"], "and");
    }

    #[test]
    fn test_fuzzy_free_text_has_three_strategies() {
        let Query::Bool(root) = compile(&SearchRequest::text("found family")).query else {
            panic!("expected bool query");
        };
        let value = root.must[0].to_json();
        let should = value["bool"]["should"].as_array().unwrap();
        assert_eq!(should.len(), 3);
        assert_eq!(should[0]["multi_match"]["fields"][0], "title^3");
    }

    #[test]
    fn test_custom_search_fields() {
        let mut request = SearchRequest::text("dragons");
        request.search_fields = vec!["summary^4".to_string()];
        request.exact_match = true;
        let json = compile(&request).to_json();
        assert_eq!(
            json["query"]["bool"]["must"][0]["multi_match"]["fields"],
            json!(["summary^4"])
        );
    }

    #[test]
    fn test_unknown_sort_falls_back_to_updated_desc() {
        let request = SearchRequest::default().with_sort("popularity", "asc");
        let compiled = compile(&request);
        assert_eq!(compiled.sort, vec![SortClause::new("updated_at", SortOrder::Desc)]);
    }

    #[test]
    fn test_title_sort_uses_keyword() {
        let request = SearchRequest::default().with_sort("title", "asc");
        assert_eq!(
            compile(&request).sort,
            vec![SortClause::new("title.keyword", SortOrder::Asc)]
        );
    }

    #[test]
    fn test_invalid_date_is_ignored() {
        let mut request = SearchRequest::default();
        request.published.after = Some("not a date".to_string());
        request.updated.after = Some("2024-01-01".to_string());
        let Query::Bool(root) = compile(&request).query else {
            panic!("expected bool query");
        };
        assert_eq!(root.filter.len(), 1);
        assert_eq!(
            root.filter[0].to_json(),
            json!({ "range": { "updated_at": { "gte": "2024-01-01T00:00:00Z" } } })
        );
    }

    #[test]
    fn test_boosts_never_gate_eligibility() {
        let mut request = SearchRequest::default();
        request.boost_recent = true;
        request.boost_popular = true;
        let Query::Bool(root) = compile(&request).query else {
            panic!("expected bool query");
        };
        assert_eq!(root.should.len(), 2);
        assert_eq!(root.minimum_should_match, Some(0));
    }

    #[test]
    fn test_expand_tags_widens_characters() {
        let mut request = SearchRequest::default();
        request.relationships = vec!["Agatha Harkness/Reader".to_string()];
        request.expand_tags = true;
        let Query::Bool(root) = compile(&request).query else {
            panic!("expected bool query");
        };
        let filters: Vec<Value> = root.filter.iter().map(Query::to_json).collect();
        assert!(filters.contains(&json!({
            "terms": { "characters.keyword": ["Agatha Harkness", "Reader"] }
        })));
    }

    #[test]
    fn test_highlight_and_suggest_body() {
        let mut request = SearchRequest::text("harry");
        request.include_highlights = true;
        request.include_suggestions = true;
        let json = compile(&request).to_json();
        assert_eq!(json["highlight"]["fields"]["summary"]["number_of_fragments"], 2);
        assert_eq!(json["highlight"]["pre_tags"][0], "<mark>");
        assert_eq!(json["suggest"]["text"]["text"], "harry");
    }

    #[test]
    fn test_invalid_request_is_rejected_before_compiling() {
        let request = SearchRequest::default().with_page(0, 20);
        assert!(QueryBuilder::default().build(&request).is_err());
    }
}
