//! Structured query tree.
//!
//! Queries are assembled as a small tagged union and converted to the
//! index's JSON wire format in one place ([`Query::to_json`]). Builders and
//! the in-memory index both work on this tree, never on raw JSON.

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Boolean operator joining the terms of a text query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
}

impl Operator {
    fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
        }
    }
}

/// How a multi-field text query combines its fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiMatchType {
    BestFields,
    CrossFields,
    Phrase,
}

impl MultiMatchType {
    fn as_str(&self) -> &'static str {
        match self {
            MultiMatchType::BestFields => "best_fields",
            MultiMatchType::CrossFields => "cross_fields",
            MultiMatchType::Phrase => "phrase",
        }
    }
}

/// Ranking function used inside a function-score query
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreFunction {
    /// Gaussian decay away from a date origin
    DateDecay {
        field: String,
        origin: String,
        scale_days: u32,
        decay: f64,
        weight: f64,
    },
    /// `weight * log1p(factor * value)`
    FieldValueFactor {
        field: String,
        factor: f64,
        weight: f64,
    },
}

impl ScoreFunction {
    fn to_json(&self) -> Value {
        match self {
            ScoreFunction::DateDecay {
                field,
                origin,
                scale_days,
                decay,
                weight,
            } => json!({
                "gauss": {
                    field.as_str(): {
                        "origin": origin,
                        "scale": format!("{}d", scale_days),
                        "decay": decay,
                    }
                },
                "weight": weight,
            }),
            ScoreFunction::FieldValueFactor {
                field,
                factor,
                weight,
            } => json!({
                "field_value_factor": {
                    "field": field,
                    "factor": factor,
                    "modifier": "log1p",
                    "missing": 0,
                },
                "weight": weight,
            }),
        }
    }
}

/// Combinator of sub-queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    /// Must match, contributes to score
    pub must: Vec<Query>,
    /// Must match, no score contribution
    pub filter: Vec<Query>,
    /// Optional, adds to score
    pub should: Vec<Query>,
    /// Must not match
    pub must_not: Vec<Query>,
    pub minimum_should_match: Option<u32>,
}

impl BoolQuery {
    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
            && self.filter.is_empty()
            && self.should.is_empty()
            && self.must_not.is_empty()
    }
}

/// Query tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    MultiMatch {
        query: String,
        /// `field` or `field^boost`
        fields: Vec<String>,
        match_type: MultiMatchType,
        operator: Option<Operator>,
        slop: Option<u32>,
        boost: Option<f64>,
    },
    Match {
        field: String,
        query: String,
        operator: Operator,
        boost: Option<f64>,
    },
    MatchPhrase {
        field: String,
        query: String,
        boost: Option<f64>,
    },
    Term {
        field: String,
        value: Value,
        boost: Option<f64>,
    },
    Terms {
        field: String,
        values: Vec<String>,
    },
    Wildcard {
        field: String,
        pattern: String,
        boost: Option<f64>,
    },
    Range {
        field: String,
        gte: Option<Value>,
        lte: Option<Value>,
    },
    Ids {
        values: Vec<String>,
    },
    Bool(BoolQuery),
    FunctionScore {
        query: Box<Query>,
        functions: Vec<ScoreFunction>,
    },
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Term {
            field: field.into(),
            value: value.into(),
            boost: None,
        }
    }

    pub fn terms(field: impl Into<String>, values: &[String]) -> Self {
        Query::Terms {
            field: field.into(),
            values: values.to_vec(),
        }
    }

    pub fn match_phrase(field: impl Into<String>, query: impl Into<String>) -> Self {
        Query::MatchPhrase {
            field: field.into(),
            query: query.into(),
            boost: None,
        }
    }

    pub fn range(field: impl Into<String>, gte: Option<Value>, lte: Option<Value>) -> Self {
        Query::Range {
            field: field.into(),
            gte,
            lte,
        }
    }

    pub fn must(clauses: Vec<Query>) -> Self {
        Query::Bool(BoolQuery {
            must: clauses,
            ..Default::default()
        })
    }

    pub fn should(clauses: Vec<Query>) -> Self {
        Query::Bool(BoolQuery {
            should: clauses,
            ..Default::default()
        })
    }

    pub fn must_not(clauses: Vec<Query>) -> Self {
        Query::Bool(BoolQuery {
            must_not: clauses,
            ..Default::default()
        })
    }

    /// Convert to the index's JSON wire format
    pub fn to_json(&self) -> Value {
        match self {
            Query::MatchAll => json!({ "match_all": {} }),
            Query::MultiMatch {
                query,
                fields,
                match_type,
                operator,
                slop,
                boost,
            } => {
                let mut body = Map::new();
                body.insert("query".into(), json!(query));
                body.insert("fields".into(), json!(fields));
                body.insert("type".into(), json!(match_type.as_str()));
                if let Some(op) = operator {
                    body.insert("operator".into(), json!(op.as_str()));
                }
                if let Some(slop) = slop {
                    body.insert("slop".into(), json!(slop));
                }
                insert_boost(&mut body, *boost);
                json!({ "multi_match": body })
            }
            Query::Match {
                field,
                query,
                operator,
                boost,
            } => {
                let mut body = Map::new();
                body.insert("query".into(), json!(query));
                body.insert("operator".into(), json!(operator.as_str()));
                insert_boost(&mut body, *boost);
                json!({ "match": { field.as_str(): body } })
            }
            Query::MatchPhrase { field, query, boost } => match boost {
                Some(boost) => json!({
                    "match_phrase": { field.as_str(): { "query": query, "boost": boost } }
                }),
                None => json!({ "match_phrase": { field.as_str(): query } }),
            },
            Query::Term { field, value, boost } => match boost {
                Some(boost) => json!({
                    "term": { field.as_str(): { "value": value, "boost": boost } }
                }),
                None => json!({ "term": { field.as_str(): value } }),
            },
            Query::Terms { field, values } => json!({ "terms": { field.as_str(): values } }),
            Query::Wildcard {
                field,
                pattern,
                boost,
            } => {
                let mut body = Map::new();
                body.insert("value".into(), json!(pattern));
                insert_boost(&mut body, *boost);
                json!({ "wildcard": { field.as_str(): body } })
            }
            Query::Range { field, gte, lte } => {
                let mut bounds = Map::new();
                if let Some(gte) = gte {
                    bounds.insert("gte".into(), gte.clone());
                }
                if let Some(lte) = lte {
                    bounds.insert("lte".into(), lte.clone());
                }
                json!({ "range": { field.as_str(): bounds } })
            }
            Query::Ids { values } => json!({ "ids": { "values": values } }),
            Query::Bool(b) => {
                let mut body = Map::new();
                for (key, clauses) in [
                    ("must", &b.must),
                    ("filter", &b.filter),
                    ("should", &b.should),
                    ("must_not", &b.must_not),
                ] {
                    if !clauses.is_empty() {
                        body.insert(
                            key.into(),
                            Value::Array(clauses.iter().map(Query::to_json).collect()),
                        );
                    }
                }
                if let Some(min) = b.minimum_should_match {
                    body.insert("minimum_should_match".into(), json!(min));
                }
                json!({ "bool": body })
            }
            Query::FunctionScore { query, functions } => json!({
                "function_score": {
                    "query": query.to_json(),
                    "functions": functions.iter().map(ScoreFunction::to_json).collect::<Vec<_>>(),
                    "score_mode": "sum",
                    "boost_mode": "multiply",
                }
            }),
        }
    }
}

fn insert_boost(body: &mut Map<String, Value>, boost: Option<f64>) {
    if let Some(boost) = boost {
        body.insert("boost".into(), json!(boost));
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
