//! In-process index.
//!
//! Evaluates the [`Query`] tree directly against stored documents so the
//! service and pipeline can run without a live cluster. Matching is a
//! simplified model of the real analyzer: `.keyword` fields compare
//! exactly, other fields compare lowercase word tokens. Faults can be
//! injected to exercise retry, fallback and timeout paths.

use crate::models::{RefreshPolicy, WorkIndexDocument};
use crate::search::builder::{CompiledQuery, SortClause};
use crate::search::client::{
    BulkItemResult, BulkOperation, DeleteOutcome, IndexClient, IndexSearchResponse, SearchHit,
};
use crate::search::error::{SearchError, SearchResult};
use crate::search::facets::{Aggregation, RangeBucket};
use crate::search::query::{BoolQuery, MultiMatchType, Operator, Query, ScoreFunction};
use crate::search::request::SortOrder;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Default)]
struct Faults {
    failing_bulks: usize,
    failing_searches: bool,
    rejected: HashSet<String>,
    search_delay: Option<Duration>,
    bulk_delay: Option<Duration>,
}

/// Index kept in memory behind a lock
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    documents: RwLock<BTreeMap<String, WorkIndexDocument>>,
    faults: Mutex<Faults>,
    refreshes: Mutex<Vec<RefreshPolicy>>,
    bulk_calls: AtomicUsize,
    search_calls: AtomicUsize,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed documents without going through the client interface
    pub fn with_documents(documents: impl IntoIterator<Item = WorkIndexDocument>) -> Self {
        let index = Self::new();
        {
            let mut docs = index.documents.write();
            for doc in documents {
                docs.insert(doc.work_id.clone(), doc);
            }
        }
        index
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    pub fn document(&self, work_id: &str) -> Option<WorkIndexDocument> {
        self.documents.read().get(work_id).cloned()
    }

    /// Fail the next `count` bulk requests as a whole
    pub fn fail_next_bulks(&self, count: usize) {
        self.faults.lock().failing_bulks = count;
    }

    /// Reject writes of this work with a 400
    pub fn reject_work(&self, work_id: impl Into<String>) {
        self.faults.lock().rejected.insert(work_id.into());
    }

    /// Make every search fail at the transport level
    pub fn fail_searches(&self, failing: bool) {
        self.faults.lock().failing_searches = failing;
    }

    pub fn set_search_delay(&self, delay: Duration) {
        self.faults.lock().search_delay = Some(delay);
    }

    pub fn set_bulk_delay(&self, delay: Duration) {
        self.faults.lock().bulk_delay = Some(delay);
    }

    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(AtomicOrdering::SeqCst)
    }

    /// Refresh policies seen by write calls, oldest first
    pub fn refresh_log(&self) -> Vec<RefreshPolicy> {
        self.refreshes.lock().clone()
    }

    fn is_rejected(&self, work_id: &str) -> bool {
        self.faults.lock().rejected.contains(work_id)
    }

    fn take_bulk_failure(&self) -> bool {
        let mut faults = self.faults.lock();
        if faults.failing_bulks > 0 {
            faults.failing_bulks -= 1;
            true
        } else {
            false
        }
    }

    fn apply(&self, op: BulkOperation) -> BulkItemResult {
        let work_id = op.work_id().to_string();
        if self.is_rejected(&work_id) {
            return BulkItemResult::failed(work_id, 400, "document rejected by index");
        }
        let mut docs = self.documents.write();
        match op {
            BulkOperation::Index(doc) => {
                let status = if docs.contains_key(&work_id) { 200 } else { 201 };
                docs.insert(work_id.clone(), doc);
                BulkItemResult::ok(work_id, status)
            }
            BulkOperation::Delete(_) => match docs.remove(&work_id) {
                Some(_) => BulkItemResult::ok(work_id, 200),
                None => BulkItemResult::failed(work_id, 404, "not_found"),
            },
        }
    }
}

#[async_trait]
impl IndexClient for InMemoryIndex {
    async fn upsert(&self, doc: &WorkIndexDocument, refresh: RefreshPolicy) -> SearchResult<()> {
        self.refreshes.lock().push(refresh);
        if self.is_rejected(&doc.work_id) {
            return Err(SearchError::Rejected {
                status: 400,
                reason: "document rejected by index".to_string(),
            });
        }
        self.documents
            .write()
            .insert(doc.work_id.clone(), doc.clone());
        Ok(())
    }

    async fn delete(&self, work_id: &str, refresh: RefreshPolicy) -> SearchResult<DeleteOutcome> {
        self.refreshes.lock().push(refresh);
        Ok(match self.documents.write().remove(work_id) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        })
    }

    async fn get(&self, work_id: &str) -> SearchResult<Option<WorkIndexDocument>> {
        Ok(self.document(work_id))
    }

    async fn search(&self, query: &CompiledQuery) -> SearchResult<IndexSearchResponse> {
        self.search_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let (delay, failing) = {
            let faults = self.faults.lock();
            (faults.search_delay, faults.failing_searches)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(SearchError::Transport("index unavailable".to_string()));
        }

        let started = Instant::now();
        let now = Utc::now();
        let docs: Vec<WorkIndexDocument> = self.documents.read().values().cloned().collect();

        let mut matched: Vec<(f64, Value, WorkIndexDocument)> = Vec::new();
        let mut corpus: Vec<Value> = Vec::with_capacity(docs.len());
        for doc in docs {
            let value = serde_json::to_value(&doc)?;
            if let Some(score) = evaluate(&query.query, &value, now) {
                matched.push((score, value.clone(), doc));
            }
            corpus.push(value);
        }

        matched.sort_by(|a, b| {
            compare_hits((a.0, &a.1), (b.0, &b.1), &query.sort)
                .then_with(|| a.2.work_id.cmp(&b.2.work_id))
        });

        let values: Vec<&Value> = matched.iter().map(|(_, v, _)| v).collect();
        let aggregations = aggregate(&query.aggregations, &values);
        // the term suggester reads the whole index, not just the hits
        let suggestions = query
            .suggest_text
            .as_deref()
            .map(|text| suggest(text, &corpus.iter().collect::<Vec<_>>()))
            .unwrap_or_default();

        let mut highlight_terms = Vec::new();
        if query.highlight {
            collect_text_terms(&query.query, &mut highlight_terms);
        }

        let total = matched.len() as u64;
        let hits = matched
            .into_iter()
            .skip(query.from)
            .take(query.size)
            .map(|(score, _, mut doc)| {
                let highlights = highlight(&doc, &highlight_terms);
                for field in &query.source_excludes {
                    match field.as_str() {
                        "content" => doc.content.clear(),
                        "searchable_text" => doc.searchable_text.clear(),
                        _ => {}
                    }
                }
                SearchHit {
                    work_id: doc.work_id.clone(),
                    score: Some(score),
                    document: doc,
                    highlights,
                }
            })
            .collect();

        debug!(total, "In-memory search executed");
        Ok(IndexSearchResponse {
            total,
            hits,
            aggregations,
            suggestions,
            took_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn bulk(
        &self,
        operations: Vec<BulkOperation>,
        refresh: RefreshPolicy,
    ) -> SearchResult<Vec<BulkItemResult>> {
        self.bulk_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let delay = self.faults.lock().bulk_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.take_bulk_failure() {
            return Err(SearchError::Transport("connection reset".to_string()));
        }

        self.refreshes.lock().push(refresh);
        Ok(operations.into_iter().map(|op| self.apply(op)).collect())
    }
}

fn field_values<'a>(doc: &'a Value, field: &str) -> Vec<&'a Value> {
    let base = field.strip_suffix(".keyword").unwrap_or(field);
    match doc.get(base) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(value) => vec![value],
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn field_tokens(doc: &Value, field: &str) -> Vec<String> {
    field_values(doc, field)
        .into_iter()
        .flat_map(|v| tokenize(&text_of(v)))
        .collect()
}

/// Split `title^3` into the field and its boost
fn parse_field(field: &str) -> (&str, f64) {
    match field.split_once('^') {
        Some((field, boost)) => (field, boost.parse().unwrap_or(1.0)),
        None => (field, 1.0),
    }
}

fn contains_sequence(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

fn tokens_match(field_tokens: &[String], terms: &[String], operator: Operator) -> bool {
    if terms.is_empty() {
        return false;
    }
    match operator {
        Operator::And => terms.iter().all(|t| field_tokens.contains(t)),
        Operator::Or => terms.iter().any(|t| field_tokens.contains(t)),
    }
}

fn wildcard_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let mut rest = text;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        return l.partial_cmp(&r);
    }
    if let (Some(l), Some(r)) = (parse_date(left), parse_date(right)) {
        return Some(l.cmp(&r));
    }
    match (left, right) {
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

fn in_range(value: &Value, gte: Option<&Value>, lte: Option<&Value>) -> bool {
    let above = gte.map_or(true, |bound| {
        matches!(
            compare_values(value, bound),
            Some(Ordering::Greater | Ordering::Equal)
        )
    });
    let below = lte.map_or(true, |bound| {
        matches!(
            compare_values(value, bound),
            Some(Ordering::Less | Ordering::Equal)
        )
    });
    above && below
}

/// Score of `doc` under `query`, `None` when it does not match
fn evaluate(query: &Query, doc: &Value, now: DateTime<Utc>) -> Option<f64> {
    match query {
        Query::MatchAll => Some(1.0),
        Query::MultiMatch {
            query,
            fields,
            match_type,
            operator,
            boost,
            ..
        } => {
            let terms = tokenize(query);
            let operator = operator.unwrap_or(Operator::Or);
            let fields: Vec<(&str, f64)> = fields.iter().map(|f| parse_field(f)).collect();
            let best = match match_type {
                MultiMatchType::CrossFields => {
                    let combined: Vec<String> = fields
                        .iter()
                        .flat_map(|(field, _)| field_tokens(doc, field))
                        .collect();
                    tokens_match(&combined, &terms, operator).then_some(1.0)
                }
                MultiMatchType::BestFields | MultiMatchType::Phrase => fields
                    .iter()
                    .filter(|(field, _)| {
                        let tokens = field_tokens(doc, field);
                        if *match_type == MultiMatchType::Phrase {
                            contains_sequence(&tokens, &terms)
                        } else {
                            tokens_match(&tokens, &terms, operator)
                        }
                    })
                    .map(|(_, field_boost)| *field_boost)
                    .fold(None, |acc: Option<f64>, b| Some(acc.map_or(b, |a| a.max(b)))),
            };
            best.map(|score| score * boost.unwrap_or(1.0))
        }
        Query::Match {
            field,
            query,
            operator,
            boost,
        } => tokens_match(&field_tokens(doc, field), &tokenize(query), *operator)
            .then(|| boost.unwrap_or(1.0)),
        Query::MatchPhrase { field, query, boost } => {
            contains_sequence(&field_tokens(doc, field), &tokenize(query))
                .then(|| boost.unwrap_or(1.0))
        }
        Query::Term { field, value, boost } => field_values(doc, field)
            .into_iter()
            .any(|v| v == value)
            .then(|| boost.unwrap_or(1.0)),
        Query::Terms { field, values } => field_values(doc, field)
            .into_iter()
            .any(|v| v.as_str().is_some_and(|s| values.iter().any(|x| x == s)))
            .then_some(1.0),
        Query::Wildcard {
            field,
            pattern,
            boost,
        } => field_values(doc, field)
            .into_iter()
            .any(|v| wildcard_match(&pattern.to_lowercase(), &text_of(v).to_lowercase()))
            .then(|| boost.unwrap_or(1.0)),
        Query::Range { field, gte, lte } => field_values(doc, field)
            .into_iter()
            .any(|v| in_range(v, gte.as_ref(), lte.as_ref()))
            .then_some(1.0),
        Query::Ids { values } => doc
            .get("work_id")
            .and_then(Value::as_str)
            .is_some_and(|id| values.iter().any(|v| v == id))
            .then_some(1.0),
        Query::Bool(b) => evaluate_bool(b, doc, now),
        Query::FunctionScore { query, functions } => {
            let base = evaluate(query, doc, now)?;
            if functions.is_empty() {
                return Some(base);
            }
            let factor: f64 = functions.iter().map(|f| function_value(f, doc, now)).sum();
            Some(base * factor)
        }
    }
}

fn evaluate_bool(b: &BoolQuery, doc: &Value, now: DateTime<Utc>) -> Option<f64> {
    let mut score = 0.0;
    for clause in &b.must {
        score += evaluate(clause, doc, now)?;
    }
    for clause in &b.filter {
        evaluate(clause, doc, now)?;
    }
    if b.must_not.iter().any(|c| evaluate(c, doc, now).is_some()) {
        return None;
    }

    let mut matched = 0u32;
    for clause in &b.should {
        if let Some(s) = evaluate(clause, doc, now) {
            matched += 1;
            score += s;
        }
    }

    let implicit = u32::from(b.must.is_empty() && b.filter.is_empty() && !b.should.is_empty());
    if matched < b.minimum_should_match.unwrap_or(implicit) {
        return None;
    }
    Some(score)
}

fn function_value(function: &ScoreFunction, doc: &Value, now: DateTime<Utc>) -> f64 {
    match function {
        ScoreFunction::DateDecay {
            field,
            origin,
            scale_days,
            decay,
            weight,
        } => {
            let origin = if origin == "now" {
                Some(now)
            } else {
                parse_date(&json!(origin))
            };
            let date = field_values(doc, field).into_iter().find_map(parse_date);
            match (origin, date) {
                (Some(origin), Some(date)) if *scale_days > 0 => {
                    let distance = (origin - date).num_seconds().abs() as f64 / 86_400.0;
                    let ratio = distance / f64::from(*scale_days);
                    weight * decay.powf(ratio * ratio)
                }
                _ => 0.0,
            }
        }
        ScoreFunction::FieldValueFactor {
            field,
            factor,
            weight,
        } => {
            let value = field_values(doc, field)
                .into_iter()
                .find_map(Value::as_f64)
                .unwrap_or(0.0);
            weight * (factor * value).ln_1p()
        }
    }
}

fn sort_key<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
    field_values(doc, field).into_iter().next()
}

fn compare_hits(left: (f64, &Value), right: (f64, &Value), sort: &[SortClause]) -> Ordering {
    for clause in sort {
        let ordering = if clause.field == "_score" {
            left.0.partial_cmp(&right.0).unwrap_or(Ordering::Equal)
        } else {
            match (sort_key(left.1, &clause.field), sort_key(right.1, &clause.field)) {
                (Some(l), Some(r)) => compare_values(l, r).unwrap_or(Ordering::Equal),
                // missing values sort last in either direction
                (Some(_), None) => return Ordering::Less,
                (None, Some(_)) => return Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        };
        let ordering = match clause.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn aggregate(aggregations: &[Aggregation], docs: &[&Value]) -> Value {
    let mut out = serde_json::Map::new();
    for aggregation in aggregations {
        let buckets = match aggregation {
            Aggregation::Terms {
                field,
                size,
                min_doc_count,
                ..
            } => terms_buckets(docs, field, *size, *min_doc_count),
            Aggregation::Range { field, buckets, .. } => range_buckets(docs, field, buckets),
            Aggregation::YearHistogram { field, .. } => year_buckets(docs, field),
        };
        out.insert(aggregation.name().to_string(), json!({ "buckets": buckets }));
    }
    Value::Object(out)
}

fn terms_buckets(docs: &[&Value], field: &str, size: usize, min_doc_count: u64) -> Vec<Value> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for doc in docs {
        let distinct: BTreeSet<String> =
            field_values(doc, field).into_iter().map(text_of).collect();
        for key in distinct {
            *counts.entry(key).or_insert(0) += 1;
        }
    }

    let mut counts: Vec<(String, u64)> = counts
        .into_iter()
        .filter(|(_, count)| *count >= min_doc_count)
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
        .into_iter()
        .take(size)
        .map(|(key, count)| json!({ "key": key, "doc_count": count }))
        .collect()
}

fn range_buckets(docs: &[&Value], field: &str, buckets: &[RangeBucket]) -> Vec<Value> {
    buckets
        .iter()
        .map(|bucket| {
            let count = docs
                .iter()
                .filter(|doc| {
                    field_values(doc, field)
                        .into_iter()
                        .filter_map(Value::as_f64)
                        .any(|v| bucket.contains(v))
                })
                .count();
            json!({ "key": bucket.key, "doc_count": count })
        })
        .collect()
}

fn year_buckets(docs: &[&Value], field: &str) -> Vec<Value> {
    let mut years: BTreeMap<i32, u64> = BTreeMap::new();
    for doc in docs {
        if let Some(date) = field_values(doc, field).into_iter().find_map(parse_date) {
            *years.entry(date.year()).or_insert(0) += 1;
        }
    }
    years
        .into_iter()
        .map(|(year, count)| {
            let key = Utc
                .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
                .single()
                .map(|d| d.timestamp_millis())
                .unwrap_or_default();
            json!({ "key": key, "key_as_string": year.to_string(), "doc_count": count })
        })
        .collect()
}

fn collect_text_terms(query: &Query, terms: &mut Vec<String>) {
    match query {
        Query::MultiMatch { query, .. }
        | Query::Match { query, .. }
        | Query::MatchPhrase { query, .. } => {
            for token in tokenize(query) {
                if !terms.contains(&token) {
                    terms.push(token);
                }
            }
        }
        Query::Bool(b) => {
            for clause in b.must.iter().chain(&b.should) {
                collect_text_terms(clause, terms);
            }
        }
        Query::FunctionScore { query, .. } => collect_text_terms(query, terms),
        _ => {}
    }
}

fn highlight(doc: &WorkIndexDocument, terms: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut highlights = BTreeMap::new();
    if terms.is_empty() {
        return highlights;
    }

    for (field, text) in [("title", &doc.title), ("summary", &doc.summary)] {
        let mut hit = false;
        let marked: Vec<String> = text
            .split(' ')
            .map(|word| {
                let bare: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
                if !bare.is_empty() && terms.contains(&bare.to_lowercase()) {
                    hit = true;
                    format!("<mark>{}</mark>", word)
                } else {
                    word.to_string()
                }
            })
            .collect();
        if hit {
            highlights.insert(field.to_string(), vec![marked.join(" ")]);
        }
    }
    highlights
}

/// Closest title words for misspelled query terms
fn suggest(text: &str, docs: &[&Value]) -> Vec<String> {
    let vocabulary: BTreeSet<String> = docs
        .iter()
        .flat_map(|doc| field_tokens(doc, "title"))
        .collect();

    tokenize(text)
        .into_iter()
        .filter(|term| !vocabulary.contains(term))
        .filter_map(|term| {
            vocabulary
                .iter()
                .map(|word| (edit_distance(&term, word), word))
                .filter(|(distance, _)| *distance <= 2)
                .min_by_key(|(distance, _)| *distance)
                .map(|(_, word)| word.clone())
        })
        .collect()
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            current[j + 1] = (previous[j] + cost)
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        previous = current;
    }
    previous[b.len()]
}
