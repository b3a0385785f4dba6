//! Datastore boundary used as a source of raw records and as the unranked
//! fallback when the index is unavailable

use crate::models::WorkRecord;
use crate::search::error::SearchResult;
use crate::search::request::SearchRequest;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Read access to the primary work datastore
#[async_trait]
pub trait WorkStore: Send + Sync {
    /// Fetch one work by id
    async fn fetch_work(&self, id: &str) -> SearchResult<Option<WorkRecord>>;

    /// Unranked search; returns one page of records and the total match count
    async fn search_works(
        &self,
        request: &SearchRequest,
        offset: usize,
        limit: usize,
    ) -> SearchResult<(Vec<WorkRecord>, u64)>;
}

/// In-memory work store (for development and testing)
#[derive(Clone, Default)]
pub struct InMemoryWorkStore {
    works: Arc<DashMap<String, WorkRecord>>,
}

impl InMemoryWorkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, work: WorkRecord) {
        tracing::debug!(work_id = %work.id, "Work stored");
        self.works.insert(work.id.clone(), work);
    }

    pub fn len(&self) -> usize {
        self.works.len()
    }

    pub fn is_empty(&self) -> bool {
        self.works.is_empty()
    }
}

fn matches(work: &WorkRecord, request: &SearchRequest) -> bool {
    if let Some(text) = request.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let needle = text.to_lowercase();
        if !work.title.to_lowercase().contains(&needle)
            && !work.summary.to_lowercase().contains(&needle)
        {
            return false;
        }
    }

    if !request.fandoms.is_empty() && !request.fandoms.iter().any(|f| work.fandoms.contains(f)) {
        return false;
    }
    if !request.ratings.is_empty() && !request.ratings.contains(&work.rating) {
        return false;
    }
    if !request.languages.is_empty() && !request.languages.contains(&work.language) {
        return false;
    }
    if let Some(complete) = request.is_complete {
        if work.completion_status.is_complete() != complete {
            return false;
        }
    }
    true
}

#[async_trait]
impl WorkStore for InMemoryWorkStore {
    async fn fetch_work(&self, id: &str) -> SearchResult<Option<WorkRecord>> {
        Ok(self.works.get(id).map(|entry| entry.clone()))
    }

    async fn search_works(
        &self,
        request: &SearchRequest,
        offset: usize,
        limit: usize,
    ) -> SearchResult<(Vec<WorkRecord>, u64)> {
        let mut found: Vec<WorkRecord> = self
            .works
            .iter()
            .filter(|entry| matches(entry.value(), request))
            .map(|entry| entry.value().clone())
            .collect();

        // newest first, id as tie-break
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));

        let total = found.len() as u64;
        let page = found.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn work(id: &str, title: &str, days_ago: i64) -> WorkRecord {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        WorkRecord {
            id: id.to_string(),
            title: title.to_string(),
            fandoms: vec!["Marvel".to_string()],
            rating: "General Audiences".to_string(),
            language: "en".to_string(),
            published_at: base - Duration::days(days_ago),
            updated_at: base - Duration::days(days_ago),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_work() {
        let store = InMemoryWorkStore::new();
        store.insert(work("w1", "Found Family", 1));

        assert!(store.fetch_work("w1").await.unwrap().is_some());
        assert!(store.fetch_work("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_orders_newest_first_and_pages() {
        let store = InMemoryWorkStore::new();
        store.insert(work("old", "Family Matters", 30));
        store.insert(work("new", "Found Family", 1));
        store.insert(work("other", "Coffee Shop", 2));

        let request = SearchRequest::text("family");
        let (page, total) = store.search_works(&request, 0, 1).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page[0].id, "new");

        let (page, _) = store.search_works(&request, 1, 1).await.unwrap();
        assert_eq!(page[0].id, "old");
    }

    #[tokio::test]
    async fn test_search_filters_completion() {
        let store = InMemoryWorkStore::new();
        store.insert(work("w1", "Found Family", 1));

        let mut request = SearchRequest::new();
        request.is_complete = Some(true);
        let (_, total) = store.search_works(&request, 0, 10).await.unwrap();
        assert_eq!(total, 0);
    }
}
