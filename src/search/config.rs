//! Search configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Search service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Base URL of the Elasticsearch-compatible index
    pub endpoint: String,

    /// Name of the works index
    pub index_name: String,

    /// Deadline for search requests in milliseconds
    pub search_timeout_ms: u64,

    /// Deadline for single-document writes and deletes in milliseconds
    pub write_timeout_ms: u64,

    /// Deadline for one bulk request in milliseconds
    pub bulk_timeout_ms: u64,

    /// Fall back to an unranked datastore query when the index fails
    pub datastore_fallback: bool,

    /// Facet bounds
    pub facets: FacetConfig,
}

/// Bounds applied to every terms facet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacetConfig {
    /// Maximum number of values returned per facet
    pub max_facet_values: usize,

    /// Minimum document count for a value to be returned
    pub min_doc_count: u64,
}

impl Default for FacetConfig {
    fn default() -> Self {
        Self {
            max_facet_values: 20,
            min_doc_count: 1,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9200".to_string(),
            index_name: "works".to_string(),
            search_timeout_ms: 30_000,
            write_timeout_ms: 10_000,
            bulk_timeout_ms: 60_000,
            datastore_fallback: true,
            facets: FacetConfig::default(),
        }
    }
}

impl SearchConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn bulk_timeout(&self) -> Duration {
        Duration::from_millis(self.bulk_timeout_ms)
    }
}

/// Builder for SearchConfig
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.config.index_name = name.into();
        self
    }

    pub fn search_timeout_ms(mut self, ms: u64) -> Self {
        self.config.search_timeout_ms = ms;
        self
    }

    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn bulk_timeout_ms(mut self, ms: u64) -> Self {
        self.config.bulk_timeout_ms = ms;
        self
    }

    pub fn datastore_fallback(mut self, enabled: bool) -> Self {
        self.config.datastore_fallback = enabled;
        self
    }

    pub fn max_facet_values(mut self, max: usize) -> Self {
        self.config.facets.max_facet_values = max;
        self
    }

    pub fn min_doc_count(mut self, count: u64) -> Self {
        self.config.facets.min_doc_count = count;
        self
    }

    pub fn build(self) -> SearchConfig {
        self.config
    }
}

impl Default for SearchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
