//! Indexing configuration

use crate::models::{BulkIndexingOptions, RefreshPolicy};
use serde::{Deserialize, Serialize};

/// Indexing pipeline and queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Defaults applied to bulk runs and queue flushes
    pub bulk: BulkIndexingOptions,

    /// Jobs buffered by the queue before `submit` waits
    pub queue_capacity: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            bulk: BulkIndexingOptions::default(),
            queue_capacity: 1000,
        }
    }
}

/// Builder for IndexingConfig
#[derive(Debug, Default)]
pub struct IndexingConfigBuilder {
    config: IndexingConfig,
}

impl IndexingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.bulk.batch_size = size;
        self
    }

    pub fn max_concurrency(mut self, concurrency: usize) -> Self {
        self.config.bulk.max_concurrency = concurrency;
        self
    }

    pub fn flush_interval_secs(mut self, secs: u64) -> Self {
        self.config.bulk.flush_interval_secs = secs;
        self
    }

    pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.config.bulk.refresh_policy = policy;
        self
    }

    pub fn enable_retries(mut self, enabled: bool) -> Self {
        self.config.bulk.enable_retries = enabled;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.bulk.retry_delay_ms = ms;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn build(self) -> IndexingConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexingConfig::default();
        assert_eq!(config.bulk.batch_size, 100);
        assert_eq!(config.bulk.max_concurrency, 5);
        assert_eq!(config.bulk.refresh_policy, RefreshPolicy::Deferred);
        assert_eq!(config.queue_capacity, 1000);
    }

    #[test]
    fn test_builder() {
        let config = IndexingConfigBuilder::new()
            .batch_size(10)
            .max_concurrency(2)
            .enable_retries(false)
            .queue_capacity(50)
            .build();
        assert_eq!(config.bulk.batch_size, 10);
        assert_eq!(config.bulk.max_concurrency, 2);
        assert!(!config.bulk.enable_retries);
        assert_eq!(config.queue_capacity, 50);
    }
}
