//! Indexing pipeline
//!
//! Enhances work documents and writes them to the search index, either one at
//! a time with immediate visibility or in concurrent bulk batches with
//! per-job retries and cooperative cancellation. [`IndexingQueue`] accepts
//! fire-and-forget jobs and flushes them in the background.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod queue;

pub use config::{IndexingConfig, IndexingConfigBuilder};
pub use error::{IndexingError, IndexingResult};
pub use pipeline::IndexingPipeline;
pub use queue::{IndexingQueue, IndexingQueueStatus};
