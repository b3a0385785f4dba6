//! Search subsystem for a fan-fiction archive.
//!
//! Works are enhanced with derived ranking and tag-quality fields
//! ([`enrichment`]), written to an Elasticsearch-compatible index
//! ([`indexing`]) and queried through structured, faceted searches
//! ([`search`]). [`api`] exposes all of it over HTTP.

pub mod api;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod indexing;
pub mod metrics;
pub mod models;
pub mod search;

pub use error::{AppError, Result};
