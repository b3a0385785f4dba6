use crate::enrichment::ScoringWeights;
use crate::indexing::IndexingConfig;
use crate::search::SearchConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Search index connection, timeouts and facet bounds
    #[serde(default)]
    pub index: SearchConfig,

    /// Bulk defaults and queue sizing
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Enhancement penalties and weights
    #[serde(default)]
    pub scoring: ScoringWeights,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, the file named by
    /// `ARCHIVE_SEARCH_CONFIG` and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("ARCHIVE_SEARCH_CONFIG")
            .unwrap_or_else(|_| "config/local.toml".to_string());
        Self::builder(Some(&config_path))?.build()?.try_deserialize()
    }

    /// Load configuration from the embedded defaults overlaid with `path`
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
        let path = path.as_ref().to_string_lossy().to_string();
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::with_name(&path).required(true))
            .build()?
            .try_deserialize()
    }

    fn builder(
        config_path: Option<&str>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let mut builder = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml));

        // Override with config file if it exists
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Override with environment variables (prefix: ARCHIVE_SEARCH__)
        Ok(builder.add_source(
            config::Environment::with_prefix("ARCHIVE_SEARCH")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        ))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            index: SearchConfig::default(),
            indexing: IndexingConfig::default(),
            scoring: ScoringWeights::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
