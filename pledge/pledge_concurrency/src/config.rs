//! Configuration for worker pools
//!
//! Handles loading, validating and merging thread pool configuration.

use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the JSON file the default pool is read from.
pub const CONFIG_ENV_VAR: &str = "PLEDGE_POOL_CONFIG";

/// Errors that can occur in configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the thread pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadPoolConfig {
    /// Number of worker threads
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Maximum size of the task queue; unbounded when absent
    #[serde(default)]
    pub queue_size: Option<usize>,

    /// Name prefix for worker threads
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,

    /// Whether to collect performance statistics
    #[serde(default = "default_collect_stats")]
    pub collect_stats: bool,
}

fn default_worker_threads() -> usize {
    // Blocking computations are common, keep a floor on small machines
    num_cpus::get().max(4)
}

fn default_thread_name_prefix() -> String {
    "pledge-worker".to_string()
}

fn default_collect_stats() -> bool {
    true
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            queue_size: None,
            thread_name_prefix: default_thread_name_prefix(),
            collect_stats: default_collect_stats(),
        }
    }
}

impl ThreadPoolConfig {
    /// Configuration for a pool with `threads` workers and defaults otherwise
    pub fn with_threads(threads: usize) -> Self {
        Self {
            worker_threads: threads,
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = ThreadPoolConfig::default();

        if let Some(path) = path {
            info!("Loading pool configuration from {}", path);

            if !Path::new(path).exists() {
                warn!("Pool configuration file not found: {}", path);
                return Ok(config);
            }

            let content = std::fs::read_to_string(path)
                .context(format!("Failed to read pool configuration file: {}", path))?;

            config = serde_json::from_str(&content)
                .context(format!("Failed to parse pool configuration file: {}", path))?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Configuration named by `PLEDGE_POOL_CONFIG`, or the defaults.
    ///
    /// A file that cannot be read or fails validation is reported and the
    /// defaults are used instead.
    pub fn from_env() -> Self {
        let path = std::env::var(CONFIG_ENV_VAR).ok();
        match Self::load(path.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring pool configuration: {:#}", e);
                Self::default()
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(ConfigError::Invalid(
                "Worker threads cannot be zero".to_string(),
            ));
        }

        if self.queue_size == Some(0) {
            return Err(ConfigError::Invalid("Queue size cannot be zero".to_string()));
        }

        if self.thread_name_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "Thread name prefix cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Merge with another configuration
    pub fn merge(&mut self, other: ThreadPoolConfig) {
        if other.worker_threads > 0 {
            self.worker_threads = other.worker_threads;
        }

        if other.queue_size.is_some() {
            self.queue_size = other.queue_size;
        }

        if !other.thread_name_prefix.is_empty() {
            self.thread_name_prefix = other.thread_name_prefix;
        }

        self.collect_stats = other.collect_stats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();

        let config_json = r#"
        {
            "worker_threads": 3,
            "queue_size": 64,
            "thread_name_prefix": "io-pool"
        }
        "#;
        std::fs::write(path, config_json).unwrap();

        let config = ThreadPoolConfig::load(Some(path)).unwrap();

        assert_eq!(config.worker_threads, 3);
        assert_eq!(config.queue_size, Some(64));
        assert_eq!(config.thread_name_prefix, "io-pool");
        assert!(config.collect_stats);
    }

    #[test]
    fn test_default_config() {
        let config = ThreadPoolConfig::load(None).unwrap();

        assert!(config.worker_threads >= 4);
        assert_eq!(config.queue_size, None);
        assert_eq!(config.thread_name_prefix, "pledge-worker");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ThreadPoolConfig::load(Some("/definitely/not/here.json")).unwrap();
        assert_eq!(config, ThreadPoolConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        std::fs::write(path, r#"{ "worker_threads": 0 }"#).unwrap();

        let err = ThreadPoolConfig::load(Some(path)).unwrap_err();
        assert!(err.to_string().contains("Worker threads cannot be zero"));

        std::fs::write(path, "{ not json").unwrap();
        let err = ThreadPoolConfig::load(Some(path)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_merge_config() {
        let mut base = ThreadPoolConfig::default();

        let override_config = ThreadPoolConfig {
            worker_threads: 2,
            queue_size: Some(10),
            thread_name_prefix: "override".to_string(),
            collect_stats: false,
        };

        base.merge(override_config);

        assert_eq!(base.worker_threads, 2);
        assert_eq!(base.queue_size, Some(10));
        assert_eq!(base.thread_name_prefix, "override");
        assert!(!base.collect_stats);
    }
}
