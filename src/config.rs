//! Configuration Module
//!
//! Handles loading service configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::cache::{CacheOptions, DEFAULT_MAX_SIZE, DEFAULT_TTL};

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default cache TTL in milliseconds for entries without explicit TTL
    pub cache_ttl_ms: u64,
    /// Maximum number of entries the cache can hold
    pub cache_max_size: usize,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL_MS` - Default cache TTL in milliseconds (default: 300000)
    /// - `CACHE_MAX_SIZE` - Maximum cache entries (default: 100)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_ttl_ms: parse_var("CACHE_TTL_MS").unwrap_or(defaults.cache_ttl_ms),
            cache_max_size: parse_var("CACHE_MAX_SIZE").unwrap_or(defaults.cache_max_size),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }

    /// Options for the process-wide cache store.
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            ttl: Duration::from_millis(self.cache_ttl_ms),
            max_size: self.cache_max_size,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl_ms: DEFAULT_TTL.as_millis() as u64,
            cache_max_size: DEFAULT_MAX_SIZE,
            server_port: 3000,
        }
    }
}
