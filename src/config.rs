//! Layered configuration
//!
//! Values come from an optional config file overridden by `APP__`-prefixed
//! environment variables (e.g. `APP__SEARCH__MAX_PAGE_SIZE=50`).

use serde::Deserialize;

use crate::Result;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum connections in the shared pool
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Page size used when the caller does not ask for one
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,
    /// Upper clamp for requested page sizes
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// TTL for cached search pages. The staleness window is bounded by this
    /// value only; there is no write invalidation of the result cache.
    #[serde(default = "default_search_ttl")]
    pub search_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON logs instead of the human-readable format
    #[serde(default)]
    pub json: bool,
}

fn default_database_url() -> String {
    "postgres://localhost/roost".to_string()
}

fn default_pool_max_size() -> u32 {
    10
}

fn default_page_size() -> i64 {
    20
}

fn default_max_page_size() -> i64 {
    100
}

fn default_search_ttl() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search_ttl_seconds: default_search_ttl(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from `config/default.toml` (optional) plus
    /// environment overrides. Honors a `.env` file when present.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_from("config/default")
    }

    /// Load configuration from a specific file path (without extension) plus
    /// environment overrides.
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = Config::default();
        assert_eq!(config.search.default_page_size, 20);
        assert_eq!(config.search.max_page_size, 100);
        assert_eq!(config.cache.search_ttl_seconds, 60);
        assert_eq!(config.logging.level, "info");
    }
}
