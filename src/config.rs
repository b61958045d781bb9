//! Runtime configuration
//!
//! Built once at startup from `CATALOG_*` environment variables and shared by
//! every service through the catalog context.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::api::client::{DEFAULT_BASE_URL, REQUEST_TIMEOUT};
use crate::api::messages::{DEFAULT_MESSAGES_URL, DEFAULT_MESSAGE_AUTHOR};
use crate::catalog::query::DEFAULT_LIMIT;

pub const ENV_CACHE_DIR: &str = "CATALOG_CACHE_DIR";
pub const ENV_CACHE_EXPIRY_SECS: &str = "CATALOG_CACHE_EXPIRY_SECS";
pub const ENV_API_URL: &str = "CATALOG_API_URL";
pub const ENV_MESSAGES_URL: &str = "CATALOG_MESSAGES_URL";
pub const ENV_MESSAGE_AUTHOR: &str = "CATALOG_MESSAGE_AUTHOR";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "CATALOG_REQUEST_TIMEOUT_SECS";
pub const ENV_DEFAULT_LIMIT: &str = "CATALOG_DEFAULT_LIMIT";
pub const ENV_LOOKAHEAD: &str = "CATALOG_LOOKAHEAD";

/// Default cache lifetime (1 hour)
pub const DEFAULT_CACHE_EXPIRY: Duration = Duration::from_secs(60 * 60);

/// Assets enriched ahead of the one being viewed
pub const DEFAULT_LOOKAHEAD: usize = 5;

/// Subdirectory of the platform cache directory
const CACHE_DIR_NAME: &str = "catalog-browser";

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogConfig {
    /// Directory holding one `<key>.json` file per cache entry
    pub cache_dir: PathBuf,
    /// Entries older than this are refetched
    pub cache_expiry: Duration,
    pub api_base_url: String,
    pub messages_base_url: String,
    /// Author tag comments are posted and listed under
    pub message_author: String,
    /// Per-request timeout for every remote call
    pub request_timeout: Duration,
    /// Page size when a query does not name one
    pub default_limit: usize,
    pub default_lookahead: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            cache_expiry: DEFAULT_CACHE_EXPIRY,
            api_base_url: DEFAULT_BASE_URL.to_string(),
            messages_base_url: DEFAULT_MESSAGES_URL.to_string(),
            message_author: DEFAULT_MESSAGE_AUTHOR.to_string(),
            request_timeout: REQUEST_TIMEOUT,
            default_limit: DEFAULT_LIMIT,
            default_lookahead: DEFAULT_LOOKAHEAD,
        }
    }
}

impl CatalogConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from any variable source.
    ///
    /// Unset or blank variables keep their defaults; unparsable numbers are
    /// logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Self {
            cache_dir: var(ENV_CACHE_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            cache_expiry: parse_var(ENV_CACHE_EXPIRY_SECS, var(ENV_CACHE_EXPIRY_SECS))
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_expiry),
            api_base_url: var(ENV_API_URL).unwrap_or(defaults.api_base_url),
            messages_base_url: var(ENV_MESSAGES_URL).unwrap_or(defaults.messages_base_url),
            message_author: var(ENV_MESSAGE_AUTHOR).unwrap_or(defaults.message_author),
            request_timeout: parse_var(ENV_REQUEST_TIMEOUT_SECS, var(ENV_REQUEST_TIMEOUT_SECS))
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            default_limit: parse_var(ENV_DEFAULT_LIMIT, var(ENV_DEFAULT_LIMIT))
                .map(|limit: usize| limit.max(1))
                .unwrap_or(defaults.default_limit),
            default_lookahead: parse_var(ENV_LOOKAHEAD, var(ENV_LOOKAHEAD))
                .unwrap_or(defaults.default_lookahead),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(variable = name, value = %value, "Ignoring invalid configuration value");
            None
        }
    }
}

/// `<platform cache dir>/catalog-browser`, or `./cache` when there is none
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join(CACHE_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("cache"))
}
