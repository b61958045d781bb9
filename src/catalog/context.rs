//! Shared service context
//!
//! Holds the configuration and the process-wide collaborators (cache, HTTP
//! clients, enricher). Built once and handed to every service behind an `Arc`.

use std::sync::Arc;
use tracing::info;

use super::detail::DetailService;
use super::overview::OverviewService;
use crate::api::{ApiClient, FetchError, MessageClient};
use crate::assets::AssetEnricher;
use crate::cache::CacheStore;
use crate::config::CatalogConfig;

pub struct CatalogContext {
    pub config: CatalogConfig,
    pub cache: CacheStore,
    /// Collection API client; also fetches image bytes
    pub api: ApiClient,
    pub enricher: AssetEnricher,
    pub messages: MessageClient,
}

impl CatalogContext {
    /// Build the context. All clients share one connection pool.
    pub fn new(config: CatalogConfig) -> Result<Self, FetchError> {
        let api = ApiClient::new(&config.api_base_url, config.request_timeout)?;
        let messages_api = ApiClient::with_client(api.http_client().clone(), &config.messages_base_url);

        info!(
            api = %config.api_base_url,
            cache_dir = %config.cache_dir.display(),
            expiry_secs = config.cache_expiry.as_secs(),
            "Catalog context ready"
        );

        Ok(Self {
            cache: CacheStore::new(config.cache_dir.clone()),
            enricher: AssetEnricher::new(api.clone()),
            messages: MessageClient::new(messages_api, &config.message_author),
            api,
            config,
        })
    }

    pub fn overview(self: &Arc<Self>) -> OverviewService {
        OverviewService::new(Arc::clone(self))
    }

    /// Detail service for one item
    pub fn detail(self: &Arc<Self>, id: &str) -> DetailService {
        DetailService::new(Arc::clone(self), id)
    }
}
