//! Detail service
//!
//! One record per `detail-<id>` cache entry. Assets are enriched lazily: each
//! page view enriches the not-yet-processed slots of a small window and writes
//! the grown record back, so the cache fills in as the visitor pages through.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info};

use super::context::CatalogContext;
use super::error::CatalogError;
use super::item::Item;
use crate::cache::detail_key;

#[derive(Clone)]
pub struct DetailService {
    ctx: Arc<CatalogContext>,
    id: String,
    /// API endpoint of the record (`detail/<id>`)
    endpoint: String,
    cache_key: String,
}

impl DetailService {
    pub fn new(ctx: Arc<CatalogContext>, id: &str) -> Self {
        Self {
            ctx,
            id: id.to_string(),
            endpoint: format!("detail/{}", urlencoding::encode(id)),
            cache_key: detail_key(id),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// The normalized record, from cache when fresh. Assets are left as cached.
    pub async fn get_raw_data(&self) -> Result<Item, CatalogError> {
        let _guard = self.ctx.cache.lock(&self.cache_key).await;
        self.load(false).await
    }

    /// The record with assets `[page, page + lookahead)` enriched.
    ///
    /// Slots that are already processed are never refetched; when nothing in
    /// the window needs work the cached record is returned without any request.
    ///
    /// # Arguments
    /// * `page` - Index of the asset being viewed
    /// * `lookahead` - Number of slots to enrich, starting at `page`
    pub async fn get_data_with_processed_assets(
        &self,
        page: usize,
        lookahead: usize,
    ) -> Result<Item, CatalogError> {
        let _guard = self.ctx.cache.lock(&self.cache_key).await;
        let item = self.load(false).await?;

        let enrichment = self
            .ctx
            .enricher
            .enrich_range(&item.assets, page, lookahead)
            .await;

        if enrichment.processed.is_empty() {
            debug!(
                id = %self.id,
                page = page,
                lookahead = lookahead,
                "Assets in range already processed"
            );
            return Ok(item);
        }

        let count = enrichment.processed.len();
        let item = Item {
            assets: enrichment.assets,
            ..item
        };

        self.ctx.cache.set(&self.cache_key, &item).await;
        info!(id = %self.id, count = count, "Saved processed assets to cache");

        Ok(item)
    }

    /// Drop the cached record and fetch it again
    pub async fn refresh_cache(&self) -> Result<Item, CatalogError> {
        info!(id = %self.id, "Forcing detail cache refresh");
        let _guard = self.ctx.cache.lock(&self.cache_key).await;
        self.load(true).await
    }

    /// Fetch-or-cache; the caller holds the key lock
    async fn load(&self, force: bool) -> Result<Item, CatalogError> {
        let cache = &self.ctx.cache;

        if force {
            cache.delete(&self.cache_key).await;
        } else if cache.is_valid(&self.cache_key, self.ctx.config.cache_expiry).await {
            if let Some(item) = cache.get::<Item>(&self.cache_key).await {
                return Ok(item);
            }
        }

        let raw = match self.ctx.api.get(&self.endpoint).await? {
            raw @ Value::Object(_) => raw,
            other => {
                error!(id = %self.id, response = %other, "Detail response is not an object");
                return Err(CatalogError::MalformedResponse(format!(
                    "detail response for {} is not an object",
                    self.id
                )));
            }
        };

        let item = Item::from_api(raw)
            .ok_or_else(|| {
                CatalogError::MalformedResponse(format!(
                    "detail record {} has an unexpected shape",
                    self.id
                ))
            })?
            .with_labels();

        debug!(id = %self.id, assets = item.assets.len(), "Fetched detail record, assets processed on demand");
        cache.set(&self.cache_key, &item).await;
        Ok(item)
    }
}
