//! Overview service
//!
//! Fetch-or-cache of the whole collection. A refresh normalizes every record,
//! enriches the card images of all items and stores the result under the
//! `overview` cache key; queries are then answered from memory.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, error, info};

use super::context::CatalogContext;
use super::engine::{self, ProcessedPage};
use super::error::CatalogError;
use super::item::{is_truthy, normalize_authors, Item};
use super::query::{FilterValue, ListQuery, AUTHOR_FIELD};
use crate::cache::OVERVIEW_KEY;

const OVERVIEW_ENDPOINT: &str = "overview";

/// Field used by category browsing
pub const CATEGORY_FIELD: &str = "category";

#[derive(Clone)]
pub struct OverviewService {
    ctx: Arc<CatalogContext>,
}

impl OverviewService {
    pub fn new(ctx: Arc<CatalogContext>) -> Self {
        Self { ctx }
    }

    /// The normalized collection, from cache when fresh.
    ///
    /// With `process_images = false` card images are not enriched and the
    /// result is not cached, so the cache only ever holds enriched data.
    pub async fn get_raw_data(&self, process_images: bool) -> Result<Vec<Item>, CatalogError> {
        self.load(process_images, false).await
    }

    /// Filtered, sorted and paginated view plus facet counts
    pub async fn get_processed_data(&self, query: &ListQuery) -> Result<ProcessedPage, CatalogError> {
        let data = self.get_raw_data(true).await?;
        Ok(engine::process(&data, query))
    }

    pub async fn get_item_by_id(&self, id: &str) -> Result<Option<Item>, CatalogError> {
        let data = self.get_raw_data(true).await?;
        Ok(engine::find_by_id(&data, id).cloned())
    }

    /// `get_processed_data` with `term` as the search
    pub async fn search(&self, term: &str, query: &ListQuery) -> Result<ProcessedPage, CatalogError> {
        let query = query.clone().with_search(term);
        self.get_processed_data(&query).await
    }

    /// `get_processed_data` restricted to one category
    pub async fn get_by_category(
        &self,
        category: &str,
        query: &ListQuery,
    ) -> Result<ProcessedPage, CatalogError> {
        let query = query
            .clone()
            .with_filter(CATEGORY_FIELD, FilterValue::One(category.to_string()));
        self.get_processed_data(&query).await
    }

    /// Drop the cached collection and rebuild it from the API
    pub async fn refresh_cache(&self) -> Result<Vec<Item>, CatalogError> {
        info!("Forcing overview cache refresh");
        self.load(true, true).await
    }

    async fn load(&self, process_images: bool, force: bool) -> Result<Vec<Item>, CatalogError> {
        let cache = &self.ctx.cache;
        let _guard = cache.lock(OVERVIEW_KEY).await;

        if force {
            cache.delete(OVERVIEW_KEY).await;
        } else if cache.is_valid(OVERVIEW_KEY, self.ctx.config.cache_expiry).await {
            if let Some(items) = cache.get::<Vec<Item>>(OVERVIEW_KEY).await {
                debug!(count = items.len(), "Serving overview from cache");
                return Ok(items);
            }
        }

        let records = match self.ctx.api.get(OVERVIEW_ENDPOINT).await? {
            Value::Array(records) => records,
            other => {
                error!(response = %other, "Overview response is not an array");
                return Err(CatalogError::MalformedResponse(
                    "overview response is not an array".to_string(),
                ));
            }
        };

        let items: Vec<Item> = records
            .into_iter()
            .filter_map(Item::from_api)
            .map(normalize_item)
            .collect();

        let items = if process_images {
            info!(count = items.len(), "Processing items with images");
            let items = join_all(items.into_iter().map(|item| self.enrich_card(item))).await;
            info!("Image processing completed");
            cache.set(OVERVIEW_KEY, &items).await;
            items
        } else {
            info!("Skipping image processing for fast lookup");
            items
        };

        Ok(items)
    }

    /// Enrich the single card asset of an item
    async fn enrich_card(&self, mut item: Item) -> Item {
        if let Some(slot) = item.asset.as_ref().filter(|slot| slot.needs_processing()) {
            item.asset = Some(self.ctx.enricher.process_slot(slot).await);
        }
        item
    }
}

fn normalize_item(mut item: Item) -> Item {
    if let Some(authors) = item.metadata.get(AUTHOR_FIELD).filter(|v| is_truthy(v)) {
        let normalized = normalize_authors(authors);
        item.metadata
            .insert(AUTHOR_FIELD.to_string(), Value::String(normalized));
    }
    item.with_labels()
}
