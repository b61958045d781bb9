//! Catalog Browser - data core of a server-rendered collection browser
//!
//! Fetches collection records from a remote API, keeps them in an on-disk JSON
//! cache, enriches image assets with their dimensions and answers overview
//! (search, filter, facet, sort, paginate) and detail queries.

pub mod api;
pub mod assets;
pub mod cache;
pub mod catalog;
pub mod config;

pub use catalog::{CatalogContext, CatalogError, DetailService, ListQuery, OverviewService};
pub use config::CatalogConfig;
