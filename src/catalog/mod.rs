//! Catalog core: item model, list queries, processing engine and the
//! overview/detail services built on top of them

pub mod context;
pub mod detail;
pub mod engine;
pub mod error;
pub mod item;
pub mod overview;
pub mod query;

pub use context::CatalogContext;
pub use detail::DetailService;
pub use engine::{Aggregations, FacetEntry, Page, ProcessedPage};
pub use error::CatalogError;
pub use item::{Item, Metadata};
pub use overview::OverviewService;
pub use query::{FilterValue, ListQuery, SortOrder};
