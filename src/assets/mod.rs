//! Image assets and their on-demand enrichment

pub mod enricher;
pub mod types;

pub use enricher::{decode_image_info, pending_indices, AssetEnricher, ImageError, RangeEnrichment};
pub use types::{Asset, AssetSlot, ImageInfo, SizeEntry};
