//! Asset shapes
//!
//! An asset slot arrives either as a bare image URL or as a mapping from size
//! name ("medium", "large", ...) to a URL or an already decoded entry.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Size name used when a bare URL is promoted to an asset
pub const DEFAULT_SIZE: &str = "medium";

/// Decoded image properties for one size of an asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Encoded format as detected from the image header ("jpeg", "png", ...)
    #[serde(default)]
    pub format: Option<String>,
    /// Encoded size in bytes
    #[serde(default)]
    pub size: Option<u64>,
    /// Other keys of the entry (`alt`, ...), kept as delivered
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageInfo {
    /// Entry for an image whose dimensions could not be determined
    pub fn unresolved(url: Option<String>) -> Self {
        Self {
            url,
            ..Self::default()
        }
    }
}

/// One size entry of an asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeEntry {
    Url(String),
    Info(ImageInfo),
    Other(Value),
}

impl SizeEntry {
    /// Fetchable URL of this entry, if it has a non-empty one
    pub fn url(&self) -> Option<&str> {
        let url = match self {
            SizeEntry::Url(url) => url.as_str(),
            SizeEntry::Info(info) => info.url.as_deref()?,
            SizeEntry::Other(_) => return None,
        };
        (!url.is_empty()).then_some(url)
    }

    pub fn width(&self) -> Option<u32> {
        match self {
            SizeEntry::Info(info) => info.width,
            _ => None,
        }
    }
}

/// Named image sizes of one asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Asset(pub BTreeMap<String, SizeEntry>);

impl Asset {
    /// Promote a bare URL to a single-size asset
    pub fn from_url(url: &str) -> Self {
        let mut sizes = BTreeMap::new();
        sizes.insert(DEFAULT_SIZE.to_string(), SizeEntry::Url(url.to_string()));
        Self(sizes)
    }

    /// An asset is processed once any of its sizes carries a width
    pub fn is_processed(&self) -> bool {
        self.0.values().any(|entry| entry.width().is_some())
    }

    pub fn get(&self, size: &str) -> Option<&SizeEntry> {
        self.0.get(size)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One position in an item's asset sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetSlot {
    /// Unprocessed image URL
    Url(String),
    Sizes(Asset),
    /// Anything else the API sends; carried through untouched
    Other(Value),
}

impl AssetSlot {
    pub fn is_processed(&self) -> bool {
        matches!(self, AssetSlot::Sizes(asset) if asset.is_processed())
    }

    /// Whether enrichment has anything to do for this slot
    pub fn needs_processing(&self) -> bool {
        match self {
            AssetSlot::Url(url) => !url.is_empty(),
            AssetSlot::Sizes(asset) => !asset.is_empty() && !asset.is_processed(),
            AssetSlot::Other(_) => false,
        }
    }

    /// The slot as a sized asset, promoting a bare URL
    pub fn to_asset(&self) -> Option<Asset> {
        match self {
            AssetSlot::Url(url) => Some(Asset::from_url(url)),
            AssetSlot::Sizes(asset) => Some(asset.clone()),
            AssetSlot::Other(_) => None,
        }
    }
}
