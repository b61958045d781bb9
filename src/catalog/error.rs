//! Catalog Error Types

use crate::api::FetchError;

/// Failures surfaced by the overview and detail services.
///
/// Cache and image failures never show up here: the former are misses or
/// logged writes, the latter degrade one asset entry.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Remote API unavailable: {0}")]
    RemoteUnavailable(#[from] FetchError),

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),
}

impl CatalogError {
    /// Whether the remote reported the requested record as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::RemoteUnavailable(e) if e.is_not_found())
    }
}
