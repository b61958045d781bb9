//! Asset enrichment
//!
//! Downloads the images an asset points at and records their decoded width,
//! height, format and byte size. Every size entry is isolated: a failed fetch
//! or decode turns that entry into the null-dimension shape and nothing else.

use std::io::Cursor;

use futures::future::join_all;
use image::{ImageFormat, ImageReader};
use serde_json::Map;
use tracing::{debug, info, warn};

use super::types::{Asset, AssetSlot, ImageInfo, SizeEntry};
use crate::api::{ApiClient, FetchError};

/// Failure to turn one image URL into an `ImageInfo`
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Image fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Image header unreadable: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Decode header metadata from image bytes
pub fn decode_image_info(url: &str, bytes: &[u8]) -> Result<ImageInfo, ImageError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader.format().map(format_name);
    let (width, height) = reader.into_dimensions()?;

    Ok(ImageInfo {
        url: Some(url.to_string()),
        width: Some(width),
        height: Some(height),
        format,
        size: Some(bytes.len() as u64),
        ..ImageInfo::default()
    })
}

fn format_name(format: ImageFormat) -> String {
    format!("{:?}", format).to_lowercase()
}

/// Result of enriching part of an asset sequence
#[derive(Debug)]
pub struct RangeEnrichment {
    /// The full sequence: untouched slots cloned, enriched slots replaced
    pub assets: Vec<Option<AssetSlot>>,
    /// Indices that were enriched in this pass
    pub processed: Vec<usize>,
}

/// Fetches images and merges their dimensions into assets
#[derive(Clone)]
pub struct AssetEnricher {
    api: ApiClient,
}

impl AssetEnricher {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Fetch one image and decode its header
    pub async fn image_info(&self, url: &str) -> Result<ImageInfo, ImageError> {
        let bytes = self.api.get_bytes(url).await?;
        let info = decode_image_info(url, &bytes)?;
        debug!(
            url = url,
            width = ?info.width,
            height = ?info.height,
            format = ?info.format,
            "Decoded image"
        );
        Ok(info)
    }

    /// Enrich every size of an asset concurrently.
    ///
    /// Sizes that already carry a width are kept as they are.
    pub async fn process_asset(&self, asset: &Asset) -> Asset {
        let sizes = asset.0.iter().map(|(name, entry)| async move {
            (name.clone(), self.process_size(entry).await)
        });

        Asset(join_all(sizes).await.into_iter().collect())
    }

    async fn process_size(&self, entry: &SizeEntry) -> SizeEntry {
        if entry.width().is_some() {
            return entry.clone();
        }

        // Keys other than the decoded ones survive enrichment
        let extra = match entry {
            SizeEntry::Info(info) => info.extra.clone(),
            _ => Map::new(),
        };

        let Some(url) = entry.url() else {
            let raw_url = match entry {
                SizeEntry::Url(url) => Some(url.clone()),
                SizeEntry::Info(info) => info.url.clone(),
                SizeEntry::Other(_) => None,
            };
            return SizeEntry::Info(ImageInfo {
                extra,
                ..ImageInfo::unresolved(raw_url)
            });
        };

        let info = match self.image_info(url).await {
            Ok(info) => info,
            Err(e) => {
                warn!(url = url, error = %e, "Image processing failed, keeping entry without dimensions");
                ImageInfo::unresolved(Some(url.to_string()))
            }
        };
        SizeEntry::Info(ImageInfo { extra, ..info })
    }

    /// Enrich one slot of an asset sequence; bare URLs become `{medium: ...}`
    pub async fn process_slot(&self, slot: &AssetSlot) -> AssetSlot {
        match slot.to_asset() {
            Some(asset) => AssetSlot::Sizes(self.process_asset(&asset).await),
            None => slot.clone(),
        }
    }

    /// Enrich the not-yet-processed slots in `[start, start + lookahead)`.
    ///
    /// Slots outside the window and slots that are already processed are
    /// cloned untouched, so repeating a window costs no requests.
    pub async fn enrich_range(
        &self,
        assets: &[Option<AssetSlot>],
        start: usize,
        lookahead: usize,
    ) -> RangeEnrichment {
        let processed = pending_indices(assets, start, lookahead);
        if processed.is_empty() {
            return RangeEnrichment {
                assets: assets.to_vec(),
                processed,
            };
        }

        info!(
            count = processed.len(),
            first = processed[0],
            last = processed[processed.len() - 1],
            "Processing new assets"
        );

        let jobs = processed.iter().map(|&index| async move {
            let slot = match &assets[index] {
                Some(slot) => Some(self.process_slot(slot).await),
                None => None,
            };
            (index, slot)
        });

        let mut enriched = assets.to_vec();
        for (index, slot) in join_all(jobs).await {
            enriched[index] = slot;
        }

        RangeEnrichment {
            assets: enriched,
            processed,
        }
    }
}

/// Indices in `[start, start + lookahead)`, clipped to the sequence, that still need enrichment
pub fn pending_indices(assets: &[Option<AssetSlot>], start: usize, lookahead: usize) -> Vec<usize> {
    let end = assets.len().min(start.saturating_add(lookahead));
    (start.min(end)..end)
        .filter(|&i| assets[i].as_ref().is_some_and(AssetSlot::needs_processing))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// PNG bytes of a blank `width` x `height` image
    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn enricher() -> AssetEnricher {
        let api = ApiClient::new("http://unused.example", Duration::from_secs(5)).unwrap();
        AssetEnricher::new(api)
    }

    #[test]
    fn test_decode_png() {
        let bytes = png_bytes(3, 2);
        let info = decode_image_info("a.png", &bytes).unwrap();
        assert_eq!(info.width, Some(3));
        assert_eq!(info.height, Some(2));
        assert_eq!(info.format.as_deref(), Some("png"));
        assert_eq!(info.size, Some(bytes.len() as u64));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_image_info("x", b"definitely not an image").is_err());
    }

    #[test]
    fn test_pending_indices_window() {
        let assets: Vec<Option<AssetSlot>> = serde_json::from_value(json!([
            "a.jpg",
            {"medium": {"url": "b.jpg", "width": 10}},
            "c.jpg",
            null,
            "e.jpg"
        ]))
        .unwrap();

        assert_eq!(pending_indices(&assets, 0, 3), vec![0, 2]);
        assert_eq!(pending_indices(&assets, 2, 10), vec![2, 4]);
        assert_eq!(pending_indices(&assets, 9, 5), Vec::<usize>::new());
        assert_eq!(pending_indices(&assets, 0, 0), Vec::<usize>::new());
    }

    #[tokio::test]
    async fn test_process_asset_isolates_each_size() {
        let server = MockServer::start().await;
        let png = png_bytes(4, 3);
        Mock::given(method("GET"))
            .and(path("/ok.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png.clone()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/junk.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"junk".to_vec()))
            .mount(&server)
            .await;

        let asset: Asset = serde_json::from_value(json!({
            "medium": format!("{}/ok.png", server.uri()),
            "large": format!("{}/gone.png", server.uri()),
            "fluid": format!("{}/junk.png", server.uri()),
            "thumb": ""
        }))
        .unwrap();

        let processed = enricher().process_asset(&asset).await;

        let medium = processed.get("medium").unwrap();
        assert_eq!(medium.width(), Some(4));
        assert!(processed.is_processed());

        let large = serde_json::to_value(processed.get("large").unwrap()).unwrap();
        assert_eq!(large["url"], json!(format!("{}/gone.png", server.uri())));
        assert_eq!(large["width"], json!(null));

        assert_eq!(processed.get("fluid").unwrap().width(), None);

        let thumb = serde_json::to_value(processed.get("thumb").unwrap()).unwrap();
        assert_eq!(
            thumb,
            json!({"url": "", "width": null, "height": null, "format": null, "size": null})
        );
    }

    #[tokio::test]
    async fn test_process_asset_keeps_extra_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(4, 3)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let asset: Asset = serde_json::from_value(json!({
            "medium": {"url": format!("{}/ok.png", server.uri()), "alt": "Kaart"},
            "large": {"url": format!("{}/gone.png", server.uri()), "alt": "Kaart groot"},
            "thumb": {"alt": "Zonder url"}
        }))
        .unwrap();

        let processed = serde_json::to_value(enricher().process_asset(&asset).await).unwrap();
        assert_eq!(processed["medium"]["width"], json!(4));
        assert_eq!(processed["medium"]["alt"], json!("Kaart"));
        assert_eq!(processed["large"]["width"], json!(null));
        assert_eq!(processed["large"]["alt"], json!("Kaart groot"));
        assert_eq!(processed["thumb"]["alt"], json!("Zonder url"));
    }

    #[tokio::test]
    async fn test_process_slot_promotes_bare_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/one.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(5, 5)))
            .expect(1)
            .mount(&server)
            .await;

        let slot = AssetSlot::Url(format!("{}/one.png", server.uri()));
        let processed = enricher().process_slot(&slot).await;

        match processed {
            AssetSlot::Sizes(asset) => {
                assert_eq!(asset.get("medium").unwrap().width(), Some(5));
            }
            other => panic!("Expected sized asset, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_enrich_range_leaves_other_slots_alone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(2, 2)))
            .expect(2)
            .mount(&server)
            .await;

        let assets: Vec<Option<AssetSlot>> = (0..4)
            .map(|i| Some(AssetSlot::Url(format!("{}/{}.png", server.uri(), i))))
            .collect();

        let result = enricher().enrich_range(&assets, 1, 2).await;
        assert_eq!(result.processed, vec![1, 2]);
        assert_eq!(result.assets[0], assets[0]);
        assert!(result.assets[1].as_ref().unwrap().is_processed());
        assert!(result.assets[2].as_ref().unwrap().is_processed());
        assert_eq!(result.assets[3], assets[3]);
        // Input is not mutated
        assert!(!assets[1].as_ref().unwrap().is_processed());
    }
}
