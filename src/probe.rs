//! Metadata probing over the same resolver/reader layer as `/media`.
//!
//! A probe stats an object and, for image payloads, decodes pixel
//! dimensions and channel count from a bounded prefix of the byte stream
//! instead of downloading the whole file. The dataset layer calls this
//! out-of-band when populating sample metadata, often in bulk.

use crate::address::StorageAddress;
use crate::storage::{ByteRange, ObjectMetadata, StoreRegistry, collect_stream};
use crate::Result;
use futures_util::{StreamExt, stream};
use image::ImageDecoder;
use std::io::Cursor;
use std::sync::Arc;

/// Prefix large enough to hold the header of any common image format.
/// Formats that bury their dimensions deeper fall back to a full read.
pub const IMAGE_PROBE_PREFIX: u64 = 64 * 1024;

const BATCH_CONCURRENCY: usize = 8;

/// Computes [`ObjectMetadata`] for objects addressed like `/media` requests.
pub struct Prober {
    registry: Arc<StoreRegistry>,
}

impl Prober {
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        Self { registry }
    }

    /// Probe a single filepath or URL.
    ///
    /// Non-image objects return stat metadata as-is. Image objects get
    /// `width`/`height`/`channels` populated when the payload decodes;
    /// an undecodable image payload leaves them absent rather than failing
    /// the probe.
    pub async fn probe(&self, raw: &str) -> Result<ObjectMetadata> {
        let address = StorageAddress::parse(raw)?;
        let store = self.registry.resolve(address.scheme)?;
        let mut meta = store.stat(&address).await?;

        if !meta.mime_type.starts_with("image/") || meta.size_bytes == 0 {
            return Ok(meta);
        }

        let prefix_len = meta.size_bytes.min(IMAGE_PROBE_PREFIX);
        let range = ByteRange {
            start: 0,
            end: Some(prefix_len - 1),
        };
        let prefix = collect_stream(store.open(&address, Some(range)).await?).await?;

        let decoded = match decode_header(&prefix) {
            Some(dims) => Some(dims),
            // Header not within the prefix; re-read the whole object once
            None if meta.size_bytes > prefix_len => {
                let full = collect_stream(store.open(&address, None).await?).await?;
                decode_full(&full)
            }
            None => decode_full(&prefix),
        };

        if let Some((width, height, channels)) = decoded {
            meta.width = Some(width);
            meta.height = Some(height);
            meta.channels = Some(channels);
        } else {
            tracing::debug!(address = %address, "image payload did not decode");
        }
        Ok(meta)
    }

    /// Probe many inputs with bounded concurrency, reporting per-item
    /// results in input order. A single item's failure never aborts the
    /// batch; degraded handling is the caller's policy.
    pub async fn probe_all(&self, inputs: &[String]) -> Vec<Result<ObjectMetadata>> {
        stream::iter(inputs)
            .map(|raw| self.probe(raw))
            .buffered(BATCH_CONCURRENCY)
            .collect()
            .await
    }
}

/// Header-only decode: dimensions and channel count without consuming the
/// full payload.
fn decode_header(buf: &[u8]) -> Option<(u32, u32, u8)> {
    let reader = image::ImageReader::new(Cursor::new(buf))
        .with_guessed_format()
        .ok()?;
    let decoder = reader.into_decoder().ok()?;
    let (width, height) = decoder.dimensions();
    let channels = decoder.color_type().channel_count();
    Some((width, height, channels))
}

/// Full decode fallback for formats whose headers resisted prefix parsing.
fn decode_full(buf: &[u8]) -> Option<(u32, u32, u8)> {
    let img = image::load_from_memory(buf).ok()?;
    Some((img.width(), img.height(), img.color().channel_count()))
}
