//! Storage backend abstraction for media objects.
//!
//! This module provides a trait-based abstraction for reading media objects,
//! allowing different storage backends (local filesystem, S3, HTTP) to be
//! used interchangeably behind one contract.
//!
//! # Implementations
//!
//! - [`LocalStore`] - Local filesystem storage, confined to a media root
//! - [`S3Store`] - S3-compatible object storage (feature `s3`)
//! - [`HttpStore`] - Remote HTTP/HTTPS objects (feature `http`)
//!
//! Adapters are registered once at startup in a [`StoreRegistry`] keyed by
//! [`Scheme`]; the registry is read-only afterwards and shared across
//! concurrent requests.

mod local;

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "s3")]
mod s3;

pub use local::LocalStore;

#[cfg(feature = "http")]
pub use http::HttpStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

use crate::address::{Scheme, StorageAddress};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

/// A sequential, forward-only stream of object bytes.
///
/// Not restartable; a fresh [`ObjectStore::open`] call is required to
/// re-read. Dropping the stream releases whatever handle or connection
/// the adapter holds, on cancellation exactly as on completion.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Inclusive byte range within an object. `end: None` means "to end of object".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Resolve against an object size to concrete inclusive `(start, end)`
    /// offsets. Violated ranges are rejected, never clamped.
    pub fn bounds(&self, size: u64) -> Result<(u64, u64)> {
        if self.start >= size {
            return Err(Error::RangeNotSatisfiable { size });
        }
        let end = self.end.unwrap_or(size - 1);
        if end < self.start || end >= size {
            return Err(Error::RangeNotSatisfiable { size });
        }
        Ok((self.start, end))
    }

    /// Render as an HTTP `Range` header value.
    pub fn to_header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

/// Metadata about a stored object.
///
/// `width`/`height`/`channels` are populated only by the prober, and only
/// for decodable image payloads; they are absent otherwise, never zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectMetadata {
    pub size_bytes: u64,
    pub mime_type: String,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub channels: Option<u8>,
}

impl ObjectMetadata {
    pub fn new(size_bytes: u64, mime_type: String) -> Self {
        Self {
            size_bytes,
            mime_type,
            etag: None,
            last_modified: None,
            width: None,
            height: None,
            channels: None,
        }
    }

    /// `Last-Modified` header value, when the backend reported a timestamp.
    pub fn http_last_modified(&self) -> Option<String> {
        self.last_modified
            .map(|t| t.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
    }
}

/// Object reader contract implemented per backend.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch size/type/etag/last-modified via the backend's cheap
    /// metadata-only call (fs stat, S3 HeadObject, HTTP HEAD).
    async fn stat(&self, address: &StorageAddress) -> Result<ObjectMetadata>;

    /// Open a byte stream for the object, honoring `range` when given.
    ///
    /// Backends with native partial reads (fs seek, S3 Range, HTTP Range)
    /// must use them; otherwise the adapter clips the stream itself rather
    /// than materializing the whole object.
    async fn open(&self, address: &StorageAddress, range: Option<ByteRange>)
    -> Result<ByteStream>;
}

/// Process-wide mapping from scheme to adapter, populated at startup.
///
/// Read-mostly and safe for unsynchronized concurrent reads; adapters own
/// their clients and connection pools, the registry holds no per-request
/// state.
#[derive(Default)]
pub struct StoreRegistry {
    stores: HashMap<Scheme, Arc<dyn ObjectStore>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scheme: Scheme, store: Arc<dyn ObjectStore>) {
        self.stores.insert(scheme, store);
    }

    /// Look up the adapter for a scheme. `UnsupportedScheme` is reachable
    /// only when the crate was built without the matching backend feature.
    pub fn resolve(&self, scheme: Scheme) -> Result<Arc<dyn ObjectStore>> {
        self.stores
            .get(&scheme)
            .cloned()
            .ok_or_else(|| Error::UnsupportedScheme(scheme.to_string()))
    }
}

/// Clip a stream to range semantics for backends without native partial
/// reads: discard `skip` leading bytes, then emit at most `take` bytes.
pub(crate) fn clip_stream(mut inner: ByteStream, mut skip: u64, take: Option<u64>) -> ByteStream {
    Box::pin(async_stream::stream! {
        let mut remaining = take;
        while let Some(item) = inner.next().await {
            let mut chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            if skip > 0 {
                if (chunk.len() as u64) <= skip {
                    skip -= chunk.len() as u64;
                    continue;
                }
                chunk = chunk.slice(skip as usize..);
                skip = 0;
            }
            if let Some(rem) = remaining.as_mut() {
                if *rem == 0 {
                    return;
                }
                if (chunk.len() as u64) > *rem {
                    chunk = chunk.slice(..*rem as usize);
                }
                *rem -= chunk.len() as u64;
            }
            if chunk.is_empty() {
                continue;
            }
            let done = remaining == Some(0);
            yield Ok(chunk);
            if done {
                return;
            }
        }
    })
}

/// Drain a stream into memory. Used by the prober for bounded prefixes
/// and full-read fallbacks, never by the request path.
pub async fn collect_stream(mut stream: ByteStream) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn chunked(chunks: Vec<&'static [u8]>) -> ByteStream {
        Box::pin(stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<Bytes, io::Error>(Bytes::from_static(c))),
        ))
    }

    #[test]
    fn test_bounds_full_range() {
        let range = ByteRange { start: 0, end: Some(9) };
        assert_eq!(range.bounds(100).unwrap(), (0, 9));
    }

    #[test]
    fn test_bounds_open_end() {
        let range = ByteRange { start: 10, end: None };
        assert_eq!(range.bounds(100).unwrap(), (10, 99));
    }

    #[test]
    fn test_bounds_start_past_end_of_object() {
        let range = ByteRange { start: 100, end: None };
        assert!(matches!(
            range.bounds(100),
            Err(Error::RangeNotSatisfiable { size: 100 })
        ));
    }

    #[test]
    fn test_bounds_end_past_object_rejected_not_clamped() {
        let range = ByteRange { start: 0, end: Some(100) };
        assert!(matches!(
            range.bounds(100),
            Err(Error::RangeNotSatisfiable { .. })
        ));
    }

    #[test]
    fn test_bounds_inverted_rejected() {
        let range = ByteRange { start: 9, end: Some(3) };
        assert!(matches!(
            range.bounds(100),
            Err(Error::RangeNotSatisfiable { .. })
        ));
    }

    #[test]
    fn test_bounds_empty_object() {
        let range = ByteRange { start: 0, end: None };
        assert!(matches!(
            range.bounds(0),
            Err(Error::RangeNotSatisfiable { size: 0 })
        ));
    }

    #[test]
    fn test_range_header_value() {
        assert_eq!(
            ByteRange { start: 0, end: Some(9) }.to_header_value(),
            "bytes=0-9"
        );
        assert_eq!(
            ByteRange { start: 5, end: None }.to_header_value(),
            "bytes=5-"
        );
    }

    #[test]
    fn test_registry_unsupported_scheme() {
        let registry = StoreRegistry::new();
        assert!(matches!(
            registry.resolve(Scheme::S3),
            Err(Error::UnsupportedScheme(_))
        ));
    }

    #[tokio::test]
    async fn test_clip_stream_skip_and_take_across_chunks() {
        let stream = chunked(vec![b"0123", b"4567", b"89"]);
        // bytes 2..=7 inclusive: skip 2, take 6
        let clipped = clip_stream(stream, 2, Some(6));
        let out = collect_stream(clipped).await.unwrap();
        assert_eq!(out, b"234567");
    }

    #[tokio::test]
    async fn test_clip_stream_skip_only() {
        let stream = chunked(vec![b"0123", b"4567"]);
        let clipped = clip_stream(stream, 6, None);
        let out = collect_stream(clipped).await.unwrap();
        assert_eq!(out, b"67");
    }

    #[tokio::test]
    async fn test_clip_stream_take_past_end() {
        let stream = chunked(vec![b"0123"]);
        let clipped = clip_stream(stream, 0, Some(100));
        let out = collect_stream(clipped).await.unwrap();
        assert_eq!(out, b"0123");
    }

    #[test]
    fn test_http_last_modified_format() {
        let mut meta = ObjectMetadata::new(10, "image/jpeg".to_string());
        meta.last_modified = DateTime::parse_from_rfc3339("2024-03-01T12:30:45Z")
            .ok()
            .map(|t| t.with_timezone(&Utc));
        assert_eq!(
            meta.http_last_modified().unwrap(),
            "Fri, 01 Mar 2024 12:30:45 GMT"
        );
    }
}
