//! The `/media` endpoint.
//!
//! One request moves through parse, resolve, stat, open, stream. Every
//! error before the first body byte becomes a complete, well-formed
//! response; once headers are sent a backend failure can only abort the
//! connection, which is logged with the address and byte offset reached.

use super::AppState;
use crate::address::StorageAddress;
use crate::storage::{ByteRange, ByteStream};
use crate::{Error, Result};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use std::io;

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub filepath: Option<String>,
}

/// Serve the object named by the `filepath` query parameter, honoring an
/// optional `Range: bytes=<start>-<end>` request header.
pub async fn get_media(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let raw = query.filepath.as_deref().unwrap_or("");
    if raw.trim().is_empty() {
        return Err(Error::InvalidAddress(
            "missing or empty `filepath` query parameter".to_string(),
        ));
    }

    let address = StorageAddress::parse(raw)?;
    let store = state.registry.resolve(address.scheme)?;
    let meta = store.stat(&address).await?;

    // A malformed Range header is ignored and the full object served;
    // a well-formed but unsatisfiable one is rejected with 416.
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range_header);

    let (status, start, end) = match &range {
        Some(r) => {
            let (start, end) = r.bounds(meta.size_bytes)?;
            (StatusCode::PARTIAL_CONTENT, start, end)
        }
        None => (StatusCode::OK, 0, meta.size_bytes.saturating_sub(1)),
    };
    let content_length = if meta.size_bytes == 0 { 0 } else { end - start + 1 };

    let stream = store.open(&address, range).await?;
    let stream = log_aborts(stream, address.raw.clone());

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, meta.mime_type.as_str())
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::ACCEPT_RANGES, "bytes");
    if let Some(etag) = &meta.etag {
        builder = builder.header(header::ETAG, etag.as_str());
    }
    if let Some(last_modified) = meta.http_last_modified() {
        builder = builder.header(header::LAST_MODIFIED, last_modified);
    }
    if status == StatusCode::PARTIAL_CONTENT {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end, meta.size_bytes),
        );
    }

    builder
        .body(Body::from_stream(stream))
        .map_err(|e| Error::Internal(format!("failed to build response: {e}")))
}

/// Parse a `Range` header value of the form `bytes=<start>-[<end>]`.
///
/// Returns `None` for anything else (multi-part ranges, suffix ranges,
/// garbage), which the handler treats as "no range requested".
fn parse_range_header(value: &str) -> Option<ByteRange> {
    let spec = value.strip_prefix("bytes=")?.trim();
    if spec.contains(',') {
        return None;
    }
    let (start, end) = spec.split_once('-')?;
    let start: u64 = start.trim().parse().ok()?;
    let end = match end.trim() {
        "" => None,
        e => Some(e.parse().ok()?),
    };
    Some(ByteRange { start, end })
}

/// Count bytes forwarded so a mid-stream backend failure can be logged
/// with the offset reached. The error itself surfaces as a closed
/// connection; headers are already gone by then.
fn log_aborts(
    mut inner: ByteStream,
    address: String,
) -> impl Stream<Item = io::Result<Bytes>> + Send {
    async_stream::stream! {
        let mut offset: u64 = 0;
        while let Some(item) = inner.next().await {
            match item {
                Ok(chunk) => {
                    offset += chunk.len() as u64;
                    yield Ok(chunk);
                }
                Err(e) => {
                    tracing::warn!(
                        address = %address,
                        offset,
                        "stream aborted mid-transfer: {}",
                        e
                    );
                    yield Err(e);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_header_bounded() {
        assert_eq!(
            parse_range_header("bytes=0-9"),
            Some(ByteRange { start: 0, end: Some(9) })
        );
    }

    #[test]
    fn test_parse_range_header_open_ended() {
        assert_eq!(
            parse_range_header("bytes=100-"),
            Some(ByteRange { start: 100, end: None })
        );
    }

    #[test]
    fn test_parse_range_header_malformed_ignored() {
        assert_eq!(parse_range_header("bytes=abc-def"), None);
        assert_eq!(parse_range_header("bytes=0-9,20-29"), None);
        assert_eq!(parse_range_header("bytes=-500"), None);
        assert_eq!(parse_range_header("items=0-9"), None);
        assert_eq!(parse_range_header(""), None);
    }
}
