//! HTTP/HTTPS storage backend.
//!
//! Serves objects addressed by already-resolved URLs. One
//! [`reqwest::Client`] is built at startup with a fixed redirect limit,
//! a request timeout, and a bounded idle-connection pool, and shared
//! across requests.

use super::{ByteRange, ByteStream, ObjectMetadata, ObjectStore, clip_stream};
use crate::address::StorageAddress;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use reqwest::{Client, StatusCode, header};
use std::io;
use std::time::Duration;

const MAX_REDIRECTS: usize = 5;

/// Remote HTTP/HTTPS object adapter.
pub struct HttpStore {
    client: Client,
}

impl HttpStore {
    /// Build the shared HTTP client.
    ///
    /// * `timeout` - Per-request timeout; expiry maps to 504
    /// * `max_idle_connections` - Upper bound on pooled connections per host
    pub fn new(timeout: Duration, max_idle_connections: usize) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .pool_max_idle_per_host(max_idle_connections)
            .build()
            .map_err(|e| Error::Internal(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn map_request_error(err: reqwest::Error, address: &StorageAddress) -> Error {
        if err.is_timeout() {
            return Error::BackendTimeout(format!("upstream timed out: {address}"));
        }
        if err.is_redirect() {
            return Error::BackendUnavailable(format!(
                "redirect limit ({MAX_REDIRECTS}) exceeded: {address}"
            ));
        }
        Error::BackendUnavailable(format!("upstream request failed for {address}: {err}"))
    }

    fn map_status(status: StatusCode, address: &StorageAddress) -> Error {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Error::AccessDenied(format!("upstream returned {status}: {address}"))
            }
            StatusCode::RANGE_NOT_SATISFIABLE => Error::RangeNotSatisfiable { size: 0 },
            s if s.is_client_error() => {
                Error::NotFound(format!("upstream returned {status}: {address}"))
            }
            s => Error::BackendUnavailable(format!("upstream returned {s}: {address}")),
        }
    }
}

#[async_trait]
impl ObjectStore for HttpStore {
    async fn stat(&self, address: &StorageAddress) -> Result<ObjectMetadata> {
        let response = self
            .client
            .head(&address.raw)
            .send()
            .await
            .map_err(|e| Self::map_request_error(e, address))?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status(), address));
        }

        let headers = response.headers();
        let size = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| {
                Error::BackendUnavailable(format!("upstream sent no Content-Length: {address}"))
            })?;

        let mime_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| {
                mime_guess::from_path(&address.key_or_path)
                    .first_raw()
                    .unwrap_or("application/octet-stream")
                    .to_string()
            });

        let mut meta = ObjectMetadata::new(size, mime_type);
        meta.etag = headers
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        meta.last_modified = headers
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|t| t.with_timezone(&Utc));
        Ok(meta)
    }

    async fn open(
        &self,
        address: &StorageAddress,
        range: Option<ByteRange>,
    ) -> Result<ByteStream> {
        let mut request = self.client.get(&address.raw);
        if let Some(ref r) = range {
            request = request.header(header::RANGE, r.to_header_value());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::map_request_error(e, address))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_status(status, address));
        }

        let stream: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(io::Error::other)),
        );

        // Upstream ignored the Range header and sent the full object;
        // expose range semantics by clipping the stream rather than
        // buffering the body.
        if let Some(r) = range {
            if status == StatusCode::OK {
                let take = r.end.map(|end| end - r.start + 1);
                return Ok(clip_stream(stream, r.start, take));
            }
        }

        Ok(stream)
    }
}
