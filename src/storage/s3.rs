//! S3-compatible storage backend.
//!
//! One [`aws_sdk_s3::Client`] is built at startup and shared read-only
//! across requests; the SDK maintains its own bounded connection pool.
//! Custom endpoints (MinIO, LocalStack) are supported with forced
//! path-style addressing.

use super::{ByteRange, ByteStream, ObjectMetadata, ObjectStore};
use crate::address::StorageAddress;
use crate::{Error, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use chrono::DateTime;
use std::io;

/// S3-compatible object storage adapter.
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Build the shared S3 client from the ambient AWS environment.
    ///
    /// * `region` - Optional region override (SDK defaults otherwise)
    /// * `endpoint` - Optional custom endpoint URL for S3-compatible services
    pub async fn new(region: Option<String>, endpoint: Option<String>) -> Result<Self> {
        let mut config_loader = aws_config::from_env();

        if let Some(region) = region {
            config_loader = config_loader.region(aws_config::Region::new(region));
        }

        let sdk_config = config_loader.load().await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = endpoint {
            s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(s3_config.build()),
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn bucket_and_key<'a>(address: &'a StorageAddress) -> Result<(&'a str, &'a str)> {
        let bucket = address
            .bucket_or_host
            .as_deref()
            .ok_or_else(|| Error::InvalidAddress(format!("s3 address has no bucket: {address}")))?;
        Ok((bucket, &address.key_or_path))
    }

    /// Map an SDK failure onto the error taxonomy. Missing bucket and
    /// missing key both surface as 404 but stay distinguishable in logs.
    fn map_sdk_error<E>(err: SdkError<E>, address: &StorageAddress) -> Error
    where
        E: ProvideErrorMetadata + std::fmt::Debug,
    {
        match err.code() {
            Some("NoSuchBucket") => {
                tracing::debug!(address = %address, "bucket does not exist");
                return Error::NotFound(format!("bucket does not exist: {address}"));
            }
            Some("NoSuchKey") | Some("NotFound") => {
                tracing::debug!(address = %address, "key does not exist");
                return Error::NotFound(format!("key does not exist: {address}"));
            }
            Some("AccessDenied") => {
                return Error::AccessDenied(format!("s3 denied access: {address}"));
            }
            Some("InvalidRange") => {
                // Size is unknown at the adapter; the handler validates
                // ranges against stat() before open() in the request path.
                return Error::RangeNotSatisfiable { size: 0 };
            }
            _ => {}
        }

        match &err {
            SdkError::ServiceError(ctx) if ctx.raw().status().as_u16() == 404 => {
                // HeadObject 404s carry no error code
                tracing::debug!(address = %address, "object does not exist");
                Error::NotFound(format!("object does not exist: {address}"))
            }
            SdkError::ServiceError(ctx) if ctx.raw().status().as_u16() == 403 => {
                Error::AccessDenied(format!("s3 denied access: {address}"))
            }
            SdkError::TimeoutError(_) => {
                Error::BackendTimeout(format!("s3 request timed out: {address}"))
            }
            _ => Error::BackendUnavailable(format!("s3 request failed for {address}: {err:?}")),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn stat(&self, address: &StorageAddress) -> Result<ObjectMetadata> {
        let (bucket, key) = Self::bucket_and_key(address)?;

        let head = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, address))?;

        let size = head.content_length().unwrap_or(0) as u64;
        let mime_type = head
            .content_type()
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                mime_guess::from_path(key)
                    .first_raw()
                    .unwrap_or("application/octet-stream")
                    .to_string()
            });

        let mut meta = ObjectMetadata::new(size, mime_type);
        meta.etag = head.e_tag().map(str::to_string);
        meta.last_modified = head
            .last_modified()
            .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()));
        Ok(meta)
    }

    async fn open(
        &self,
        address: &StorageAddress,
        range: Option<ByteRange>,
    ) -> Result<ByteStream> {
        let (bucket, key) = Self::bucket_and_key(address)?;

        let mut request = self.client.get_object().bucket(bucket).key(key);
        if let Some(ref r) = range {
            // Native S3 ranged fetch; never download-then-discard
            request = request.range(r.to_header_value());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, address))?;

        let mut body = response.body;
        Ok(Box::pin(async_stream::stream! {
            loop {
                match body.try_next().await {
                    Ok(Some(chunk)) => yield Ok(chunk),
                    Ok(None) => return,
                    Err(e) => {
                        yield Err(io::Error::other(e));
                        return;
                    }
                }
            }
        }))
    }
}
