//! Storage address parsing.
//!
//! A `filepath` query value may name objects on any of three backends:
//! a local filesystem path, an `s3://bucket/key` URI, or an already
//! resolved `http(s)://` URL. [`StorageAddress::parse`] classifies the
//! raw string into a scheme plus location, once per request.

use crate::{Error, Result};
use url::Url;

/// Backend scheme an address resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Local,
    S3,
    Http,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Local => "local",
            Scheme::S3 => "s3",
            Scheme::Http => "http",
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed, immutable representation of a media reference.
///
/// `raw` always round-trips to an equivalent address under re-parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAddress {
    pub scheme: Scheme,
    /// S3 bucket or HTTP host; `None` for local paths.
    pub bucket_or_host: Option<String>,
    /// S3 object key, URL path, or filesystem path.
    pub key_or_path: String,
    /// The input string, preserved verbatim.
    pub raw: String,
}

impl StorageAddress {
    /// Classify a raw filepath string.
    ///
    /// Recognition rules, in order: an `s3://` prefix selects S3 (bucket =
    /// first path segment, key = remainder), an `http://` or `https://`
    /// prefix selects HTTP with the URL preserved verbatim, anything else
    /// is treated as a local filesystem path.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidAddress("empty filepath".to_string()));
        }

        if let Some(rest) = trimmed.strip_prefix("s3://") {
            let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
            if bucket.is_empty() {
                return Err(Error::InvalidAddress(format!(
                    "s3 address has no bucket: {trimmed}"
                )));
            }
            if key.is_empty() {
                return Err(Error::InvalidAddress(format!(
                    "s3 address has no key: {trimmed}"
                )));
            }
            return Ok(Self {
                scheme: Scheme::S3,
                bucket_or_host: Some(bucket.to_string()),
                key_or_path: key.to_string(),
                raw: trimmed.to_string(),
            });
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            let url = Url::parse(trimmed)
                .map_err(|e| Error::InvalidAddress(format!("bad url {trimmed}: {e}")))?;
            let host = url
                .host_str()
                .ok_or_else(|| Error::InvalidAddress(format!("url has no host: {trimmed}")))?
                .to_string();
            return Ok(Self {
                scheme: Scheme::Http,
                bucket_or_host: Some(host),
                key_or_path: url.path().to_string(),
                raw: trimmed.to_string(),
            });
        }

        Ok(Self {
            scheme: Scheme::Local,
            bucket_or_host: None,
            key_or_path: trimmed.to_string(),
            raw: trimmed.to_string(),
        })
    }
}

impl std::fmt::Display for StorageAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_bucket_and_key_recovered_exactly() {
        let addr = StorageAddress::parse("s3://coco-val-2017/val2017/000000000139.jpg").unwrap();
        assert_eq!(addr.scheme, Scheme::S3);
        assert_eq!(addr.bucket_or_host.as_deref(), Some("coco-val-2017"));
        assert_eq!(addr.key_or_path, "val2017/000000000139.jpg");
        assert_eq!(addr.raw, "s3://coco-val-2017/val2017/000000000139.jpg");
    }

    #[test]
    fn test_s3_missing_bucket_rejected() {
        assert!(matches!(
            StorageAddress::parse("s3:///key"),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_s3_missing_key_rejected() {
        assert!(matches!(
            StorageAddress::parse("s3://bucket-only"),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_empty_filepath_rejected() {
        assert!(matches!(
            StorageAddress::parse(""),
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!(
            StorageAddress::parse("   "),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_http_url_preserved_verbatim() {
        let raw = "https://example.com/images/cat.png?v=2";
        let addr = StorageAddress::parse(raw).unwrap();
        assert_eq!(addr.scheme, Scheme::Http);
        assert_eq!(addr.bucket_or_host.as_deref(), Some("example.com"));
        assert_eq!(addr.key_or_path, "/images/cat.png");
        assert_eq!(addr.raw, raw);
    }

    #[test]
    fn test_local_path_fallthrough() {
        let addr = StorageAddress::parse("/data/images/dog.jpg").unwrap();
        assert_eq!(addr.scheme, Scheme::Local);
        assert_eq!(addr.bucket_or_host, None);
        assert_eq!(addr.key_or_path, "/data/images/dog.jpg");

        let addr = StorageAddress::parse("relative/cat.jpg").unwrap();
        assert_eq!(addr.scheme, Scheme::Local);
    }

    #[test]
    fn test_raw_round_trips() {
        for raw in [
            "s3://bucket/key.jpg",
            "https://example.com/a/b.png",
            "/abs/path.jpg",
        ] {
            let first = StorageAddress::parse(raw).unwrap();
            let second = StorageAddress::parse(&first.raw).unwrap();
            assert_eq!(first, second);
        }
    }
}
