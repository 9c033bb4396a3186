use super::{ByteRange, ByteStream, ObjectMetadata, ObjectStore};
use crate::address::StorageAddress;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::{self, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

const CHUNK_SIZE: usize = 64 * 1024;

/// Local filesystem storage, confined to a media root.
///
/// Relative paths are joined to the root; absolute paths must already lie
/// under it after lexical normalization. Anything that escapes the root
/// is rejected with `Forbidden` before the filesystem is touched.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(media_root: PathBuf) -> Self {
        let root = std::path::absolute(&media_root).unwrap_or(media_root);
        Self {
            root: normalize(&root),
        }
    }

    fn resolve_path(&self, key_or_path: &str) -> Result<PathBuf> {
        let requested = Path::new(key_or_path);
        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };
        let resolved = normalize(&joined);
        if !resolved.starts_with(&self.root) {
            return Err(Error::Forbidden(format!(
                "path escapes media root: {key_or_path}"
            )));
        }
        Ok(resolved)
    }

    fn map_io(err: io::Error, path: &Path) -> Error {
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(format!("{}", path.display())),
            io::ErrorKind::PermissionDenied => {
                Error::AccessDenied(format!("{}", path.display()))
            }
            _ => Error::Io(err),
        }
    }

    async fn regular_file_metadata(&self, path: &Path) -> Result<std::fs::Metadata> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| Self::map_io(e, path))?;
        if metadata.is_dir() {
            // Framed as NotFound for clearer diagnostics than a bare 404
            return Err(Error::NotFound(format!(
                "is a directory, not a file: {}",
                path.display()
            )));
        }
        Ok(metadata)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn stat(&self, address: &StorageAddress) -> Result<ObjectMetadata> {
        let path = self.resolve_path(&address.key_or_path)?;
        let metadata = self.regular_file_metadata(&path).await?;

        let mime_type = mime_guess::from_path(&path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();

        let last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);
        let etag = last_modified
            .map(|t| format!("\"{:x}-{:x}\"", metadata.len(), t.timestamp()));

        let mut meta = ObjectMetadata::new(metadata.len(), mime_type);
        meta.etag = etag;
        meta.last_modified = last_modified;
        Ok(meta)
    }

    async fn open(
        &self,
        address: &StorageAddress,
        range: Option<ByteRange>,
    ) -> Result<ByteStream> {
        let path = self.resolve_path(&address.key_or_path)?;
        let metadata = self.regular_file_metadata(&path).await?;
        let size = metadata.len();

        let (start, span) = match range {
            Some(r) => {
                let (start, end) = r.bounds(size)?;
                (start, end - start + 1)
            }
            None => (0, size),
        };

        let mut file = fs::File::open(&path)
            .await
            .map_err(|e| Self::map_io(e, &path))?;
        if start > 0 {
            file.seek(SeekFrom::Start(start)).await?;
        }

        let reader = file.take(span);
        Ok(Box::pin(ReaderStream::with_capacity(reader, CHUNK_SIZE)))
    }
}

/// Lexical path normalization: resolves `.` and `..` components without
/// touching the filesystem, so nonexistent paths can still be checked
/// against the root.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
