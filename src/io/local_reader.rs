use async_trait::async_trait;
use bytes::Bytes;
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::RangeReader;
use crate::error::IoError;

/// `RangeReader` over a local filesystem path, the counterpart to
/// `S3RangeReader` for sources that live on disk rather than in an object
/// store. Size is determined once at construction via `metadata()`, mirroring
/// `S3RangeReader::new`'s one-time HEAD request.
#[derive(Clone)]
pub struct LocalFileReader {
    path: std::sync::Arc<std::path::PathBuf>,
    size: u64,
    identifier: String,
}

impl LocalFileReader {
    pub async fn open(path: impl Into<std::path::PathBuf>) -> Result<Self, IoError> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| IoError::Filesystem {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let identifier = format!("file://{}", path.display());
        Ok(Self {
            size: metadata.len(),
            path: std::sync::Arc::new(path),
            identifier,
        })
    }
}

#[async_trait]
impl RangeReader for LocalFileReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        if offset + len as u64 > self.size {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.size,
            });
        }
        if len == 0 {
            return Ok(Bytes::new());
        }

        let mut file = tokio::fs::File::open(self.path.as_ref())
            .await
            .map_err(|e| IoError::Filesystem {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })?;

        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| IoError::Filesystem {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })?;

        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)
            .await
            .map_err(|e| IoError::Filesystem {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
