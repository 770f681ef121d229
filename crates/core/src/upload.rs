//! Size-bounded upload persistence.
//!
//! Copies an inbound byte stream to disk in fixed-size chunks and enforces a
//! hard ceiling on the bytes actually written. Declared lengths are never
//! trusted here; callers may pre-check a `Content-Length` header, but this is
//! the authoritative check.

use std::path::Path;

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::error::CoreError;
use crate::media::UploadCategory;
use crate::owner::OwnerId;
use crate::types::StoredFile;

/// Read buffer size (64 KiB).
pub const CHUNK_SIZE: usize = 64 * 1024;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Per-category upload ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub source_bytes: u64,
    pub template_bytes: u64,
}

impl UploadLimits {
    pub fn from_megabytes(source_mb: u64, template_mb: u64) -> Self {
        Self {
            source_bytes: source_mb.saturating_mul(BYTES_PER_MB),
            template_bytes: template_mb.saturating_mul(BYTES_PER_MB),
        }
    }

    pub fn for_category(&self, category: UploadCategory) -> u64 {
        match category {
            UploadCategory::Source => self.source_bytes,
            UploadCategory::Template => self.template_bytes,
        }
    }

    /// Ceiling for a whole request carrying both files, used for the
    /// declared `Content-Length` fast path.
    pub fn combined(&self) -> u64 {
        self.source_bytes.saturating_add(self.template_bytes)
    }
}

/// Stream `reader` into a new file at `destination`, failing once more than
/// `limit_bytes` have been received.
///
/// Parent directories are created as needed. The destination must not exist
/// yet. On any failure after the file was created (limit exceeded, reader
/// error, disk error) the partial file is removed before the error is
/// returned, so no later stage can observe it.
pub async fn write_bounded<R>(
    reader: &mut R,
    destination: &Path,
    owner: &OwnerId,
    limit_bytes: u64,
) -> Result<StoredFile, CoreError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)
        .await?;

    let result = copy_bounded(reader, &mut file, limit_bytes).await;
    // Close the handle before any removal attempt.
    drop(file);

    match result {
        Ok(size_bytes) => {
            tracing::debug!(
                path = %destination.display(),
                owner = %owner,
                size_bytes,
                "Upload stored"
            );
            Ok(StoredFile {
                absolute_path: std::path::absolute(destination)?,
                owner_id: owner.clone(),
                size_bytes,
                created_at: chrono::Utc::now(),
            })
        }
        Err(err) => {
            if matches!(err, CoreError::PayloadTooLarge { .. }) {
                tracing::warn!(
                    path = %destination.display(),
                    owner = %owner,
                    limit_bytes,
                    "Upload exceeded size limit, discarding partial file"
                );
            }
            discard_partial(destination).await;
            Err(err)
        }
    }
}

async fn copy_bounded<R>(reader: &mut R, file: &mut File, limit_bytes: u64) -> Result<u64, CoreError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written: u64 = 0;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        written += n as u64;
        if written > limit_bytes {
            return Err(CoreError::PayloadTooLarge { limit_bytes });
        }
        file.write_all(&buf[..n]).await?;
    }

    // tokio's File completes writes in the background; flush before handing
    // the path to anyone else.
    file.flush().await?;
    Ok(written)
}

/// Best-effort removal of a partially written file.
async fn discard_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
        }
    }
}
