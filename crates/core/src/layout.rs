//! Per-owner storage layout for uploads and produced outputs.
//!
//! Paths look like `{root}/{owner}/{MM_YYYY}/{prefix}_{token}.{ext}` (or
//! without the month bucket under [`PartitionScheme::Owner`]). Tokens come
//! from the thread-local CSPRNG so concurrent jobs for the same owner never
//! race on a path.

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::CoreError;
use crate::media::{MediaKind, UploadCategory};
use crate::owner::OwnerId;

/// Hex characters in a filename token.
pub const TOKEN_LEN: usize = 8;

/// Stem used when the template gives nothing usable.
pub const DEFAULT_OUTPUT_STEM: &str = "result";

/// Extension used when the template has none.
pub const DEFAULT_OUTPUT_EXTENSION: &str = "png";

/// Maximum stem length kept from a template name.
const MAX_STEM_LEN: usize = 64;

/// Attempts at finding an unused output name before giving up.
const MAX_NAME_ATTEMPTS: usize = 8;

/// How owner directories are subdivided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionScheme {
    /// `{root}/{owner}`
    Owner,
    /// `{root}/{owner}/{MM_YYYY}`
    #[default]
    OwnerMonthly,
}

/// Derives input and output paths for an owner.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    input_root: PathBuf,
    output_root: PathBuf,
    partition: PartitionScheme,
}

impl StorageLayout {
    pub fn new(
        input_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        partition: PartitionScheme,
    ) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            partition,
        }
    }

    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Path for a new upload, e.g. `source_1f2e3d4c.jpg`.
    ///
    /// The partition directory is created; the file itself is left to the
    /// upload writer.
    pub async fn input_path(
        &self,
        owner: &OwnerId,
        category: UploadCategory,
        media: MediaKind,
    ) -> Result<PathBuf, CoreError> {
        let dir = self.partition_dir(&self.input_root, owner);
        tokio::fs::create_dir_all(&dir).await?;
        let filename = format!("{}_{}.{}", category.name(), random_token(), media.extension());
        Ok(dir.join(filename))
    }

    /// Path for a job's output, e.g. `beach_9a8b7c6d.mp4`.
    ///
    /// `stem` is sanitized; an empty result falls back to `result`. The
    /// returned path does not exist at the time of return.
    pub async fn output_path(
        &self,
        owner: &OwnerId,
        stem: &str,
        extension: Option<&str>,
    ) -> Result<PathBuf, CoreError> {
        let dir = self.partition_dir(&self.output_root, owner);
        tokio::fs::create_dir_all(&dir).await?;

        let stem = sanitize_stem(stem);
        let extension = extension
            .map(sanitize_extension)
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_OUTPUT_EXTENSION.to_string());

        for _ in 0..MAX_NAME_ATTEMPTS {
            let candidate = dir.join(format!("{stem}_{}.{extension}", random_token()));
            if !tokio::fs::try_exists(&candidate).await? {
                return Ok(std::path::absolute(candidate)?);
            }
            tracing::debug!(path = %candidate.display(), "Output name collision, regenerating");
        }

        Err(CoreError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free output name in {}", dir.display()),
        )))
    }

    fn partition_dir(&self, root: &Path, owner: &OwnerId) -> PathBuf {
        let owner_dir = root.join(owner);
        match self.partition {
            PartitionScheme::Owner => owner_dir,
            PartitionScheme::OwnerMonthly => owner_dir.join(month_bucket(chrono::Utc::now())),
        }
    }
}

/// Month bucket directory name, `MM_YYYY`.
pub fn month_bucket(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("%m_%Y").to_string()
}

/// Eight lowercase hex characters from the thread-local CSPRNG.
pub fn random_token() -> String {
    let bytes: [u8; TOKEN_LEN / 2] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_STEM_LEN)
        .collect();
    if cleaned.is_empty() {
        DEFAULT_OUTPUT_STEM.to_string()
    } else {
        cleaned
    }
}

fn sanitize_extension(ext: &str) -> String {
    ext.trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase()
}
