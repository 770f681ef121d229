use std::path::PathBuf;

use serde::Serialize;

use crate::media::MediaKind;
use crate::owner::OwnerId;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A file persisted by the upload writer.
///
/// Immutable once written. Every job writes fresh files, so a `StoredFile`
/// never refers to a path another job is writing to.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub absolute_path: PathBuf,
    pub owner_id: OwnerId,
    pub size_bytes: u64,
    pub created_at: Timestamp,
}

/// A template asset resolved inside the assets root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetTemplate {
    /// The name exactly as the caller supplied it.
    pub name: String,
    /// Canonical path, always a descendant of the canonical assets root.
    pub resolved_path: PathBuf,
}

/// Everything the engine needs for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub source_path: PathBuf,
    pub template_path: PathBuf,
    pub output_path: PathBuf,
    pub owner_id: OwnerId,
}

/// The produced output of a successful job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub output_path: PathBuf,
    pub media_kind: MediaKind,
}

impl Artifact {
    /// Build an artifact, inferring the media kind from the output extension.
    pub fn from_output(output_path: PathBuf) -> Self {
        let media_kind = MediaKind::from_path(&output_path);
        Self {
            output_path,
            media_kind,
        }
    }

    /// File name of the output, used for `Content-Disposition`.
    pub fn file_name(&self) -> String {
        self.output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("result.{}", self.media_kind.extension()))
    }
}
