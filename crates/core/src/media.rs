//! Media kinds accepted by the pipeline and their wire representations.

use std::path::Path;

use serde::Serialize;

use crate::error::CoreError;

/// MIME type returned for anything without a known extension.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// The closed set of media kinds the service deals in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Jpeg,
    Png,
    Mp4,
    Binary,
}

impl MediaKind {
    /// MIME string used in `Content-Type` headers.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Mp4 => "video/mp4",
            Self::Binary => OCTET_STREAM,
        }
    }

    /// Canonical file extension, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Mp4 => "mp4",
            Self::Binary => "bin",
        }
    }

    /// Parse a `Content-Type` value. Parameters (`; charset=...`) are ignored.
    ///
    /// Returns `None` for anything outside jpeg/png/mp4.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "video/mp4" => Some(Self::Mp4),
            _ => None,
        }
    }

    /// Infer the kind from a file extension, falling back to [`MediaKind::Binary`].
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("jpg" | "jpeg") => Self::Jpeg,
            Some("png") => Self::Png,
            Some("mp4") => Self::Mp4,
            _ => Self::Binary,
        }
    }
}

/// Which half of a swap request an upload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadCategory {
    /// The identity image whose face is transferred.
    Source,
    /// The target image or video that receives the face.
    Template,
}

impl UploadCategory {
    /// Prefix used for stored filenames and log fields.
    pub fn name(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Template => "template",
        }
    }

    /// Media kinds accepted for this category.
    pub fn allowed(self) -> &'static [MediaKind] {
        match self {
            Self::Source => &[MediaKind::Jpeg, MediaKind::Png],
            Self::Template => &[MediaKind::Jpeg, MediaKind::Png, MediaKind::Mp4],
        }
    }

    /// Validate a declared content type for this category.
    pub fn accept(self, content_type: &str) -> Result<MediaKind, CoreError> {
        MediaKind::from_content_type(content_type)
            .filter(|kind| self.allowed().contains(kind))
            .ok_or_else(|| CoreError::UnsupportedMediaType {
                content_type: content_type.to_string(),
                category: self.name(),
            })
    }
}
