//! Naming of the local file a response is saved to.

use std::path::{Path, PathBuf};

use faceswap_core::media::MediaKind;

/// Directory results are saved to when `--out` is not given.
pub const CLIENT_DIR: &str = "data/client";

/// Extension (with leading dot) for a response `Content-Type`.
///
/// Unknown or missing types fall back to `.bin`.
pub fn extension_for(content_type: Option<&str>) -> String {
    let kind = content_type
        .and_then(MediaKind::from_content_type)
        .unwrap_or(MediaKind::Binary);
    format!(".{}", kind.extension())
}

/// The `filename` parameter of a `Content-Disposition` header.
///
/// Only the final path component is kept, so a hostile header cannot point
/// outside the output directory.
pub fn disposition_filename(disposition: &str) -> Option<String> {
    let value = disposition.split(';').map(str::trim).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("filename")
            .then(|| value.trim().trim_matches('"'))
    })?;

    let name = Path::new(value).file_name()?.to_str()?;
    (!name.is_empty() && name != "." && name != "..").then(|| name.to_string())
}

/// Where to save a response.
///
/// An explicit `--out` wins, then the server's `Content-Disposition` name,
/// then `result_{source stem}_{unix ts}{ext}`.
pub fn output_path(
    explicit: Option<&Path>,
    disposition: Option<&str>,
    content_type: Option<&str>,
    source: &Path,
    unix_ts: u64,
) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let dir = Path::new(CLIENT_DIR);
    if let Some(name) = disposition.and_then(disposition_filename) {
        return dir.join(name);
    }
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string());
    dir.join(format!(
        "result_{stem}_{unix_ts}{}",
        extension_for(content_type)
    ))
}
