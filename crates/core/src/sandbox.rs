//! Asset sandbox.
//!
//! Resolves user-supplied template names to files strictly inside a
//! server-controlled assets root. The name is screened lexically before it
//! touches the filesystem, then the canonical result is checked against the
//! canonical root so symlinks cannot escape either. Nothing is cached: every
//! call re-checks.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::CoreError;
use crate::types::AssetTemplate;

/// Resolver for named template assets under a fixed root.
#[derive(Debug, Clone)]
pub struct AssetSandbox {
    root: PathBuf,
}

impl AssetSandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `name` to an existing regular file inside the assets root.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidTemplatePath`] if the name is absolute, contains
    ///   `..`, or resolves (through symlinks) outside the root.
    /// - [`CoreError::TemplateNotFound`] if nothing exists at the resolved
    ///   location or it is not a regular file.
    pub async fn resolve(&self, name: &str) -> Result<AssetTemplate, CoreError> {
        let relative = screen_name(name)?;

        let canonical_root = canonicalize_or_not_found(&self.root, name).await?;
        let canonical = canonicalize_or_not_found(&self.root.join(relative), name).await?;

        if !canonical.starts_with(&canonical_root) {
            tracing::warn!(
                name,
                resolved = %canonical.display(),
                "Template resolved outside the assets root"
            );
            return Err(CoreError::InvalidTemplatePath(name.to_string()));
        }

        let metadata = tokio::fs::metadata(&canonical).await?;
        if !metadata.is_file() {
            tracing::warn!(name, "Template is not a regular file");
            return Err(CoreError::TemplateNotFound(name.to_string()));
        }

        Ok(AssetTemplate {
            name: name.to_string(),
            resolved_path: canonical,
        })
    }
}

/// Reject names that could address anything outside the root, without
/// touching the filesystem.
fn screen_name(name: &str) -> Result<&Path, CoreError> {
    let path = Path::new(name);
    if name.trim().is_empty() || name.contains('\0') {
        return Err(CoreError::InvalidTemplatePath(name.to_string()));
    }

    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        tracing::warn!(name, "Attempt to escape the assets directory");
        return Err(CoreError::InvalidTemplatePath(name.to_string()));
    }

    Ok(path)
}

async fn canonicalize_or_not_found(path: &Path, name: &str) -> Result<PathBuf, CoreError> {
    match tokio::fs::canonicalize(path).await {
        Ok(p) => Ok(p),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            tracing::warn!(name, path = %path.display(), "Template not found");
            Err(CoreError::TemplateNotFound(name.to_string()))
        }
        Err(e) => Err(CoreError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn sandbox_with(files: &[&str]) -> (tempfile::TempDir, AssetSandbox) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("assets");
        std::fs::create_dir_all(&root).unwrap();
        for f in files {
            let path = root.join(f);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"png").unwrap();
        }
        (dir, AssetSandbox::new(root))
    }

    #[tokio::test]
    async fn resolves_existing_template_inside_root() {
        let (_dir, sandbox) = sandbox_with(&["face.png"]);

        let template = sandbox.resolve("face.png").await.unwrap();

        let root = std::fs::canonicalize(sandbox.root()).unwrap();
        assert!(template.resolved_path.starts_with(&root));
        assert!(template.resolved_path.is_file());
        assert_eq!(template.name, "face.png");
    }

    #[tokio::test]
    async fn resolves_nested_template_with_current_dir_segments() {
        let (_dir, sandbox) = sandbox_with(&["summer/beach.mp4"]);

        let template = sandbox.resolve("./summer/./beach.mp4").await.unwrap();
        assert!(template.resolved_path.ends_with("summer/beach.mp4"));
    }

    #[tokio::test]
    async fn rejects_parent_traversal() {
        let (dir, sandbox) = sandbox_with(&[]);
        std::fs::write(dir.path().join("secret.png"), b"secret").unwrap();

        for name in ["../secret.png", "../../etc/passwd", "sub/../../secret.png"] {
            assert_matches!(
                sandbox.resolve(name).await,
                Err(CoreError::InvalidTemplatePath(_)),
                "{}",
                name
            );
        }
    }

    #[tokio::test]
    async fn rejects_traversal_without_touching_a_missing_root() {
        // The root does not exist, so any filesystem access would surface as
        // TemplateNotFound. Getting InvalidTemplatePath proves the name was
        // rejected before the join was ever resolved.
        let sandbox = AssetSandbox::new("/data/assets");
        assert_matches!(
            sandbox.resolve("../secret.png").await,
            Err(CoreError::InvalidTemplatePath(_))
        );
    }

    #[tokio::test]
    async fn rejects_absolute_paths() {
        let (_dir, sandbox) = sandbox_with(&["face.png"]);
        assert_matches!(
            sandbox.resolve("/etc/passwd").await,
            Err(CoreError::InvalidTemplatePath(_))
        );
    }

    #[tokio::test]
    async fn rejects_empty_name() {
        let (_dir, sandbox) = sandbox_with(&[]);
        assert_matches!(sandbox.resolve("").await, Err(CoreError::InvalidTemplatePath(_)));
        assert_matches!(sandbox.resolve("  ").await, Err(CoreError::InvalidTemplatePath(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rejects_symlink_escape() {
        let (dir, sandbox) = sandbox_with(&[]);
        let outside = dir.path().join("outside.png");
        std::fs::write(&outside, b"secret").unwrap();
        std::os::unix::fs::symlink(&outside, sandbox.root().join("link.png")).unwrap();

        assert_matches!(
            sandbox.resolve("link.png").await,
            Err(CoreError::InvalidTemplatePath(_))
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn allows_symlink_within_root() {
        let (_dir, sandbox) = sandbox_with(&["real.png"]);
        std::os::unix::fs::symlink(
            sandbox.root().join("real.png"),
            sandbox.root().join("alias.png"),
        )
        .unwrap();

        let template = sandbox.resolve("alias.png").await.unwrap();
        assert!(template.resolved_path.ends_with("real.png"));
    }

    #[tokio::test]
    async fn missing_template_is_not_found() {
        let (_dir, sandbox) = sandbox_with(&["face.png"]);
        assert_matches!(
            sandbox.resolve("other.png").await,
            Err(CoreError::TemplateNotFound(_))
        );
    }

    #[tokio::test]
    async fn directory_is_not_a_template() {
        let (_dir, sandbox) = sandbox_with(&["summer/beach.mp4"]);
        assert_matches!(
            sandbox.resolve("summer").await,
            Err(CoreError::TemplateNotFound(_))
        );
    }
}
