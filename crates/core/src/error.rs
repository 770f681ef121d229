use std::path::PathBuf;

/// Errors raised while taking in files and resolving paths.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unsupported media type '{content_type}' for {category}")]
    UnsupportedMediaType {
        content_type: String,
        category: &'static str,
    },

    #[error("Payload exceeds the limit of {limit_bytes} bytes")]
    PayloadTooLarge { limit_bytes: u64 },

    #[error("Invalid owner id: {0}")]
    InvalidOwnerId(String),

    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template path escapes the assets root: {0}")]
    InvalidTemplatePath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
