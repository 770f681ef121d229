use std::path::PathBuf;

/// Maximum characters of stderr carried in an error returned to callers.
pub const STDERR_PREVIEW_CHARS: usize = 4000;

/// Maximum characters of stderr written to the log on failure.
pub const STDERR_LOG_CHARS: usize = 1000;

/// Failure modes of an engine invocation.
///
/// Launch failure, non-zero exit, timeout and missing output are distinct
/// because each calls for a different operator response.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine checkout not found: {} has no entry script", .home.display())]
    NotInstalled { home: PathBuf },

    #[error("engine executable '{program}' could not be launched: {source}")]
    Unavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine failed (exit code {exit_code}): {stderr_preview}")]
    ExecutionFailed {
        exit_code: i32,
        stderr_preview: String,
    },

    #[error("engine timed out after {elapsed_ms}ms")]
    TimedOut { elapsed_ms: u64 },

    #[error("engine produced no output at {}", .path.display())]
    NoOutput { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Truncate `text` to at most `max_chars` characters on a char boundary.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
