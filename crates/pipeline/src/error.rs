use faceswap_core::error::CoreError;
use faceswap_engine::EngineError;
use serde::Serialize;

/// Any failure of a swap job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Engine is busy: no free slot after {waited_ms}ms")]
    Busy { waited_ms: u64 },
}

/// Transport-agnostic classification of a [`JobError`].
///
/// The HTTP layer maps these to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    NotFound,
    TooLarge,
    UnsupportedMedia,
    Unprocessable,
    Busy,
    Internal,
}

impl JobError {
    pub fn outcome(&self) -> JobOutcome {
        match self {
            Self::Core(core) => match core {
                CoreError::UnsupportedMediaType { .. } => JobOutcome::UnsupportedMedia,
                CoreError::PayloadTooLarge { .. } => JobOutcome::TooLarge,
                CoreError::InvalidOwnerId(_) => JobOutcome::Unprocessable,
                CoreError::SourceNotFound(_)
                | CoreError::TemplateNotFound(_)
                | CoreError::InvalidTemplatePath(_) => JobOutcome::NotFound,
                CoreError::Io(_) => JobOutcome::Internal,
            },
            Self::Engine(_) => JobOutcome::Internal,
            Self::Busy { .. } => JobOutcome::Busy,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Core(core) => match core {
                CoreError::UnsupportedMediaType { .. } => "UNSUPPORTED_MEDIA_TYPE",
                CoreError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
                CoreError::InvalidOwnerId(_) => "INVALID_OWNER_ID",
                CoreError::SourceNotFound(_) => "SOURCE_NOT_FOUND",
                // Same code as a missing template.
                CoreError::TemplateNotFound(_) | CoreError::InvalidTemplatePath(_) => {
                    "TEMPLATE_NOT_FOUND"
                }
                CoreError::Io(_) => "INTERNAL_ERROR",
            },
            Self::Engine(engine) => match engine {
                EngineError::NotInstalled { .. } => "ENGINE_NOT_INSTALLED",
                EngineError::Unavailable { .. } => "ENGINE_UNAVAILABLE",
                EngineError::ExecutionFailed { .. } => "ENGINE_EXECUTION_FAILED",
                EngineError::TimedOut { .. } => "ENGINE_TIMED_OUT",
                EngineError::NoOutput { .. } => "ENGINE_PRODUCED_NO_OUTPUT",
                EngineError::Io(_) => "INTERNAL_ERROR",
            },
            Self::Busy { .. } => "ENGINE_BUSY",
        }
    }

    /// Message safe to return across the trust boundary.
    ///
    /// Paths, I/O detail and launch errors stay in the logs; engine stderr is
    /// only ever returned as its bounded preview.
    pub fn public_message(&self) -> String {
        match self {
            Self::Core(core) => match core {
                CoreError::SourceNotFound(_) => "Source image not found".to_string(),
                CoreError::TemplateNotFound(_) | CoreError::InvalidTemplatePath(_) => {
                    "Template not found".to_string()
                }
                CoreError::Io(_) => "An internal error occurred".to_string(),
                other => other.to_string(),
            },
            Self::Engine(engine) => match engine {
                EngineError::NotInstalled { .. } => {
                    "Face swap engine is not installed".to_string()
                }
                EngineError::Unavailable { .. } => {
                    "Face swap engine is unavailable".to_string()
                }
                EngineError::NoOutput { .. } => {
                    "Face swap engine did not produce an output file".to_string()
                }
                EngineError::Io(_) => "An internal error occurred".to_string(),
                other => other.to_string(),
            },
            Self::Busy { .. } => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn sandbox_escape_looks_like_missing_template() {
        let escape = JobError::from(CoreError::InvalidTemplatePath("../secret.png".into()));
        let missing = JobError::from(CoreError::TemplateNotFound("nope.png".into()));

        assert_eq!(escape.outcome(), JobOutcome::NotFound);
        assert_eq!(escape.outcome(), missing.outcome());
        assert_eq!(escape.code(), missing.code());
        assert_eq!(escape.public_message(), missing.public_message());
    }

    #[test]
    fn engine_kinds_stay_distinct() {
        let unavailable = JobError::from(EngineError::Unavailable {
            program: "facefusion".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        let failed = JobError::from(EngineError::ExecutionFailed {
            exit_code: 1,
            stderr_preview: "bad input".into(),
        });
        let empty = JobError::from(EngineError::NoOutput {
            path: PathBuf::from("/out/x.png"),
        });

        for err in [&unavailable, &failed, &empty] {
            assert_eq!(err.outcome(), JobOutcome::Internal);
        }
        assert_ne!(unavailable.code(), failed.code());
        assert_ne!(failed.code(), empty.code());
        assert!(failed.public_message().contains("bad input"));
        assert!(!empty.public_message().contains("/out"));
    }

    #[test]
    fn io_detail_is_withheld() {
        let err = JobError::from(CoreError::Io(std::io::Error::other("disk /dev/sda1 full")));
        assert_eq!(err.outcome(), JobOutcome::Internal);
        assert!(!err.public_message().contains("sda1"));
    }

    #[test]
    fn client_errors_classify() {
        assert_eq!(
            JobError::from(CoreError::PayloadTooLarge { limit_bytes: 1 }).outcome(),
            JobOutcome::TooLarge
        );
        assert_eq!(
            JobError::from(CoreError::InvalidOwnerId("empty".into())).outcome(),
            JobOutcome::Unprocessable
        );
        assert_eq!(
            JobError::from(CoreError::UnsupportedMediaType {
                content_type: "image/gif".into(),
                category: "source",
            })
            .outcome(),
            JobOutcome::UnsupportedMedia
        );
        assert_eq!(JobError::Busy { waited_ms: 5 }.outcome(), JobOutcome::Busy);
    }
}
