use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use faceswap_core::error::CoreError;
use faceswap_pipeline::{JobError, JobOutcome};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`JobError`] for everything the pipeline reports and adds
/// HTTP-specific variants. Implements [`IntoResponse`] to produce consistent
/// JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A job failure from `faceswap_pipeline`.
    #[error(transparent)]
    Job(#[from] JobError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self::Job(JobError::Core(err))
    }
}

/// HTTP status for a pipeline outcome.
pub fn outcome_status(outcome: JobOutcome) -> StatusCode {
    match outcome {
        JobOutcome::NotFound => StatusCode::NOT_FOUND,
        JobOutcome::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        JobOutcome::UnsupportedMedia => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        JobOutcome::Unprocessable => StatusCode::BAD_REQUEST,
        JobOutcome::Busy => StatusCode::SERVICE_UNAVAILABLE,
        JobOutcome::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Job(job) => {
                let outcome = job.outcome();
                match outcome {
                    JobOutcome::Internal => {
                        tracing::error!(error = %job, code = job.code(), "Job failed");
                    }
                    _ => tracing::warn!(error = %job, code = job.code(), "Job rejected"),
                }
                (outcome_status(outcome), job.code(), job.public_message())
            }

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
