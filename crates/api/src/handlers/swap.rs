//! Handler for the face swap endpoint.
//!
//! Form fields are consumed in arrival order and file fields are streamed
//! straight to disk, so `user_uid` has to come before `source` and
//! `template`.

use std::io;

use axum::body::Body;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, State};
use axum::http::header::{self, HeaderMap};
use axum::http::StatusCode;
use axum::response::Response;
use faceswap_core::error::CoreError;
use faceswap_core::media::{UploadCategory, OCTET_STREAM};
use faceswap_core::owner::OwnerId;
use faceswap_core::types::{Artifact, StoredFile};
use faceswap_core::upload::UploadLimits;
use faceswap_pipeline::{JobError, JobRequest, Orchestrator, TargetSource};
use futures::TryStreamExt;
use tokio_util::io::{ReaderStream, StreamReader};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Fields collected from the form before the job is submitted.
#[derive(Default)]
struct SwapForm {
    owner: Option<OwnerId>,
    source: Option<StoredFile>,
    template: Option<StoredFile>,
    template_name: Option<String>,
}

/// POST /api/v1/swap
///
/// Multipart form with `user_uid`, a `source` image and either a `template`
/// file or a `template_name` referring to a server-side asset. Responds with
/// the swapped image or video as an attachment.
pub async fn swap(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let orchestrator = state.orchestrator.as_ref();
    let limits = orchestrator.limits();
    check_declared_length(&headers, limits)?;

    let mut form = SwapForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e, limits))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "user_uid" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(&e, limits))?;
                form.owner = Some(OwnerId::parse(&text)?);
            }
            "source" | "template" => {
                let category = if name == "source" {
                    UploadCategory::Source
                } else {
                    UploadCategory::Template
                };
                let owner = form.owner.as_ref().ok_or_else(|| {
                    AppError::BadRequest("'user_uid' must be sent before file fields".into())
                })?;
                let slot = match category {
                    UploadCategory::Source => &mut form.source,
                    UploadCategory::Template => &mut form.template,
                };
                if slot.is_some() {
                    return Err(AppError::BadRequest(format!("Duplicate '{name}' field")));
                }
                let stored = ingest_field(orchestrator, owner, category, field, limits).await?;
                *slot = Some(stored);
            }
            "template_name" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(&e, limits))?;
                form.template_name = Some(text.trim().to_string());
            }
            _ => {} // ignore unknown fields
        }
    }

    let request = form.into_request()?;
    let artifact = orchestrator.submit(request).await?;
    artifact_response(&artifact).await
}

impl SwapForm {
    fn into_request(self) -> AppResult<JobRequest> {
        let owner_id = self
            .owner
            .ok_or_else(|| AppError::BadRequest("Missing required 'user_uid' field".into()))?;
        let source = self
            .source
            .ok_or_else(|| AppError::BadRequest("Missing required 'source' field".into()))?;

        let target = match (self.template, self.template_name) {
            (Some(file), None) => TargetSource::UploadedFile(file),
            (None, Some(name)) => TargetSource::NamedAsset(name),
            (None, None) => {
                return Err(AppError::BadRequest(
                    "One of 'template' or 'template_name' is required".into(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(AppError::BadRequest(
                    "Send either 'template' or 'template_name', not both".into(),
                ))
            }
        };

        Ok(JobRequest {
            owner_id,
            source,
            target,
        })
    }
}

/// Reject a request whose declared size already exceeds both limits combined.
fn check_declared_length(headers: &HeaderMap, limits: UploadLimits) -> AppResult<()> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    match declared {
        Some(length) if length > limits.combined() => {
            tracing::warn!(length, limit = limits.combined(), "Declared request size too large");
            Err(CoreError::PayloadTooLarge {
                limit_bytes: limits.combined(),
            }
            .into())
        }
        _ => Ok(()),
    }
}

/// Stream one file field into the owner's input partition.
async fn ingest_field(
    orchestrator: &Orchestrator,
    owner: &OwnerId,
    category: UploadCategory,
    field: Field<'_>,
    limits: UploadLimits,
) -> AppResult<StoredFile> {
    let content_type = field.content_type().unwrap_or(OCTET_STREAM).to_string();
    let reader = StreamReader::new(field.map_err(io::Error::other));
    tokio::pin!(reader);

    match orchestrator
        .ingest(owner, category, &content_type, &mut reader)
        .await
    {
        Ok(stored) => Ok(stored),
        // A body error surfaced through the reader: report it as the
        // multipart error it is rather than as an internal I/O failure.
        Err(JobError::Core(CoreError::Io(e))) => {
            match e.get_ref().and_then(|inner| inner.downcast_ref::<MultipartError>()) {
                Some(multipart) => Err(multipart_error(multipart, limits)),
                None => Err(CoreError::Io(e).into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

fn multipart_error(err: &MultipartError, limits: UploadLimits) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        CoreError::PayloadTooLarge {
            limit_bytes: limits.combined(),
        }
        .into()
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// Stream the artifact back with its media type and file name.
async fn artifact_response(artifact: &Artifact) -> AppResult<Response> {
    let file = tokio::fs::File::open(&artifact.output_path)
        .await
        .map_err(CoreError::Io)?;
    let length = file.metadata().await.map_err(CoreError::Io)?.len();

    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name());
    let stream = ReaderStream::new(file);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.media_kind.mime())
        .header(header::CONTENT_LENGTH, length.to_string())
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::InternalError(format!("Failed to build response: {e}")))
}
