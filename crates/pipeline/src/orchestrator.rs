//! The job orchestrator.
//!
//! Control flow for one request:
//!
//! ```text
//! ingest(source) ─┐
//! ingest(template)┼─> submit ─> resolve target ─> output path ─> admission ─> engine
//! or NamedAsset ──┘
//! ```
//!
//! Every step short-circuits on failure and nothing is retried.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use faceswap_core::error::CoreError;
use faceswap_core::layout::{StorageLayout, DEFAULT_OUTPUT_STEM};
use faceswap_core::media::UploadCategory;
use faceswap_core::owner::OwnerId;
use faceswap_core::sandbox::AssetSandbox;
use faceswap_core::types::{Artifact, JobSpec, StoredFile};
use faceswap_core::upload::{self, UploadLimits};
use faceswap_engine::{EngineError, EngineInvoker, EngineSettings, FaceFusionInvoker};
use tokio::io::AsyncRead;

use crate::admission::Admission;
use crate::error::JobError;

/// Where the job's target comes from.
#[derive(Debug, Clone)]
pub enum TargetSource {
    /// A template uploaded with the request.
    UploadedFile(StoredFile),
    /// The name of a pre-existing server-side asset.
    NamedAsset(String),
}

impl TargetSource {
    fn describe(&self) -> String {
        match self {
            Self::UploadedFile(file) => format!("upload:{}", file.absolute_path.display()),
            Self::NamedAsset(name) => format!("asset:{name}"),
        }
    }
}

/// A fully ingested request, ready to run.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub owner_id: OwnerId,
    pub source: StoredFile,
    pub target: TargetSource,
}

/// Resolved target: the file the engine reads plus output naming hints.
struct ResolvedTarget {
    path: PathBuf,
    stem: String,
    extension: Option<String>,
}

/// Composes the storage primitives and the engine invoker.
#[derive(Debug)]
pub struct Orchestrator<E = FaceFusionInvoker> {
    layout: StorageLayout,
    sandbox: AssetSandbox,
    limits: UploadLimits,
    engine: EngineSettings,
    admission: Admission,
    invoker: Arc<E>,
}

impl<E: EngineInvoker + 'static> Orchestrator<E> {
    pub fn new(
        layout: StorageLayout,
        sandbox: AssetSandbox,
        limits: UploadLimits,
        engine: EngineSettings,
        admission: Admission,
        invoker: E,
    ) -> Self {
        Self {
            layout,
            sandbox,
            limits,
            engine,
            admission,
            invoker: Arc::new(invoker),
        }
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }

    pub fn admission(&self) -> &Admission {
        &self.admission
    }

    pub fn engine(&self) -> &EngineSettings {
        &self.engine
    }

    /// Persist one uploaded file for `owner`.
    ///
    /// The content type is checked before any I/O; the bytes are then
    /// streamed to a fresh path under the owner's input partition with the
    /// category's size limit.
    pub async fn ingest<R>(
        &self,
        owner: &OwnerId,
        category: UploadCategory,
        content_type: &str,
        reader: &mut R,
    ) -> Result<StoredFile, JobError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let media = category.accept(content_type).inspect_err(|_| {
            tracing::warn!(
                owner = %owner,
                category = category.name(),
                content_type,
                "Unsupported content type"
            );
        })?;

        let destination = self.layout.input_path(owner, category, media).await?;
        let limit = self.limits.for_category(category);
        let stored = upload::write_bounded(reader, &destination, owner, limit).await?;

        tracing::info!(
            owner = %owner,
            category = category.name(),
            size_bytes = stored.size_bytes,
            path = %stored.absolute_path.display(),
            "Upload ingested"
        );
        Ok(stored)
    }

    /// Run a face swap for an ingested request.
    pub async fn submit(&self, request: JobRequest) -> Result<Artifact, JobError> {
        let start = Instant::now();
        let JobRequest {
            owner_id,
            source,
            target,
        } = request;

        tracing::info!(owner = %owner_id, target = %target.describe(), "Job submitted");

        let source_path = existing_file(&source.absolute_path)
            .await?
            .ok_or_else(|| CoreError::SourceNotFound(source.absolute_path.clone()))?;

        let target = self.resolve_target(&target).await?;
        let output_path = self
            .layout
            .output_path(&owner_id, &target.stem, target.extension.as_deref())
            .await?;

        let job = JobSpec {
            source_path,
            template_path: target.path,
            output_path,
            owner_id,
        };

        let owner_id = job.owner_id.clone();
        let permit = self.admission.acquire().await?;
        let env = self.engine.environment_from_process()?;

        // Once started, the engine runs to completion or to its own timeout
        // even if the caller goes away; the slot is held until then.
        let invoker = Arc::clone(&self.invoker);
        let run = tokio::spawn(async move {
            let result = invoker.run(&job, &env).await;
            drop(permit);
            result
        });
        let artifact = match run.await {
            Ok(result) => result?,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => return Err(EngineError::Io(std::io::Error::other(e)).into()),
        };

        tracing::info!(
            owner = %owner_id,
            output = %artifact.output_path.display(),
            media = artifact.media_kind.mime(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Job completed"
        );
        Ok(artifact)
    }

    async fn resolve_target(&self, target: &TargetSource) -> Result<ResolvedTarget, JobError> {
        match target {
            TargetSource::UploadedFile(file) => {
                let path = existing_file(&file.absolute_path).await?.ok_or_else(|| {
                    tracing::warn!(path = %file.absolute_path.display(), "Uploaded template missing");
                    CoreError::TemplateNotFound(file_name(&file.absolute_path))
                })?;
                Ok(ResolvedTarget {
                    extension: extension_of(&path),
                    stem: DEFAULT_OUTPUT_STEM.to_string(),
                    path,
                })
            }
            TargetSource::NamedAsset(name) => {
                let template = self.sandbox.resolve(name).await?;
                let stem = Path::new(name)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(ResolvedTarget {
                    extension: extension_of(Path::new(name)),
                    stem,
                    path: template.resolved_path,
                })
            }
        }
    }
}

/// Canonical path of `path` if it is an existing regular file.
async fn existing_file(path: &Path) -> Result<Option<PathBuf>, CoreError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some(tokio::fs::canonicalize(path).await?)),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CoreError::Io(e)),
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().into_owned())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
