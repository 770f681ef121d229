//! The engine invoker.
//!
//! [`EngineInvoker`] is the seam the orchestrator depends on;
//! [`FaceFusionInvoker`] is the production implementation that runs the
//! engine as a child process.

use faceswap_core::types::{Artifact, JobSpec};
use tokio::process::Command;

use crate::environment::EngineEnvironment;
use crate::error::{preview, EngineError, STDERR_LOG_CHARS, STDERR_PREVIEW_CHARS};
use crate::subprocess::{self, RunError};

/// Outcome of one engine run, before output validation.
#[derive(Debug, Clone)]
pub struct EngineRunResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub output_path: std::path::PathBuf,
    pub duration_ms: u64,
}

/// Runs one face-swap job to completion.
pub trait EngineInvoker: Send + Sync {
    /// Run `job` under `env`, returning the produced artifact.
    ///
    /// Success requires exit code 0 **and** a non-empty file at
    /// `job.output_path`.
    fn run(
        &self,
        job: &JobSpec,
        env: &EngineEnvironment,
    ) -> impl std::future::Future<Output = Result<Artifact, EngineError>> + Send;
}

/// Invokes FaceFusion as a subprocess.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaceFusionInvoker;

impl FaceFusionInvoker {
    async fn execute(
        &self,
        job: &JobSpec,
        env: &EngineEnvironment,
    ) -> Result<EngineRunResult, EngineError> {
        env.strategy.verify()?;

        let argv = env.strategy.argv(job);
        let program = argv[0].to_string_lossy().into_owned();
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);

        tracing::info!(
            owner = %job.owner_id,
            strategy = env.strategy.label(),
            source = %job.source_path.display(),
            template = %job.template_path.display(),
            output = %job.output_path.display(),
            "Starting engine"
        );

        let output = subprocess::run_command(&mut cmd, env)
            .await
            .map_err(|e| match e {
                RunError::Spawn(source) => {
                    tracing::error!(program = %program, error = %source, "Engine could not be launched");
                    EngineError::Unavailable { program, source }
                }
                RunError::Wait(source) => EngineError::Io(source),
                RunError::Timeout { elapsed_ms, stderr } => {
                    tracing::error!(
                        elapsed_ms,
                        stderr = %preview(&stderr, STDERR_LOG_CHARS),
                        "Engine timed out and was killed"
                    );
                    EngineError::TimedOut { elapsed_ms }
                }
            })?;

        Ok(EngineRunResult {
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            output_path: job.output_path.clone(),
            duration_ms: output.duration_ms,
        })
    }
}

impl EngineInvoker for FaceFusionInvoker {
    async fn run(&self, job: &JobSpec, env: &EngineEnvironment) -> Result<Artifact, EngineError> {
        let result = self.execute(job, env).await?;
        validate_run(result).await
    }
}

/// Turn a finished run into an artifact, checking both the exit code and the
/// output file.
async fn validate_run(result: EngineRunResult) -> Result<Artifact, EngineError> {
    if result.exit_code != 0 {
        tracing::error!(
            exit_code = result.exit_code,
            stderr = %preview(&result.stderr, STDERR_LOG_CHARS),
            "Engine failed"
        );
        return Err(EngineError::ExecutionFailed {
            exit_code: result.exit_code,
            stderr_preview: preview(&result.stderr, STDERR_PREVIEW_CHARS),
        });
    }

    let produced = match tokio::fs::metadata(&result.output_path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(EngineError::Io(e)),
    };
    if !produced {
        tracing::error!(
            output = %result.output_path.display(),
            stdout = %preview(&result.stdout, STDERR_LOG_CHARS),
            "Engine exited cleanly but produced no output"
        );
        return Err(EngineError::NoOutput {
            path: result.output_path,
        });
    }

    tracing::info!(
        output = %result.output_path.display(),
        duration_ms = result.duration_ms,
        "Engine finished"
    );
    Ok(Artifact::from_output(result.output_path))
}
