//! Child-process supervision.
//!
//! [`run_command`] spawns a prepared [`Command`], captures stdout/stderr and
//! enforces the wall-clock timeout. The caller sets program and arguments;
//! environment additions and working directory come from
//! [`EngineEnvironment`].

use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::environment::EngineEnvironment;

/// Maximum stdout or stderr size captured per stream (1 MiB).
///
/// The engine prints progress bars; the pipe is drained to EOF but anything
/// beyond this is discarded.
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// How long to wait for output readers once the child has exited or been
/// killed. A background process that inherited the pipes can keep them open
/// indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

const READ_CHUNK: usize = 8 * 1024;

/// Captured result of a finished child.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    pub duration_ms: u64,
}

/// Ways a supervised run can end without an exit status.
#[derive(Debug)]
pub enum RunError {
    /// The process could not be started.
    Spawn(std::io::Error),
    /// Waiting on the process failed.
    Wait(std::io::Error),
    /// The timeout fired and the process was killed.
    Timeout { elapsed_ms: u64, stderr: String },
}

/// Spawn `cmd`, capture its output and wait at most `env.timeout`.
pub async fn run_command(
    cmd: &mut Command,
    env: &EngineEnvironment,
) -> Result<CommandOutput, RunError> {
    // The child is killed if this future is dropped; callers that must not
    // cancel a running engine drive it from a detached task.
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    for (key, value) in &env.vars {
        cmd.env(key, value);
    }

    if let Some(dir) = &env.working_dir {
        cmd.current_dir(dir);
    }

    let start = Instant::now();

    let mut child = cmd.spawn().map_err(RunError::Spawn)?;

    // Read both pipes in spawned tasks so `child.wait()` can borrow `child`
    // and a chatty child cannot block on a full pipe.
    let stdout = StreamCapture::spawn(child.stdout.take());
    let stderr = StreamCapture::spawn(child.stderr.take());

    match tokio::time::timeout(env.timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            let stdout = stdout.finish().await;
            let stderr = stderr.finish().await;

            Ok(CommandOutput {
                stdout,
                stderr,
                exit_code: status.code().unwrap_or(-1),
                duration_ms,
            })
        }
        Ok(Err(e)) => Err(RunError::Wait(e)),
        Err(_elapsed) => {
            let elapsed_ms = start.elapsed().as_millis() as u64;
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "Failed to kill timed-out engine process");
            }
            drop(child);
            stdout.task.abort();

            Err(RunError::Timeout {
                elapsed_ms,
                stderr: stderr.finish().await,
            })
        }
    }
}

/// A background reader for one output pipe.
///
/// The first [`MAX_OUTPUT_BYTES`] are kept in a shared buffer so they survive
/// the reader being aborted.
struct StreamCapture {
    task: JoinHandle<()>,
    captured: Arc<Mutex<Vec<u8>>>,
}

impl StreamCapture {
    fn spawn<R>(handle: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let task = tokio::spawn(read_stream(handle, Arc::clone(&captured)));
        Self { task, captured }
    }

    /// Wait up to [`DRAIN_GRACE`] for EOF, then return what was captured.
    async fn finish(mut self) -> String {
        if tokio::time::timeout(DRAIN_GRACE, &mut self.task).await.is_err() {
            tracing::warn!("Engine output pipe still open after exit, abandoning reader");
            self.task.abort();
        }
        let bytes = std::mem::take(
            &mut *self
                .captured
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Read `handle` to EOF, keeping at most [`MAX_OUTPUT_BYTES`].
///
/// The pipe is never closed early: a child writing into a closed pipe gets
/// `SIGPIPE`.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>, captured: Arc<Mutex<Vec<u8>>>) {
    let Some(mut h) = handle else {
        return;
    };
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = match h.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        let mut buf = captured.lock().unwrap_or_else(PoisonError::into_inner);
        let room = MAX_OUTPUT_BYTES.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..n.min(room)]);
    }
}
