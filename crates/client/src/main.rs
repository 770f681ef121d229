use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context};
use clap::{ArgGroup, Parser};
use faceswap_core::media::MediaKind;
use reqwest::header::{HeaderName, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use tracing_subscriber::EnvFilter;

mod output;

/// Longest slice of an error body echoed to the terminal.
const ERROR_PREVIEW_CHARS: usize = 1000;

/// Send a face swap request and save the result.
#[derive(Parser)]
#[command(name = "faceswap-client")]
#[command(version)]
#[command(group(ArgGroup::new("template").required(true).args(["template_file", "template_name"])))]
struct Cli {
    /// Base URL of the service.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    host: String,

    /// Image whose face is transferred (jpeg or png).
    #[arg(long)]
    source_file: PathBuf,

    /// Local template to upload (jpeg, png or mp4).
    #[arg(long)]
    template_file: Option<PathBuf>,

    /// Name of a template already on the server.
    #[arg(long)]
    template_name: Option<String>,

    /// Owner id the request is filed under.
    #[arg(long)]
    user_uid: String,

    /// Where to save the result. Defaults to a name under `data/client/`.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 120.0)]
    timeout: f64,
}

/// How a run ended, mapped to the process exit code.
enum Failure {
    /// A local input file is missing (exit 1).
    MissingFile(PathBuf),
    /// The server answered with an error status (exit 2).
    Http { status: u16, preview: String },
    /// Anything else (exit 1).
    Other(anyhow::Error),
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(path) => {
            println!("OK: saved to {}", path.display());
            ExitCode::SUCCESS
        }
        Err(Failure::MissingFile(path)) => {
            eprintln!("File not found: {}", path.display());
            ExitCode::from(1)
        }
        Err(Failure::Http { status, preview }) => {
            eprintln!("Request failed: HTTP {status}: {preview}");
            ExitCode::from(2)
        }
        Err(Failure::Other(err)) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<PathBuf, Failure> {
    let source = file_part(&cli.source_file).await?;
    let mut form = Form::new()
        .text("user_uid", cli.user_uid.clone())
        .part("source", source);

    form = match (&cli.template_file, &cli.template_name) {
        (Some(path), _) => form.part("template", file_part(path).await?),
        (None, Some(name)) => form.text("template_name", name.clone()),
        (None, None) => {
            return Err(anyhow!("one of --template-file or --template-name is required").into())
        }
    };

    let url = format!("{}/api/v1/swap", cli.host.trim_end_matches('/'));
    tracing::debug!(%url, "Sending swap request");

    let timeout = request_timeout(cli.timeout)?;
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let response = client
        .post(&url)
        .multipart(form)
        .send()
        .await
        .with_context(|| format!("Request to {url} failed"))?;

    let status = response.status();
    if status.as_u16() >= 400 {
        let body = response.text().await.unwrap_or_default();
        return Err(Failure::Http {
            status: status.as_u16(),
            preview: body.chars().take(ERROR_PREVIEW_CHARS).collect(),
        });
    }

    let header = |name: HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let content_type = header(CONTENT_TYPE);
    let disposition = header(CONTENT_DISPOSITION);

    let unix_ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let path = output::output_path(
        cli.out.as_deref(),
        disposition.as_deref(),
        content_type.as_deref(),
        &cli.source_file,
        unix_ts,
    );

    let bytes = response
        .bytes()
        .await
        .context("Failed to read response body")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(std::path::absolute(&path).unwrap_or(path))
}

/// `--timeout` as a [`Duration`]; negative, NaN or huge values are errors.
fn request_timeout(secs: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(secs).with_context(|| format!("Invalid --timeout value {secs}"))
}

/// Read `path` into a multipart part with a content type guessed from its
/// extension.
async fn file_part(path: &Path) -> Result<Part, Failure> {
    if !path.is_file() {
        return Err(Failure::MissingFile(path.to_path_buf()));
    }
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let part = Part::bytes(data)
        .file_name(file_name)
        .mime_str(MediaKind::from_path(path).mime())
        .context("Invalid content type")?;
    Ok(part)
}
