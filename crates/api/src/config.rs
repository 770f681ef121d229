use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use faceswap_core::layout::PartitionScheme;
use faceswap_core::upload::UploadLimits;
use faceswap_engine::EngineConfig;

/// Where uploads, outputs, assets and models live.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Root of the named-template sandbox.
    pub assets_dir: PathBuf,
    pub models_dir: PathBuf,
    /// Partition per owner and `MM_YYYY` month (default), or per owner only.
    pub monthly_buckets: bool,
}

impl StorageConfig {
    pub fn partition(&self) -> PartitionScheme {
        if self.monthly_buckets {
            PartitionScheme::OwnerMonthly
        } else {
            PartitionScheme::Owner
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `900`). Must exceed the
    /// engine timeout or slow jobs are cut off at the HTTP layer first.
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub storage: StorageConfig,
    pub limits: UploadLimits,
    pub engine: EngineConfig,
    /// Engine runs allowed at once (default: `1`).
    pub max_concurrent_jobs: usize,
    /// How long a job waits for an engine slot before `503`. `None` waits
    /// indefinitely.
    pub queue_timeout_secs: Option<u64>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default       |
    /// |-----------------------------|---------------|
    /// | `HOST`                      | `0.0.0.0`     |
    /// | `PORT`                      | `8000`        |
    /// | `REQUEST_TIMEOUT_SECS`      | `900`         |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`          |
    /// | `INPUT_DIR`                 | `data/input`  |
    /// | `OUTPUT_DIR`                | `data/output` |
    /// | `ASSETS_DIR`                | `data/assets` |
    /// | `MODELS_DIR`                | `data/models` |
    /// | `STORAGE_MONTHLY_BUCKETS`   | `true`        |
    /// | `MAX_SOURCE_FILE_SIZE_MB`   | `10`          |
    /// | `MAX_TEMPLATE_SIZE_MB`      | `50`          |
    /// | `FACEFUSION_BIN`            | `facefusion`  |
    /// | `FACEFUSION_HOME`           | unset         |
    /// | `FACEFUSION_CONDA_ENV`      | unset         |
    /// | `FACEFUSION_PYTHON`         | `python`      |
    /// | `ENGINE_TIMEOUT_SECS`       | `600`         |
    /// | `ENGINE_MAX_CONCURRENCY`    | `1`           |
    /// | `ENGINE_QUEUE_TIMEOUT_SECS` | unset         |
    ///
    /// Panics on values that do not parse.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_var("PORT", "8000");
        let request_timeout_secs: u64 = parse_var("REQUEST_TIMEOUT_SECS", "900");
        let shutdown_timeout_secs: u64 = parse_var("SHUTDOWN_TIMEOUT_SECS", "30");

        let storage = StorageConfig {
            input_dir: path_var("INPUT_DIR", "data/input"),
            output_dir: path_var("OUTPUT_DIR", "data/output"),
            assets_dir: path_var("ASSETS_DIR", "data/assets"),
            models_dir: path_var("MODELS_DIR", "data/models"),
            monthly_buckets: parse_var("STORAGE_MONTHLY_BUCKETS", "true"),
        };

        let limits = UploadLimits::from_megabytes(
            parse_var("MAX_SOURCE_FILE_SIZE_MB", "10"),
            parse_var("MAX_TEMPLATE_SIZE_MB", "50"),
        );

        let engine = EngineConfig {
            program: std::env::var("FACEFUSION_BIN").unwrap_or_else(|_| "facefusion".into()),
            home: optional_var("FACEFUSION_HOME").map(PathBuf::from),
            conda_env: optional_var("FACEFUSION_CONDA_ENV"),
            interpreter: std::env::var("FACEFUSION_PYTHON").unwrap_or_else(|_| "python".into()),
            models_dir: storage.models_dir.clone(),
            timeout: Duration::from_secs(parse_var("ENGINE_TIMEOUT_SECS", "600")),
        };

        let max_concurrent_jobs: usize = parse_var("ENGINE_MAX_CONCURRENCY", "1");
        let queue_timeout_secs = optional_var("ENGINE_QUEUE_TIMEOUT_SECS").map(|raw| {
            raw.parse()
                .expect("ENGINE_QUEUE_TIMEOUT_SECS must be a valid u64")
        });

        Self {
            host,
            port,
            request_timeout_secs,
            shutdown_timeout_secs,
            storage,
            limits,
            engine,
            max_concurrent_jobs,
            queue_timeout_secs,
        }
    }

    /// Request body ceiling: both file limits plus room for multipart framing
    /// and text fields.
    pub fn body_limit_bytes(&self) -> usize {
        let total = self.limits.combined().saturating_add(MULTIPART_OVERHEAD_BYTES);
        usize::try_from(total).unwrap_or(usize::MAX)
    }
}

/// Slack on top of the file limits for boundaries, part headers and text fields.
pub const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

fn parse_var<T>(name: &str, default: &str) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .unwrap_or_else(|e| panic!("{name} must be a valid value, got '{raw}': {e}"))
}

fn path_var(name: &str, default: &str) -> PathBuf {
    PathBuf::from(std::env::var(name).unwrap_or_else(|_| default.to_string()))
}

/// Unset and blank are treated the same.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
