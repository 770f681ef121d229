//! How the engine gets launched.
//!
//! Chosen once at startup from configuration, never from request input.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use faceswap_core::types::JobSpec;

use crate::error::EngineError;

/// Entry script expected at the root of a source checkout.
pub const ENTRY_SCRIPT: &str = "facefusion.py";

/// Engine subcommand for non-interactive runs.
pub const SUBCOMMAND: &str = "headless-run";

/// Executable name used in installed-binary mode by default.
pub const DEFAULT_PROGRAM: &str = "facefusion";

/// Interpreter used for a checkout when none is configured.
pub const DEFAULT_INTERPRETER: &str = "python";

/// Environment-manager launcher for `conda_env`.
pub const CONDA_LAUNCHER: &str = "conda";

/// Default wall-clock limit for one invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Engine-related configuration, as loaded from the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Executable for installed-binary mode.
    pub program: String,
    /// Root of a source checkout; selects source-checkout mode when set.
    pub home: Option<PathBuf>,
    /// Conda environment to run the checkout in.
    pub conda_env: Option<String>,
    /// Interpreter for the checkout when no conda environment is set.
    pub interpreter: String,
    /// Default for `FACEFUSION_MODELS_DIR`.
    pub models_dir: PathBuf,
    /// Wall-clock limit for one invocation.
    pub timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            home: None,
            conda_env: None,
            interpreter: DEFAULT_INTERPRETER.to_string(),
            models_dir: PathBuf::from("data/models"),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// The closed set of ways to start the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLaunchStrategy {
    /// A fixed executable resolved through `PATH`.
    Installed { program: String },
    /// `facefusion.py` inside a checkout, run by an interpreter or through
    /// `conda run`, with the checkout as working directory.
    SourceCheckout {
        home: PathBuf,
        interpreter: String,
        conda_env: Option<String>,
    },
}

impl EngineLaunchStrategy {
    /// Pick the strategy for `config`.
    ///
    /// A configured `home` without an entry script is an error rather than a
    /// silent fallback to the installed binary.
    pub fn select(config: &EngineConfig) -> Result<Self, EngineError> {
        let Some(home) = &config.home else {
            return Ok(Self::Installed {
                program: config.program.clone(),
            });
        };

        let strategy = Self::SourceCheckout {
            home: home.clone(),
            interpreter: config.interpreter.clone(),
            conda_env: config.conda_env.clone(),
        };
        strategy.verify()?;
        Ok(strategy)
    }

    /// Check that a checkout still has its entry script.
    ///
    /// Always succeeds for installed-binary mode; a missing executable shows
    /// up at spawn time as [`EngineError::Unavailable`].
    pub fn verify(&self) -> Result<(), EngineError> {
        match self {
            Self::Installed { .. } => Ok(()),
            Self::SourceCheckout { home, .. } => {
                if home.join(ENTRY_SCRIPT).is_file() {
                    Ok(())
                } else {
                    tracing::warn!(home = %home.display(), "Engine checkout has no entry script");
                    Err(EngineError::NotInstalled { home: home.clone() })
                }
            }
        }
    }

    /// Working directory for the child, if the strategy pins one.
    pub fn working_dir(&self) -> Option<&Path> {
        match self {
            Self::Installed { .. } => None,
            Self::SourceCheckout { home, .. } => Some(home),
        }
    }

    /// Short label for logs and health output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Installed { .. } => "installed",
            Self::SourceCheckout {
                conda_env: Some(_), ..
            } => "source-checkout-conda",
            Self::SourceCheckout { .. } => "source-checkout",
        }
    }

    /// Full argument vector for `job`, program first.
    ///
    /// The engine takes the template as target (`-t`), the source as the
    /// face to transfer (`-s`) and the output path (`-o`).
    pub fn argv(&self, job: &JobSpec) -> Vec<OsString> {
        let mut argv: Vec<OsString> = match self {
            Self::Installed { program } => vec![program.into()],
            Self::SourceCheckout {
                conda_env: Some(env),
                ..
            } => vec![
                CONDA_LAUNCHER.into(),
                "run".into(),
                "-n".into(),
                env.into(),
                "python".into(),
                ENTRY_SCRIPT.into(),
            ],
            Self::SourceCheckout { interpreter, .. } => {
                vec![interpreter.into(), ENTRY_SCRIPT.into()]
            }
        };

        argv.push(SUBCOMMAND.into());
        argv.push("-t".into());
        argv.push(job.template_path.clone().into_os_string());
        argv.push("-s".into());
        argv.push(job.source_path.clone().into_os_string());
        argv.push("-o".into());
        argv.push(job.output_path.clone().into_os_string());
        argv
    }
}
