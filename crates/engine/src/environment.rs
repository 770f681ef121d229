//! Per-invocation engine environment.
//!
//! Instead of mutating the server's own process environment, each invocation
//! gets an [`EngineEnvironment`] value listing exactly which variables are
//! added on top of the inherited environment.

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::EngineError;
use crate::strategy::{EngineConfig, EngineLaunchStrategy};

/// Engine root directory variable.
pub const ENV_ENGINE_ROOT: &str = "FACEFUSION_ROOT";

/// Model cache directory variable.
pub const ENV_MODELS_DIR: &str = "FACEFUSION_MODELS_DIR";

/// Startup-resolved engine settings shared by all invocations.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub strategy: EngineLaunchStrategy,
    /// Absolute model cache directory.
    pub models_dir: PathBuf,
    pub timeout: Duration,
}

impl EngineSettings {
    /// Select the launch strategy and absolutize the models directory.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let strategy = EngineLaunchStrategy::select(config)?;
        tracing::info!(strategy = strategy.label(), "Engine launch strategy selected");
        Ok(Self {
            strategy,
            models_dir: std::path::absolute(&config.models_dir)?,
            timeout: config.timeout,
        })
    }

    /// Build the environment for one invocation.
    ///
    /// `inherited` is a snapshot of the variables the child will inherit;
    /// defaults are only added for names missing from it. `cwd` is the
    /// default engine root.
    pub fn environment<I, K, V>(&self, inherited: I, cwd: &Path) -> EngineEnvironment
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
    {
        let present: HashSet<OsString> = inherited.into_iter().map(|(k, _)| k.into()).collect();

        let defaults = [
            (ENV_ENGINE_ROOT, cwd.to_string_lossy().into_owned()),
            (ENV_MODELS_DIR, self.models_dir.to_string_lossy().into_owned()),
        ];
        let vars = defaults
            .into_iter()
            .filter(|(key, _)| !present.contains(OsStr::new(key)))
            .map(|(key, value)| (key.to_string(), value))
            .collect();

        EngineEnvironment {
            working_dir: self.strategy.working_dir().map(Path::to_path_buf),
            strategy: self.strategy.clone(),
            vars,
            timeout: self.timeout,
        }
    }

    /// [`environment`](Self::environment) against the live process.
    ///
    /// Variables are read as `OsString`, so non-Unicode entries are fine.
    pub fn environment_from_process(&self) -> Result<EngineEnvironment, EngineError> {
        let cwd = std::env::current_dir()?;
        Ok(self.environment(std::env::vars_os(), &cwd))
    }
}

/// Everything about how one invocation is launched, besides the job paths.
#[derive(Debug, Clone)]
pub struct EngineEnvironment {
    pub strategy: EngineLaunchStrategy,
    /// Working directory for this invocation only.
    pub working_dir: Option<PathBuf>,
    /// Variables added to the inherited environment.
    pub vars: Vec<(String, String)>,
    /// Wall-clock limit before the child is killed.
    pub timeout: Duration,
}
