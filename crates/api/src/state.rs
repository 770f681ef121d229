use std::sync::Arc;
use std::time::Duration;

use faceswap_core::layout::StorageLayout;
use faceswap_core::sandbox::AssetSandbox;
use faceswap_engine::{EngineError, EngineSettings, FaceFusionInvoker};
use faceswap_pipeline::{Admission, Orchestrator};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Build the orchestrator described by `config`.
    ///
    /// Fails when a configured engine checkout has no entry script.
    pub fn from_config(config: ServerConfig) -> Result<Self, EngineError> {
        let engine = EngineSettings::from_config(&config.engine)?;
        let layout = StorageLayout::new(
            &config.storage.input_dir,
            &config.storage.output_dir,
            config.storage.partition(),
        );
        let admission = Admission::new(
            config.max_concurrent_jobs,
            config.queue_timeout_secs.map(Duration::from_secs),
        );

        let orchestrator = Orchestrator::new(
            layout,
            AssetSandbox::new(&config.storage.assets_dir),
            config.limits,
            engine,
            admission,
            FaceFusionInvoker,
        );

        Ok(Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
        })
    }
}
