use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use super::pipeline::{TranscriptionPipeline, TranscriptionRequest};
use super::registry::{BackendRegistry, BackendSummary};
use crate::adapters::TomlConfigStore;
use crate::domain::{AppConfig, DomainError, TranscriptionError, TranscriptionResponse};
use crate::infrastructure::init_logging;
use crate::ports::ConfigStore;

/// Snapshot for a health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub active_backend: Option<String>,
    pub backends: Vec<BackendSummary>,
}

/// Composition root: owns configuration, logging, the backend registry and
/// the pipeline. One instance serves every request concurrently.
pub struct AppController {
    config: AppConfig,
    config_store: Arc<dyn ConfigStore>,
    registry: Arc<BackendRegistry>,
    pipeline: TranscriptionPipeline,
    _log_guard: Option<WorkerGuard>,
}

impl AppController {
    /// Start from the per-user config file.
    pub fn new() -> Result<Self, DomainError> {
        Self::with_store(Arc::new(TomlConfigStore::new()?))
    }

    pub fn with_store(config_store: Arc<dyn ConfigStore>) -> Result<Self, DomainError> {
        // Step 1: stored config + environment, validated
        let config = config_store.load_effective()?;

        // Step 2: logging
        let log_guard = init_logging(
            &config_store.logs_dir(),
            &config.logging.level,
            config.logging.file_logging,
        )?;

        info!(config = ?config_store.config_path(), "voxrelay starting up");

        // Step 3: backends and pipeline
        let registry = Arc::new(BackendRegistry::from_config(&config.backends));
        let pipeline = TranscriptionPipeline::new(&config, Arc::clone(&registry));

        info!(
            backends = registry.len(),
            active = ?registry.active_id(),
            workspace = ?config.workspace.resolved_dir(),
            "AppController initialized"
        );

        Ok(Self {
            config,
            config_store,
            registry,
            pipeline,
            _log_guard: log_guard,
        })
    }

    pub async fn transcribe(
        &self,
        request: TranscriptionRequest,
    ) -> Result<TranscriptionResponse, TranscriptionError> {
        self.pipeline.run(request).await
    }

    pub fn list_backends(&self) -> Vec<BackendSummary> {
        self.registry.list()
    }

    pub fn select_backend(&self, id: &str) -> Result<(), TranscriptionError> {
        self.registry.select(id)
    }

    pub fn active_backend(&self) -> Option<String> {
        self.registry.active_id()
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Configuration in effect (file plus environment overrides).
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_store(&self) -> &dyn ConfigStore {
        self.config_store.as_ref()
    }

    pub fn health(&self) -> HealthReport {
        let backends = self.registry.list();
        let active_backend = self.registry.active_id();
        HealthReport {
            status: if active_backend.is_some() { "ok" } else { "degraded" },
            active_backend,
            backends,
        }
    }
}
