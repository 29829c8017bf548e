use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::adapters::{DeepgramTranscriber, OpenAiTranscriber, RemoteWhisperTranscriber};
use crate::domain::config::BackendsConfig;
use crate::domain::TranscriptionError;
use crate::ports::{BackendCapabilities, Transcriber};

pub const LOCAL_WHISPER: &str = "local_whisper";
pub const REMOTE_WHISPER: &str = "remote_whisper";
pub const OPENAI_WHISPER: &str = "openai_whisper";
pub const DEEPGRAM: &str = "deepgram";

/// A registered backend, cheap to clone.
///
/// Readiness is shared between clones so `initialize` succeeds at most once
/// per registered instance. A failed initialization is not remembered and is
/// retried on next use.
#[derive(Clone)]
pub struct BackendDescriptor {
    pub id: String,
    pub display_name: String,
    pub backend: Arc<dyn Transcriber>,
    readiness: Arc<OnceCell<()>>,
}

impl std::fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl BackendDescriptor {
    fn new(id: String, backend: Arc<dyn Transcriber>) -> Self {
        Self {
            display_name: backend.display_name().to_string(),
            id,
            backend,
            readiness: Arc::new(OnceCell::new()),
        }
    }

    /// Initialize the backend on first use.
    pub async fn ensure_ready(&self) -> Result<(), TranscriptionError> {
        self.readiness
            .get_or_try_init(|| async {
                if self.backend.initialize().await {
                    Ok(())
                } else {
                    Err(TranscriptionError::unavailable(format!(
                        "backend '{}' is not ready",
                        self.id
                    )))
                }
            })
            .await
            .map(|_| ())
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.initialized()
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        self.backend.capabilities()
    }
}

/// Introspection view of one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendSummary {
    pub id: String,
    pub display_name: String,
    pub requires_network: bool,
    pub ready: bool,
}

#[derive(Default)]
struct RegistryState {
    entries: Vec<BackendDescriptor>,
    active: Option<String>,
}

impl RegistryState {
    fn find(&self, id: &str) -> Option<&BackendDescriptor> {
        self.entries.iter().find(|e| e.id == id)
    }
}

/// Named transcription backends plus the currently selected one.
///
/// Entries and selection live behind one lock so a resolve never observes a
/// selection pointing at a half-registered entry.
#[derive(Default)]
pub struct BackendRegistry {
    state: RwLock<RegistryState>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every backend `config` has enough settings for, in the order
    /// local, remote, OpenAI, Deepgram, then select the configured default,
    /// falling back to the first one registered.
    pub fn from_config(config: &BackendsConfig) -> Self {
        let registry = Self::new();
        let timeout = config.request_timeout();

        if config.local_whisper.enabled {
            #[cfg(feature = "local-whisper")]
            {
                registry.register(
                    LOCAL_WHISPER,
                    Arc::new(crate::adapters::WhisperCppTranscriber::new(&config.local_whisper)),
                );
            }
            #[cfg(not(feature = "local-whisper"))]
            {
                warn!("local_whisper is enabled but this build lacks the local-whisper feature");
            }
        }
        if config.remote_whisper.url.is_some() {
            registry.register(
                REMOTE_WHISPER,
                Arc::new(RemoteWhisperTranscriber::new(
                    config.remote_whisper.url.clone(),
                    timeout,
                )),
            );
        }
        if config.openai.api_key.is_some() {
            registry.register(
                OPENAI_WHISPER,
                Arc::new(OpenAiTranscriber::new(&config.openai, timeout)),
            );
        }
        if config.deepgram.api_key.is_some() {
            registry.register(DEEPGRAM, Arc::new(DeepgramTranscriber::new(&config.deepgram, timeout)));
        }

        let preferred = config
            .default_backend
            .as_deref()
            .filter(|id| {
                let known = registry.contains(id);
                if !known {
                    warn!(backend = %id, "Configured default backend is not registered");
                }
                known
            })
            .map(str::to_string)
            .or_else(|| registry.state.read().entries.first().map(|e| e.id.clone()));

        if let Some(id) = preferred {
            // Registered above, cannot fail
            let _ = registry.select(&id);
        }

        info!(
            backends = registry.len(),
            active = ?registry.active_id(),
            "Backend registry built"
        );
        registry
    }

    /// Add `backend` under `id`, replacing any previous one with that id.
    pub fn register(&self, id: impl Into<String>, backend: Arc<dyn Transcriber>) {
        let descriptor = BackendDescriptor::new(id.into(), backend);
        let mut state = self.state.write();

        info!(backend = %descriptor.id, name = %descriptor.display_name, "Backend registered");
        match state.entries.iter_mut().find(|e| e.id == descriptor.id) {
            Some(existing) => *existing = descriptor,
            None => state.entries.push(descriptor),
        }
    }

    /// Make `id` the backend used when a request names none.
    pub fn select(&self, id: &str) -> Result<(), TranscriptionError> {
        let mut state = self.state.write();
        if state.find(id).is_none() {
            return Err(TranscriptionError::unavailable(format!(
                "backend '{}' is not registered",
                id
            )));
        }
        state.active = Some(id.to_string());
        info!(backend = %id, "Backend selected");
        Ok(())
    }

    /// The backend named `id`, or the active one when no id is given.
    ///
    /// A named backend that is not registered is an error rather than a
    /// silent switch to another provider.
    pub fn resolve(&self, id: Option<&str>) -> Result<BackendDescriptor, TranscriptionError> {
        let state = self.state.read();

        if let Some(id) = id {
            return state.find(id).cloned().ok_or_else(|| {
                warn!(backend = %id, "Requested backend not registered");
                TranscriptionError::unavailable(format!("backend '{}' is not registered", id))
            });
        }

        state
            .active
            .as_deref()
            .and_then(|active| state.find(active))
            .cloned()
            .ok_or_else(|| {
                if state.entries.is_empty() {
                    TranscriptionError::internal("no transcription backend registered")
                } else {
                    TranscriptionError::internal("no transcription backend selected")
                }
            })
    }

    /// Registered backends in registration order.
    pub fn list(&self) -> Vec<BackendSummary> {
        self.state
            .read()
            .entries
            .iter()
            .map(|e| BackendSummary {
                id: e.id.clone(),
                display_name: e.display_name.clone(),
                requires_network: e.capabilities().requires_network,
                ready: e.is_ready(),
            })
            .collect()
    }

    pub fn active_id(&self) -> Option<String> {
        self.state.read().active.clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.read().find(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }
}
