use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::coordinator::TranscriptionCoordinator;
use super::janitor::{ArtifactJanitor, ArtifactKind};
use super::preparer::AudioPreparer;
use super::registry::BackendRegistry;
use super::splitter::SizeBudgetSplitter;
use crate::adapters::{SymphoniaDecoder, WavEncoder};
use crate::domain::config::normalize_language;
use crate::domain::{AppConfig, ChunkPlan, TranscriptionError, TranscriptionResponse};
use crate::ports::{AudioDecoder, AudioEncoder};

/// Where the uploaded audio comes from.
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Upload held in memory, with the extension of its original file name.
    Bytes {
        data: Vec<u8>,
        extension: Option<String>,
    },
    /// Upload already written to disk by the transport. Deleted after the run.
    StagedFile(PathBuf),
}

/// One transcription request as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub source: AudioSource,
    pub language: Option<String>,
    pub backend_id: Option<String>,
    /// Declared MIME type of the upload, if the transport knows it.
    pub content_type: Option<String>,
}

impl TranscriptionRequest {
    pub fn from_bytes(data: Vec<u8>, extension: Option<&str>) -> Self {
        Self::new(AudioSource::Bytes {
            data,
            extension: extension.map(str::to_string),
        })
    }

    pub fn from_staged_file(path: impl Into<PathBuf>) -> Self {
        Self::new(AudioSource::StagedFile(path.into()))
    }

    fn new(source: AudioSource) -> Self {
        Self {
            source,
            language: None,
            backend_id: None,
            content_type: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_backend(mut self, backend_id: impl Into<String>) -> Self {
        self.backend_id = Some(backend_id.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Only audio and video uploads are accepted. A missing type is not checked.
fn check_content_type(content_type: Option<&str>) -> Result<(), TranscriptionError> {
    let Some(content_type) = content_type else {
        return Ok(());
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if essence.starts_with("audio/") || essence.starts_with("video/") {
        Ok(())
    } else {
        Err(TranscriptionError::unsupported_media(format!(
            "content type '{}' is not audio or video",
            content_type
        )))
    }
}

/// request → prepare → split → transcribe → cleanup.
pub struct TranscriptionPipeline {
    preparer: Arc<AudioPreparer>,
    splitter: Arc<SizeBudgetSplitter>,
    registry: Arc<BackendRegistry>,
    coordinator: TranscriptionCoordinator,
    max_chunk_bytes: u64,
    default_language: Option<String>,
    request_timeout: Duration,
}

impl TranscriptionPipeline {
    pub fn new(config: &AppConfig, registry: Arc<BackendRegistry>) -> Self {
        Self::with_codecs(
            config,
            registry,
            Arc::new(SymphoniaDecoder::new()),
            Arc::new(WavEncoder::new()),
        )
    }

    pub fn with_codecs(
        config: &AppConfig,
        registry: Arc<BackendRegistry>,
        decoder: Arc<dyn AudioDecoder>,
        encoder: Arc<dyn AudioEncoder>,
    ) -> Self {
        let workspace = config.workspace.resolved_dir();
        let preparer = AudioPreparer::new(
            Arc::clone(&decoder),
            Arc::clone(&encoder),
            config.audio.clone(),
            workspace.clone(),
        );
        let splitter = SizeBudgetSplitter::new(
            decoder,
            encoder,
            config.chunking.clone(),
            config.audio.sample_rate,
            workspace,
        );

        Self {
            preparer: Arc::new(preparer),
            splitter: Arc::new(splitter),
            coordinator: TranscriptionCoordinator::new(Arc::clone(&registry)),
            registry,
            max_chunk_bytes: config.chunking.max_chunk_bytes,
            default_language: config.backends.language_hint(),
            request_timeout: config.backends.request_timeout(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Run one request to completion.
    ///
    /// Every intermediate file, and a staged upload, is gone by the time this
    /// returns, whatever the outcome. If the returned future is dropped early
    /// the same cleanup runs once in-flight codec work finishes.
    pub async fn run(
        &self,
        request: TranscriptionRequest,
    ) -> Result<TranscriptionResponse, TranscriptionError> {
        let janitor = Arc::new(ArtifactJanitor::new());

        let outcome = tokio::time::timeout(self.request_timeout, self.execute(request, &janitor)).await;
        // In-flight codec work may still write after this; the janitor's
        // drop sweeps those paths once the blocking task lets go of it.
        let report = janitor.release_all();
        if report.failed > 0 {
            warn!(failed = report.failed, "Some artifacts could not be removed");
        }

        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_secs = self.request_timeout.as_secs_f64(), "Request timed out");
                Err(TranscriptionError::timeout(format!(
                    "request exceeded {:.1}s",
                    self.request_timeout.as_secs_f64()
                )))
            }
        }
    }

    async fn execute(
        &self,
        request: TranscriptionRequest,
        janitor: &Arc<ArtifactJanitor>,
    ) -> Result<TranscriptionResponse, TranscriptionError> {
        if let AudioSource::StagedFile(path) = &request.source {
            janitor.track(path, ArtifactKind::Upload);
        }
        check_content_type(request.content_type.as_deref())?;

        let backend = self
            .registry
            .resolve(request.backend_id.as_deref())
            .map_err(|e| TranscriptionError::unavailable(e.detail()))?;
        let max_bytes = match backend.capabilities().max_upload_bytes {
            Some(limit) => limit.min(self.max_chunk_bytes),
            None => self.max_chunk_bytes,
        };
        let language = normalize_language(request.language.as_deref())
            .or_else(|| self.default_language.clone());

        info!(
            backend = %backend.id,
            max_bytes = max_bytes,
            language = ?language,
            "Transcription request accepted"
        );

        let plan = self.plan(request.source, max_bytes, janitor).await?;
        let result = self
            .coordinator
            .run_with(&backend, &plan, language.as_deref())
            .await?;

        Ok(TranscriptionResponse {
            text: result.text,
            language: result.detected_language.or(language),
            backend: backend.id,
            chunk_count: plan.len(),
        })
    }

    /// Prepare and split on the blocking pool; both are CPU and file bound.
    async fn plan(
        &self,
        source: AudioSource,
        max_bytes: u64,
        janitor: &Arc<ArtifactJanitor>,
    ) -> Result<ChunkPlan, TranscriptionError> {
        let preparer = Arc::clone(&self.preparer);
        let splitter = Arc::clone(&self.splitter);
        let janitor = Arc::clone(janitor);

        tokio::task::spawn_blocking(move || {
            let asset = match source {
                AudioSource::Bytes { data, extension } => {
                    preparer.prepare(&data, extension.as_deref(), &janitor)?
                }
                AudioSource::StagedFile(path) => preparer.prepare_file(&path, &janitor)?,
            };
            splitter.split(&asset, max_bytes, &janitor)
        })
        .await
        .map_err(|e| TranscriptionError::internal(format!("audio task failed: {}", e)))?
    }
}
