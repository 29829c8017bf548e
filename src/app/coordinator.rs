use std::sync::Arc;

use tracing::{debug, info, warn};

use super::registry::{BackendDescriptor, BackendRegistry};
use crate::domain::{ChunkPlan, TranscriptionError, TranscriptionResult};

/// Runs a chunk plan through one backend, strictly in order.
pub struct TranscriptionCoordinator {
    registry: Arc<BackendRegistry>,
}

impl TranscriptionCoordinator {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve `backend_id` and transcribe every chunk of `plan` with it.
    pub async fn run(
        &self,
        plan: &ChunkPlan,
        backend_id: Option<&str>,
        language: Option<&str>,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        let backend = self
            .registry
            .resolve(backend_id)
            .map_err(|e| TranscriptionError::unavailable(e.detail()))?;
        self.run_with(&backend, plan, language).await
    }

    /// Transcribe every chunk of `plan` with an already resolved backend.
    ///
    /// The first failing chunk aborts the run; text from earlier chunks is
    /// dropped rather than returned as a partial transcript.
    pub async fn run_with(
        &self,
        backend: &BackendDescriptor,
        plan: &ChunkPlan,
        language: Option<&str>,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        backend.ensure_ready().await?;

        let mut texts = Vec::with_capacity(plan.len());
        let mut detected_language = None;
        let mut chunk_metadata = Vec::new();

        for chunk in plan.chunks() {
            debug!(
                backend = %backend.id,
                index = chunk.index,
                start_ms = chunk.start_ms,
                end_ms = chunk.end_ms,
                bytes = chunk.byte_size,
                "Transcribing chunk"
            );

            let result = backend
                .backend
                .transcribe(&chunk.path, language)
                .await
                .map_err(|e| {
                    warn!(
                        backend = %backend.id,
                        index = chunk.index,
                        of = plan.len(),
                        code = e.code(),
                        error = %e,
                        "Chunk transcription failed, aborting"
                    );
                    e
                })?;

            if detected_language.is_none() {
                detected_language = result.detected_language;
            }
            if !result.metadata.is_empty() {
                chunk_metadata.push(serde_json::json!({
                    "index": chunk.index,
                    "metadata": result.metadata,
                }));
            }
            texts.push(result.text);
        }

        let text = join_texts(&texts);
        info!(
            backend = %backend.id,
            chunks = plan.len(),
            chars = text.len(),
            language = ?detected_language,
            "Transcription assembled"
        );

        let mut result = TranscriptionResult::text(text)
            .with_metadata("backend", backend.id.clone())
            .with_metadata("chunk_count", plan.len());
        result.detected_language = detected_language;
        if !chunk_metadata.is_empty() {
            result = result.with_metadata("chunks", chunk_metadata);
        }
        Ok(result)
    }
}

/// Join chunk texts with single spaces, skipping blank ones.
fn join_texts(texts: &[String]) -> String {
    texts
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
