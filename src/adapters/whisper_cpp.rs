use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::resampler::resample;
use super::SymphoniaDecoder;
use crate::domain::config::LocalWhisperConfig;
use crate::domain::signal::downmix;
use crate::domain::{AudioBuffer, TranscriptionError, TranscriptionResult};
use crate::ports::{AudioDecoder, BackendCapabilities, Transcriber};

/// whisper.cpp only accepts 16kHz mono.
const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Transcriber running a local whisper.cpp model via whisper-rs.
///
/// The model is loaded on first `initialize` and owned by this instance.
/// Loads are serialized by `load_lock`; inference by `inference_lock`, since
/// one context is shared by every request.
pub struct WhisperCppTranscriber {
    model_path: Option<PathBuf>,
    threads: u32,
    context: RwLock<Option<Arc<WhisperContext>>>,
    load_lock: tokio::sync::Mutex<()>,
    inference_lock: Arc<Mutex<()>>,
}

impl WhisperCppTranscriber {
    /// `threads == 0` means cores - 1.
    pub fn new(config: &LocalWhisperConfig) -> Self {
        let threads = if config.threads == 0 {
            std::thread::available_parallelism()
                .map(|p| std::cmp::max(1, p.get() as u32 - 1))
                .unwrap_or(1)
        } else {
            config.threads
        };

        Self {
            model_path: config.model_path.clone(),
            threads,
            context: RwLock::new(None),
            load_lock: tokio::sync::Mutex::new(()),
            inference_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn is_model_loaded(&self) -> bool {
        self.context.read().is_some()
    }

    async fn load_model(&self, path: &Path) -> Result<(), TranscriptionError> {
        if !path.exists() {
            return Err(TranscriptionError::unavailable(format!(
                "model not found: {}",
                path.display()
            )));
        }

        info!(path = ?path, "Loading whisper model");
        let path_str = path.to_string_lossy().to_string();

        let ctx = tokio::task::spawn_blocking(move || {
            WhisperContext::new_with_params(&path_str, WhisperContextParameters::default())
                .map_err(|e| TranscriptionError::unavailable(format!("failed to load model: {}", e)))
        })
        .await
        .map_err(|e| TranscriptionError::internal(format!("task join error: {}", e)))??;

        *self.context.write() = Some(Arc::new(ctx));
        info!(path = ?path, "Whisper model loaded");
        Ok(())
    }

    /// Decode a chunk file into whisper's input format.
    fn load_pcm(audio: &Path) -> Result<AudioBuffer, TranscriptionError> {
        let decoded = SymphoniaDecoder::new().decode_file(audio)?;
        let mono = downmix(&decoded.samples, decoded.channels as usize);
        let samples = resample(&mono, decoded.sample_rate, WHISPER_SAMPLE_RATE)?;
        Ok(AudioBuffer::new(samples, WHISPER_SAMPLE_RATE))
    }

    fn run_inference(
        ctx: &WhisperContext,
        buffer: &AudioBuffer,
        threads: u32,
        language: Option<&str>,
    ) -> Result<(String, Option<String>), TranscriptionError> {
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(threads as i32);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_language(Some(language.unwrap_or("auto")));

        let mut state = ctx
            .create_state()
            .map_err(|e| TranscriptionError::internal(format!("whisper state: {}", e)))?;
        state
            .full(params, buffer.samples())
            .map_err(|e| TranscriptionError::internal(format!("whisper inference: {}", e)))?;

        let segments = state
            .full_n_segments()
            .map_err(|e| TranscriptionError::internal(format!("whisper segments: {}", e)))?;
        let mut text = String::new();
        for i in 0..segments {
            if let Ok(segment) = state.full_get_segment_text(i) {
                text.push_str(&segment);
            }
        }

        let detected_language = state
            .full_lang_id_from_state()
            .ok()
            .and_then(|id| whisper_rs::get_lang_str(id).map(str::to_string));

        Ok((text.trim().to_string(), detected_language))
    }
}

#[async_trait]
impl Transcriber for WhisperCppTranscriber {
    fn display_name(&self) -> &str {
        "Local Whisper (whisper.cpp)"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: self.display_name().to_string(),
            requires_network: false,
            max_upload_bytes: None,
        }
    }

    async fn initialize(&self) -> bool {
        if self.is_model_loaded() {
            return true;
        }

        let _guard = self.load_lock.lock().await;
        // Another caller may have finished the load while we waited
        if self.is_model_loaded() {
            return true;
        }

        let Some(path) = self.model_path.clone() else {
            warn!("Local whisper backend not ready: no model path configured");
            return false;
        };

        match self.load_model(&path).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Local whisper backend not ready");
                false
            }
        }
    }

    async fn transcribe(
        &self,
        audio: &Path,
        language: Option<&str>,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        let ctx = self
            .context
            .read()
            .clone()
            .ok_or_else(|| TranscriptionError::unavailable("whisper model not loaded"))?;

        let audio = audio.to_path_buf();
        let language = language.map(str::to_string);
        let threads = self.threads;
        let inference_lock = Arc::clone(&self.inference_lock);
        let start = std::time::Instant::now();

        let (text, detected_language) = tokio::task::spawn_blocking(move || {
            let buffer = Self::load_pcm(&audio)?;
            debug!(
                samples = buffer.len(),
                duration_ms = buffer.duration_ms(),
                threads = threads,
                "Starting local inference"
            );
            if buffer.is_empty() {
                return Ok((String::new(), None));
            }
            let _guard = inference_lock.lock();
            Self::run_inference(&ctx, &buffer, threads, language.as_deref())
        })
        .await
        .map_err(|e| TranscriptionError::internal(format!("task join error: {}", e)))??;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            text_len = text.len(),
            elapsed_ms = elapsed_ms,
            detected_language = ?detected_language,
            "Local transcription complete"
        );

        let mut result = TranscriptionResult::text(text).with_metadata("inference_ms", elapsed_ms);
        result.detected_language = detected_language;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_resolution() {
        let config = LocalWhisperConfig {
            enabled: true,
            model_path: None,
            threads: 3,
        };
        assert_eq!(WhisperCppTranscriber::new(&config).threads, 3);

        let auto = LocalWhisperConfig::default();
        assert!(WhisperCppTranscriber::new(&auto).threads >= 1);
    }

    #[tokio::test]
    async fn test_not_ready_without_model() {
        let backend = WhisperCppTranscriber::new(&LocalWhisperConfig::default());
        assert!(!backend.initialize().await);

        let config = LocalWhisperConfig {
            enabled: true,
            model_path: Some(PathBuf::from("/nonexistent/ggml-base.bin")),
            threads: 1,
        };
        let backend = WhisperCppTranscriber::new(&config);
        assert!(!backend.initialize().await);
        assert!(!backend.is_model_loaded());
    }

    #[tokio::test]
    async fn test_transcribe_before_load_is_unavailable() {
        let backend = WhisperCppTranscriber::new(&LocalWhisperConfig::default());
        let err = backend
            .transcribe(Path::new("chunk.wav"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "backend_unavailable");
    }

    #[test]
    fn test_capabilities() {
        let caps = WhisperCppTranscriber::new(&LocalWhisperConfig::default()).capabilities();
        assert!(!caps.requires_network);
        assert!(caps.max_upload_bytes.is_none());
    }
}
