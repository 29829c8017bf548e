use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::signal::TrimParams;

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with rotation.
    pub file_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: false,
        }
    }
}

/// Audio normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Canonical sample rate in Hz.
    pub sample_rate: u32,
    /// Canonical channel count. Only mono is supported.
    pub channels: u16,
    /// Remove leading/trailing silence before transcription.
    pub trim_silence: bool,
    /// Windows quieter than this (dBFS) count as silence.
    pub silence_threshold_db: f32,
    /// Minimum length of a silent run worth trimming.
    pub min_silence_ms: u64,
    /// Trims leaving less audio than this are discarded.
    pub min_trimmed_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000, // 16kHz for Whisper-family models
            channels: 1,
            trim_silence: true,
            silence_threshold_db: -50.0,
            min_silence_ms: 500,
            min_trimmed_ms: 1_000,
        }
    }
}

impl AudioConfig {
    pub fn trim_params(&self) -> TrimParams {
        TrimParams {
            threshold_db: self.silence_threshold_db,
            min_silence_ms: self.min_silence_ms,
            min_remaining_ms: self.min_trimmed_ms,
        }
    }
}

/// Byte-budget splitting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Upper bound for every uploaded chunk.
    pub max_chunk_bytes: u64,
    /// Subtracted from the estimated chunk duration to absorb encoder overhead.
    pub safety_margin_ms: u64,
    /// Lower bound for the estimated chunk duration.
    pub min_chunk_ms: u64,
    /// Oversized chunks are halved only while longer than this.
    pub halving_floor_ms: u64,
    /// Hard cap on halvings per chunk.
    pub max_halvings: u32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_bytes: 25 * 1024 * 1024,
            safety_margin_ms: 1_000,
            min_chunk_ms: 1_000,
            halving_floor_ms: 5_000,
            max_halvings: 16,
        }
    }
}

/// Local whisper.cpp backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalWhisperConfig {
    pub enabled: bool,
    /// Path to a ggml/gguf whisper model.
    pub model_path: Option<PathBuf>,
    /// Number of inference threads (0 = auto).
    pub threads: u32,
}

/// Self-hosted whisper service speaking `POST /transcribe`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteWhisperConfig {
    pub url: Option<String>,
}

/// OpenAI audio transcription API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "whisper-1".to_string(),
        }
    }
}

/// Deepgram pre-recorded audio API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepgramConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: Option<String>,
}

impl Default for DeepgramConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.deepgram.com".to_string(),
            model: None,
        }
    }
}

/// Backend selection and per-backend credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    /// Backend selected at startup. Falls back to the first registered one.
    pub default_backend: Option<String>,
    /// Language hint used when a request carries none ("auto" = detect).
    pub default_language: String,
    /// Upper bound for a whole transcription request.
    pub request_timeout_secs: u64,
    pub local_whisper: LocalWhisperConfig,
    pub remote_whisper: RemoteWhisperConfig,
    pub openai: OpenAiConfig,
    pub deepgram: DeepgramConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            default_backend: None,
            default_language: "auto".to_string(),
            request_timeout_secs: 600,
            local_whisper: LocalWhisperConfig::default(),
            remote_whisper: RemoteWhisperConfig::default(),
            openai: OpenAiConfig::default(),
            deepgram: DeepgramConfig::default(),
        }
    }
}

impl BackendsConfig {
    /// Default language as a hint, `None` meaning auto-detect.
    pub fn language_hint(&self) -> Option<String> {
        normalize_language(Some(&self.default_language))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Treat empty and "auto" as no hint.
pub fn normalize_language(language: Option<&str>) -> Option<String> {
    language
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("auto"))
        .map(str::to_string)
}

/// Where intermediate artifacts are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub dir: Option<PathBuf>,
}

impl WorkspaceConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("voxrelay"))
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub audio: AudioConfig,
    pub chunking: ChunkingConfig,
    pub backends: BackendsConfig,
    pub workspace: WorkspaceConfig,
}

impl AppConfig {
    /// Create a new AppConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay credentials and selection from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.backends.openai.api_key = Some(key);
        }
        if let Some(key) = get("DEEPGRAM_API_KEY") {
            self.backends.deepgram.api_key = Some(key);
        }
        if let Some(url) = get("VOXRELAY_REMOTE_WHISPER_URL") {
            self.backends.remote_whisper.url = Some(url);
        }
        if let Some(id) = get("VOXRELAY_DEFAULT_BACKEND") {
            self.backends.default_backend = Some(id);
        }
        if let Some(language) = get("VOXRELAY_LANGUAGE") {
            self.backends.default_language = language;
        }
    }

    /// Reject settings the pipeline cannot honor.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.audio.sample_rate == 0 {
            return Err(DomainError::Config("audio.sample_rate must be positive".to_string()));
        }
        if self.audio.channels != 1 {
            return Err(DomainError::Config(format!(
                "audio.channels must be 1, got {}",
                self.audio.channels
            )));
        }
        if self.audio.silence_threshold_db > 0.0 {
            return Err(DomainError::Config(
                "audio.silence_threshold_db must be at or below 0 dBFS".to_string(),
            ));
        }
        if self.chunking.max_chunk_bytes == 0 {
            return Err(DomainError::Config(
                "chunking.max_chunk_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
