use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::multipart::Form;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::http_support::{build_client, classify_send_error, file_part, parse_json, read_success};
use crate::domain::config::OpenAiConfig;
use crate::domain::{TranscriptionError, TranscriptionResult};
use crate::ports::{BackendCapabilities, Transcriber};

const BACKEND: &str = "openai_whisper";

/// Hard upload limit of the audio transcription endpoint.
pub const OPENAI_MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

/// OpenAI `audio/transcriptions` endpoint.
pub struct OpenAiTranscriber {
    api_key: Option<String>,
    base_url: String,
    model: String,
    request_timeout: Duration,
    client: OnceCell<reqwest::Client>,
}

impl OpenAiTranscriber {
    pub fn new(config: &OpenAiConfig, request_timeout: Duration) -> Self {
        Self {
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            request_timeout,
            client: OnceCell::new(),
        }
    }

    fn api_key(&self) -> Result<&str, TranscriptionError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| TranscriptionError::unavailable("OpenAI API key not configured"))
    }

    fn client(&self) -> Result<&reqwest::Client, TranscriptionError> {
        self.client
            .get_or_try_init(|| build_client(self.request_timeout))
            .map_err(|e| TranscriptionError::internal(format!("http client: {}", e)))
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    fn display_name(&self) -> &str {
        "OpenAI Whisper"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: self.display_name().to_string(),
            requires_network: true,
            max_upload_bytes: Some(OPENAI_MAX_UPLOAD_BYTES),
        }
    }

    async fn initialize(&self) -> bool {
        if self.api_key.is_none() {
            warn!("OpenAI backend not ready: API key not configured");
            return false;
        }
        if let Err(e) = url::Url::parse(&self.base_url) {
            warn!(base_url = %self.base_url, error = %e, "OpenAI backend not ready: invalid base URL");
            return false;
        }
        if let Err(e) = self.client() {
            warn!(error = %e, "OpenAI backend not ready");
            return false;
        }
        info!(model = %self.model, "OpenAI backend ready");
        true
    }

    async fn transcribe(
        &self,
        audio: &Path,
        language: Option<&str>,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        let api_key = self.api_key()?;
        let client = self.client()?;
        let url = format!("{}/audio/transcriptions", self.base_url);

        let mut form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .part("file", file_part(audio).await?);
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        debug!(model = %self.model, file = %audio.display(), "Sending chunk to OpenAI");

        let response = client
            .post(&url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| classify_send_error(BACKEND, e))?;
        let body = read_success(BACKEND, response).await?;
        let parsed: VerboseTranscription = parse_json(BACKEND, &body)?;

        let mut result =
            TranscriptionResult::text(parsed.text.trim()).with_metadata("model", self.model.clone());
        result.detected_language = parsed.language;
        if let Some(duration) = parsed.duration {
            result = result.with_metadata("duration_secs", duration);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(base_url: String, api_key: Option<&str>) -> OpenAiTranscriber {
        let config = OpenAiConfig {
            api_key: api_key.map(str::to_string),
            base_url,
            ..OpenAiConfig::default()
        };
        OpenAiTranscriber::new(&config, Duration::from_secs(5))
    }

    fn chunk_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("chunk_001.wav");
        // Backends forward the bytes untouched
        std::fs::write(&path, b"RIFF fake chunk payload").unwrap();
        path
    }

    #[tokio::test]
    async fn test_not_ready_without_key() {
        let backend = backend("https://api.openai.com/v1".to_string(), None);
        assert!(!backend.initialize().await);

        let dir = tempfile::tempdir().unwrap();
        let err = backend.transcribe(&chunk_file(&dir), None).await.unwrap_err();
        assert_eq!(err.code(), "backend_unavailable");
    }

    #[tokio::test]
    async fn test_transcribe_sends_model_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_string_contains("verbose_json"))
            .and(body_string_contains("whisper-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "text": "Bonjour tout le monde.",
                "language": "french",
                "duration": 2.0,
                "segments": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend(format!("{}/v1", server.uri()), Some("sk-test"));
        assert!(backend.initialize().await);

        let dir = tempfile::tempdir().unwrap();
        let result = backend.transcribe(&chunk_file(&dir), Some("fr")).await.unwrap();
        assert_eq!(result.text, "Bonjour tout le monde.");
        assert_eq!(result.detected_language.as_deref(), Some("french"));
        assert_eq!(result.metadata["model"], "whisper-1");
    }

    #[tokio::test]
    async fn test_invalid_key_is_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let backend = backend(format!("{}/v1", server.uri()), Some("sk-bad"));
        let dir = tempfile::tempdir().unwrap();
        let err = backend.transcribe(&chunk_file(&dir), None).await.unwrap_err();

        assert_eq!(err.code(), "backend_auth_failure");
        assert_eq!(err.upstream_status(), Some(401));
        assert!(err.detail().contains("Incorrect API key"));
    }

    #[tokio::test]
    async fn test_rate_limit_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let backend = backend(format!("{}/v1", server.uri()), Some("sk-test"));
        let dir = tempfile::tempdir().unwrap();
        let err = backend.transcribe(&chunk_file(&dir), None).await.unwrap_err();
        assert_eq!(err.code(), "backend_unavailable");
        assert_eq!(err.upstream_status(), Some(429));
    }

    #[test]
    fn test_capabilities_report_upload_limit() {
        let backend = backend("https://api.openai.com/v1".to_string(), Some("k"));
        assert_eq!(
            backend.capabilities().max_upload_bytes,
            Some(OPENAI_MAX_UPLOAD_BYTES)
        );
    }
}
