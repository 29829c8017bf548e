use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, info, warn};

use super::http_support::{build_client, classify_send_error, parse_json, read_success};
use crate::domain::config::DeepgramConfig;
use crate::domain::{AudioFormat, TranscriptionError, TranscriptionResult};
use crate::ports::{BackendCapabilities, Transcriber};

const BACKEND: &str = "deepgram";

/// Deepgram pre-recorded `listen` endpoint.
pub struct DeepgramTranscriber {
    api_key: Option<String>,
    base_url: String,
    model: Option<String>,
    request_timeout: Duration,
    client: OnceCell<reqwest::Client>,
}

impl DeepgramTranscriber {
    pub fn new(config: &DeepgramConfig, request_timeout: Duration) -> Self {
        Self {
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            model: config.model.clone().filter(|m| !m.trim().is_empty()),
            request_timeout,
            client: OnceCell::new(),
        }
    }

    fn client(&self) -> Result<&reqwest::Client, TranscriptionError> {
        self.client
            .get_or_try_init(|| build_client(self.request_timeout))
            .map_err(|e| TranscriptionError::internal(format!("http client: {}", e)))
    }

    fn query(&self, language: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = vec![("smart_format", "true".to_string())];
        if let Some(model) = &self.model {
            query.push(("model", model.clone()));
        }
        match language {
            Some(language) => query.push(("language", language.to_string())),
            None => query.push(("detect_language", "true".to_string())),
        }
        query
    }
}

/// Pull transcript and detected language out of a `listen` response.
fn parse_listen_response(value: &serde_json::Value) -> Result<TranscriptionResult, TranscriptionError> {
    let channel = value.pointer("/results/channels/0").ok_or_else(|| {
        TranscriptionError::protocol("deepgram: response has no channels", Some(200))
    })?;
    let transcript = channel
        .pointer("/alternatives/0/transcript")
        .and_then(|t| t.as_str())
        .ok_or_else(|| TranscriptionError::protocol("deepgram: response has no transcript", Some(200)))?;

    let mut result = TranscriptionResult::text(transcript.trim());
    if let Some(language) = channel.get("detected_language").and_then(|l| l.as_str()) {
        result = result.with_language(language);
    }
    if let Some(confidence) = channel
        .pointer("/alternatives/0/confidence")
        .and_then(|c| c.as_f64())
    {
        result = result.with_metadata("confidence", confidence);
    }
    if let Some(request_id) = value.pointer("/metadata/request_id").and_then(|r| r.as_str()) {
        result = result.with_metadata("request_id", request_id);
    }
    Ok(result)
}

#[async_trait]
impl Transcriber for DeepgramTranscriber {
    fn display_name(&self) -> &str {
        "Deepgram"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: self.display_name().to_string(),
            requires_network: true,
            max_upload_bytes: None,
        }
    }

    async fn initialize(&self) -> bool {
        if self.api_key.is_none() {
            warn!("Deepgram backend not ready: API key not configured");
            return false;
        }
        if let Err(e) = url::Url::parse(&self.base_url) {
            warn!(base_url = %self.base_url, error = %e, "Deepgram backend not ready: invalid base URL");
            return false;
        }
        if let Err(e) = self.client() {
            warn!(error = %e, "Deepgram backend not ready");
            return false;
        }
        info!(model = ?self.model, "Deepgram backend ready");
        true
    }

    async fn transcribe(
        &self,
        audio: &Path,
        language: Option<&str>,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| TranscriptionError::unavailable("Deepgram API key not configured"))?;
        let client = self.client()?;
        let url = format!("{}/v1/listen", self.base_url);

        let data = tokio::fs::read(audio).await?;
        let mime = AudioFormat::of_path(audio).mime_type();

        debug!(bytes = data.len(), mime = mime, "Sending chunk to Deepgram");

        let response = client
            .post(&url)
            .query(&self.query(language))
            .header(AUTHORIZATION, format!("Token {}", api_key))
            .header(CONTENT_TYPE, mime)
            .body(data)
            .send()
            .await
            .map_err(|e| classify_send_error(BACKEND, e))?;
        let body = read_success(BACKEND, response).await?;
        let value: serde_json::Value = parse_json(BACKEND, &body)?;

        parse_listen_response(&value)
    }
}
