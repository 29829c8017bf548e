use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::multipart::Form;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::http_support::{build_client, classify_send_error, file_part, parse_json, read_success};
use crate::domain::{TranscriptionError, TranscriptionResult};
use crate::ports::{BackendCapabilities, Transcriber};

const BACKEND: &str = "remote_whisper";
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct RemoteResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

/// Self-hosted whisper service accepting `POST /transcribe`.
pub struct RemoteWhisperTranscriber {
    base_url: Option<String>,
    request_timeout: Duration,
    client: OnceCell<reqwest::Client>,
}

impl RemoteWhisperTranscriber {
    pub fn new(base_url: Option<String>, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.map(|u| u.trim().trim_end_matches('/').to_string()),
            request_timeout,
            client: OnceCell::new(),
        }
    }

    fn base_url(&self) -> Result<&str, TranscriptionError> {
        let url = self
            .base_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| TranscriptionError::unavailable("remote whisper URL not configured"))?;
        url::Url::parse(url).map_err(|e| {
            TranscriptionError::unavailable(format!("invalid remote whisper URL {}: {}", url, e))
        })?;
        Ok(url)
    }

    fn client(&self) -> Result<&reqwest::Client, TranscriptionError> {
        self.client
            .get_or_try_init(|| build_client(self.request_timeout))
            .map_err(|e| TranscriptionError::internal(format!("http client: {}", e)))
    }

    async fn probe_health(&self, client: &reqwest::Client, base_url: &str) {
        let url = format!("{}/health", base_url);
        match client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(url = %url, "Remote whisper service healthy");
            }
            Ok(response) => {
                warn!(url = %url, status = %response.status(), "Remote whisper health check failed");
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Remote whisper service unreachable");
            }
        }
    }
}

#[async_trait]
impl Transcriber for RemoteWhisperTranscriber {
    fn display_name(&self) -> &str {
        "Remote Whisper"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: self.display_name().to_string(),
            requires_network: true,
            max_upload_bytes: None,
        }
    }

    async fn initialize(&self) -> bool {
        let base_url = match self.base_url() {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Remote whisper backend not ready");
                return false;
            }
        };
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Remote whisper backend not ready");
                return false;
            }
        };

        // The service may come up after us, so an unhealthy probe is not fatal
        self.probe_health(client, base_url).await;
        info!(url = %base_url, "Remote whisper backend ready");
        true
    }

    async fn transcribe(
        &self,
        audio: &Path,
        language: Option<&str>,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        let url = format!("{}/transcribe", self.base_url()?);
        let client = self.client()?;

        let mut form = Form::new().part("file", file_part(audio).await?);
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        debug!(url = %url, file = %audio.display(), "Sending chunk to remote whisper");

        let response = client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| classify_send_error(BACKEND, e))?;
        let body = read_success(BACKEND, response).await?;
        let parsed: RemoteResponse = parse_json(BACKEND, &body)?;

        let mut result = TranscriptionResult::text(parsed.text.trim());
        result.detected_language = parsed.language;
        result.metadata = parsed.extra;
        Ok(result)
    }
}
