//! Shared plumbing for the HTTP backends: client construction, chunk upload
//! parts and mapping of transport/status failures onto [`TranscriptionError`].

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::Part;
use reqwest::StatusCode;

use crate::domain::{AudioFormat, TranscriptionError};

const DETAIL_LIMIT: usize = 200;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_client(request_timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .build()
}

/// Read a chunk from disk as an upload part named after the file.
pub(crate) async fn file_part(path: &Path) -> Result<Part, TranscriptionError> {
    let data = tokio::fs::read(path).await?;
    let format = AudioFormat::of_path(path);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("audio.{}", format.extension()));

    Part::bytes(data)
        .file_name(file_name)
        .mime_str(format.mime_type())
        .map_err(|e| TranscriptionError::internal(format!("mime: {}", e)))
}

/// Classify a failure to get any response at all.
pub(crate) fn classify_send_error(backend: &str, err: reqwest::Error) -> TranscriptionError {
    if err.is_timeout() {
        TranscriptionError::timeout(format!("{}: {}", backend, err))
    } else if err.is_connect() || err.is_request() {
        TranscriptionError::unavailable(format!("{}: {}", backend, err))
    } else if err.is_decode() || err.is_body() {
        TranscriptionError::protocol(format!("{}: {}", backend, err), None)
    } else {
        TranscriptionError::internal(format!("{}: {}", backend, err))
    }
}

/// Classify a non-success status together with its body.
pub(crate) fn classify_status(backend: &str, status: StatusCode, body: &str) -> TranscriptionError {
    let detail = format!("{}: {}", backend, error_detail(body));
    let code = status.as_u16();

    let err = match code {
        401 | 403 => TranscriptionError::BackendAuthFailure {
            detail,
            status: None,
        },
        413 => TranscriptionError::chunk_too_large(detail),
        415 => TranscriptionError::unsupported_media(detail),
        408 | 504 => TranscriptionError::timeout(detail),
        429 | 502 | 503 => TranscriptionError::unavailable(detail),
        _ => TranscriptionError::protocol(detail, None),
    };
    err.with_status(code)
}

/// Turn a response into its body text, or the classified failure.
pub(crate) async fn read_success(
    backend: &str,
    response: reqwest::Response,
) -> Result<String, TranscriptionError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| classify_send_error(backend, e))?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(classify_status(backend, status, &body))
    }
}

/// Parse a success body, reporting garbage as a protocol error.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    backend: &str,
    body: &str,
) -> Result<T, TranscriptionError> {
    serde_json::from_str(body).map_err(|e| {
        TranscriptionError::protocol(format!("{}: malformed response: {}", backend, e), Some(200))
    })
}

/// Pull the human-readable message out of common error envelopes.
pub(crate) fn error_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let message = value
            .pointer("/error/message")
            .and_then(|m| m.as_str())
            .or_else(|| value.get("error").and_then(|e| e.as_str()))
            .map(str::to_string)
            .or_else(|| {
                value.get("detail").map(|d| match d.as_str() {
                    Some(s) => s.to_string(),
                    None => d.to_string(),
                })
            });
        if let Some(message) = message {
            return message;
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(DETAIL_LIMIT).collect()
}
