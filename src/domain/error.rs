use serde::Serialize;
use thiserror::Error;

/// Errors of the ambient layer (configuration, logging, local I/O).
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {})", code),
        None => String::new(),
    }
}

/// The single vocabulary every pipeline and backend failure is normalized into.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionError {
    #[error("Backend unavailable{}: {detail}", status_suffix(.status))]
    BackendUnavailable { detail: String, status: Option<u16> },

    #[error("Backend rejected credentials{}: {detail}", status_suffix(.status))]
    BackendAuthFailure { detail: String, status: Option<u16> },

    #[error("Unsupported media{}: {detail}", status_suffix(.status))]
    UnsupportedMedia { detail: String, status: Option<u16> },

    #[error("Timed out{}: {detail}", status_suffix(.status))]
    Timeout { detail: String, status: Option<u16> },

    #[error("Upstream protocol error{}: {detail}", status_suffix(.status))]
    UpstreamProtocolError { detail: String, status: Option<u16> },

    #[error("Chunk too large{}: {detail}", status_suffix(.status))]
    ChunkTooLarge { detail: String, status: Option<u16> },

    #[error("Internal failure: {detail}")]
    InternalFailure { detail: String },
}

impl TranscriptionError {
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            detail: detail.into(),
            status: None,
        }
    }

    pub fn unsupported_media(detail: impl Into<String>) -> Self {
        Self::UnsupportedMedia {
            detail: detail.into(),
            status: None,
        }
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::Timeout {
            detail: detail.into(),
            status: None,
        }
    }

    pub fn protocol(detail: impl Into<String>, status: Option<u16>) -> Self {
        Self::UpstreamProtocolError {
            detail: detail.into(),
            status,
        }
    }

    pub fn chunk_too_large(detail: impl Into<String>) -> Self {
        Self::ChunkTooLarge {
            detail: detail.into(),
            status: None,
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::InternalFailure {
            detail: detail.into(),
        }
    }

    /// Attach the upstream status code. Internal failures never carry one.
    pub fn with_status(mut self, code: u16) -> Self {
        match &mut self {
            Self::BackendUnavailable { status, .. }
            | Self::BackendAuthFailure { status, .. }
            | Self::UnsupportedMedia { status, .. }
            | Self::Timeout { status, .. }
            | Self::UpstreamProtocolError { status, .. }
            | Self::ChunkTooLarge { status, .. } => *status = Some(code),
            Self::InternalFailure { .. } => {}
        }
        self
    }

    /// Stable machine-readable category.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BackendUnavailable { .. } => "backend_unavailable",
            Self::BackendAuthFailure { .. } => "backend_auth_failure",
            Self::UnsupportedMedia { .. } => "unsupported_media",
            Self::Timeout { .. } => "timeout",
            Self::UpstreamProtocolError { .. } => "upstream_protocol_error",
            Self::ChunkTooLarge { .. } => "chunk_too_large",
            Self::InternalFailure { .. } => "internal_failure",
        }
    }

    /// Human-readable detail without the category prefix.
    pub fn detail(&self) -> &str {
        match self {
            Self::BackendUnavailable { detail, .. }
            | Self::BackendAuthFailure { detail, .. }
            | Self::UnsupportedMedia { detail, .. }
            | Self::Timeout { detail, .. }
            | Self::UpstreamProtocolError { detail, .. }
            | Self::ChunkTooLarge { detail, .. }
            | Self::InternalFailure { detail } => detail,
        }
    }

    /// Status code reported by the upstream service, when there was one.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::BackendUnavailable { status, .. }
            | Self::BackendAuthFailure { status, .. }
            | Self::UnsupportedMedia { status, .. }
            | Self::Timeout { status, .. }
            | Self::UpstreamProtocolError { status, .. }
            | Self::ChunkTooLarge { status, .. } => *status,
            Self::InternalFailure { .. } => None,
        }
    }

    /// Transport status for the surrounding service.
    ///
    /// Client mistakes map to 4xx, backend trouble maps to the gateway range.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::UnsupportedMedia { .. } => 415,
            Self::ChunkTooLarge { .. } => 413,
            Self::BackendUnavailable { .. } => 503,
            Self::Timeout { .. } => 504,
            Self::BackendAuthFailure { .. } | Self::UpstreamProtocolError { .. } => 502,
            Self::InternalFailure { .. } => 500,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            detail: self.detail().to_string(),
            status: self.http_status(),
            upstream_status: self.upstream_status(),
        }
    }
}

impl From<DomainError> for TranscriptionError {
    fn from(err: DomainError) -> Self {
        TranscriptionError::internal(err.to_string())
    }
}

impl From<std::io::Error> for TranscriptionError {
    fn from(err: std::io::Error) -> Self {
        TranscriptionError::internal(format!("IO error: {}", err))
    }
}

/// Serializable failure payload handed to the transport layer.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: &'static str,
    pub detail: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_upstream_status() {
        let err = TranscriptionError::protocol("bad json", Some(500));
        assert_eq!(
            err.to_string(),
            "Upstream protocol error (status 500): bad json"
        );

        let err = TranscriptionError::unavailable("connection refused");
        assert_eq!(err.to_string(), "Backend unavailable: connection refused");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(TranscriptionError::unsupported_media("x").http_status(), 415);
        assert_eq!(TranscriptionError::chunk_too_large("x").http_status(), 413);
        assert_eq!(TranscriptionError::unavailable("x").http_status(), 503);
        assert_eq!(TranscriptionError::timeout("x").http_status(), 504);
        assert_eq!(TranscriptionError::protocol("x", None).http_status(), 502);
        assert_eq!(TranscriptionError::internal("x").http_status(), 500);
    }

    #[test]
    fn test_error_body() {
        let err = TranscriptionError::BackendAuthFailure {
            detail: "invalid key".to_string(),
            status: Some(401),
        };
        let body = err.to_body();
        assert_eq!(body.code, "backend_auth_failure");
        assert_eq!(body.detail, "invalid key");
        assert_eq!(body.status, 502);
        assert_eq!(body.upstream_status, Some(401));

        let json = serde_json::to_value(TranscriptionError::timeout("slow").to_body()).unwrap();
        assert_eq!(json["code"], "timeout");
        assert!(json.get("upstream_status").is_none());
    }

    #[test]
    fn test_with_status_keeps_category() {
        let err = TranscriptionError::chunk_too_large("payload too big").with_status(413);
        assert_eq!(err.code(), "chunk_too_large");
        assert_eq!(err.upstream_status(), Some(413));
        assert_eq!(err.to_string(), "Chunk too large (status 413): payload too big");

        let err = TranscriptionError::internal("boom").with_status(500);
        assert_eq!(err.upstream_status(), None);
    }

    #[test]
    fn test_domain_error_becomes_internal_failure() {
        let err: TranscriptionError = DomainError::Config("bad".to_string()).into();
        assert_eq!(err.code(), "internal_failure");
        assert!(err.detail().contains("bad"));
    }
}
