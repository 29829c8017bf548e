use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{TranscriptionError, TranscriptionResult};

/// Capabilities of a transcription backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendCapabilities {
    /// Backend name for display.
    pub name: String,
    /// Whether the backend requires network access.
    pub requires_network: bool,
    /// Largest upload the backend accepts, if it has a limit of its own.
    pub max_upload_bytes: Option<u64>,
}

/// Port for transcription operations.
///
/// Implementations wrap one provider (local whisper.cpp, a self-hosted
/// whisper service, a vendor API). Every provider failure must come back as a
/// [`TranscriptionError`]; nothing provider-specific crosses this boundary.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Human-readable backend name.
    fn display_name(&self) -> &str;

    /// Get the capabilities of this transcription backend.
    fn capabilities(&self) -> BackendCapabilities;

    /// Prepare the backend for use and report whether it is ready.
    ///
    /// Idempotent. Never fails: problems are logged and reported as `false`.
    async fn initialize(&self) -> bool;

    /// Transcribe one audio file.
    ///
    /// May block on the network or on local inference.
    async fn transcribe(
        &self,
        audio: &Path,
        language: Option<&str>,
    ) -> Result<TranscriptionResult, TranscriptionError>;
}
