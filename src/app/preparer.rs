use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::janitor::{ArtifactJanitor, ArtifactKind};
use crate::adapters::resampler::resample;
use crate::domain::config::AudioConfig;
use crate::domain::signal::{self, downmix, plan_trim, TrimWindow};
use crate::domain::{AudioAsset, AudioBuffer, AudioFormat, SourceInfo, TranscriptionError};
use crate::ports::{AudioDecoder, AudioEncoder, EncodeProfile};

/// Anything shorter cannot carry a container header (a bare WAV header is 44 bytes).
pub const MIN_HEADER_BYTES: usize = 44;

/// Turns an upload into canonical mono audio at a fixed rate, silence-trimmed.
///
/// The upload is never modified; the result is a new file in the workspace,
/// tracked by the caller's janitor before anything is written to it.
pub struct AudioPreparer {
    decoder: Arc<dyn AudioDecoder>,
    encoder: Arc<dyn AudioEncoder>,
    config: AudioConfig,
    workspace: PathBuf,
}

impl AudioPreparer {
    pub fn new(
        decoder: Arc<dyn AudioDecoder>,
        encoder: Arc<dyn AudioEncoder>,
        config: AudioConfig,
        workspace: PathBuf,
    ) -> Self {
        Self {
            decoder,
            encoder,
            config,
            workspace,
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Prepare an upload held on disk. The container is taken from the extension.
    pub fn prepare_file(
        &self,
        path: &Path,
        janitor: &ArtifactJanitor,
    ) -> Result<AudioAsset, TranscriptionError> {
        let data = fs::read(path).map_err(|e| {
            TranscriptionError::unsupported_media(format!("cannot read {}: {}", path.display(), e))
        })?;
        let extension = path.extension().and_then(|e| e.to_str());
        self.prepare(&data, extension, janitor)
    }

    /// Decode `data`, normalize it and write the canonical asset.
    pub fn prepare(
        &self,
        data: &[u8],
        extension: Option<&str>,
        janitor: &ArtifactJanitor,
    ) -> Result<AudioAsset, TranscriptionError> {
        if data.is_empty() {
            return Err(TranscriptionError::unsupported_media("empty upload"));
        }
        if data.len() < MIN_HEADER_BYTES {
            return Err(TranscriptionError::unsupported_media(format!(
                "upload is {} bytes, too short to hold an audio header",
                data.len()
            )));
        }

        let decoded = self.decoder.decode(data, extension)?;
        let source = SourceInfo {
            channels: decoded.channels,
            sample_rate: decoded.sample_rate,
            duration_ms: decoded.duration_ms(),
        };

        let rate = self.config.sample_rate;
        let mono = downmix(&decoded.samples, decoded.channels as usize);
        let buffer = AudioBuffer::new(resample(&mono, decoded.sample_rate, rate)?, rate);
        drop(mono);

        let window = self.trim_window(&buffer);
        let samples = if window.trimmed {
            buffer.slice_ms(window.start_ms, window.end_ms)
        } else {
            buffer.samples()
        };
        if samples.is_empty() {
            return Err(TranscriptionError::unsupported_media("upload contains no audio"));
        }

        fs::create_dir_all(&self.workspace)?;
        let path = self.workspace.join(format!(
            "prepared_{}.{}",
            Uuid::new_v4(),
            self.encoder.extension()
        ));
        janitor.track(&path, ArtifactKind::Prepared);
        let byte_size = self
            .encoder
            .encode(samples, rate, EncodeProfile::Canonical, &path)?;

        let asset = AudioAsset {
            path,
            byte_size,
            duration_ms: signal::duration_ms(samples.len(), rate),
            channels: 1,
            sample_rate: rate,
            format: AudioFormat::from_extension(self.encoder.extension()),
            source,
            trimmed: window.trimmed,
        };

        info!(
            source_channels = source.channels,
            source_rate = source.sample_rate,
            source_ms = source.duration_ms,
            duration_ms = asset.duration_ms,
            bytes = asset.byte_size,
            trimmed = asset.trimmed,
            "Audio prepared"
        );
        Ok(asset)
    }

    fn trim_window(&self, buffer: &AudioBuffer) -> TrimWindow {
        let whole = TrimWindow {
            start_ms: 0,
            end_ms: buffer.duration_ms(),
            trimmed: false,
        };
        if !self.config.trim_silence {
            return whole;
        }

        let window = plan_trim(buffer.samples(), buffer.sample_rate(), &self.config.trim_params());
        debug!(
            start_ms = window.start_ms,
            end_ms = window.end_ms,
            trimmed = window.trimmed,
            "Silence scan"
        );
        window
    }
}
