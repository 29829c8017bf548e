use std::path::Path;

use crate::domain::TranscriptionError;

/// Raw decoder output.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_ms(&self) -> u64 {
        crate::domain::signal::duration_ms(self.frames(), self.sample_rate)
    }
}

/// Turns container bytes into PCM.
///
/// Every failure is reported as [`TranscriptionError::UnsupportedMedia`].
pub trait AudioDecoder: Send + Sync {
    /// Decode `data`, using `extension_hint` to pick the container when given.
    fn decode(&self, data: &[u8], extension_hint: Option<&str>)
        -> Result<DecodedAudio, TranscriptionError>;

    fn decode_file(&self, path: &Path) -> Result<DecodedAudio, TranscriptionError> {
        let data = std::fs::read(path)?;
        let ext = path.extension().and_then(|e| e.to_str());
        self.decode(&data, ext)
    }
}

/// Output quality of an encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeProfile {
    /// Lossless canonical form handed to backends.
    Canonical,
    /// Fixed low-bitrate mono profile used before splitting oversized assets.
    Compressed,
}

/// Writes mono PCM to a file.
pub trait AudioEncoder: Send + Sync {
    /// Encode mono `samples` to `path`, returning the bytes written.
    fn encode(
        &self,
        samples: &[f32],
        sample_rate: u32,
        profile: EncodeProfile,
        path: &Path,
    ) -> Result<u64, TranscriptionError>;

    /// Extension of the files this encoder produces.
    fn extension(&self) -> &'static str;
}
