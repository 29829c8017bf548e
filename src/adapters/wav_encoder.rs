use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::domain::TranscriptionError;
use crate::ports::{AudioEncoder, EncodeProfile};

/// Mono PCM WAV writer.
///
/// `Canonical` is 16-bit, `Compressed` is 8-bit (half the bitrate).
#[derive(Debug, Default, Clone, Copy)]
pub struct WavEncoder;

impl WavEncoder {
    pub fn new() -> Self {
        Self
    }

    fn spec(sample_rate: u32, profile: EncodeProfile) -> WavSpec {
        WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: match profile {
                EncodeProfile::Canonical => 16,
                EncodeProfile::Compressed => 8,
            },
            sample_format: SampleFormat::Int,
        }
    }

    fn to_i16(sample: f32) -> i16 {
        (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
    }

    fn to_i8(sample: f32) -> i8 {
        (sample.clamp(-1.0, 1.0) * i8::MAX as f32) as i8
    }
}

fn wav_error(path: &Path, err: hound::Error) -> TranscriptionError {
    TranscriptionError::internal(format!("writing {}: {}", path.display(), err))
}

impl AudioEncoder for WavEncoder {
    fn encode(
        &self,
        samples: &[f32],
        sample_rate: u32,
        profile: EncodeProfile,
        path: &Path,
    ) -> Result<u64, TranscriptionError> {
        let mut writer =
            WavWriter::create(path, Self::spec(sample_rate, profile)).map_err(|e| wav_error(path, e))?;

        match profile {
            EncodeProfile::Canonical => {
                for &s in samples {
                    writer.write_sample(Self::to_i16(s)).map_err(|e| wav_error(path, e))?;
                }
            }
            EncodeProfile::Compressed => {
                for &s in samples {
                    writer.write_sample(Self::to_i8(s)).map_err(|e| wav_error(path, e))?;
                }
            }
        }
        writer.finalize().map_err(|e| wav_error(path, e))?;

        Ok(std::fs::metadata(path)?.len())
    }

    fn extension(&self) -> &'static str {
        "wav"
    }
}
