use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::domain::TranscriptionError;
use crate::ports::{AudioDecoder, DecodedAudio};

/// Decoder for every container/codec symphonia is built with.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }

    fn unsupported(what: &str, err: impl std::fmt::Display) -> TranscriptionError {
        TranscriptionError::unsupported_media(format!("{}: {}", what, err))
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(
        &self,
        data: &[u8],
        extension_hint: Option<&str>,
    ) -> Result<DecodedAudio, TranscriptionError> {
        let cursor = Cursor::new(data.to_vec());
        let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

        // Without a usable extension symphonia sniffs the container itself
        let mut hint = Hint::new();
        if let Some(ext) = extension_hint.map(|e| e.trim_start_matches('.')) {
            if !ext.is_empty() {
                hint.with_extension(ext);
            }
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Self::unsupported("unrecognized container", e))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| TranscriptionError::unsupported_media("no audio track found"))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| TranscriptionError::unsupported_media("unknown sample rate"))?;
        let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Self::unsupported("unsupported codec", e))?;

        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(Self::unsupported("packet read failed", e)),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!(error = %e, "Skipping corrupt audio frame");
                    continue;
                }
                Err(e) => return Err(Self::unsupported("decode failed", e)),
            };

            let spec = *decoded.spec();
            if decoded.frames() == 0 {
                continue;
            }
            if channels == 0 {
                channels = spec.channels.count();
            }

            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buf.samples());
        }

        if samples.is_empty() {
            return Err(TranscriptionError::unsupported_media(
                "no audio samples decoded",
            ));
        }

        let channels = channels.max(1) as u16;
        debug!(
            channels = channels,
            sample_rate = sample_rate,
            samples = samples.len(),
            "Audio decoded"
        );

        Ok(DecodedAudio {
            samples,
            channels,
            sample_rate,
        })
    }
}
