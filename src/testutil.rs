//! Fixtures and fakes shared by unit tests.

use std::collections::VecDeque;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{TranscriptionError, TranscriptionResult};
use crate::ports::{
    AudioDecoder, AudioEncoder, BackendCapabilities, DecodedAudio, EncodeProfile, Transcriber,
};

/// 16-bit PCM WAV bytes for interleaved `samples`.
pub fn wav_bytes(samples: &[f32], sample_rate: u32, channels: u16) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer
                .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// 440 Hz at half scale.
pub fn tone(ms: u64, sample_rate: u32) -> Vec<f32> {
    let n = (sample_rate as u64 * ms / 1000) as usize;
    (0..n)
        .map(|i| {
            0.5 * (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / sample_rate as f32).sin()
        })
        .collect()
}

pub fn silence(ms: u64, sample_rate: u32) -> Vec<f32> {
    vec![0.0; (sample_rate as u64 * ms / 1000) as usize]
}

/// Decoder that ignores its input and always yields the same mono audio.
pub struct FixedDecoder {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl FixedDecoder {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }
}

impl AudioDecoder for FixedDecoder {
    fn decode(&self, _data: &[u8], _hint: Option<&str>) -> Result<DecodedAudio, TranscriptionError> {
        Ok(DecodedAudio {
            samples: self.samples.clone(),
            channels: 1,
            sample_rate: self.sample_rate,
        })
    }
}

/// Encoder with a perfectly uniform bitrate: `overhead + samples * bytes_per_sample`,
/// identical for every profile. Writes a marker file, reports the modeled size.
pub struct UniformEncoder {
    bytes_per_sample: u64,
    overhead: u64,
}

impl UniformEncoder {
    pub fn new(bytes_per_sample: u64, overhead: u64) -> Self {
        Self {
            bytes_per_sample,
            overhead,
        }
    }
}

impl AudioEncoder for UniformEncoder {
    fn encode(
        &self,
        samples: &[f32],
        _sample_rate: u32,
        _profile: EncodeProfile,
        path: &Path,
    ) -> Result<u64, TranscriptionError> {
        std::fs::write(path, b"uniform")?;
        Ok(self.overhead + samples.len() as u64 * self.bytes_per_sample)
    }

    fn extension(&self) -> &'static str {
        "wav"
    }
}

/// Backend that replays scripted results in order and records its calls.
pub struct ScriptedTranscriber {
    name: String,
    ready: bool,
    upload_limit: Option<u64>,
    script: Mutex<VecDeque<Result<TranscriptionResult, TranscriptionError>>>,
    init_calls: AtomicUsize,
    calls: Mutex<Vec<(PathBuf, Option<String>)>>,
}

impl ScriptedTranscriber {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ready: true,
            upload_limit: None,
            script: Mutex::new(VecDeque::new()),
            init_calls: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    pub fn upload_limit(mut self, bytes: u64) -> Self {
        self.upload_limit = Some(bytes);
        self
    }

    pub fn reply(self, result: Result<TranscriptionResult, TranscriptionError>) -> Self {
        self.script.lock().push_back(result);
        self
    }

    pub fn reply_text(self, text: &str) -> Self {
        self.reply(Ok(TranscriptionResult::text(text)))
    }

    pub fn init_count(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn transcribed(&self) -> Vec<PathBuf> {
        self.calls.lock().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn languages(&self) -> Vec<Option<String>> {
        self.calls.lock().iter().map(|(_, l)| l.clone()).collect()
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: self.name.clone(),
            requires_network: false,
            max_upload_bytes: self.upload_limit,
        }
    }

    async fn initialize(&self) -> bool {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.ready
    }

    async fn transcribe(
        &self,
        audio: &Path,
        language: Option<&str>,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        self.calls
            .lock()
            .push((audio.to_path_buf(), language.map(str::to_string)));
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TranscriptionError::internal("script exhausted")))
    }
}
