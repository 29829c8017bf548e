use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Mono PCM samples in `[-1.0, 1.0]`, zeroed on drop.
#[derive(Debug, Zeroize)]
#[zeroize(drop)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Samples in `[start_ms, end_ms)`, clamped to the buffer.
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> &[f32] {
        let rate = self.sample_rate as u64;
        let start = ((start_ms * rate / 1000) as usize).min(self.samples.len());
        let end = if end_ms >= self.duration_ms() {
            self.samples.len()
        } else {
            ((end_ms * rate / 1000) as usize).min(self.samples.len())
        };
        &self.samples[start..end.max(start)]
    }
}

/// Output of one backend call, and after reassembly, of one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub detected_language: Option<String>,
    /// Backend-specific extras (model, durations, confidence...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl TranscriptionResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.detected_language = Some(language.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Success payload handed to the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub backend: String,
    pub chunk_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_buffer_duration() {
        let buffer = AudioBuffer::new(vec![0.0; 16000], 16000);
        assert_eq!(buffer.duration_ms(), 1000);
        assert_eq!(buffer.len(), 16000);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_slice_ms_clamps_and_covers_tail() {
        // 1.0005s: the last 8 samples sit past the final whole millisecond
        let buffer = AudioBuffer::new(vec![0.5; 16008], 16000);
        assert_eq!(buffer.duration_ms(), 1000);
        assert_eq!(buffer.slice_ms(0, 500).len(), 8000);
        assert_eq!(buffer.slice_ms(500, 1000).len(), 8008);
        assert_eq!(buffer.slice_ms(2000, 3000).len(), 0);
    }

    #[test]
    fn test_result_builders() {
        let result = TranscriptionResult::text("hello")
            .with_language("en")
            .with_metadata("model", "whisper-1");
        assert_eq!(result.text, "hello");
        assert_eq!(result.detected_language.as_deref(), Some("en"));
        assert_eq!(result.metadata["model"], "whisper-1");
    }

    #[test]
    fn test_response_serialization() {
        let response = TranscriptionResponse {
            text: "hi".to_string(),
            language: None,
            backend: "deepgram".to_string(),
            chunk_count: 1,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["text"], "hi");
        assert!(json.get("language").is_none());
    }
}
