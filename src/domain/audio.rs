use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Container tag of an audio artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
    M4a,
    Ogg,
    Webm,
    Unknown,
}

impl AudioFormat {
    /// Map a file extension (with or without the leading dot) to a format tag.
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "wav" | "wave" => AudioFormat::Wav,
            "mp3" | "mpeg" | "mpga" => AudioFormat::Mp3,
            "flac" => AudioFormat::Flac,
            "m4a" | "mp4" | "aac" => AudioFormat::M4a,
            "ogg" | "oga" | "opus" => AudioFormat::Ogg,
            "webm" => AudioFormat::Webm,
            _ => AudioFormat::Unknown,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
            AudioFormat::M4a => "m4a",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Webm => "webm",
            AudioFormat::Unknown => "bin",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Webm => "audio/webm",
            AudioFormat::Unknown => "application/octet-stream",
        }
    }

    /// Format of the file at `path`, judged by its extension.
    pub fn of_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(AudioFormat::Unknown)
    }
}

/// Properties of the upload before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub duration_ms: u64,
}

/// A prepared audio file owned by one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioAsset {
    pub path: PathBuf,
    pub byte_size: u64,
    pub duration_ms: u64,
    pub channels: u16,
    pub sample_rate: u32,
    pub format: AudioFormat,
    /// What the upload looked like before normalization.
    pub source: SourceInfo,
    /// Whether leading/trailing silence was removed.
    pub trimmed: bool,
}

/// A contiguous slice of the prepared timeline, encoded to its own file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioChunk {
    pub index: usize,
    pub path: PathBuf,
    pub byte_size: u64,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl AudioChunk {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// Ordered chunks covering a source timeline.
///
/// Invariants (checked by [`ChunkPlan::validate`]):
/// - at least one chunk, indices `0..n` in order
/// - every chunk is at most the byte ceiling
/// - chunk `i` ends where chunk `i + 1` starts, first starts at 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkPlan {
    chunks: Vec<AudioChunk>,
    max_bytes: u64,
}

impl ChunkPlan {
    pub fn new(chunks: Vec<AudioChunk>, max_bytes: u64) -> Self {
        Self { chunks, max_bytes }
    }

    /// Plan of one chunk that is the asset itself.
    pub fn single(asset: &AudioAsset, max_bytes: u64) -> Self {
        Self::new(
            vec![AudioChunk {
                index: 0,
                path: asset.path.clone(),
                byte_size: asset.byte_size,
                start_ms: 0,
                end_ms: asset.duration_ms,
            }],
            max_bytes,
        )
    }

    pub fn chunks(&self) -> &[AudioChunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Sum of chunk durations.
    pub fn total_duration_ms(&self) -> u64 {
        self.chunks.iter().map(AudioChunk::duration_ms).sum()
    }

    /// Check the plan invariants, returning the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunks.is_empty() {
            return Err("plan has no chunks".to_string());
        }

        let mut expected_start = 0;
        for (position, chunk) in self.chunks.iter().enumerate() {
            if chunk.index != position {
                return Err(format!(
                    "chunk at position {} has index {}",
                    position, chunk.index
                ));
            }
            if chunk.byte_size > self.max_bytes {
                return Err(format!(
                    "chunk {} is {} bytes, ceiling is {}",
                    chunk.index, chunk.byte_size, self.max_bytes
                ));
            }
            if chunk.start_ms != expected_start {
                return Err(format!(
                    "chunk {} starts at {}ms, expected {}ms",
                    chunk.index, chunk.start_ms, expected_start
                ));
            }
            if chunk.end_ms < chunk.start_ms {
                return Err(format!("chunk {} ends before it starts", chunk.index));
            }
            expected_start = chunk.end_ms;
        }

        Ok(())
    }
}
