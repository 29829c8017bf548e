pub mod audio;
pub mod config;
pub mod error;
pub mod signal;
pub mod transcription;

pub use audio::{AudioAsset, AudioChunk, AudioFormat, ChunkPlan, SourceInfo};
pub use config::AppConfig;
pub use error::{DomainError, ErrorBody, TranscriptionError};
pub use transcription::{AudioBuffer, TranscriptionResponse, TranscriptionResult};
