#![forbid(unsafe_code)]

//! Transcription orchestration: normalize an upload, split it under a byte
//! budget, run the chunks through a pluggable speech-to-text backend and
//! stitch the text back together.

pub mod adapters;
pub mod app;
pub mod domain;
pub mod infrastructure;
pub mod ports;

#[cfg(test)]
mod testutil;

pub use app::{AppController, TranscriptionPipeline, TranscriptionRequest};
pub use domain::{AppConfig, TranscriptionError, TranscriptionResponse, TranscriptionResult};
