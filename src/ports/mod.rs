pub mod codec;
pub mod config;
pub mod transcriber;

pub use codec::{AudioDecoder, AudioEncoder, DecodedAudio, EncodeProfile};
pub use config::ConfigStore;
pub use transcriber::{BackendCapabilities, Transcriber};
