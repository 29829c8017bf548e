pub mod config_store;
pub mod deepgram;
pub(crate) mod http_support;
pub mod openai_whisper;
pub mod remote_whisper;
pub mod resampler;
pub mod symphonia_decoder;
pub mod wav_encoder;
#[cfg(feature = "local-whisper")]
pub mod whisper_cpp;

pub use config_store::TomlConfigStore;
pub use deepgram::DeepgramTranscriber;
pub use openai_whisper::OpenAiTranscriber;
pub use remote_whisper::RemoteWhisperTranscriber;
pub use symphonia_decoder::SymphoniaDecoder;
pub use wav_encoder::WavEncoder;
#[cfg(feature = "local-whisper")]
pub use whisper_cpp::WhisperCppTranscriber;
