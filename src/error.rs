//! Error types for voxlate

use thiserror::Error;

/// Result type alias for voxlate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in voxlate
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Language tag could not be parsed
    #[error("invalid language tag: {0:?}")]
    InvalidLanguage(String),

    /// Recognition or synthesis capability missing from this environment
    #[error("capability unsupported: {0}")]
    CapabilityUnsupported(String),

    /// Recognition engine failure mid-capture
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Remote translation failed (always recovered by the fallback tier)
    #[error("translation unavailable: {0}")]
    TranslationUnavailable(String),

    /// A playback operation is already outstanding
    #[error("playback already in progress")]
    PlaybackBusy,

    /// A recognition activation is already running
    #[error("recognition already active")]
    AlreadyActive,

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
