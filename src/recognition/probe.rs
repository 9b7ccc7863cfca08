//! Capability probe
//!
//! Decides once at startup whether this environment can recognize speech.
//! The session refuses to record until a probe result is cached.

use std::fmt;
use std::sync::Arc;

use super::capture::input_available;
use super::microphone::MicrophoneRecognizer;
use super::segmenter::SegmenterSettings;
use super::stt::Transcriber;
use super::Recognizer;
use crate::config::Config;

/// Cached outcome of probing for a recognition capability
#[derive(Clone, Default)]
pub enum RecognitionCapability {
    /// No probe has run yet
    #[default]
    Unprobed,
    /// Probed and missing
    Absent {
        /// Why recognition is unavailable
        reason: String,
    },
    /// Probed and usable
    Present(Arc<dyn Recognizer>),
}

impl RecognitionCapability {
    /// The recognizer, if present
    #[must_use]
    pub fn recognizer(&self) -> Option<&Arc<dyn Recognizer>> {
        match self {
            Self::Present(r) => Some(r),
            _ => None,
        }
    }

    /// Human-readable reason recording is unavailable
    #[must_use]
    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Self::Unprobed => Some("speech recognition has not been probed"),
            Self::Absent { reason } => Some(reason),
            Self::Present(_) => None,
        }
    }
}

impl fmt::Debug for RecognitionCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unprobed => f.write_str("Unprobed"),
            Self::Absent { reason } => f.debug_struct("Absent").field("reason", reason).finish(),
            Self::Present(_) => f.write_str("Present"),
        }
    }
}

/// Probe for microphone-backed recognition
///
/// Present when voice is enabled, an `OpenAI` key is configured and an input
/// device exists.
#[must_use]
pub fn probe(config: &Config) -> RecognitionCapability {
    let absent = |reason: &str| {
        tracing::info!(reason, "speech recognition unavailable");
        RecognitionCapability::Absent {
            reason: reason.to_string(),
        }
    };

    if !config.voice.enabled {
        return absent("voice disabled");
    }
    let Some(api_key) = config.api_keys.openai.clone() else {
        return absent("no OpenAI API key configured");
    };
    if !input_available() {
        return absent("no input device available");
    }

    match Transcriber::new(
        config.voice.stt_url.clone(),
        api_key,
        config.voice.stt_model.clone(),
    ) {
        Ok(transcriber) => {
            let settings =
                SegmenterSettings::from_durations(config.voice.silence, config.voice.max_utterance);
            tracing::info!(model = %config.voice.stt_model, "speech recognition available");
            RecognitionCapability::Present(Arc::new(MicrophoneRecognizer::new(
                transcriber,
                settings,
            )))
        }
        Err(e) => absent(&e.to_string()),
    }
}
