//! Configuration management for voxlate
//!
//! Values resolve as env > TOML file > default.

pub mod file;

use std::time::Duration;

use secrecy::SecretString;

use crate::language::LanguageTag;
use crate::{Error, Result};

use file::VoxlateConfigFile;

/// Default remote translation endpoint
pub const DEFAULT_TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";

/// Default transcription endpoint
pub const DEFAULT_STT_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Default synthesis endpoint
pub const DEFAULT_TTS_URL: &str = "https://api.openai.com/v1/audio/speech";

/// voxlate configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Default language pair
    pub languages: LanguageConfig,

    /// Remote translation configuration
    pub translate: TranslateConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Language pair a session starts with
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// Spoken language
    pub source: LanguageTag,

    /// Language to translate into
    pub target: LanguageTag,
}

/// Remote translation configuration
#[derive(Debug, Clone)]
pub struct TranslateConfig {
    /// Endpoint URL
    pub url: String,

    /// Request timeout
    pub timeout: Duration,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable microphone capture and speaker playback
    pub enabled: bool,

    /// Whisper-compatible transcription endpoint
    pub stt_url: String,

    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// OpenAI-compatible speech endpoint
    pub tts_url: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// Preferred voice name
    pub tts_voice: String,

    /// Speaking rate (0.25 to 4.0)
    pub tts_rate: f32,

    /// Speaking pitch
    pub tts_pitch: f32,

    /// How long playback "takes" when no synthesizer is available
    pub simulated_playback: Duration,

    /// Trailing silence that completes an utterance
    pub silence: Duration,

    /// Hard cap on utterance length
    pub max_utterance: Duration,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper and TTS)
    pub openai: Option<SecretString>,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            source: LanguageTag::from_static("en-US"),
            target: LanguageTag::from_static("es-ES"),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_TRANSLATE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stt_url: DEFAULT_STT_URL.to_string(),
            stt_model: "whisper-1".to_string(),
            tts_url: DEFAULT_TTS_URL.to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "nova".to_string(),
            tts_rate: 0.8,
            tts_pitch: 1.0,
            simulated_playback: Duration::from_millis(2000),
            silence: Duration::from_millis(800),
            max_utterance: Duration::from_secs(15),
        }
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a configured language tag is invalid
    pub fn load() -> Result<Self> {
        Self::load_with_options(false)
    }

    /// Load configuration with explicit voice disable option
    ///
    /// # Errors
    ///
    /// Returns error if a configured language tag is invalid
    pub fn load_with_options(disable_voice: bool) -> Result<Self> {
        let fc = file::load_config_file();
        let mut config = Self::resolve(fc, |key| std::env::var(key).ok())?;

        if disable_voice {
            tracing::info!("voice explicitly disabled via --disable-voice");
            config.voice.enabled = false;
        }

        Ok(config)
    }

    /// Merge a parsed config file with an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a configured language tag is invalid
    pub fn resolve(fc: VoxlateConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let source = env("VOXLATE_SOURCE_LANG")
            .or(fc.languages.source)
            .map(|s| parse_language("source", &s))
            .transpose()?
            .unwrap_or(defaults.languages.source);
        let target = env("VOXLATE_TARGET_LANG")
            .or(fc.languages.target)
            .map(|s| parse_language("target", &s))
            .transpose()?
            .unwrap_or(defaults.languages.target);

        let translate = TranslateConfig {
            url: env("VOXLATE_TRANSLATE_URL")
                .or(fc.translate.url)
                .unwrap_or(defaults.translate.url),
            timeout: env("VOXLATE_TRANSLATE_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .or(fc.translate.timeout_secs)
                .map_or(defaults.translate.timeout, Duration::from_secs),
        };

        let dv = defaults.voice;
        let voice = VoiceConfig {
            enabled: fc.voice.enabled.unwrap_or(dv.enabled),
            stt_url: fc.voice.stt_url.unwrap_or(dv.stt_url),
            stt_model: env("VOXLATE_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(dv.stt_model),
            tts_url: fc.voice.tts_url.unwrap_or(dv.tts_url),
            tts_model: env("VOXLATE_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(dv.tts_model),
            tts_voice: env("VOXLATE_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or(dv.tts_voice),
            tts_rate: fc.voice.tts_rate.unwrap_or(dv.tts_rate).clamp(0.25, 4.0),
            tts_pitch: fc.voice.tts_pitch.unwrap_or(dv.tts_pitch),
            simulated_playback: fc
                .voice
                .simulated_playback_ms
                .map_or(dv.simulated_playback, Duration::from_millis),
            silence: fc.voice.silence_ms.map_or(dv.silence, Duration::from_millis),
            max_utterance: fc
                .voice
                .max_utterance_secs
                .map_or(dv.max_utterance, Duration::from_secs),
        };

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
        };

        Ok(Self {
            languages: LanguageConfig { source, target },
            translate,
            voice,
            api_keys,
        })
    }
}

fn parse_language(which: &str, value: &str) -> Result<LanguageTag> {
    LanguageTag::parse(value)
        .map_err(|_| Error::Config(format!("invalid {which} language: {value:?}")))
}
