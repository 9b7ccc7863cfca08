//! TOML configuration file loading
//!
//! Supports `~/.config/voxlate/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoxlateConfigFile {
    /// Default language pair
    #[serde(default)]
    pub languages: LanguagesFileConfig,

    /// Remote translation service
    #[serde(default)]
    pub translate: TranslateFileConfig,

    /// Voice capture and playback
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Language pair configuration
#[derive(Debug, Default, Deserialize)]
pub struct LanguagesFileConfig {
    /// Source language tag (e.g. "en-US")
    pub source: Option<String>,

    /// Target language tag (e.g. "es-ES")
    pub target: Option<String>,
}

/// Translation service configuration
#[derive(Debug, Default, Deserialize)]
pub struct TranslateFileConfig {
    /// Endpoint URL
    pub url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable microphone and speaker
    pub enabled: Option<bool>,

    /// Transcription endpoint
    pub stt_url: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// Synthesis endpoint
    pub tts_url: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// Preferred TTS voice name (e.g. "nova")
    pub tts_voice: Option<String>,

    /// Speaking rate
    pub tts_rate: Option<f32>,

    /// Speaking pitch
    pub tts_pitch: Option<f32>,

    /// Simulated playback length when no synthesizer exists
    pub simulated_playback_ms: Option<u64>,

    /// Trailing silence that ends an utterance
    pub silence_ms: Option<u64>,

    /// Hard cap on a single utterance
    pub max_utterance_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VoxlateConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VoxlateConfigFile {
    config_file_path().map_or_else(VoxlateConfigFile::default, |p| load_config_file_from(&p))
}

/// Load a TOML config file from an explicit path
pub fn load_config_file_from(path: &Path) -> VoxlateConfigFile {
    if !path.exists() {
        return VoxlateConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VoxlateConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VoxlateConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voxlate/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voxlate").join("config.toml"))
}
