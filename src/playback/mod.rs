//! Text-to-speech playback
//!
//! The [`PlaybackController`] allows one outstanding playback at a time,
//! picks a voice, and simulates a fixed-length playback when the environment
//! has no synthesizer so "speaking" state still resolves.

mod speaker;
mod tts;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::language::LanguageTag;
use crate::{Error, Result};

pub use speaker::{Speaker, output_available};
pub use tts::RemoteSynthesizer;

/// Declared voice gender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Female,
    Male,
    Neutral,
}

/// A synthesizer voice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Engine voice name
    pub name: String,
    /// Declared gender, if the engine reports one
    pub gender: Option<Gender>,
    /// Language the voice is tied to; `None` for multilingual voices
    pub language: Option<LanguageTag>,
}

/// One request to speak
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// Text to speak
    pub text: String,
    /// Full target tag (e.g. "es-ES")
    pub language: LanguageTag,
    /// Speaking rate
    pub rate: f32,
    /// Speaking pitch
    pub pitch: f32,
    /// Chosen voice; `None` means engine default
    pub voice: Option<String>,
}

/// Speech synthesis capability
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Voices the engine offers
    fn voices(&self) -> Vec<Voice>;

    /// Speak an utterance, resolving when playback ends
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or audio output fails
    async fn speak(&self, utterance: &Utterance) -> Result<()>;
}

/// Pick a voice: exact name, then name containing the preference, then a
/// female voice by declared gender, then by name. `None` means engine default.
#[must_use]
pub fn select_voice<'a>(
    voices: &'a [Voice],
    preferred: Option<&str>,
    language: &LanguageTag,
) -> Option<&'a Voice> {
    let matching: Vec<&Voice> = voices
        .iter()
        .filter(|v| {
            v.language
                .as_ref()
                .is_none_or(|l| l.base_code().eq_ignore_ascii_case(language.base_code()))
        })
        .collect();
    let candidates = if matching.is_empty() {
        voices.iter().collect()
    } else {
        matching
    };

    if let Some(name) = preferred.filter(|n| !n.is_empty()) {
        let lowered = name.to_lowercase();
        if let Some(v) = candidates
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
            .or_else(|| {
                candidates
                    .iter()
                    .find(|v| v.name.to_lowercase().contains(&lowered))
            })
        {
            return Some(*v);
        }
    }

    candidates
        .iter()
        .find(|v| v.gender == Some(Gender::Female))
        .or_else(|| {
            candidates
                .iter()
                .find(|v| v.name.to_lowercase().contains("female"))
        })
        .copied()
}

/// Probe for remote synthesis with local speaker output
///
/// `None` means playback will be simulated.
#[must_use]
pub fn probe(config: &Config) -> Option<Arc<dyn Synthesizer>> {
    if !config.voice.enabled {
        return None;
    }
    let Some(api_key) = config.api_keys.openai.clone() else {
        tracing::info!("no OpenAI API key, playback will be simulated");
        return None;
    };

    let speaker = match Speaker::open() {
        Ok(speaker) => speaker,
        Err(e) => {
            tracing::info!(error = %e, "no speaker, playback will be simulated");
            return None;
        }
    };

    match RemoteSynthesizer::new(
        config.voice.tts_url.clone(),
        api_key,
        config.voice.tts_model.clone(),
        speaker,
    ) {
        Ok(synth) => {
            tracing::info!(model = %config.voice.tts_model, "speech synthesis available");
            Some(Arc::new(synth))
        }
        Err(e) => {
            tracing::warn!(error = %e, "speech synthesis unavailable");
            None
        }
    }
}

/// Playback tuning
#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    /// Speaking rate
    pub rate: f32,
    /// Speaking pitch
    pub pitch: f32,
    /// Preferred voice name
    pub preferred_voice: Option<String>,
    /// Length of simulated playback without a synthesizer
    pub simulated: Duration,
}

impl PlaybackSettings {
    /// Settings from the voice configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            rate: config.voice.tts_rate,
            pitch: config.voice.tts_pitch,
            preferred_voice: Some(config.voice.tts_voice.clone()).filter(|v| !v.is_empty()),
            simulated: config.voice.simulated_playback,
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            rate: 0.8,
            pitch: 1.0,
            preferred_voice: None,
            simulated: Duration::from_millis(2000),
        }
    }
}

/// Drives speech synthesis, one playback at a time
#[derive(Clone)]
pub struct PlaybackController {
    synthesizer: Option<Arc<dyn Synthesizer>>,
    settings: PlaybackSettings,
    busy: Arc<AtomicBool>,
}

impl PlaybackController {
    /// Create a controller; `None` simulates playback
    #[must_use]
    pub fn new(synthesizer: Option<Arc<dyn Synthesizer>>, settings: PlaybackSettings) -> Self {
        Self {
            synthesizer,
            settings,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a real synthesizer is available
    #[must_use]
    pub fn has_synthesizer(&self) -> bool {
        self.synthesizer.is_some()
    }

    /// Whether a playback is outstanding
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Reserve the player and prepare a playback job
    ///
    /// # Errors
    ///
    /// Returns `PlaybackBusy` if a playback is already outstanding
    pub fn begin(&self, text: &str, language: &LanguageTag) -> Result<PlaybackJob> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::PlaybackBusy);
        }
        let guard = BusyGuard(Arc::clone(&self.busy));

        let voice = self.synthesizer.as_ref().and_then(|s| {
            let voices = s.voices();
            let chosen = select_voice(&voices, self.settings.preferred_voice.as_deref(), language)
                .map(|v| v.name.clone());
            tracing::debug!(voice = ?chosen, %language, "selected voice");
            chosen
        });

        Ok(PlaybackJob {
            synthesizer: self.synthesizer.clone(),
            utterance: Utterance {
                text: text.to_string(),
                language: language.clone(),
                rate: self.settings.rate,
                pitch: self.settings.pitch,
                voice,
            },
            simulated: self.settings.simulated,
            _guard: guard,
        })
    }
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("has_synthesizer", &self.synthesizer.is_some())
            .field("settings", &self.settings)
            .field("busy", &self.is_busy())
            .finish()
    }
}

/// Releases the player when the job finishes or is dropped
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A reserved playback; holds the player busy until it completes
pub struct PlaybackJob {
    synthesizer: Option<Arc<dyn Synthesizer>>,
    utterance: Utterance,
    simulated: Duration,
    _guard: BusyGuard,
}

impl PlaybackJob {
    /// The utterance that will be spoken
    #[must_use]
    pub const fn utterance(&self) -> &Utterance {
        &self.utterance
    }

    /// Speak, or wait out the simulated duration without a synthesizer
    ///
    /// # Errors
    ///
    /// Returns the synthesizer's error; the player is released either way
    pub async fn run(self) -> Result<()> {
        match &self.synthesizer {
            Some(synth) => {
                tracing::info!(
                    language = %self.utterance.language,
                    voice = ?self.utterance.voice,
                    "speaking translation"
                );
                synth.speak(&self.utterance).await
            }
            None => {
                tracing::debug!(duration = ?self.simulated, "no synthesizer, simulating playback");
                tokio::time::sleep(self.simulated).await;
                Ok(())
            }
        }
    }
}

impl fmt::Debug for PlaybackJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackJob")
            .field("utterance", &self.utterance)
            .finish_non_exhaustive()
    }
}
