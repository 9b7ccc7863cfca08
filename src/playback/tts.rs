//! Text-to-speech over an OpenAI-compatible `/v1/audio/speech` endpoint

use std::fmt;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::speaker::{Speaker, decode_mp3};
use super::{Gender, Synthesizer, Utterance, Voice};
use crate::{Error, Result};

/// Voice used when the utterance names none
const DEFAULT_VOICE: &str = "alloy";

/// Voices the speech endpoint offers; all are multilingual
const VOICES: &[(&str, Gender)] = &[
    ("alloy", Gender::Neutral),
    ("echo", Gender::Male),
    ("fable", Gender::Neutral),
    ("onyx", Gender::Male),
    ("nova", Gender::Female),
    ("shimmer", Gender::Female),
];

/// Remote synthesizer playing through the local speaker
#[derive(Clone)]
pub struct RemoteSynthesizer {
    client: reqwest::Client,
    url: String,
    api_key: SecretString,
    model: String,
    speaker: Speaker,
}

impl RemoteSynthesizer {
    /// Create a synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(
        url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        speaker: Speaker,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key,
            model: model.into(),
            speaker,
        })
    }

    /// Fetch synthesized MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it
    pub async fn synthesize(&self, utterance: &Utterance) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct SpeechRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        if (utterance.pitch - 1.0).abs() > f32::EPSILON {
            tracing::debug!(pitch = utterance.pitch, "speech endpoint has no pitch control, ignoring");
        }

        let request = SpeechRequest {
            model: &self.model,
            input: &utterance.text,
            voice: utterance.voice.as_deref().unwrap_or(DEFAULT_VOICE),
            speed: utterance.rate.clamp(0.25, 4.0),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("API error {status}: {body}")));
        }

        let bytes = response.bytes().await?;
        tracing::debug!(bytes = bytes.len(), voice = request.voice, "speech synthesized");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Synthesizer for RemoteSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        VOICES
            .iter()
            .map(|(name, gender)| Voice {
                name: (*name).to_string(),
                gender: Some(*gender),
                language: None,
            })
            .collect()
    }

    async fn speak(&self, utterance: &Utterance) -> Result<()> {
        let mp3 = self.synthesize(utterance).await?;
        let speaker = self.speaker.clone();

        tokio::task::spawn_blocking(move || {
            let samples = decode_mp3(&mp3)?;
            speaker.play_blocking(samples)
        })
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }
}

impl fmt::Debug for RemoteSynthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSynthesizer")
            .field("url", &self.url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
