//! Speech-to-text (STT) via a Whisper-compatible endpoint
//!
//! Runs on the capture thread with a blocking client; the client is built and
//! dropped there so it never lives inside the async runtime.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// `verbose_json` transcription response
#[derive(Debug, serde::Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, serde::Deserialize)]
struct WhisperSegment {
    avg_logprob: f64,
}

/// A transcription with its confidence
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    /// Recognized text
    pub text: String,
    /// Confidence in `0.0..=1.0`
    pub confidence: f32,
}

/// Transcribes WAV audio
#[derive(Debug, Clone)]
pub struct Transcriber {
    url: String,
    api_key: SecretString,
    model: String,
    timeout: Duration,
}

impl Transcriber {
    /// Create a transcriber
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(url: String, api_key: SecretString, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("API key required for transcription".to_string()));
        }

        Ok(Self {
            url,
            api_key,
            model,
            timeout: Duration::from_secs(30),
        })
    }

    /// Transcribe WAV bytes spoken in `language` (a base code such as "en")
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed
    pub fn transcribe(&self, wav: &[u8], language: &str) -> Result<Transcript> {
        tracing::debug!(audio_bytes = wav.len(), language, "starting transcription");

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        let form = reqwest::blocking::multipart::Form::new()
            .part(
                "file",
                reqwest::blocking::multipart::Part::bytes(wav.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", language.to_string())
            .text("response_format", "verbose_json");

        let response = client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Stt(format!("transcription API error {status}: {body}")));
        }

        let parsed: WhisperResponse = response.json()?;
        let transcript = Transcript {
            text: parsed.text.trim().to_string(),
            confidence: confidence_from_segments(&parsed.segments),
        };

        tracing::info!(
            transcript = %transcript.text,
            confidence = transcript.confidence,
            "transcription complete"
        );
        Ok(transcript)
    }
}

/// Mean per-segment probability; engines that report nothing get full confidence
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn confidence_from_segments(segments: &[WhisperSegment]) -> f32 {
    if segments.is_empty() {
        return 1.0;
    }
    let mean = segments.iter().map(|s| s.avg_logprob.exp()).sum::<f64>() / segments.len() as f64;
    mean.clamp(0.0, 1.0) as f32
}
