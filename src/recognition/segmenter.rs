//! Single-utterance segmentation
//!
//! Energy-based endpointing: waits for speech, accumulates it, and declares the
//! utterance complete after a stretch of trailing silence.

use std::time::Duration;

use super::capture::{SAMPLE_RATE, rms};

/// Tuning for [`UtteranceSegmenter`]
#[derive(Debug, Clone, Copy)]
pub struct SegmenterSettings {
    /// RMS above which a block counts as speech
    pub energy_threshold: f32,
    /// Speech shorter than this is treated as noise
    pub min_speech_samples: usize,
    /// Trailing silence that completes an utterance
    pub silence_samples: usize,
    /// Give up if no speech starts within this many samples
    pub no_speech_samples: usize,
    /// Hard cap on an utterance
    pub max_samples: usize,
}

impl SegmenterSettings {
    /// Settings from durations at [`SAMPLE_RATE`]
    #[must_use]
    pub fn from_durations(silence: Duration, max_utterance: Duration) -> Self {
        Self {
            silence_samples: samples_for(silence),
            max_samples: samples_for(max_utterance),
            ..Self::default()
        }
    }
}

impl Default for SegmenterSettings {
    fn default() -> Self {
        Self {
            energy_threshold: 0.03,
            min_speech_samples: samples_for(Duration::from_millis(300)),
            silence_samples: samples_for(Duration::from_millis(800)),
            no_speech_samples: samples_for(Duration::from_secs(8)),
            max_samples: samples_for(Duration::from_secs(15)),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn samples_for(d: Duration) -> usize {
    (d.as_millis() * u128::from(SAMPLE_RATE) / 1000) as usize
}

/// Outcome of feeding a block of audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentProgress {
    /// No speech yet
    Waiting,
    /// Speech in progress
    Capturing,
    /// Utterance finished
    Complete,
    /// Gave up waiting for speech
    NoSpeech,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    Speaking,
}

/// Detects the boundaries of one spoken utterance
#[derive(Debug)]
pub struct UtteranceSegmenter {
    settings: SegmenterSettings,
    phase: Phase,
    speech: Vec<f32>,
    silence_counter: usize,
    waited: usize,
}

impl UtteranceSegmenter {
    /// Create a segmenter
    #[must_use]
    pub const fn new(settings: SegmenterSettings) -> Self {
        Self {
            settings,
            phase: Phase::Waiting,
            speech: Vec::new(),
            silence_counter: 0,
            waited: 0,
        }
    }

    /// Feed the next block of samples
    pub fn push(&mut self, samples: &[f32]) -> SegmentProgress {
        if samples.is_empty() {
            return self.progress();
        }

        let energy = rms(samples);
        let is_speech = energy > self.settings.energy_threshold;

        match self.phase {
            Phase::Waiting => {
                if is_speech {
                    self.phase = Phase::Speaking;
                    self.speech.clear();
                    self.speech.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech started");
                    return SegmentProgress::Capturing;
                }
                self.waited += samples.len();
                if self.waited > self.settings.no_speech_samples {
                    tracing::debug!(waited = self.waited, "no speech detected");
                    return SegmentProgress::NoSpeech;
                }
                SegmentProgress::Waiting
            }
            Phase::Speaking => {
                self.speech.extend_from_slice(samples);
                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.speech.len() >= self.settings.max_samples {
                    tracing::debug!(samples = self.speech.len(), "utterance hit length cap");
                    return SegmentProgress::Complete;
                }

                if self.silence_counter > self.settings.silence_samples {
                    if self.voiced_len() > self.settings.min_speech_samples {
                        tracing::debug!(samples = self.speech.len(), "utterance complete");
                        return SegmentProgress::Complete;
                    }
                    // too short to be speech: a click or a cough
                    self.phase = Phase::Waiting;
                    self.waited += self.speech.len();
                    self.speech.clear();
                    self.silence_counter = 0;
                    return SegmentProgress::Waiting;
                }

                SegmentProgress::Capturing
            }
        }
    }

    /// Whether any speech has been captured
    #[must_use]
    pub fn heard_speech(&self) -> bool {
        self.phase == Phase::Speaking && !self.speech.is_empty()
    }

    /// Take the captured speech, leaving the segmenter waiting
    pub fn take_speech(&mut self) -> Vec<f32> {
        self.phase = Phase::Waiting;
        self.silence_counter = 0;
        std::mem::take(&mut self.speech)
    }

    const fn progress(&self) -> SegmentProgress {
        match self.phase {
            Phase::Waiting => SegmentProgress::Waiting,
            Phase::Speaking => SegmentProgress::Capturing,
        }
    }

    fn voiced_len(&self) -> usize {
        self.speech.len().saturating_sub(self.silence_counter)
    }
}
