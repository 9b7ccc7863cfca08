//! Speech recognition
//!
//! A [`Recognizer`] is the recognition capability of the environment. Each
//! call to [`Recognizer::configure`] yields a fresh [`RecognitionHandle`]
//! bound to one language with single-utterance semantics. The
//! [`RecognitionAdapter`] wraps one handle, enforces one activation at a time
//! and tags every event it emits with the [`Generation`] of the activation
//! that produced it, so the session can drop late callbacks.

mod capture;
mod microphone;
mod probe;
mod segmenter;
mod stt;

use std::fmt;
use std::sync::Arc;

use crate::language::LanguageTag;
use crate::{Error, Result};

pub use capture::{AudioCapture, SAMPLE_RATE, input_available, rms, samples_to_wav};
pub use microphone::MicrophoneRecognizer;
pub use probe::{RecognitionCapability, probe};
pub use segmenter::{SegmentProgress, SegmenterSettings, UtteranceSegmenter};
pub use stt::{Transcriber, Transcript};

/// Monotonic id distinguishing successive adapter instances and activations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// The generation after this one
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw counter value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Text recognized from one utterance
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    /// Transcript
    pub text: String,
    /// Engine confidence in `0.0..=1.0`
    pub confidence: f32,
}

/// Normalized recognition callback
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// An utterance was recognized
    Result(RecognitionResult),
    /// Engine-reported failure (e.g. "network", "no-speech", "audio-capture")
    Error(String),
    /// Activation finished; always the last event of an activation
    End,
}

/// A recognition event tagged with the activation that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterEvent {
    /// Originating activation
    pub generation: Generation,
    /// Event payload
    pub event: RecognitionEvent,
}

/// Callback receiving tagged recognition events
pub type EventCallback = Arc<dyn Fn(AdapterEvent) + Send + Sync>;

/// Where a running activation reports its events
///
/// Cheap to clone; every event is stamped with the activation's generation.
#[derive(Clone)]
pub struct RecognitionSink {
    generation: Generation,
    deliver: EventCallback,
}

impl RecognitionSink {
    /// Create a sink for one activation
    #[must_use]
    pub fn new(generation: Generation, deliver: EventCallback) -> Self {
        Self {
            generation,
            deliver,
        }
    }

    /// Generation this sink stamps on events
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Report a recognized utterance
    pub fn result(&self, text: impl Into<String>, confidence: f32) {
        self.emit(RecognitionEvent::Result(RecognitionResult {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }));
    }

    /// Report an engine failure
    pub fn error(&self, code: impl Into<String>) {
        self.emit(RecognitionEvent::Error(code.into()));
    }

    /// Report the end of the activation
    pub fn end(&self) {
        self.emit(RecognitionEvent::End);
    }

    fn emit(&self, event: RecognitionEvent) {
        (self.deliver)(AdapterEvent {
            generation: self.generation,
            event,
        });
    }
}

impl fmt::Debug for RecognitionSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognitionSink")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// The recognition capability of the execution environment
pub trait Recognizer: Send + Sync {
    /// Create a fresh single-utterance recognizer bound to `language`
    ///
    /// # Errors
    ///
    /// Returns error if the engine cannot be configured for the language
    fn configure(&self, language: &LanguageTag) -> Result<Box<dyn RecognitionHandle>>;
}

/// One configured recognizer instance
///
/// Implementations emit exactly one terminal sequence per activation:
/// `result` then `end`, `error` then `end`, or a bare `end`.
pub trait RecognitionHandle: Send {
    /// Begin capturing
    ///
    /// # Errors
    ///
    /// Returns error if capture cannot begin
    fn start(&mut self, sink: RecognitionSink) -> Result<()>;

    /// Finish capturing and recognize what was heard so far
    fn stop(&mut self);

    /// Cancel capturing and discard audio
    fn abort(&mut self);
}

/// Wraps one configured recognizer and tracks whether it is running
pub struct RecognitionAdapter {
    language: LanguageTag,
    generation: Generation,
    handle: Box<dyn RecognitionHandle>,
    active: bool,
}

impl RecognitionAdapter {
    /// Configure a new adapter bound to `language`
    ///
    /// # Errors
    ///
    /// Returns error if the recognizer rejects the language
    pub fn configure(
        recognizer: &dyn Recognizer,
        language: LanguageTag,
        generation: Generation,
    ) -> Result<Self> {
        let handle = recognizer.configure(&language)?;
        tracing::debug!(%language, %generation, "recognition adapter configured");
        Ok(Self {
            language,
            generation,
            handle,
            active: false,
        })
    }

    /// Start an activation stamped with `generation`
    ///
    /// # Errors
    ///
    /// Returns `AlreadyActive` if an activation is running, or the
    /// engine's error if capture cannot begin
    pub fn start(&mut self, generation: Generation, deliver: EventCallback) -> Result<()> {
        if self.active {
            return Err(Error::AlreadyActive);
        }

        self.handle
            .start(RecognitionSink::new(generation, deliver))?;
        self.generation = generation;
        self.active = true;
        tracing::debug!(language = %self.language, %generation, "recognition started");
        Ok(())
    }

    /// Request the engine to finish; no-op when not running
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.handle.stop();
        self.active = false;
        tracing::debug!(generation = %self.generation, "recognition stop requested");
    }

    /// Request the engine to cancel; no-op when not running
    pub fn abort(&mut self) {
        if !self.active {
            return;
        }
        self.handle.abort();
        self.active = false;
        tracing::debug!(generation = %self.generation, "recognition aborted");
    }

    /// Record that the running activation delivered its `end`
    pub const fn mark_ended(&mut self) {
        self.active = false;
    }

    /// Whether an activation is running
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Generation of the latest activation (or of configuration)
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Bound language
    #[must_use]
    pub const fn language(&self) -> &LanguageTag {
        &self.language
    }
}

impl fmt::Debug for RecognitionAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognitionAdapter")
            .field("language", &self.language)
            .field("generation", &self.generation)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
