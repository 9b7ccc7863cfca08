//! The voice translation session
//!
//! A [`SessionController`] owns the single live [`Session`] and is the only
//! thing that mutates it. Everything else talks to it with an [`Intent`] or a
//! [`ControllerEvent`] and watches it through [`SessionSnapshot`]s.
//!
//! ```text
//! Idle ──start──▶ Listening ──result──▶ Recognized ──▶ Translating ──▶ Ready
//!   ▲                │ error/end                                        │ play
//!   └────────────────┘                                      Speaking ◀──┘
//! ```

mod controller;
mod history;
mod timer;

use std::fmt;

use crate::language::LanguageTag;

pub use controller::{ControllerEvent, SessionController};
pub use history::{HISTORY_CAPACITY, HistoryBuffer, HistoryEntry};
pub use timer::{RecordingTimer, TimerTick};

/// Where the session is in the capture, translate, playback cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Waiting for the user
    #[default]
    Idle,
    /// Capturing an utterance
    Listening,
    /// Utterance recognized, translation not yet requested
    Recognized,
    /// Waiting on the translation
    Translating,
    /// Translation available
    Ready,
    /// Playing the translation
    Speaking,
    /// Capture could not begin
    Error,
    /// No recognition capability in this environment
    Unsupported,
}

impl SessionState {
    /// Short lowercase label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Recognized => "recognized",
            Self::Translating => "translating",
            Self::Ready => "ready",
            Self::Speaking => "speaking",
            Self::Error => "error",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The live orchestration context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub state: SessionState,
    pub source_language: LanguageTag,
    pub target_language: LanguageTag,
    pub original_text: String,
    pub translated_text: String,
    /// Recognition confidence as a percentage
    pub confidence: Option<u8>,
    pub elapsed_seconds: u64,
}

impl Session {
    /// A fresh idle session for a language pair
    #[must_use]
    pub const fn new(source_language: LanguageTag, target_language: LanguageTag) -> Self {
        Self {
            state: SessionState::Idle,
            source_language,
            target_language,
            original_text: String::new(),
            translated_text: String::new(),
            confidence: None,
            elapsed_seconds: 0,
        }
    }

    fn clear_texts(&mut self) {
        self.original_text.clear();
        self.translated_text.clear();
        self.confidence = None;
    }
}

/// Something the user asks the session to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Begin capturing an utterance
    Start,
    /// Cancel capture, or leave the ready state
    Stop,
    /// Exchange source and target languages
    SwapLanguages,
    /// Rebind recognition to a new spoken language
    SetSourceLanguage(LanguageTag),
    /// Translate into a new language
    SetTargetLanguage(LanguageTag),
    /// Clear texts and history
    Reset,
    /// Speak the current translation
    Play,
}

/// A recoverable failure surfaced to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionFault {
    /// Recording is unavailable in this environment
    #[error("speech recognition unsupported: {0}")]
    CapabilityUnsupported(String),

    /// The recognition engine failed mid-capture
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Capture could not begin
    #[error("could not start listening: {0}")]
    StartFailed(String),

    /// A capture was already running
    #[error("recognition already active")]
    AlreadyActive,

    /// A playback is still outstanding
    #[error("playback already in progress")]
    PlaybackBusy,

    /// Synthesis or audio output failed
    #[error("playback error: {0}")]
    Playback(String),
}

/// Immutable view of the session published after every transition
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session: Session,
    /// Newest first
    pub history: Vec<HistoryEntry>,
    pub fault: Option<SessionFault>,
    /// Whether the current translation came from the fallback tier
    pub was_fallback: bool,
}

impl SessionSnapshot {
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.session.state
    }
}

/// Format elapsed recording time as `m:ss`
#[must_use]
pub fn format_elapsed(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
