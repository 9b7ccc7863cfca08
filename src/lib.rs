//! Voxlate - speak, translate, and hear the translation
//!
//! This library provides the voice translation core:
//! - Speech recognition behind a generation-tagged adapter
//! - Translation with a static fallback tier that never fails
//! - Speech playback with voice selection and one-at-a-time playback
//! - A session state machine that sequences the three and keeps history
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Presentation (CLI / UI)                 │
//! │        intents ──▶        ◀── snapshots              │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                Session Controller                    │
//! │   State  │  History  │  Recording timer             │
//! └──────┬──────────────┬──────────────────┬────────────┘
//!        │              │                  │
//! ┌──────▼──────┐ ┌─────▼────────┐ ┌───────▼──────────┐
//! │ Recognition │ │  Translation │ │     Playback     │
//! │ mic + STT   │ │ remote + fb  │ │   TTS + speaker  │
//! └─────────────┘ └──────────────┘ └──────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod language;
pub mod playback;
pub mod recognition;
pub mod session;
pub mod translate;

pub use config::Config;
pub use error::{Error, Result};
pub use language::{LanguageTag, SUPPORTED_LANGUAGES};
pub use playback::{PlaybackController, PlaybackSettings, Synthesizer};
pub use recognition::{RecognitionAdapter, RecognitionCapability, Recognizer};
pub use session::{
    ControllerEvent, HistoryEntry, Intent, Session, SessionController, SessionFault,
    SessionSnapshot, SessionState,
};
pub use translate::{RemoteTranslator, Translate, TranslationOutcome, TranslationResolver};
