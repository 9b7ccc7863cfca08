//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use voxlate::playback::{Gender, PlaybackController, PlaybackSettings, Synthesizer, Utterance, Voice};
use voxlate::recognition::{RecognitionCapability, RecognitionHandle, RecognitionSink, Recognizer};
use voxlate::translate::{Translate, TranslationRequest, TranslationResolver};
use voxlate::{Error, LanguageTag, Result, SessionController};

/// Parse a tag in tests
#[must_use]
pub fn tag(s: &str) -> LanguageTag {
    LanguageTag::parse(s).expect("valid tag")
}

/// One recorded activation of a [`ScriptedRecognizer`]
#[derive(Clone, Debug)]
pub struct Activation {
    pub language: LanguageTag,
    pub sink: RecognitionSink,
    pub stopped: bool,
    pub aborted: bool,
}

#[derive(Default)]
struct ScriptState {
    configured: Vec<LanguageTag>,
    activations: Vec<Activation>,
    fail_start: bool,
}

/// Recognizer whose events are emitted by the test through recorded sinks
#[derive(Clone, Default)]
pub struct ScriptedRecognizer {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedRecognizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent starts fail
    pub fn fail_starts(&self, fail: bool) {
        self.state.lock().unwrap().fail_start = fail;
    }

    /// Wrap as a cached probe result
    #[must_use]
    pub fn capability(&self) -> RecognitionCapability {
        RecognitionCapability::Present(Arc::new(self.clone()))
    }

    #[must_use]
    pub fn activation(&self, index: usize) -> Activation {
        self.state.lock().unwrap().activations[index].clone()
    }

    /// Sink of the most recent activation
    #[must_use]
    pub fn last_sink(&self) -> RecognitionSink {
        let state = self.state.lock().unwrap();
        state.activations.last().expect("no activation").sink.clone()
    }

    #[must_use]
    pub fn activation_count(&self) -> usize {
        self.state.lock().unwrap().activations.len()
    }

    #[must_use]
    pub fn configured_languages(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .configured
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

impl Recognizer for ScriptedRecognizer {
    fn configure(&self, language: &LanguageTag) -> Result<Box<dyn RecognitionHandle>> {
        self.state.lock().unwrap().configured.push(language.clone());
        Ok(Box::new(ScriptedHandle {
            language: language.clone(),
            state: Arc::clone(&self.state),
            index: None,
        }))
    }
}

struct ScriptedHandle {
    language: LanguageTag,
    state: Arc<Mutex<ScriptState>>,
    index: Option<usize>,
}

impl RecognitionHandle for ScriptedHandle {
    fn start(&mut self, sink: RecognitionSink) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_start {
            return Err(Error::Recognition("audio-capture".to_string()));
        }
        state.activations.push(Activation {
            language: self.language.clone(),
            sink,
            stopped: false,
            aborted: false,
        });
        self.index = Some(state.activations.len() - 1);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(i) = self.index {
            self.state.lock().unwrap().activations[i].stopped = true;
        }
    }

    fn abort(&mut self) {
        if let Some(i) = self.index {
            self.state.lock().unwrap().activations[i].aborted = true;
        }
    }
}

/// Translator that always answers with a fixed string
pub struct FixedTranslator(pub String);

#[async_trait]
impl Translate for FixedTranslator {
    async fn translate(&self, _request: TranslationRequest<'_>) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Translator that always fails like an unreachable service
pub struct FailingTranslator;

#[async_trait]
impl Translate for FailingTranslator {
    async fn translate(&self, _request: TranslationRequest<'_>) -> Result<String> {
        Err(Error::TranslationUnavailable("connection refused".to_string()))
    }
}

/// Translator that answers only once released
pub struct GatedTranslator {
    pub reply: String,
    pub release: Arc<Notify>,
}

#[async_trait]
impl Translate for GatedTranslator {
    async fn translate(&self, _request: TranslationRequest<'_>) -> Result<String> {
        self.release.notified().await;
        Ok(self.reply.clone())
    }
}

/// Synthesizer that records utterances and "speaks" for a fixed time
#[derive(Clone, Default)]
pub struct RecordingSynthesizer {
    pub spoken: Arc<Mutex<Vec<Utterance>>>,
    pub duration: Duration,
}

#[async_trait]
impl Synthesizer for RecordingSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        vec![
            Voice {
                name: "onyx".to_string(),
                gender: Some(Gender::Male),
                language: None,
            },
            Voice {
                name: "nova".to_string(),
                gender: Some(Gender::Female),
                language: None,
            },
        ]
    }

    async fn speak(&self, utterance: &Utterance) -> Result<()> {
        self.spoken.lock().unwrap().push(utterance.clone());
        tokio::time::sleep(self.duration).await;
        Ok(())
    }
}

/// Controller with simulated playback
#[must_use]
pub fn controller(source: &str, target: &str, translator: impl Translate + 'static) -> SessionController {
    controller_with_playback(
        source,
        target,
        translator,
        PlaybackController::new(None, PlaybackSettings::default()),
    )
}

#[must_use]
pub fn controller_with_playback(
    source: &str,
    target: &str,
    translator: impl Translate + 'static,
    playback: PlaybackController,
) -> SessionController {
    SessionController::new(
        tag(source),
        tag(target),
        TranslationResolver::new(Arc::new(translator)),
        playback,
    )
}
