//! Session state machine
//!
//! [`SessionController::dispatch`] and [`SessionController::handle_event`]
//! are the only transition functions. Both are synchronous; async work
//! (translation, playback, timer ticks, recognition callbacks) runs
//! elsewhere and reports back as a [`ControllerEvent`] on the controller's
//! channel.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::history::HistoryBuffer;
use super::timer::{RecordingTimer, TimerTick};
use super::{Intent, Session, SessionFault, SessionSnapshot, SessionState};
use crate::Error;
use crate::language::LanguageTag;
use crate::playback::PlaybackController;
use crate::recognition::{
    AdapterEvent, EventCallback, Generation, RecognitionAdapter, RecognitionCapability,
    RecognitionEvent, RecognitionResult,
};
use crate::translate::{TranslationOutcome, TranslationResolver};

/// Completion of async work, fed back into the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// Callback from a recognition activation
    Recognition(AdapterEvent),
    /// A translation request resolved
    Translated {
        ticket: u64,
        source: LanguageTag,
        target: LanguageTag,
        outcome: TranslationOutcome,
    },
    /// The recording timer fired
    Tick(TimerTick),
    /// A playback finished
    PlaybackFinished(Result<(), SessionFault>),
}

/// Owns the session and sequences recognition, translation and playback
pub struct SessionController {
    session: Session,
    history: HistoryBuffer,
    fault: Option<SessionFault>,
    was_fallback: bool,

    capability: RecognitionCapability,
    adapter: Option<RecognitionAdapter>,
    last_generation: Generation,
    /// Activation whose events are currently folded into the session
    live_generation: Option<Generation>,

    resolver: TranslationResolver,
    next_ticket: u64,
    pending_ticket: Option<u64>,

    playback: PlaybackController,
    timer: RecordingTimer,

    events_tx: mpsc::UnboundedSender<ControllerEvent>,
    events_rx: mpsc::UnboundedReceiver<ControllerEvent>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    /// Create an idle controller; recording stays unavailable until
    /// [`set_capability`](Self::set_capability) caches a probe result
    #[must_use]
    pub fn new(
        source: LanguageTag,
        target: LanguageTag,
        resolver: TranslationResolver,
        playback: PlaybackController,
    ) -> Self {
        let session = Session::new(source, target);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshots, _) = watch::channel(SessionSnapshot {
            session: session.clone(),
            history: Vec::new(),
            fault: None,
            was_fallback: false,
        });

        Self {
            session,
            history: HistoryBuffer::new(),
            fault: None,
            was_fallback: false,
            capability: RecognitionCapability::Unprobed,
            adapter: None,
            last_generation: Generation::default(),
            live_generation: None,
            resolver,
            next_ticket: 0,
            pending_ticket: None,
            playback,
            timer: RecordingTimer::new(),
            events_tx,
            events_rx,
            snapshots,
        }
    }

    /// Cache the capability probe result
    pub fn set_capability(&mut self, capability: RecognitionCapability) {
        self.teardown_adapter();
        if self.session.state == SessionState::Listening {
            self.timer.cancel();
            self.session.elapsed_seconds = 0;
            self.session.state = SessionState::Idle;
        }
        if let Some(reason) = capability.unavailable_reason() {
            if self.session.state == SessionState::Idle {
                self.session.state = SessionState::Unsupported;
                self.fault = Some(SessionFault::CapabilityUnsupported(reason.to_string()));
            }
        } else if self.session.state == SessionState::Unsupported {
            self.session.state = SessionState::Idle;
            self.fault = None;
        }
        self.capability = capability;
        self.publish();
    }

    /// Watch snapshots published after every transition
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    /// Current snapshot
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Sender for injecting events (used by async work and tests)
    #[must_use]
    pub fn event_sender(&self) -> mpsc::UnboundedSender<ControllerEvent> {
        self.events_tx.clone()
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub const fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Whether the recording timer is ticking
    #[must_use]
    pub const fn is_timer_running(&self) -> bool {
        self.timer.is_running()
    }

    /// Whether a recognition activation is running
    #[must_use]
    pub fn is_recognition_active(&self) -> bool {
        self.adapter.as_ref().is_some_and(RecognitionAdapter::is_active)
    }

    /// Generation of the currently bound adapter or activation
    #[must_use]
    pub fn bound_generation(&self) -> Option<Generation> {
        self.adapter.as_ref().map(RecognitionAdapter::generation)
    }

    /// Apply a user intent
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&mut self, intent: Intent) {
        tracing::debug!(state = %self.session.state, ?intent, "intent");
        match intent {
            Intent::Start => self.start(),
            Intent::Stop => self.stop(),
            Intent::SwapLanguages => self.swap_languages(),
            Intent::SetSourceLanguage(tag) => {
                self.session.source_language = tag;
                self.rebind_source();
            }
            Intent::SetTargetLanguage(tag) => {
                tracing::info!(language = %tag, "target language changed");
                self.session.target_language = tag;
            }
            Intent::Reset => self.reset(),
            Intent::Play => self.play(),
        }
        self.publish();
    }

    /// Apply the completion of async work
    ///
    /// Must be called from within a tokio runtime.
    pub fn handle_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Recognition(ev) => self.on_recognition(ev),
            ControllerEvent::Translated {
                ticket,
                source,
                target,
                outcome,
            } => self.on_translated(ticket, &source, &target, outcome),
            ControllerEvent::Tick(tick) => self.on_tick(tick),
            ControllerEvent::PlaybackFinished(result) => self.on_playback_finished(result),
        }
        self.publish();
    }

    /// Wait for the next queued event and apply it
    pub async fn pump(&mut self) {
        if let Some(event) = self.events_rx.recv().await {
            self.handle_event(event);
        }
    }

    /// Apply every event already queued without waiting; returns how many
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    /// Drive the controller until `intents` closes
    pub async fn run(mut self, mut intents: mpsc::Receiver<Intent>) {
        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(intent) => self.dispatch(intent),
                    None => break,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
        }
        self.teardown_adapter();
        self.timer.cancel();
        tracing::debug!("session controller stopped");
    }

    fn start(&mut self) {
        match self.session.state {
            SessionState::Listening => {
                tracing::debug!("already listening, start ignored");
                return;
            }
            SessionState::Translating | SessionState::Speaking | SessionState::Recognized => {
                tracing::info!(state = %self.session.state, "busy, start ignored");
                return;
            }
            SessionState::Idle
            | SessionState::Ready
            | SessionState::Error
            | SessionState::Unsupported => {}
        }

        if let Some(reason) = self.capability.unavailable_reason() {
            tracing::warn!(reason, "cannot start listening");
            self.session.state = SessionState::Unsupported;
            self.fault = Some(SessionFault::CapabilityUnsupported(reason.to_string()));
            return;
        }

        // an activation that already failed may still be waiting for its end
        if let Some(adapter) = self.adapter.as_mut()
            && adapter.is_active()
        {
            tracing::debug!(generation = %adapter.generation(), "discarding unfinished activation");
            adapter.abort();
            self.live_generation = None;
        }

        self.session.clear_texts();
        self.was_fallback = false;
        self.fault = None;
        self.begin_capture();
    }

    /// Start an activation on the bound adapter, binding one if needed
    fn begin_capture(&mut self) {
        if let Err(e) = self.ensure_adapter() {
            self.fail_start(&e);
            return;
        }
        self.last_generation = self.last_generation.next();
        let generation = self.last_generation;
        let callback = self.recognition_callback();
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };

        match adapter.start(generation, callback) {
            Ok(()) => {
                self.live_generation = Some(generation);
                self.session.state = SessionState::Listening;
                self.session.elapsed_seconds = 0;
                let tx = self.events_tx.clone();
                self.timer
                    .start(move |tick| tx.send(ControllerEvent::Tick(tick)).is_ok());
                tracing::info!(
                    language = %self.session.source_language,
                    %generation,
                    "listening"
                );
            }
            Err(e) => self.fail_start(&e),
        }
    }

    fn fail_start(&mut self, error: &Error) {
        tracing::warn!(error = %error, "failed to start listening");
        self.timer.cancel();
        self.session.elapsed_seconds = 0;
        self.session.state = SessionState::Error;
        self.fault = Some(match error {
            Error::AlreadyActive => SessionFault::AlreadyActive,
            other => SessionFault::StartFailed(other.to_string()),
        });
    }

    fn ensure_adapter(&mut self) -> crate::Result<()> {
        let bound = self
            .adapter
            .as_ref()
            .is_some_and(|a| a.language() == &self.session.source_language);
        if bound {
            return Ok(());
        }

        let recognizer = self.capability.recognizer().cloned().ok_or_else(|| {
            Error::CapabilityUnsupported("speech recognition unavailable".to_string())
        })?;
        self.teardown_adapter();
        self.last_generation = self.last_generation.next();
        self.adapter = Some(RecognitionAdapter::configure(
            &*recognizer,
            self.session.source_language.clone(),
            self.last_generation,
        )?);
        Ok(())
    }

    fn recognition_callback(&self) -> EventCallback {
        let tx = self.events_tx.clone();
        Arc::new(move |event| {
            if tx.send(ControllerEvent::Recognition(event)).is_err() {
                tracing::trace!("session controller gone, recognition event dropped");
            }
        })
    }

    /// Abort any running activation and forget the adapter
    fn teardown_adapter(&mut self) {
        if let Some(mut adapter) = self.adapter.take() {
            adapter.abort();
        }
        self.live_generation = None;
    }

    fn stop(&mut self) {
        match self.session.state {
            SessionState::Listening => {
                if let Some(adapter) = self.adapter.as_mut() {
                    adapter.abort();
                }
                self.live_generation = None;
                self.timer.cancel();
                self.session.elapsed_seconds = 0;
                self.session.state = SessionState::Idle;
                tracing::info!("listening cancelled");
            }
            SessionState::Ready | SessionState::Error => {
                self.timer.cancel();
                self.fault = None;
                self.session.state = SessionState::Idle;
            }
            SessionState::Translating | SessionState::Speaking => {
                tracing::debug!(state = %self.session.state, "cannot cancel, stop ignored");
            }
            SessionState::Idle | SessionState::Recognized | SessionState::Unsupported => {}
        }
    }

    fn swap_languages(&mut self) {
        if self.session.state == SessionState::Translating {
            tracing::info!("swap supersedes the pending translation");
            self.pending_ticket = None;
            self.session.clear_texts();
            self.session.state = SessionState::Idle;
        }

        let s = &mut self.session;
        std::mem::swap(&mut s.source_language, &mut s.target_language);
        if !s.original_text.is_empty() && !s.translated_text.is_empty() {
            std::mem::swap(&mut s.original_text, &mut s.translated_text);
        }
        tracing::info!(
            source_language = %s.source_language,
            target_language = %s.target_language,
            "languages swapped"
        );
        self.rebind_source();
    }

    /// Rebind recognition to the current source language
    ///
    /// A running activation is aborted first and its late events are dropped
    /// by generation; listening then resumes on the new adapter.
    fn rebind_source(&mut self) {
        let was_listening = self.session.state == SessionState::Listening;
        if was_listening {
            self.timer.cancel();
        }
        self.teardown_adapter();

        if self.capability.recognizer().is_none() {
            return;
        }
        if let Err(e) = self.ensure_adapter() {
            tracing::warn!(error = %e, "failed to rebind recognizer");
            if was_listening {
                self.fail_start(&e);
            }
            return;
        }
        tracing::debug!(
            language = %self.session.source_language,
            generation = ?self.bound_generation(),
            "recognizer rebound"
        );

        if was_listening {
            self.begin_capture();
        }
    }

    fn reset(&mut self) {
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.abort();
        }
        self.live_generation = None;
        self.pending_ticket = None;
        self.timer.cancel();

        self.session.clear_texts();
        self.session.elapsed_seconds = 0;
        self.history.clear();
        self.fault = None;
        self.was_fallback = false;
        self.session.state = SessionState::Idle;
        tracing::info!("session reset");
    }

    fn play(&mut self) {
        if self.session.translated_text.is_empty() {
            tracing::debug!("nothing to play");
            return;
        }

        let job = match self
            .playback
            .begin(&self.session.translated_text, &self.session.target_language)
        {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(error = %e, "playback rejected");
                self.fault = Some(match e {
                    Error::PlaybackBusy => SessionFault::PlaybackBusy,
                    other => SessionFault::Playback(other.to_string()),
                });
                return;
            }
        };

        if self.session.state == SessionState::Ready {
            self.session.state = SessionState::Speaking;
        }

        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = job
                .run()
                .await
                .map_err(|e| SessionFault::Playback(e.to_string()));
            if tx.send(ControllerEvent::PlaybackFinished(result)).is_err() {
                tracing::trace!("session controller gone, playback result dropped");
            }
        });
    }

    fn on_recognition(&mut self, event: AdapterEvent) {
        if self.live_generation != Some(event.generation) {
            tracing::debug!(
                generation = %event.generation,
                live = ?self.live_generation,
                "dropping stale recognition event"
            );
            return;
        }

        match event.event {
            RecognitionEvent::Result(result) => self.on_result(result),
            RecognitionEvent::Error(code) => {
                if self.session.state == SessionState::Listening {
                    tracing::warn!(code = %code, "recognition error");
                    self.timer.cancel();
                    self.session.elapsed_seconds = 0;
                    self.session.state = SessionState::Idle;
                    self.fault = Some(SessionFault::Recognition(code));
                }
            }
            RecognitionEvent::End => {
                if let Some(adapter) = self.adapter.as_mut() {
                    adapter.mark_ended();
                }
                self.live_generation = None;
                self.timer.cancel();
                if self.session.state == SessionState::Listening {
                    tracing::debug!("recognition ended without a result");
                    self.session.elapsed_seconds = 0;
                    self.session.state = SessionState::Idle;
                }
            }
        }
    }

    fn on_result(&mut self, result: RecognitionResult) {
        if self.session.state != SessionState::Listening {
            tracing::debug!(state = %self.session.state, "result outside listening ignored");
            return;
        }

        self.timer.cancel();
        self.session.original_text = result.text;
        self.session.confidence = Some(confidence_percent(result.confidence));
        self.session.state = SessionState::Recognized;
        tracing::info!(
            text = %self.session.original_text,
            confidence = ?self.session.confidence,
            "recognized"
        );
        self.publish();

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.pending_ticket = Some(ticket);
        self.session.state = SessionState::Translating;

        let resolver = self.resolver.clone();
        let text = self.session.original_text.clone();
        let source = self.session.source_language.clone();
        let target = self.session.target_language.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = resolver.resolve(&text, &source, &target).await;
            let event = ControllerEvent::Translated {
                ticket,
                source,
                target,
                outcome,
            };
            if tx.send(event).is_err() {
                tracing::trace!(ticket, "session controller gone, translation dropped");
            }
        });
    }

    fn on_translated(
        &mut self,
        ticket: u64,
        source: &LanguageTag,
        target: &LanguageTag,
        outcome: TranslationOutcome,
    ) {
        if self.pending_ticket != Some(ticket) || self.session.state != SessionState::Translating {
            tracing::debug!(ticket, "discarding superseded translation");
            return;
        }

        self.pending_ticket = None;
        self.session.translated_text = outcome.text;
        self.was_fallback = outcome.was_fallback;
        let id = self.history.record(
            &self.session.original_text,
            &self.session.translated_text,
            source,
            target,
        );
        self.session.state = SessionState::Ready;
        tracing::info!(
            history_id = id,
            fallback = outcome.was_fallback,
            text = %self.session.translated_text,
            "translation ready"
        );
    }

    fn on_tick(&mut self, tick: TimerTick) {
        if self.timer.accepts(tick) && self.session.state == SessionState::Listening {
            self.session.elapsed_seconds += 1;
        } else {
            tracing::trace!(epoch = tick.epoch, "dropping stale timer tick");
        }
    }

    fn on_playback_finished(&mut self, result: Result<(), SessionFault>) {
        if let Err(fault) = result {
            tracing::warn!(error = %fault, "playback failed");
            self.fault = Some(fault);
        }
        if self.session.state == SessionState::Speaking {
            self.session.state = SessionState::Ready;
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(SessionSnapshot {
            session: self.session.clone(),
            history: self.history.to_vec(),
            fault: self.fault.clone(),
            was_fallback: self.was_fallback,
        });
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown_adapter();
    }
}

/// Engine confidence as a rounded percentage
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn confidence_percent(confidence: f32) -> u8 {
    (confidence.clamp(0.0, 1.0) * 100.0).round() as u8
}
