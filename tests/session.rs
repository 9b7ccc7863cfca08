//! Session controller integration tests
//!
//! Drives the state machine with a scripted recognizer; no audio hardware or
//! network is touched.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use voxlate::playback::{PlaybackController, PlaybackSettings};
use voxlate::recognition::RecognitionCapability;
use voxlate::{HistoryEntry, Intent, SessionController, SessionFault, SessionState};

mod common;

use common::{
    FailingTranslator, FixedTranslator, GatedTranslator, RecordingSynthesizer, ScriptedRecognizer,
    controller, controller_with_playback, tag,
};

/// Start listening, recognize `text`, and run the controller to `Ready`
async fn complete_cycle(
    controller: &mut SessionController,
    recognizer: &ScriptedRecognizer,
    text: &str,
) {
    controller.dispatch(Intent::Start);
    assert_eq!(controller.session().state, SessionState::Listening);

    let sink = recognizer.last_sink();
    sink.result(text, 0.9);
    sink.end();

    while controller.session().state != SessionState::Ready {
        controller.pump().await;
    }
}

#[tokio::test]
async fn test_end_to_end_recognize_translate_record() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::Start);
    assert_eq!(controller.session().state, SessionState::Listening);
    assert!(controller.is_timer_running());
    assert_eq!(recognizer.configured_languages(), vec!["en-US"]);

    recognizer.last_sink().result("hello", 0.91);
    controller.pump().await;

    let session = controller.session();
    assert_eq!(session.state, SessionState::Translating);
    assert_eq!(session.original_text, "hello");
    assert_eq!(session.confidence, Some(91));
    assert!(!controller.is_timer_running());

    recognizer.last_sink().end();
    controller.pump().await;
    assert_eq!(controller.session().state, SessionState::Translating);
    assert!(!controller.is_recognition_active());

    controller.pump().await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.state(), SessionState::Ready);
    assert_eq!(snapshot.session.translated_text, "hola");
    assert!(!snapshot.was_fallback);
    assert_eq!(snapshot.history.len(), 1);

    let HistoryEntry {
        original_text,
        translated_text,
        source_language,
        target_language,
        ..
    } = &snapshot.history[0];
    assert_eq!(original_text, "hello");
    assert_eq!(translated_text, "hola");
    assert_eq!(source_language.as_str(), "en-US");
    assert_eq!(target_language.as_str(), "es-ES");
}

#[tokio::test]
async fn test_start_without_probe_is_unsupported() {
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));

    controller.dispatch(Intent::Start);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.state(), SessionState::Unsupported);
    assert!(matches!(
        snapshot.fault,
        Some(SessionFault::CapabilityUnsupported(_))
    ));
    assert!(!controller.is_timer_running());
    assert!(snapshot.session.original_text.is_empty());
}

#[tokio::test]
async fn test_absent_capability_enters_unsupported_once_probed() {
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(RecognitionCapability::Absent {
        reason: "no input device available".to_string(),
    });
    assert_eq!(controller.session().state, SessionState::Unsupported);

    controller.dispatch(Intent::Start);
    assert_eq!(controller.session().state, SessionState::Unsupported);
    assert!(!controller.is_timer_running());
    assert_eq!(
        controller.snapshot().fault,
        Some(SessionFault::CapabilityUnsupported(
            "no input device available".to_string()
        ))
    );
}

#[tokio::test]
async fn test_start_stop_sequences_settle_on_last_intent() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());

    let script = [
        Intent::Start,
        Intent::Start,
        Intent::Stop,
        Intent::Stop,
        Intent::Start,
        Intent::Stop,
        Intent::Start,
        Intent::Start,
    ];
    for intent in script {
        let expected = if intent == Intent::Start {
            SessionState::Listening
        } else {
            SessionState::Idle
        };
        controller.dispatch(intent);
        assert_eq!(controller.session().state, expected);
        assert_eq!(controller.is_timer_running(), expected == SessionState::Listening);
        assert_eq!(controller.is_recognition_active(), expected == SessionState::Listening);
    }

    // repeated starts while listening are no-ops
    assert_eq!(recognizer.activation_count(), 3);
    assert!(recognizer.activation(0).aborted);
    assert!(recognizer.activation(1).aborted);
    assert!(!recognizer.activation(2).aborted);
}

#[tokio::test]
async fn test_stopped_activation_events_are_dropped() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::Start);
    let sink = recognizer.last_sink();
    controller.dispatch(Intent::Stop);

    sink.result("too late", 0.8);
    sink.end();
    assert_eq!(controller.drain(), 2);

    assert_eq!(controller.session().state, SessionState::Idle);
    assert!(controller.session().original_text.is_empty());
}

#[tokio::test]
async fn test_source_reconfigure_while_listening_drops_stale_result() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::Start);
    let stale = recognizer.last_sink();
    let before = controller.bound_generation();

    controller.dispatch(Intent::SetSourceLanguage(tag("fr-FR")));

    assert!(recognizer.activation(0).aborted);
    assert_eq!(recognizer.activation_count(), 2);
    assert_eq!(recognizer.activation(1).language.as_str(), "fr-FR");
    assert_eq!(recognizer.configured_languages(), vec!["en-US", "fr-FR"]);
    assert!(controller.bound_generation() > before);
    assert_eq!(controller.session().state, SessionState::Listening);
    assert!(controller.is_timer_running());

    stale.result("hello", 0.99);
    stale.end();
    controller.drain();

    let session = controller.session();
    assert!(session.original_text.is_empty());
    assert_eq!(session.state, SessionState::Listening);
    assert!(controller.is_recognition_active());

    // the fresh activation is still live
    recognizer.last_sink().result("bonjour", 0.7);
    controller.pump().await;
    assert_eq!(controller.session().original_text, "bonjour");
}

#[tokio::test]
async fn test_source_reconfigure_while_idle_rebinds_without_starting() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::SetSourceLanguage(tag("de-DE")));

    assert_eq!(controller.session().state, SessionState::Idle);
    assert_eq!(recognizer.configured_languages(), vec!["de-DE"]);
    assert_eq!(recognizer.activation_count(), 0);

    controller.dispatch(Intent::Start);
    assert_eq!(recognizer.activation(0).language.as_str(), "de-DE");
    assert_eq!(recognizer.configured_languages(), vec!["de-DE"]);
}

#[tokio::test]
async fn test_recognition_error_returns_to_idle() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::Start);
    let sink = recognizer.last_sink();
    sink.error("network");
    sink.end();
    controller.drain();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.state(), SessionState::Idle);
    assert_eq!(
        snapshot.fault,
        Some(SessionFault::Recognition("network".to_string()))
    );
    assert_eq!(snapshot.session.elapsed_seconds, 0);
    assert!(!controller.is_timer_running());
    assert!(!controller.is_recognition_active());

    // user may retry
    controller.dispatch(Intent::Start);
    assert_eq!(controller.session().state, SessionState::Listening);
    assert!(controller.snapshot().fault.is_none());
}

#[tokio::test]
async fn test_start_before_failed_activation_ends_restarts_capture() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::Start);
    let failed = recognizer.last_sink();
    failed.error("network");
    controller.pump().await;
    assert_eq!(controller.session().state, SessionState::Idle);

    controller.dispatch(Intent::Start);
    assert_eq!(controller.session().state, SessionState::Listening);
    assert!(controller.snapshot().fault.is_none());
    assert!(recognizer.activation(0).aborted);
    assert_eq!(recognizer.activation_count(), 2);

    // the failed activation's end belongs to an old generation
    failed.end();
    controller.pump().await;
    assert_eq!(controller.session().state, SessionState::Listening);
    assert!(controller.is_recognition_active());
    assert!(controller.is_timer_running());
}

#[tokio::test]
async fn test_bare_end_returns_to_idle() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::Start);
    recognizer.last_sink().end();
    controller.pump().await;

    assert_eq!(controller.session().state, SessionState::Idle);
    assert!(!controller.is_timer_running());
    assert!(controller.snapshot().fault.is_none());
}

#[tokio::test]
async fn test_start_failure_enters_error_then_recovers() {
    let recognizer = ScriptedRecognizer::new();
    recognizer.fail_starts(true);
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::Start);
    assert_eq!(controller.session().state, SessionState::Error);
    assert!(matches!(
        controller.snapshot().fault,
        Some(SessionFault::StartFailed(_))
    ));
    assert!(!controller.is_timer_running());

    recognizer.fail_starts(false);
    controller.dispatch(Intent::Start);
    assert_eq!(controller.session().state, SessionState::Listening);
}

#[tokio::test]
async fn test_translation_failure_uses_fallback() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FailingTranslator);
    controller.set_capability(recognizer.capability());

    complete_cycle(&mut controller, &recognizer, "hello").await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.session.translated_text, "Hola, ¿cómo estás?");
    assert!(snapshot.was_fallback);
    assert_eq!(snapshot.history.len(), 1);
}

#[tokio::test]
async fn test_swap_in_ready_exchanges_languages_and_texts() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("es-ES", "en-US", FixedTranslator("hello".to_string()));
    controller.set_capability(recognizer.capability());

    complete_cycle(&mut controller, &recognizer, "hola").await;
    controller.dispatch(Intent::SwapLanguages);

    let session = controller.session();
    assert_eq!(session.state, SessionState::Ready);
    assert_eq!(session.source_language.as_str(), "en-US");
    assert_eq!(session.target_language.as_str(), "es-ES");
    assert_eq!(session.original_text, "hello");
    assert_eq!(session.translated_text, "hola");
    assert_eq!(recognizer.configured_languages(), vec!["es-ES", "en-US"]);
}

#[tokio::test]
async fn test_swap_without_texts_only_exchanges_languages() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "ja-JP", FixedTranslator("x".to_string()));
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::SwapLanguages);

    let session = controller.session();
    assert_eq!(session.state, SessionState::Idle);
    assert_eq!(session.source_language.as_str(), "ja-JP");
    assert_eq!(session.target_language.as_str(), "en-US");
    assert!(session.original_text.is_empty());
}

#[tokio::test]
async fn test_target_change_does_not_touch_recognizer() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("bonjour".to_string()));
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::Start);
    controller.dispatch(Intent::SetTargetLanguage(tag("fr-FR")));

    assert_eq!(controller.session().state, SessionState::Listening);
    assert_eq!(recognizer.activation_count(), 1);
    assert!(!recognizer.activation(0).aborted);
    assert_eq!(controller.session().target_language.as_str(), "fr-FR");
}

#[tokio::test]
async fn test_swap_while_translating_supersedes_translation() {
    let recognizer = ScriptedRecognizer::new();
    let release = Arc::new(Notify::new());
    let mut controller = controller(
        "en-US",
        "es-ES",
        GatedTranslator {
            reply: "hola".to_string(),
            release: Arc::clone(&release),
        },
    );
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::Start);
    recognizer.last_sink().result("hello", 0.9);
    controller.pump().await;
    assert_eq!(controller.session().state, SessionState::Translating);

    controller.dispatch(Intent::SwapLanguages);
    let session = controller.session();
    assert_eq!(session.state, SessionState::Idle);
    assert_eq!(session.source_language.as_str(), "es-ES");
    assert_eq!(session.target_language.as_str(), "en-US");
    assert!(session.original_text.is_empty());

    release.notify_one();
    controller.pump().await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.state(), SessionState::Idle);
    assert!(snapshot.session.translated_text.is_empty());
    assert!(snapshot.history.is_empty());
}

#[tokio::test]
async fn test_target_change_while_translating_records_requested_pair() {
    let recognizer = ScriptedRecognizer::new();
    let release = Arc::new(Notify::new());
    let mut controller = controller(
        "en-US",
        "es-ES",
        GatedTranslator {
            reply: "hola".to_string(),
            release: Arc::clone(&release),
        },
    );
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::Start);
    recognizer.last_sink().result("hello", 0.9);
    controller.pump().await;
    assert_eq!(controller.session().state, SessionState::Translating);

    controller.dispatch(Intent::SetTargetLanguage(tag("fr-FR")));
    release.notify_one();
    while controller.session().state != SessionState::Ready {
        controller.pump().await;
    }

    let history = controller.snapshot().history;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].original_text, "hello");
    assert_eq!(history[0].translated_text, "hola");
    assert_eq!(history[0].source_language.as_str(), "en-US");
    assert_eq!(history[0].target_language.as_str(), "es-ES");
    assert_eq!(controller.session().target_language.as_str(), "fr-FR");
}

#[tokio::test]
async fn test_history_keeps_five_newest() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());

    for i in 1..=6 {
        complete_cycle(&mut controller, &recognizer, &format!("phrase {i}")).await;
    }

    let originals: Vec<_> = controller
        .history()
        .entries()
        .map(|e| e.original_text.clone())
        .collect();
    assert_eq!(
        originals,
        vec!["phrase 6", "phrase 5", "phrase 4", "phrase 3", "phrase 2"]
    );
}

#[tokio::test]
async fn test_reset_clears_everything() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());

    complete_cycle(&mut controller, &recognizer, "hello").await;
    controller.dispatch(Intent::Reset);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.state(), SessionState::Idle);
    assert!(snapshot.session.original_text.is_empty());
    assert!(snapshot.session.translated_text.is_empty());
    assert!(snapshot.session.confidence.is_none());
    assert!(snapshot.history.is_empty());
}

#[tokio::test]
async fn test_translation_after_reset_is_discarded() {
    let recognizer = ScriptedRecognizer::new();
    let release = Arc::new(Notify::new());
    let mut controller = controller(
        "en-US",
        "es-ES",
        GatedTranslator {
            reply: "hola".to_string(),
            release: Arc::clone(&release),
        },
    );
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::Start);
    recognizer.last_sink().result("hello", 0.9);
    controller.pump().await;
    assert_eq!(controller.session().state, SessionState::Translating);

    controller.dispatch(Intent::Reset);
    release.notify_one();
    controller.pump().await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.state(), SessionState::Idle);
    assert!(snapshot.session.translated_text.is_empty());
    assert!(snapshot.history.is_empty());
}

#[tokio::test]
async fn test_stop_in_ready_returns_to_idle() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());

    complete_cycle(&mut controller, &recognizer, "hello").await;
    controller.dispatch(Intent::Stop);

    assert_eq!(controller.session().state, SessionState::Idle);
    assert_eq!(controller.history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timer_counts_while_listening_only() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::Start);
    tokio::time::sleep(Duration::from_millis(2500)).await;
    controller.drain();
    assert_eq!(controller.session().elapsed_seconds, 2);

    recognizer.last_sink().result("hello", 0.5);
    controller.pump().await;
    assert!(!controller.is_timer_running());

    tokio::time::sleep(Duration::from_secs(3)).await;
    controller.drain();
    assert_ne!(controller.session().state, SessionState::Listening);
    assert_eq!(controller.session().elapsed_seconds, 2);
}

#[tokio::test(start_paused = true)]
async fn test_end_after_result_keeps_recorded_duration() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::Start);
    tokio::time::sleep(Duration::from_millis(2500)).await;
    controller.drain();
    assert_eq!(controller.session().elapsed_seconds, 2);

    let sink = recognizer.last_sink();
    sink.result("hello", 0.8);
    sink.end();
    while controller.session().state != SessionState::Ready {
        controller.pump().await;
    }

    assert!(!controller.is_recognition_active());
    assert_eq!(controller.session().elapsed_seconds, 2);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_reconfigure_resets_elapsed() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::Start);
    tokio::time::sleep(Duration::from_millis(3100)).await;
    controller.drain();
    assert_eq!(controller.session().elapsed_seconds, 3);

    controller.dispatch(Intent::SetSourceLanguage(tag("it-IT")));
    assert_eq!(controller.session().elapsed_seconds, 0);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    controller.drain();
    assert_eq!(controller.session().elapsed_seconds, 1);
}

#[tokio::test(start_paused = true)]
async fn test_simulated_playback_and_busy_rejection() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());

    controller.dispatch(Intent::Play);
    assert_eq!(controller.session().state, SessionState::Idle);

    complete_cycle(&mut controller, &recognizer, "hello").await;

    controller.dispatch(Intent::Play);
    assert_eq!(controller.session().state, SessionState::Speaking);

    controller.dispatch(Intent::Play);
    assert_eq!(controller.session().state, SessionState::Speaking);
    assert_eq!(controller.snapshot().fault, Some(SessionFault::PlaybackBusy));

    controller.pump().await;
    assert_eq!(controller.session().state, SessionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_playback_uses_target_language_and_preferred_voice() {
    let recognizer = ScriptedRecognizer::new();
    let synth = RecordingSynthesizer {
        duration: Duration::from_millis(500),
        ..Default::default()
    };
    let playback = PlaybackController::new(
        Some(Arc::new(synth.clone())),
        PlaybackSettings::default(),
    );
    let mut controller = controller_with_playback(
        "en-US",
        "es-ES",
        FixedTranslator("hola".to_string()),
        playback,
    );
    controller.set_capability(recognizer.capability());

    complete_cycle(&mut controller, &recognizer, "hello").await;
    controller.dispatch(Intent::Play);
    controller.pump().await;

    assert_eq!(controller.session().state, SessionState::Ready);
    let spoken = synth.spoken.lock().unwrap();
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].text, "hola");
    assert_eq!(spoken[0].language.as_str(), "es-ES");
    assert_eq!(spoken[0].voice.as_deref(), Some("nova"));
    assert!((spoken[0].rate - 0.8).abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_snapshots_are_published() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());
    let mut view = controller.subscribe();
    view.borrow_and_update();

    controller.dispatch(Intent::Start);

    assert!(view.has_changed().unwrap());
    assert_eq!(view.borrow_and_update().state(), SessionState::Listening);
}

#[tokio::test]
async fn test_run_loop_processes_intents_until_closed() {
    let recognizer = ScriptedRecognizer::new();
    let mut controller = controller("en-US", "es-ES", FixedTranslator("hola".to_string()));
    controller.set_capability(recognizer.capability());
    let mut view = controller.subscribe();

    let (intents, rx) = tokio::sync::mpsc::channel(4);
    let task = tokio::spawn(controller.run(rx));

    intents.send(Intent::Start).await.unwrap();
    view.wait_for(|s| s.state() == SessionState::Listening)
        .await
        .unwrap();

    let sink = recognizer.last_sink();
    sink.result("hello", 0.8);
    sink.end();
    let ready = view
        .wait_for(|s| s.state() == SessionState::Ready)
        .await
        .unwrap()
        .clone();
    assert_eq!(ready.session.translated_text, "hola");

    drop(intents);
    task.await.unwrap();
}
