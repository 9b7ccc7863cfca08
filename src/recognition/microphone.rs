//! Microphone-backed recognizer
//!
//! Each activation runs on its own OS thread: the thread owns the cpal stream,
//! segments one utterance, transcribes it, and reports through the sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;
use std::time::Duration;

use super::capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
use super::segmenter::{SegmentProgress, SegmenterSettings, UtteranceSegmenter};
use super::stt::Transcriber;
use super::{RecognitionHandle, RecognitionSink, Recognizer};
use crate::language::LanguageTag;
use crate::{Error, Result};

/// How often the capture thread drains the input buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const RUNNING: u8 = 0;
const STOPPING: u8 = 1;
const ABORTING: u8 = 2;

/// Recognition capability built on the default microphone and a
/// Whisper-compatible transcription service
#[derive(Debug, Clone)]
pub struct MicrophoneRecognizer {
    transcriber: Transcriber,
    settings: SegmenterSettings,
}

impl MicrophoneRecognizer {
    /// Create a recognizer
    #[must_use]
    pub const fn new(transcriber: Transcriber, settings: SegmenterSettings) -> Self {
        Self {
            transcriber,
            settings,
        }
    }
}

impl Recognizer for MicrophoneRecognizer {
    fn configure(&self, language: &LanguageTag) -> Result<Box<dyn RecognitionHandle>> {
        Ok(Box::new(MicrophoneHandle {
            language: language.base_code().to_string(),
            transcriber: self.transcriber.clone(),
            settings: self.settings,
            control: None,
        }))
    }
}

/// One language-bound microphone recognizer
struct MicrophoneHandle {
    language: String,
    transcriber: Transcriber,
    settings: SegmenterSettings,
    control: Option<Arc<AtomicU8>>,
}

impl RecognitionHandle for MicrophoneHandle {
    fn start(&mut self, sink: RecognitionSink) -> Result<()> {
        let control = Arc::new(AtomicU8::new(RUNNING));
        let job = CaptureJob {
            language: self.language.clone(),
            transcriber: self.transcriber.clone(),
            settings: self.settings,
            control: Arc::clone(&control),
            sink,
        };

        thread::Builder::new()
            .name(format!("voxlate-capture-{}", job.sink.generation()))
            .spawn(move || job.run())
            .map_err(|e| Error::Recognition(format!("failed to spawn capture thread: {e}")))?;

        self.control = Some(control);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(control) = self.control.take() {
            let _ = control.compare_exchange(RUNNING, STOPPING, Ordering::SeqCst, Ordering::SeqCst);
        }
    }

    fn abort(&mut self) {
        if let Some(control) = self.control.take() {
            control.store(ABORTING, Ordering::SeqCst);
        }
    }
}

impl Drop for MicrophoneHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

struct CaptureJob {
    language: String,
    transcriber: Transcriber,
    settings: SegmenterSettings,
    control: Arc<AtomicU8>,
    sink: RecognitionSink,
}

impl CaptureJob {
    fn run(self) {
        if let Some(speech) = self.capture() {
            self.recognize(&speech);
        }
        self.sink.end();
    }

    fn aborted(&self) -> bool {
        self.control.load(Ordering::SeqCst) == ABORTING
    }

    /// Capture one utterance; `None` means nothing to recognize
    fn capture(&self) -> Option<Vec<f32>> {
        let mut capture = match AudioCapture::open().and_then(|mut c| c.start().map(|()| c)) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "failed to open microphone");
                self.sink.error("audio-capture");
                return None;
            }
        };

        let mut segmenter = UtteranceSegmenter::new(self.settings);
        loop {
            thread::sleep(POLL_INTERVAL);

            match self.control.load(Ordering::SeqCst) {
                ABORTING => {
                    capture.stop();
                    return None;
                }
                STOPPING => break,
                _ => {}
            }

            match segmenter.push(&capture.take_buffer()) {
                SegmentProgress::Complete => break,
                SegmentProgress::NoSpeech => {
                    capture.stop();
                    return None;
                }
                SegmentProgress::Waiting | SegmentProgress::Capturing => {}
            }
        }

        capture.stop();
        // pick up anything that arrived between the last poll and the stop
        let _ = segmenter.push(&capture.take_buffer());

        if !segmenter.heard_speech() {
            return None;
        }
        Some(segmenter.take_speech())
    }

    fn recognize(&self, speech: &[f32]) {
        let transcript = samples_to_wav(speech, SAMPLE_RATE)
            .and_then(|wav| self.transcriber.transcribe(&wav, &self.language));

        if self.aborted() {
            tracing::debug!("discarding transcription of aborted capture");
            return;
        }

        match transcript {
            Ok(t) if !t.text.is_empty() => self.sink.result(t.text, t.confidence),
            Ok(_) => tracing::debug!("transcription was empty"),
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed");
                self.sink.error("network");
            }
        }
    }
}
