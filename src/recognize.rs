//! Live recognition session
//!
//! Classifies two-hand frames into letters and grows a transcript under a
//! debounce policy: a prediction is only attempted once the cooldown has
//! elapsed since the last acceptance, and a prediction equal to the
//! immediately preceding accepted letter is dropped. The same letter
//! re-appearing after a different one is accepted again, since equality is
//! checked only against the last accepted letter, never the whole
//! transcript.
//!
//! The pure [`RecognitionController`] holds transcript state and the
//! debounce decision; [`RecognitionSession`] runs a capture thread that
//! publishes frames through a bounded hand-off channel to the recognition
//! loop, so camera cadence is decoupled from classification time while
//! frames are still processed strictly in arrival order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::alphabet::Alphabet;
use crate::capture::{FrameSource, LatestFrame};
use crate::classifier::Predictor;
use crate::features::{build_features, FeatureError};
use crate::landmarks::{HandLandmarkSet, LandmarkExtractor};

/// Letter shown when the classifier returns an index outside the label map
const UNKNOWN_LETTER: &str = "?";

/// Control signals for a recognition session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognizeCommand {
    /// Append a space to the transcript, unconditionally
    Space,
    /// End the session and release the camera
    Stop,
}

/// Events emitted by a recognition session
#[derive(Debug, Clone)]
pub enum RecognizeEvent {
    /// A letter passed the debounce policy and joined the transcript
    LetterAccepted { letter: String, transcript: String },
    /// A space was appended
    SpaceAppended { transcript: String },
    /// The session stopped; the transcript is frozen at this value
    Stopped { transcript: String },
}

/// The debounced transcript state machine.
///
/// All accumulators (transcript, last accepted letter, last acceptance
/// time) live here and change only through the defined operations.
pub struct RecognitionController {
    model: Box<dyn Predictor>,
    alphabet: Alphabet,
    cooldown: Duration,
    transcript: String,
    last_letter: Option<String>,
    last_accepted_at: Instant,
}

impl RecognitionController {
    /// Create a controller with a fresh transcript. The cooldown clock
    /// starts at `now`: the first prediction is attempted one full
    /// cooldown after the session begins.
    pub fn new(
        model: Box<dyn Predictor>,
        alphabet: Alphabet,
        cooldown: Duration,
        now: Instant,
    ) -> Self {
        Self {
            model,
            alphabet,
            cooldown,
            transcript: String::new(),
            last_letter: None,
            last_accepted_at: now,
        }
    }

    /// Reset transcript, last letter, and the acceptance clock.
    pub fn start(&mut self, now: Instant) {
        self.transcript.clear();
        self.last_letter = None;
        self.last_accepted_at = now;
        tracing::info!("Recognition started");
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn last_letter(&self) -> Option<&str> {
        self.last_letter.as_deref()
    }

    /// Offer one frame's landmark sets at time `now`.
    ///
    /// Returns the accepted letter, if any. Frames with fewer than two
    /// hands or a malformed landmark set neither confirm nor reset state:
    /// no classification is attempted and the last accepted letter is
    /// unchanged.
    pub fn on_frame(&mut self, hands: &[HandLandmarkSet], now: Instant) -> Option<String> {
        let features = match build_features(hands) {
            Ok(features) => features,
            Err(FeatureError::NotEnoughHands { .. }) => return None,
            Err(e @ FeatureError::InvalidLandmarkSet { .. }) => {
                // Detector contract violation; the frame still cannot be
                // classified, so it is dropped like any other bad frame.
                tracing::warn!("Skipping frame: {}", e);
                return None;
            }
        };

        if now.duration_since(self.last_accepted_at) < self.cooldown {
            return None;
        }

        let label = self.model.predict(&features);
        let letter = self
            .alphabet
            .letter(label)
            .unwrap_or(UNKNOWN_LETTER)
            .to_string();

        if self.last_letter.as_deref() == Some(letter.as_str()) {
            // Sustained identical gesture across cooldown windows: the
            // acceptance clock is deliberately left alone, so a different
            // letter is accepted the moment it appears.
            return None;
        }

        self.transcript.push_str(&letter);
        self.last_letter = Some(letter.clone());
        self.last_accepted_at = now;
        tracing::info!("Accepted \"{}\" (transcript: {})", letter, self.transcript);
        Some(letter)
    }

    /// Append one space, independent of cooldown or hand state.
    pub fn on_space(&mut self) {
        self.transcript.push(' ');
    }
}

/// Handle to a running recognition session.
pub struct RecognitionSession {
    commands: Sender<RecognizeCommand>,
    events: Receiver<RecognizeEvent>,
    latest: LatestFrame,
    handle: Option<JoinHandle<Result<String>>>,
}

impl RecognitionSession {
    /// Spawn the capture and recognition loops.
    ///
    /// The capture thread reads frames from the source and hands them to
    /// the recognition loop through a bounded channel; a slow
    /// classification applies back-pressure rather than stalling anything
    /// else. Frames are processed strictly in arrival order.
    pub fn spawn(
        source: Box<dyn FrameSource>,
        extractor: LandmarkExtractor,
        mut controller: RecognitionController,
    ) -> Self {
        let (command_tx, command_rx) = bounded::<RecognizeCommand>(8);
        let (event_tx, event_rx) = bounded::<RecognizeEvent>(64);
        let (frame_tx, frame_rx) = bounded(4);
        let latest = LatestFrame::new();

        let stop = Arc::new(AtomicBool::new(false));
        let capture_stop = stop.clone();
        let capture_latest = latest.clone();

        let capture_handle = std::thread::spawn(move || {
            let mut source = source;
            while !capture_stop.load(Ordering::SeqCst) {
                match source.read_frame() {
                    Ok(frame) => {
                        capture_latest.publish(frame.clone());
                        if frame_tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        // Transient read failure: try again next iteration.
                        tracing::debug!("Frame read failed: {}", e);
                    }
                }
            }
            // Source drops here: the camera is released exactly once.
            tracing::info!("Camera released, capture loop exiting");
        });

        let handle = std::thread::spawn(move || {
            let mut extractor = extractor;
            controller.start(Instant::now());
            let transcript = run_recognition(
                &mut controller,
                &mut extractor,
                command_rx,
                frame_rx,
                event_tx,
            );
            stop.store(true, Ordering::SeqCst);
            let _ = capture_handle.join();
            Ok(transcript)
        });

        tracing::info!("Recognition session started");
        Self {
            commands: command_tx,
            events: event_rx,
            latest,
            handle: Some(handle),
        }
    }

    /// Signal: append a space to the transcript.
    pub fn space(&self) {
        let _ = self.commands.send(RecognizeCommand::Space);
    }

    /// Signal: end the session.
    pub fn stop(&self) {
        let _ = self.commands.send(RecognizeCommand::Stop);
    }

    /// Receiver for session events. Clone to consume from another thread.
    pub fn events(&self) -> Receiver<RecognizeEvent> {
        self.events.clone()
    }

    /// Shared latest-frame slot for a preview renderer.
    pub fn latest_frame(&self) -> LatestFrame {
        self.latest.clone()
    }

    /// Wait for the session to end and return the frozen transcript.
    pub fn join(mut self) -> Result<String> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow::anyhow!("recognition thread panicked"))?,
            None => Ok(String::new()),
        }
    }
}

fn run_recognition(
    controller: &mut RecognitionController,
    extractor: &mut LandmarkExtractor,
    commands: Receiver<RecognizeCommand>,
    frames: Receiver<crate::capture::Frame>,
    events: Sender<RecognizeEvent>,
) -> String {
    loop {
        crossbeam_channel::select! {
            recv(commands) -> command => match command {
                Ok(RecognizeCommand::Space) => {
                    controller.on_space();
                    let _ = events.send(RecognizeEvent::SpaceAppended {
                        transcript: controller.transcript().to_string(),
                    });
                }
                Ok(RecognizeCommand::Stop) | Err(_) => break,
            },
            recv(frames) -> frame => match frame {
                Ok(frame) => {
                    let hands = extractor.extract(&frame);
                    if let Some(letter) = controller.on_frame(&hands, Instant::now()) {
                        let _ = events.send(RecognizeEvent::LetterAccepted {
                            letter,
                            transcript: controller.transcript().to_string(),
                        });
                    }
                }
                Err(_) => break,
            },
        }
    }

    let transcript = controller.transcript().to_string();
    let _ = events.send(RecognizeEvent::Stopped {
        transcript: transcript.clone(),
    });
    tracing::info!("Recognition stopped, transcript frozen");
    transcript
}
