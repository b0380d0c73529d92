//! Dataset collection session
//!
//! A per-letter state machine gathers labelled raw frames for each letter
//! of the alphabet in order. The pure [`CollectionController`] holds all
//! transition logic; [`CollectionSession`] runs it on a background thread,
//! wiring the camera, the landmark extractor, and the sample store
//! together. Control signals (start, skip) arrive over a bounded channel
//! and are observed once per loop iteration; progress events leave the
//! same way. The latest captured frame is published to a shared slot for
//! display only.

use std::thread::JoinHandle;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use serde::{Deserialize, Serialize};

use crate::alphabet::Alphabet;
use crate::capture::{FrameSource, LatestFrame};
use crate::dataset::{save_label_map, DataPaths, SampleStore};
use crate::features::HANDS_REQUIRED;
use crate::landmarks::{HandLandmarkSet, LandmarkExtractor};

/// Per-letter collection state
///
/// Transitions are monotonic: Pending -> Collecting -> {Completed |
/// Skipped}; no state is revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LetterState {
    /// Waiting for the start signal
    #[default]
    Pending,
    /// Actively sampling frames
    Collecting,
    /// Abandoned early by the skip signal
    Skipped,
    /// Sample target reached
    Completed,
}

/// Progress record for one letter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LetterProgress {
    pub letter: String,
    pub state: LetterState,
    pub collected: usize,
}

/// Outcome of offering one frame to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Persist the raw frame under this label and per-letter index.
    Store {
        label: usize,
        sample_index: usize,
        /// The stored sample reached the target and completed the letter
        completed_letter: bool,
    },
    /// Not collecting, or fewer than two hands: silently ignored.
    Ignored,
}

/// Control signals for a collection session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectCommand {
    /// Begin collecting the current letter
    Start,
    /// Abandon the current letter early
    Skip,
}

/// Progress events emitted by a collection session
#[derive(Debug, Clone)]
pub enum CollectEvent {
    /// Waiting for the start signal for this letter
    LetterReady { letter: String, label: usize },
    /// One sample persisted
    SampleStored {
        letter: String,
        collected: usize,
        target: usize,
    },
    /// Target reached; moving on
    LetterCompleted { letter: String },
    /// Skip signal honoured; moving on
    LetterSkipped { letter: String, collected: usize },
    /// Every letter completed or skipped
    SessionFinished,
}

/// The per-letter collection state machine.
///
/// Owns the transcript of progress for every letter; mutated only through
/// its operations, never reached into from outside.
pub struct CollectionController {
    progress: Vec<LetterProgress>,
    target: usize,
    current: usize,
}

impl CollectionController {
    pub fn new(alphabet: &Alphabet, target: usize) -> Self {
        let progress = alphabet
            .iter()
            .map(|letter| LetterProgress {
                letter: letter.to_string(),
                state: LetterState::Pending,
                collected: 0,
            })
            .collect();
        Self {
            progress,
            target,
            current: 0,
        }
    }

    /// Label index of the letter currently being worked on.
    pub fn current_label(&self) -> Option<usize> {
        (self.current < self.progress.len()).then_some(self.current)
    }

    /// The letter currently being worked on.
    pub fn current_letter(&self) -> Option<&str> {
        self.progress.get(self.current).map(|p| p.letter.as_str())
    }

    /// State of the current letter.
    pub fn current_state(&self) -> Option<LetterState> {
        self.progress.get(self.current).map(|p| p.state)
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.progress.len()
    }

    pub fn progress(&self) -> &[LetterProgress] {
        &self.progress
    }

    /// Start signal: Pending -> Collecting for the current letter.
    /// No-op in any other state. Returns whether a transition occurred.
    pub fn on_start(&mut self) -> bool {
        let Some(entry) = self.progress.get_mut(self.current) else {
            return false;
        };
        if entry.state != LetterState::Pending {
            return false;
        }
        entry.state = LetterState::Collecting;
        tracing::info!("Collecting \"{}\"", entry.letter);
        true
    }

    /// Skip signal: Collecting -> Skipped immediately, abandoning further
    /// collection for this letter. Already-persisted samples stay on disk.
    /// No-op unless Collecting. Returns whether a transition occurred.
    pub fn on_skip(&mut self) -> bool {
        let Some(entry) = self.progress.get_mut(self.current) else {
            return false;
        };
        if entry.state != LetterState::Collecting {
            return false;
        }
        entry.state = LetterState::Skipped;
        tracing::info!(
            "Skipped \"{}\" after {} samples",
            entry.letter,
            entry.collected
        );
        self.advance();
        true
    }

    /// Offer one frame's landmark sets. Effective only while Collecting;
    /// exactly two hands qualify the frame as a sample. Reaching the target
    /// auto-completes the letter without a further signal.
    pub fn on_frame(&mut self, hands: &[HandLandmarkSet]) -> FrameOutcome {
        let Some(entry) = self.progress.get_mut(self.current) else {
            return FrameOutcome::Ignored;
        };
        if entry.state != LetterState::Collecting || hands.len() != HANDS_REQUIRED {
            return FrameOutcome::Ignored;
        }

        let label = self.current;
        let sample_index = entry.collected;
        entry.collected += 1;

        let completed = entry.collected >= self.target;
        if completed {
            entry.state = LetterState::Completed;
            tracing::info!("Completed \"{}\" ({} samples)", entry.letter, entry.collected);
            self.advance();
        }

        FrameOutcome::Store {
            label,
            sample_index,
            completed_letter: completed,
        }
    }

    fn advance(&mut self) {
        self.current += 1;
        if self.is_finished() {
            tracing::info!("Collection session finished");
        }
    }
}

/// Handle to a running collection session.
pub struct CollectionSession {
    commands: Sender<CollectCommand>,
    events: Receiver<CollectEvent>,
    latest: LatestFrame,
    handle: Option<JoinHandle<Result<()>>>,
}

impl CollectionSession {
    /// Spawn the collection loop on a background thread.
    ///
    /// Persists the label map first: the ordered letter list is written
    /// exactly once, at collection time, and read back by preprocessing
    /// and inference. The session owns the frame source; the camera is
    /// released when the loop ends.
    pub fn spawn(
        source: Box<dyn FrameSource>,
        extractor: LandmarkExtractor,
        paths: &DataPaths,
        alphabet: Alphabet,
        samples_per_letter: usize,
    ) -> Result<Self> {
        save_label_map(&alphabet, &paths.label_map_file())
            .context("failed to persist label map")?;

        let store = SampleStore::new(paths);
        let (command_tx, command_rx) = bounded(8);
        let (event_tx, event_rx) = bounded(64);
        let latest = LatestFrame::new();

        let loop_latest = latest.clone();
        let controller = CollectionController::new(&alphabet, samples_per_letter);
        let handle = std::thread::spawn(move || {
            run_collection(
                source,
                extractor,
                store,
                controller,
                command_rx,
                event_tx,
                loop_latest,
            )
        });

        tracing::info!("Collection session started");
        Ok(Self {
            commands: command_tx,
            events: event_rx,
            latest,
            handle: Some(handle),
        })
    }

    /// Signal: begin collecting the current letter.
    pub fn start_letter(&self) {
        let _ = self.commands.send(CollectCommand::Start);
    }

    /// Signal: abandon the current letter.
    pub fn skip_letter(&self) {
        let _ = self.commands.send(CollectCommand::Skip);
    }

    /// Receiver for progress events. Clone to consume from another thread.
    pub fn events(&self) -> Receiver<CollectEvent> {
        self.events.clone()
    }

    /// Shared latest-frame slot for a preview renderer.
    pub fn latest_frame(&self) -> LatestFrame {
        self.latest.clone()
    }

    /// Wait for the session to finish and surface any storage error.
    pub fn join(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow::anyhow!("collection thread panicked"))?,
            None => Ok(()),
        }
    }
}

fn run_collection(
    mut source: Box<dyn FrameSource>,
    mut extractor: LandmarkExtractor,
    store: SampleStore,
    mut controller: CollectionController,
    commands: Receiver<CollectCommand>,
    events: Sender<CollectEvent>,
    latest: LatestFrame,
) -> Result<()> {
    while !controller.is_finished() {
        let letter = controller
            .current_letter()
            .unwrap_or_default()
            .to_string();
        let label = controller.current_label().unwrap_or_default();

        let _ = events.send(CollectEvent::LetterReady {
            letter: letter.clone(),
            label,
        });

        // Block until the start signal. There is no timeout: the session
        // waits indefinitely for the operator. A skip signal while still
        // Pending is a no-op.
        loop {
            match commands.recv() {
                Ok(CollectCommand::Start) => {
                    controller.on_start();
                    break;
                }
                Ok(CollectCommand::Skip) => continue,
                // Handle dropped: abandon the session cleanly.
                Err(_) => return Ok(()),
            }
        }

        // Sampling loop for this letter. Signals are observed once per
        // iteration, never preemptively; a frame in flight completes
        // before a skip takes effect.
        while controller.current_state() == Some(LetterState::Collecting) {
            match commands.try_recv() {
                Ok(CollectCommand::Skip) => {
                    let collected = controller
                        .progress()
                        .get(label)
                        .map(|p| p.collected)
                        .unwrap_or_default();
                    controller.on_skip();
                    let _ = events.send(CollectEvent::LetterSkipped {
                        letter: letter.clone(),
                        collected,
                    });
                    break;
                }
                Ok(CollectCommand::Start) => {}
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => return Ok(()),
            }

            let frame = match source.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    // Transient: nothing changes, try again next iteration.
                    tracing::debug!("Frame read failed: {}", e);
                    continue;
                }
            };

            latest.publish(frame.clone());
            let hands = extractor.extract(&frame);

            match controller.on_frame(&hands) {
                FrameOutcome::Store {
                    label,
                    sample_index,
                    completed_letter,
                } => {
                    store
                        .write_sample(label, sample_index, &frame)
                        .with_context(|| format!("failed to store sample for \"{letter}\""))?;
                    let _ = events.send(CollectEvent::SampleStored {
                        letter: letter.clone(),
                        collected: sample_index + 1,
                        target: controller.target(),
                    });
                    if completed_letter {
                        let _ = events.send(CollectEvent::LetterCompleted {
                            letter: letter.clone(),
                        });
                    }
                }
                FrameOutcome::Ignored => {}
            }
        }
    }

    let _ = events.send(CollectEvent::SessionFinished);
    // The frame source drops here: the camera is released exactly once,
    // on the terminal transition.
    tracing::info!("Camera released, collection loop exiting");
    Ok(())
}
