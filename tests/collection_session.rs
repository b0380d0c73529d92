//! Collection session integration tests.
//!
//! Drives the threaded collection session end to end with a scripted
//! frame source and detector, checking the control-signal handshake, the
//! on-disk dataset layout, and the label map written at session start.

use std::time::Duration;

use mudra::alphabet::Alphabet;
use mudra::capture::{CaptureError, Frame, FrameSource};
use mudra::collect::{CollectEvent, CollectionSession};
use mudra::dataset::{load_label_map, DataPaths};
use mudra::landmarks::{
    DetectorConfig, HandDetector, HandLandmarkSet, LandmarkExtractor, LandmarkPoint,
    LANDMARKS_PER_HAND,
};
use tempfile::tempdir;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Frame source replaying a fixed script of frames, then reporting
/// transient read failures.
struct ScriptedCamera {
    frames: std::vec::IntoIter<Frame>,
}

impl ScriptedCamera {
    fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }
}

impl FrameSource for ScriptedCamera {
    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        match self.frames.next() {
            Some(frame) => Ok(frame),
            None => {
                // Pace the retry loop once the script runs dry.
                std::thread::sleep(Duration::from_millis(5));
                Err(CaptureError::ReadFailed("script exhausted".into()))
            }
        }
    }
}

/// Detector keyed on the frame's first pixel: even values show two hands,
/// odd values one.
struct PixelKeyedDetector;

impl HandDetector for PixelKeyedDetector {
    fn detect(&mut self, frame: &Frame) -> Vec<HandLandmarkSet> {
        let hands = if frame.data().first().map(|v| v % 2 == 0).unwrap_or(false) {
            2
        } else {
            1
        };
        (0..hands)
            .map(|h| {
                HandLandmarkSet::new(
                    (0..LANDMARKS_PER_HAND)
                        .map(|i| {
                            LandmarkPoint::new(0.1 + h as f32 * 0.4 + i as f32 * 0.01, 0.2)
                        })
                        .collect(),
                )
            })
            .collect()
    }
}

fn frame(value: u8) -> Frame {
    Frame::rgb8(4, 4, vec![value; 4 * 4 * 3])
}

fn extractor() -> LandmarkExtractor {
    LandmarkExtractor::new(Box::new(PixelKeyedDetector), DetectorConfig::for_collection())
}

#[test]
fn collects_qualifying_frames_and_honours_skip() {
    let dir = tempdir().unwrap();
    let paths = DataPaths::new(dir.path());
    let alphabet = Alphabet::new(vec!["आ".to_string(), "र".to_string()]);

    // Letter 0 consumes [2-hand, 1-hand, 2-hand]: two samples, completion
    // on the second qualifying frame. Letter 1 is skipped before any frame.
    let camera = ScriptedCamera::new(vec![frame(2), frame(3), frame(4)]);

    let session =
        CollectionSession::spawn(Box::new(camera), extractor(), &paths, alphabet.clone(), 2)
            .unwrap();
    let events = session.events();

    let mut stored = Vec::new();
    let mut completed = Vec::new();
    let mut skipped = Vec::new();

    loop {
        match events.recv_timeout(EVENT_TIMEOUT).expect("session stalled") {
            CollectEvent::LetterReady { letter, .. } => {
                if letter == "आ" {
                    session.start_letter();
                } else {
                    // Start, then abandon before any qualifying frame.
                    session.start_letter();
                    session.skip_letter();
                }
            }
            CollectEvent::SampleStored {
                letter, collected, ..
            } => stored.push((letter, collected)),
            CollectEvent::LetterCompleted { letter } => completed.push(letter),
            CollectEvent::LetterSkipped { letter, collected } => {
                skipped.push((letter, collected))
            }
            CollectEvent::SessionFinished => break,
        }
    }

    session.join().unwrap();

    assert_eq!(
        stored,
        vec![("आ".to_string(), 1), ("आ".to_string(), 2)]
    );
    assert_eq!(completed, vec!["आ".to_string()]);
    assert_eq!(skipped, vec![("र".to_string(), 0)]);

    // On-disk layout: dataset/<label>/<sample>.png
    assert!(paths.dataset_dir().join("0").join("0.png").is_file());
    assert!(paths.dataset_dir().join("0").join("1.png").is_file());
    assert!(!paths.dataset_dir().join("1").exists());
}

#[test]
fn label_map_is_written_at_session_start() {
    let dir = tempdir().unwrap();
    let paths = DataPaths::new(dir.path());
    let alphabet = Alphabet::default();

    let camera = ScriptedCamera::new(Vec::new());
    let session =
        CollectionSession::spawn(Box::new(camera), extractor(), &paths, alphabet.clone(), 1)
            .unwrap();

    // The map exists before a single sample has been collected.
    let persisted = load_label_map(&paths.label_map_file()).unwrap();
    assert_eq!(persisted, alphabet);

    // Walk the whole session by skipping every letter after starting it.
    let events = session.events();
    loop {
        match events.recv_timeout(EVENT_TIMEOUT).expect("session stalled") {
            CollectEvent::LetterReady { .. } => {
                session.start_letter();
                session.skip_letter();
            }
            CollectEvent::SessionFinished => break,
            _ => {}
        }
    }
    session.join().unwrap();
}

#[test]
fn read_failures_do_not_disturb_collection() {
    let dir = tempdir().unwrap();
    let paths = DataPaths::new(dir.path());
    let alphabet = Alphabet::new(vec!["आ".to_string()]);

    // Two of every three reads fail; the counter must still reach the
    // target untouched by the failures in between.
    struct FlakyCamera {
        reads: usize,
    }

    impl FrameSource for FlakyCamera {
        fn read_frame(&mut self) -> Result<Frame, CaptureError> {
            self.reads += 1;
            // Fail two of every three reads.
            if self.reads % 3 == 0 {
                Ok(Frame::rgb8(4, 4, vec![2; 48]))
            } else {
                Err(CaptureError::ReadFailed("flaky".into()))
            }
        }
    }

    let session = CollectionSession::spawn(
        Box::new(FlakyCamera { reads: 0 }),
        extractor(),
        &paths,
        alphabet,
        2,
    )
    .unwrap();

    let events = session.events();
    let mut samples = 0;
    loop {
        match events.recv_timeout(EVENT_TIMEOUT).expect("session stalled") {
            CollectEvent::LetterReady { .. } => session.start_letter(),
            CollectEvent::SampleStored { .. } => samples += 1,
            CollectEvent::SessionFinished => break,
            _ => {}
        }
    }
    session.join().unwrap();

    assert_eq!(samples, 2);
    assert!(paths.dataset_dir().join("0").join("1.png").is_file());
}
