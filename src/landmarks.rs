//! Hand landmark extraction boundary
//!
//! Wraps an external hand-landmark detector behind the [`HandDetector`]
//! trait. The detector's internal algorithm is out of scope here; this
//! module only fixes the shape of its output (ordered sets of 21 points
//! per hand) and the per-stage detection configuration.

use serde::{Deserialize, Serialize};

use crate::capture::Frame;

/// Number of landmarks the detector reports per hand.
pub const LANDMARKS_PER_HAND: usize = 21;

/// A detector-reported 2D keypoint, normalised to [0, 1] in both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
}

impl LandmarkPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Ordered landmark set for one detected hand.
///
/// The point order within a hand is detector-defined and stable across
/// frames for the same hand, but carries no canonical left/right meaning
/// across different hands. Point count is validated downstream by the
/// feature builder, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarkSet {
    points: Vec<LandmarkPoint>,
}

impl HandLandmarkSet {
    pub fn new(points: Vec<LandmarkPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[LandmarkPoint] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &LandmarkPoint> {
        self.points.iter()
    }
}

/// Detection configuration for one pipeline stage.
///
/// The confidence defaults mirror the tuning each stage uses: collection
/// tracks hands across frames with a strict detection threshold, while
/// preprocessing treats every stored image independently with a permissive
/// one so marginal samples still yield landmarks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Maximum hands reported per frame
    pub max_hands: usize,
    /// Minimum confidence for an initial detection
    pub min_detection_confidence: f32,
    /// Minimum confidence for tracking an already-detected hand
    pub min_tracking_confidence: f32,
    /// Treat each frame independently (no inter-frame tracking)
    pub static_images: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_hands: 2,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            static_images: false,
        }
    }
}

impl DetectorConfig {
    /// Configuration used while collecting live samples.
    pub fn for_collection() -> Self {
        Self {
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.5,
            ..Self::default()
        }
    }

    /// Configuration used when re-detecting landmarks in stored images.
    pub fn for_preprocessing() -> Self {
        Self {
            min_detection_confidence: 0.3,
            static_images: true,
            ..Self::default()
        }
    }

    /// Configuration used during live recognition.
    pub fn for_recognition() -> Self {
        Self {
            min_detection_confidence: 0.5,
            ..Self::default()
        }
    }
}

/// A hand-landmark detector backend.
///
/// Implementations turn one frame into zero or more hand landmark sets in
/// detector-reported order. Detector or frame failure is expressed as an
/// empty result, never an error: fewer than two hands is a normal, frequent
/// condition for every caller in this crate.
pub trait HandDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Vec<HandLandmarkSet>;
}

/// Extractor wrapping a detector backend with a stage configuration.
pub struct LandmarkExtractor {
    detector: Box<dyn HandDetector>,
    config: DetectorConfig,
}

impl LandmarkExtractor {
    pub fn new(detector: Box<dyn HandDetector>, config: DetectorConfig) -> Self {
        Self { detector, config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Extract landmark sets from a frame, capped at the configured maximum.
    pub fn extract(&mut self, frame: &Frame) -> Vec<HandLandmarkSet> {
        let mut hands = self.detector.detect(frame);
        if hands.len() > self.config.max_hands {
            tracing::debug!(
                "Detector reported {} hands, keeping first {}",
                hands.len(),
                self.config.max_hands
            );
            hands.truncate(self.config.max_hands);
        }
        hands
    }
}
