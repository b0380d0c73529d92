//! Feature vector construction
//!
//! Turns exactly two hand landmark sets into the fixed 84-value encoding
//! shared by collection, preprocessing, training, and inference. The
//! normalisation is a pure translation: every coordinate is offset by the
//! minimum over all 42 points on its axis. No scale or rotation correction
//! is applied.
//!
//! Known limitation: the detector guarantees no canonical left/right
//! ordering, so the same physical gesture with hands reported in reversed
//! order yields a different vector. The behaviour is reproduced as-is;
//! hands are concatenated in detector-reported order.

use serde::{Deserialize, Serialize};

use crate::landmarks::{HandLandmarkSet, LANDMARKS_PER_HAND};

/// Hands required per feature vector.
pub const HANDS_REQUIRED: usize = 2;

/// Fixed feature vector length: 2 hands x 21 points x (x, y).
pub const FEATURE_LEN: usize = HANDS_REQUIRED * LANDMARKS_PER_HAND * 2;

/// The fixed-length numeric encoding of both hands for one frame.
///
/// A `FeatureVector` always has length [`FEATURE_LEN`]; the only way to
/// construct one is [`build_features`], which enforces the invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// Errors from feature construction
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeatureError {
    /// Fewer than two hands in the frame. A normal, frequent condition:
    /// callers skip the frame rather than surfacing this to the user.
    #[error("expected {HANDS_REQUIRED} hands, found {found}")]
    NotEnoughHands { found: usize },

    /// A hand set with the wrong point count. Indicates a detector
    /// contract violation, not absence of a hand.
    #[error("invalid landmark set: expected {expected} points, got {actual}")]
    InvalidLandmarkSet { expected: usize, actual: usize },
}

/// Build the 84-value feature vector from exactly two hand landmark sets.
///
/// Output arrangement: hands in input order, points in detector order,
/// `(x_offset, y_offset)` pairs per point.
pub fn build_features(hands: &[HandLandmarkSet]) -> Result<FeatureVector, FeatureError> {
    if hands.len() != HANDS_REQUIRED {
        return Err(FeatureError::NotEnoughHands { found: hands.len() });
    }

    for hand in hands {
        if hand.len() != LANDMARKS_PER_HAND {
            return Err(FeatureError::InvalidLandmarkSet {
                expected: LANDMARKS_PER_HAND,
                actual: hand.len(),
            });
        }
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    for point in hands.iter().flat_map(|hand| hand.iter()) {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
    }

    let mut values = Vec::with_capacity(FEATURE_LEN);
    for point in hands.iter().flat_map(|hand| hand.iter()) {
        values.push(point.x - min_x);
        values.push(point.y - min_y);
    }

    debug_assert_eq!(values.len(), FEATURE_LEN);
    Ok(FeatureVector(values))
}
