//! Mudra - two-handed Marathi finger-spelling recognition
//!
//! Collects labelled gesture samples from a camera feed, preprocesses them
//! into fixed-length landmark feature vectors, trains a nearest-neighbour
//! classifier, and recognises live gestures into a running transcript.
//!
//! The camera and the hand-landmark detector are external collaborators
//! behind the [`capture::FrameSource`] and [`landmarks::HandDetector`]
//! traits. Everything on top of them lives here: the feature contract, the
//! two session state machines, and the debounced prediction policy.

pub mod alphabet;
pub mod capture;
pub mod classifier;
pub mod collect;
pub mod config;
pub mod dataset;
pub mod features;
pub mod landmarks;
pub mod preprocess;
pub mod recognize;

pub use alphabet::Alphabet;
pub use capture::{CaptureError, Frame, FrameSource, LatestFrame};
pub use classifier::{ClassifierError, KnnModel, Predictor, TrainingReport};
pub use collect::{CollectEvent, CollectionController, CollectionSession, LetterState};
pub use dataset::{DataPaths, DatasetError, FeatureDataset, SampleStore};
pub use features::{build_features, FeatureError, FeatureVector, FEATURE_LEN};
pub use landmarks::{
    DetectorConfig, HandDetector, HandLandmarkSet, LandmarkExtractor, LandmarkPoint,
    LANDMARKS_PER_HAND,
};
pub use preprocess::{extract_dataset, preprocess_and_save, PreprocessReport};
pub use recognize::{RecognitionController, RecognitionSession, RecognizeEvent};
