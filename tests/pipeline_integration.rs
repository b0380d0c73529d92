//! End-to-end pipeline test: collect samples to disk, preprocess them
//! into the feature dataset, train the classifier, and resolve live
//! predictions back through the persisted label map.

use mudra::alphabet::Alphabet;
use mudra::capture::Frame;
use mudra::classifier::{self, KnnModel, Predictor};
use mudra::collect::{CollectionController, FrameOutcome};
use mudra::dataset::{load_label_map, save_label_map, DataPaths, FeatureDataset, SampleStore};
use mudra::features::build_features;
use mudra::landmarks::{
    DetectorConfig, HandDetector, HandLandmarkSet, LandmarkExtractor, LandmarkPoint,
    LANDMARKS_PER_HAND,
};
use mudra::preprocess;
use tempfile::tempdir;

/// Detector whose second-hand placement is driven by the frame's first
/// pixel, so different "gestures" survive the PNG round trip.
struct PixelSpreadDetector;

fn hands_for_spread(spread: f32) -> Vec<HandLandmarkSet> {
    (0..2)
        .map(|h| {
            let base_x = 0.05 + h as f32 * spread;
            HandLandmarkSet::new(
                (0..LANDMARKS_PER_HAND)
                    .map(|i| LandmarkPoint::new(base_x + i as f32 * 0.005, 0.3 + i as f32 * 0.005))
                    .collect(),
            )
        })
        .collect()
}

impl HandDetector for PixelSpreadDetector {
    fn detect(&mut self, frame: &Frame) -> Vec<HandLandmarkSet> {
        let value = frame.data().first().copied().unwrap_or(0);
        hands_for_spread(value as f32 / 255.0 * 0.5)
    }
}

fn frame(value: u8) -> Frame {
    Frame::rgb8(4, 4, vec![value; 4 * 4 * 3])
}

fn extractor() -> LandmarkExtractor {
    LandmarkExtractor::new(
        Box::new(PixelSpreadDetector),
        DetectorConfig::for_preprocessing(),
    )
}

#[test]
fn collect_preprocess_train_and_recognise() {
    let dir = tempdir().unwrap();
    let paths = DataPaths::new(dir.path());
    let alphabet = Alphabet::new(vec!["आ".to_string(), "र".to_string()]);

    // --- Collection: drive the controller directly, persisting frames the
    // way the session runner does.
    save_label_map(&alphabet, &paths.label_map_file()).unwrap();
    let store = SampleStore::new(&paths);
    let mut controller = CollectionController::new(&alphabet, 6);
    let mut detect_extractor = extractor();

    // Class 0 around pixel 40, class 1 around pixel 200; small in-class
    // jitter, wide separation between classes.
    let class_frames: [Vec<Frame>; 2] = [
        (0..6u8).map(|j| frame(40 + j)).collect(),
        (0..6u8).map(|j| frame(200 + j)).collect(),
    ];

    for frames in &class_frames {
        controller.on_start();
        for f in frames {
            let hands = detect_extractor.extract(f);
            match controller.on_frame(&hands) {
                FrameOutcome::Store {
                    label,
                    sample_index,
                    ..
                } => {
                    store.write_sample(label, sample_index, f).unwrap();
                }
                FrameOutcome::Ignored => panic!("two-hand frame should be sampled"),
            }
        }
    }
    assert!(controller.is_finished());

    // --- Preprocessing: label map is read from disk, never recomputed.
    let report = preprocess::preprocess_and_save(&paths, &mut extractor()).unwrap();
    assert_eq!(report.valid, 12);
    assert_eq!(report.skipped, 0);

    // --- Training.
    let dataset = FeatureDataset::load(&paths.features_file()).unwrap();
    let persisted_alphabet = load_label_map(&paths.label_map_file()).unwrap();
    let (model, training) = classifier::train(&dataset, &persisted_alphabet).unwrap();
    assert!(training.accuracy > 0.9, "accuracy: {}", training.accuracy);
    model.save(&paths.model_file()).unwrap();

    // --- Inference: load the persisted model, classify fresh gestures,
    // and resolve indices through the persisted map.
    let model = KnnModel::load(&paths.model_file()).unwrap();
    let probes = [(42u8, "आ"), (203u8, "र")];
    for (value, expected) in probes {
        let hands = hands_for_spread(value as f32 / 255.0 * 0.5);
        let features = build_features(&hands).unwrap();
        let label = model.predict(&features);
        assert_eq!(persisted_alphabet.letter(label), Some(expected));
    }
}

#[test]
fn label_indices_roundtrip_through_persisted_map() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("label_map.json");

    let alphabet = Alphabet::default();
    save_label_map(&alphabet, &path).unwrap();
    let persisted = load_label_map(&path).unwrap();

    // Every letter written under its index at collection time resolves
    // back to the identical letter at inference time.
    for letter in alphabet.iter() {
        let index = alphabet.index_of(letter).unwrap();
        assert_eq!(persisted.letter(index), Some(letter));
    }
    assert_eq!(persisted.len(), 6);
}
