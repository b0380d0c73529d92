//! Dataset preprocessing
//!
//! Walks the collected image tree, re-runs landmark detection on every
//! stored frame in static mode, and turns qualifying frames into the
//! index-aligned feature dataset consumed by training.
//!
//! A sample is skipped (counted, never fatal) when the image cannot be
//! decoded, when the detector reports anything other than exactly two
//! hands, or when the built vector's length is not 84. The last gate is
//! deliberately stricter than collection, which qualifies frames on hand
//! count alone; the asymmetry is inherited behaviour and is preserved
//! rather than resolved here.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::alphabet::Alphabet;
use crate::dataset::{
    load_label_map, load_sample_image, DataPaths, DatasetError, FeatureDataset,
};
use crate::features::{build_features, FEATURE_LEN, HANDS_REQUIRED};
use crate::landmarks::LandmarkExtractor;

/// Counts from one preprocessing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessReport {
    pub valid: usize,
    pub skipped: usize,
}

/// Re-extract features from every stored sample image.
///
/// Label directories are the numeric-named children of the dataset dir,
/// processed in label order; directories with non-numeric names or labels
/// outside the alphabet are ignored entirely (they are not samples).
pub fn extract_dataset(
    paths: &DataPaths,
    extractor: &mut LandmarkExtractor,
    alphabet: &Alphabet,
) -> Result<(FeatureDataset, PreprocessReport), DatasetError> {
    let mut dataset = FeatureDataset::default();
    let mut report = PreprocessReport::default();

    for (label, dir) in label_dirs(paths, alphabet)? {
        let letter = alphabet.letter(label).unwrap_or("?");
        tracing::info!("Preprocessing \"{}\" ({})", letter, dir.display());

        for image_path in sample_files(&dir)? {
            let frame = match load_sample_image(&image_path) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("Skipping unreadable {}: {}", image_path.display(), e);
                    report.skipped += 1;
                    continue;
                }
            };

            let hands = extractor.extract(&frame);
            if hands.len() != HANDS_REQUIRED {
                report.skipped += 1;
                continue;
            }

            let features = match build_features(&hands) {
                Ok(features) => features,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", image_path.display(), e);
                    report.skipped += 1;
                    continue;
                }
            };

            // Strict length gate, independent of the builder's own checks.
            if features.len() != FEATURE_LEN {
                report.skipped += 1;
                continue;
            }

            dataset.push(features, label);
            report.valid += 1;
        }
    }

    tracing::info!(
        "Preprocessing done: {} valid, {} skipped",
        report.valid,
        report.skipped
    );
    Ok((dataset, report))
}

/// Full preprocessing pass: read the persisted label map (never
/// recompute it), extract features from the stored images, and persist
/// the feature dataset.
pub fn preprocess_and_save(
    paths: &DataPaths,
    extractor: &mut LandmarkExtractor,
) -> Result<PreprocessReport, DatasetError> {
    let alphabet = load_label_map(&paths.label_map_file())?;
    let (dataset, report) = extract_dataset(paths, extractor, &alphabet)?;
    dataset.save(&paths.features_file())?;
    Ok(report)
}

/// Numeric label directories under the dataset root, in label order.
fn label_dirs(
    paths: &DataPaths,
    alphabet: &Alphabet,
) -> Result<Vec<(usize, PathBuf)>, DatasetError> {
    let dataset_dir = paths.dataset_dir();
    if !dataset_dir.exists() {
        return Ok(Vec::new());
    }

    let mut dirs: Vec<(usize, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(&dataset_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match name.parse::<usize>() {
            Ok(label) if label < alphabet.len() => dirs.push((label, path)),
            _ => {
                tracing::debug!("Ignoring non-label directory {}", path.display());
            }
        }
    }

    dirs.sort_by_key(|(label, _)| *label);
    Ok(dirs)
}

/// Sample files within one label directory, in name order for
/// deterministic dataset layout.
fn sample_files(dir: &PathBuf) -> Result<Vec<PathBuf>, DatasetError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}
