//! Dataset persistence
//!
//! On-disk layout under the data root (default `~/.mudra`):
//!
//! ```text
//! dataset/<label_index>/<sample_index>.png   raw collected frames
//! features.json                             {data, labels}, index-aligned
//! label_map.json                            ordered letter list
//! model.json                                trained classifier
//! ```
//!
//! `label_index` is the zero-based position in the persisted letter list;
//! `sample_index` increments from 0 per letter.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::alphabet::Alphabet;
use crate::capture::Frame;
use crate::features::FeatureVector;

/// Errors from dataset persistence
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialisation failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// Frame buffer does not match its declared dimensions
    #[error("frame buffer does not match {width}x{height} RGB8")]
    InvalidFrame { width: u32, height: u32 },
}

/// Resolved locations of every persisted artifact.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default data root (`~/.mudra`), falling back to /tmp when the home
    /// directory cannot be determined.
    pub fn default_root() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| {
            tracing::error!("Could not determine home directory, using /tmp");
            PathBuf::from("/tmp")
        });
        Self::new(home.join(".mudra"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset_dir(&self) -> PathBuf {
        self.root.join("dataset")
    }

    pub fn features_file(&self) -> PathBuf {
        self.root.join("features.json")
    }

    pub fn label_map_file(&self) -> PathBuf {
        self.root.join("label_map.json")
    }

    pub fn model_file(&self) -> PathBuf {
        self.root.join("model.json")
    }
}

/// Writes raw collected frames into the per-letter directory layout.
pub struct SampleStore {
    dataset_dir: PathBuf,
}

impl SampleStore {
    pub fn new(paths: &DataPaths) -> Self {
        Self {
            dataset_dir: paths.dataset_dir(),
        }
    }

    /// Directory for one letter's samples, created on demand.
    pub fn letter_dir(&self, label: usize) -> Result<PathBuf, DatasetError> {
        let dir = self.dataset_dir.join(label.to_string());
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }

    /// Persist one raw frame as `<label>/<sample_index>.png`.
    pub fn write_sample(
        &self,
        label: usize,
        sample_index: usize,
        frame: &Frame,
    ) -> Result<PathBuf, DatasetError> {
        let dir = self.letter_dir(label)?;
        let path = dir.join(format!("{sample_index}.png"));

        let (width, height) = (frame.width(), frame.height());
        let buffer = image::RgbImage::from_raw(width, height, frame.data().to_vec())
            .ok_or(DatasetError::InvalidFrame { width, height })?;
        buffer.save(&path)?;

        tracing::debug!("Stored sample {}", path.display());
        Ok(path)
    }
}

/// Decode a stored sample back into an RGB8 frame.
pub fn load_sample_image(path: &Path) -> Result<Frame, DatasetError> {
    let image = image::open(path)?.to_rgb8();
    let (width, height) = image.dimensions();
    Ok(Frame::rgb8(width, height, image.into_raw()))
}

/// The preprocessed feature dataset: `data[i]` belongs to `labels[i]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureDataset {
    pub data: Vec<FeatureVector>,
    pub labels: Vec<usize>,
}

impl FeatureDataset {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn push(&mut self, features: FeatureVector, label: usize) {
        self.data.push(features);
        self.labels.push(label);
    }

    pub fn save(&self, path: &Path) -> Result<(), DatasetError> {
        ensure_parent_dir(path)?;
        let contents = serde_json::to_string(self)?;
        fs::write(path, contents)?;
        tracing::info!("Saved {} samples to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Persist the ordered letter list. Written exactly once, at collection
/// time; preprocessing and inference read it back instead of recomputing.
pub fn save_label_map(alphabet: &Alphabet, path: &Path) -> Result<(), DatasetError> {
    ensure_parent_dir(path)?;
    let contents = serde_json::to_string_pretty(alphabet)?;
    fs::write(path, contents)?;
    tracing::info!("Saved label map ({} letters) to {}", alphabet.len(), path.display());
    Ok(())
}

pub fn load_label_map(path: &Path) -> Result<Alphabet, DatasetError> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn ensure_parent_dir(path: &Path) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{HandLandmarkSet, LandmarkPoint, LANDMARKS_PER_HAND};
    use tempfile::tempdir;

    fn full_hand(base: f32) -> HandLandmarkSet {
        HandLandmarkSet::new(
            (0..LANDMARKS_PER_HAND)
                .map(|i| LandmarkPoint::new(base + i as f32 * 0.01, base))
                .collect(),
        )
    }

    #[test]
    fn test_paths_layout() {
        let paths = DataPaths::new("/data/mudra");
        assert_eq!(paths.dataset_dir(), PathBuf::from("/data/mudra/dataset"));
        assert!(paths.features_file().ends_with("features.json"));
        assert!(paths.label_map_file().ends_with("label_map.json"));
        assert!(paths.model_file().ends_with("model.json"));
    }

    #[test]
    fn test_write_and_reload_sample() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let store = SampleStore::new(&paths);

        let frame = Frame::rgb8(4, 2, vec![128; 4 * 2 * 3]);
        let path = store.write_sample(3, 7, &frame).unwrap();

        assert!(path.ends_with("3/7.png"));
        let reloaded = load_sample_image(&path).unwrap();
        assert_eq!(reloaded.width(), 4);
        assert_eq!(reloaded.height(), 2);
        assert_eq!(reloaded.data(), frame.data());
    }

    #[test]
    fn test_write_sample_rejects_short_buffer() {
        let dir = tempdir().unwrap();
        let store = SampleStore::new(&DataPaths::new(dir.path()));

        let frame = Frame::rgb8(4, 4, vec![0; 3]);
        let result = store.write_sample(0, 0, &frame);
        assert!(matches!(result, Err(DatasetError::InvalidFrame { .. })));
    }

    #[test]
    fn test_feature_dataset_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("features.json");

        let hands = vec![full_hand(0.1), full_hand(0.5)];
        let features = crate::features::build_features(&hands).unwrap();

        let mut dataset = FeatureDataset::default();
        dataset.push(features.clone(), 2);
        dataset.save(&path).unwrap();

        let restored = FeatureDataset::load(&path).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.labels, vec![2]);
        assert_eq!(restored.data[0], features);
    }

    #[test]
    fn test_label_map_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("label_map.json");

        let alphabet = Alphabet::default();
        save_label_map(&alphabet, &path).unwrap();

        let restored = load_label_map(&path).unwrap();
        assert_eq!(restored, alphabet);
    }

    #[test]
    fn test_load_missing_label_map_fails() {
        let dir = tempdir().unwrap();
        assert!(load_label_map(&dir.path().join("missing.json")).is_err());
    }
}
