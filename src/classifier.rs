//! K-nearest-neighbour classifier
//!
//! Fits a k = 5 nearest-neighbour model over the full 84-dimensional
//! feature space, evaluates it on a stratified held-out split, and
//! persists it as JSON. Inference loads the persisted model and exposes
//! [`Predictor::predict`]; everything else about the model is an
//! implementation detail.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alphabet::Alphabet;
use crate::dataset::FeatureDataset;
use crate::features::{FeatureVector, FEATURE_LEN};

/// Neighbours consulted per prediction
pub const NEIGHBOURS: usize = 5;

/// Held-out fraction for evaluation
pub const TEST_FRACTION: f32 = 0.2;

/// Errors from training and model persistence
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// Fatal for the training operation; no partial model is persisted.
    #[error("training dataset is empty")]
    EmptyDataset,

    #[error("dataset is skewed: {data} feature rows but {labels} labels")]
    LengthSkew { data: usize, labels: usize },

    #[error("feature length mismatch: expected {expected}, got {actual}")]
    FeatureLengthMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("model serialisation failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Anything that maps a feature vector to a label index.
pub trait Predictor: Send {
    fn predict(&self, features: &FeatureVector) -> usize;
}

/// Fitted k-nearest-neighbour model.
///
/// "Fitting" stores the training set; prediction is a majority vote among
/// the k nearest training vectors by Euclidean distance, ties broken in
/// favour of the tied class with the nearest member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnModel {
    k: usize,
    feature_len: usize,
    data: Vec<FeatureVector>,
    labels: Vec<usize>,
    trained_at: DateTime<Utc>,
}

impl KnnModel {
    /// Fit a model on the given dataset.
    pub fn fit(dataset: &FeatureDataset) -> Result<Self, ClassifierError> {
        if dataset.is_empty() {
            return Err(ClassifierError::EmptyDataset);
        }
        if dataset.data.len() != dataset.labels.len() {
            return Err(ClassifierError::LengthSkew {
                data: dataset.data.len(),
                labels: dataset.labels.len(),
            });
        }
        for features in &dataset.data {
            if features.len() != FEATURE_LEN {
                return Err(ClassifierError::FeatureLengthMismatch {
                    expected: FEATURE_LEN,
                    actual: features.len(),
                });
            }
        }

        Ok(Self {
            k: NEIGHBOURS,
            feature_len: FEATURE_LEN,
            data: dataset.data.clone(),
            labels: dataset.labels.clone(),
            trained_at: Utc::now(),
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Persist the fitted model as JSON.
    pub fn save(&self, path: &Path) -> Result<(), ClassifierError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string(self)?;
        fs::write(path, contents)?;
        tracing::info!(
            "Saved model ({} training samples) to {}",
            self.len(),
            path.display()
        );
        Ok(())
    }

    /// Load a persisted model, checking the feature length it was fitted
    /// with still matches this build.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let contents = fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&contents)?;
        if model.feature_len != FEATURE_LEN {
            return Err(ClassifierError::FeatureLengthMismatch {
                expected: FEATURE_LEN,
                actual: model.feature_len,
            });
        }
        Ok(model)
    }

    /// The k nearest training indices, nearest first.
    fn nearest(&self, features: &FeatureVector) -> Vec<usize> {
        let mut by_distance: Vec<(f32, usize)> = self
            .data
            .iter()
            .enumerate()
            .map(|(i, row)| (squared_distance(row, features), i))
            .collect();
        by_distance
            .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        by_distance
            .into_iter()
            .take(self.k.min(self.data.len()))
            .map(|(_, i)| i)
            .collect()
    }
}

impl Predictor for KnnModel {
    fn predict(&self, features: &FeatureVector) -> usize {
        let neighbours = self.nearest(features);

        let mut votes: BTreeMap<usize, usize> = BTreeMap::new();
        for &i in &neighbours {
            *votes.entry(self.labels[i]).or_insert(0) += 1;
        }
        let best = votes.values().copied().max().unwrap_or(0);

        // Ties resolve to the tied class with the nearest neighbour.
        neighbours
            .iter()
            .map(|&i| self.labels[i])
            .find(|label| votes.get(label) == Some(&best))
            .unwrap_or(0)
    }
}

fn squared_distance(a: &FeatureVector, b: &FeatureVector) -> f32 {
    a.as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub letter: String,
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub support: usize,
}

/// Evaluation summary for a trained model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub accuracy: f32,
    pub train_samples: usize,
    pub test_samples: usize,
    pub per_class: Vec<ClassMetrics>,
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accuracy: {:.2}%", self.accuracy * 100.0)?;
        writeln!(
            f,
            "Samples: {} train / {} test",
            self.train_samples, self.test_samples
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<8} {:>9} {:>9} {:>9} {:>9}",
            "letter", "precision", "recall", "f1", "support"
        )?;
        for class in &self.per_class {
            writeln!(
                f,
                "{:<8} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                class.letter, class.precision, class.recall, class.f1, class.support
            )?;
        }
        Ok(())
    }
}

/// Train a model on the dataset and evaluate it on a stratified held-out
/// split.
///
/// An empty dataset is fatal for the operation and nothing is fitted; any
/// other failure leaves a previously persisted model untouched, so the
/// caller can fix the input and retry.
pub fn train(
    dataset: &FeatureDataset,
    alphabet: &Alphabet,
) -> Result<(KnnModel, TrainingReport), ClassifierError> {
    if dataset.is_empty() {
        return Err(ClassifierError::EmptyDataset);
    }

    let (train_set, test_set) = stratified_split(dataset, TEST_FRACTION);
    tracing::info!(
        "Training on {} samples, evaluating on {}",
        train_set.len(),
        test_set.len()
    );

    let model = KnnModel::fit(&train_set)?;
    let report = evaluate(&model, &test_set, alphabet, train_set.len());

    tracing::info!("Training complete, accuracy {:.2}%", report.accuracy * 100.0);
    Ok((model, report))
}

/// Deterministic stratified split: for each class, an evenly strided
/// selection of `fraction` of its samples is held out, at least one per
/// class whenever the class has two or more samples.
fn stratified_split(dataset: &FeatureDataset, fraction: f32) -> (FeatureDataset, FeatureDataset) {
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in dataset.labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let mut train = FeatureDataset::default();
    let mut test = FeatureDataset::default();

    for indices in by_class.values() {
        let n = indices.len();
        let mut held_out = (n as f32 * fraction).round() as usize;
        if n >= 2 {
            held_out = held_out.clamp(1, n - 1);
        } else {
            held_out = 0;
        }

        let stride = if held_out > 0 { n as f32 / held_out as f32 } else { 0.0 };
        let test_positions: Vec<usize> =
            (0..held_out).map(|j| (j as f32 * stride) as usize).collect();

        for (position, &index) in indices.iter().enumerate() {
            let row = dataset.data[index].clone();
            let label = dataset.labels[index];
            if test_positions.contains(&position) {
                test.push(row, label);
            } else {
                train.push(row, label);
            }
        }
    }

    (train, test)
}

fn evaluate(
    model: &KnnModel,
    test: &FeatureDataset,
    alphabet: &Alphabet,
    train_samples: usize,
) -> TrainingReport {
    let predictions: Vec<usize> = test.data.iter().map(|row| model.predict(row)).collect();

    let correct = predictions
        .iter()
        .zip(&test.labels)
        .filter(|(p, t)| p == t)
        .count();
    let accuracy = if test.is_empty() {
        0.0
    } else {
        correct as f32 / test.len() as f32
    };

    let classes: std::collections::BTreeSet<usize> =
        test.labels.iter().copied().collect();

    let per_class = classes
        .into_iter()
        .map(|class| {
            let tp = predictions
                .iter()
                .zip(&test.labels)
                .filter(|&(&p, &t)| p == class && t == class)
                .count() as f32;
            let fp = predictions
                .iter()
                .zip(&test.labels)
                .filter(|&(&p, &t)| p == class && t != class)
                .count() as f32;
            let missed = predictions
                .iter()
                .zip(&test.labels)
                .filter(|&(&p, &t)| p != class && t == class)
                .count() as f32;

            let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
            let recall = if tp + missed > 0.0 { tp / (tp + missed) } else { 0.0 };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            let support = test.labels.iter().filter(|&&t| t == class).count();

            ClassMetrics {
                letter: alphabet.letter(class).unwrap_or("?").to_string(),
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect();

    TrainingReport {
        accuracy,
        train_samples,
        test_samples: test.len(),
        per_class,
    }
}
