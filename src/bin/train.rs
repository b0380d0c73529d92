//! Model training entry point
//!
//! Loads the preprocessed feature dataset and the persisted label map,
//! fits the nearest-neighbour model, prints the evaluation report, and
//! persists the model. An empty dataset aborts without touching any
//! previously saved model; the command can simply be re-run after the
//! input is fixed.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use mudra::classifier;
use mudra::dataset::{load_label_map, FeatureDataset};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = mudra::config::get_config().map_err(anyhow::Error::msg)?;
    let paths = config.storage.data_paths();

    let dataset = FeatureDataset::load(&paths.features_file()).with_context(|| {
        format!(
            "failed to load feature dataset from {} (run preprocessing first)",
            paths.features_file().display()
        )
    })?;
    let alphabet = load_label_map(&paths.label_map_file()).with_context(|| {
        format!(
            "failed to load label map from {}",
            paths.label_map_file().display()
        )
    })?;

    tracing::info!(
        "Loaded {} samples across {} letters",
        dataset.len(),
        alphabet.len()
    );

    let (model, report) = classifier::train(&dataset, &alphabet)?;
    println!("{report}");

    model.save(&paths.model_file())?;
    println!("Model saved to {}", paths.model_file().display());

    Ok(())
}
