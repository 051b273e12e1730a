//! Classifier capability
//!
//! The pipeline only depends on these traits. `LeafClassifier` is the bundled
//! implementation; tests substitute small analytic models.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::{backend::Backend, Tensor};
use tracing::info;

use crate::model::cnn::{LeafClassifier, LeafClassifierConfig};
use crate::utils::error::{MangoError, Result};

/// A differentiable image classifier.
///
/// `predict` takes a channel-last batch `[batch, height, width, channels]`
/// with values in `[0, 1]` and returns per-class scores `[batch, classes]`.
pub trait Classifier<B: Backend> {
    /// Number of output classes
    fn num_classes(&self) -> usize;

    /// Expected square input resolution
    fn input_size(&self) -> usize;

    /// Forward pass
    fn predict(&self, input: Tensor<B, 4>) -> Result<Tensor<B, 2>>;
}

/// Produces a ready classifier
pub trait ClassifierLoader<B: Backend> {
    type Model: Classifier<B>;

    /// Load the classifier onto `device`
    fn load(&self, device: &B::Device) -> Result<Self::Model>;
}

/// Loads `LeafClassifier` weights from a Burn `CompactRecorder` file
#[derive(Debug, Clone)]
pub struct RecordLoader {
    /// Path to the record file
    pub path: PathBuf,
    /// Architecture the record was saved from
    pub config: LeafClassifierConfig,
}

impl RecordLoader {
    /// Create a loader for the mango architecture
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: LeafClassifierConfig::mango(),
        }
    }

    /// Override the architecture configuration
    pub fn with_config(mut self, config: LeafClassifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Path to the record file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<B: Backend> ClassifierLoader<B> for RecordLoader {
    type Model = LeafClassifier<B>;

    fn load(&self, device: &B::Device) -> Result<LeafClassifier<B>> {
        if !self.path.exists() {
            return Err(MangoError::PathNotFound(self.path.clone()));
        }

        info!("Loading classifier weights from {:?}", self.path);

        let model = LeafClassifier::<B>::new(&self.config, device);
        model
            .load_file(self.path.clone(), &CompactRecorder::new(), device)
            .map_err(|e| MangoError::ModelLoad(format!("{:?}", e)))
    }
}
