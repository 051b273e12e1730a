//! Model module: the classifier capability and the bundled CNN
//!
//! - `classifier`: `Classifier` / `ClassifierLoader` traits and the record loader
//! - `cnn`: the `LeafClassifier` architecture

pub mod classifier;
pub mod cnn;

// Re-export main types for convenience
pub use classifier::{Classifier, ClassifierLoader, RecordLoader};
pub use cnn::{LeafClassifier, LeafClassifierConfig};

/// Input resolution the published model was trained at
pub const MODEL_INPUT_SIZE: usize = 224;
