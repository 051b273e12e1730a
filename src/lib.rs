//! # Mango Leaf Classifier
//!
//! Mango leaf disease classification with visual explanations, built on the
//! Burn framework.
//!
//! ## Features
//!
//! - **Eight-class CNN** covering seven leaf diseases and healthy leaves
//! - **Gradient saliency** showing which pixels drove the top prediction
//! - **Heatmap overlays** blended over the original photo and exported as PNG data URLs
//! - **Prediction history** kept in a local JSON file with soft deletion
//!
//! ## Modules
//!
//! - `model`: the `Classifier` capability and the bundled `LeafClassifier` CNN
//! - `inference`: preprocessing, the analysis pipeline and its single-flight gate
//! - `explain`: saliency maps, the colour gradient and overlay rendering
//! - `history`: saved predictions
//! - `config`: application configuration
//! - `utils`: logging and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mango_classifier::backend::{default_device, AnalysisBackend};
//! use mango_classifier::inference::{load_image, Analyzer};
//! use mango_classifier::model::{ClassifierLoader, LeafClassifier, RecordLoader};
//!
//! let device = default_device();
//! let model: LeafClassifier<AnalysisBackend> =
//!     RecordLoader::new("models/mango_leaf_model.mpk").load(&device)?;
//! let analyzer = Analyzer::new(model, device);
//!
//! let result = analyzer.analyze(&load_image("leaf.jpg".as_ref())?)?;
//! println!("{}", result.display());
//! ```

pub mod backend;
pub mod classes;
pub mod config;
pub mod explain;
pub mod history;
pub mod inference;
pub mod model;
pub mod testing;
pub mod utils;

// Re-export commonly used items for convenience
pub use classes::{CLASS_NAMES, NUM_CLASSES};
pub use config::AppConfig;
pub use explain::{compute_saliency, render_overlay, CompositeImage, Heatmap, SaliencyMap};
pub use history::{HistoryEntry, HistoryStore};
pub use inference::{AnalysisConfig, Analyzer, ClassProbability, PredictionResult};
pub use model::{Classifier, ClassifierLoader, LeafClassifier, LeafClassifierConfig, RecordLoader};
pub use utils::error::{MangoError, Result};

/// Default image size fed to the classifier
pub const IMAGE_SIZE: usize = model::MODEL_INPUT_SIZE;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
