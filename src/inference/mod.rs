//! Inference: preprocessing, prediction and the analysis gate
//!
//! - `preprocess`: image decoding and tensor conversion
//! - `predictor`: classification with an optional saliency overlay
//! - `gate`: refuses concurrent analyses

pub mod gate;
pub mod predictor;
pub mod preprocess;

// Re-export main types for convenience
pub use gate::{AnalysisGate, AnalysisGuard};
pub use predictor::{AnalysisConfig, Analyzer, ClassProbability, PredictionResult};
pub use preprocess::{decode_data_url, decode_image, encode_data_url, load_image, to_input_tensor};
