//! Prediction pipeline
//!
//! Classifies a photo and, when enabled, attaches a saliency heatmap for the
//! top class. Heatmap problems never fail the prediction: they are logged
//! and the result is returned without a heatmap.

use std::time::Duration;

use burn::tensor::{activation::softmax, backend::AutodiffBackend, Tensor};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::classes::class_name;
use crate::explain::{compute_saliency, OverlayRenderer, DEFAULT_ALPHA};
use crate::inference::gate::AnalysisGate;
use crate::inference::preprocess::to_input_tensor;
use crate::model::Classifier;
use crate::utils::error::{MangoError, Result};
use crate::utils::logging::StageTimer;

/// One class and its probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub class_name: String,
    pub probability: f32,
}

/// Result of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted class index
    pub predicted_class: usize,

    /// Predicted class name
    pub class_name: String,

    /// Probability of the predicted class
    pub confidence: f32,

    /// All classes, most likely first; ties keep class order
    pub ranked: Vec<ClassProbability>,

    /// Probabilities by class index
    pub probabilities: Vec<f32>,

    /// Forward pass time in milliseconds
    pub inference_time_ms: f64,

    /// Composite heatmap as a PNG data URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heatmap_url: Option<String>,
}

impl PredictionResult {
    /// Build from a probability vector indexed by class
    pub fn from_probabilities(probabilities: Vec<f32>, inference_time: Duration) -> Self {
        let mut order: Vec<usize> = (0..probabilities.len()).collect();
        // Stable sort: equal probabilities stay in index order
        order.sort_by(|&a, &b| {
            probabilities[b]
                .partial_cmp(&probabilities[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let name = |idx: usize| {
            class_name(idx)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Unknown_{}", idx))
        };

        let ranked: Vec<ClassProbability> = order
            .iter()
            .map(|&idx| ClassProbability {
                class_name: name(idx),
                probability: probabilities[idx],
            })
            .collect();

        let predicted_class = order.first().copied().unwrap_or(0);
        let confidence = probabilities.get(predicted_class).copied().unwrap_or(0.0);

        Self {
            predicted_class,
            class_name: name(predicted_class),
            confidence,
            ranked,
            probabilities,
            inference_time_ms: inference_time.as_secs_f64() * 1000.0,
            heatmap_url: None,
        }
    }

    /// Pretty print the prediction result
    pub fn display(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "Prediction: {} (class {})\n",
            self.class_name, self.predicted_class
        ));
        output.push_str(&format!("Confidence: {:.2}%\n", self.confidence * 100.0));
        output.push_str(&format!("Inference time: {:.2} ms\n", self.inference_time_ms));

        output.push_str("\nRanking:\n");
        for (i, entry) in self.ranked.iter().enumerate() {
            output.push_str(&format!(
                "  {}. {} - {:.2}%\n",
                i + 1,
                entry.class_name,
                entry.probability * 100.0
            ));
        }

        output
    }
}

/// Pipeline switches
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Generate a saliency overlay for the top class
    pub heatmap: bool,
    /// Overlay opacity
    pub alpha: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            heatmap: true,
            alpha: DEFAULT_ALPHA,
        }
    }
}

/// Classification plus optional heatmap over one classifier
pub struct Analyzer<B: AutodiffBackend, M: Classifier<B>> {
    model: Option<M>,
    device: B::Device,
    config: AnalysisConfig,
    gate: AnalysisGate,
}

impl<B: AutodiffBackend, M: Classifier<B>> Analyzer<B, M> {
    /// Analyzer around a loaded model
    pub fn new(model: M, device: B::Device) -> Self {
        Self {
            model: Some(model),
            device,
            config: AnalysisConfig::default(),
            gate: AnalysisGate::new(),
        }
    }

    /// Analyzer whose model is not available yet
    pub fn unloaded(device: B::Device) -> Self {
        Self {
            model: None,
            device,
            config: AnalysisConfig::default(),
            gate: AnalysisGate::new(),
        }
    }

    /// Replace the pipeline configuration
    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// The gate guarding concurrent analyses
    pub fn gate(&self) -> &AnalysisGate {
        &self.gate
    }

    /// Classify `image`, attaching a heatmap when configured.
    ///
    /// # Errors
    /// * `AnalysisInProgress` if another analysis holds the gate
    /// * `ModelNotLoaded` if no model is installed
    /// * any preprocessing or forward pass error of the base classification
    pub fn analyze(&self, image: &DynamicImage) -> Result<PredictionResult> {
        let _guard = self.gate.try_begin().ok_or(MangoError::AnalysisInProgress)?;
        let model = self.model.as_ref().ok_or(MangoError::ModelNotLoaded)?;

        let input = to_input_tensor::<B>(image, model.input_size(), &self.device)?;

        let timer = StageTimer::start("classification");
        let logits = model.predict(input.clone())?;
        let probabilities: Vec<f32> = softmax(logits, 1)
            .into_data()
            .to_vec()
            .map_err(|e| MangoError::InferenceFailure(format!("reading scores: {:?}", e)))?;
        let elapsed = Duration::from_secs_f64(timer.finish() / 1000.0);

        let mut result = PredictionResult::from_probabilities(probabilities, elapsed);
        info!(
            "Predicted {} ({:.1}%) in {:.2} ms",
            result.class_name,
            result.confidence * 100.0,
            result.inference_time_ms
        );

        if self.config.heatmap {
            match self.heatmap(model, &input, result.predicted_class, image) {
                Ok(url) => result.heatmap_url = url,
                Err(e) if e.is_soft() => warn!("Skipping heatmap: {}", e),
                Err(e) => error!("Heatmap generation failed: {}", e),
            }
        }

        Ok(result)
    }

    fn heatmap(
        &self,
        model: &M,
        input: &Tensor<B, 4>,
        class: usize,
        image: &DynamicImage,
    ) -> Result<Option<String>> {
        let timer = StageTimer::start("saliency");
        let saliency = compute_saliency(Some(model), input, &[class])?;
        timer.finish();

        if saliency.is_degenerate() {
            warn!("Saliency map is flat; no heatmap for this image");
            return Ok(None);
        }

        let heatmap = saliency
            .heatmap(0)
            .ok_or_else(|| MangoError::InferenceFailure("saliency batch is empty".to_string()))?;

        let timer = StageTimer::start("overlay");
        let composite = OverlayRenderer::new(self.config.alpha)?.render(&heatmap, image)?;
        let url = composite.to_data_url()?;
        timer.finish();

        Ok(Some(url))
    }
}
