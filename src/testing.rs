//! Testing utilities for mango_classifier.
//!
//! Small analytic classifiers with known outputs and gradients, plus image
//! helpers. Used by unit tests and by the integration tests under `tests/`.

use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::{DynamicImage, Rgb, RgbImage};

use crate::model::Classifier;
use crate::utils::error::{MangoError, Result};

/// Assert that two f32 values are approximately equal.
#[track_caller]
pub fn assert_approx_eq(actual: f32, expected: f32, tolerance: f32) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected}, got {actual} (tolerance {tolerance})"
    );
}

/// Linear classifier over the flattened channel-last input.
///
/// `score[c] = sum_i x[i] * weights[i][c]`, so the input gradient for class
/// `c` is exactly column `c` of the weight matrix.
#[derive(Debug, Clone)]
pub struct LinearScorer<B: Backend> {
    weights: Tensor<B, 2>,
    input_size: usize,
    channels: usize,
}

impl<B: Backend> LinearScorer<B> {
    /// Build from row-major weights of shape `[size * size * channels, classes]`
    pub fn new(
        weights: Vec<f32>,
        size: usize,
        channels: usize,
        num_classes: usize,
        device: &B::Device,
    ) -> Self {
        let features = size * size * channels;
        assert_eq!(weights.len(), features * num_classes, "weight count");
        let weights = Tensor::from_data(TensorData::new(weights, [features, num_classes]), device);

        Self {
            weights,
            input_size: size,
            channels,
        }
    }
}

impl<B: Backend> Classifier<B> for LinearScorer<B> {
    fn num_classes(&self) -> usize {
        self.weights.dims()[1]
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn predict(&self, input: Tensor<B, 4>) -> Result<Tensor<B, 2>> {
        let [batch, height, width, channels] = input.dims();
        if height != self.input_size || width != self.input_size || channels != self.channels {
            return Err(MangoError::InferenceFailure(format!(
                "linear scorer expects {}x{}x{}",
                self.input_size, self.input_size, self.channels
            )));
        }

        let flat = input.reshape([batch, height * width * channels]);
        Ok(flat.matmul(self.weights.clone()))
    }
}

/// Classifier returning the same logits for every example.
///
/// The input still participates in the graph with zero weight, so its
/// gradient exists and is identically zero.
#[derive(Debug, Clone)]
pub struct FixedLogits<B: Backend> {
    logits: Tensor<B, 2>,
    input_size: usize,
}

impl<B: Backend> FixedLogits<B> {
    /// Create from one row of logits
    pub fn new(logits: Vec<f32>, input_size: usize, device: &B::Device) -> Self {
        let classes = logits.len();
        let logits = Tensor::from_data(TensorData::new(logits, [1, classes]), device);
        Self { logits, input_size }
    }

    /// All classes scored equally
    pub fn uniform(num_classes: usize, input_size: usize, device: &B::Device) -> Self {
        Self::new(vec![1.0; num_classes], input_size, device)
    }
}

impl<B: Backend> Classifier<B> for FixedLogits<B> {
    fn num_classes(&self) -> usize {
        self.logits.dims()[1]
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn predict(&self, input: Tensor<B, 4>) -> Result<Tensor<B, 2>> {
        let [batch, height, width, channels] = input.dims();
        let anchor = input
            .reshape([batch, height * width * channels])
            .sum_dim(1)
            .mul_scalar(0.0);

        Ok(self.logits.clone().repeat_dim(0, batch) + anchor)
    }
}

/// Classifier whose forward pass always fails
#[derive(Debug, Clone, Default)]
pub struct FailingClassifier;

impl<B: Backend> Classifier<B> for FailingClassifier {
    fn num_classes(&self) -> usize {
        crate::classes::NUM_CLASSES
    }

    fn input_size(&self) -> usize {
        crate::model::MODEL_INPUT_SIZE
    }

    fn predict(&self, _input: Tensor<B, 4>) -> Result<Tensor<B, 2>> {
        Err(MangoError::InferenceFailure("forward pass failed".to_string()))
    }
}

/// Single-colour RGB image
pub fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
}
