//! Gradient saliency maps.
//!
//! The attribution for an example is the magnitude of the gradient of its
//! target class score with respect to the input pixels, averaged over colour
//! channels and normalized by the global maximum.

use burn::tensor::{
    backend::{AutodiffBackend, Backend},
    Tensor, TensorData,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::Classifier;
use crate::utils::error::{MangoError, Result};

/// Normalized saliency values for a batch, laid out `[batch, height, width]`.
///
/// Values lie in `[0, 1]`. Unless the map is degenerate, the largest value
/// is exactly `1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaliencyMap {
    batch: usize,
    height: usize,
    width: usize,
    values: Vec<f32>,
    degenerate: bool,
}

impl SaliencyMap {
    /// Normalize raw non-negative attributions by their maximum.
    ///
    /// Non-finite entries are treated as zero. When nothing positive remains
    /// the map is all zeros and flagged degenerate.
    pub fn from_raw(batch: usize, height: usize, width: usize, mut values: Vec<f32>) -> Result<Self> {
        if values.len() != batch * height * width {
            return Err(MangoError::InvalidInput(format!(
                "saliency data has {} values, expected {}x{}x{}",
                values.len(),
                batch,
                height,
                width
            )));
        }

        for v in values.iter_mut() {
            if !v.is_finite() {
                *v = 0.0;
            } else {
                *v = v.abs();
            }
        }

        let max = values.iter().copied().fold(0.0f32, f32::max);
        let degenerate = max <= 0.0;
        if degenerate {
            values.iter_mut().for_each(|v| *v = 0.0);
        } else {
            values.iter_mut().for_each(|v| *v = (*v / max).min(1.0));
        }

        Ok(Self {
            batch,
            height,
            width,
            values,
            degenerate,
        })
    }

    /// `[batch, height, width]`
    pub fn dims(&self) -> [usize; 3] {
        [self.batch, self.height, self.width]
    }

    /// Flat values in `[batch, height, width]` order
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// True when the gradient was zero everywhere
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// Largest value in the map (1.0, or 0.0 when degenerate)
    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }

    /// Value at `(example, row, col)`
    pub fn get(&self, example: usize, row: usize, col: usize) -> Option<f32> {
        if example >= self.batch || row >= self.height || col >= self.width {
            return None;
        }
        self.values
            .get((example * self.height + row) * self.width + col)
            .copied()
    }

    /// The 2D map for one example
    pub fn heatmap(&self, example: usize) -> Option<Heatmap> {
        if example >= self.batch {
            return None;
        }
        let plane = self.height * self.width;
        let start = example * plane;

        Some(Heatmap {
            height: self.height,
            width: self.width,
            values: self.values[start..start + plane].to_vec(),
        })
    }

}

/// A single 2D map of values in `[0, 1]`, row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    height: usize,
    width: usize,
    values: Vec<f32>,
}

impl Heatmap {
    /// Build from row-major values
    pub fn new(height: usize, width: usize, values: Vec<f32>) -> Result<Self> {
        if values.len() != height * width {
            return Err(MangoError::InvalidInput(format!(
                "heatmap has {} values, expected {}x{}",
                values.len(),
                height,
                width
            )));
        }
        Ok(Self {
            height,
            width,
            values,
        })
    }

    /// Build from rows; every row must have the same length
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|row| row.len() != width) {
            return Err(MangoError::InvalidInput("heatmap rows are ragged".to_string()));
        }
        Self::new(rows.len(), width, rows.concat())
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.width
    }

    /// True when there are no cells to sample
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `(row, col)`
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.values.get(row * self.width + col).copied()
    }
}

/// One row per example with a 1.0 at that example's target class
fn one_hot_rows<B: Backend>(
    class_indices: &[usize],
    num_classes: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let mut data = vec![0.0f32; class_indices.len() * num_classes];
    for (row, &class) in class_indices.iter().enumerate() {
        data[row * num_classes + class] = 1.0;
    }
    Tensor::from_data(
        TensorData::new(data, [class_indices.len(), num_classes]),
        device,
    )
}

/// Compute a saliency map for `class_indices`, one index per batch example.
///
/// `input` is a channel-last batch `[batch, height, width, channels]` and is
/// only borrowed. Every tensor created here is dropped before returning; the
/// result is plain data with the input's spatial shape.
///
/// # Errors
/// * `ModelNotLoaded` if `classifier` is `None`
/// * `InvalidInput` if the index count differs from the batch size or an
///   index is out of range
/// * `InferenceFailure` for any forward pass error, or when the pass yields
///   no input gradient
pub fn compute_saliency<B, M>(
    classifier: Option<&M>,
    input: &Tensor<B, 4>,
    class_indices: &[usize],
) -> Result<SaliencyMap>
where
    B: AutodiffBackend,
    M: Classifier<B>,
{
    let model = classifier.ok_or(MangoError::ModelNotLoaded)?;
    let [batch, height, width, _channels] = input.dims();

    if class_indices.len() != batch {
        return Err(MangoError::InvalidInput(format!(
            "{} class indices for a batch of {}",
            class_indices.len(),
            batch
        )));
    }
    let num_classes = model.num_classes();
    if let Some(&bad) = class_indices.iter().find(|&&c| c >= num_classes) {
        return Err(MangoError::InvalidInput(format!(
            "class index {} out of range for {} classes",
            bad, num_classes
        )));
    }

    debug!(
        "Computing saliency for classes {:?} over {}x{} input",
        class_indices, height, width
    );

    let device = input.device();
    let tracked = input.clone().detach().require_grad();

    let scores = model.predict(tracked.clone()).map_err(|e| match e {
        MangoError::InferenceFailure(_) => e,
        other => MangoError::InferenceFailure(format!("forward pass failed: {}", other)),
    })?;
    let [score_rows, score_cols] = scores.dims();
    if score_rows != batch || score_cols != num_classes {
        return Err(MangoError::InferenceFailure(format!(
            "classifier returned [{}, {}], expected [{}, {}]",
            score_rows, score_cols, batch, num_classes
        )));
    }

    // Gradients of independent examples do not mix, so one scalar suffices.
    let objective = (scores * one_hot_rows::<B>(class_indices, num_classes, &device)).sum();
    let grads = objective.backward();
    let gradient = tracked
        .grad(&grads)
        .ok_or_else(|| MangoError::InferenceFailure("no gradient for input".to_string()))?;

    let magnitude: Vec<f32> = gradient
        .abs()
        .mean_dim(3)
        .reshape([batch, height, width])
        .into_data()
        .to_vec()
        .map_err(|e| MangoError::InferenceFailure(format!("reading saliency data: {:?}", e)))?;

    let map = SaliencyMap::from_raw(batch, height, width, magnitude)?;
    if map.is_degenerate() {
        warn!("Saliency gradient is zero everywhere; returning an empty map");
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_approx_eq, FailingClassifier, FixedLogits, LinearScorer};
    use burn::backend::Autodiff;
    use burn::tensor::ElementConversion;
    use burn_ndarray::NdArray;

    type TestBackend = Autodiff<NdArray>;

    /// Rejects every input as malformed
    struct RejectingClassifier;

    impl<B: Backend> Classifier<B> for RejectingClassifier {
        fn num_classes(&self) -> usize {
            2
        }

        fn input_size(&self) -> usize {
            2
        }

        fn predict(&self, _input: Tensor<B, 4>) -> Result<Tensor<B, 2>> {
            Err(MangoError::InvalidInput("unexpected layout".to_string()))
        }
    }

    /// 2x2x3 linear scorer. Class 0 weights grow per pixel with mixed signs,
    /// class 1 weights are a constant -2.
    fn two_class_scorer(device: &<TestBackend as Backend>::Device) -> LinearScorer<TestBackend> {
        let mut weights = Vec::new();
        for pixel in 0..4 {
            for channel in 0..3 {
                let sign = if channel == 1 { -1.0 } else { 1.0 };
                weights.push(sign * (pixel + 1) as f32);
                weights.push(-2.0);
            }
        }
        LinearScorer::new(weights, 2, 3, 2, device)
    }

    fn input(batch: usize, device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 4> {
        Tensor::<TestBackend, 4>::ones([batch, 2, 2, 3], device) * 0.5
    }

    #[test]
    fn test_saliency_matches_weight_magnitude() {
        let device = Default::default();
        let model = two_class_scorer(&device);

        let map = compute_saliency(Some(&model), &input(1, &device), &[0]).unwrap();

        assert_eq!(map.dims(), [1, 2, 2]);
        assert!(!map.is_degenerate());
        let expected = [0.25, 0.5, 0.75, 1.0];
        for (value, want) in map.values().iter().zip(expected) {
            assert_approx_eq(*value, want, 1e-6);
        }
        assert_eq!(map.max(), 1.0);
    }

    #[test]
    fn test_saliency_normalizes_across_batch() {
        let device = Default::default();
        let model = two_class_scorer(&device);

        let map = compute_saliency(Some(&model), &input(2, &device), &[0, 1]).unwrap();

        assert_eq!(map.dims(), [2, 2, 2]);
        assert_approx_eq(map.get(0, 1, 1).unwrap(), 1.0, 1e-6);
        // Class 1 has |w| = 2 everywhere against a global maximum of 4
        for row in 0..2 {
            for col in 0..2 {
                assert_approx_eq(map.get(1, row, col).unwrap(), 0.5, 1e-6);
            }
        }
    }

    #[test]
    fn test_saliency_does_not_consume_input() {
        let device = Default::default();
        let model = two_class_scorer(&device);
        let x = input(1, &device);

        let _ = compute_saliency(Some(&model), &x, &[1]).unwrap();
        let total: f32 = x.sum().into_scalar().elem();

        assert_approx_eq(total, 6.0, 1e-6);
    }

    #[test]
    fn test_missing_model() {
        let device = Default::default();
        let none: Option<&LinearScorer<TestBackend>> = None;

        let err = compute_saliency(none, &input(1, &device), &[0]).unwrap_err();
        assert!(matches!(err, MangoError::ModelNotLoaded));
    }

    #[test]
    fn test_forward_failure_propagates() {
        let device = Default::default();
        let model = FailingClassifier;

        let err = compute_saliency::<TestBackend, _>(Some(&model), &input(1, &device), &[0])
            .unwrap_err();
        assert!(matches!(err, MangoError::InferenceFailure(_)));
    }

    #[test]
    fn test_forward_error_reported_as_inference_failure() {
        let device = Default::default();

        let err = compute_saliency::<TestBackend, _>(
            Some(&RejectingClassifier),
            &input(1, &device),
            &[0],
        )
        .unwrap_err();
        assert!(matches!(err, MangoError::InferenceFailure(ref msg) if msg.contains("unexpected layout")));
    }

    #[test]
    fn test_class_index_validation() {
        let device = Default::default();
        let model = two_class_scorer(&device);

        let out_of_range = compute_saliency(Some(&model), &input(1, &device), &[2]);
        assert!(matches!(out_of_range, Err(MangoError::InvalidInput(_))));

        let wrong_count = compute_saliency(Some(&model), &input(2, &device), &[0]);
        assert!(matches!(wrong_count, Err(MangoError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_gradient_is_degenerate() {
        let device = Default::default();
        let model = FixedLogits::<TestBackend>::uniform(8, 2, &device);

        let map = compute_saliency(Some(&model), &input(1, &device), &[3]).unwrap();

        assert!(map.is_degenerate());
        assert!(map.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_from_raw_sanitizes() {
        let map = SaliencyMap::from_raw(1, 1, 4, vec![f32::NAN, 2.0, -4.0, f32::INFINITY]).unwrap();

        assert_eq!(map.values(), &[0.0, 0.5, 1.0, 0.0]);
        assert!(SaliencyMap::from_raw(1, 2, 2, vec![0.0; 3]).is_err());
    }

    #[test]
    fn test_heatmap_access() {
        let map = SaliencyMap::from_raw(2, 1, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let second = map.heatmap(1).unwrap();

        assert_eq!(second.height(), 1);
        assert_eq!(second.width(), 2);
        assert_eq!(second.get(0, 1), Some(1.0));
        assert_eq!(map.get(0, 0, 1), Some(0.5));
        assert!(map.heatmap(2).is_none());
        assert!(map.get(0, 1, 0).is_none());
    }

    #[test]
    fn test_heatmap_from_rows() {
        let heatmap = Heatmap::from_rows(&[vec![0.0, 0.5], vec![1.0, 0.25]]).unwrap();
        assert_eq!(heatmap.get(1, 0), Some(1.0));

        let ragged = Heatmap::from_rows(&[vec![0.0, 0.5], vec![1.0]]);
        assert!(ragged.is_err());
    }
}
