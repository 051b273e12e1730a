//! CNN Model Architecture for Mango Leaf Disease Classification
//!
//! A compact convolutional network built with Burn. Inputs arrive channel-last
//! (`[batch, height, width, 3]`, values in `[0, 1]`) and are permuted to the
//! NCHW layout Burn's convolutions expect.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use crate::classes::NUM_CLASSES;
use crate::model::classifier::Classifier;
use crate::utils::error::MangoError;

/// Configuration for the LeafClassifier CNN model
#[derive(Config, Debug)]
pub struct LeafClassifierConfig {
    /// Number of output classes
    #[config(default = "8")]
    pub num_classes: usize,

    /// Input image size (assumes square images)
    #[config(default = "224")]
    pub input_size: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Base number of convolutional filters
    #[config(default = "32")]
    pub base_filters: usize,
}

/// A CNN block with Conv2d, BatchNorm, ReLU, and optional MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B>,
    pub relu: Relu,
    pub pool: Option<MaxPool2d>,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        with_pool: bool,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        let bn = BatchNormConfig::new(out_channels).init(device);

        let pool = if with_pool {
            Some(MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init())
        } else {
            None
        };

        Self {
            conv,
            bn,
            relu: Relu::new(),
            pool,
        }
    }

    /// Forward pass with batch norm frozen to its running statistics.
    ///
    /// On an autodiff backend `BatchNorm::forward` normalizes with batch
    /// statistics; attribution must see the same function as inference.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.frozen_batch_norm(x);
        let x = self.relu.forward(x);

        match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        }
    }

    fn frozen_batch_norm(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, channels, _, _] = x.dims();
        let shape = [1, channels, 1, 1];

        let mean = self.bn.running_mean.value().reshape(shape);
        let var = self.bn.running_var.value().reshape(shape);
        let gamma = self.bn.gamma.val().reshape(shape);
        let beta = self.bn.beta.val().reshape(shape);

        let std = var.add_scalar(self.bn.epsilon).sqrt();
        (x - mean) / std * gamma + beta
    }
}

/// Mango Leaf Disease Classifier CNN
///
/// Architecture:
/// - 4 convolutional blocks with increasing filter sizes
/// - BatchNorm and ReLU after each convolution
/// - MaxPooling after each block
/// - Global Average Pooling
/// - Two fully connected layers
#[derive(Module, Debug)]
pub struct LeafClassifier<B: Backend> {
    pub conv1: ConvBlock<B>,
    pub conv2: ConvBlock<B>,
    pub conv3: ConvBlock<B>,
    pub conv4: ConvBlock<B>,

    pub global_pool: AdaptiveAvgPool2d,

    pub fc1: Linear<B>,
    pub fc2: Linear<B>,

    num_classes: usize,
    input_size: usize,
    in_channels: usize,
}

impl<B: Backend> LeafClassifier<B> {
    /// Create a new LeafClassifier from configuration
    pub fn new(config: &LeafClassifierConfig, device: &B::Device) -> Self {
        let base = config.base_filters;

        // 3 -> 32 -> 64 -> 128 -> 256, spatial 224 -> 14
        let conv1 = ConvBlock::new(config.in_channels, base, 3, true, device);
        let conv2 = ConvBlock::new(base, base * 2, 3, true, device);
        let conv3 = ConvBlock::new(base * 2, base * 4, 3, true, device);
        let conv4 = ConvBlock::new(base * 4, base * 8, 3, true, device);

        let global_pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();

        let fc1 = LinearConfig::new(base * 8, 256).init(device);
        let fc2 = LinearConfig::new(256, config.num_classes).init(device);

        Self {
            conv1,
            conv2,
            conv3,
            conv4,
            global_pool,
            fc1,
            fc2,
            num_classes: config.num_classes,
            input_size: config.input_size,
            in_channels: config.in_channels,
        }
    }

    /// Deterministic forward pass over an NCHW batch
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);
        let x = self.conv4.forward(x);

        // [B, C, H, W] -> [B, C, 1, 1] -> [B, C]
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        self.fc2.forward(x)
    }
}

impl<B: Backend> Classifier<B> for LeafClassifier<B> {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn predict(&self, input: Tensor<B, 4>) -> crate::utils::error::Result<Tensor<B, 2>> {
        let [batch, height, width, channels] = input.dims();

        if batch == 0 {
            return Err(MangoError::InferenceFailure("empty batch".to_string()));
        }
        if height != self.input_size || width != self.input_size || channels != self.in_channels {
            return Err(MangoError::InferenceFailure(format!(
                "expected input [_, {s}, {s}, {c}], got [{batch}, {height}, {width}, {channels}]",
                s = self.input_size,
                c = self.in_channels,
            )));
        }

        // NHWC -> NCHW
        Ok(self.forward(input.permute([0, 3, 1, 2])))
    }
}

impl LeafClassifierConfig {
    /// Configuration matching the published mango model
    pub fn mango() -> Self {
        Self::new().with_num_classes(NUM_CLASSES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;

    type TestBackend = Autodiff<NdArray>;

    fn small_config() -> LeafClassifierConfig {
        LeafClassifierConfig::mango()
            .with_input_size(32)
            .with_base_filters(4)
    }

    #[test]
    fn test_leaf_classifier_output_shape() {
        let device = Default::default();
        let model = LeafClassifier::<TestBackend>::new(&small_config(), &device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, NUM_CLASSES]);
    }

    #[test]
    fn test_predict_accepts_channel_last() {
        let device = Default::default();
        let model = LeafClassifier::<TestBackend>::new(&small_config(), &device);

        let input = Tensor::<TestBackend, 4>::ones([1, 32, 32, 3], &device);
        let output = model.predict(input).expect("prediction should succeed");

        assert_eq!(output.dims(), [1, NUM_CLASSES]);
    }

    #[test]
    fn test_predict_rejects_wrong_layout() {
        let device = Default::default();
        let model = LeafClassifier::<TestBackend>::new(&small_config(), &device);

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 32, 32], &device);
        let err = model.predict(input).unwrap_err();

        assert!(matches!(err, MangoError::InferenceFailure(_)));
    }

    #[test]
    fn test_predict_is_deterministic() {
        let device = Default::default();
        let model = LeafClassifier::<TestBackend>::new(&small_config(), &device);

        let input = Tensor::<TestBackend, 4>::ones([1, 32, 32, 3], &device) * 0.5;
        let first: Vec<f32> = model
            .predict(input.clone())
            .unwrap()
            .into_data()
            .to_vec()
            .unwrap();
        let second: Vec<f32> = model.predict(input).unwrap().into_data().to_vec().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_prediction_ignores_batch_companions() {
        let device = Default::default();
        let model = LeafClassifier::<TestBackend>::new(&small_config(), &device);

        let alone = Tensor::<TestBackend, 4>::ones([1, 32, 32, 3], &device) * 0.5;
        let pair = Tensor::cat(
            vec![
                alone.clone(),
                Tensor::<TestBackend, 4>::zeros([1, 32, 32, 3], &device),
            ],
            0,
        );

        let single: Vec<f32> = model.predict(alone).unwrap().into_data().to_vec().unwrap();
        let batched: Vec<f32> = model.predict(pair).unwrap().into_data().to_vec().unwrap();

        // Frozen batch norm: the first row does not depend on the second example
        for (a, b) in single.iter().zip(&batched[..NUM_CLASSES]) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}
