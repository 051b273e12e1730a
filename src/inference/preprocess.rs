//! Image decoding and preprocessing
//!
//! Uploaded photos arrive as raw bytes or as data URLs. The network expects a
//! channel-last `[1, size, size, 3]` tensor with values in `[0, 1]`.

use std::path::Path;

use base64::Engine;
use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::{imageops::FilterType, DynamicImage};

use crate::utils::error::{MangoError, Result, ResultExt};

/// Decode an encoded image (PNG, JPEG, ...)
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}

/// Decode a `data:<mime>;base64,<payload>` URL
pub fn decode_data_url(url: &str) -> Result<DynamicImage> {
    let rest = url.strip_prefix("data:").context("not a data URL")?;
    let (header, payload) = rest.split_once(',').context("data URL has no payload")?;

    if !header.ends_with(";base64") {
        return Err(MangoError::InvalidInput(
            "only base64 data URLs are supported".to_string(),
        ));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .context("bad base64 payload")?;

    decode_image(&bytes)
}

/// Load an image from disk
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    if !path.exists() {
        return Err(MangoError::PathNotFound(path.to_path_buf()));
    }
    Ok(image::open(path)?)
}

/// Encode an image as a data URL for storage alongside a prediction
pub fn encode_data_url(image: &DynamicImage) -> Result<String> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    image.write_to(&mut buffer, image::ImageFormat::Png)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(buffer.into_inner());
    Ok(format!("data:image/png;base64,{}", encoded))
}

/// Resize to `size`x`size` (nearest neighbour) and scale RGB to `[0, 1]`.
/// Returns HWC-ordered values.
pub fn normalize_image(image: &DynamicImage, size: u32) -> Vec<f32> {
    let resized = image.resize_exact(size, size, FilterType::Nearest);
    resized
        .to_rgb8()
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.0)
        .collect()
}

/// Preprocess `image` into a `[1, size, size, 3]` tensor
pub fn to_input_tensor<B: Backend>(
    image: &DynamicImage,
    size: usize,
    device: &B::Device,
) -> Result<Tensor<B, 4>> {
    if image.width() == 0 || image.height() == 0 {
        return Err(MangoError::InvalidInput("image has no pixels".to_string()));
    }
    let data = normalize_image(image, size as u32);
    Ok(Tensor::from_data(
        TensorData::new(data, [1, size, size, 3]),
        device,
    ))
}
