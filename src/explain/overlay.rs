//! Heatmap overlay rendering.
//!
//! The heatmap is upsampled to the photo's resolution by nearest-neighbour
//! ratio sampling: destination pixel `(x, y)` reads cell
//! `(floor(y * rows / height), floor(x * cols / width))`. Each sampled value
//! goes through the colour gradient and is alpha-blended over the photo.

use std::io::Cursor;

use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tracing::debug;

use crate::explain::gradient::ColorGradient;
use crate::explain::saliency::Heatmap;
use crate::utils::error::{MangoError, Result};

/// Default overlay opacity
pub const DEFAULT_ALPHA: f32 = 0.5;

/// Largest canvas the renderer will allocate
pub const MAX_SURFACE_PIXELS: u64 = 1 << 28;

/// Photo with the heatmap blended in. Same dimensions as the photo.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeImage {
    image: RgbaImage,
}

impl CompositeImage {
    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pixel at `(x, y)`
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        if x < self.width() && y < self.height() {
            Some(*self.image.get_pixel(x, y))
        } else {
            None
        }
    }

    /// Borrow the raster
    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// Encode as PNG
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.image.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }

    /// Encode as a `data:image/png;base64,` URL
    pub fn to_data_url(&self) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(self.to_png_bytes()?);
        Ok(format!("data:image/png;base64,{}", encoded))
    }
}

/// Blends heatmaps over photos
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    gradient: ColorGradient,
    alpha: f32,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self {
            gradient: ColorGradient::default(),
            alpha: DEFAULT_ALPHA,
        }
    }
}

impl OverlayRenderer {
    /// Renderer with the default gradient and the given opacity in `[0, 1]`
    pub fn new(alpha: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(MangoError::InvalidInput(format!(
                "alpha must be within [0, 1], got {}",
                alpha
            )));
        }
        Ok(Self {
            alpha,
            ..Self::default()
        })
    }

    /// Overlay opacity
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Blend `heatmap` over `image`.
    ///
    /// Fails with `RenderSurfaceUnavailable` when either has no area.
    pub fn render(&self, heatmap: &Heatmap, image: &DynamicImage) -> Result<CompositeImage> {
        let (width, height) = (image.width(), image.height());
        let pixels = width as u64 * height as u64;

        if pixels == 0 {
            return Err(MangoError::RenderSurfaceUnavailable(format!(
                "image is {}x{}",
                width, height
            )));
        }
        if pixels > MAX_SURFACE_PIXELS {
            return Err(MangoError::RenderSurfaceUnavailable(format!(
                "{}x{} exceeds the canvas limit",
                width, height
            )));
        }
        if heatmap.is_empty() {
            return Err(MangoError::RenderSurfaceUnavailable(
                "heatmap has no cells".to_string(),
            ));
        }

        debug!(
            "Rendering {}x{} heatmap over {}x{} image (alpha {})",
            heatmap.width(),
            heatmap.height(),
            width,
            height,
            self.alpha
        );

        let mut canvas = image.to_rgba8();
        let columns: Vec<usize> = (0..width)
            .map(|x| source_index(x, width, heatmap.width()))
            .collect();

        for y in 0..height {
            let row = source_index(y, height, heatmap.height());
            for x in 0..width {
                let value = heatmap.get(row, columns[x as usize]).unwrap_or(0.0);
                let overlay = self.gradient.color_at(value);

                let pixel = canvas.get_pixel_mut(x, y);
                for channel in 0..3 {
                    pixel[channel] = blend(pixel[channel], overlay[channel], self.alpha);
                }
                pixel[3] = 255;
            }
        }

        Ok(CompositeImage { image: canvas })
    }
}

/// Blend `heatmap` over `image` with the default gradient
pub fn render_overlay(heatmap: &Heatmap, image: &DynamicImage, alpha: f32) -> Result<CompositeImage> {
    OverlayRenderer::new(alpha)?.render(heatmap, image)
}

/// Nearest source cell for a destination coordinate
fn source_index(dest: u32, dest_len: u32, src_len: usize) -> usize {
    ((dest as u64 * src_len as u64) / dest_len as u64) as usize
}

fn blend(original: u8, overlay: u8, alpha: f32) -> u8 {
    (original as f32 * (1.0 - alpha) + overlay as f32 * alpha)
        .round()
        .clamp(0.0, 255.0) as u8
}
