//! Colour gradient used to visualize saliency values.

use image::Rgb;

/// Heatmap colour stops, evenly spaced over `[0, 1]`: blue, cyan, green,
/// yellow, red
pub const HEATMAP_STOPS: [[u8; 3]; 5] = [
    [0, 0, 255],
    [0, 255, 255],
    [0, 255, 0],
    [255, 255, 0],
    [255, 0, 0],
];

/// Piecewise-linear colour ramp over `[0, 1]` with uniformly spaced stops
#[derive(Debug, Clone, PartialEq)]
pub struct ColorGradient {
    stops: [[f32; 3]; 5],
}

impl Default for ColorGradient {
    fn default() -> Self {
        Self {
            stops: HEATMAP_STOPS.map(|c| [c[0] as f32, c[1] as f32, c[2] as f32]),
        }
    }
}

impl ColorGradient {
    /// Unrounded colour at `value`. Values at or below 0 (and NaN) map to the
    /// first stop, values at or above 1 to the last.
    pub fn interpolate(&self, value: f32) -> [f32; 3] {
        let last = self.stops.len() - 1;
        if value.is_nan() || value <= 0.0 {
            return self.stops[0];
        }
        if value >= 1.0 {
            return self.stops[last];
        }

        let scaled = value * last as f32;
        let index = (scaled.floor() as usize).min(last - 1);
        let t = scaled - index as f32;

        let from = self.stops[index];
        let to = self.stops[index + 1];
        [
            from[0] + (to[0] - from[0]) * t,
            from[1] + (to[1] - from[1]) * t,
            from[2] + (to[2] - from[2]) * t,
        ]
    }

    /// Rounded colour at `value`
    pub fn color_at(&self, value: f32) -> Rgb<u8> {
        let [r, g, b] = self.interpolate(value);
        Rgb([r.round() as u8, g.round() as u8, b.round() as u8])
    }
}
