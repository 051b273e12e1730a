//! Utilities module for logging, error types, and console formatting

pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{MangoError, Result, ResultExt};
pub use logging::init_logging;

/// Format a probability as a fixed-width bar with a percentage
pub fn format_progress_bar(progress: f64, width: usize) -> String {
    let progress = progress.clamp(0.0, 1.0);
    let filled = (progress * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);

    format!(
        "[{}{}] {:.1}%",
        "█".repeat(filled),
        "░".repeat(empty),
        progress * 100.0
    )
}
