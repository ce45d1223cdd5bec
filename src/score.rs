//! Perceptual scoring of a quantized image against its original.
//!
//! The score is the mean CIEDE2000 color difference over corresponding pixel pairs.
//!
//! # Comparison resolution
//! Both images are first resampled to a fixed comparison size ([`COMPARISON_SIZE`] squared by default)
//! with a triangle (bilinear) filter, and only then converted to CIELAB and compared.
//! This keeps the cost of scoring constant regardless of the image size,
//! which matters since CIEDE2000 is far more expensive per pixel than any of the quantizers.
//! The trade-off is accuracy: resampling blends neighboring pixels, so dithering patterns
//! and errors confined to small details are partially averaged away, and the aspect ratio of
//! the image is not preserved. Scores are therefore only comparable between results scored
//! at the same comparison size. Identical images always score exactly `0`.

use crate::{colorspace, InvalidInput, PixelGrid};
use palette::color_difference::Ciede2000;
#[cfg(feature = "threads")]
use rayon::prelude::*;

/// The default side length of the square comparison images.
pub const COMPARISON_SIZE: u32 = 200;

/// The scores of one comparison between an original and a quantized image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scores {
    /// The mean CIEDE2000 difference. Lower is better.
    pub ciede2000: f64,
    /// The root mean squared RGB error, normalized to `[0, 1]`. Lower is better.
    pub rgb_rmse: f64,
}

/// Computes the mean CIEDE2000 difference between `original` and `quantized`
/// at the default comparison size.
///
/// See the [module documentation](self) for how the comparison resolution affects the result.
///
/// # Errors
/// Returns [`InvalidInput::DimensionMismatch`] if the two images do not have the same dimensions.
pub fn score(original: &PixelGrid, quantized: &PixelGrid) -> Result<f64, InvalidInput> {
    compare(original, quantized, COMPARISON_SIZE).map(|scores| scores.ciede2000)
}

/// Computes the normalized RGB root mean squared error between `original` and `quantized`
/// at the default comparison size.
///
/// # Errors
/// Returns [`InvalidInput::DimensionMismatch`] if the two images do not have the same dimensions.
pub fn rgb_rmse(original: &PixelGrid, quantized: &PixelGrid) -> Result<f64, InvalidInput> {
    compare(original, quantized, COMPARISON_SIZE).map(|scores| scores.rgb_rmse)
}

/// Computes all scores between `original` and `quantized`
/// after resampling both to `comparison_size` by `comparison_size` pixels.
///
/// A `comparison_size` of `0` is treated as `1`.
///
/// # Errors
/// Returns [`InvalidInput::DimensionMismatch`] if the two images do not have the same dimensions.
pub fn compare(
    original: &PixelGrid,
    quantized: &PixelGrid,
    comparison_size: u32,
) -> Result<Scores, InvalidInput> {
    if original.dimensions() != quantized.dimensions() {
        let (w1, h1) = original.dimensions();
        let (w2, h2) = quantized.dimensions();
        return Err(InvalidInput::DimensionMismatch(w1, h1, w2, h2));
    }

    let size = comparison_size.max(1);
    let original = original.resized(size, size);
    let quantized = quantized.resized(size, size);

    Ok(Scores {
        ciede2000: mean_ciede2000(&original, &quantized),
        rgb_rmse: normalized_rmse(&original, &quantized),
    })
}

/// The mean CIEDE2000 difference over corresponding pixels of two equally sized grids.
#[allow(clippy::cast_precision_loss)]
fn mean_ciede2000(original: &PixelGrid, quantized: &PixelGrid) -> f64 {
    #[cfg(feature = "threads")]
    let distances = {
        let original = colorspace::to_lab_par(original);
        let quantized = colorspace::to_lab_par(quantized);
        original
            .par_iter()
            .zip(&quantized)
            .map(|(&x, &y)| f64::from(x.difference(y)))
            .collect::<Vec<_>>()
    };

    #[cfg(not(feature = "threads"))]
    let distances = {
        let original = colorspace::to_lab(original);
        let quantized = colorspace::to_lab(quantized);
        original
            .iter()
            .zip(&quantized)
            .map(|(&x, &y)| f64::from(x.difference(y)))
            .collect::<Vec<_>>()
    };

    // summed in order so that the result does not depend on the thread count
    distances.iter().sum::<f64>() / distances.len() as f64
}

/// The RGB root mean squared error over corresponding pixels of two equally sized grids,
/// divided by the largest possible distance (`255 * sqrt(3)`).
#[allow(clippy::cast_precision_loss)]
fn normalized_rmse(original: &PixelGrid, quantized: &PixelGrid) -> f64 {
    let squared_error = original
        .pixels()
        .iter()
        .zip(quantized.pixels())
        .map(|(&x, &y)| u64::from(crate::traits::squared_distance(x, y)))
        .sum::<u64>();

    let mse = squared_error as f64 / original.pixels().len() as f64;
    mse.sqrt() / (255.0 * 3f64.sqrt())
}
