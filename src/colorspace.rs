//! Conversion from 8-bit sRGB to CIELAB.
//!
//! Colors go through the standard sRGB → linear RGB → XYZ → CIELAB transform
//! with a D65 reference white. `L` lies in `[0, 100]` and `a`, `b` roughly in `[-128, 127]`.

use crate::PixelGrid;
use palette::{IntoColor, Lab, LinSrgb, Srgb};
#[cfg(feature = "threads")]
use rayon::prelude::*;

/// The minimum and maximum values of each CIELAB component reachable from 8-bit sRGB.
pub const LAB_COMPONENT_RANGES_FROM_SRGB: [(f32, f32); 3] = [
    (0.0, 100.0),
    (-86.182686, 98.23433),
    (-107.86016, 94.477974),
];

/// Converts a single sRGB color to CIELAB (D65).
#[must_use]
#[inline]
pub fn srgb_to_lab(color: Srgb<u8>) -> Lab {
    let linear: LinSrgb = color.into_linear();
    linear.into_color()
}

/// Converts every pixel of the grid to CIELAB, keeping the row-major order.
#[must_use]
pub fn to_lab(image: &PixelGrid) -> Vec<Lab> {
    image.pixels().iter().copied().map(srgb_to_lab).collect()
}

/// Converts every pixel of the grid to CIELAB in parallel, keeping the row-major order.
#[cfg(feature = "threads")]
#[must_use]
pub fn to_lab_par(image: &PixelGrid) -> Vec<Lab> {
    image.pixels().par_iter().copied().map(srgb_to_lab).collect()
}
