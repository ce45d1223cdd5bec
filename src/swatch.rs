//! Rendering of palettes as strips of color swatches.

use crate::{PixelGrid, MAX_K};
use palette::Srgb;

/// The largest supported swatch side length. Larger sizes are clamped to this.
///
/// A full palette of [`MAX_COLORS`](crate::MAX_COLORS) swatches at this size stays well below
/// [`MAX_PIXELS`](crate::MAX_PIXELS).
pub const MAX_SWATCH_SIZE: u32 = 256;

/// Renders `palette` as a horizontal strip of square swatches, one per color in palette order.
///
/// The result is `swatch_size * palette.len()` pixels wide and `swatch_size` pixels tall.
/// An empty palette yields a single black swatch. `swatch_size` is clamped to `1..=`[`MAX_SWATCH_SIZE`],
/// and only the first [`MAX_COLORS`](crate::MAX_COLORS) colors of `palette` are rendered.
///
/// # Examples
/// ```
/// # use quantbench::render_palette;
/// # use palette::Srgb;
/// let strip = render_palette(&[Srgb::new(255, 0, 0), Srgb::new(0, 0, 255)], 4);
/// assert_eq!(strip.dimensions(), (8, 4));
/// assert_eq!(strip.get(5, 2), Some(Srgb::new(0, 0, 255)));
/// ```
#[must_use]
pub fn render_palette(palette: &[Srgb<u8>], swatch_size: u32) -> PixelGrid {
    const BLANK: [Srgb<u8>; 1] = [Srgb::new(0, 0, 0)];

    let size = swatch_size.clamp(1, MAX_SWATCH_SIZE);
    let palette: &[Srgb<u8>] = if palette.is_empty() {
        &BLANK
    } else {
        &palette[..palette.len().min(MAX_K)]
    };

    let row = palette
        .iter()
        .flat_map(|&color| std::iter::repeat(color).take(size as usize))
        .collect::<Vec<_>>();

    let pixels = row.repeat(size as usize);

    // at most 256 * 256 wide and 256 tall
    #[allow(clippy::cast_possible_truncation)]
    let width = row.len() as u32;
    PixelGrid::new_unchecked(width, size, pixels)
}
