//! Contains various types needed across the crate.

use crate::{InvalidInput, MAX_COLORS, MAX_PIXELS, MIN_COLORS};
use image::{imageops, RgbImage};
use palette::{
    cast::{ComponentsAs, IntoComponents},
    Srgb,
};
use std::{fmt::Display, time::Duration};

/// An immutable, row-major grid of 8-bit sRGB pixels.
///
/// A [`PixelGrid`] always has non-zero dimensions, exactly `width * height` pixels,
/// and at most [`MAX_PIXELS`] pixels.
///
/// # Examples
/// From a `Vec` of colors:
/// ```
/// # use quantbench::{PixelGrid, InvalidInput};
/// # use palette::Srgb;
/// # fn main() -> Result<(), InvalidInput> {
/// let pixels = vec![Srgb::new(0, 0, 0), Srgb::new(255, 255, 255)];
/// let grid = PixelGrid::new(2, 1, pixels)?;
/// assert_eq!(grid.num_pixels(), 2);
/// # Ok(())
/// # }
/// ```
///
/// From an [`RgbImage`]:
/// ```no_run
/// # use quantbench::PixelGrid;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let img = image::RgbImage::new(1, 1);
/// let grid = PixelGrid::try_from(&img)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    /// The number of columns.
    width: u32,
    /// The number of rows.
    height: u32,
    /// The pixels in row-major order.
    pixels: Vec<Srgb<u8>>,
}

impl PixelGrid {
    /// Creates a new [`PixelGrid`] from row-major pixels.
    ///
    /// # Errors
    /// Returns an [`InvalidInput`] if either dimension is zero, the grid would be larger than
    /// [`MAX_PIXELS`], or `pixels` does not contain exactly `width * height` colors.
    pub fn new(width: u32, height: u32, pixels: Vec<Srgb<u8>>) -> Result<Self, InvalidInput> {
        let expected = Self::validate_dimensions(width, height)?;
        if pixels.len() as u64 == expected {
            Ok(Self { width, height, pixels })
        } else {
            Err(InvalidInput::ShapeMismatch {
                width,
                height,
                actual: pixels.len(),
            })
        }
    }

    /// Creates a new [`PixelGrid`] from interleaved `[r, g, b, r, g, b, ...]` bytes.
    ///
    /// # Errors
    /// See [`PixelGrid::new`].
    pub fn from_raw(width: u32, height: u32, bytes: &[u8]) -> Result<Self, InvalidInput> {
        if bytes.len() % 3 != 0 {
            return Err(InvalidInput::ShapeMismatch {
                width,
                height,
                actual: bytes.len() / 3,
            });
        }
        let pixels: &[Srgb<u8>] = bytes.components_as();
        Self::new(width, height, pixels.to_vec())
    }

    /// Creates a new [`PixelGrid`] by calling `f(x, y)` for each pixel in row-major order.
    ///
    /// # Errors
    /// Returns an [`InvalidInput`] if either dimension is zero
    /// or the grid would be larger than [`MAX_PIXELS`].
    pub fn from_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> Srgb<u8>,
    ) -> Result<Self, InvalidInput> {
        Self::validate_dimensions(width, height)?;
        let pixels = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();

        Ok(Self { width, height, pixels })
    }

    /// Creates a [`PixelGrid`] without validating its shape.
    pub(crate) fn new_unchecked(width: u32, height: u32, pixels: Vec<Srgb<u8>>) -> Self {
        debug_assert_eq!(pixels.len() as u64, u64::from(width) * u64::from(height));
        Self { width, height, pixels }
    }

    /// Checks the dimensions and returns the number of pixels they describe.
    fn validate_dimensions(width: u32, height: u32) -> Result<u64, InvalidInput> {
        let len = u64::from(width) * u64::from(height);
        if len == 0 {
            Err(InvalidInput::Empty)
        } else if len > u64::from(MAX_PIXELS) {
            Err(InvalidInput::TooManyPixels(len))
        } else {
            Ok(len)
        }
    }

    /// The number of columns in the grid.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// The number of rows in the grid.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Returns `(width, height)`.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The row-major pixels of the grid.
    #[must_use]
    pub fn pixels(&self) -> &[Srgb<u8>] {
        &self.pixels
    }

    /// The number of pixels in the grid as a `u32`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn num_pixels(&self) -> u32 {
        self.pixels.len() as u32
    }

    /// Returns the pixel at column `x` and row `y`, if it is in bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<Srgb<u8>> {
        if x < self.width && y < self.height {
            Some(self.pixels[y as usize * self.width as usize + x as usize])
        } else {
            None
        }
    }

    /// Converts the grid into an [`RgbImage`].
    #[must_use]
    pub fn to_rgbimage(&self) -> RgbImage {
        let buf = self.pixels.clone().into_components();

        #[allow(clippy::expect_used)]
        {
            // self.pixels.len() is equal to width * height by construction
            RgbImage::from_vec(self.width, self.height, buf).expect("large enough buffer")
        }
    }

    /// Resamples the grid to `width` by `height` with a triangle (bilinear) filter.
    pub(crate) fn resized(&self, width: u32, height: u32) -> Self {
        if self.dimensions() == (width, height) {
            return self.clone();
        }

        let resized = imageops::resize(
            &self.to_rgbimage(),
            width,
            height,
            imageops::FilterType::Triangle,
        );

        let pixels: &[Srgb<u8>] = resized.as_raw().as_slice().components_as();
        Self::new_unchecked(width, height, pixels.to_vec())
    }
}

impl TryFrom<&RgbImage> for PixelGrid {
    type Error = InvalidInput;

    fn try_from(image: &RgbImage) -> Result<Self, Self::Error> {
        let (width, height) = image.dimensions();
        let len = usize::try_from(Self::validate_dimensions(width, height)?)
            .map_err(|_| InvalidInput::TooManyPixels(u64::from(width) * u64::from(height)))?;
        Self::from_raw(width, height, &image.as_raw()[..(len * 3)])
    }
}

impl From<&PixelGrid> for RgbImage {
    fn from(grid: &PixelGrid) -> Self {
        grid.to_rgbimage()
    }
}

/// This type is used to specify the maximum number of colors to include in a palette.
///
/// This is a simple new type wrapper around `u16` with the invariant that it must be
/// in the range [`MIN_COLORS`]`..=`[`MAX_COLORS`].
///
/// # Examples
/// Use `try_into` or [`PaletteSize::from_clamped`] to create [`PaletteSize`]s.
/// ```
/// # use quantbench::{PaletteSize, InvalidInput};
/// # fn main() -> Result<(), InvalidInput> {
/// let size = PaletteSize::try_from(16u32)?;
/// let size: PaletteSize = 128u16.try_into()?;
/// assert_eq!(PaletteSize::from_clamped(1024), PaletteSize::MAX);
/// assert_eq!(PaletteSize::from_clamped(1), PaletteSize::MIN);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PaletteSize(u16);

impl PaletteSize {
    /// The minimum supported palette size (given by [`MIN_COLORS`]).
    pub const MIN: Self = Self(MIN_COLORS);

    /// The maximum supported palette size (given by [`MAX_COLORS`]).
    pub const MAX: Self = Self(MAX_COLORS);

    /// Gets the inner `u16` value.
    #[must_use]
    pub const fn into_inner(self) -> u16 {
        self.0
    }

    /// Gets the inner value as a `usize`.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Creates a [`PaletteSize`] by clamping the given value to [`MIN_COLORS`]`..=`[`MAX_COLORS`].
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_clamped(value: u32) -> Self {
        if value < MIN_COLORS as u32 {
            Self::MIN
        } else if value > MAX_COLORS as u32 {
            Self::MAX
        } else {
            Self(value as u16)
        }
    }
}

impl Default for PaletteSize {
    fn default() -> Self {
        Self(8)
    }
}

impl From<PaletteSize> for u16 {
    fn from(val: PaletteSize) -> Self {
        val.into_inner()
    }
}

impl TryFrom<u32> for PaletteSize {
    type Error = InvalidInput;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if (u32::from(MIN_COLORS)..=u32::from(MAX_COLORS)).contains(&value) {
            Ok(Self::from_clamped(value))
        } else {
            Err(InvalidInput::PaletteSize(value))
        }
    }
}

impl TryFrom<u16> for PaletteSize {
    type Error = InvalidInput;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::try_from(u32::from(value))
    }
}

impl Display for PaletteSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.into_inner())
    }
}

/// The output of a strategy's palette reduction over deduplicated colors.
///
/// `indices` has one entry per unique color of the
/// [`IndexedColorCounts`](crate::IndexedColorCounts) the strategy was given,
/// each an index into `palette`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuantizeOutput {
    /// The computed color palette.
    ///
    /// The colors in the palette are not guaranteed to be unique.
    pub palette: Vec<Srgb<u8>>,
    /// The palette index for each unique color.
    pub indices: Vec<u8>,
}

impl QuantizeOutput {
    /// Returns an output where each unique color maps to itself.
    ///
    /// The number of unique colors must not be greater than [`MAX_COLORS`].
    #[must_use]
    pub(crate) fn trivial(colors: &[Srgb<u8>]) -> Self {
        debug_assert!(colors.len() <= crate::MAX_K);

        #[allow(clippy::cast_possible_truncation)]
        let indices = (0..colors.len()).map(|i| i as u8).collect();

        Self { palette: colors.to_vec(), indices }
    }
}

/// The result of running one quantization strategy on a [`PixelGrid`].
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedResult {
    /// The recolored image, with the same dimensions as the input.
    pub image: PixelGrid,
    /// The palette used to recolor the image, holding at most the requested number of colors.
    pub palette: Vec<Srgb<u8>>,
    /// The number of pixels recolored with each palette entry.
    pub counts: Vec<u32>,
    /// The wall-clock time the strategy took.
    pub elapsed: Duration,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn grid_shape_is_validated() {
        let pixels = vec![Srgb::new(1, 2, 3); 6];
        assert!(PixelGrid::new(2, 3, pixels.clone()).is_ok());
        assert_eq!(
            PixelGrid::new(4, 2, pixels.clone()),
            Err(InvalidInput::ShapeMismatch { width: 4, height: 2, actual: 6 })
        );
        assert_eq!(PixelGrid::new(0, 3, Vec::new()), Err(InvalidInput::Empty));
        assert_eq!(
            PixelGrid::from_fn(MAX_PIXELS, 2, |_, _| Srgb::new(0, 0, 0)),
            Err(InvalidInput::TooManyPixels(u64::from(MAX_PIXELS) * 2))
        );
    }

    #[test]
    fn raw_bytes_are_interleaved() {
        let grid = PixelGrid::from_raw(2, 1, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(grid.pixels(), &[Srgb::new(1, 2, 3), Srgb::new(4, 5, 6)]);
        assert!(PixelGrid::from_raw(2, 1, &[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn from_fn_is_row_major() {
        #[allow(clippy::cast_possible_truncation)]
        let grid = PixelGrid::from_fn(3, 2, |x, y| Srgb::new(x as u8, y as u8, 0)).unwrap();
        assert_eq!(grid.get(2, 1), Some(Srgb::new(2, 1, 0)));
        assert_eq!(grid.pixels()[4], Srgb::new(1, 1, 0));
        assert_eq!(grid.get(3, 0), None);
    }

    #[test]
    fn rgbimage_round_trip() {
        let grid = crate::tests::random_grid(7, 5, 3);
        let image = grid.to_rgbimage();
        assert_eq!(image.dimensions(), (7, 5));
        assert_eq!(PixelGrid::try_from(&image).unwrap(), grid);
    }

    #[test]
    fn resize_keeps_uniform_color() {
        let color = Srgb::new(10, 200, 30);
        let grid = PixelGrid::from_fn(3, 7, |_, _| color).unwrap();
        let resized = grid.resized(20, 20);
        assert_eq!(resized.dimensions(), (20, 20));
        assert!(resized.pixels().iter().all(|&c| c == color));
    }

    #[test]
    fn palette_size_range() {
        assert_eq!(PaletteSize::try_from(2u32).unwrap().into_inner(), 2);
        assert_eq!(PaletteSize::try_from(256u16).unwrap(), PaletteSize::MAX);
        assert_eq!(PaletteSize::try_from(1u32), Err(InvalidInput::PaletteSize(1)));
        assert_eq!(PaletteSize::try_from(300u32), Err(InvalidInput::PaletteSize(300)));
        assert_eq!(PaletteSize::from_clamped(0), PaletteSize::MIN);
        assert_eq!(PaletteSize::from_clamped(100).as_usize(), 100);
    }
}
