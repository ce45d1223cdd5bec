//! Contains the code for color/pixel deduplication.

use crate::PixelGrid;
use palette::Srgb;
#[cfg(feature = "threads")]
use rayon::prelude::*;

/// Packs a color into a `u32` key that sorts by red, then green, then blue.
#[inline]
fn pack(color: Srgb<u8>) -> u32 {
    (u32::from(color.red) << 16) | (u32::from(color.green) << 8) | u32::from(color.blue)
}

/// Reverses [`pack`].
#[inline]
#[allow(clippy::cast_possible_truncation)]
fn unpack(key: u32) -> Srgb<u8> {
    Srgb::new((key >> 16) as u8, (key >> 8) as u8, key as u8)
}

/// Deduplicated colors, their frequency counts, and an index into the unique colors for each pixel.
///
/// The unique colors are sorted in ascending order by their red, green, then blue components.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexedColorCounts {
    /// The unique colors.
    colors: Vec<Srgb<u8>>,
    /// The number of pixels with each unique color.
    counts: Vec<u32>,
    /// For each pixel, the index of its color in `colors`.
    indices: Vec<u32>,
}

impl IndexedColorCounts {
    /// Deduplicates the pixels of the given grid.
    #[must_use]
    pub fn new(image: &PixelGrid) -> Self {
        let pixels = image.pixels();

        let mut keys = pixels.iter().copied().map(pack).collect::<Vec<_>>();
        keys.sort_unstable();
        keys.dedup();

        #[allow(clippy::cast_possible_truncation)]
        let indices = pixels
            .iter()
            .map(|&color| {
                let key = pack(color);
                keys.partition_point(|&k| k < key) as u32
            })
            .collect::<Vec<_>>();

        Self::from_parts(&keys, indices)
    }

    /// Deduplicates the pixels of the given grid in parallel.
    #[cfg(feature = "threads")]
    #[must_use]
    pub fn new_par(image: &PixelGrid) -> Self {
        let pixels = image.pixels();

        let mut keys = pixels.par_iter().copied().map(pack).collect::<Vec<_>>();
        keys.par_sort_unstable();
        keys.dedup();

        #[allow(clippy::cast_possible_truncation)]
        let indices = pixels
            .par_iter()
            .map(|&color| {
                let key = pack(color);
                keys.partition_point(|&k| k < key) as u32
            })
            .collect::<Vec<_>>();

        Self::from_parts(&keys, indices)
    }

    /// Builds the unique colors and counts from the sorted keys and the pixel indices.
    fn from_parts(keys: &[u32], indices: Vec<u32>) -> Self {
        let mut counts = vec![0; keys.len()];
        for &i in &indices {
            counts[i as usize] += 1;
        }

        Self {
            colors: keys.iter().copied().map(unpack).collect(),
            counts,
            indices,
        }
    }

    /// The unique colors.
    #[must_use]
    pub fn colors(&self) -> &[Srgb<u8>] {
        &self.colors
    }

    /// The unique colors casted to component arrays.
    #[must_use]
    pub fn color_components(&self) -> Vec<[u8; 3]> {
        self.colors.iter().map(|&c| c.into()).collect()
    }

    /// The number of pixels with each unique color.
    ///
    /// Each count is non-zero.
    #[must_use]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// For each pixel, the index of its color in [`IndexedColorCounts::colors`].
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// The number of unique colors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Whether there are no colors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Expands per-unique-color palette indices into per-pixel palette indices.
    ///
    /// `palette_indices` must have one entry per unique color.
    #[must_use]
    pub fn map_indices(&self, palette_indices: &[u8]) -> Vec<u8> {
        self.indices
            .iter()
            .map(|&i| palette_indices[i as usize])
            .collect()
    }

    /// Expands per-unique-color palette indices into per-pixel palette indices in parallel.
    #[cfg(feature = "threads")]
    #[must_use]
    pub fn map_indices_par(&self, palette_indices: &[u8]) -> Vec<u8> {
        self.indices
            .par_iter()
            .map(|&i| palette_indices[i as usize])
            .collect()
    }
}
