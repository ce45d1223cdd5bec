//! Most-frequent color quantization.
//!
//! Colors are grouped into coarse buckets by keeping only the top [`BUCKET_BITS`] bits of each
//! component, which gives `8 x 8 x 8` buckets. The `palette_size` buckets with the most pixels are
//! kept, each represented by the pixel-weighted mean of its colors, and colors from the remaining
//! buckets are mapped to the nearest kept color.
//!
//! This is the simplest and fastest method and serves as a naive baseline.
//! It ignores how colors are spread within a bucket, and an image that occupies only a few buckets
//! gets a palette with fewer colors than requested.

use crate::{traits::squared_distance, IndexedColorCounts, PaletteSize, QuantizeOutput};
use palette::Srgb;
use std::cmp::Reverse;

/// The number of high bits of each component that select a bucket.
pub const BUCKET_BITS: u32 = 3;

/// The number of low bits dropped from each component.
const SHIFT: u32 = u8::BITS - BUCKET_BITS;

/// The total number of buckets.
const NUM_BUCKETS: usize = 1 << (3 * BUCKET_BITS);

/// The index of the bucket holding `color`.
#[inline]
fn bucket_of(color: Srgb<u8>) -> usize {
    let [r, g, b] = <[u8; 3]>::from(color).map(|c| usize::from(c >> SHIFT));
    (r << (2 * BUCKET_BITS)) | (g << BUCKET_BITS) | b
}

/// The pixel count and component sums of one bucket.
#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    /// The number of pixels.
    count: u64,
    /// The pixel-weighted component sums.
    sum: [u64; 3],
}

impl Bucket {
    /// Adds `n` pixels of `color`.
    fn add(&mut self, color: Srgb<u8>, n: u32) {
        let n = u64::from(n);
        self.count += n;
        for (sum, c) in self.sum.iter_mut().zip(<[u8; 3]>::from(color)) {
            *sum += n * u64::from(c);
        }
    }

    /// The pixel-weighted mean color, rounded to 8 bits. The bucket must be non-empty.
    #[allow(clippy::cast_possible_truncation)]
    fn mean(&self) -> Srgb<u8> {
        let [r, g, b] = self.sum.map(|s| ((s + self.count / 2) / self.count) as u8);
        Srgb::new(r, g, b)
    }
}

/// Computes a palette from the `palette_size` most populated color buckets.
///
/// If there are no more unique colors than `palette_size`, the unique colors are returned as is.
/// Otherwise, the palette is sorted by bucket population in descending order,
/// with equally populated buckets in ascending bucket order.
#[must_use]
pub fn indexed_palette(colors: &IndexedColorCounts, palette_size: PaletteSize) -> QuantizeOutput {
    if colors.len() <= palette_size.as_usize() {
        return QuantizeOutput::trivial(colors.colors());
    }

    let mut buckets = vec![Bucket::default(); NUM_BUCKETS];
    for (&color, &n) in colors.colors().iter().zip(colors.counts()) {
        buckets[bucket_of(color)].add(color, n);
    }

    let mut ranked = (0..NUM_BUCKETS)
        .filter(|&b| buckets[b].count > 0)
        .collect::<Vec<_>>();

    // stable, so ties stay in bucket order
    ranked.sort_by_key(|&b| Reverse(buckets[b].count));
    ranked.truncate(palette_size.as_usize());

    let mut slots = vec![None; NUM_BUCKETS];
    #[allow(clippy::cast_possible_truncation)]
    for (i, &b) in ranked.iter().enumerate() {
        slots[b] = Some(i as u8);
    }

    let palette = ranked.iter().map(|&b| buckets[b].mean()).collect::<Vec<_>>();

    let indices = colors
        .colors()
        .iter()
        .map(|&color| slots[bucket_of(color)].unwrap_or_else(|| nearest(&palette, color)))
        .collect();

    QuantizeOutput { palette, indices }
}

/// The index of the first palette color closest to `color`.
#[allow(clippy::cast_possible_truncation)]
fn nearest(palette: &[Srgb<u8>], color: Srgb<u8>) -> u8 {
    palette
        .iter()
        .enumerate()
        .min_by_key(|&(_, &p)| squared_distance(p, color))
        .map_or(0, |(i, _)| i as u8)
}
