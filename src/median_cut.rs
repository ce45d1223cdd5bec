//! Median cut color quantization.
//!
//! The color population starts in a single box. The box with the greatest total squared error
//! is repeatedly split in two along the component with the largest variance,
//! at the pixel-weighted median, until the requested number of boxes is reached
//! or every box holds a single color. Each box is represented by its pixel-weighted mean.
//!
//! Median cut is slower to converge on a good palette than k-means but is fully deterministic,
//! which makes it a useful baseline.

// Reference: Paul Heckbert, Color image quantization for frame buffer display,
// ACM SIGGRAPH Computer Graphics, vol. 16, no. 3, 297–307, 1982.
// https://doi.org/10.1145/965145.801294

use crate::{IndexedColorCounts, PaletteSize, QuantizeOutput};
use ordered_float::OrderedFloat;
use palette::Srgb;
use std::{cmp::Reverse, collections::BinaryHeap};

/// The number of components in the color types.
const N: usize = 3;

/// A box over a subset of the unique colors.
#[derive(Debug, Clone, Default)]
struct ColorBox {
    /// Indices into the unique colors.
    items: Vec<u32>,
    /// The number of pixels in the box.
    count: u64,
    /// The pixel-weighted component sums.
    sum: [f64; N],
    /// The pixel-weighted sums of the squared components.
    sum_squared: [f64; N],
}

impl ColorBox {
    /// Creates a box over the given unique colors and computes its statistics.
    fn new(items: Vec<u32>, colors: &[[u8; N]], counts: &[u32]) -> Self {
        let mut count = 0;
        let mut sum = [0.0; N];
        let mut sum_squared = [0.0; N];
        for &i in &items {
            let i = i as usize;
            let n = counts[i];
            let nf = f64::from(n);
            count += u64::from(n);
            for c in 0..N {
                let x = f64::from(colors[i][c]);
                sum[c] += nf * x;
                sum_squared[c] += nf * x * x;
            }
        }

        Self { items, count, sum, sum_squared }
    }

    /// The pixel-weighted sum of squared deviations along each component.
    #[allow(clippy::cast_precision_loss)]
    fn component_errors(&self) -> [f64; N] {
        let n = self.count as f64;
        std::array::from_fn(|c| (self.sum_squared[c] - self.sum[c] * self.sum[c] / n).max(0.0))
    }

    /// The total squared error of the box.
    fn error(&self) -> f64 {
        self.component_errors().into_iter().sum()
    }

    /// Whether or not this box can be split further.
    fn is_splittable(&self) -> bool {
        self.items.len() > 1
    }

    /// The pixel-weighted mean color, rounded to 8 bits.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn mean(&self) -> Srgb<u8> {
        let n = self.count as f64;
        let [r, g, b] = self.sum.map(|s| (s / n).round().clamp(0.0, 255.0) as u8);
        Srgb::new(r, g, b)
    }

    /// Splits the box at the weighted median of its largest-variance component.
    ///
    /// Both halves are non-empty. The box must hold at least two colors.
    fn split(self, colors: &[[u8; N]], counts: &[u32]) -> (Self, Self) {
        debug_assert!(self.is_splittable());

        let errors = self.component_errors();
        let mut axis = 0;
        for c in 1..N {
            if errors[c] > errors[axis] {
                axis = c;
            }
        }

        let mut items = self.items;
        items.sort_unstable_by_key(|&i| {
            let color = colors[i as usize];
            (color[axis], color)
        });

        let half = self.count.div_ceil(2);
        let mut acc = 0;
        let mut median = items.len() - 1;
        for (j, &i) in items.iter().enumerate() {
            acc += u64::from(counts[i as usize]);
            if acc >= half {
                median = j;
                break;
            }
        }

        let split_at = (median + 1).clamp(1, items.len() - 1);
        let upper = items.split_off(split_at);

        (Self::new(items, colors, counts), Self::new(upper, colors, counts))
    }
}

/// Computes a palette of at most `palette_size` colors with median cut.
///
/// If there are no more unique colors than `palette_size`, the unique colors are returned as is.
/// Otherwise, the palette has exactly `palette_size` entries.
#[must_use]
pub fn indexed_palette(colors: &IndexedColorCounts, palette_size: PaletteSize) -> QuantizeOutput {
    if colors.len() <= palette_size.as_usize() {
        return QuantizeOutput::trivial(colors.colors());
    }

    let components = colors.color_components();
    let counts = colors.counts();

    #[allow(clippy::cast_possible_truncation)]
    let all = (0..colors.len() as u32).collect();
    let mut boxes = vec![ColorBox::new(all, &components, counts)];

    let mut queue = BinaryHeap::new();
    queue.push((OrderedFloat(boxes[0].error()), Reverse(0)));

    while boxes.len() < palette_size.as_usize() {
        let Some((_, Reverse(i))) = queue.pop() else {
            break;
        };

        let color_box = std::mem::take(&mut boxes[i]);
        let (lower, upper) = color_box.split(&components, counts);

        let j = boxes.len();
        for (index, new_box) in [(i, &lower), (j, &upper)] {
            if new_box.is_splittable() {
                queue.push((OrderedFloat(new_box.error()), Reverse(index)));
            }
        }

        boxes[i] = lower;
        boxes.push(upper);
    }

    let mut indices = vec![0; colors.len()];
    #[allow(clippy::cast_possible_truncation)]
    for (b, color_box) in boxes.iter().enumerate() {
        for &i in &color_box.items {
            indices[i as usize] = b as u8;
        }
    }

    QuantizeOutput {
        palette: boxes.iter().map(ColorBox::mean).collect(),
        indices,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::*;

    fn size(k: u32) -> PaletteSize {
        PaletteSize::try_from(k).unwrap()
    }

    #[test]
    fn not_enough_colors() {
        let colors = IndexedColorCounts::new(&grid_of(&distinct_colors(12), 8, 8));
        let output = indexed_palette(&colors, size(12));
        assert_eq!(output, QuantizeOutput::trivial(colors.colors()));
    }

    #[test]
    fn exact_palette_size() {
        let colors = IndexedColorCounts::new(&random_grid(30, 30, 4));
        for k in [2, 5, 16, 100, 256] {
            let output = indexed_palette(&colors, size(k));
            assert_eq!(output.palette.len(), k as usize);
            assert_eq!(output.indices.len(), colors.len());
            assert!(output.indices.iter().all(|&i| u32::from(i) < k));
        }
    }

    #[test]
    fn splits_along_largest_variance() {
        // red varies over the full range, green and blue barely move
        #[allow(clippy::cast_possible_truncation)]
        let palette = (0..64)
            .map(|i| Srgb::new((i * 4) as u8, 100 + (i % 2) as u8, 50))
            .collect::<Vec<_>>();
        let colors = IndexedColorCounts::new(&grid_of(&palette, 64, 4));

        let output = indexed_palette(&colors, size(2));
        let mut reds = output.palette.iter().map(|c| c.red).collect::<Vec<_>>();
        reds.sort_unstable();
        assert!(reds[0] < 128 && reds[1] > 128);

        // the lower half of the red axis maps to one box and the upper half to the other
        for (color, &i) in colors.colors().iter().zip(&output.indices) {
            let expected = usize::from(color.red >= 128);
            let lower = usize::from(output.palette[0].red > output.palette[1].red);
            assert_eq!(usize::from(i) ^ lower, expected);
        }
    }

    #[test]
    fn weighted_median_split() {
        // one heavily weighted color should end up alone in its box
        let mut pixels = vec![Srgb::new(0, 0, 0); 90];
        pixels.extend((0..10).map(|i| Srgb::new(200 + i, 0, 0)));
        let image = crate::PixelGrid::new(100, 1, pixels).unwrap();
        let colors = IndexedColorCounts::new(&image);

        let output = indexed_palette(&colors, size(2));
        assert!(output.palette.contains(&Srgb::new(0, 0, 0)));
    }

    #[test]
    fn box_mean_is_weighted() {
        let components = [[0, 0, 0], [100, 200, 50]];
        let color_box = ColorBox::new(vec![0, 1], &components, &[3, 1]);
        assert_eq!(color_box.mean(), Srgb::new(25, 50, 13));
        assert!(color_box.is_splittable());
        let (lower, upper) = color_box.split(&components, &[3, 1]);
        assert_eq!(lower.items, vec![0]);
        assert_eq!(upper.items, vec![1]);
        assert!(lower.error() == 0.0 && upper.error() == 0.0);
    }
}
