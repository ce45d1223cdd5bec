use crate::{
    IndexedColorCounts, PaletteSize, PixelGrid, QuantizeOutput, QuantizedResult, StrategyError,
    StrategyFailure,
};
use palette::Srgb;
use std::time::Instant;

/// A palette reduction strategy.
///
/// Implementors reduce a population of unique colors to at most `palette_size` representative colors
/// and map every unique color to one of them. The provided [`Quantizer::quantize`] method takes care of
/// deduplicating pixels, timing, enforcing the palette bound, and rebuilding the recolored image.
///
/// Implementations must not keep mutable state between calls, so that the same quantizer
/// can be run repeatedly and from several threads.
pub trait Quantizer: Send + Sync {
    /// The name used to identify this strategy in reports.
    fn name(&self) -> &str;

    /// Computes a palette for the given unique colors.
    ///
    /// The returned [`QuantizeOutput`] must have one palette index per unique color.
    ///
    /// # Errors
    /// Returns a [`StrategyError`] if the strategy could not produce a palette.
    fn reduce(
        &self,
        colors: &IndexedColorCounts,
        palette_size: PaletteSize,
    ) -> Result<QuantizeOutput, StrategyError>;

    /// Quantizes `image` to at most `palette_size` colors.
    ///
    /// If the strategy returns more colors than requested, the palette is truncated to its first
    /// `palette_size` entries, and pixels assigned to a dropped entry are remapped to the nearest
    /// remaining color.
    ///
    /// # Errors
    /// Returns a [`StrategyFailure`] naming this strategy if [`Quantizer::reduce`] failed
    /// or returned malformed output.
    fn quantize(
        &self,
        image: &PixelGrid,
        palette_size: PaletteSize,
    ) -> Result<QuantizedResult, StrategyFailure> {
        let start = Instant::now();

        #[cfg(feature = "threads")]
        let colors = IndexedColorCounts::new_par(image);
        #[cfg(not(feature = "threads"))]
        let colors = IndexedColorCounts::new(image);

        let output = self
            .reduce(&colors, palette_size)
            .and_then(|output| bounded(output, &colors, palette_size))
            .map_err(|error| StrategyFailure::new(self.name(), error))?;

        #[cfg(feature = "threads")]
        let indices = colors.map_indices_par(&output.indices);
        #[cfg(not(feature = "threads"))]
        let indices = colors.map_indices(&output.indices);

        let QuantizeOutput { palette, .. } = output;

        let mut counts = vec![0; palette.len()];
        let pixels = indices
            .into_iter()
            .map(|i| {
                let i = usize::from(i);
                counts[i] += 1;
                palette[i]
            })
            .collect();

        let (width, height) = image.dimensions();
        let image = PixelGrid::new_unchecked(width, height, pixels);

        Ok(QuantizedResult {
            image,
            palette,
            counts,
            elapsed: start.elapsed(),
        })
    }
}

impl<T: Quantizer + ?Sized> Quantizer for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn reduce(
        &self,
        colors: &IndexedColorCounts,
        palette_size: PaletteSize,
    ) -> Result<QuantizeOutput, StrategyError> {
        (**self).reduce(colors, palette_size)
    }

    fn quantize(
        &self,
        image: &PixelGrid,
        palette_size: PaletteSize,
    ) -> Result<QuantizedResult, StrategyFailure> {
        (**self).quantize(image, palette_size)
    }
}

/// The squared Euclidean distance between two 8-bit colors.
#[inline]
pub(crate) fn squared_distance(x: Srgb<u8>, y: Srgb<u8>) -> u32 {
    let dr = i32::from(x.red) - i32::from(y.red);
    let dg = i32::from(x.green) - i32::from(y.green);
    let db = i32::from(x.blue) - i32::from(y.blue);
    dr.unsigned_abs().pow(2) + dg.unsigned_abs().pow(2) + db.unsigned_abs().pow(2)
}

/// Validates the shape of a strategy's output and truncates its palette to `palette_size`.
fn bounded(
    mut output: QuantizeOutput,
    colors: &IndexedColorCounts,
    palette_size: PaletteSize,
) -> Result<QuantizeOutput, StrategyError> {
    let malformed = || StrategyError::MalformedOutput {
        colors: colors.len(),
        indices: output.indices.len(),
        palette: output.palette.len(),
    };

    if output.indices.len() != colors.len()
        || output
            .indices
            .iter()
            .any(|&i| usize::from(i) >= output.palette.len())
    {
        return Err(malformed());
    }

    let k = palette_size.as_usize();
    if output.palette.len() > k {
        tracing::debug!(
            produced = output.palette.len(),
            requested = k,
            "truncating over-produced palette"
        );

        output.palette.truncate(k);
        let palette = output.palette.as_slice();
        for (index, &color) in output.indices.iter_mut().zip(colors.colors()) {
            if usize::from(*index) >= k {
                #[allow(clippy::cast_possible_truncation)]
                let nearest = palette
                    .iter()
                    .enumerate()
                    .min_by_key(|&(_, &p)| squared_distance(p, color))
                    .map_or(0, |(i, _)| i as u8);
                *index = nearest;
            }
        }
    }

    Ok(output)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::*;

    /// Returns every unique color as its own palette entry, ignoring the palette size.
    struct Identity;

    impl Quantizer for Identity {
        fn name(&self) -> &str {
            "identity"
        }

        fn reduce(
            &self,
            colors: &IndexedColorCounts,
            _: PaletteSize,
        ) -> Result<QuantizeOutput, StrategyError> {
            Ok(QuantizeOutput::trivial(colors.colors()))
        }
    }

    /// Returns an index past the end of the palette.
    struct OutOfBounds;

    impl Quantizer for OutOfBounds {
        fn name(&self) -> &str {
            "out_of_bounds"
        }

        fn reduce(
            &self,
            colors: &IndexedColorCounts,
            _: PaletteSize,
        ) -> Result<QuantizeOutput, StrategyError> {
            Ok(QuantizeOutput {
                palette: vec![RED],
                indices: vec![1; colors.len()],
            })
        }
    }

    #[test]
    fn overproduced_palette_is_truncated() {
        let colors = distinct_colors(10);
        let image = grid_of(&colors, 10, 10);
        let size = PaletteSize::try_from(4u32).unwrap();

        let result = Identity.quantize(&image, size).unwrap();
        assert_eq!(result.palette.len(), 4);
        assert_eq!(result.counts.iter().sum::<u32>(), 100);
        assert!(result.image.pixels().iter().all(|c| result.palette.contains(c)));

        // colors that survived truncation keep their exact value
        for (&original, &recolored) in image.pixels().iter().zip(result.image.pixels()) {
            if result.palette.contains(&original) {
                assert_eq!(original, recolored);
            }
        }
    }

    #[test]
    fn malformed_output_is_a_failure() {
        let failure = OutOfBounds
            .quantize(&two_color_grid(), PaletteSize::MIN)
            .unwrap_err();
        assert_eq!(failure.strategy, "out_of_bounds");
        assert!(matches!(failure.error, StrategyError::MalformedOutput { .. }));
    }

    #[test]
    fn boxed_quantizer_delegates() {
        let boxed: Box<dyn Quantizer> = Box::new(Identity);
        assert_eq!(boxed.name(), "identity");
        let result = boxed.quantize(&two_color_grid(), PaletteSize::MIN).unwrap();
        assert_eq!(result.image, two_color_grid());
    }

    #[test]
    fn squared_distance_is_symmetric() {
        assert_eq!(squared_distance(RED, BLUE), 2 * 255 * 255);
        assert_eq!(squared_distance(BLUE, RED), 2 * 255 * 255);
        assert_eq!(squared_distance(RED, RED), 0);
    }
}
