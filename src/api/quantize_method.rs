//! Contains the builder structs for the supported quantization methods.

use crate::{
    frequency, kmeans, median_cut, octree, IndexedColorCounts, InvalidInput, PaletteSize, QuantizeOutput,
    Quantizer, StrategyError,
};
use std::{fmt, str::FromStr};

/// A builder struct to specify the parameters for mini-batch k-means.
///
/// # Examples
/// ```
/// # use quantbench::KmeansOptions;
/// let options = KmeansOptions::new()
///     .batch_size(1024)
///     .trials(5)
///     .seed(42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KmeansOptions {
    /// The number of samples drawn per iteration.
    pub(crate) batch_size: u32,
    /// The number of independently seeded runs, of which the one with the lowest inertia is kept.
    pub(crate) trials: u32,
    /// The maximum number of batches per trial.
    pub(crate) max_iterations: u32,
    /// The mean centroid movement per batch under which a trial stops early.
    pub(crate) convergence: f64,
    /// The seed value for the random number generator.
    pub(crate) seed: u64,
}

impl Default for KmeansOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl KmeansOptions {
    /// Creates a new [`KmeansOptions`] with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            batch_size: 2048,
            trials: 3,
            max_iterations: 100,
            convergence: 1.0,
            seed: 0,
        }
    }

    /// Sets the number of pixels sampled for each mini-batch update.
    ///
    /// Larger batch sizes give smoother updates at a higher cost per iteration.
    ///
    /// The default batch size is `2048`.
    #[must_use]
    pub const fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the number of independent trials, each with its own initialization.
    ///
    /// The trial with the lowest inertia is kept. A value of `0` is treated as `1`.
    ///
    /// The default number of trials is `3`.
    #[must_use]
    pub const fn trials(mut self, trials: u32) -> Self {
        self.trials = trials;
        self
    }

    /// Sets the maximum number of mini-batches processed per trial.
    ///
    /// The default is `100`.
    #[must_use]
    pub const fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the convergence threshold: a trial stops once the centroids move,
    /// on average, by no more than this distance (in 8-bit RGB units) over one batch.
    ///
    /// The default is `1.0`.
    #[must_use]
    pub const fn convergence(mut self, convergence: f64) -> Self {
        self.convergence = convergence;
        self
    }

    /// Sets the seed value for the random number generator.
    ///
    /// The same seed, image, and palette size always give the same palette.
    ///
    /// The default seed is `0`.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// The set of supported color quantization methods.
///
/// See the descriptions on each enum variant for more information.
///
/// Methods can also be parsed from their names:
/// ```
/// # use quantbench::QuantizeMethod;
/// let method: QuantizeMethod = "median_cut".parse()?;
/// assert_eq!(method, QuantizeMethod::MedianCut);
/// assert_eq!(method.to_string(), "median_cut");
/// # Ok::<(), quantbench::InvalidInput>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuantizeMethod {
    /// Color quantization using mini-batch k-means clustering.
    ///
    /// This method is the slowest but usually gives the most accurate results.
    ///
    /// See the [`kmeans`](crate::kmeans) module for more details.
    Kmeans(KmeansOptions),
    /// A max-coverage octree reduction.
    ///
    /// This method is the fastest and keeps the dominant colors of an image.
    ///
    /// See the [`octree`](crate::octree) module for more details.
    MaxCoverage,
    /// Median cut along the axis of largest variance.
    ///
    /// This method is deterministic and serves as a reference baseline.
    ///
    /// See the [`median_cut`](crate::median_cut) module for more details.
    MedianCut,
    /// Keeps the most populated buckets of a coarse RGB grid.
    ///
    /// This method is a naive baseline: very fast, but it ignores how colors vary within a bucket.
    ///
    /// See the [`frequency`](crate::frequency) module for more details.
    MostFrequent,
}

impl QuantizeMethod {
    /// The name of [`QuantizeMethod::Kmeans`].
    pub const KMEANS: &'static str = "kmeans";
    /// The name of [`QuantizeMethod::MaxCoverage`].
    pub const MAX_COVERAGE: &'static str = "max_coverage";
    /// The name of [`QuantizeMethod::MedianCut`].
    pub const MEDIAN_CUT: &'static str = "median_cut";
    /// The name of [`QuantizeMethod::MostFrequent`].
    pub const MOST_FREQUENT: &'static str = "most_frequent";

    /// Creates a new [`QuantizeMethod::Kmeans`] with the default [`KmeansOptions`].
    #[must_use]
    pub const fn kmeans() -> Self {
        Self::Kmeans(KmeansOptions::new())
    }

    /// Creates a new [`QuantizeMethod::MaxCoverage`].
    #[must_use]
    pub const fn max_coverage() -> Self {
        Self::MaxCoverage
    }

    /// Creates a new [`QuantizeMethod::MedianCut`].
    #[must_use]
    pub const fn median_cut() -> Self {
        Self::MedianCut
    }

    /// Creates a new [`QuantizeMethod::MostFrequent`].
    #[must_use]
    pub const fn most_frequent() -> Self {
        Self::MostFrequent
    }

    /// The default methods, in the order they are ranked on ties.
    #[must_use]
    pub const fn defaults() -> [Self; 4] {
        [
            Self::kmeans(),
            Self::max_coverage(),
            Self::median_cut(),
            Self::most_frequent(),
        ]
    }

    /// The name of this method.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Kmeans(_) => Self::KMEANS,
            Self::MaxCoverage => Self::MAX_COVERAGE,
            Self::MedianCut => Self::MEDIAN_CUT,
            Self::MostFrequent => Self::MOST_FREQUENT,
        }
    }
}

impl From<KmeansOptions> for QuantizeMethod {
    fn from(options: KmeansOptions) -> Self {
        Self::Kmeans(options)
    }
}

impl fmt::Display for QuantizeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuantizeMethod {
    type Err = InvalidInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::KMEANS => Ok(Self::kmeans()),
            Self::MAX_COVERAGE => Ok(Self::max_coverage()),
            Self::MEDIAN_CUT => Ok(Self::median_cut()),
            Self::MOST_FREQUENT => Ok(Self::most_frequent()),
            _ => Err(InvalidInput::UnknownStrategy(s.to_owned())),
        }
    }
}

impl Quantizer for QuantizeMethod {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn reduce(
        &self,
        colors: &IndexedColorCounts,
        palette_size: PaletteSize,
    ) -> Result<QuantizeOutput, StrategyError> {
        match self {
            Self::Kmeans(options) => kmeans::indexed_palette(colors, palette_size, options),
            Self::MaxCoverage => Ok(octree::indexed_palette(colors, palette_size)),
            Self::MedianCut => Ok(median_cut::indexed_palette(colors, palette_size)),
            Self::MostFrequent => Ok(frequency::indexed_palette(colors, palette_size)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::*;

    #[test]
    fn names_round_trip() {
        for method in QuantizeMethod::defaults() {
            assert_eq!(method.name(), method.to_string());
            assert_eq!(method.as_str().parse::<QuantizeMethod>().unwrap(), method);
        }
    }

    #[test]
    fn unknown_name() {
        assert_eq!(
            "Kmeans".parse::<QuantizeMethod>().unwrap_err(),
            InvalidInput::UnknownStrategy("Kmeans".to_owned())
        );
    }

    #[test]
    fn options_builder() {
        let options = KmeansOptions::new()
            .batch_size(64)
            .trials(7)
            .max_iterations(10)
            .convergence(0.25)
            .seed(9);

        assert_eq!(options.batch_size, 64);
        assert_eq!(options.trials, 7);
        assert_eq!(options.max_iterations, 10);
        assert_eq!(options.seed, 9);
        assert_eq!(QuantizeMethod::from(options), QuantizeMethod::Kmeans(options));
        assert_eq!(KmeansOptions::default(), KmeansOptions::new());
    }

    #[test]
    fn palette_bound_holds_for_every_method() {
        let image = gradient_grid();
        for method in QuantizeMethod::defaults() {
            for k in [2u32, 8, 33] {
                let size = PaletteSize::try_from(k).unwrap();
                let result = method.quantize(&image, size).unwrap();
                assert!(result.palette.len() <= k as usize, "{method} produced too many colors");
                assert_eq!(result.image.dimensions(), image.dimensions());
                assert_eq!(result.counts.iter().sum::<u32>(), image.num_pixels());
            }
        }
    }

    #[test]
    fn few_colors_are_reproduced() {
        let palette = distinct_colors(20);
        let image = grid_of(&palette, 17, 11);
        for method in QuantizeMethod::defaults() {
            let result = method.quantize(&image, PaletteSize::from_clamped(20)).unwrap();
            assert_eq!(result.image, image);
            assert_eq!(sorted(result.palette), sorted(palette.clone()));
        }
    }

    #[test]
    fn every_method_is_deterministic() {
        let image = random_grid(40, 40, 3);
        let size = PaletteSize::try_from(12u32).unwrap();
        for method in QuantizeMethod::defaults() {
            let first = method.quantize(&image, size).unwrap();
            let second = method.quantize(&image, size).unwrap();
            assert_eq!(first.palette, second.palette, "{method} palette changed");
            assert_eq!(first.image, second.image, "{method} image changed");
        }
    }

    #[test]
    fn kmeans_is_deterministic() {
        let image = random_grid(50, 50, 21);
        let method = QuantizeMethod::from(KmeansOptions::new().seed(5));
        let size = PaletteSize::try_from(16u32).unwrap();

        let first = method.quantize(&image, size).unwrap();
        let second = method.quantize(&image, size).unwrap();
        assert_eq!(first.palette, second.palette);
        assert_eq!(first.image, second.image);
    }
}
