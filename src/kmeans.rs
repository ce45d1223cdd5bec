//! Color quantization using mini-batch k-means clustering in RGB space.
//!
//! Each trial seeds its centroids with k-means++, then repeatedly draws a random batch of pixels
//! and moves each centroid toward the samples assigned to it. A trial stops once the mean centroid
//! movement over a batch falls below the convergence threshold or the iteration cap is hit.
//! Several trials are run with different seeds and the one with the lowest inertia
//! (the pixel-weighted sum of squared distances to the nearest centroid) is kept.
//!
//! Results are fully determined by the seed in [`KmeansOptions`](crate::KmeansOptions),
//! regardless of the number of threads used.

// The online centroid update is based upon the following paper:
//
// Thompson, S., Celebi, M.E. & Buck, K.H. Fast color quantization using MacQueen’s k-means algorithm.
// Journal of Real-Time Image Processing, vol. 17, 1609–1624, 2020.
// https://doi.org/10.1007/s11554-019-00914-6

use crate::{IndexedColorCounts, KmeansOptions, PaletteSize, QuantizeOutput, StrategyError};
use palette::Srgb;
use rand::{
    distributions::{WeightedError, WeightedIndex},
    prelude::Distribution,
    SeedableRng,
};
use rand_distr::weighted_alias::WeightedAliasIndex;
use rand_xoshiro::Xoroshiro128PlusPlus;
#[cfg(feature = "threads")]
use rayon::prelude::*;

/// A point in RGB space with components in `[0, 255]`.
type Point = [f64; 3];

/// The squared Euclidean distance between two points.
#[inline]
fn squared_distance(x: Point, y: Point) -> f64 {
    let d0 = x[0] - y[0];
    let d1 = x[1] - y[1];
    let d2 = x[2] - y[2];
    d0 * d0 + d1 * d1 + d2 * d2
}

/// Returns the index of the centroid closest to `point` and the squared distance to it.
///
/// Ties go to the lower index.
#[inline]
#[allow(clippy::cast_possible_truncation)]
fn nearest(centroids: &[Point], point: Point) -> (u8, f64) {
    let mut min_index = 0;
    let mut min_dist = f64::INFINITY;
    for (i, &centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(point, centroid);
        if dist < min_dist {
            min_dist = dist;
            min_index = i;
        }
    }
    (min_index as u8, min_dist)
}

/// Assigns each point to its nearest centroid.
fn assign(centroids: &[Point], points: &[Point]) -> Vec<(u8, f64)> {
    #[cfg(feature = "threads")]
    {
        points.par_iter().map(|&p| nearest(centroids, p)).collect()
    }
    #[cfg(not(feature = "threads"))]
    {
        points.iter().map(|&p| nearest(centroids, p)).collect()
    }
}

/// The outcome of a single k-means trial.
#[derive(Debug, Clone)]
struct Trial {
    /// The final centroids.
    centroids: Vec<Point>,
    /// The centroid index for each unique color.
    assignments: Vec<u8>,
    /// The pixel-weighted sum of squared distances to the assigned centroids.
    inertia: f64,
    /// The number of batches processed.
    iterations: u32,
}

/// Holds the data shared by every trial.
struct State<'a> {
    /// The unique colors as points.
    points: Vec<Point>,
    /// The number of pixels for each unique color.
    counts: &'a [u32],
    /// Samples unique colors proportionally to their pixel counts.
    sampler: WeightedAliasIndex<u64>,
    /// The number of centroids.
    k: usize,
}

impl<'a> State<'a> {
    /// Creates a new [`State`] for the given colors.
    fn new(colors: &'a IndexedColorCounts, k: usize) -> Result<Self, StrategyError> {
        let points = colors
            .color_components()
            .into_iter()
            .map(|c| c.map(f64::from))
            .collect();

        let counts = colors.counts();

        // every count is non-zero and there are at most MAX_PIXELS of them,
        // so this only fails on empty input
        let sampler = WeightedAliasIndex::new(counts.iter().copied().map(u64::from).collect())
            .map_err(|e| StrategyError::Internal(format!("cannot sample colors: {e}")))?;

        Ok(Self { points, counts, sampler, k })
    }

    /// Chooses the starting centroids using the k-means++ algorithm.
    fn kmeans_plus_plus(&self, rng: &mut Xoroshiro128PlusPlus) -> Result<Vec<Point>, StrategyError> {
        let Self { points, counts, sampler, k } = self;

        let mut centroids = Vec::with_capacity(*k);
        centroids.push(points[sampler.sample(rng)]);

        let mut min_dist = vec![f64::INFINITY; points.len()];
        for _ in 1..*k {
            let last = centroids[centroids.len() - 1];
            for (dist, &point) in min_dist.iter_mut().zip(points) {
                *dist = f64::min(*dist, squared_distance(point, last));
            }

            let weights = min_dist.iter().zip(*counts).map(|(&d, &n)| d * f64::from(n));
            match WeightedIndex::new(weights) {
                Ok(index) => centroids.push(points[index.sample(rng)]),
                Err(WeightedError::AllWeightsZero) => break, // every color is already a centroid
                Err(e) => return Err(StrategyError::Internal(format!("k-means++ failed: {e}"))),
            }
        }

        Ok(centroids)
    }

    /// Runs one trial of mini-batch k-means with the given seed.
    fn trial(&self, options: &KmeansOptions, seed: u64) -> Result<Trial, StrategyError> {
        let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
        let mut centroids = self.kmeans_plus_plus(&mut rng)?;

        let batch_size = options.batch_size.max(1) as usize;
        let mut counts = vec![0u32; centroids.len()];
        let mut batch = vec![[0.0; 3]; batch_size];
        let mut previous = centroids.clone();

        let mut iterations = 0;
        while iterations < options.max_iterations {
            // sampling stays on one rng so that the result does not depend on the thread count
            for point in &mut batch {
                *point = self.points[self.sampler.sample(&mut rng)];
            }

            previous.copy_from_slice(&centroids);

            for (&point, (i, _)) in batch.iter().zip(assign(&centroids, &batch)) {
                let i = usize::from(i);
                let count = counts[i] + 1;
                let rate = 1.0 / f64::from(count).sqrt(); // learning rate of 0.5 => count^(-0.5)

                let centroid = &mut centroids[i];
                for c in 0..3 {
                    centroid[c] += rate * (point[c] - centroid[c]);
                }

                counts[i] = count;
            }

            iterations += 1;

            let movement = centroids
                .iter()
                .zip(&previous)
                .map(|(&x, &y)| squared_distance(x, y).sqrt())
                .sum::<f64>();

            if !movement.is_finite() {
                return Err(StrategyError::NonFinite("k-means centroid"));
            }

            #[allow(clippy::cast_precision_loss)]
            let mean_movement = movement / centroids.len() as f64;
            if mean_movement <= options.convergence {
                break;
            }
        }

        let (assignments, inertia) = {
            let nearest = assign(&centroids, &self.points);
            let inertia = nearest
                .iter()
                .zip(self.counts)
                .map(|(&(_, dist), &n)| dist * f64::from(n))
                .sum::<f64>();

            (nearest.into_iter().map(|(i, _)| i).collect(), inertia)
        };

        if !inertia.is_finite() {
            return Err(StrategyError::NonFinite("k-means inertia"));
        }

        Ok(Trial { centroids, assignments, inertia, iterations })
    }

    /// Runs every trial and returns the one with the lowest inertia.
    fn best_trial(&self, options: &KmeansOptions) -> Result<Trial, StrategyError> {
        let mut best: Option<Trial> = None;
        for t in 0..options.trials.max(1) {
            let trial = self.trial(options, options.seed.wrapping_add(u64::from(t)))?;

            tracing::trace!(
                trial = t,
                iterations = trial.iterations,
                inertia = trial.inertia,
                "k-means trial finished"
            );

            if best.as_ref().map_or(true, |best| trial.inertia < best.inertia) {
                best = Some(trial);
            }
        }

        best.ok_or_else(|| StrategyError::Internal("no k-means trials were run".into()))
    }
}

/// Rounds a centroid to the nearest 8-bit color.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_srgb(centroid: Point) -> Srgb<u8> {
    let [r, g, b] = centroid.map(|c| c.round().clamp(0.0, 255.0) as u8);
    Srgb::new(r, g, b)
}

/// Keeps only the centroids that were assigned at least one color and rounds them.
#[allow(clippy::cast_possible_truncation)]
fn into_output(trial: Trial) -> QuantizeOutput {
    let Trial { centroids, mut assignments, .. } = trial;

    let mut remap = vec![None; centroids.len()];
    let mut palette = Vec::new();
    for i in &mut assignments {
        let old = usize::from(*i);
        *i = *remap[old].get_or_insert_with(|| {
            palette.push(to_srgb(centroids[old]));
            (palette.len() - 1) as u8
        });
    }

    QuantizeOutput { palette, indices: assignments }
}

/// Computes a palette of at most `palette_size` colors with mini-batch k-means.
///
/// If there are no more unique colors than `palette_size`, the unique colors are returned as is.
/// The palette holds only centroids that ended up with at least one pixel,
/// in the order those centroids were first assigned.
///
/// # Errors
/// Returns a [`StrategyError`] if the centroids became non-finite.
pub fn indexed_palette(
    colors: &IndexedColorCounts,
    palette_size: PaletteSize,
    options: &KmeansOptions,
) -> Result<QuantizeOutput, StrategyError> {
    if colors.len() <= palette_size.as_usize() {
        Ok(QuantizeOutput::trivial(colors.colors()))
    } else {
        let state = State::new(colors, palette_size.as_usize())?;
        state.best_trial(options).map(into_output)
    }
}
