//! Contains the [`Benchmark`] builder, which runs several quantizers on one image and ranks them.

use crate::{
    render_palette,
    score::{self, COMPARISON_SIZE},
    Error, InvalidInput, KmeansOptions, PaletteSize, PixelGrid, QuantizeMethod, QuantizedResult,
    Quantizer, StrategyError, StrategyFailure,
};
#[cfg(feature = "threads")]
use rayon::prelude::*;
use std::{
    any::Any,
    collections::HashSet,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

/// How to pick between strategies with exactly equal scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// The strategy registered first wins.
    #[default]
    DeclarationOrder,
    /// The faster strategy wins, falling back to declaration order if the times are equal too.
    ElapsedTime,
}

/// The result of one strategy that ran successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyReport {
    /// The name of the strategy.
    pub name: String,
    /// The quantized image, palette, and elapsed time.
    pub result: QuantizedResult,
    /// The mean CIEDE2000 difference against the original image. Lower is better.
    pub score: f64,
    /// The normalized RGB root mean squared error against the original image, in `[0, 1]`.
    ///
    /// This is informational only and is not used for ranking.
    pub rgb_rmse: f64,
    /// The palette rendered as a strip of swatches.
    pub swatch: PixelGrid,
}

/// What happened to one strategy of a benchmark.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    /// The strategy produced a scored result.
    Succeeded(Arc<StrategyReport>),
    /// The strategy failed and is excluded from the ranking.
    Failed(StrategyFailure),
}

impl StrategyOutcome {
    /// The name of the strategy.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Succeeded(report) => &report.name,
            Self::Failed(failure) => &failure.strategy,
        }
    }

    /// Returns the report if the strategy succeeded.
    #[must_use]
    pub fn report(&self) -> Option<&StrategyReport> {
        match self {
            Self::Succeeded(report) => Some(report.as_ref()),
            Self::Failed(_) => None,
        }
    }

    /// Returns the failure if the strategy failed.
    #[must_use]
    pub fn failure(&self) -> Option<&StrategyFailure> {
        match self {
            Self::Succeeded(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }
}

/// The outcome of a [`Benchmark`] run.
///
/// Outcomes are kept in the order the strategies were registered in.
/// At least one strategy succeeded, otherwise [`Benchmark::run`] would have returned
/// [`Error::AllStrategiesFailed`].
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkReport {
    /// One outcome per registered strategy.
    outcomes: Vec<StrategyOutcome>,
    /// The winning report, shared with its entry in `outcomes`.
    best: Arc<StrategyReport>,
}

impl BenchmarkReport {
    /// The strategy with the lowest score.
    #[must_use]
    pub fn best(&self) -> &StrategyReport {
        &self.best
    }

    /// The name of the strategy with the lowest score.
    #[must_use]
    pub fn best_strategy(&self) -> &str {
        &self.best().name
    }

    /// Returns the outcome of the strategy with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StrategyOutcome> {
        self.outcomes.iter().find(|outcome| outcome.name() == name)
    }

    /// All outcomes in registration order.
    #[must_use]
    pub fn outcomes(&self) -> &[StrategyOutcome] {
        &self.outcomes
    }

    /// The reports of the strategies that succeeded, in registration order.
    pub fn successes(&self) -> impl Iterator<Item = &StrategyReport> {
        self.outcomes.iter().filter_map(StrategyOutcome::report)
    }

    /// The failures of the strategies that failed, in registration order.
    pub fn failures(&self) -> impl Iterator<Item = &StrategyFailure> {
        self.outcomes.iter().filter_map(StrategyOutcome::failure)
    }

    /// The number of strategies that were run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether no strategies were run. This is never the case for a report returned by [`Benchmark::run`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Returns the outcomes, consuming the report.
    #[must_use]
    pub fn into_outcomes(self) -> Vec<StrategyOutcome> {
        self.outcomes
    }
}

/// A builder struct to run a list of quantizers on one image and pick the most faithful result.
///
/// Each strategy's output is scored against the original image with
/// [`score::compare`](crate::score::compare), and the strategy with the lowest mean CIEDE2000
/// difference is selected. A strategy that fails is recorded in the report and excluded from the ranking
/// without affecting the others.
///
/// # Examples
/// ```
/// # use quantbench::{Benchmark, KmeansOptions, PixelGrid, TieBreak};
/// # use palette::Srgb;
/// # fn main() -> Result<(), quantbench::Error> {
/// # let image = PixelGrid::from_fn(32, 32, |x, y| Srgb::new(x as u8 * 8, y as u8 * 8, 0))?;
/// let report = Benchmark::new()
///     .kmeans_options(KmeansOptions::new().seed(7))
///     .comparison_size(100)
///     .tie_break(TieBreak::ElapsedTime)
///     .run(&image, 16)?;
///
/// for strategy in report.successes() {
///     println!("{}: {:.3}", strategy.name, strategy.score);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Benchmark {
    /// The strategies to run, in declaration order.
    strategies: Vec<Box<dyn Quantizer>>,
    /// The side length of the square images that are compared.
    comparison_size: u32,
    /// The side length of each palette swatch.
    swatch_size: u32,
    /// How ties between equal scores are resolved.
    tie_break: TieBreak,
    /// Whether or not to run the strategies concurrently.
    parallel: bool,
}

impl Default for Benchmark {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Benchmark")
            .field("strategies", &self.strategy_names())
            .field("comparison_size", &self.comparison_size)
            .field("swatch_size", &self.swatch_size)
            .field("tie_break", &self.tie_break)
            .field("parallel", &self.parallel)
            .finish()
    }
}

impl Benchmark {
    /// The default side length of each palette swatch.
    pub const DEFAULT_SWATCH_SIZE: u32 = 32;

    /// Creates a new [`Benchmark`] with the default strategies:
    /// k-means, then max-coverage, then median cut, then most-frequent.
    #[must_use]
    pub fn new() -> Self {
        Self::with_strategies(
            QuantizeMethod::defaults()
                .into_iter()
                .map(|method| Box::new(method) as Box<dyn Quantizer>),
        )
    }

    /// Creates a new [`Benchmark`] running exactly the given strategies, in the given order.
    #[must_use]
    pub fn with_strategies(strategies: impl IntoIterator<Item = Box<dyn Quantizer>>) -> Self {
        Self {
            strategies: strategies.into_iter().collect(),
            comparison_size: COMPARISON_SIZE,
            swatch_size: Self::DEFAULT_SWATCH_SIZE,
            tie_break: TieBreak::DeclarationOrder,
            parallel: true,
        }
    }

    /// Registers another strategy after the existing ones.
    #[must_use]
    pub fn strategy(mut self, strategy: impl Quantizer + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Replaces every registered strategy named `kmeans` with k-means using the given options.
    #[must_use]
    pub fn kmeans_options(mut self, options: KmeansOptions) -> Self {
        for strategy in &mut self.strategies {
            if strategy.name() == QuantizeMethod::KMEANS {
                *strategy = Box::new(QuantizeMethod::Kmeans(options));
            }
        }
        self
    }

    /// Sets the side length of the square images used for scoring.
    ///
    /// Smaller sizes are faster to score but less accurate.
    /// See the [`score`](crate::score) module for details.
    ///
    /// The default comparison size is [`COMPARISON_SIZE`].
    #[must_use]
    pub fn comparison_size(mut self, comparison_size: u32) -> Self {
        self.comparison_size = comparison_size;
        self
    }

    /// Sets the side length of each swatch in the rendered palettes.
    ///
    /// Sizes above [`MAX_SWATCH_SIZE`](crate::swatch::MAX_SWATCH_SIZE) are clamped.
    ///
    /// The default swatch size is `32`.
    #[must_use]
    pub fn swatch_size(mut self, swatch_size: u32) -> Self {
        self.swatch_size = swatch_size;
        self
    }

    /// Sets how to pick between strategies with equal scores.
    ///
    /// The default is [`TieBreak::DeclarationOrder`].
    #[must_use]
    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Sets whether or not to run the strategies concurrently on the rayon thread pool.
    ///
    /// The results are the same either way. This has no effect without the `threads` feature.
    ///
    /// The default is `true`.
    #[must_use]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// The names of the registered strategies, in declaration order.
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    /// Runs every registered strategy on `image` with a palette of at most `color_count` colors.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] without running any strategy if `color_count` is outside `2..=256`
    /// or if two strategies share the same name.
    /// Returns [`Error::AllStrategiesFailed`] if no strategy succeeded, including when none are registered.
    pub fn run(&self, image: &PixelGrid, color_count: u32) -> Result<BenchmarkReport, Error> {
        let palette_size = PaletteSize::try_from(color_count)?;

        let mut names = HashSet::new();
        for strategy in &self.strategies {
            if !names.insert(strategy.name()) {
                return Err(InvalidInput::DuplicateStrategy(strategy.name().to_owned()).into());
            }
        }

        #[cfg(feature = "threads")]
        let outcomes = if self.parallel {
            self.strategies
                .par_iter()
                .map(|strategy| self.evaluate(&**strategy, image, palette_size))
                .collect::<Vec<_>>()
        } else {
            self.strategies
                .iter()
                .map(|strategy| self.evaluate(&**strategy, image, palette_size))
                .collect::<Vec<_>>()
        };

        #[cfg(not(feature = "threads"))]
        let outcomes = self
            .strategies
            .iter()
            .map(|strategy| self.evaluate(&**strategy, image, palette_size))
            .collect::<Vec<_>>();

        let Some(best) = select_best(&outcomes, self.tie_break) else {
            let failures = outcomes
                .into_iter()
                .filter_map(|outcome| match outcome {
                    StrategyOutcome::Succeeded(_) => None,
                    StrategyOutcome::Failed(failure) => Some(failure),
                })
                .collect();

            return Err(Error::AllStrategiesFailed(failures));
        };

        tracing::info!(
            strategy = %best.name,
            score = best.score,
            colors = best.result.palette.len(),
            "selected best strategy"
        );

        Ok(BenchmarkReport { outcomes, best })
    }

    /// Runs, scores, and renders a single strategy, turning any failure into an outcome.
    fn evaluate(
        &self,
        strategy: &dyn Quantizer,
        image: &PixelGrid,
        palette_size: PaletteSize,
    ) -> StrategyOutcome {
        let name = strategy.name().to_owned();

        let quantized =
            panic::catch_unwind(AssertUnwindSafe(|| strategy.quantize(image, palette_size)))
                .unwrap_or_else(|payload| {
                    Err(StrategyFailure::new(
                        name.as_str(),
                        StrategyError::Panicked(panic_message(payload.as_ref())),
                    ))
                });

        let scored = quantized.and_then(|result| {
            let scores = score::compare(image, &result.image, self.comparison_size)
                .map_err(|error| StrategyError::Internal(error.to_string()))
                .and_then(|scores| {
                    if scores.ciede2000.is_finite() {
                        Ok(scores)
                    } else {
                        Err(StrategyError::NonFinite("score"))
                    }
                })
                .map_err(|error| StrategyFailure::new(name.as_str(), error))?;

            Ok((result, scores))
        });

        match scored {
            Ok((result, scores)) => {
                tracing::debug!(
                    strategy = %name,
                    elapsed_ms = result.elapsed.as_secs_f64() * 1000.0,
                    score = scores.ciede2000,
                    rgb_rmse = scores.rgb_rmse,
                    "strategy finished"
                );

                let swatch = render_palette(&result.palette, self.swatch_size);
                StrategyOutcome::Succeeded(Arc::new(StrategyReport {
                    name,
                    result,
                    score: scores.ciede2000,
                    rgb_rmse: scores.rgb_rmse,
                    swatch,
                }))
            }
            Err(failure) => {
                tracing::warn!(strategy = %name, error = %failure.error, "strategy failed");
                StrategyOutcome::Failed(failure)
            }
        }
    }
}

/// The text of a caught panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// Returns the succeeded outcome with the lowest score, if any.
fn select_best(
    outcomes: &[StrategyOutcome],
    tie_break: TieBreak,
) -> Option<Arc<StrategyReport>> {
    let mut best: Option<&Arc<StrategyReport>> = None;

    for report in outcomes.iter().filter_map(|outcome| match outcome {
        StrategyOutcome::Succeeded(report) => Some(report),
        StrategyOutcome::Failed(_) => None,
    }) {
        let better = match best {
            None => true,
            Some(current) => {
                report.score < current.score
                    || (tie_break == TieBreak::ElapsedTime
                        && report.score.total_cmp(&current.score).is_eq()
                        && report.result.elapsed < current.result.elapsed)
            }
        };

        if better {
            best = Some(report);
        }
    }

    best.cloned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{median_cut, tests::*, IndexedColorCounts, QuantizeOutput};
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::Duration,
    };

    /// Always fails.
    struct Failing(&'static str);

    impl Quantizer for Failing {
        fn name(&self) -> &str {
            self.0
        }

        fn reduce(
            &self,
            _: &IndexedColorCounts,
            _: PaletteSize,
        ) -> Result<QuantizeOutput, StrategyError> {
            Err(StrategyError::NonFinite("forced failure"))
        }
    }

    /// Panics with an out of bounds index.
    struct Panicking;

    impl Quantizer for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn reduce(
            &self,
            colors: &IndexedColorCounts,
            _: PaletteSize,
        ) -> Result<QuantizeOutput, StrategyError> {
            let empty: Vec<QuantizeOutput> = Vec::new();
            Ok(empty[colors.len()].clone())
        }
    }

    /// Median cut under another name, counting its invocations and optionally sleeping first.
    struct Instrumented {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl Instrumented {
        fn new(name: &'static str) -> Self {
            Self { name, calls: Arc::default(), delay: Duration::ZERO }
        }
    }

    impl Quantizer for Instrumented {
        fn name(&self) -> &str {
            self.name
        }

        fn reduce(
            &self,
            colors: &IndexedColorCounts,
            palette_size: PaletteSize,
        ) -> Result<QuantizeOutput, StrategyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            Ok(median_cut::indexed_palette(colors, palette_size))
        }
    }

    fn fast_kmeans() -> KmeansOptions {
        KmeansOptions::new().batch_size(256).max_iterations(30)
    }

    #[test]
    fn two_color_end_to_end() {
        let image = two_color_grid();
        let report = crate::benchmark(&image, 2).unwrap();

        assert_eq!(report.len(), 4);
        assert_eq!(report.successes().count(), 4);
        for strategy in report.successes() {
            assert_eq!(sorted(strategy.result.palette.clone()), sorted(vec![RED, BLUE]));
            assert_eq!(strategy.result.image, image);
            assert_eq!(strategy.score, 0.0);
            assert_eq!(strategy.swatch.dimensions(), (64, 32));
        }

        // all scores tie, so the first declared strategy wins
        assert_eq!(report.best_strategy(), QuantizeMethod::KMEANS);
    }

    #[test]
    fn gradient_picks_strict_minimum() {
        let image = gradient_grid();
        let report = Benchmark::new().kmeans_options(fast_kmeans()).run(&image, 8).unwrap();

        assert_eq!(report.len(), 4);
        assert_eq!(report.failures().count(), 0);
        assert_eq!(
            report.outcomes().iter().map(StrategyOutcome::name).collect::<Vec<_>>(),
            vec!["kmeans", "max_coverage", "median_cut", "most_frequent"]
        );

        let best = report.best();
        for (i, strategy) in report.successes().enumerate() {
            assert!(strategy.result.palette.len() <= 8);
            assert!(strategy.score > 0.0 && strategy.score.is_finite());
            assert!((0.0..=1.0).contains(&strategy.rgb_rmse));
            assert!(best.score <= strategy.score);
            if strategy.score == best.score {
                // earlier strategies with an equal score would have won
                assert!(report.outcomes()[..i].iter().all(|o| o.report().unwrap().score > best.score));
                assert_eq!(strategy.name, best.name);
            }
        }
    }

    #[test]
    fn invalid_color_count_runs_nothing() {
        let counted = Instrumented::new("counted");
        let calls = Arc::clone(&counted.calls);
        let benchmark = Benchmark::new().strategy(counted);

        for count in [0, 1, 257, 300] {
            let error = benchmark.run(&two_color_grid(), count).unwrap_err();
            assert_eq!(error, Error::InvalidInput(InvalidInput::PaletteSize(count)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        benchmark.run(&two_color_grid(), 2).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_is_isolated() {
        let image = random_grid(30, 30, 2);
        let report = Benchmark::new()
            .kmeans_options(fast_kmeans())
            .strategy(Failing("failing"))
            .run(&image, 8)
            .unwrap();

        assert_eq!(report.len(), 5);
        assert_eq!(report.successes().count(), 4);

        let failures = report.failures().collect::<Vec<_>>();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].strategy, "failing");
        assert_eq!(failures[0].error, StrategyError::NonFinite("forced failure"));
        assert!(report.get("failing").unwrap().report().is_none());

        assert_ne!(report.best_strategy(), "failing");
        let lowest = report.successes().map(|s| s.score).fold(f64::INFINITY, f64::min);
        assert_eq!(report.best().score, lowest);
    }

    #[test]
    fn panic_is_isolated() {
        for parallel in [false, true] {
            let report = Benchmark::new()
                .kmeans_options(fast_kmeans())
                .strategy(Panicking)
                .parallel(parallel)
                .run(&gradient_grid(), 8)
                .unwrap();

            assert_eq!(report.len(), 5);
            assert_eq!(report.successes().count(), 4);

            let failure = report.get("panicking").unwrap().failure().unwrap();
            match &failure.error {
                StrategyError::Panicked(message) => assert!(message.contains("index out of bounds")),
                error => panic!("unexpected error: {error}"),
            }
            assert_ne!(report.best_strategy(), "panicking");
        }
    }

    #[test]
    fn best_is_one_of_the_outcomes() {
        let report = Benchmark::new()
            .kmeans_options(fast_kmeans())
            .strategy(Failing("failing"))
            .run(&random_grid(20, 20, 6), 4)
            .unwrap();

        let best = report.best();
        let entry = report.get(&best.name).unwrap().report().unwrap();
        assert!(std::ptr::eq(best, entry));
    }

    #[test]
    fn all_strategies_failed() {
        let benchmark = Benchmark::with_strategies([
            Box::new(Failing("first")) as Box<dyn Quantizer>,
            Box::new(Failing("second")),
        ]);

        match benchmark.run(&two_color_grid(), 2).unwrap_err() {
            Error::AllStrategiesFailed(failures) => {
                let names = failures.iter().map(|f| f.strategy.as_str()).collect::<Vec<_>>();
                assert_eq!(names, vec!["first", "second"]);
            }
            error => panic!("unexpected error: {error}"),
        }

        assert!(matches!(
            Benchmark::with_strategies([]).run(&two_color_grid(), 2),
            Err(Error::AllStrategiesFailed(failures)) if failures.is_empty()
        ));
    }

    #[test]
    fn order_independent() {
        let image = random_grid(40, 25, 13);
        let scores = |benchmark: Benchmark| {
            let report = benchmark.run(&image, 6).unwrap();
            let mut scores = report
                .successes()
                .map(|s| (s.name.clone(), s.score, s.result.palette.clone()))
                .collect::<Vec<_>>();
            scores.sort_by(|a, b| a.0.cmp(&b.0));
            scores
        };

        let sequential = scores(Benchmark::new().kmeans_options(fast_kmeans()).parallel(false));
        let parallel = scores(Benchmark::new().kmeans_options(fast_kmeans()).parallel(true));

        let mut reversed = QuantizeMethod::defaults().map(|method| match method {
            QuantizeMethod::Kmeans(_) => QuantizeMethod::from(fast_kmeans()),
            other => other,
        });
        reversed.reverse();
        let reversed = scores(Benchmark::with_strategies(
            reversed.into_iter().map(|m| Box::new(m) as Box<dyn Quantizer>),
        ));

        assert_eq!(sequential, parallel);
        assert_eq!(sequential, reversed);
    }

    #[test]
    fn elapsed_time_tie_break() {
        let slow = || Instrumented {
            delay: Duration::from_millis(30),
            ..Instrumented::new("slow")
        };
        let benchmark = |tie_break| {
            Benchmark::with_strategies([Box::new(slow()) as Box<dyn Quantizer>])
                .strategy(Instrumented::new("fast"))
                .tie_break(tie_break)
                .run(&two_color_grid(), 2)
                .unwrap()
        };

        assert_eq!(benchmark(TieBreak::DeclarationOrder).best_strategy(), "slow");
        assert_eq!(benchmark(TieBreak::ElapsedTime).best_strategy(), "fast");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let benchmark = Benchmark::new().strategy(QuantizeMethod::median_cut());
        assert_eq!(
            benchmark.run(&two_color_grid(), 4).unwrap_err(),
            Error::InvalidInput(InvalidInput::DuplicateStrategy("median_cut".to_owned()))
        );

        // the palette size is checked first
        assert_eq!(
            benchmark.run(&two_color_grid(), 1).unwrap_err(),
            Error::InvalidInput(InvalidInput::PaletteSize(1))
        );
    }

    #[test]
    fn builder_configuration() {
        let benchmark = Benchmark::new()
            .kmeans_options(KmeansOptions::new().seed(3))
            .swatch_size(8)
            .comparison_size(50);

        assert_eq!(
            benchmark.strategy_names(),
            vec!["kmeans", "max_coverage", "median_cut", "most_frequent"]
        );

        let report = benchmark.run(&gradient_grid(), 4).unwrap();
        for strategy in report.successes() {
            let n = u32::try_from(strategy.result.palette.len()).unwrap();
            assert_eq!(strategy.swatch.dimensions(), (8 * n, 8));
        }
    }
}
