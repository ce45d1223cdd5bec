//! Error types for quantization, scoring, and benchmarking.

use crate::{MAX_COLORS, MAX_PIXELS, MIN_COLORS};
use thiserror::Error;

/// An input was rejected before any work was done.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
    /// The requested number of colors is outside the supported range.
    #[error("palette size {0} is outside the supported range {min}..={max}", min = MIN_COLORS, max = MAX_COLORS)]
    PaletteSize(u32),

    /// The pixel buffer does not match the stated dimensions.
    #[error("a {width}x{height} grid cannot hold {actual} pixels")]
    ShapeMismatch {
        /// The stated width.
        width: u32,
        /// The stated height.
        height: u32,
        /// The number of pixels actually provided.
        actual: usize,
    },

    /// The image has a zero width or height.
    #[error("image has no pixels")]
    Empty,

    /// The image has more than [`MAX_PIXELS`] pixels.
    #[error("image has {0} pixels, above the maximum of {max}", max = MAX_PIXELS)]
    TooManyPixels(u64),

    /// Two images that must be compared pixel by pixel have different dimensions.
    #[error("cannot compare a {0}x{1} image with a {2}x{3} image")]
    DimensionMismatch(u32, u32, u32, u32),

    /// No quantization strategy has the given name.
    #[error("unknown quantization strategy `{0}`")]
    UnknownStrategy(String),

    /// Two registered strategies share the same name.
    #[error("strategy `{0}` is registered more than once")]
    DuplicateStrategy(String),
}

/// The reason a strategy could not produce a palette.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    /// A computation produced `NaN` or an infinity.
    #[error("{0} became non-finite")]
    NonFinite(&'static str),

    /// The strategy returned indices that do not describe the input colors.
    #[error("strategy output has {indices} indices for {colors} colors and a palette of {palette}")]
    MalformedOutput {
        /// The number of unique input colors.
        colors: usize,
        /// The number of returned indices.
        indices: usize,
        /// The length of the returned palette.
        palette: usize,
    },

    /// The strategy panicked. Holds the panic message, if it had one.
    #[error("strategy panicked: {0}")]
    Panicked(String),

    /// Any other internal failure.
    #[error("{0}")]
    Internal(String),
}

/// A single strategy failed. The benchmark records this and carries on with the others.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("strategy `{strategy}` failed: {error}")]
pub struct StrategyFailure {
    /// The name of the failed strategy.
    pub strategy: String,
    /// Why the strategy failed.
    #[source]
    pub error: StrategyError,
}

impl StrategyFailure {
    /// Creates a new [`StrategyFailure`] for the named strategy.
    #[must_use]
    pub fn new(strategy: impl Into<String>, error: StrategyError) -> Self {
        Self { strategy: strategy.into(), error }
    }
}

/// The crate-level error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The input was rejected; no partial result exists.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),

    /// A directly invoked strategy failed.
    #[error(transparent)]
    StrategyFailure(#[from] StrategyFailure),

    /// Every strategy of a benchmark failed.
    #[error("all {} strategies failed", .0.len())]
    AllStrategiesFailed(Vec<StrategyFailure>),
}
