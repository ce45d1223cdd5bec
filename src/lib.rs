//! A library that reduces an image to a small color palette with several competing quantizers
//! and scores each result against the original using the CIEDE2000 color difference.
//!
//! Four quantization strategies are provided:
//! - [`kmeans`]: mini-batch k-means in RGB space, restarted several times with the best inertia kept.
//! - [`octree`]: a fast max-coverage octree reduction.
//! - [`median_cut`]: classic median cut along the axis of largest variance.
//! - [`frequency`]: the most populated buckets of a coarse RGB grid, as a naive baseline.
//!
//! Each strategy implements the [`Quantizer`] trait. The [`Benchmark`] builder runs a list of
//! quantizers against one image, scores their output with [`score`], renders a swatch of each palette,
//! and picks the strategy with the lowest mean perceptual error.
//!
//! # Features
//! - `threads`: exposes parallel versions of most functions via [`rayon`]
//!   and runs benchmark strategies concurrently (on by default).
//! - `cli`: builds the `quantbench` command line tool.
//!
//! # Example
//! ```
//! # use quantbench::{PixelGrid, benchmark};
//! # use palette::Srgb;
//! # fn main() -> Result<(), quantbench::Error> {
//! let image = PixelGrid::from_fn(64, 64, |x, y| Srgb::new((x * 4) as u8, (y * 4) as u8, 128))?;
//!
//! let report = benchmark(&image, 8)?;
//! let best = report.best();
//! assert!(best.result.palette.len() <= 8);
//! println!("{} won with a mean ΔE00 of {:.3}", best.name, best.score);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(
    clippy::pedantic,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::expect_used,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    clippy::missing_docs_in_private_items,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::many_single_char_names,
    clippy::missing_panics_doc,
    clippy::unreadable_literal,
    clippy::wildcard_imports
)]

mod api;
mod color_counts;
mod error;
mod traits;
mod types;

pub mod colorspace;
pub mod frequency;
pub mod kmeans;
pub mod median_cut;
pub mod octree;
pub mod score;
pub mod swatch;

pub use api::*;
pub use color_counts::IndexedColorCounts;
pub use error::*;
pub use score::score;
pub use swatch::render_palette;
pub use traits::Quantizer;
pub use types::*;

/// The maximum supported image size in number of pixels.
///
/// Larger images are rejected with [`InvalidInput::TooManyPixels`].
pub const MAX_PIXELS: u32 = 80_000_000;

/// The minimum supported number of palette colors is `2`.
pub const MIN_COLORS: u16 = 2;

/// The maximum supported number of palette colors is `256`.
pub const MAX_COLORS: u16 = u8::MAX as u16 + 1;

/// `MAX_COLORS` as a `usize` for array and `Vec` lengths.
pub(crate) const MAX_K: usize = MAX_COLORS as usize;

/// Runs every default strategy on `image`, scores each result, and returns the ranked report.
///
/// This is a shorthand for `Benchmark::new().run(image, color_count)`.
///
/// # Errors
/// Returns [`Error::InvalidInput`] if `color_count` is outside `2..=256`, before any strategy runs.
/// Returns [`Error::AllStrategiesFailed`] if no strategy produced a result.
pub fn benchmark(image: &PixelGrid, color_count: u32) -> Result<BenchmarkReport, Error> {
    Benchmark::new().run(image, color_count)
}

/// Runs a single strategy, given by name, on `image`.
///
/// Accepted names are those of [`QuantizeMethod`]
/// (`"kmeans"`, `"max_coverage"`, `"median_cut"`, `"most_frequent"`).
/// The k-means strategy uses the default [`KmeansOptions`].
///
/// # Errors
/// Returns [`Error::InvalidInput`] for an unknown strategy name or a `color_count` outside `2..=256`,
/// and [`Error::StrategyFailure`] if the strategy itself failed.
pub fn quantize(strategy: &str, image: &PixelGrid, color_count: u32) -> Result<QuantizedResult, Error> {
    let method = strategy.parse::<QuantizeMethod>()?;
    let palette_size = PaletteSize::try_from(color_count)?;
    Ok(method.quantize(image, palette_size)?)
}
