//! Contains the high level builder API: the quantization methods and the benchmark runner.

mod benchmark;
mod quantize_method;

pub use benchmark::{Benchmark, BenchmarkReport, StrategyOutcome, StrategyReport, TieBreak};
pub use quantize_method::{KmeansOptions, QuantizeMethod};
