use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use palette::Srgb;
use quantbench::{
    score::COMPARISON_SIZE, Benchmark, BenchmarkReport, KmeansOptions, PixelGrid, QuantizeMethod,
    Quantizer, StrategyOutcome, TieBreak, MAX_PIXELS,
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Quantize an image with several strategies and report which palette is perceptually closest.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// The input image path
    input: PathBuf,

    /// Number of palette colors (2 to 256)
    #[arg(short = 'k', long, default_value_t = 8)]
    colors: u32,

    /// Run only this strategy (kmeans, max_coverage, median_cut, or most_frequent)
    #[arg(short, long)]
    strategy: Option<String>,

    /// Seed for k-means initialization and sampling
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of pixels sampled per k-means batch
    #[arg(long, default_value_t = 2048)]
    batch_size: u32,

    /// Number of k-means restarts, the lowest inertia is kept
    #[arg(long, default_value_t = 3)]
    trials: u32,

    /// Side length of the square images compared when scoring
    #[arg(long, default_value_t = COMPARISON_SIZE)]
    comparison_size: u32,

    /// Side length of each color block in the palette images
    #[arg(long, default_value_t = Benchmark::DEFAULT_SWATCH_SIZE)]
    swatch_size: u32,

    /// How to pick between strategies with equal scores
    #[arg(long, value_enum, default_value_t = TieBreakArg::Declaration)]
    tie_break: TieBreakArg,

    /// Directory to write `<strategy>.png` and `<strategy>_palette.png` into
    #[arg(short = 'd', long)]
    output_dir: Option<PathBuf>,

    /// Print a JSON summary instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TieBreakArg {
    /// Earlier strategies win
    Declaration,
    /// Faster strategies win
    Elapsed,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::Declaration => Self::DeclarationOrder,
            TieBreakArg::Elapsed => Self::ElapsedTime,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quantbench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let image = load(&args.input)?;
    tracing::info!(
        path = %args.input.display(),
        width = image.width(),
        height = image.height(),
        "loaded image"
    );

    let benchmark = match &args.strategy {
        Some(name) => {
            let method = name.parse::<QuantizeMethod>()?;
            Benchmark::with_strategies([Box::new(method) as Box<dyn Quantizer>])
        }
        None => Benchmark::new(),
    };

    let report = benchmark
        .kmeans_options(
            KmeansOptions::new()
                .seed(args.seed)
                .batch_size(args.batch_size)
                .trials(args.trials),
        )
        .comparison_size(args.comparison_size)
        .swatch_size(args.swatch_size)
        .tie_break(args.tie_break.into())
        .run(&image, args.colors)?;

    if let Some(dir) = &args.output_dir {
        write_outputs(&report, dir)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary(&report))?);
    } else {
        print_table(&report);
    }

    Ok(())
}

/// Decodes an RGB image, rejecting it before decoding if it has too many pixels.
fn load(path: &Path) -> Result<PixelGrid> {
    let (width, height) = image::ImageReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .with_guessed_format()?
        .into_dimensions()
        .with_context(|| format!("failed to read the dimensions of {}", path.display()))?;

    if u64::from(width) * u64::from(height) > u64::from(MAX_PIXELS) {
        bail!("{width}x{height} image exceeds the limit of {MAX_PIXELS} pixels");
    }

    let image = image::open(path)
        .with_context(|| format!("failed to decode {}", path.display()))?
        .into_rgb8();

    Ok(PixelGrid::try_from(&image)?)
}

fn write_outputs(report: &BenchmarkReport, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    for strategy in report.successes() {
        let image_path = dir.join(format!("{}.png", strategy.name));
        strategy
            .result
            .image
            .to_rgbimage()
            .save(&image_path)
            .with_context(|| format!("failed to write {}", image_path.display()))?;

        let palette_path = dir.join(format!("{}_palette.png", strategy.name));
        strategy
            .swatch
            .to_rgbimage()
            .save(&palette_path)
            .with_context(|| format!("failed to write {}", palette_path.display()))?;

        tracing::info!(path = %image_path.display(), "saved quantized image");
    }
    Ok(())
}

fn hex(color: Srgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue)
}

fn summary(report: &BenchmarkReport) -> serde_json::Value {
    let strategies = report
        .outcomes()
        .iter()
        .map(|outcome| match outcome {
            StrategyOutcome::Succeeded(strategy) => serde_json::json!({
                "name": strategy.name,
                "status": "ok",
                "score": strategy.score,
                "rgb_rmse": strategy.rgb_rmse,
                "elapsed_ms": strategy.result.elapsed.as_secs_f64() * 1000.0,
                "palette": strategy.result.palette.iter().copied().map(hex).collect::<Vec<_>>(),
            }),
            StrategyOutcome::Failed(failure) => serde_json::json!({
                "name": failure.strategy,
                "status": "failed",
                "error": failure.error.to_string(),
            }),
        })
        .collect::<Vec<_>>();

    serde_json::json!({
        "best": report.best_strategy(),
        "strategies": strategies,
    })
}

fn print_table(report: &BenchmarkReport) {
    println!("{:<14} {:>10} {:>10} {:>12}  palette", "strategy", "ΔE00", "rmse", "elapsed");
    for outcome in report.outcomes() {
        match outcome {
            StrategyOutcome::Succeeded(strategy) => {
                let marker = if strategy.name == report.best_strategy() { "*" } else { " " };
                let palette = strategy
                    .result
                    .palette
                    .iter()
                    .copied()
                    .map(hex)
                    .collect::<Vec<_>>()
                    .join(" ");
                println!(
                    "{marker}{:<13} {:>10.4} {:>10.4} {:>10.2}ms  {palette}",
                    strategy.name,
                    strategy.score,
                    strategy.rgb_rmse,
                    strategy.result.elapsed.as_secs_f64() * 1000.0,
                );
            }
            StrategyOutcome::Failed(failure) => {
                println!(" {:<13} failed: {}", failure.strategy, failure.error);
            }
        }
    }
}
