//! parjpeg CLI - benchmark and analysis driver
//!
//! Times the block encoder under each threading strategy, sweeps quality
//! levels, and round-trips single images through the full codec.

use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use parjpeg::decode::{self, decode_from_blocks};
use parjpeg::jpeg::default_threads;
use parjpeg::metrics::{compression_ratio, psnr, ssim};
use parjpeg::{
    DctMethod, EncodeOptions, EncodedOutput, Encoder, EntropyCoding, QualityReport, RgbImage,
    Strategy,
};

/// Benchmark and analysis tool for the parjpeg block codec.
#[derive(Parser, Debug)]
#[command(name = "parjpeg")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Show debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Time every strategy on the gradient test image
    Bench(BenchArgs),
    /// Size and quality across a range of quality levels
    Sweep(SweepArgs),
    /// Encode, decode and report quality for one configuration
    Roundtrip(RoundtripArgs),
}

#[derive(Args, Debug)]
struct CodecArgs {
    /// Forward DCT implementation
    #[arg(long, value_enum, default_value = "reference")]
    dct: DctArg,

    /// Huffman symbol mapping
    #[arg(long, value_enum, default_value = "coefficient")]
    entropy: EntropyArg,
}

#[derive(Args, Debug)]
struct BenchArgs {
    /// Image sizes to benchmark (repeatable)
    #[arg(
        long = "size",
        value_name = "WxH",
        value_parser = parse_size,
        default_values = ["256x256", "512x512"]
    )]
    sizes: Vec<(u32, u32)>,

    /// Quality (1-100, higher = better quality)
    #[arg(short, long, default_value = "75", value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Timed encodes per strategy
    #[arg(short, long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..))]
    iterations: u32,

    /// Worker counts to try (repeatable, defaults to available parallelism)
    #[arg(short, long = "threads")]
    threads: Vec<usize>,

    #[command(flatten)]
    codec: CodecArgs,
}

#[derive(Args, Debug)]
struct SweepArgs {
    /// Image size
    #[arg(long, value_name = "WxH", value_parser = parse_size, default_value = "512x512")]
    size: (u32, u32),

    #[command(flatten)]
    codec: CodecArgs,
}

#[derive(Args, Debug)]
struct RoundtripArgs {
    /// Image size
    #[arg(long, value_name = "WxH", value_parser = parse_size, default_value = "256x256")]
    size: (u32, u32),

    /// Quality (1-100, higher = better quality)
    #[arg(short, long, default_value = "75", value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Block processing strategy
    #[arg(short, long, value_enum, default_value = "sequential")]
    strategy: StrategyArg,

    /// Worker count for threaded strategies
    #[arg(short, long)]
    threads: Option<usize>,

    #[command(flatten)]
    codec: CodecArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DctArg {
    /// Direct evaluation of the DCT sum
    Reference,
    /// AAN factorization
    Fast,
}

impl From<DctArg> for DctMethod {
    fn from(arg: DctArg) -> Self {
        match arg {
            DctArg::Reference => DctMethod::Reference,
            DctArg::Fast => DctMethod::Fast,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EntropyArg {
    /// Every zigzag coefficient is a symbol
    Coefficient,
    /// DC differences and AC run/size symbols
    RunLength,
}

impl From<EntropyArg> for EntropyCoding {
    fn from(arg: EntropyArg) -> Self {
        match arg {
            EntropyArg::Coefficient => EntropyCoding::Coefficient,
            EntropyArg::RunLength => EntropyCoding::RunLength,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Single thread
    Sequential,
    /// Long-lived worker pool
    Pool,
    /// Static partition over scoped threads
    DataParallel,
    /// Extract / DCT / quantize stages joined by channels
    Pipeline,
    /// One task per block
    ForkJoin,
    /// rayon parallel iterator
    #[cfg(feature = "parallel")]
    Rayon,
}

impl StrategyArg {
    fn to_strategy(self, threads: usize) -> Strategy {
        match self {
            StrategyArg::Sequential => Strategy::Sequential,
            StrategyArg::Pool => Strategy::WorkerPool { threads },
            StrategyArg::DataParallel => Strategy::DataParallel { threads },
            StrategyArg::Pipeline => Strategy::Pipeline {
                dct_workers: threads,
                quant_workers: threads,
            },
            StrategyArg::ForkJoin => Strategy::ForkJoin,
            #[cfg(feature = "parallel")]
            StrategyArg::Rayon => Strategy::Rayon,
        }
    }
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {s:?}"))?;
    let width: u32 = w.trim().parse().map_err(|e| format!("bad width {w:?}: {e}"))?;
    let height: u32 = h.trim().parse().map_err(|e| format!("bad height {h:?}: {e}"))?;
    if width == 0 || height == 0 {
        return Err(format!("dimensions must be non-zero, got {width}x{height}"));
    }
    Ok((width, height))
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Bench(args) => bench(&args),
        Command::Sweep(args) => sweep(&args),
        Command::Roundtrip(args) => roundtrip(&args),
    }
}

fn base_options(quality: u8, codec: &CodecArgs) -> EncodeOptions {
    EncodeOptions::default()
        .with_quality(quality)
        .with_dct(codec.dct.into())
        .with_entropy(codec.entropy.into())
}

/// One strategy's timing and quality figures.
struct BenchResult {
    label: String,
    total: Duration,
    iterations: u32,
    output: EncodedOutput,
    psnr: f64,
    ssim: f64,
}

impl BenchResult {
    fn average_ms(&self) -> f64 {
        self.total.as_secs_f64() * 1000.0 / self.iterations as f64
    }
}

fn bench_strategy(
    image: &RgbImage,
    options: EncodeOptions,
    iterations: u32,
) -> Result<BenchResult, Box<dyn std::error::Error>> {
    let encoder = Encoder::new(options)?;
    let label = options.strategy.to_string();

    // Warm-up run, also the one measured for quality
    let blocks = encoder.process_blocks(image)?;
    let output = encoder.encode_blocks(&blocks, image.width(), image.height())?;

    let mut total = Duration::ZERO;
    for _ in 0..iterations {
        let start = Instant::now();
        let encoded = encoder.encode(image)?;
        total += start.elapsed();
        if encoded.data != output.data {
            return Err(format!("{label}: output changed between runs").into());
        }
    }

    let reconstructed =
        decode_from_blocks(&blocks, encoder.quantization(), image.width(), image.height())?;
    Ok(BenchResult {
        label,
        total,
        iterations,
        psnr: psnr(image, &reconstructed)?,
        ssim: ssim(image, &reconstructed)?,
        output,
    })
}

fn bench(args: &BenchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let thread_counts = if args.threads.is_empty() {
        vec![default_threads()]
    } else {
        args.threads.clone()
    };

    let mut consistent = true;
    for &(width, height) in &args.sizes {
        let image = RgbImage::test_pattern(width, height)?;
        println!();
        println!(
            "{width}x{height} test pattern, quality {}, {} iterations",
            args.quality, args.iterations
        );
        println!(
            "{:<32} {:>10} {:>10} {:>10} {:>8} {:>8} {:>7} {:>8}",
            "strategy", "avg ms", "total ms", "size", "ratio", "psnr", "ssim", "speedup"
        );

        let mut strategies = vec![Strategy::Sequential];
        for &threads in &thread_counts {
            strategies.extend(
                Strategy::all(threads)
                    .into_iter()
                    .filter(|s| *s != Strategy::Sequential),
            );
        }

        let mut results = Vec::with_capacity(strategies.len());
        for strategy in strategies {
            let options = base_options(args.quality, &args.codec).with_strategy(strategy);
            results.push(bench_strategy(&image, options, args.iterations)?);
        }

        let baseline_ms = results[0].average_ms();
        for result in &results {
            println!(
                "{:<32} {:>10.3} {:>10.3} {:>10} {:>8.2} {:>8.2} {:>7.4} {:>7.2}x",
                result.label,
                result.average_ms(),
                result.total.as_secs_f64() * 1000.0,
                format_size(result.output.compressed_size() as u64),
                compression_ratio(&image, result.output.compressed_size()),
                result.psnr,
                result.ssim,
                baseline_ms / result.average_ms().max(f64::EPSILON),
            );
        }

        let baseline = &results[0];
        for result in &results[1..] {
            let mut problems = Vec::new();
            if (result.psnr - baseline.psnr).abs() > 0.5 {
                problems.push(format!("psnr {:.2} vs {:.2}", result.psnr, baseline.psnr));
            }
            if (result.ssim - baseline.ssim).abs() > 0.01 {
                problems.push(format!("ssim {:.4} vs {:.4}", result.ssim, baseline.ssim));
            }
            if result.output.data != baseline.output.data {
                problems.push("stream bytes differ".to_string());
            }
            if !problems.is_empty() {
                consistent = false;
                println!("  INCONSISTENT {}: {}", result.label, problems.join(", "));
            }
        }
    }

    println!();
    if consistent {
        println!("Consistency check passed: every strategy produced identical output");
        Ok(())
    } else {
        Err("strategies disagree".into())
    }
}

fn sweep(args: &SweepArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (width, height) = args.size;
    let image = RgbImage::test_pattern(width, height)?;
    println!("{width}x{height} test pattern");
    println!(
        "{:>7} {:>10} {:>8} {:>8} {:>7}  rating",
        "quality", "size", "ratio", "psnr", "ssim"
    );

    for quality in [10u8, 25, 50, 75, 90, 95, 100] {
        let encoder = Encoder::new(base_options(quality, &args.codec))?;
        let blocks = encoder.process_blocks(&image)?;
        let output = encoder.encode_blocks(&blocks, width, height)?;
        let reconstructed = decode_from_blocks(&blocks, encoder.quantization(), width, height)?;
        let report = QualityReport::new(&image, &reconstructed, output.compressed_size())?;
        println!(
            "{:>7} {:>10} {:>8.2} {:>8.2} {:>7.4}  {}",
            quality,
            format_size(report.compressed_size as u64),
            report.ratio,
            report.psnr,
            report.ssim,
            report.rating()
        );
    }
    Ok(())
}

fn roundtrip(args: &RoundtripArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (width, height) = args.size;
    let image = RgbImage::test_pattern(width, height)?;
    let threads = args.threads.unwrap_or_else(default_threads);
    let options = base_options(args.quality, &args.codec)
        .with_strategy(args.strategy.to_strategy(threads));
    let encoder = Encoder::new(options)?;

    let start = Instant::now();
    let encoded = encoder.encode(&image)?;
    let encode_time = start.elapsed();

    let start = Instant::now();
    let decoded = decode::decode(&encoded)?;
    let decode_time = start.elapsed();

    let report = QualityReport::new(&image, &decoded, encoded.compressed_size())?;
    println!("Strategy:    {}", options.strategy);
    println!("Encode time: {encode_time:.2?}");
    println!("Decode time: {decode_time:.2?}");
    println!("{report}");
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
