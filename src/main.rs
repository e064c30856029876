mod config;
mod engine;
mod error;
mod partition;
mod pool;
mod prefix;
mod primes;
mod report;
mod storage;
mod tune;
mod worker;

use clap::Parser;
use log::{debug, info};
use std::process;
use std::time::Instant;

use config::{DEFAULT_TUNE_ITERATIONS, ScanConfig};
use engine::ParallelScanEngine;
use error::Result;
use partition::PartitionStrategy;
use storage::RunRecord;
use tune::AdaptiveTuner;

#[derive(Parser)]
#[command(name = "primorial-scan")]
#[command(
    about = "Find n where p_1 * ... * p_n + 1 is divisible by p_(n+1)",
    long_about = None
)]
struct Cli {
    #[arg(help = "First prime index to scan (1-indexed)")]
    start: Option<u32>,
    #[arg(help = "Last prime index to scan (inclusive)")]
    end: Option<u32>,
    #[arg(
        short,
        long,
        help = "Worker threads (defaults to, and is capped at, hardware concurrency)"
    )]
    threads: Option<usize>,
    #[arg(
        short,
        long,
        value_enum,
        default_value_t = PartitionStrategy::Geometric,
        help = "How the first partition is seeded"
    )]
    strategy: PartitionStrategy,
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_TUNE_ITERATIONS,
        help = "Number of scans the tuner may run"
    )]
    iterations: usize,
    #[arg(long, help = "Run a single scan instead of tuning the partition")]
    once: bool,
    #[arg(long, help = "Append hits to primorial_hits.txt in the data directory")]
    save: bool,
    #[arg(short, long, help = "Do not print hits as they are found")]
    quiet: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn build_config(cli: &Cli) -> Result<ScanConfig> {
    Ok(ScanConfig {
        interval: config::resolve_interval(cli.start, cli.end)?,
        threads: config::resolve_thread_count(cli.threads, config::hardware_threads()),
        strategy: cli.strategy,
        iterations: cli.iterations,
        echo_hits: !cli.quiet,
        save_hits: cli.save,
    })
}

fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    info!(
        "Scanning {} with {} threads ({:?} seed)",
        config.interval, config.threads, config.strategy
    );

    let start = Instant::now();
    let engine = ParallelScanEngine::new(config.echo_hits);

    let (mode, hits) = if cli.once {
        let mut engine = engine;
        let report = engine.run_once(config.interval, config.threads, config.strategy)?;
        for (batch, elapsed) in report.batches.iter().zip(&report.timings) {
            info!("Batch {}: {:.6}s", batch, elapsed.as_secs_f64());
        }
        info!(
            "Scan took {:.3}ms, slowest batch {:.3}ms",
            report.elapsed.as_secs_f64() * 1000.0,
            report.slowest().as_secs_f64() * 1000.0
        );
        ("run", report.hits)
    } else {
        let mut tuner = AdaptiveTuner::new(engine, config.strategy, config.iterations);
        let outcome = tuner.tune(config.interval, config.threads)?;
        for (i, summary) in outcome.iterations.iter().enumerate() {
            debug!(
                "Iteration {}: slowest {:.3}ms, widths {:?}",
                i + 1,
                summary.slowest.as_secs_f64() * 1000.0,
                summary.widths
            );
        }
        info!(
            "Slowest batch went from {:.3}ms to {:.3}ms",
            outcome.iterations[0].slowest.as_secs_f64() * 1000.0,
            outcome.best_slowest.as_secs_f64() * 1000.0
        );
        for batch in &outcome.best {
            info!("Best batch: {} (width {})", batch, batch.width());
        }
        info!("Best batch widths: {:?}", outcome.best_widths());
        ("tune", outcome.hits)
    };

    let duration_us = start.elapsed().as_micros();
    info!(
        "Total execution time: {}us ({:.2}ms), {} hits",
        duration_us,
        duration_us as f64 / 1000.0,
        hits.len()
    );

    let record = RunRecord {
        mode,
        interval: config.interval,
        threads: config.threads,
        duration_us,
        hits: &hits,
    };
    if let Some(path) = storage::record_run(storage::data_dir(), &record, config.save_hits)? {
        info!("Saved {} hits to {}", hits.len(), path.display());
    }

    Ok(())
}
