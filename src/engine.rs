use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::error::{Result, ScanError};
use crate::partition::{Batch, Interval, PartitionStrategy, initial_partition};
use crate::prefix::PrefixProductBuilder;
use crate::primes::PrimeSequence;
use crate::report::HitReporter;
use crate::worker::{BatchOutcome, check_batch};

/// Result of one full scan over an interval.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub batches: Vec<Batch>,
    /// Wall time per batch, in batch order
    pub timings: Vec<Duration>,
    /// Every hit index, ascending
    pub hits: Vec<u32>,
    pub elapsed: Duration,
}

impl ScanReport {
    /// Time of the slowest batch, which bounds the whole scan.
    pub fn slowest(&self) -> Duration {
        self.timings.iter().copied().max().unwrap_or_default()
    }
}

/// Anything that can run a full scan over a given partition.
pub trait BatchScanner {
    fn scan(&mut self, interval: Interval, batches: &[Batch]) -> Result<ScanReport>;
}

/// Fork-join scan: one OS thread per batch, spawned fresh and joined before
/// `run` returns.
///
/// The prime sequence and the prefix pools are kept between runs, so a
/// tuning loop over the same interval only pays for them once. Hits are
/// echoed to stdout only on the first scan of each interval.
#[derive(Debug, Default)]
pub struct ParallelScanEngine {
    builder: PrefixProductBuilder,
    primes: Option<PrimeSequence>,
    echo_hits: bool,
    echoed: Option<Interval>,
}

impl ParallelScanEngine {
    pub fn new(echo_hits: bool) -> Self {
        Self {
            echo_hits,
            ..Self::default()
        }
    }

    /// Scans `interval` with the given partition.
    pub fn run(&mut self, interval: Interval, batches: &[Batch]) -> Result<ScanReport> {
        let started = Instant::now();

        if !self.primes.as_ref().is_some_and(|p| p.covers(interval)) {
            let generated = PrimeSequence::for_interval(interval);
            info!(
                "Generated {} primes (largest {})",
                generated.len(),
                generated.as_slice().last().copied().unwrap_or_default()
            );
            self.primes = Some(generated);
            // Pool layout depended on the old interval
            self.builder.clear();
        }
        let primes: &PrimeSequence = self
            .primes
            .get_or_insert_with(|| PrimeSequence::for_interval(interval));

        let seeds = self.builder.build(primes, interval, batches)?;

        let echo = self.echo_hits && self.echoed != Some(interval);
        let (tx, reporter) = HitReporter::spawn(echo);
        let joined: Vec<thread::Result<BatchOutcome>> = thread::scope(|scope| {
            let handles: Vec<_> = batches
                .iter()
                .zip(seeds)
                .map(|(&batch, seed)| {
                    let tx = tx.clone();
                    scope.spawn(move || check_batch(batch, primes, seed, tx))
                })
                .collect();

            handles.into_iter().map(|h| h.join()).collect()
        });
        drop(tx);
        let hits = reporter.finish()?;

        let mut timings = Vec::with_capacity(joined.len());
        let mut products = Vec::with_capacity(joined.len());
        for (batch, outcome) in joined.into_iter().enumerate() {
            let outcome = outcome.map_err(|_| ScanError::WorkerPanicked { batch })?;
            debug!("Batch {} found {} hits", outcome.batch, outcome.hits);
            timings.push(outcome.elapsed);
            products.push(outcome.product);
        }
        self.builder.recycle(products);
        if echo {
            self.echoed = Some(interval);
        }

        let elapsed = started.elapsed();
        info!(
            "Took: {:.3}ms ({} batches, {} hits)",
            elapsed.as_secs_f64() * 1000.0,
            batches.len(),
            hits.len()
        );
        debug!("Batch timings: {:?}", timings);

        Ok(ScanReport {
            batches: batches.to_vec(),
            timings,
            hits,
            elapsed,
        })
    }

    /// Single scan with a freshly seeded partition for `threads` workers.
    pub fn run_once(
        &mut self,
        interval: Interval,
        threads: usize,
        strategy: PartitionStrategy,
    ) -> Result<ScanReport> {
        let batches = initial_partition(interval, threads, strategy)?;
        self.run(interval, &batches)
    }
}

impl BatchScanner for ParallelScanEngine {
    fn scan(&mut self, interval: Interval, batches: &[Batch]) -> Result<ScanReport> {
        self.run(interval, batches)
    }
}
