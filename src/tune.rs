use std::time::Duration;

use log::{debug, info};

use crate::engine::BatchScanner;
use crate::error::Result;
use crate::partition::{Batch, Interval, PartitionStrategy, initial_partition, rebalance};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TuneState {
    Seed,
    Measure,
    Rebalance,
    Done,
}

/// One Measure step of a tuning run.
#[derive(Debug, Clone)]
pub struct IterationSummary {
    pub widths: Vec<u32>,
    pub slowest: Duration,
}

#[derive(Debug, Clone)]
pub struct TuneOutcome {
    /// Partition with the lowest slowest-batch time seen
    pub best: Vec<Batch>,
    pub best_slowest: Duration,
    pub iterations: Vec<IterationSummary>,
    /// Hits of the last scan; every scan of the interval finds the same set
    pub hits: Vec<u32>,
}

impl TuneOutcome {
    pub fn best_widths(&self) -> Vec<u32> {
        self.best.iter().map(Batch::width).collect()
    }
}

/// Re-runs whole scans, feeding each scan's batch timings back into the
/// partition, and keeps the partition whose slowest batch was fastest.
///
/// There is no convergence test: the loop stops after `iterations` scans.
/// A failed scan aborts the run, since its timings cannot be trusted.
pub struct AdaptiveTuner<S: BatchScanner> {
    scanner: S,
    strategy: PartitionStrategy,
    iterations: usize,
}

impl<S: BatchScanner> AdaptiveTuner<S> {
    pub fn new(scanner: S, strategy: PartitionStrategy, iterations: usize) -> Self {
        Self {
            scanner,
            strategy,
            iterations: iterations.max(1),
        }
    }

    pub fn tune(&mut self, interval: Interval, threads: usize) -> Result<TuneOutcome> {
        let mut state = TuneState::Seed;
        let mut current = Vec::new();
        let mut timings = Vec::new();
        let mut hits = Vec::new();
        let mut history: Vec<IterationSummary> = Vec::with_capacity(self.iterations);
        let mut best: Option<(Vec<Batch>, Duration)> = None;

        while state != TuneState::Done {
            state = match state {
                TuneState::Seed => {
                    current = initial_partition(interval, threads, self.strategy)?;
                    debug!("Seeded {} batches with {:?} strategy", current.len(), self.strategy);
                    TuneState::Measure
                }
                TuneState::Measure => {
                    let report = self.scanner.scan(interval, &current)?;
                    let slowest = report.slowest();
                    let widths: Vec<u32> = current.iter().map(Batch::width).collect();

                    info!(
                        "Iteration {}/{}: slowest batch {:.3}ms, widths {:?}",
                        history.len() + 1,
                        self.iterations,
                        slowest.as_secs_f64() * 1000.0,
                        widths
                    );

                    if best.as_ref().is_none_or(|(_, t)| slowest < *t) {
                        best = Some((current.clone(), slowest));
                    }
                    history.push(IterationSummary { widths, slowest });
                    timings = report.timings;
                    hits = report.hits;

                    if history.len() >= self.iterations {
                        TuneState::Done
                    } else {
                        TuneState::Rebalance
                    }
                }
                TuneState::Rebalance => {
                    current = rebalance(&current, &timings)?;
                    TuneState::Measure
                }
                TuneState::Done => TuneState::Done,
            };
        }

        let (best, best_slowest) = best.unwrap_or((current, Duration::ZERO));
        info!(
            "Best partition: slowest batch {:.3}ms over {} iterations",
            best_slowest.as_secs_f64() * 1000.0,
            history.len()
        );
        for batch in &best {
            debug!("  {} (width {})", batch, batch.width());
        }

        Ok(TuneOutcome {
            best,
            best_slowest,
            iterations: history,
            hits,
        })
    }

    #[cfg(test)]
    pub fn into_scanner(self) -> S {
        self.scanner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ParallelScanEngine, ScanReport};
    use crate::error::ScanError;
    use crate::partition::validate_partition;

    /// Index `i` costs `i` microseconds, so later batches are slower.
    struct LinearCost {
        scans: usize,
        fail_on: Option<usize>,
    }

    impl LinearCost {
        fn new() -> Self {
            Self {
                scans: 0,
                fail_on: None,
            }
        }
    }

    impl BatchScanner for LinearCost {
        fn scan(&mut self, _interval: Interval, batches: &[Batch]) -> Result<ScanReport> {
            self.scans += 1;
            if self.fail_on == Some(self.scans) {
                return Err(ScanError::WorkerPanicked { batch: 0 });
            }

            let timings: Vec<Duration> = batches
                .iter()
                .map(|b| Duration::from_micros((b.start..=b.end).map(u64::from).sum()))
                .collect();
            let elapsed = timings.iter().copied().max().unwrap_or_default();
            Ok(ScanReport {
                batches: batches.to_vec(),
                timings,
                hits: vec![1],
                elapsed,
            })
        }
    }

    #[test]
    fn test_runs_exact_iteration_budget() {
        let interval = Interval::new(1, 1000).unwrap();
        let mut tuner = AdaptiveTuner::new(LinearCost::new(), PartitionStrategy::Equal, 6);
        let outcome = tuner.tune(interval, 4).unwrap();

        assert_eq!(outcome.iterations.len(), 6);
        assert_eq!(tuner.into_scanner().scans, 6);
    }

    #[test]
    fn test_rebalancing_lowers_slowest_batch() {
        let interval = Interval::new(1, 1000).unwrap();
        let mut tuner = AdaptiveTuner::new(LinearCost::new(), PartitionStrategy::Equal, 5);
        let outcome = tuner.tune(interval, 4).unwrap();

        let first = outcome.iterations[0].slowest;
        assert!(outcome.best_slowest < first);
        assert!(outcome.iterations[1].slowest < first);
        assert_eq!(
            outcome.best_slowest,
            outcome.iterations.iter().map(|i| i.slowest).min().unwrap()
        );
    }

    #[test]
    fn test_best_partition_covers_interval() {
        let interval = Interval::new(10, 5000).unwrap();
        for strategy in [PartitionStrategy::Equal, PartitionStrategy::Geometric] {
            let mut tuner = AdaptiveTuner::new(LinearCost::new(), strategy, 4);
            let outcome = tuner.tune(interval, 7).unwrap();

            validate_partition(interval, &outcome.best).unwrap();
            assert_eq!(outcome.best_widths().iter().sum::<u32>(), interval.width());
            assert!(outcome.best_widths().iter().all(|&w| w >= 1));
        }
    }

    #[test]
    fn test_zero_budget_still_measures_once() {
        let interval = Interval::new(1, 50).unwrap();
        let mut tuner = AdaptiveTuner::new(LinearCost::new(), PartitionStrategy::Equal, 0);
        let outcome = tuner.tune(interval, 2).unwrap();
        assert_eq!(outcome.iterations.len(), 1);
    }

    #[test]
    fn test_failed_scan_aborts_tuning() {
        let interval = Interval::new(1, 100).unwrap();
        let scanner = LinearCost {
            scans: 0,
            fail_on: Some(2),
        };
        let mut tuner = AdaptiveTuner::new(scanner, PartitionStrategy::Equal, 5);
        assert!(matches!(
            tuner.tune(interval, 3),
            Err(ScanError::WorkerPanicked { .. })
        ));
        assert_eq!(tuner.into_scanner().scans, 2);
    }

    #[test]
    fn test_tunes_real_engine() {
        let interval = Interval::new(1, 200).unwrap();
        let mut engine = ParallelScanEngine::new(false);
        let expected = engine.run_once(interval, 1, PartitionStrategy::Equal).unwrap().hits;

        let mut tuner = AdaptiveTuner::new(engine, PartitionStrategy::Geometric, 3);
        let outcome = tuner.tune(interval, 3).unwrap();

        assert_eq!(outcome.hits, expected);
        assert_eq!(outcome.iterations.len(), 3);
        validate_partition(interval, &outcome.best).unwrap();
    }
}
