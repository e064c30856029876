use log::warn;

use crate::error::{Result, ScanError};
use crate::partition::{Interval, PartitionStrategy};

/// Interval substituted for missing arguments when built with the
/// `fallback-interval` feature.
pub const FALLBACK_INTERVAL: (u32, u32) = (1, 100_000);

pub const DEFAULT_TUNE_ITERATIONS: usize = 10;

/// Everything one invocation needs, after validation.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub interval: Interval,
    pub threads: usize,
    pub strategy: PartitionStrategy,
    pub iterations: usize,
    pub echo_hits: bool,
    pub save_hits: bool,
}

pub fn hardware_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Requested worker count, or `hardware` when the request is missing, zero or
/// above what the machine offers.
pub fn resolve_thread_count(requested: Option<usize>, hardware: usize) -> usize {
    let hardware = hardware.max(1);
    match requested {
        Some(n) if n >= 1 && n <= hardware => n,
        Some(n) => {
            warn!(
                "Requested {} threads but hardware concurrency is {}, using {}",
                n, hardware, hardware
            );
            hardware
        }
        None => hardware,
    }
}

/// Builds the interval from the positional arguments.
pub fn resolve_interval(start: Option<u32>, end: Option<u32>) -> Result<Interval> {
    match (start, end) {
        (Some(start), Some(end)) => Interval::new(start, end),
        _ if cfg!(feature = "fallback-interval") => {
            let (start, end) = FALLBACK_INTERVAL;
            warn!("Interval arguments missing, falling back to [{}, {}]", start, end);
            Interval::new(start, end)
        }
        _ => Err(ScanError::MissingInterval),
    }
}
