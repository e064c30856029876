use thiserror::Error;

/// Everything that can stop a scan or a tuning run.
///
/// None of these are retried: a failed scan leaves no timing data worth
/// rebalancing on, so the caller reports and exits.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid interval [{start}, {end}]: need 1 <= start <= end")]
    InvalidInterval { start: u32, end: u32 },

    #[error("missing interval: expected <START> <END>")]
    MissingInterval,

    #[error("partition must contain at least one batch")]
    EmptyPartition,

    #[error("batches do not cover [{start}, {end}] exactly (first bad batch: {batch})")]
    PartitionMismatch { start: u32, end: u32, batch: usize },

    #[error("got {timings} timings for {batches} batches")]
    TimingMismatch { batches: usize, timings: usize },

    #[error("scan needs {needed} primes but only {available} were generated")]
    MissingPrimes { needed: usize, available: usize },

    #[error("worker for batch {batch} panicked")]
    WorkerPanicked { batch: usize },

    #[error("hit reporter thread panicked")]
    ReporterPanicked,

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_interval_message() {
        let err = ScanError::InvalidInterval { start: 9, end: 3 };
        assert_eq!(
            err.to_string(),
            "invalid interval [9, 3]: need 1 <= start <= end"
        );
    }

    #[test]
    fn test_io_error_converts() {
        fn fails() -> Result<Vec<u8>> {
            Ok(std::fs::read("/nonexistent/primorial-scan/input")?)
        }

        match fails() {
            Err(ScanError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
