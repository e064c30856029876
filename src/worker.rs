use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use log::info;
use rug::{Assign, Integer};

use crate::partition::Batch;
use crate::primes::PrimeSequence;

/// What one worker hands back after finishing its batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub batch: Batch,
    pub elapsed: Duration,
    pub hits: usize,
    /// Running product after the last index: p_1 * ... * p_{batch.end}
    pub product: Integer,
}

/// Tests `(p_1 * ... * p_i + 1) mod p_{i+1} == 0` for every `i` in `batch`.
///
/// `running` must equal p_1 * ... * p_{batch.start - 1} on entry; the worker
/// owns it for the whole batch and returns it in the outcome. Hits are sent
/// in increasing index order.
pub fn check_batch(
    batch: Batch,
    primes: &PrimeSequence,
    mut running: Integer,
    hits: Sender<u32>,
) -> BatchOutcome {
    let start = Instant::now();
    let mut found = 0;
    let mut wide_divisor = Integer::new();

    for index in batch.start..=batch.end {
        running *= primes.nth(index);
        running += 1u32;

        let divisor = primes.nth(index + 1);
        let divisible = match u32::try_from(divisor) {
            Ok(small) => running.is_divisible_u(small),
            Err(_) => {
                wide_divisor.assign(divisor);
                running.is_divisible(&wide_divisor)
            }
        };
        if divisible {
            found += 1;
            // A closed channel means the reporter died; the engine reports that
            let _ = hits.send(index);
        }

        running -= 1u32;
    }

    let elapsed = start.elapsed();
    info!(
        "Thread: {} finished in {:.6}s ({} hits)",
        batch,
        elapsed.as_secs_f64(),
        found
    );

    BatchOutcome {
        batch,
        elapsed,
        hits: found,
        product: running,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn brute_force_hits(primes: &PrimeSequence, from: u32, to: u32) -> Vec<u32> {
        (from..=to)
            .filter(|&i| {
                let mut product = Integer::from(1);
                for k in 1..=i {
                    product *= primes.nth(k);
                }
                product += 1u32;
                product.is_divisible(&Integer::from(primes.nth(i + 1)))
            })
            .collect()
    }

    #[test]
    fn test_first_five_indices() {
        // 2 + 1 = 3 is divisible by p_2 = 3; 7, 31, 211, 2311 miss 5, 7, 11, 13
        let primes = PrimeSequence::generate(6);
        let (tx, rx) = mpsc::channel();
        let outcome = check_batch(Batch { start: 1, end: 5 }, &primes, Integer::from(1), tx);

        let hits: Vec<u32> = rx.iter().collect();
        assert_eq!(hits, vec![1]);
        assert_eq!(outcome.hits, 1);
        assert_eq!(outcome.product, 2 * 3 * 5 * 7 * 11);
    }

    #[test]
    fn test_matches_brute_force_from_seed() {
        let primes = PrimeSequence::generate(401);
        let seed: Integer = (1..150).map(|i| Integer::from(primes.nth(i))).product();

        let (tx, rx) = mpsc::channel();
        let outcome = check_batch(Batch { start: 150, end: 400 }, &primes, seed, tx);
        let hits: Vec<u32> = rx.iter().collect();

        assert_eq!(hits, brute_force_hits(&primes, 150, 400));
        assert_eq!(outcome.hits, hits.len());
        assert!(hits.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_running_product_restored_after_batch() {
        let primes = PrimeSequence::generate(31);
        let (tx, _rx) = mpsc::channel();
        let outcome = check_batch(Batch { start: 1, end: 30 }, &primes, Integer::from(1), tx);

        let expected: Integer = (1..=30).map(|i| Integer::from(primes.nth(i))).product();
        assert_eq!(outcome.product, expected);
    }

    #[test]
    fn test_closed_channel_does_not_stop_batch() {
        let primes = PrimeSequence::generate(6);
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let outcome = check_batch(Batch { start: 1, end: 5 }, &primes, Integer::from(1), tx);
        assert_eq!(outcome.hits, 1);
    }
}
