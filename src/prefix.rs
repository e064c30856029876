use log::{debug, info};
use rug::Integer;

use crate::error::{Result, ScanError};
use crate::partition::{Batch, Interval, validate_partition};
use crate::pool::BigIntPool;
use crate::primes::PrimeSequence;

/// Computes the running product each batch has to start from.
///
/// The pools survive between calls so repeated scans during tuning reuse
/// the same GMP allocations instead of building thousands of fresh integers.
#[derive(Debug, Default)]
pub struct PrefixProductBuilder {
    pre: BigIntPool,
    batch: BigIntPool,
}

impl PrefixProductBuilder {
    /// Returns one seed per batch: seed `b` is the exact product
    /// p_1 * ... * p_{s_b - 1}, where s_b is the first index of batch `b`.
    /// Seed 0 is the offset product (1 when the interval starts at index 1).
    ///
    /// 1. Offset product of every prime before the interval, by pairwise
    ///    reduction.
    /// 2. Pairwise reduction of each batch's own primes, except the last
    ///    batch, whose product nobody starts from.
    /// 3. Chain those products in batch order.
    /// 4. Multiply each chained product by the offset product.
    pub fn build(
        &mut self,
        primes: &PrimeSequence,
        interval: Interval,
        batches: &[Batch],
    ) -> Result<Vec<Integer>> {
        validate_partition(interval, batches)?;
        if !primes.covers(interval) {
            return Err(ScanError::MissingPrimes {
                needed: interval.end as usize + 1,
                available: primes.len(),
            });
        }

        let offset = self.offset_product(primes, interval);
        info!("Offset product calculated ({} bits)", offset.significant_bits());

        // The last batch's own primes never feed a seed
        let chained = &batches[..batches.len() - 1];
        let first = interval.start as usize - 1;
        let needed = (batches[batches.len() - 1].start - interval.start) as usize;

        self.batch.truncate();
        self.batch.reserve(needed);
        for &p in &primes.as_slice()[first..first + needed] {
            self.batch.push_u64(p);
        }

        let mut previous_lo = None;
        for batch in chained {
            let lo = (batch.start - interval.start) as usize;
            self.batch.reduce_product(lo, batch.width() as usize);
            if let Some(prev) = previous_lo {
                self.batch.mul_assign_slot(lo, prev);
            }
            previous_lo = Some(lo);
        }

        let mut seeds = Vec::with_capacity(batches.len());
        for batch in chained {
            let lo = (batch.start - interval.start) as usize;
            self.batch[lo] *= &offset;
            seeds.push(self.batch.take(lo));
        }
        seeds.insert(0, offset);

        info!("Start points calculated for {} batches", batches.len());
        Ok(seeds)
    }

    /// Hands seeds (now holding the workers' final running products) back so
    /// their allocations are reused by the next `build`.
    pub fn recycle(&mut self, seeds: Vec<Integer>) {
        let kept = seeds.len().min(self.batch.len());
        for (i, value) in seeds.into_iter().take(kept).enumerate() {
            self.batch.restore(i, value);
        }
        debug!(
            "Recycled {} running products ({} slots pooled)",
            kept,
            self.batch.capacity()
        );
    }

    /// Releases every pooled integer.
    pub fn clear(&mut self) {
        self.pre.clear();
        self.batch.clear();
    }

    fn offset_product(&mut self, primes: &PrimeSequence, interval: Interval) -> Integer {
        let count = interval.start as usize - 1;
        if count == 0 {
            return Integer::from(1);
        }

        self.pre.truncate();
        self.pre.reserve(count);
        for &p in &primes.as_slice()[..count] {
            self.pre.push_u64(p);
        }
        self.pre.reduce_product(0, count);
        self.pre.take(0)
    }
}
