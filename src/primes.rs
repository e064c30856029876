use crate::partition::Interval;

// Segment size for the incremental sieve
pub const SEGMENT_SIZE_BITS: usize = 32 * 1024 * 8; // 32KB in bits = 262,144 odd numbers
pub const SEGMENT_SIZE_NUMBERS: u64 = SEGMENT_SIZE_BITS as u64 * 2; // 524,288 actual numbers

/// Odd-Only Sieve of Eratosthenes
///
/// Returns every prime `<= limit`.
/// - Index mapping: is_prime[i] represents the number (2*i + 3)
/// - Only marks odd multiples of odd primes
/// - Used for base primes of the segmented sieve
pub fn sieve_odd(limit: u64) -> Vec<u64> {
    if limit < 2 {
        return vec![];
    }
    if limit == 2 {
        return vec![2];
    }

    let mut primes = vec![2];

    // Array size is half since we only track odd numbers
    let size = ((limit - 1) / 2) as usize;
    let mut is_prime = vec![true; size];

    for i in 0..size {
        let p = 2 * i as u64 + 3;
        if p * p > limit {
            break;
        }
        if is_prime[i] {
            let mut j = ((p * p - 3) / 2) as usize;
            while j < size {
                is_prime[j] = false;
                j += p as usize;
            }
        }
    }

    for (i, &is_p) in is_prime.iter().enumerate() {
        if is_p {
            primes.push(2 * i as u64 + 3);
        }
    }

    primes
}

/// Unbounded prime generator: yields 2, 3, 5, ... strictly increasing, one
/// prime per call.
///
/// Segmented sieve with bit-packing and odd-only storage:
/// - Memory: O(sqrt(p) + segment_size)
/// - Segment size: 32KB (fits in L1 cache)
/// - Base primes are re-sieved on demand when a segment reaches past the
///   square of the largest known base prime
pub struct PrimeIter {
    base: Vec<u64>, // odd base primes only
    base_limit: u64,
    segment: Vec<u64>,
    buffer: Vec<u64>,
    pos: usize,
    low: u64,
    emitted_two: bool,
}

impl PrimeIter {
    pub fn new() -> Self {
        let segment_words = SEGMENT_SIZE_BITS.div_ceil(64);
        Self {
            base: Vec::new(),
            base_limit: 0,
            segment: vec![0_u64; segment_words],
            buffer: Vec::new(),
            pos: 0,
            low: 3,
            emitted_two: false,
        }
    }

    /// Sieves the next block of SEGMENT_SIZE_BITS odd numbers into `buffer`.
    fn sieve_next_segment(&mut self) {
        #[inline]
        fn clear_bit(bits: &mut [u64], idx: usize) {
            let word_idx = idx / 64;
            let bit_idx = idx % 64;
            bits[word_idx] &= !(1_u64 << bit_idx);
        }

        let low = self.low;
        let high = low + SEGMENT_SIZE_NUMBERS - 2; // last odd number in this segment

        let sqrt_high = high.isqrt();
        if self.base_limit < sqrt_high {
            let limit = sqrt_high.max(self.base_limit * 2);
            self.base = sieve_odd(limit).into_iter().skip(1).collect();
            self.base_limit = limit;
        }

        // Reinitialize entire segment (all bits to 1 = prime)
        self.segment.fill(!0_u64);

        for &p in &self.base {
            if p * p > high {
                break;
            }

            // First odd multiple of p in [low, high], never p itself
            let mut start = (low.div_ceil(p) * p).max(p * p);
            if start % 2 == 0 {
                start += p;
            }

            while start <= high {
                let idx = ((start - low) / 2) as usize;
                clear_bit(&mut self.segment, idx);
                start += p * 2; // Skip to next odd multiple
            }
        }

        self.buffer.clear();
        self.pos = 0;
        for (word_idx, &bits) in self.segment.iter().enumerate() {
            let mut word = bits;

            while word != 0 {
                let bit_idx = word.trailing_zeros() as usize;
                let idx = word_idx * 64 + bit_idx;
                if idx < SEGMENT_SIZE_BITS {
                    self.buffer.push(low + idx as u64 * 2);
                }

                word &= word - 1; // Clear lowest set bit
            }
        }

        self.low = high + 2; // Next odd number
    }
}

impl Default for PrimeIter {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for PrimeIter {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if !self.emitted_two {
            self.emitted_two = true;
            return Some(2);
        }

        while self.pos >= self.buffer.len() {
            self.sieve_next_segment();
        }

        let prime = self.buffer[self.pos];
        self.pos += 1;
        Some(prime)
    }
}

/// The first `len()` primes, read-only once generated. Index 1 is 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimeSequence {
    primes: Vec<u64>,
}

impl PrimeSequence {
    pub fn generate(count: usize) -> Self {
        Self {
            primes: PrimeIter::new().take(count).collect(),
        }
    }

    /// Primes needed to scan `interval`: one past its end for the final divisor.
    pub fn for_interval(interval: Interval) -> Self {
        Self::generate(interval.end as usize + 1)
    }

    /// Whether this sequence is long enough to scan `interval`.
    pub fn covers(&self, interval: Interval) -> bool {
        self.primes.len() > interval.end as usize
    }

    /// 1-indexed access: `nth(1) == 2`.
    pub fn nth(&self, index: u32) -> u64 {
        self.primes[index as usize - 1]
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.primes
    }

    pub fn len(&self) -> usize {
        self.primes.len()
    }
}
