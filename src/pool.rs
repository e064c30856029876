use std::ops::{Index, IndexMut};

use rug::{Assign, Integer};

/// Arena of reusable big integers with a logical length separate from the
/// number of physically allocated slots.
///
/// Allocating a fresh `Integer` for every prime on every tuning iteration
/// dominates runtime, so `truncate` only rewinds the cursor and the next
/// round of `push_u64` calls overwrites the old limbs in place.
///
/// Indexing past the logical length is caught by a `debug_assert!`; release
/// builds only keep the physical bounds check of the backing `Vec`.
#[derive(Debug, Default)]
pub struct BigIntPool {
    slots: Vec<Integer>,
    len: usize,
}

impl BigIntPool {
    /// Makes sure at least `count` physical slots exist. The logical length
    /// is left untouched.
    pub fn reserve(&mut self, count: usize) {
        if self.slots.len() < count {
            self.slots.resize_with(count, Integer::new);
        }
    }

    /// Drops all storage.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.len = 0;
    }

    /// Rewinds the logical length to zero, keeping every allocation.
    pub fn truncate(&mut self) {
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Physically allocated slots, including those past the logical length.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn push_u64(&mut self, value: u64) {
        if self.len < self.slots.len() {
            self.slots[self.len].assign(value);
        } else {
            self.slots.push(Integer::from(value));
        }
        self.len += 1;
    }

    /// `self[dst] *= self[src]` for two distinct logical positions.
    pub fn mul_assign_slot(&mut self, dst: usize, src: usize) {
        debug_assert!(dst < self.len && src < self.len && dst != src);
        if dst < src {
            let (left, right) = self.slots.split_at_mut(src);
            left[dst] *= &right[0];
        } else {
            let (left, right) = self.slots.split_at_mut(dst);
            right[0] *= &left[src];
        }
    }

    /// Multiplies slots `lo..lo + count` together into slot `lo`.
    ///
    /// Each round pairs the i-th active slot with its mirror from the end of
    /// the active run and halves the run (rounding up), so the product takes
    /// O(log count) rounds of balanced-size multiplications. Slots after `lo`
    /// hold partial products afterwards. An empty range leaves everything
    /// untouched.
    pub fn reduce_product(&mut self, lo: usize, count: usize) {
        debug_assert!(lo + count <= self.len);
        let mut active = count;
        while active > 1 {
            for i in 0..active / 2 {
                self.mul_assign_slot(lo + i, lo + active - i - 1);
            }
            active = active.div_ceil(2);
        }
    }

    /// Moves the value at `index` out, leaving a zero that has not allocated.
    pub fn take(&mut self, index: usize) -> Integer {
        debug_assert!(index < self.len);
        std::mem::take(&mut self.slots[index])
    }

    /// Puts a value (usually one handed back by a worker) into `index`,
    /// keeping its allocation alive for the next round.
    pub fn restore(&mut self, index: usize, value: Integer) {
        debug_assert!(index < self.len);
        self.slots[index] = value;
    }
}

impl Index<usize> for BigIntPool {
    type Output = Integer;

    fn index(&self, index: usize) -> &Integer {
        debug_assert!(index < self.len, "pool index {} out of logical length {}", index, self.len);
        &self.slots[index]
    }
}

impl IndexMut<usize> for BigIntPool {
    fn index_mut(&mut self, index: usize) -> &mut Integer {
        debug_assert!(index < self.len, "pool index {} out of logical length {}", index, self.len);
        &mut self.slots[index]
    }
}
