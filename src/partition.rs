use std::fmt;
use std::time::Duration;

use clap::ValueEnum;

use crate::error::{Result, ScanError};

/// Inclusive, 1-indexed range of prime indices to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: u32,
    pub end: u32,
}

impl Interval {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start == 0 || end < start {
            return Err(ScanError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    /// Number of indices covered (N).
    pub fn width(&self) -> u32 {
        self.end - self.start + 1
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Contiguous slice of an interval owned by one worker for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub start: u32,
    pub end: u32,
}

impl Batch {
    pub fn width(&self) -> u32 {
        self.end - self.start + 1
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// How the first partition of a tuning run is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PartitionStrategy {
    /// floor(N/n) per batch, remainder goes to the last batch
    Equal,
    /// Wide batches first, narrowing towards the expensive end of the interval
    #[default]
    Geometric,
}

/// Number of batches actually used for `requested` workers: never more than
/// the interval width, so no batch is ever empty.
pub fn batch_count(interval: Interval, requested: usize) -> usize {
    requested.min(interval.width() as usize).max(1)
}

/// Initial guess at a balanced split of `interval` into `n` batches.
pub fn initial_partition(
    interval: Interval,
    n: usize,
    strategy: PartitionStrategy,
) -> Result<Vec<Batch>> {
    if n == 0 {
        return Err(ScanError::EmptyPartition);
    }
    let n = batch_count(interval, n);
    let total = interval.width();

    let mut widths = match strategy {
        PartitionStrategy::Equal => equal_widths(total, n),
        PartitionStrategy::Geometric => geometric_widths(total, n),
    };
    enforce_min_width(&mut widths);

    Ok(widths_to_batches(interval.start, &widths))
}

fn equal_widths(total: u32, n: usize) -> Vec<u32> {
    let width = total / n as u32;
    let mut widths = vec![width; n];
    widths[n - 1] += total % n as u32;
    widths
}

/// Boundaries follow a_{k+1} = (a_k + sqrt(a_k^2 + 4)) / 2 with a_0 = 0,
/// scaled so that a_n lands on the end of the interval. Later indices carry
/// larger running products, so later batches are kept narrower relative to
/// their share of the index range.
fn geometric_widths(total: u32, n: usize) -> Vec<u32> {
    let mut marks = Vec::with_capacity(n + 1);
    let mut a = 0.0_f64;
    marks.push(a);
    for _ in 0..n {
        a = (a + (a * a + 4.0).sqrt()) / 2.0;
        marks.push(a);
    }

    let scale = total as f64 / marks[n];
    let mut boundaries: Vec<u32> = marks
        .iter()
        .map(|m| ((m * scale).floor() as u32).min(total))
        .collect();
    boundaries[n] = total;

    boundaries.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Proportional-control step: scale every width by `average / own` time,
/// then renormalise so the widths sum to exactly N again.
///
/// All boundaries but the last are rounded; the last batch takes the exact
/// remainder so no index is lost or duplicated.
pub fn rebalance(batches: &[Batch], timings: &[Duration]) -> Result<Vec<Batch>> {
    if batches.is_empty() {
        return Err(ScanError::EmptyPartition);
    }
    if batches.len() != timings.len() {
        return Err(ScanError::TimingMismatch {
            batches: batches.len(),
            timings: timings.len(),
        });
    }

    let span = Interval {
        start: batches[0].start,
        end: batches[batches.len() - 1].end,
    };
    validate_partition(span, batches)?;
    let start = span.start;
    let total = span.width();

    // A batch that finished in no measurable time still gets a finite weight
    let seconds: Vec<f64> = timings
        .iter()
        .map(|t| t.as_secs_f64().max(1e-9))
        .collect();
    let average = seconds.iter().sum::<f64>() / seconds.len() as f64;

    let scaled: Vec<f64> = batches
        .iter()
        .zip(&seconds)
        .map(|(b, &secs)| b.width() as f64 * average / secs)
        .collect();
    let scaled_total: f64 = scaled.iter().sum();

    let mut widths = Vec::with_capacity(batches.len());
    let mut running = 0.0_f64;
    let mut previous = 0_u32;
    for (i, w) in scaled.iter().enumerate() {
        let boundary = if i == scaled.len() - 1 {
            total
        } else {
            running += w;
            ((running * total as f64 / scaled_total).round() as u32).clamp(previous, total)
        };
        widths.push(boundary - previous);
        previous = boundary;
    }
    enforce_min_width(&mut widths);

    Ok(widths_to_batches(start, &widths))
}

/// Checks that `batches` are ordered, contiguous and cover `interval` exactly.
pub fn validate_partition(interval: Interval, batches: &[Batch]) -> Result<()> {
    if batches.is_empty() {
        return Err(ScanError::EmptyPartition);
    }

    let mismatch = |batch| ScanError::PartitionMismatch {
        start: interval.start,
        end: interval.end,
        batch,
    };

    let mut expected_start = interval.start;
    for (i, batch) in batches.iter().enumerate() {
        if batch.start != expected_start || batch.end < batch.start || batch.end > interval.end {
            return Err(mismatch(i));
        }
        expected_start = batch.end.saturating_add(1);
    }
    if batches[batches.len() - 1].end != interval.end {
        return Err(mismatch(batches.len() - 1));
    }

    Ok(())
}

/// Moves single indices from the widest batch into any empty one.
/// Only called with sum(widths) >= widths.len().
fn enforce_min_width(widths: &mut [u32]) {
    while let Some(empty) = widths.iter().position(|&w| w == 0) {
        let widest = widths
            .iter()
            .enumerate()
            .max_by_key(|&(_, w)| *w)
            .map(|(i, _)| i)
            .unwrap_or(0);
        if widths[widest] <= 1 {
            break;
        }
        widths[widest] -= 1;
        widths[empty] += 1;
    }
}

fn widths_to_batches(start: u32, widths: &[u32]) -> Vec<Batch> {
    let mut cursor = start;
    widths
        .iter()
        .map(|&w| {
            let batch = Batch {
                start: cursor,
                end: cursor + (w - 1),
            };
            cursor = batch.end.wrapping_add(1);
            batch
        })
        .collect()
}
