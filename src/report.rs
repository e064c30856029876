use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::warn;

use crate::error::{Result, ScanError};

/// Consumer thread for hit indices coming from every worker of a scan.
///
/// Each hit is printed on its own stdout line as soon as it arrives, so the
/// console order across batches is whatever order the workers found them in.
pub struct HitReporter {
    handle: JoinHandle<Vec<u32>>,
}

impl HitReporter {
    /// Starts the reporter and returns the sender workers clone from.
    pub fn spawn(echo: bool) -> (Sender<u32>, Self) {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || collect_hits(rx, echo));
        (tx, Self { handle })
    }

    /// Waits for every sender to be dropped and returns all hits, sorted.
    pub fn finish(self) -> Result<Vec<u32>> {
        let mut hits = self.handle.join().map_err(|_| ScanError::ReporterPanicked)?;
        hits.sort_unstable();
        Ok(hits)
    }
}

fn collect_hits(rx: Receiver<u32>, echo: bool) -> Vec<u32> {
    let mut hits = Vec::new();
    let mut itoa_buf = itoa::Buffer::new();
    let stdout = io::stdout();

    for index in rx {
        if echo {
            if let Err(e) = write_hit(&mut stdout.lock(), itoa_buf.format(index)) {
                warn!("Could not print hit {}: {}", index, e);
            }
        }
        hits.push(index);
    }

    hits
}

fn write_hit(out: &mut impl Write, line: &str) -> io::Result<()> {
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_from_many_senders_sorted() {
        let (tx, reporter) = HitReporter::spawn(false);

        let handles: Vec<_> = [vec![30u32, 31], vec![1, 17], vec![19]]
            .into_iter()
            .map(|batch| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for hit in batch {
                        tx.send(hit).unwrap();
                    }
                })
            })
            .collect();
        drop(tx);
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(reporter.finish().unwrap(), vec![1, 17, 19, 30, 31]);
    }

    #[test]
    fn test_no_hits() {
        let (tx, reporter) = HitReporter::spawn(false);
        drop(tx);
        assert!(reporter.finish().unwrap().is_empty());
    }
}
