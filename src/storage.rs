use chrono::Local;
use log::warn;
use std::env;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::partition::Interval;

pub const HITS_FILE: &str = "primorial_hits.txt";
pub const EXECUTION_LOG: &str = "execution_log.txt";

/// `$XDG_DATA_HOME/primorial-scan`, or `$HOME/.local/share/primorial-scan`.
pub fn data_dir() -> io::Result<PathBuf> {
    let xdg_data_home = env::var("XDG_DATA_HOME")
        .ok()
        .and_then(|path| {
            if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            }
        })
        .or_else(|| {
            env::var("HOME")
                .ok()
                .map(|home| PathBuf::from(home).join(".local/share"))
        })
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "neither XDG_DATA_HOME nor HOME is set",
            )
        })?;

    Ok(xdg_data_home.join("primorial-scan"))
}

/// Appends one line per hit to the hits file in `dir`, with a header naming
/// the interval they came from.
pub fn save_hits(dir: &Path, interval: Interval, hits: &[u32]) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(HITS_FILE);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# {} {}", Local::now().format("%Y-%m-%d %H:%M:%S"), interval)?;
    let mut itoa_buf = itoa::Buffer::new();
    for &hit in hits {
        writer.write_all(itoa_buf.format(hit).as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    Ok(path)
}

pub fn log_execution(
    dir: &Path,
    mode: &str,
    interval: Interval,
    threads: usize,
    duration_us: u128,
) -> io::Result<()> {
    fs::create_dir_all(dir)?;

    let log_path = dir.join(EXECUTION_LOG);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");

    writeln!(
        file,
        "{} | {} | {} | {} threads | {}us",
        timestamp, mode, interval, threads, duration_us
    )?;

    Ok(())
}

/// What one invocation did, for the execution log and the hits file.
#[derive(Debug, Clone, Copy)]
pub struct RunRecord<'a> {
    pub mode: &'a str,
    pub interval: Interval,
    pub threads: usize,
    pub duration_us: u128,
    pub hits: &'a [u32],
}

/// Writes the hits file when `save` is set, then the execution log line.
///
/// The execution log is best-effort: a missing data directory or a failed
/// write only warns. A requested hits file is not, and either failure is
/// returned. Returns the hits file path when one was written.
pub fn record_run(
    dir: io::Result<PathBuf>,
    run: &RunRecord<'_>,
    save: bool,
) -> io::Result<Option<PathBuf>> {
    let dir = match dir {
        Ok(dir) => dir,
        Err(e) if save => return Err(e),
        Err(e) => {
            warn!("Could not determine data directory: {}", e);
            return Ok(None);
        }
    };

    let saved = if save {
        Some(save_hits(&dir, run.interval, run.hits)?)
    } else {
        None
    };

    if let Err(e) = log_execution(&dir, run.mode, run.interval, run.threads, run.duration_us) {
        warn!("Failed to log execution: {}", e);
    }

    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("primorial-scan-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_save_hits_appends() {
        let dir = scratch_dir("hits");
        let interval = Interval::new(1, 30).unwrap();

        save_hits(&dir, interval, &[1, 17]).unwrap();
        let path = save_hits(&dir, interval, &[19]).unwrap();

        let content = fs::read_to_string(path).unwrap();
        let numbers: Vec<&str> = content.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(numbers, vec!["1", "17", "19"]);
        assert_eq!(content.lines().filter(|l| l.starts_with('#')).count(), 2);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_log_execution_line_format() {
        let dir = scratch_dir("log");
        let interval = Interval::new(5, 10).unwrap();

        log_execution(&dir, "tune", interval, 4, 1234).unwrap();

        let content = fs::read_to_string(dir.join(EXECUTION_LOG)).unwrap();
        let line = content.lines().next().unwrap();
        assert!(line.ends_with("| tune | [5, 10] | 4 threads | 1234us"), "{}", line);

        fs::remove_dir_all(&dir).unwrap();
    }

    fn record(interval: Interval, hits: &[u32]) -> RunRecord<'_> {
        RunRecord {
            mode: "run",
            interval,
            threads: 2,
            duration_us: 99,
            hits,
        }
    }

    fn no_dir() -> io::Result<PathBuf> {
        Err(io::Error::new(io::ErrorKind::NotFound, "no data dir"))
    }

    #[test]
    fn test_record_run_fails_without_dir_when_saving() {
        let interval = Interval::new(1, 5).unwrap();
        let err = record_run(no_dir(), &record(interval, &[1]), true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_record_run_skips_log_without_dir() {
        let interval = Interval::new(1, 5).unwrap();
        assert!(record_run(no_dir(), &record(interval, &[1]), false).unwrap().is_none());
    }

    #[test]
    fn test_record_run_writes_hits_and_log() {
        let dir = scratch_dir("record");
        let interval = Interval::new(1, 5).unwrap();

        let path = record_run(Ok(dir.clone()), &record(interval, &[1]), true)
            .unwrap()
            .unwrap();
        assert_eq!(path, dir.join(HITS_FILE));
        assert!(fs::read_to_string(&path).unwrap().lines().any(|l| l == "1"));

        let log = fs::read_to_string(dir.join(EXECUTION_LOG)).unwrap();
        assert!(log.trim_end().ends_with("| run | [1, 5] | 2 threads | 99us"), "{}", log);

        fs::remove_dir_all(&dir).unwrap();
    }
}
