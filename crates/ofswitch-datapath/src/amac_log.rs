//! Append-only AMAC log files.
//!
//! `amac_<dpid>.log` receives a timestamped dump of the table after every
//! change and `amaru_packets.log` a running count of announcements sent.
//! A file that has grown past its threshold is renamed with a timestamp
//! suffix before the next append.

use crate::amac::AmacTable;
use crate::config::AmacLogConfig;
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub struct AmacLog {
    table_path: PathBuf,
    counter_path: PathBuf,
    table_rotate_bytes: u64,
    counter_rotate_bytes: u64,
    packets_sent: u64,
}

impl AmacLog {
    pub fn new(config: &AmacLogConfig, dp_id: u64) -> Self {
        AmacLog {
            table_path: config.dir.join(format!("amac_{}.log", dp_id)),
            counter_path: config.dir.join("amaru_packets.log"),
            table_rotate_bytes: config.table_rotate_bytes,
            counter_rotate_bytes: config.counter_rotate_bytes,
            packets_sent: 0,
        }
    }

    pub fn table_path(&self) -> &Path {
        &self.table_path
    }

    pub fn counter_path(&self) -> &Path {
        &self.counter_path
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn record_table(&mut self, table: &AmacTable) -> io::Result<()> {
        rotate_if_larger(&self.table_path, self.table_rotate_bytes)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.table_path)?;
        writeln!(file, "# {} entries={}", timestamp(), table.len())?;
        file.write_all(table.dump().as_bytes())
    }

    /// Adds `sent` to the counter and appends the new total.
    pub fn record_sent(&mut self, sent: u64) -> io::Result<()> {
        self.packets_sent += sent;
        rotate_if_larger(&self.counter_path, self.counter_rotate_bytes)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.counter_path)?;
        writeln!(file, "{} {}", timestamp(), self.packets_sent)
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn rotate_if_larger(path: &Path, limit: u64) -> io::Result<()> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if size <= limit {
        return Ok(());
    }
    let mut rotated = path.as_os_str().to_owned();
    rotated.push(format!(".{}", Utc::now().format("%Y%m%d%H%M%S%.6f")));
    debug!(path = %path.display(), size, "rotating AMAC log");
    fs::rename(path, rotated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AmacLimits;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn config(dir: &TempDir, table_rotate_bytes: u64) -> AmacLogConfig {
        AmacLogConfig {
            dir: dir.path().to_path_buf(),
            table_rotate_bytes,
            counter_rotate_bytes: 500_000,
        }
    }

    fn files(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_table_dump_is_appended() {
        let dir = TempDir::new().unwrap();
        let mut log = AmacLog::new(&config(&dir, 1600), 42);
        let mut table = AmacTable::new(AmacLimits::default());
        table.add(1, [3; 28], 1, Instant::now(), Duration::from_secs(60));

        log.record_table(&table).unwrap();
        log.record_table(&table).unwrap();

        let text = fs::read_to_string(log.table_path()).unwrap();
        assert_eq!(text.matches("entries=1").count(), 2);
        assert_eq!(text.matches("level=1 amac=3 port=1").count(), 2);
        assert!(log.table_path().ends_with("amac_42.log"));
    }

    #[test]
    fn test_oversized_file_is_rotated() {
        let dir = TempDir::new().unwrap();
        let mut log = AmacLog::new(&config(&dir, 10), 1);
        let table = AmacTable::new(AmacLimits::default());

        log.record_table(&table).unwrap();
        log.record_table(&table).unwrap();

        let names = files(&dir);
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], "amac_1.log");
        assert!(names[1].starts_with("amac_1.log."));
        let current = fs::read_to_string(log.table_path()).unwrap();
        assert_eq!(current.lines().count(), 1);
    }

    #[test]
    fn test_counter_accumulates() {
        let dir = TempDir::new().unwrap();
        let mut log = AmacLog::new(&config(&dir, 1600), 1);
        log.record_sent(3).unwrap();
        log.record_sent(2).unwrap();
        assert_eq!(log.packets_sent(), 5);

        let text = fs::read_to_string(log.counter_path()).unwrap();
        let totals: Vec<&str> = text
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1))
            .collect();
        assert_eq!(totals, vec!["3", "5"]);
    }
}
