//! Append-only JSONL log of solver runs.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::types::RunRecord;

/// One line of the run log. Captured stream bodies are summarized by size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub instance: String,
    pub repetition: u32,
    pub arg: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub started_at: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_bytes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_bytes: Option<usize>,
}

impl From<&RunRecord> for RunLogEntry {
    fn from(record: &RunRecord) -> Self {
        let captured = record.captured.as_ref();
        Self {
            instance: record.instance.clone(),
            repetition: record.repetition,
            arg: record.arg.display().to_string(),
            exit_code: record.exit_code,
            timed_out: record.timed_out,
            started_at: record.started_at.clone(),
            duration_ms: record.duration_ms,
            stdout_bytes: captured.map(|c| c.stdout.len() + c.stdout_truncated),
            stderr_bytes: captured.map(|c| c.stderr.len() + c.stderr_truncated),
        }
    }
}

pub struct RunLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl RunLog {
    /// Open `path` for appending, creating it and its parent directory if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create run log dir {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open run log {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// Write one record and flush so the log is current after every run.
    pub fn append(&mut self, record: &RunRecord) -> Result<()> {
        let line = serde_json::to_string(&RunLogEntry::from(record)).context("serialize run")?;
        writeln!(self.writer, "{line}")
            .and_then(|()| self.writer.flush())
            .with_context(|| format!("write run log {}", self.path.display()))
    }
}

/// Read every entry back from a run log.
pub fn read_run_log(path: &Path) -> Result<Vec<RunLogEntry>> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("parse {} line {}", path.display(), idx + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CapturedOutput;

    fn record(repetition: u32, captured: Option<CapturedOutput>) -> RunRecord {
        RunRecord {
            instance: "eil51.tsp".to_string(),
            repetition,
            arg: PathBuf::from("instances/eil51.tsp"),
            exit_code: Some(0),
            timed_out: false,
            started_at: "2024-01-01T00:00:00+00:00".to_string(),
            duration_ms: 12,
            captured,
        }
    }

    #[test]
    fn appends_one_line_per_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("logs/runs.jsonl");
        let mut log = RunLog::open(&path).expect("open");
        log.append(&record(0, None)).expect("append");
        log.append(&record(1, None)).expect("append");

        let entries = read_run_log(&path).expect("read");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].repetition, 1);
        assert_eq!(entries[0].arg, "instances/eil51.tsp");
        assert_eq!(entries[0].stdout_bytes, None);
    }

    #[test]
    fn reopening_appends_instead_of_truncating() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("runs.jsonl");
        RunLog::open(&path)
            .expect("open")
            .append(&record(0, None))
            .expect("append");
        RunLog::open(&path)
            .expect("reopen")
            .append(&record(1, None))
            .expect("append");
        assert_eq!(read_run_log(&path).expect("read").len(), 2);
    }

    #[test]
    fn captured_streams_are_logged_by_size() {
        let captured = CapturedOutput {
            stdout: b"cost 42\n".to_vec(),
            stderr: Vec::new(),
            stdout_truncated: 10,
            stderr_truncated: 0,
        };
        let entry = RunLogEntry::from(&record(0, Some(captured)));
        assert_eq!(entry.stdout_bytes, Some(18));
        assert_eq!(entry.stderr_bytes, Some(0));
        let line = serde_json::to_string(&entry).expect("json");
        assert!(!line.contains("cost 42"));
    }
}
