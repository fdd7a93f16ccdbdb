//! The append-only log backing a `SessionStore`: one JSON-lines file per
//! execution on disk, or an in-memory map in tests (§4.7, §4.11).

use crate::error::Result;
use crate::types::{Checkpoint, ExecutionRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEntry {
    Execution(ExecutionRecord),
    Checkpoint(Checkpoint),
}

/// Append-only per-execution event log. `append` is expected to be durable
/// (fsync on commit boundary); `read` replays every entry in order.
pub trait ExecutionLog: Send + Sync {
    fn append(&self, execution_id: &str, entry: &LogEntry) -> Result<()>;
    fn read(&self, execution_id: &str) -> Result<Vec<LogEntry>>;
    fn list_execution_ids(&self) -> Result<Vec<String>>;
}

pub struct FileLog {
    dir: PathBuf,
}

impl FileLog {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, execution_id: &str) -> PathBuf {
        self.dir.join(format!("{execution_id}.jsonl"))
    }
}

impl ExecutionLog for FileLog {
    fn append(&self, execution_id: &str, entry: &LogEntry) -> Result<()> {
        let line = serde_json::to_string(entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(execution_id))?;
        writeln!(file, "{line}")?;
        file.sync_data()?;
        Ok(())
    }

    fn read(&self, execution_id: &str) -> Result<Vec<LogEntry>> {
        let path = self.path_for(execution_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path)?;
        let mut entries = Vec::with_capacity(content.lines().count());
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(line)?);
        }
        Ok(entries)
    }

    fn list_execution_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(name) = entry.path().file_stem().and_then(|s| s.to_str()) {
                ids.push(name.to_string());
            }
        }
        Ok(ids)
    }
}

/// In-memory stand-in used by tests (`ManualClock`-style determinism, no
/// filesystem dependency).
pub struct MemoryLog {
    entries: Mutex<HashMap<String, Vec<LogEntry>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionLog for MemoryLog {
    fn append(&self, execution_id: &str, entry: &LogEntry) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .entry(execution_id.to_string())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    fn read(&self, execution_id: &str) -> Result<Vec<LogEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(execution_id)
            .cloned()
            .unwrap_or_default())
    }

    fn list_execution_ids(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().unwrap().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecutionRecord;

    #[test]
    fn memory_log_replays_entries_in_append_order() {
        let log = MemoryLog::new();
        let record = ExecutionRecord::new("e1".into(), "p1".into());
        log.append("e1", &LogEntry::Execution(record.clone())).unwrap();
        let entries = log.read("e1").unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn unknown_execution_reads_empty() {
        let log = MemoryLog::new();
        assert!(log.read("nope").unwrap().is_empty());
    }
}
