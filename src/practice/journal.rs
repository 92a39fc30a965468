// src/practice/journal.rs
//
// Append-only practice log.
//
// The engine appends one entry per notable transition. How entries are
// stored is up to the sink.

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogKind {
    Start,
    Pass,
    Fail,
    LevelUp,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub kind: LogKind,
    pub bpm: f64,
    pub note: String,
}

impl LogEntry {
    pub fn new(kind: LogKind, bpm: f64, note: impl Into<String>) -> Self {
        Self {
            kind,
            bpm,
            note: note.into(),
        }
    }
}

/// Destination for practice log entries.
pub trait SessionLog {
    fn log_event(&mut self, entry: LogEntry);
}

impl SessionLog for Vec<LogEntry> {
    fn log_event(&mut self, entry: LogEntry) {
        self.push(entry);
    }
}

/// In-memory log, the default sink.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    entries: Vec<LogEntry>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Hand the collected entries to the caller, leaving the log empty.
    pub fn take(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.entries)
    }

    pub fn count(&self, kind: LogKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    /// Serialize entries as JSON lines.
    pub fn to_json_lines(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }
}

impl SessionLog for MemoryLog {
    fn log_event(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }
}
