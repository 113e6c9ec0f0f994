use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Local;
use serde::Serialize;

/// Sink for the engine's activity trail. Append-only, ordered by call
/// time. Recording is advisory: an implementation must not fail the
/// operation that triggered it, so the seam is infallible and sinks deal
/// with their own trouble internally.
pub trait ActivityRecorder {
    fn record(&self, identity: &str, action: &str, detail: &str);
}

impl<R: ActivityRecorder> ActivityRecorder for Arc<R> {
    fn record(&self, identity: &str, action: &str, detail: &str) {
        (**self).record(identity, action, detail)
    }
}

#[derive(Serialize)]
struct Entry<'a> {
    ts: String,
    user: &'a str,
    action: &'a str,
    detail: &'a str,
}

/// Appends one JSON object per line to a log file. Write failures are
/// logged at warn level and dropped.
pub struct FileRecorder {
    path: PathBuf,
}

impl FileRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ActivityRecorder for FileRecorder {
    fn record(&self, identity: &str, action: &str, detail: &str) {
        let entry = Entry {
            ts: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            user: identity,
            action,
            detail,
        };
        let Ok(line) = serde_json::to_string(&entry) else {
            return;
        };
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(e) = written {
            tracing::warn!(error = %e, path = %self.path.display(), "activity record dropped");
        }
    }
}

/// Keeps records in memory; used by tests to assert on the trail.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    entries: Mutex<Vec<(String, String, String)>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all `(user, action, detail)` records so far.
    pub fn entries(&self) -> Vec<(String, String, String)> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// The actions recorded so far, in order.
    pub fn actions(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .map(|(_, action, _)| action)
            .collect()
    }
}

impl ActivityRecorder for MemoryRecorder {
    fn record(&self, identity: &str, action: &str, detail: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((identity.to_string(), action.to_string(), detail.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_recorder_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.log");
        let recorder = FileRecorder::new(&path);

        recorder.record("alice", "login", "login successful");
        recorder.record("alice", "create_table", "users");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["user"], "alice");
        assert_eq!(first["action"], "login");
        assert_eq!(first["detail"], "login successful");
        assert!(first["ts"].is_string());
    }

    #[test]
    fn test_file_recorder_failure_is_silent() {
        // the parent directory does not exist; the record is dropped
        let recorder = FileRecorder::new("/nonexistent-dir/activity.log");
        recorder.record("alice", "login", "login successful");
    }

    #[test]
    fn test_memory_recorder_orders_entries() {
        let recorder = MemoryRecorder::new();
        recorder.record("a", "first", "1");
        recorder.record("b", "second", "2");

        assert_eq!(recorder.actions(), vec!["first", "second"]);
        assert_eq!(
            recorder.entries()[1],
            ("b".to_string(), "second".to_string(), "2".to_string())
        );
    }
}
