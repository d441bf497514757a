use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Destination for the live log stream. Implementations may forward to a
/// message queue, a database, or just memory; appends are best-effort.
pub trait LogSink: Send + Sync {
    fn append(&self, entry: &LogEntry) -> anyhow::Result<()>;
}

/// In-memory sink, used by the CLI and in tests.
#[derive(Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl LogSink for MemoryLog {
    fn append(&self, entry: &LogEntry) -> anyhow::Result<()> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.clone());
        }
        Ok(())
    }
}

/// Per-request state: identity, terminal status, tiers consulted and the
/// append-only log stream. Each hunt owns a unique session id and writes
/// only to its own log, so no cross-hunt locking is needed.
pub struct HuntSession {
    pub id: String,
    pub user_id: String,
    status: Mutex<SessionStatus>,
    tiers_used: Mutex<Vec<String>>,
    sink: Arc<dyn LogSink>,
}

impl HuntSession {
    pub fn new(id: &str, user_id: &str, sink: Arc<dyn LogSink>) -> Self {
        Self {
            id: id.to_string(),
            user_id: user_id.to_string(),
            status: Mutex::new(SessionStatus::Running),
            tiers_used: Mutex::new(Vec::new()),
            sink,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
            .lock()
            .map(|s| *s)
            .unwrap_or(SessionStatus::Running)
    }

    pub fn finish(&self, status: SessionStatus) {
        if let Ok(mut s) = self.status.lock() {
            *s = status;
        }
    }

    pub fn record_tier(&self, tier: &str) {
        if let Ok(mut tiers) = self.tiers_used.lock() {
            if !tiers.iter().any(|t| t == tier) {
                tiers.push(tier.to_string());
            }
        }
    }

    pub fn tiers_used(&self) -> Vec<String> {
        self.tiers_used
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        };
        // A sink failure must never fail the hunt.
        if let Err(e) = self.sink.append(&entry) {
            tracing::warn!(session = %self.id, "log append failed: {e}");
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_collects_ordered_log_entries() {
        let sink = Arc::new(MemoryLog::new());
        let session = HuntSession::new("s1", "u1", sink.clone());
        session.info("first");
        session.warn("second");

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[1].level, LogLevel::Warning);
    }

    #[test]
    fn tiers_are_recorded_once() {
        let session = HuntSession::new("s1", "u1", Arc::new(MemoryLog::new()));
        session.record_tier("tier1_api");
        session.record_tier("tier1_api");
        session.record_tier("tier2_websearch");
        assert_eq!(session.tiers_used(), vec!["tier1_api", "tier2_websearch"]);
    }

    #[test]
    fn session_status_transitions() {
        let session = HuntSession::new("s1", "u1", Arc::new(MemoryLog::new()));
        assert_eq!(session.status(), SessionStatus::Running);
        session.finish(SessionStatus::Completed);
        assert_eq!(session.status(), SessionStatus::Completed);
    }

    struct FailingSink;
    impl LogSink for FailingSink {
        fn append(&self, _entry: &LogEntry) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("sink down"))
        }
    }

    #[test]
    fn sink_failure_is_swallowed() {
        let session = HuntSession::new("s1", "u1", Arc::new(FailingSink));
        session.info("dropped on the floor");
        session.finish(SessionStatus::Completed);
        assert_eq!(session.status(), SessionStatus::Completed);
    }
}
