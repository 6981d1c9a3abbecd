//! Append-only diagnostic trail of session traffic.
//!
//! Every frame sent or received is recorded here before it is transmitted
//! or dispatched, alongside socket lifecycle transitions. Entries are never
//! mutated after insertion except to coalesce immediate repeats.

use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// One diagnostic record. `count` is bumped instead of appending when the
/// same kind and body arrive back to back (realtime audio chunks would
/// otherwise flood the trail).
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub kind: String,
    pub count: u32,
    pub body: String,
}

/// Process-local traffic log, unbounded unless a cap is supplied.
#[derive(Debug, Default)]
pub struct TrafficLog {
    entries: Mutex<Vec<LogEntry>>,
    cap: Option<usize>,
}

impl TrafficLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that keeps at most `cap` entries, discarding the oldest.
    pub fn with_cap(cap: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            cap: Some(cap),
        }
    }

    pub fn push(&self, kind: impl Into<String>, body: impl Into<String>) {
        let kind = kind.into();
        let body = body.into();
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if let Some(last) = entries.last_mut() {
            if last.kind == kind && last.body == body {
                last.count += 1;
                return;
            }
        }
        entries.push(LogEntry {
            at: Utc::now(),
            kind,
            count: 1,
            body,
        });
        if let Some(cap) = self.cap {
            let len = entries.len();
            if len > cap {
                entries.drain(..len - cap);
            }
        }
    }

    /// Snapshot of the current trail, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
