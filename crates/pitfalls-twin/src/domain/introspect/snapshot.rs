//! Thread Snapshots - Point-in-Time Worker Dumps

use std::fmt;

use serde::Serialize;

use crate::domain::worker::{WorkerId, WorkerState};

/// Default number of rows in a rendered dump
pub const DEFAULT_DUMP_LIMIT: usize = 10;

/// Immutable capture of one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadSnapshot {
    /// Worker identifier
    pub id: WorkerId,
    /// Display name
    pub name: String,
    /// Scenario role
    pub role: String,
    /// Lifecycle state at capture time
    pub state: WorkerState,
    /// Name of the lock the worker waits on
    pub blocked_on: Option<String>,
    /// Current holders of that lock
    pub lock_owners: Vec<WorkerId>,
}

impl fmt::Display for ThreadSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" {} [{}] {}", self.name, self.id, self.role, self.state)?;
        if let Some(lock) = &self.blocked_on {
            write!(f, " on {}", lock)?;
            if !self.lock_owners.is_empty() {
                let owners: Vec<String> = self.lock_owners.iter().map(|w| w.to_string()).collect();
                write!(f, " owned by {}", owners.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Render the first `limit` snapshots, one per line
pub fn render_dump(snapshots: &[ThreadSnapshot], limit: usize) -> String {
    let mut out = String::new();
    for snap in snapshots.iter().take(limit) {
        out.push_str(&snap.to_string());
        out.push('\n');
    }
    if snapshots.len() > limit {
        out.push_str(&format!("... {} more\n", snapshots.len() - limit));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(id: usize, state: WorkerState, blocked_on: Option<&str>) -> ThreadSnapshot {
        ThreadSnapshot {
            id: WorkerId::new(id),
            name: format!("method{}", id + 1),
            role: "locker".into(),
            state,
            blocked_on: blocked_on.map(str::to_string),
            lock_owners: blocked_on.map(|_| vec![WorkerId::new(1 - id)]).unwrap_or_default(),
        }
    }

    #[test]
    fn test_snapshot_display() {
        let s = snap(0, WorkerState::Blocked, Some("lock-2"));
        assert_eq!(s.to_string(), "\"method1\" w0 [locker] BLOCKED on lock-2 owned by w1");

        let s = snap(1, WorkerState::Running, None);
        assert_eq!(s.to_string(), "\"method2\" w1 [locker] RUNNING");
    }

    #[test]
    fn test_render_dump_truncates() {
        let snaps = vec![
            snap(0, WorkerState::Running, None),
            snap(1, WorkerState::Running, None),
        ];
        let out = render_dump(&snaps, 1);
        assert_eq!(out.lines().count(), 2);
        assert!(out.contains("1 more"));
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let value = serde_json::to_value(snap(0, WorkerState::Blocked, Some("lock-2"))).unwrap();
        assert_eq!(value["id"], 0);
        assert_eq!(value["name"], "method1");
        assert_eq!(value["state"], "Blocked");
        assert_eq!(value["blocked_on"], "lock-2");
        assert_eq!(value["lock_owners"], serde_json::json!([1]));
    }
}
