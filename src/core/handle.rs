//! # Child handles and launch results.
//!
//! [`ChildHandle`] is the supervisor's record of one launched process. Callers only ever
//! see cloned snapshots; the live copy belongs to the registry.

use std::path::PathBuf;
use std::time::SystemTime;

use crate::error::LaunchError;

/// Lifecycle state of a child.
///
/// `Running → {Exited, Failed}`. Terminal handles leave the registry at once, so
/// snapshots are always `Running`; the final state is announced by `ChildExited` or
/// `ChildCrashed` (see [`ChildStatus::after`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    /// Process exists and is being polled.
    Running,
    /// Process is gone.
    Exited,
    /// The OS reported an error for the process.
    Failed,
}

impl ChildStatus {
    /// Final status announced by a terminal child event, `None` for any other kind.
    pub fn after(kind: crate::events::EventKind) -> Option<Self> {
        use crate::events::EventKind;
        match kind {
            EventKind::ChildExited => Some(ChildStatus::Exited),
            EventKind::ChildCrashed => Some(ChildStatus::Failed),
            _ => None,
        }
    }
}

/// Snapshot of one supervised child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildHandle {
    /// Caller-supplied logical id, unique among active handles.
    pub id: String,
    /// OS process id returned at spawn time.
    pub pid: u32,
    /// Executable that was launched.
    pub executable: PathBuf,
    /// Spawn time.
    pub started_at: SystemTime,
    /// Current status.
    pub status: ChildStatus,
}

/// Successful launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    /// Logical id.
    pub id: String,
    /// OS process id.
    pub pid: u32,
    /// Spawn time.
    pub started_at: SystemTime,
}

/// Wire shape of a launch reply for the UI layer: `{ success, error? }`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LaunchReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<LaunchOutcome, LaunchError>> for LaunchReply {
    fn from(res: &Result<LaunchOutcome, LaunchError>) -> Self {
        match res {
            Ok(_) => Self {
                success: true,
                error: None,
            },
            Err(e) => Self {
                success: false,
                error: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_serializes_without_error_on_success() {
        let ok: Result<LaunchOutcome, LaunchError> = Ok(LaunchOutcome {
            id: "g1".into(),
            pid: 7,
            started_at: SystemTime::now(),
        });
        let json = serde_json::to_string(&LaunchReply::from(&ok)).expect("json");
        assert_eq!(json, r#"{"success":true}"#);

        let dup: Result<LaunchOutcome, LaunchError> =
            Err(LaunchError::AlreadyRunning { id: "g1".into() });
        let reply = LaunchReply::from(&dup);
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("child \"g1\" is already running"));
    }

    #[test]
    fn terminal_events_map_to_final_status() {
        use crate::events::EventKind;
        assert_eq!(ChildStatus::after(EventKind::ChildExited), Some(ChildStatus::Exited));
        assert_eq!(ChildStatus::after(EventKind::ChildCrashed), Some(ChildStatus::Failed));
        assert_eq!(ChildStatus::after(EventKind::ChildLaunched), None);
    }
}
