//! # Runtime events emitted by the supervisor and the crash telemetry service.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Child lifecycle**: launched, exited, crashed
//! - **Shutdown**: host shutdown requested, all children stopped
//! - **Crash telemetry**: captured, mirrored, mirror failed, cleared
//! - **Subscriber health**: overflow, panic
//!
//! The [`Event`] struct carries the metadata relevant to its kind (child id, pid,
//! exit code, crash id, ...).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Terminal child events are published while the registry lock is held, so for one child
//! `ChildLaunched` always precedes its `ChildExited`/`ChildCrashed`.
//!
//! ## Example
//! ```rust
//! use launchvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ChildExited)
//!     .with_child("g1")
//!     .with_exit_code(Some(0));
//!
//! assert_eq!(ev.kind, EventKind::ChildExited);
//! assert_eq!(ev.child.as_deref(), Some("g1"));
//! assert_eq!(ev.exit_code, Some(0));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::telemetry::CrashOrigin;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Child lifecycle ===
    /// Child process was spawned and registered.
    ///
    /// Sets:
    /// - `child`: logical id
    /// - `pid`: OS process id
    ChildLaunched,

    /// Child is gone: it exited on its own, or it was terminated.
    ///
    /// Terminal; emitted exactly once per registered child.
    ///
    /// Sets:
    /// - `child`: logical id
    /// - `pid`: OS process id
    /// - `exit_code`: exit code when the OS reported one (`None` if killed by a signal)
    /// - `reason`: `"terminated"` / `"host-shutdown"` when the supervisor stopped it
    ChildExited,

    /// Child could not be created, or the OS reported an error while polling it.
    ///
    /// Terminal for a registered child; also published for a rejected spawn.
    ///
    /// Sets:
    /// - `child`: logical id
    /// - `crash_kind`: [`CrashKind`]
    /// - `reason`: OS error message
    ChildCrashed,

    // === Shutdown ===
    /// Host shutdown started; every remaining child is being terminated.
    ShutdownRequested,

    /// Shutdown finished issuing kills for every remaining child.
    ///
    /// Sets:
    /// - `reason`: number of children that needed a forceful kill (if any)
    AllChildrenStopped,

    // === Crash telemetry ===
    /// A crash record was written durably to the local log.
    ///
    /// Sets:
    /// - `crash_id`: local record id
    /// - `origin`: [`CrashOrigin`]
    /// - `reason`: error message
    CrashCaptured,

    /// The remote mirror accepted a crash record.
    ///
    /// Sets:
    /// - `crash_id`: local record id
    /// - `reason`: remote document id
    CrashMirrored,

    /// The remote mirror rejected or could not be reached for a crash record.
    ///
    /// Sets:
    /// - `crash_id`: local record id
    /// - `reason`: remote failure
    CrashMirrorFailed,

    /// Crash stores were cleared (fully or partially).
    ///
    /// Sets:
    /// - `reason`: summary or partial-failure description
    CrashesCleared,

    // === Subscriber health ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `child`: subscriber name
    /// - `reason`: `"full"` / `"closed"`
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `child`: subscriber name
    /// - `reason`: panic payload
    SubscriberPanicked,
}

/// Why a child was reported as crashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashKind {
    /// The OS refused to create the process.
    LaunchError,
    /// The OS returned an error while the liveness monitor was polling.
    PollError,
}

impl CrashKind {
    /// Wire name used by the UI layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            CrashKind::LaunchError => "launch-error",
            CrashKind::PollError => "poll-error",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Logical child id (or subscriber name for subscriber events).
    pub child: Option<Arc<str>>,
    /// OS process id.
    pub pid: Option<u32>,
    /// Exit code reported by the OS.
    pub exit_code: Option<i32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Crash classification for `ChildCrashed`.
    pub crash_kind: Option<CrashKind>,
    /// Crash record id for telemetry events.
    pub crash_id: Option<Arc<str>>,
    /// Crash origin for `CrashCaptured`.
    pub origin: Option<CrashOrigin>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            child: None,
            pid: None,
            exit_code: None,
            reason: None,
            crash_kind: None,
            crash_id: None,
            origin: None,
        }
    }

    /// Attaches a child id.
    #[inline]
    pub fn with_child(mut self, id: impl Into<Arc<str>>) -> Self {
        self.child = Some(id.into());
        self
    }

    /// Attaches an OS process id.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches an exit code (`None` keeps the field unset).
    #[inline]
    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a crash classification.
    #[inline]
    pub fn with_crash_kind(mut self, kind: CrashKind) -> Self {
        self.crash_kind = Some(kind);
        self
    }

    /// Attaches a crash record id.
    #[inline]
    pub fn with_crash_id(mut self, id: impl Into<Arc<str>>) -> Self {
        self.crash_id = Some(id.into());
        self
    }

    /// Attaches a crash origin.
    #[inline]
    pub fn with_origin(mut self, origin: CrashOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_child(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_child(subscriber)
            .with_reason(info)
    }

    /// True for `ChildExited` and `ChildCrashed`.
    #[inline]
    pub fn is_child_terminal(&self) -> bool {
        matches!(self.kind, EventKind::ChildExited | EventKind::ChildCrashed)
    }

    #[inline]
    pub fn is_subscriber_health(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::ChildLaunched);
        let b = Event::new(EventKind::ChildExited);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn terminal_classification() {
        assert!(Event::new(EventKind::ChildCrashed).is_child_terminal());
        assert!(!Event::new(EventKind::ChildLaunched).is_child_terminal());
        assert!(Event::subscriber_overflow("log", "full").is_subscriber_health());
    }
}
