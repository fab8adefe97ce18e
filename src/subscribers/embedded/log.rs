//! # LogWriter: event printer over `tracing`
//!
//! A minimal subscriber that renders every incoming [`Event`] as a `tracing` record under
//! the `launchvisor::events` target. Install any `tracing` subscriber to see the output.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO launchvisor::events: launched child="g1" pid=4242
//! INFO launchvisor::events: exited child="g1" code=Some(0) reason=None
//! WARN launchvisor::events: crashed child="g2" kind="launch-error" reason="No such file or directory"
//! INFO launchvisor::events: crash captured id="crash-1718000000000-000001" origin=Some(HostProcess)
//! WARN launchvisor::events: crash mirror failed id="crash-1718000000000-000001" reason="remote mirror is not configured"
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "launchvisor::events";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let child = e.child.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref();
        match e.kind {
            EventKind::ChildLaunched => {
                info!(target: TARGET, child, pid = ?e.pid, "launched");
            }
            EventKind::ChildExited => {
                info!(target: TARGET, child, code = ?e.exit_code, reason = ?reason, "exited");
            }
            EventKind::ChildCrashed => {
                let kind = e.crash_kind.map(|k| k.as_str()).unwrap_or("unknown");
                warn!(target: TARGET, child, kind, reason = ?reason, "crashed");
            }
            EventKind::ShutdownRequested => {
                info!(target: TARGET, "shutdown requested");
            }
            EventKind::AllChildrenStopped => {
                info!(target: TARGET, forced = ?reason, "all children stopped");
            }
            EventKind::CrashCaptured => {
                info!(target: TARGET, id = ?e.crash_id, origin = ?e.origin, "crash captured");
            }
            EventKind::CrashMirrored => {
                info!(target: TARGET, id = ?e.crash_id, document = ?reason, "crash mirrored");
            }
            EventKind::CrashMirrorFailed => {
                warn!(target: TARGET, id = ?e.crash_id, reason = ?reason, "crash mirror failed");
            }
            EventKind::CrashesCleared => {
                info!(target: TARGET, summary = ?reason, "crash reports cleared");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: TARGET, subscriber = child, reason = ?reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                warn!(target: TARGET, subscriber = child, info = ?reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
