//! # ChildMonitor: liveness polling for one child.
//!
//! One monitor task runs per registered child. It owns the [`Child`] so that exit
//! statuses are reaped (a zombie still "exists" for a bare pid probe; `try_wait` does not
//! have that blind spot).
//!
//! ## Architecture
//! ```text
//! Supervisor::launch ──► tokio::spawn(ChildMonitor::run(child, token))
//!
//! loop {
//!   ├─► wait for next tick (poll_interval) or cancellation
//!   ├─► Registry::poll(id, generation, &mut child)   (under the registry lock)
//!   │     ├─ Running   → continue
//!   │     ├─ Exited    → entry removed, ChildExited published → return code
//!   │     ├─ Failed    → entry removed, ChildCrashed published → return
//!   │     └─ Released  → break
//!   └─► cancelled → break
//! }
//! after break: child.wait() (reap after terminate/shutdown signals the tree)
//! ```
//!
//! ## Rules
//! - The first poll happens one interval after launch.
//! - Once a terminal outcome is observed the monitor returns without polling again.
//! - After cancellation the monitor never touches the registry.

use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::select;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::core::registry::{PollOutcome, Registry};

/// Polls one child until it is gone or its handle is released.
pub(crate) struct ChildMonitor {
    /// Logical id of the child.
    pub id: String,
    /// Registry generation this monitor belongs to.
    pub generation: u64,
    /// Poll period.
    pub poll_interval: Duration,
    /// Shared registry.
    pub registry: Arc<Registry>,
}

impl ChildMonitor {
    /// Runs until the child exits, fails, or the handle is released.
    ///
    /// Returns the exit code when one was observed (by polling, or by reaping after release).
    pub async fn run(self, mut child: Child, token: CancellationToken) -> Option<i32> {
        let mut ticker = time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self
                .registry
                .poll(&self.id, self.generation, &mut child)
                .await
            {
                PollOutcome::Running => {
                    tracing::trace!(child = %self.id, "alive");
                }
                PollOutcome::Exited(code) => {
                    tracing::debug!(child = %self.id, ?code, "child exited");
                    return code;
                }
                PollOutcome::Failed => {
                    tracing::warn!(child = %self.id, "poll failed; child marked failed");
                    return None;
                }
                PollOutcome::Released => break,
            }
        }

        match child.wait().await {
            Ok(status) => status.code(),
            Err(err) => {
                tracing::warn!(child = %self.id, %err, "failed to reap released child");
                None
            }
        }
    }
}
