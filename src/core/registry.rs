//! # Child registry: the single owner of active child handles.
//!
//! Every registration, lookup, poll and removal goes through one `tokio::sync::Mutex`, so
//! launch, terminate, shutdown and monitor exit are linearizable against each other.
//!
//! ## Architecture
//! ```text
//! Supervisor::launch ──► lock ──► reject duplicate / spawn / insert / publish ChildLaunched
//! ChildMonitor tick  ──► lock ──► entry still ours? ──► try_wait ──► remove + publish terminal
//! Supervisor::terminate ──► lock ──► remove + cancel monitor (terminal event after the kill)
//! Supervisor::shutdown  ──► lock ──► drain + cancel every monitor
//! ```
//!
//! ## Rules
//! - At most one entry per id; a duplicate launch is rejected while the lock is held.
//! - Whoever removes an entry owns its terminal event; removal happens once, so the
//!   event fires once.
//! - A monitor only polls while holding the lock **and** seeing its own generation in the
//!   table, so a removed handle is never polled again.
//! - Generations tell a relaunched id apart from a stale monitor of the previous launch.
//! - `drain`/`close_now` close the registry under the lock; `launch` checks the flag under the
//!   same lock, so nothing is registered after shutdown has collected the children.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::SystemTime;

use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::handle::{ChildHandle, ChildStatus};
use crate::events::{Bus, CrashKind, Event, EventKind};

/// `try_lock` attempts before `close_now` gives up.
const CLOSE_ATTEMPTS: usize = 1000;

/// Live registry entry.
pub(crate) struct Entry {
    /// Snapshot data handed out to callers.
    pub handle: ChildHandle,
    /// Launch generation (unique per registry).
    pub generation: u64,
    /// Cancels the child's monitor.
    pub cancel: CancellationToken,
    /// Monitor task; yields the exit code it reaped after cancellation.
    pub monitor: JoinHandle<Option<i32>>,
}

/// Result of one liveness poll.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PollOutcome {
    /// Process still exists.
    Running,
    /// Process is gone; the entry was removed and `ChildExited` published.
    Exited(Option<i32>),
    /// The OS reported an error; the entry was removed and `ChildCrashed` published.
    Failed,
    /// The entry was already removed by someone else; stop polling.
    Released,
}

/// Registry of active children, keyed by logical id.
pub(crate) struct Registry {
    entries: Mutex<HashMap<String, Entry>>,
    next_generation: AtomicU64,
    /// Written and read only while `entries` is locked.
    closed: AtomicBool,
    bus: Bus,
}

/// Exclusive access to the table, held across check-spawn-insert in `launch`.
pub(crate) type Table<'a> = tokio::sync::MutexGuard<'a, HashMap<String, Entry>>;

impl Registry {
    /// Creates an empty registry publishing to `bus`.
    pub fn new(bus: Bus) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            bus,
        }
    }

    /// Locks the table for a compound operation.
    pub async fn lock(&self) -> Table<'_> {
        self.entries.lock().await
    }

    /// True once shutdown has drained the table. Call with the table locked.
    pub fn is_closed(&self, _table: &Table<'_>) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Reserves the next launch generation.
    pub fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Inserts a freshly spawned child and publishes `ChildLaunched`.
    ///
    /// The caller has checked `table` for a duplicate under the same guard.
    pub fn insert(
        &self,
        table: &mut Table<'_>,
        id: &str,
        pid: u32,
        executable: &Path,
        generation: u64,
        cancel: CancellationToken,
        monitor: JoinHandle<Option<i32>>,
    ) -> ChildHandle {
        let handle = ChildHandle {
            id: id.to_string(),
            pid,
            executable: PathBuf::from(executable),
            started_at: SystemTime::now(),
            status: ChildStatus::Running,
        };
        table.insert(
            id.to_string(),
            Entry {
                handle: handle.clone(),
                generation,
                cancel,
                monitor,
            },
        );
        self.bus.publish(
            Event::new(EventKind::ChildLaunched)
                .with_child(id)
                .with_pid(pid),
        );
        handle
    }

    /// Polls one child on behalf of its monitor.
    ///
    /// The poll itself (`try_wait`) runs under the lock; a terminal result removes the entry
    /// and publishes the terminal event before the lock is released.
    pub async fn poll(&self, id: &str, generation: u64, child: &mut Child) -> PollOutcome {
        let mut table = self.entries.lock().await;
        let pid = match table.get(id) {
            Some(entry) if entry.generation == generation => entry.handle.pid,
            _ => return PollOutcome::Released,
        };

        match child.try_wait() {
            Ok(None) => PollOutcome::Running,
            Ok(Some(status)) => {
                table.remove(id);
                let code = status.code();
                self.bus.publish(
                    Event::new(EventKind::ChildExited)
                        .with_child(id)
                        .with_pid(pid)
                        .with_exit_code(code),
                );
                PollOutcome::Exited(code)
            }
            Err(err) => {
                table.remove(id);
                self.bus.publish(
                    Event::new(EventKind::ChildCrashed)
                        .with_child(id)
                        .with_pid(pid)
                        .with_crash_kind(CrashKind::PollError)
                        .with_reason(err.to_string()),
                );
                PollOutcome::Failed
            }
        }
    }

    /// Removes one entry and cancels its monitor. `None` if the id is not active.
    ///
    /// The caller now owns the terminal event for this child.
    pub async fn release(&self, id: &str) -> Option<Entry> {
        let mut table = self.entries.lock().await;
        let entry = table.remove(id)?;
        entry.cancel.cancel();
        Some(entry)
    }

    /// Closes the registry, removes every entry and cancels every monitor, in launch order.
    pub async fn drain(&self) -> Vec<Entry> {
        let mut table = self.entries.lock().await;
        self.close_locked(&mut table)
    }

    /// Synchronous [`drain`](Self::drain) for `Drop`; `None` if the lock stays contended.
    pub fn close_now(&self) -> Option<Vec<Entry>> {
        for _ in 0..CLOSE_ATTEMPTS {
            if let Ok(mut table) = self.entries.try_lock() {
                return Some(self.close_locked(&mut table));
            }
            std::thread::yield_now();
        }
        None
    }

    fn close_locked(&self, table: &mut Table<'_>) -> Vec<Entry> {
        self.closed.store(true, Ordering::Release);
        let mut entries: Vec<Entry> = table.drain().map(|(_, e)| e).collect();
        for entry in &entries {
            entry.cancel.cancel();
        }
        entries.sort_unstable_by_key(|e| e.generation);
        entries
    }

    /// Returns snapshots of all active children in launch order.
    pub async fn snapshot(&self) -> Vec<ChildHandle> {
        let table = self.entries.lock().await;
        let mut entries: Vec<&Entry> = table.values().collect();
        entries.sort_unstable_by_key(|e| e.generation);
        entries.into_iter().map(|e| e.handle.clone()).collect()
    }

    /// Number of active children.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
