//! # Supervisor: launches, tracks and terminates child executables.
//!
//! The [`Supervisor`] owns the child [`Registry`], the event bus and the subscriber
//! listener. It is built once at host startup and shared as `Arc<Supervisor>`.
//!
//! ## Key responsibilities
//! - spawn children and register exactly one handle per logical id
//! - run one [`ChildMonitor`] per child (liveness polling)
//! - terminate a child tree on request (graceful, then forceful after `kill_grace`)
//! - on host shutdown, terminate every remaining child before the host exits
//! - subscribe to the [`Bus`] and fan out events via [`SubscriberSet`]
//!
//! ## High-level architecture
//! ```text
//! launch(id, path):
//!   Registry lock ─► closed? ─► ShuttingDown
//!                 ─► duplicate? ─► AlreadyRunning
//!                 ─► spawn ─► Err ─► ChildCrashed{launch-error} + Spawn error
//!                 ─► spawn monitor ─► insert ─► ChildLaunched
//!
//! ChildMonitor (one per child):
//!   every poll_interval: Registry::poll ─► Exited/Failed ─► terminal event, stop
//!
//! terminate(id):
//!   Registry::release ─► SIGTERM tree ─► wait(kill_grace) ─► SIGKILL tree ─► ChildExited{terminated}
//!
//! shutdown():
//!   ShutdownRequested ─► Registry::drain ─► SIGTERM all ─► wait(kill_grace) ─► SIGKILL stragglers
//!                     ─► ChildExited{host-shutdown} per child ─► AllChildrenStopped
//!                     ─► stop listener ─► flush subscriber queues
//!
//! drop (no shutdown):
//!   Registry::close_now ─► SIGKILL every tree ─► ChildExited{supervisor-dropped}
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use launchvisor::{Supervisor, SupervisorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sup = Supervisor::builder(SupervisorConfig::default()).build();
//!
//!     sup.launch("g1", "/usr/games/solitaire").await?;
//!     for handle in sup.active_handles().await {
//!         println!("{} pid={}", handle.id, handle.pid);
//!     }
//!
//!     sup.run_until_shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::{
    builder::SupervisorBuilder,
    config::SupervisorConfig,
    handle::{ChildHandle, LaunchOutcome},
    monitor::ChildMonitor,
    process::{self, Stop},
    registry::Registry,
    shutdown,
};
use crate::error::LaunchError;
use crate::events::{Bus, CrashKind, Event, EventKind};
use crate::subscribers::SubscriberSet;

/// How long to wait for a monitor to reap its child after a forceful kill.
const REAP_AFTER_KILL: Duration = Duration::from_secs(2);

/// Launches and supervises child processes.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    registry: Arc<Registry>,
    listener_token: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    /// Returns a builder for a supervisor with the given configuration.
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        bus: Bus,
        registry: Arc<Registry>,
        listener_token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            registry,
            listener_token,
            listener: Mutex::new(None),
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set.
    ///
    /// On cancellation the listener forwards what is already on the bus, then waits for
    /// every subscriber to work through its queue.
    pub(crate) fn subscriber_listener(&self, set: SubscriberSet) {
        let mut rx = self.bus.subscribe();
        let token = self.listener_token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            loop {
                match rx.try_recv() {
                    Ok(ev) => set.emit(&ev),
                    Err(TryRecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                    }
                    Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                }
            }
            set.shutdown().await;
        });
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Event bus shared by the registry, monitors and (optionally) crash telemetry.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Active configuration.
    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Spawns `executable` as child `id` and starts its liveness monitor.
    ///
    /// ### Errors
    /// - [`LaunchError::ShuttingDown`] once [`shutdown`](Self::shutdown) has started.
    /// - [`LaunchError::AlreadyRunning`] if `id` is active (the running child is untouched).
    /// - [`LaunchError::Spawn`] if the OS refuses to create the process; a
    ///   `ChildCrashed { kind: launch-error }` event is published as well.
    pub async fn launch(
        &self,
        id: impl Into<String>,
        executable: impl AsRef<Path>,
    ) -> Result<LaunchOutcome, LaunchError> {
        let id = id.into();
        let executable = executable.as_ref();

        let mut table = self.registry.lock().await;
        if self.registry.is_closed(&table) {
            tracing::debug!(child = %id, "launch rejected: shutting down");
            return Err(LaunchError::ShuttingDown { id });
        }
        if table.contains_key(&id) {
            tracing::debug!(child = %id, "launch rejected: already running");
            return Err(LaunchError::AlreadyRunning { id });
        }

        let spawned = process::command(executable).spawn().and_then(|child| {
            let pid = child.id().ok_or_else(|| {
                io::Error::other("process exited before its pid could be read")
            })?;
            Ok((child, pid))
        });
        let (child, pid) = match spawned {
            Ok(spawned) => spawned,
            Err(cause) => {
                drop(table);
                tracing::warn!(child = %id, path = ?executable, %cause, "spawn failed");
                self.bus.publish(
                    Event::new(EventKind::ChildCrashed)
                        .with_child(id.as_str())
                        .with_crash_kind(CrashKind::LaunchError)
                        .with_reason(cause.to_string()),
                );
                return Err(LaunchError::Spawn {
                    id,
                    path: executable.to_path_buf(),
                    cause,
                });
            }
        };

        let generation = self.registry.next_generation();
        let cancel = CancellationToken::new();
        let monitor = ChildMonitor {
            id: id.clone(),
            generation,
            poll_interval: self.cfg.poll_interval_clamped(),
            registry: Arc::clone(&self.registry),
        };
        let join = tokio::spawn(monitor.run(child, cancel.clone()));

        let handle = self.registry.insert(
            &mut table, &id, pid, executable, generation, cancel, join,
        );
        drop(table);

        tracing::info!(child = %id, pid, path = ?executable, "launched");
        Ok(LaunchOutcome {
            id,
            pid,
            started_at: handle.started_at,
        })
    }

    /// Stops child `id` and its process tree.
    ///
    /// Sends a graceful stop, waits up to `kill_grace`, then kills the tree.
    /// Unknown or already-exited ids are a no-op. Publishes `ChildExited { reason: "terminated" }`
    /// unless the child's own exit was observed first.
    pub async fn terminate(&self, id: &str) {
        let Some(entry) = self.registry.release(id).await else {
            tracing::debug!(child = %id, "terminate: not running");
            return;
        };
        let pid = entry.handle.pid;
        let code = self.stop_child(id, pid, entry.monitor).await;

        self.bus.publish(
            Event::new(EventKind::ChildExited)
                .with_child(id)
                .with_pid(pid)
                .with_exit_code(code)
                .with_reason("terminated"),
        );
    }

    /// Snapshots of all active children, in launch order.
    pub async fn active_handles(&self) -> Vec<ChildHandle> {
        self.registry.snapshot().await
    }

    /// Number of active children.
    pub async fn active_count(&self) -> usize {
        self.registry.len().await
    }

    /// True if `id` has an active handle.
    pub async fn is_running(&self, id: &str) -> bool {
        self.registry.lock().await.contains_key(id)
    }

    /// Terminates every remaining child; meant to run while the host is exiting.
    ///
    /// Sends a graceful stop to every tree, waits up to `kill_grace` in total, then kills the
    /// stragglers. Returns once every kill has been issued and every subscriber has handled
    /// the events published so far; exit of force-killed children is not awaited.
    ///
    /// Later launches are rejected with [`LaunchError::ShuttingDown`].
    pub async fn shutdown(&self) {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        let entries = self.registry.drain().await;

        for entry in &entries {
            if let Err(err) = process::signal_tree(entry.handle.pid, Stop::Graceful) {
                tracing::warn!(child = %entry.handle.id, pid = entry.handle.pid, %err, "graceful stop failed");
            }
        }

        let deadline = Instant::now() + self.cfg.kill_grace;
        let mut forced = 0usize;
        for entry in entries {
            let id = entry.handle.id;
            let pid = entry.handle.pid;
            let mut monitor = entry.monitor;

            let code = match time::timeout_at(deadline, &mut monitor).await {
                Ok(joined) => joined.ok().flatten(),
                Err(_) => {
                    forced += 1;
                    if let Err(err) = process::signal_tree(pid, Stop::Forceful) {
                        tracing::warn!(child = %id, pid, %err, "forceful stop failed");
                    }
                    None
                }
            };
            self.bus.publish(
                Event::new(EventKind::ChildExited)
                    .with_child(id.as_str())
                    .with_pid(pid)
                    .with_exit_code(code)
                    .with_reason("host-shutdown"),
            );
        }

        tracing::info!(forced, "all children stopped");
        self.bus.publish(
            Event::new(EventKind::AllChildrenStopped).with_reason(format!("forced={forced}")),
        );

        self.listener_token.cancel();
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            if let Err(err) = listener.await {
                tracing::warn!(%err, "subscriber listener ended abnormally");
            }
        }
    }

    /// Waits for a host termination signal, then runs [`shutdown`](Self::shutdown).
    pub async fn run_until_shutdown(&self) -> io::Result<()> {
        shutdown::wait_for_shutdown_signal().await?;
        self.shutdown().await;
        Ok(())
    }

    /// Graceful stop, bounded wait, forceful stop; returns the reaped exit code if any.
    async fn stop_child(&self, id: &str, pid: u32, mut monitor: JoinHandle<Option<i32>>) -> Option<i32> {
        match process::signal_tree(pid, Stop::Graceful) {
            Ok(()) => {
                if let Ok(joined) = time::timeout(self.cfg.kill_grace, &mut monitor).await {
                    return joined.ok().flatten();
                }
                tracing::debug!(child = %id, pid, "grace period elapsed; killing tree");
            }
            Err(err) => {
                tracing::warn!(child = %id, pid, %err, "graceful stop failed; killing tree");
            }
        }

        if let Err(err) = process::signal_tree(pid, Stop::Forceful) {
            tracing::warn!(child = %id, pid, %err, "forceful stop failed");
        }
        match time::timeout(REAP_AFTER_KILL, &mut monitor).await {
            Ok(joined) => joined.ok().flatten(),
            Err(_) => {
                tracing::warn!(child = %id, pid, "child not reaped after kill; abandoning monitor");
                monitor.abort();
                None
            }
        }
    }
}

impl Drop for Supervisor {
    /// Kills whatever is still registered when the supervisor goes away without
    /// [`shutdown`](Supervisor::shutdown), so no child outlives the host.
    fn drop(&mut self) {
        match self.registry.close_now() {
            Some(entries) => {
                for entry in entries {
                    let id = entry.handle.id;
                    let pid = entry.handle.pid;
                    tracing::warn!(child = %id, pid, "supervisor dropped with child running; killing tree");
                    if let Err(err) = process::signal_tree(pid, Stop::Forceful) {
                        tracing::warn!(child = %id, pid, %err, "forceful stop failed");
                    }
                    self.bus.publish(
                        Event::new(EventKind::ChildExited)
                            .with_child(id.as_str())
                            .with_pid(pid)
                            .with_reason("supervisor-dropped"),
                    );
                }
            }
            None => tracing::error!("child registry busy at drop; children may outlive the host"),
        }
        self.listener_token.cancel();
    }
}
