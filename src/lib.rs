//! # launchvisor
//!
//! **Launchvisor** is the process-supervision and crash-telemetry core of a desktop game
//! launcher host.
//!
//! It launches child executables, tracks them by logical id, notices when they exit, kills
//! their process trees on request or on host shutdown, and records crash reports durably on
//! disk with a best-effort remote mirror.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   launch(id, path)      terminate(id)       host shutdown signal
//!          │                    │                     │
//!          ▼                    ▼                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - Registry (one lock: id → ChildHandle + monitor)                │
//! │  - process (own process group, tree kill per OS)                  │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!  │ ChildMonitor │   │ ChildMonitor │   │ ChildMonitor │   poll every poll_interval
//!  └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!         │ ChildLaunched / ChildExited / ChildCrashed
//!         ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │◄── CrashTelemetry
//! └─────────────────────────────────┬─────────────────────────────────┘    CrashCaptured /
//!                                   ▼                                      CrashMirrored / ...
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                        ┌──────────┼───────────┐
//!                        ▼          ▼           ▼
//!                    LogWriter  ChildCrash   UI bridge
//!                               Recorder ───► CrashTelemetry::capture
//! ```
//!
//! ### Crash telemetry
//! ```text
//! capture ─► LocalCrashLog::append (tmp + fsync + rename) ─► return record
//!                  └─► tokio::spawn(CrashMirror::upload)    (bounded retry, logged on failure)
//! list    ─► CrashMirror::query ──Err──► LocalCrashLog::list_all (newest first)
//! clear   ─► CrashMirror::clear_up_to ║ LocalCrashLog::clear   (Partial vs Total errors)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Launch, track, terminate and shut down child processes.      | [`Supervisor`], [`ChildHandle`]             |
//! | **Events**        | Lifecycle and telemetry events on one broadcast bus.         | [`Bus`], [`Event`], [`EventKind`]           |
//! | **Subscriber API**| Hook into events (UI bridge, logging, crash forwarding).     | [`Subscribe`], [`ChildCrashRecorder`]       |
//! | **Telemetry**     | Local-first crash records with a remote mirror.              | [`CrashTelemetry`], [`CrashMirror`]         |
//! | **Errors**        | Typed errors for launch, capture, remote and clear.          | [`LaunchError`], [`CaptureError`], [`ClearError`] |
//! | **Configuration** | Serde-loadable settings with defaults.                       | [`SupervisorConfig`], [`TelemetryConfig`]   |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use launchvisor::{
//!     Bus, ChildCrashRecorder, CrashOrigin, CrashReport, CrashTelemetry, Subscribe, Supervisor,
//!     SupervisorConfig, TelemetryConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = Bus::new(1024);
//!     let telemetry = Arc::new(CrashTelemetry::from_config(
//!         TelemetryConfig::for_app("game-launcher", "1.0.0"),
//!         bus.clone(),
//!     )?);
//!     launchvisor::install_panic_hook(Arc::clone(&telemetry));
//!
//!     let subs: Vec<Arc<dyn Subscribe>> =
//!         vec![Arc::new(ChildCrashRecorder::new(Arc::clone(&telemetry)))];
//!     let sup = Supervisor::builder(SupervisorConfig::default())
//!         .with_bus(bus)
//!         .with_subscribers(subs)
//!         .build();
//!
//!     sup.launch("solitaire", "/usr/games/sol").await?;
//!
//!     // Relayed from the UI layer.
//!     telemetry
//!         .capture(CrashOrigin::Renderer, CrashReport::new("TypeError", "x is undefined"))
//!         .await?;
//!
//!     for rec in telemetry.recent().await.records {
//!         println!("{} {} {}", rec.timestamp, rec.origin, rec.error.message);
//!     }
//!
//!     sup.run_until_shutdown().await?;
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod events;
mod policies;
mod subscribers;
mod telemetry;

// ---- Public re-exports ----

pub use core::{
    ChildHandle, ChildStatus, LaunchOutcome, LaunchReply, Supervisor, SupervisorBuilder,
    SupervisorConfig, wait_for_shutdown_signal,
};
pub use error::{CaptureError, ClearError, ClearSide, LaunchError, RemoteError};
pub use events::{Bus, CrashKind, Event, EventKind};
pub use policies::{Backoff, BackoffPolicy, JitterPolicy};
pub use subscribers::{Subscribe, SubscriberSet};
pub use telemetry::{
    Captured, ChildCrashRecorder, ClearSummary, CrashListing, CrashMirror, CrashOrigin,
    CrashRecord, CrashReport, CrashTelemetry, DisabledMirror, FIRESTORE_BASE_URL,
    FirestoreMirror, LocalCrashLog, PersistenceState, RemoteConfig, ReportSource, SystemInfo,
    TelemetryConfig, install_panic_hook,
};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
