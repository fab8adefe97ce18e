//! Crash telemetry: durable local crash log plus a best-effort remote mirror.
//!
//! - [`CrashTelemetry`]: capture / list / clear, local first.
//! - [`LocalCrashLog`]: one JSON file per record, fsync-durable.
//! - [`CrashMirror`]: remote store seam ([`FirestoreMirror`], [`DisabledMirror`]).
//! - [`ChildCrashRecorder`]: bus subscriber feeding child crashes into telemetry.
//! - [`install_panic_hook`]: host panics become crash records.

mod config;
mod local;
mod panic_hook;
mod record;
mod recorder;
mod remote;
mod service;

pub use config::{FIRESTORE_BASE_URL, RemoteConfig, TelemetryConfig};
pub use local::LocalCrashLog;
pub use panic_hook::install_panic_hook;
pub use record::{CrashOrigin, CrashRecord, CrashReport, PersistenceState, SystemInfo};
pub use recorder::ChildCrashRecorder;
pub use remote::{CrashMirror, DisabledMirror, FirestoreMirror};
pub use service::{Captured, ClearSummary, CrashListing, CrashTelemetry, ReportSource};
