//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and the
//! built-in [`LogWriter`] (feature `logging`).
//!
//! ## Architecture
//! ```text
//! Registry / ChildMonitor / CrashTelemetry ── publish(Event) ──► Bus
//!                                                                 │
//!                                               Supervisor::subscriber_listener
//!                                                                 │
//!                                                          SubscriberSet::emit
//!                                           ┌───────────┬─────────┴────────┐
//!                                           ▼           ▼                  ▼
//!                                       LogWriter  ChildCrashRecorder  UI bridge ...
//! ```
//!
//! [`ChildCrashRecorder`](crate::ChildCrashRecorder) lives with the telemetry code because it
//! feeds crash records into [`CrashTelemetry`](crate::CrashTelemetry).

mod embedded;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
