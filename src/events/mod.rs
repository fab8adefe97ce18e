//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the supervisor registry, child monitors
//! and the crash telemetry service.
//!
//! ## Contents
//! - [`EventKind`], [`Event`], [`CrashKind`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Registry`, `ChildMonitor`, `Supervisor` (shutdown), `CrashTelemetry`.
//! - **Consumers**: `Supervisor::subscriber_listener()` (fans out to `SubscriberSet`),
//!   or any caller of [`Bus::subscribe`].

mod bus;
mod event;

pub use bus::Bus;
pub use event::{CrashKind, Event, EventKind};
