//! Runtime core: child process supervision.
//!
//! The public entry point is [`Supervisor`], built with [`SupervisorBuilder`] from a
//! [`SupervisorConfig`].
//!
//! Internal modules:
//! - [`registry`]: single owner of active child handles (one lock for every transition);
//! - [`monitor`]: per-child liveness polling;
//! - [`process`]: spawn options and process-tree termination per OS;
//! - [`shutdown`]: cross-platform host shutdown signal handling;
//! - [`supervisor`]: launch / terminate / shutdown orchestration.

mod builder;
mod config;
mod handle;
mod monitor;
mod process;
mod registry;
mod shutdown;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use handle::{ChildHandle, ChildStatus, LaunchOutcome, LaunchReply};
pub use shutdown::wait_for_shutdown_signal;
pub use supervisor::Supervisor;
