//! # Built-in subscribers
//!
//! - [`LogWriter`]: renders every event as a `tracing` record (feature `logging`).

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
