//! Retry policies for remote crash mirroring.
//!
//! A crash upload is attempted once by default. When
//! [`TelemetryConfig::upload_retries`](crate::TelemetryConfig::upload_retries) is non-zero,
//! retryable remote failures are retried, waiting out the delays of one
//! [`BackoffPolicy::schedule`] per upload.
//!
//! ## Contents
//! - [`BackoffPolicy`] first / factor / max plus jitter; [`Backoff`] is one upload's delays
//! - [`JitterPolicy`]  randomization so many hosts don't retry in lockstep
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=500ms, factor=2.0, max=30s, jitter=Equal.

mod backoff;
mod jitter;

pub use backoff::{Backoff, BackoffPolicy};
pub use jitter::JitterPolicy;
