//! Error types used by the supervisor and the crash telemetry store.
//!
//! - [`LaunchError`]: returned by [`Supervisor::launch`](crate::Supervisor::launch).
//! - [`CaptureError`]: a crash record could not be made durable locally.
//! - [`RemoteError`]: the remote mirror failed (never "no data": an empty result is `Ok`).
//! - [`ClearError`]: one or both stores failed to clear.
//!
//! Every enum provides `as_label` (stable snake_case label for logs/metrics).
//! Failures inside monitors and background uploads never surface as these types; they are
//! contained where they happen and turned into events or log lines.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// # Errors produced by a launch request.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LaunchError {
    /// A child with this id is still running; the request is rejected, not relaunched.
    #[error("child {id:?} is already running")]
    AlreadyRunning {
        /// The logical id that is already registered.
        id: String,
    },

    /// Host shutdown has started; no new children are accepted.
    #[error("child {id:?} not launched: supervisor is shutting down")]
    ShuttingDown {
        /// The logical id of the rejected launch.
        id: String,
    },

    /// The OS refused to create the process (missing file, permission denied, ...).
    #[error("failed to spawn {path:?} for child {id:?}: {cause}")]
    Spawn {
        /// The logical id of the rejected launch.
        id: String,
        /// Executable that was requested.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        cause: io::Error,
    },
}

impl LaunchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use launchvisor::LaunchError;
    ///
    /// let err = LaunchError::AlreadyRunning { id: "g1".into() };
    /// assert_eq!(err.as_label(), "launch_already_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LaunchError::AlreadyRunning { .. } => "launch_already_running",
            LaunchError::ShuttingDown { .. } => "launch_shutting_down",
            LaunchError::Spawn { .. } => "launch_spawn_failed",
        }
    }
}

/// # Errors produced while capturing a crash record.
///
/// Only the local write can fail a capture; the remote upload is detached.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Disk full, permission denied, or the crash directory vanished.
    #[error("crash log I/O failed at {path:?}: {source}")]
    LocalIo {
        /// File or directory being written.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The record could not be serialized.
    #[error("crash record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The blocking writer task was cancelled or panicked.
    #[error("crash log writer did not complete: {reason}")]
    Writer {
        /// Join failure description.
        reason: String,
    },
}

impl CaptureError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CaptureError::LocalIo { .. } => "capture_local_io",
            CaptureError::Encode(_) => "capture_encode",
            CaptureError::Writer { .. } => "capture_writer",
        }
    }
}

/// # Errors produced by a remote crash mirror.
///
/// All variants mean "remote unavailable" to the telemetry service: reads fall back to the
/// local log and writes are dropped with a log line.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// No remote store is configured.
    #[error("remote mirror is not configured")]
    Disabled,

    /// Network failure, DNS, TLS, or timeout.
    #[error("remote mirror unreachable: {reason}")]
    Unavailable {
        /// Transport error description.
        reason: String,
    },

    /// The store answered with an error status (auth, quota, bad request).
    #[error("remote mirror rejected request with status {status}: {reason}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body or status text.
        reason: String,
    },

    /// The store answered but the payload could not be understood.
    #[error("remote mirror returned a malformed response: {reason}")]
    Malformed {
        /// Decode error description.
        reason: String,
    },
}

impl RemoteError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RemoteError::Disabled => "remote_disabled",
            RemoteError::Unavailable { .. } => "remote_unavailable",
            RemoteError::Rejected { .. } => "remote_rejected",
            RemoteError::Malformed { .. } => "remote_malformed",
        }
    }

    /// Indicates whether retrying the same request may succeed.
    ///
    /// Transport failures, throttling (`429`) and server errors (`5xx`) are retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Unavailable { .. } => true,
            RemoteError::Rejected { status, .. } => *status == 429 || *status >= 500,
            RemoteError::Disabled | RemoteError::Malformed { .. } => false,
        }
    }
}

/// Which of the two crash stores a clear failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearSide {
    /// The remote mirror.
    Remote,
    /// The local crash directory.
    Local,
}

/// # Errors produced by [`CrashTelemetry::clear_all`](crate::CrashTelemetry::clear_all).
///
/// Both stores are always attempted; partial failure is distinct from total failure.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClearError {
    /// One store was cleared, the other failed.
    #[error("{failed:?} crash store was not cleared: {reason}")]
    Partial {
        /// Store that failed.
        failed: ClearSide,
        /// Failure description.
        reason: String,
    },

    /// Neither store could be cleared.
    #[error("no crash store was cleared (remote: {remote}; local: {local})")]
    Total {
        /// Remote failure description.
        remote: String,
        /// Local failure description.
        local: String,
    },
}

impl ClearError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ClearError::Partial { .. } => "clear_partial",
            ClearError::Total { .. } => "clear_total",
        }
    }

    /// True if at least one store was cleared.
    pub fn is_partial(&self) -> bool {
        matches!(self, ClearError::Partial { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_and_server_errors_are_retryable() {
        let throttled = RemoteError::Rejected { status: 429, reason: "quota".into() };
        let denied = RemoteError::Rejected { status: 403, reason: "auth".into() };
        let broken = RemoteError::Rejected { status: 503, reason: "down".into() };

        assert!(throttled.is_retryable());
        assert!(broken.is_retryable());
        assert!(!denied.is_retryable());
        assert!(!RemoteError::Disabled.is_retryable());
    }

    #[test]
    fn spawn_error_keeps_os_cause() {
        let err = LaunchError::Spawn {
            id: "g1".into(),
            path: PathBuf::from("/nope"),
            cause: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(err.as_label(), "launch_spawn_failed");
        assert!(std::error::Error::source(&err).is_some());
    }
}
