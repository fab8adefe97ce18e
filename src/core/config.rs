//! # Supervisor configuration.
//!
//! Provides [`SupervisorConfig`] centralized settings for the process supervisor.
//!
//! ## Sentinel values
//! - `poll_interval = 0s` → clamped to 10ms (a zero-period ticker is not allowed)
//! - `kill_grace = 0s` → escalate to a forceful kill immediately

use std::time::Duration;

use serde::Deserialize;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `poll_interval`: how often each child monitor checks whether its process still exists
/// - `kill_grace`: how long `terminate`/`shutdown` wait after the graceful signal before
///   escalating to a forceful tree kill
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
///
/// Deserializable from config files; durations use humantime syntax (`"5s"`).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Liveness poll period per child.
    ///
    /// Bounds exit-detection latency; each tick is one non-blocking `try_wait`.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Wait between graceful and forceful termination.
    #[serde(with = "humantime_serde")]
    pub kill_grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Only used when the builder creates the bus itself.
    pub bus_capacity: usize,
}

impl SupervisorConfig {
    /// Returns the poll interval clamped to a usable minimum.
    #[inline]
    pub fn poll_interval_clamped(&self) -> Duration {
        self.poll_interval.max(Duration::from_millis(10))
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `poll_interval = 5s`
    /// - `kill_grace = 3s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            kill_grace: Duration::from_secs(3),
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: SupervisorConfig =
            serde_json::from_str(r#"{ "poll_interval": "250ms" }"#).expect("config");
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.kill_grace, Duration::from_secs(3));
        assert_eq!(cfg.bus_capacity, 1024);
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let cfg = SupervisorConfig {
            poll_interval: Duration::ZERO,
            ..SupervisorConfig::default()
        };
        assert_eq!(cfg.poll_interval_clamped(), Duration::from_millis(10));
    }
}
