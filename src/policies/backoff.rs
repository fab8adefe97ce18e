//! # Retry schedule for crash uploads.
//!
//! [`BackoffPolicy`] is the configured shape of the schedule; [`BackoffPolicy::schedule`]
//! turns it into a [`Backoff`], the sequence of delays one upload walks through. The
//! schedule owns its retry count and the delay it handed out last, which decorrelated
//! jitter grows from.
//!
//! Without jitter, retry `n` (0-indexed) waits `first × factor^n`, capped at `max`.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use launchvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_millis(500),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! let delays: Vec<u64> = backoff.schedule().take(5).map(|d| d.as_millis() as u64).collect();
//! assert_eq!(delays, [100, 200, 400, 500, 500]);
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::policies::jitter::JitterPolicy;

/// Upload retry policy.
///
/// Deserializable from config; durations use humantime syntax (`"500ms"`, `"30s"`).
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Delay before the first retry; also the floor for decorrelated jitter.
    #[serde(with = "humantime_serde")]
    pub first: Duration,
    /// No retry waits longer than this.
    #[serde(with = "humantime_serde")]
    pub max: Duration,
    /// Growth per retry. Ignored by [`JitterPolicy::Decorrelated`].
    pub factor: f64,
    /// How delays are randomized.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 500ms`, `factor = 2.0`, `max = 30s`, `jitter = Equal`.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        }
    }
}

impl BackoffPolicy {
    /// Starts a fresh delay sequence for one upload.
    ///
    /// The sequence never ends; bound it with [`Iterator::take`].
    pub fn schedule(&self) -> Backoff {
        Backoff {
            policy: *self,
            retry: 0,
            prev: None,
        }
    }

    /// Un-jittered delay for retry `retry`. Anything not representable falls back to `max`.
    fn ceiling(&self, retry: u32) -> Duration {
        let exp = i32::try_from(retry).unwrap_or(i32::MAX);
        Duration::try_from_secs_f64(self.first.as_secs_f64() * self.factor.powi(exp))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

/// Delays between the attempts of one upload, in order.
#[derive(Clone, Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    retry: u32,
    prev: Option<Duration>,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let policy = &self.policy;
        let delay = policy.jitter.spread(
            policy.ceiling(self.retry),
            self.prev,
            policy.first.min(policy.max),
            policy.max,
        );
        self.retry = self.retry.saturating_add(1);
        self.prev = Some(delay);
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(first_ms: u64, max: Duration, factor: f64, jitter: JitterPolicy) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max,
            factor,
            jitter,
        }
    }

    fn millis(schedule: Backoff, n: usize) -> Vec<u128> {
        schedule.take(n).map(|d| d.as_millis()).collect()
    }

    #[test]
    fn delays_grow_until_capped() {
        let p = policy(100, Duration::from_secs(1), 2.0, JitterPolicy::None);
        assert_eq!(millis(p.schedule(), 6), vec![100, 200, 400, 800, 1000, 1000]);
    }

    #[test]
    fn each_upload_starts_from_the_first_delay() {
        let p = policy(100, Duration::from_secs(1), 3.0, JitterPolicy::None);
        let mut used = p.schedule();
        let _ = used.nth(3);
        assert_eq!(millis(p.schedule(), 2), vec![100, 300]);
    }

    #[test]
    fn first_above_max_is_capped() {
        let p = policy(10_000, Duration::from_secs(5), 2.0, JitterPolicy::None);
        assert_eq!(p.schedule().next(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn overflowing_growth_falls_back_to_max() {
        let p = policy(100, Duration::from_secs(60), f64::MAX, JitterPolicy::None);
        let last = p.schedule().take(40).last();
        assert_eq!(last, Some(Duration::from_secs(60)));
    }

    #[test]
    fn equal_jitter_keeps_at_least_half_of_each_step() {
        let p = policy(1000, Duration::from_secs(30), 2.0, JitterPolicy::Equal);
        for _ in 0..20 {
            for (retry, delay) in p.schedule().take(4).enumerate() {
                let ceiling = Duration::from_millis(1000 << retry);
                assert!(delay >= ceiling / 2, "retry {retry}: {delay:?}");
                assert!(delay <= ceiling, "retry {retry}: {delay:?}");
            }
        }
    }

    #[test]
    fn decorrelated_jitter_grows_from_its_previous_delay() {
        let max = Duration::from_secs(2);
        let p = policy(100, max, 2.0, JitterPolicy::Decorrelated);
        for _ in 0..20 {
            let mut prev = p.first;
            for delay in p.schedule().take(10) {
                assert!(delay >= p.first, "{delay:?} below floor");
                assert!(delay <= (prev * 3).min(max), "{delay:?} after {prev:?}");
                prev = delay;
            }
        }
    }

    #[test]
    fn deserializes_humantime_durations() {
        let p: BackoffPolicy = serde_json::from_str(
            r#"{ "first": "250ms", "max": "5s", "factor": 3.0, "jitter": "none" }"#,
        )
        .expect("policy");
        assert_eq!(millis(p.schedule(), 2), vec![250, 750]);

        let defaults: BackoffPolicy = serde_json::from_str("{}").expect("defaults");
        assert_eq!(defaults.max, Duration::from_secs(30));
        assert_eq!(defaults.jitter, JitterPolicy::Equal);
    }
}
