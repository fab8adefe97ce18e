//! # Jitter for upload retry delays.
//!
//! Launcher hosts that lose connectivity together come back together; jitter keeps their
//! crash uploads from hitting the remote store in lockstep.

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

/// How a retry delay is randomized.
///
/// Deserializes from `"none"`, `"equal"` or `"decorrelated"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitterPolicy {
    /// Exact exponential delays.
    None,
    /// Upper half of the exponential delay: `ceiling/2 + random[0, ceiling/2]`.
    #[default]
    Equal,
    /// `random[first, previous × 3]`, capped at `max`; the first retry waits `first`..`3 × first`.
    Decorrelated,
}

impl JitterPolicy {
    /// Picks the delay for one retry.
    ///
    /// `ceiling` is the capped exponential delay for this retry, `prev` the delay the
    /// schedule handed out before it.
    pub(crate) fn spread(
        self,
        ceiling: Duration,
        prev: Option<Duration>,
        floor: Duration,
        cap: Duration,
    ) -> Duration {
        match self {
            JitterPolicy::None => ceiling,
            JitterPolicy::Equal => {
                let half = ceiling / 2;
                random_between(half, ceiling)
            }
            JitterPolicy::Decorrelated => {
                let prev = prev.unwrap_or(floor);
                random_between(floor, prev.saturating_mul(3).min(cap))
            }
        }
    }
}

/// Uniform delay in `[low, high]` at millisecond granularity; `low` if the range is empty.
fn random_between(low: Duration, high: Duration) -> Duration {
    if high <= low {
        return low;
    }
    let span = u64::try_from((high - low).as_millis()).unwrap_or(u64::MAX);
    low + Duration::from_millis(rand::rng().random_range(0..=span))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_returns_the_ceiling() {
        let d = JitterPolicy::None.spread(
            Duration::from_millis(700),
            Some(Duration::from_secs(9)),
            Duration::from_millis(100),
            Duration::from_secs(10),
        );
        assert_eq!(d, Duration::from_millis(700));
    }

    #[test]
    fn decorrelated_cannot_drop_below_floor_when_cap_is_lower() {
        let floor = Duration::from_millis(500);
        let d = JitterPolicy::Decorrelated.spread(
            Duration::ZERO,
            Some(Duration::from_millis(50)),
            floor,
            Duration::from_millis(100),
        );
        assert_eq!(d, floor);
    }

    #[test]
    fn sub_millisecond_ranges_collapse_to_low() {
        let low = Duration::from_micros(100);
        assert_eq!(random_between(low, Duration::from_micros(900)), low);
        assert_eq!(random_between(Duration::ZERO, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn unknown_policy_name_is_rejected() {
        assert!(serde_json::from_str::<JitterPolicy>(r#""full""#).is_err());
        assert_eq!(
            serde_json::from_str::<JitterPolicy>(r#""decorrelated""#).unwrap(),
            JitterPolicy::Decorrelated
        );
    }
}
