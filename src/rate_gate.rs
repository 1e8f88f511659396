//! Per-account minimum fetch spacing and adaptive 429 backoff. Both concerns live in one
//! type because they're reasoned about together: the spacing check runs every tick, the
//! backoff formula runs only on a rate-limited fetch, but both write the same `next_run`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const ACCOUNT_MIN_INTERVAL_SECONDS: u64 = 30;
const MAX_BACKOFF_MULTIPLIER: u32 = 16;

/// Process-wide `account -> last_request_monotonic_ts`. Lives as a plain field on the
/// engine, touched only by the single tick task — no locking needed.
#[derive(Debug, Default)]
pub struct RateGate {
    account_last_call: HashMap<String, Instant>,
}

impl RateGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// The earliest instant at which `account` may legally be fetched again, if a fetch
    /// right now would violate the minimum spacing.
    pub fn earliest_legal(&self, account: &str, now: Instant) -> Option<Instant> {
        let last = *self.account_last_call.get(account)?;
        let earliest = last + Duration::from_secs(ACCOUNT_MIN_INTERVAL_SECONDS);
        (earliest > now).then_some(earliest)
    }

    /// Reserve the slot. Called immediately before the fetch, so a concurrent tick
    /// observes the reservation even though the fetch itself hasn't completed.
    pub fn record_call(&mut self, account: &str, now: Instant) {
        self.account_last_call.insert(account.to_string(), now);
    }

    /// Backoff duration for a 429 response, per the header-or-formula rule.
    pub fn backoff_for_rate_limit(
        retry_after: Option<u64>,
        interval_seconds: u64,
        backoff_multiplier: u32,
    ) -> Duration {
        match retry_after {
            Some(retry_after) => Duration::from_secs(retry_after.max(interval_seconds)),
            None => {
                let base = interval_seconds.max(60);
                Duration::from_secs(base * backoff_multiplier as u64)
            }
        }
    }

    pub fn next_backoff_multiplier(current: u32) -> u32 {
        (current * 2).min(MAX_BACKOFF_MULTIPLIER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spacing_defers_a_second_account_fetch() {
        let mut gate = RateGate::new();
        let t0 = Instant::now();
        gate.record_call("foo", t0);
        assert!(gate.earliest_legal("foo", t0).is_some());
        let legal = gate.earliest_legal("foo", t0).unwrap();
        assert_eq!(legal, t0 + Duration::from_secs(ACCOUNT_MIN_INTERVAL_SECONDS));
        assert!(gate.earliest_legal("foo", legal).is_none());
    }

    #[test]
    fn backoff_prefers_retry_after_header_floor_interval() {
        let d = RateGate::backoff_for_rate_limit(Some(10), 60, 1);
        assert_eq!(d, Duration::from_secs(60));
        let d = RateGate::backoff_for_rate_limit(Some(120), 60, 1);
        assert_eq!(d, Duration::from_secs(120));
    }

    #[test]
    fn backoff_without_header_uses_multiplier() {
        let d = RateGate::backoff_for_rate_limit(None, 60, 2);
        assert_eq!(d, Duration::from_secs(120));
        let d = RateGate::backoff_for_rate_limit(None, 10, 1);
        assert_eq!(d, Duration::from_secs(60));
    }

    #[test]
    fn multiplier_doubles_and_caps() {
        let mut m = 1;
        for expected in [2, 4, 8, 16, 16] {
            m = RateGate::next_backoff_multiplier(m);
            assert_eq!(m, expected);
        }
    }
}
