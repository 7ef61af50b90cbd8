//! Bounded redelivery of retryable messages.
//!
//! A retryable delivery goes back on the queue with its retry counter bumped
//! until the counter reaches `max_redeliveries`; after that it is quarantined.
//! Each requeue waits `initial_delay * 2 ^ retry_count` (capped at
//! `max_delay`) first, so a short collaborator outage is ridden out instead
//! of burning through every attempt in a few milliseconds.

use std::time::Duration;

/// How often, and how far apart, a message may be put back on the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    /// Number of requeues allowed before dead-lettering
    pub max_redeliveries: u32,
    /// Wait before the first requeue
    pub initial_delay: Duration,
    /// Cap for the doubling wait
    pub max_delay: Duration,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

impl RedeliveryPolicy {
    /// Create a policy allowing `max_redeliveries` requeues, one second apart
    /// at first and at most 30 seconds apart.
    #[must_use]
    pub const fn new(max_redeliveries: u32) -> Self {
        Self {
            max_redeliveries,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }

    /// Set the backoff between requeues.
    #[must_use]
    pub const fn with_backoff(mut self, initial_delay: Duration, max_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self.max_delay = max_delay;
        self
    }

    /// Whether a delivery that has already been requeued `retry_count` times
    /// may be requeued again.
    #[must_use]
    pub const fn allows_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_redeliveries
    }

    /// Wait before requeueing a delivery that has been requeued
    /// `retry_count` times already.
    #[must_use]
    pub fn delay_before_requeue(&self, retry_count: u32) -> Duration {
        let factor = 2u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_allows_five_requeues() {
        let policy = RedeliveryPolicy::default();
        assert!(policy.allows_retry(0));
        assert!(policy.allows_retry(4));
        assert!(!policy.allows_retry(5));
    }

    #[test]
    fn zero_dead_letters_immediately() {
        assert!(!RedeliveryPolicy::new(0).allows_retry(0));
    }

    #[test]
    fn requeue_delay_doubles_up_to_cap() {
        let policy = RedeliveryPolicy::default();

        assert_eq!(policy.delay_before_requeue(0), Duration::from_secs(1));
        assert_eq!(policy.delay_before_requeue(1), Duration::from_secs(2));
        assert_eq!(policy.delay_before_requeue(4), Duration::from_secs(16));
        assert_eq!(policy.delay_before_requeue(5), Duration::from_secs(30));
        assert_eq!(policy.delay_before_requeue(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn zero_backoff_requeues_immediately() {
        let policy = RedeliveryPolicy::new(3).with_backoff(Duration::ZERO, Duration::ZERO);
        assert_eq!(policy.delay_before_requeue(2), Duration::ZERO);
    }

    proptest! {
        #[test]
        fn never_allows_retry_past_cap(max in 0u32..100, count in 0u32..200) {
            let policy = RedeliveryPolicy::new(max);
            prop_assert_eq!(policy.allows_retry(count), count < max);
        }

        #[test]
        fn delay_is_monotonic_and_capped(count in 0u32..64) {
            let policy = RedeliveryPolicy::default();
            let delay = policy.delay_before_requeue(count);

            prop_assert!(delay <= policy.max_delay);
            prop_assert!(delay <= policy.delay_before_requeue(count + 1));
        }
    }
}
