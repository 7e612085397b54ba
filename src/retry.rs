//! Readiness retry for UI activation
//!
//! Two nested levels: every locator in a chain gets `max_attempts` tries,
//! and the next locator is only tried once the current one has used all of
//! its attempts. `delay` follows every failed attempt except the final one,
//! so a fallback locator also gets a readiness wait.

use std::time::Duration;
use tracing::{debug, info};

use crate::locator::LocatorChain;
use crate::session::DomContext;
use crate::TimingConfig;

/// Bounded attempts with a fixed delay between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self::new(
            timing.activation_attempts,
            Duration::from_millis(timing.activation_retry_delay_ms),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_timing(&TimingConfig::default())
    }
}

/// Outcome of [`activate_with_retry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    Activated {
        /// Chain position of the locator that worked
        locator_index: usize,
        /// Attempts spent on that locator, starting at 1
        attempt: u32,
    },
    NotFound,
}

/// Find and click the first element of `chain` that becomes available.
pub async fn activate_with_retry<D>(dom: &D, chain: &LocatorChain, policy: &RetryPolicy) -> Activation
where
    D: DomContext + ?Sized,
{
    let last_locator = chain.len().saturating_sub(1);

    for (locator_index, locator) in chain.iter().enumerate() {
        debug!("Trying activation locator {}", locator);

        for attempt in 1..=policy.max_attempts {
            match dom.activate(locator).await {
                Ok(true) => {
                    info!(
                        "Activated {} (locator {}/{}, attempt {})",
                        locator,
                        locator_index + 1,
                        chain.len(),
                        attempt
                    );
                    return Activation::Activated {
                        locator_index,
                        attempt,
                    };
                }
                Ok(false) => debug!("{} not present (attempt {})", locator, attempt),
                Err(e) => debug!("{} failed to evaluate (attempt {}): {}", locator, attempt, e),
            }

            let final_attempt = locator_index == last_locator && attempt == policy.max_attempts;
            if !final_attempt {
                tokio::time::sleep(policy.delay).await;
            }
        }
    }

    Activation::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Locator;
    use crate::test_support::FakeDom;
    use tokio::time::Instant;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    fn chain() -> LocatorChain {
        LocatorChain::new(vec![Locator::xpath("//primary"), Locator::xpath("//secondary")]).unwrap()
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn default_policy_matches_timing_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn first_locator_first_attempt() {
        let dom = FakeDom::new().with_clickable("//primary");
        let outcome = activate_with_retry(&dom, &chain(), &policy(2)).await;
        assert_eq!(
            outcome,
            Activation::Activated {
                locator_index: 0,
                attempt: 1
            }
        );
        assert_eq!(dom.activated(), vec!["//primary".to_string()]);
    }

    #[tokio::test]
    async fn element_that_appears_late_is_caught_by_retry() {
        let dom = FakeDom::new().with_clickable_after("//primary", 1);
        let outcome = activate_with_retry(&dom, &chain(), &policy(2)).await;
        assert_eq!(
            outcome,
            Activation::Activated {
                locator_index: 0,
                attempt: 2
            }
        );
    }

    #[tokio::test]
    async fn exhausts_attempts_before_advancing() {
        let dom = FakeDom::new().with_clickable("//secondary");
        let outcome = activate_with_retry(&dom, &chain(), &policy(3)).await;
        assert_eq!(
            outcome,
            Activation::Activated {
                locator_index: 1,
                attempt: 1
            }
        );
        assert_eq!(
            dom.activated(),
            vec![
                "//primary".to_string(),
                "//primary".to_string(),
                "//primary".to_string(),
                "//secondary".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn delay_follows_every_failed_attempt_but_the_last() {
        let delay = Duration::from_secs(1);

        let dom = FakeDom::new().with_clickable("//secondary");
        let started = Instant::now();
        activate_with_retry(&dom, &chain(), &RetryPolicy::new(3, delay)).await;
        // three misses on the primary, each followed by a wait
        assert_eq!(started.elapsed(), delay * 3);

        let dom = FakeDom::new();
        let started = Instant::now();
        let outcome = activate_with_retry(&dom, &chain(), &RetryPolicy::new(2, delay)).await;
        assert_eq!(outcome, Activation::NotFound);
        // four misses, no wait after the final one
        assert_eq!(started.elapsed(), delay * 3);
    }

    #[tokio::test]
    async fn not_found_after_every_entry_and_attempt() {
        let dom = FakeDom::new();
        let outcome = activate_with_retry(&dom, &chain(), &policy(2)).await;
        assert_eq!(outcome, Activation::NotFound);
        assert_eq!(dom.activated().len(), 4);
    }
}
