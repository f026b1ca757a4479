//! Scoped timeout budgets.
//!
//! A [`TimeoutManager`] is created per logical operation. Single-phase
//! managers hold one deadline for one request; multi-phase managers hold an
//! overall budget spanning a poll loop, from which each per-poll fetch budget
//! is advanced. `advance()` returns the next fetch budget together with the
//! typed timeout-error maker for whichever budget binds.

use super::fetch::MkTimeoutError;
use crate::error::{Error, TimeoutCategory};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-operation timeout state. Cheap to construct; never shared.
#[derive(Debug, Clone)]
pub struct TimeoutManager {
    started: Instant,
    category: TimeoutCategory,
    request_budget: Duration,
    overall_budget: Option<Duration>,
}

impl TimeoutManager {
    /// One deadline used for one request (or several sequential requests each
    /// getting the full budget).
    #[must_use]
    pub fn single_phase(category: TimeoutCategory, request_budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            category,
            request_budget,
            overall_budget: None,
        }
    }

    /// An overall budget spanning a poll loop; per-poll fetch budgets advance
    /// from what remains.
    #[must_use]
    pub fn multi_phase(
        category: TimeoutCategory,
        request_budget: Duration,
        overall_budget: Duration,
    ) -> Self {
        Self {
            started: Instant::now(),
            category,
            request_budget,
            overall_budget: Some(overall_budget),
        }
    }

    /// Time since the operation began.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Remaining overall budget; `None` for single-phase managers.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.overall_budget
            .map(|overall| overall.saturating_sub(self.elapsed()))
    }

    /// Returns the budget for the next request and the error maker to hand
    /// the transport.
    ///
    /// # Errors
    ///
    /// Raises the typed timeout error synchronously when the overall budget
    /// is already exhausted, before any request is made.
    pub fn advance(&self) -> Result<(Duration, MkTimeoutError), Error> {
        let elapsed = self.elapsed();

        let (budget, category, reported_budget) = match self.overall_budget {
            Some(overall) => {
                let remaining = overall.saturating_sub(elapsed);
                if remaining.is_zero() {
                    return Err(Error::timeout(self.category, elapsed, overall));
                }
                if remaining < self.request_budget {
                    // The overall budget binds this fetch.
                    (remaining, self.category, overall)
                } else {
                    (self.request_budget, TimeoutCategory::Request, self.request_budget)
                }
            }
            None => (self.request_budget, self.category, self.request_budget),
        };

        let started = self.started;
        let maker: MkTimeoutError = Arc::new(move |_fetch_elapsed| {
            Error::timeout(category, started.elapsed(), reported_budget)
        });
        Ok((budget, maker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_phase_always_returns_full_budget() {
        let manager =
            TimeoutManager::single_phase(TimeoutCategory::Request, Duration::from_secs(10));
        let (first, _) = manager.advance().unwrap();
        let (second, _) = manager.advance().unwrap();
        assert_eq!(first, Duration::from_secs(10));
        assert_eq!(second, Duration::from_secs(10));
        assert!(manager.remaining().is_none());
    }

    #[test]
    fn test_multi_phase_remaining_is_monotone() {
        let manager = TimeoutManager::multi_phase(
            TimeoutCategory::Provisioning,
            Duration::from_secs(10),
            Duration::from_secs(600),
        );
        let first = manager.remaining().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let second = manager.remaining().unwrap();
        assert!(second <= first);
    }

    #[test]
    fn test_exhausted_budget_raises_before_fetch() {
        let manager = TimeoutManager::multi_phase(
            TimeoutCategory::Provisioning,
            Duration::from_secs(10),
            Duration::ZERO,
        );
        let err = match manager.advance() {
            Err(e) => e,
            Ok(_) => panic!("expected advance() to fail"),
        };
        match err {
            Error::Timeout { category, .. } => {
                assert_eq!(category, TimeoutCategory::Provisioning);
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_request_budget_binds_when_overall_is_ample() {
        let manager = TimeoutManager::multi_phase(
            TimeoutCategory::DatabaseAdmin,
            Duration::from_secs(10),
            Duration::from_secs(600),
        );
        let (budget, maker) = manager.advance().unwrap();
        assert_eq!(budget, Duration::from_secs(10));
        match maker(Duration::from_secs(10)) {
            Error::Timeout { category, .. } => assert_eq!(category, TimeoutCategory::Request),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_overall_budget_binds_near_exhaustion() {
        let manager = TimeoutManager::multi_phase(
            TimeoutCategory::Provisioning,
            Duration::from_secs(60),
            Duration::from_millis(20),
        );
        let (budget, maker) = manager.advance().unwrap();
        assert!(budget <= Duration::from_millis(20));
        match maker(budget) {
            Error::Timeout { category, budget, .. } => {
                assert_eq!(category, TimeoutCategory::Provisioning);
                assert_eq!(budget, Duration::from_millis(20));
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }
}
