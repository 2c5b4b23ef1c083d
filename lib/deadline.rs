//! Wall-clock budgets for time-boxed contraction.

use std::time::{ Duration, Instant };

/// A start instant plus a budget, consulted by every long-running loop.
///
/// `Deadline` is `Copy`, so it is passed by value into strategies and their
/// worker threads.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Default for Deadline {
    fn default() -> Self { Self::from_secs(60.0) }
}

impl Deadline {
    /// Start a new deadline now, expiring after `budget`.
    pub fn new(budget: Duration) -> Self {
        Self { start: Instant::now(), budget }
    }

    /// Like [`Self::new`], with the budget in (fractional) seconds. Negative
    /// or non-finite inputs give an already-expired deadline.
    pub fn from_secs(secs: f64) -> Self {
        let budget =
            if secs.is_finite() && secs > 0.0 {
                Duration::from_secs_f64(secs)
            } else {
                Duration::ZERO
            };
        Self::new(budget)
    }

    /// A deadline that will not expire in any practical run.
    pub fn never() -> Self { Self::new(Duration::from_secs(u32::MAX as u64)) }

    /// Return `true` if the budget has been used up.
    pub fn expired(&self) -> bool { self.start.elapsed() >= self.budget }

    /// Time since the deadline was started.
    pub fn elapsed(&self) -> Duration { self.start.elapsed() }

    /// Time left before expiry, saturating at zero.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }

    /// The total budget.
    pub fn budget(&self) -> Duration { self.budget }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry() {
        let d = Deadline::from_secs(0.0);
        assert!(d.expired());
        assert_eq!(d.remaining(), Duration::ZERO);
        let d = Deadline::from_secs(-1.0);
        assert!(d.expired());
        let d = Deadline::from_secs(f64::NAN);
        assert!(d.expired());
        let d = Deadline::never();
        assert!(!d.expired());
        assert!(d.remaining() > Duration::from_secs(1000));
    }
}
