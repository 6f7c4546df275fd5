//! Search control — stop flag and wall-clock budget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Controls when a search should stop.
///
/// Two budgets:
/// - **soft**: checked between iterative-deepening iterations; exceeding it
///   means "don't start another depth unless the score is still unstable".
/// - **hard**: checked inside the search (every 2048 nodes); exceeding it
///   aborts the current iteration outright.
///
/// An infinite control has no budgets and only responds to the external
/// stop flag (UCI `stop`).
pub struct SearchControl {
    stopped: Arc<AtomicBool>,
    start: Instant,
    soft_limit: Option<Duration>,
    hard_limit: Option<Duration>,
}

impl SearchControl {
    /// Create a control with no time budget (`go infinite` / fixed depth).
    pub fn new_infinite(stopped: Arc<AtomicBool>) -> Self {
        Self {
            stopped,
            start: Instant::now(),
            soft_limit: None,
            hard_limit: None,
        }
    }

    /// Create a control with soft and hard budgets; the clock starts now.
    pub fn new_timed(stopped: Arc<AtomicBool>, soft: Duration, hard: Duration) -> Self {
        Self {
            stopped,
            start: Instant::now(),
            soft_limit: Some(soft),
            hard_limit: Some(hard.max(soft)),
        }
    }

    /// Whether an external stop has been requested (or a hard timeout
    /// already converted into one).
    pub fn stop_requested(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Check whether the search should abort immediately.
    ///
    /// The clock is consulted only every 2048 nodes; when the hard limit
    /// fires the stop flag is set so every subsequent call is cheap.
    pub fn should_stop(&self, nodes: u64) -> bool {
        if self.stopped.load(Ordering::Relaxed) {
            return true;
        }

        if nodes & 2047 != 0 {
            return false;
        }

        if self.hard_exceeded() {
            self.stopped.store(true, Ordering::Release);
            return true;
        }

        false
    }

    /// Whether the soft budget has been spent.
    pub fn soft_exceeded(&self) -> bool {
        match self.soft_limit {
            Some(soft) => self.elapsed() >= soft,
            None => false,
        }
    }

    /// Whether the hard budget has been spent (unconditional clock read).
    pub fn hard_exceeded(&self) -> bool {
        match self.hard_limit {
            Some(hard) => self.elapsed() >= hard,
            None => false,
        }
    }

    /// Elapsed time since the control was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Reference to the shared stop flag.
    pub fn stop_flag(&self) -> &Arc<AtomicBool> {
        &self.stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinite_control_never_times_out() {
        let stopped = Arc::new(AtomicBool::new(false));
        let control = SearchControl::new_infinite(stopped);
        assert!(!control.should_stop(2048));
        assert!(!control.soft_exceeded());
        assert!(!control.hard_exceeded());
    }

    #[test]
    fn stop_flag_wins_immediately() {
        let stopped = Arc::new(AtomicBool::new(true));
        let control = SearchControl::new_infinite(stopped);
        assert!(control.should_stop(1));
        assert!(control.stop_requested());
    }

    #[test]
    fn zero_hard_budget_stops_at_poll_boundary() {
        let stopped = Arc::new(AtomicBool::new(false));
        let control =
            SearchControl::new_timed(Arc::clone(&stopped), Duration::ZERO, Duration::ZERO);
        // Off-boundary node counts skip the clock.
        assert!(!control.should_stop(1));
        // A poll boundary reads the clock and latches the stop flag.
        assert!(control.should_stop(2048));
        assert!(stopped.load(Ordering::Relaxed));
    }

    #[test]
    fn soft_limit_does_not_set_stop_flag() {
        let stopped = Arc::new(AtomicBool::new(false));
        let control = SearchControl::new_timed(
            Arc::clone(&stopped),
            Duration::ZERO,
            Duration::from_secs(60),
        );
        assert!(control.soft_exceeded());
        assert!(!control.stop_requested());
    }

    #[test]
    fn hard_limit_never_below_soft() {
        let stopped = Arc::new(AtomicBool::new(false));
        let control = SearchControl::new_timed(
            stopped,
            Duration::from_secs(10),
            Duration::from_secs(1),
        );
        // Constructor lifts hard to at least soft.
        assert!(!control.hard_exceeded());
    }
}
