//! Time management — convert clock parameters to search limits.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use chess::Color;

use crate::search::control::SearchControl;

/// Compute soft and hard time limits from remaining time and increment.
///
/// Without an increment the engine budgets for ~30 more moves and caps the
/// hard limit at 12% of the clock; with one it budgets for ~25 moves, adds
/// most of the increment, and allows up to 25%.
pub fn compute_limits(
    remaining: Duration,
    increment: Duration,
    moves_to_go: Option<u32>,
) -> (Duration, Duration) {
    let remaining_ms = remaining.as_millis() as f64;

    if remaining_ms < 10.0 {
        let one_ms = Duration::from_millis(1);
        return (one_ms, one_ms);
    }

    let overhead = 10.0;
    let usable = (remaining_ms - overhead).max(1.0);
    let inc_ms = increment.as_millis() as f64;
    let has_increment = inc_ms > 0.0;

    let mtg = moves_to_go
        .unwrap_or(if has_increment { 25 } else { 30 })
        .max(1) as f64;

    let base = usable / mtg;
    let soft = if has_increment {
        base + inc_ms * 0.75
    } else {
        base
    };

    let hard_cap_pct = if has_increment { 0.25 } else { 0.12 };
    let hard = (usable * hard_cap_pct).max(soft);

    let soft = soft.min(usable).max(1.0);
    let hard = hard.min(usable).max(1.0);

    (
        Duration::from_millis(soft as u64),
        Duration::from_millis(hard as u64),
    )
}

/// Build a [`SearchControl`] from UCI `go` parameters and the side to move.
///
/// Priority order:
/// 1. `infinite` -> no time limits
/// 2. `movetime` -> soft budget of the given time, hard budget of twice it
/// 3. `wtime`/`btime` present -> [`compute_limits`]
/// 4. depth-only or bare `go` -> no time limits
#[allow(clippy::too_many_arguments)]
pub fn limits_from_go(
    wtime: Option<Duration>,
    btime: Option<Duration>,
    winc: Option<Duration>,
    binc: Option<Duration>,
    movestogo: Option<u32>,
    movetime: Option<Duration>,
    infinite: bool,
    side: Color,
    stopped: Arc<AtomicBool>,
) -> SearchControl {
    let (remaining, increment) = match side {
        Color::White => (wtime, winc),
        Color::Black => (btime, binc),
    };

    if infinite {
        return SearchControl::new_infinite(stopped);
    }

    if let Some(movetime) = movetime {
        return SearchControl::new_timed(stopped, movetime, movetime.saturating_mul(2));
    }

    if let Some(remaining) = remaining {
        let increment = increment.unwrap_or(Duration::ZERO);
        let (soft, hard) = compute_limits(remaining, increment, movestogo);
        return SearchControl::new_timed(stopped, soft, hard);
    }

    SearchControl::new_infinite(stopped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_increment_budgets_a_fraction_of_the_clock() {
        let (soft, hard) = compute_limits(Duration::from_secs(60), Duration::ZERO, None);
        assert!(soft >= Duration::from_millis(1_500));
        assert!(soft <= Duration::from_millis(2_500));
        assert!(hard >= soft);
    }

    #[test]
    fn increment_raises_the_budget() {
        let without = compute_limits(Duration::from_secs(60), Duration::ZERO, None).0;
        let with = compute_limits(Duration::from_secs(60), Duration::from_secs(2), None).0;
        assert!(with > without);
    }

    #[test]
    fn nearly_flagged_clock_returns_minimum() {
        let (soft, hard) = compute_limits(Duration::from_millis(5), Duration::ZERO, None);
        assert_eq!(soft, Duration::from_millis(1));
        assert_eq!(hard, Duration::from_millis(1));
    }

    #[test]
    fn moves_to_go_splits_the_clock() {
        let few = compute_limits(Duration::from_secs(60), Duration::ZERO, Some(2)).0;
        let many = compute_limits(Duration::from_secs(60), Duration::ZERO, Some(40)).0;
        assert!(few > many);
    }

    #[test]
    fn hard_limit_never_exceeds_the_clock() {
        let (_, hard) = compute_limits(Duration::from_secs(1), Duration::from_secs(30), None);
        assert!(hard <= Duration::from_secs(1));
    }
}
