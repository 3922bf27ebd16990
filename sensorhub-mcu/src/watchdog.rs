//! Liveness checks. A trip means the device restarts.

use crate::LivenessTrip;
use std::time::{Duration, Instant};

/// The connection task has to report back before the dwell deadline
pub fn check_task_finished(finished: bool) -> Result<(), LivenessTrip> {
    if finished {
        Ok(())
    } else {
        Err(LivenessTrip::StuckConnectionTask)
    }
}

/// Some reading has to reach the store within `window`
pub fn check_fresh(last_write: Instant, now: Instant, window: Duration) -> Result<(), LivenessTrip> {
    let idle = now.saturating_duration_since(last_write);
    if idle > window {
        Err(LivenessTrip::StaleData(idle.as_secs()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_after_window() {
        let start = Instant::now();
        let window = Duration::from_secs(600);
        assert!(check_fresh(start, start + Duration::from_secs(600), window).is_ok());
        assert_eq!(
            check_fresh(start, start + Duration::from_secs(601), window),
            Err(LivenessTrip::StaleData(601))
        );
        // clock skew never trips
        assert!(check_fresh(start + window, start, window).is_ok());
    }

    #[test]
    fn unfinished_task_is_stuck() {
        assert!(check_task_finished(true).is_ok());
        assert_eq!(check_task_finished(false), Err(LivenessTrip::StuckConnectionTask));
    }
}
