//! Frame pacing for the capture loop.

use std::time::{Duration, Instant};

/// Keeps a running "next frame due" deadline.
///
/// The deadline advances by exactly one frame interval per tick regardless
/// of how late the tick ran, so pacing error never accumulates. When a tick
/// is behind schedule the loop proceeds immediately; it never sleeps a
/// negative duration.
#[derive(Debug)]
pub struct FramePacer {
    interval: Duration,
    next_due: Instant,
}

impl FramePacer {
    /// Create a pacer starting at `now` for the given frame rate.
    pub fn new(frame_rate: u32, now: Instant) -> Self {
        let interval = Duration::from_nanos(1_000_000_000 / frame_rate.max(1) as u64);
        Self {
            interval,
            next_due: now + interval,
        }
    }

    /// One frame interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How long to sleep before the next tick, if at all.
    ///
    /// Advances the deadline by one interval; returns `None` when the loop
    /// is already at or past the deadline.
    pub fn next_delay(&mut self, now: Instant) -> Option<Duration> {
        let due = self.next_due;
        self.next_due = due + self.interval;

        if now >= due {
            None
        } else {
            Some(due - now)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cumulative_sleep_matches_frame_cadence() {
        let rate = 30u32;
        let ticks = 90u32;
        let start = Instant::now();
        let mut pacer = FramePacer::new(rate, start);

        // Zero processing time: every tick sleeps, and the total equals
        // ticks/rate exactly.
        let mut now = start;
        let mut total = Duration::ZERO;
        for _ in 0..ticks {
            let delay = pacer.next_delay(now).expect("ahead of schedule");
            total += delay;
            now += delay;
        }

        assert_eq!(total, pacer.interval() * ticks);
    }

    #[test]
    fn test_behind_schedule_never_sleeps() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(10, start);

        // A tick that took three intervals is behind; the next few ticks
        // proceed immediately until the deadline catches up.
        let late = start + pacer.interval() * 3;
        assert_eq!(pacer.next_delay(late), None);
        assert_eq!(pacer.next_delay(late), None);
        assert_eq!(pacer.next_delay(late), None);
        assert!(pacer.next_delay(late).is_some());
    }

    #[test]
    fn test_no_drift_after_one_slow_tick() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(10, start);
        let interval = pacer.interval();

        // First tick on time.
        let mut now = start;
        now += pacer.next_delay(now).unwrap();
        // Second tick runs half an interval long; the remaining sleep
        // shrinks so the deadline stays fixed.
        now += interval / 2;
        let delay = pacer.next_delay(now).unwrap();
        assert_eq!(delay, interval / 2);
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        let pacer = FramePacer::new(0, Instant::now());
        assert_eq!(pacer.interval(), Duration::from_secs(1));
    }
}
