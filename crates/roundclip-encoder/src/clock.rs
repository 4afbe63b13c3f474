//! Drift-free sample timestamps.

/// Media Foundation's fixed-point clock rate: 100ns ticks per second.
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// Produces per-frame sample time and duration in 100ns ticks.
///
/// `TICKS_PER_SECOND / fps` rarely divides evenly; the fractional remainder
/// is carried between frames so the accumulated timestamp never drifts from
/// wall-clock over a long recording.
#[derive(Debug)]
pub struct SampleClock {
    frame_rate: u64,
    base_ticks: u64,
    remainder: u64,
    carry: u64,
    next_time: u64,
}

impl SampleClock {
    /// Create a clock for the given frame rate (must be non-zero).
    pub fn new(frame_rate: u32) -> Self {
        let frame_rate = frame_rate.max(1) as u64;
        Self {
            frame_rate,
            base_ticks: TICKS_PER_SECOND / frame_rate,
            remainder: TICKS_PER_SECOND % frame_rate,
            carry: 0,
            next_time: 0,
        }
    }

    /// Sample time and duration for the next frame, in ticks.
    pub fn next_sample(&mut self) -> (i64, i64) {
        self.carry += self.remainder;
        let mut duration = self.base_ticks;
        if self.carry >= self.frame_rate {
            self.carry -= self.frame_rate;
            duration += 1;
        }

        let time = self.next_time;
        self.next_time += duration;

        (time as i64, duration as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_starts_at_zero() {
        let mut clock = SampleClock::new(30);
        let (time, duration) = clock.next_sample();
        assert_eq!(time, 0);
        assert!(duration == 333_333 || duration == 333_334);
    }

    #[test]
    fn test_even_rate_has_constant_duration() {
        let mut clock = SampleClock::new(10);
        for i in 0..100 {
            let (time, duration) = clock.next_sample();
            assert_eq!(duration, 1_000_000);
            assert_eq!(time, i * 1_000_000);
        }
    }

    #[test]
    fn test_one_second_of_frames_sums_exactly() {
        for fps in [7u32, 24, 30, 60, 144, 239] {
            let mut clock = SampleClock::new(fps);
            let total: i64 = (0..fps).map(|_| clock.next_sample().1).sum();
            assert_eq!(total as u64, TICKS_PER_SECOND, "fps={fps}");
        }
    }

    #[test]
    fn test_no_drift_over_long_run() {
        let mut clock = SampleClock::new(24);
        let mut last_end = 0i64;
        for _ in 0..24 * 3600 {
            let (time, duration) = clock.next_sample();
            assert_eq!(time, last_end);
            last_end = time + duration;
        }
        // One hour of 24fps frames is exactly one hour of ticks.
        assert_eq!(last_end as u64, 3600 * TICKS_PER_SECOND);
    }
}
