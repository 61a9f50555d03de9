use nix::libc;

/// Time source contract for the duplex loop.
///
/// Time is expressed in frames at the sample rate given to `init`, counted
/// from the instant `init` was called. Implementations must be monotonic.
pub trait Clock {
    /// Establish the origin. `now()` at the instant of a successful init
    /// returns 0. Fails when the underlying time source is unavailable.
    fn init(&mut self, sample_rate: u32) -> bool;

    /// Current time in frames since the origin. Never decreases.
    fn now(&self) -> Option<i64>;

    /// Block until monotonic time has reached `deadline` frames. May
    /// overshoot by the scheduler quantum.
    fn sleep(&self, deadline: i64) -> bool;

    /// Convert a frame count to nanoseconds at the configured rate.
    fn frames_to_time(&self, frames: i64) -> i64;
}

/// Minimum transfer granularity the hardware advances per interrupt:
/// 16 frames at 48 kHz and below, 32 at 96 kHz, 64 at 192 kHz.
pub fn stepping_for_rate(sample_rate: u32) -> i64 {
    16_i64 * (1 + (sample_rate as i64 / 50_000))
}

/// CLOCK_MONOTONIC expressed in frame units.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    zero: libc::timespec,
    sample_rate: u32,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self {
            zero: libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
            sample_rate: 48_000,
        }
    }
}

impl Clock for FrameClock {
    fn init(&mut self, sample_rate: u32) -> bool {
        if sample_rate == 0 {
            return false;
        }
        self.sample_rate = sample_rate;
        unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut self.zero) == 0 }
    }

    fn now(&self) -> Option<i64> {
        let mut now = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        let ok = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut now) == 0 };
        if !ok {
            return None;
        }
        let ns = (now.tv_sec - self.zero.tv_sec) as i128 * 1_000_000_000_i128
            + (now.tv_nsec - self.zero.tv_nsec) as i128;
        Some(((ns * self.sample_rate as i128) / 1_000_000_000_i128) as i64)
    }

    fn sleep(&self, deadline: i64) -> bool {
        let ns = self.frames_to_time(deadline);
        let wake = libc::timespec {
            tv_sec: self.zero.tv_sec + (self.zero.tv_nsec + ns) / 1_000_000_000,
            tv_nsec: (self.zero.tv_nsec + ns) % 1_000_000_000,
        };
        loop {
            let rc = unsafe {
                libc::clock_nanosleep(
                    libc::CLOCK_MONOTONIC,
                    libc::TIMER_ABSTIME,
                    &wake,
                    std::ptr::null_mut(),
                )
            };
            if rc == 0 {
                return true;
            }
            if rc != libc::EINTR {
                return false;
            }
            // Interrupted before the deadline; the absolute deadline still
            // stands, so go back to sleep.
        }
    }

    fn frames_to_time(&self, frames: i64) -> i64 {
        frames.saturating_mul(1_000_000_000_i64) / self.sample_rate as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepping_doubles_with_rate() {
        assert_eq!(stepping_for_rate(44_100), 16);
        assert_eq!(stepping_for_rate(48_000), 16);
        assert_eq!(stepping_for_rate(96_000), 32);
        assert_eq!(stepping_for_rate(192_000), 64);
    }

    #[test]
    fn init_establishes_origin() {
        let mut clock = FrameClock::default();
        assert!(clock.init(48_000));
        let first = clock.now().expect("monotonic clock unavailable");
        assert!(first >= 0);
        // A 48 kHz frame is ~20 us; two reads must not go backwards.
        let second = clock.now().expect("monotonic clock unavailable");
        assert!(second >= first);
    }

    #[test]
    fn init_rejects_zero_rate() {
        let mut clock = FrameClock::default();
        assert!(!clock.init(0));
    }

    #[test]
    fn frames_to_time_at_48k() {
        let mut clock = FrameClock::default();
        assert!(clock.init(48_000));
        assert_eq!(clock.frames_to_time(48_000), 1_000_000_000);
        assert_eq!(clock.frames_to_time(1_024), 21_333_333);
    }

    #[test]
    fn sleep_reaches_deadline() {
        let mut clock = FrameClock::default();
        assert!(clock.init(48_000));
        // 96 frames = 2 ms; the sleep may overshoot but never undershoot.
        assert!(clock.sleep(96));
        let now = clock.now().expect("monotonic clock unavailable");
        assert!(now >= 96, "woke at {now} frames");
    }
}
