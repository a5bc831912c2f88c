use std::time::{Instant, SystemTime};

/// Returns the current unix timestamp (seconds elapsed since 1970-01-01).
#[inline]
pub fn timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs()
}

/// Monotonic clock used for pacing and statistics. Wraps a fixed epoch
/// `Instant` so elapsed time can be reported as a plain `f64` of seconds,
/// which is what the statistics sink and pacing math want.
#[derive(Clone)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    #[inline]
    pub fn new() -> Clock {
        Clock { epoch: Instant::now() }
    }

    /// Seconds elapsed since this clock was created, as a monotonic float.
    #[inline]
    pub fn now_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    #[inline]
    pub fn instant(&self) -> Instant {
        Instant::now()
    }
}

impl Default for Clock {
    fn default() -> Clock {
        Clock::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn now_secs_is_monotonic_and_nonzero_after_sleep() {
        let clock = Clock::new();
        let first = clock.now_secs();
        thread::sleep(Duration::from_millis(10));
        let second = clock.now_secs();

        assert!(second > first);
        assert!(second >= 0.010);
    }

    #[test]
    fn timestamp_secs_is_plausible() {
        // Anything after 2020-01-01 is a sane lower bound for "now".
        assert!(timestamp_secs() > 1_577_836_800);
    }
}
