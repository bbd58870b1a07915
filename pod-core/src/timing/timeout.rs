use super::Millis;

/// Restartable one-shot countdown advanced by the periodic scheduler.
///
/// `elapsed` only advances while the timeout is started and saturates at
/// `duration`, so repeated ticks after expiry are no-ops.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Timeout {
    duration: Millis,
    elapsed: Millis,
    started: bool,
}

impl Timeout {
    /// Creates a stopped timeout with the supplied duration.
    #[must_use]
    pub const fn new(duration: Millis) -> Self {
        Self {
            duration,
            elapsed: 0,
            started: false,
        }
    }

    /// Re-arms the timeout and zeroes the elapsed time.
    ///
    /// Calling this while already running simply opens a fresh window.
    pub fn restart(&mut self) {
        self.started = true;
        self.elapsed = 0;
    }

    /// Starts the timeout unless it is already counting.
    pub fn ensure_started(&mut self) {
        if !self.started {
            self.restart();
        }
    }

    /// Stops the timeout and zeroes the elapsed time.
    pub fn reset(&mut self) {
        self.started = false;
        self.elapsed = 0;
    }

    /// Advances the timeout by `delta` milliseconds.
    pub fn tick(&mut self, delta: Millis) {
        if !self.started || self.expired() {
            return;
        }

        self.elapsed = self.elapsed.saturating_add(delta).min(self.duration);
    }

    /// Returns `true` once the elapsed time has reached the duration.
    ///
    /// A timeout that has never been started is not expired.
    #[must_use]
    pub const fn expired(&self) -> bool {
        self.started && self.elapsed >= self.duration
    }

    /// Returns `true` while the timeout is started and still counting.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.started && self.elapsed < self.duration
    }

    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    #[must_use]
    pub const fn duration(&self) -> Millis {
        self.duration
    }

    #[must_use]
    pub const fn elapsed(&self) -> Millis {
        self.elapsed
    }

    /// Milliseconds left before expiry, or the full duration when stopped.
    #[must_use]
    pub const fn remaining(&self) -> Millis {
        self.duration.saturating_sub(self.elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unstarted_timeout_ignores_ticks() {
        let mut timeout = Timeout::new(500);
        timeout.tick(1_000);

        assert_eq!(timeout.elapsed(), 0);
        assert!(!timeout.expired());
        assert!(!timeout.is_live());
    }

    #[test]
    fn elapsed_is_monotonic_and_saturates_at_duration() {
        let mut timeout = Timeout::new(1_000);
        timeout.restart();

        let mut previous = 0;
        for delta in [0, 100, 250, 333, 400, 100, 100] {
            timeout.tick(delta);
            assert!(timeout.elapsed() >= previous, "elapsed went backwards");
            assert!(timeout.elapsed() <= timeout.duration());
            previous = timeout.elapsed();
        }

        assert!(timeout.expired());
        assert_eq!(timeout.elapsed(), 1_000);

        timeout.tick(u32::MAX);
        assert_eq!(timeout.elapsed(), 1_000);
        assert!(timeout.expired());
    }

    #[test]
    fn restart_reopens_window_while_running() {
        let mut timeout = Timeout::new(300);
        timeout.restart();
        timeout.tick(200);
        timeout.restart();
        timeout.tick(200);

        assert!(!timeout.expired());
        assert_eq!(timeout.remaining(), 100);
    }

    #[test]
    fn reset_stops_counting_and_clears_expiry() {
        let mut timeout = Timeout::new(100);
        timeout.restart();
        timeout.tick(100);
        assert!(timeout.expired());

        timeout.reset();
        assert!(!timeout.expired());
        assert!(!timeout.is_started());
        timeout.tick(100);
        assert_eq!(timeout.elapsed(), 0);
    }

    #[test]
    fn ensure_started_keeps_running_window() {
        let mut timeout = Timeout::new(1_000);
        timeout.ensure_started();
        timeout.tick(600);
        timeout.ensure_started();

        assert_eq!(timeout.elapsed(), 600);
    }
}
