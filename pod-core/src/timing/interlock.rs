use super::{Millis, Timeout};

/// Behaviour of [`InterlockCommand::reset`] with respect to the enabled flag.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RelockPolicy {
    /// `reset` only disarms the window; `enabled` stays set.
    #[default]
    RetainEnabled,
    /// `reset` also clears `enabled`, so the next execution needs a fresh unlock.
    ClearOnReset,
}

/// Two-phase "arm, then confirm within the window" gate.
///
/// The first trigger calls [`unlock`](Self::unlock); a second trigger inside
/// the window observes [`is_unlocked`](Self::is_unlocked) and executes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InterlockCommand {
    window: Timeout,
    enabled: bool,
    policy: RelockPolicy,
}

impl InterlockCommand {
    /// Creates a locked interlock whose `reset` leaves `enabled` untouched.
    #[must_use]
    pub const fn new(window: Millis) -> Self {
        Self::with_policy(window, RelockPolicy::RetainEnabled)
    }

    /// Creates a locked interlock with an explicit relock policy.
    #[must_use]
    pub const fn with_policy(window: Millis, policy: RelockPolicy) -> Self {
        Self {
            window: Timeout::new(window),
            enabled: false,
            policy,
        }
    }

    /// Arms the interlock and opens a fresh confirmation window.
    pub fn unlock(&mut self) {
        self.enabled = true;
        self.window.restart();
    }

    /// Returns `true` while the interlock is armed and its window is open.
    #[must_use]
    pub const fn is_unlocked(&self) -> bool {
        self.enabled && !self.window.expired()
    }

    /// Disarms the confirmation window after the guarded action ran.
    pub fn reset(&mut self) {
        self.window.reset();
        if matches!(self.policy, RelockPolicy::ClearOnReset) {
            self.enabled = false;
        }
    }

    pub fn tick(&mut self, delta: Millis) {
        self.window.tick(delta);
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn policy(&self) -> RelockPolicy {
        self.policy
    }

    /// Returns the confirmation window timer.
    #[must_use]
    pub const fn window(&self) -> &Timeout {
        &self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_until_first_unlock() {
        let mut interlock = InterlockCommand::new(10_000);
        assert!(!interlock.is_unlocked());

        interlock.unlock();
        assert!(interlock.is_unlocked());
    }

    #[test]
    fn window_lapses_without_further_unlock() {
        let mut interlock = InterlockCommand::new(1_000);
        interlock.unlock();

        for _ in 0..9 {
            interlock.tick(100);
            assert!(interlock.is_unlocked());
        }

        interlock.tick(100);
        assert!(!interlock.is_unlocked());
        assert!(interlock.is_enabled(), "enabled survives window expiry");
    }

    #[test]
    fn repeated_unlock_only_rearms_window() {
        let mut interlock = InterlockCommand::new(1_000);
        interlock.unlock();
        interlock.tick(900);
        interlock.unlock();
        interlock.unlock();
        interlock.tick(900);

        assert!(interlock.is_unlocked());
        assert_eq!(interlock.window().elapsed(), 900);
    }

    #[test]
    fn retain_policy_keeps_gate_open_after_reset() {
        let mut interlock = InterlockCommand::new(1_000);
        interlock.unlock();
        interlock.reset();

        assert!(interlock.is_enabled());
        assert!(interlock.is_unlocked());

        interlock.tick(5_000);
        assert!(
            interlock.is_unlocked(),
            "a stopped window never expires under RetainEnabled"
        );
    }

    #[test]
    fn clear_policy_relocks_on_reset() {
        let mut interlock = InterlockCommand::with_policy(1_000, RelockPolicy::ClearOnReset);
        interlock.unlock();
        interlock.reset();

        assert!(!interlock.is_enabled());
        assert!(!interlock.is_unlocked());

        interlock.unlock();
        assert!(interlock.is_unlocked());
    }
}
