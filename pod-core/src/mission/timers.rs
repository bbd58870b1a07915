use super::PodState;
use crate::timing::{Millis, Timeout};

/// Backup timers owned by the mission sequencer, one per timed state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BackupTimer {
    Accel,
    CoastInterlock,
    BrakeToSpindown,
    SpindownToIdle,
}

/// All backup timers in index order.
pub const ALL_BACKUP_TIMERS: [BackupTimer; 4] = [
    BackupTimer::Accel,
    BackupTimer::CoastInterlock,
    BackupTimer::BrakeToSpindown,
    BackupTimer::SpindownToIdle,
];

impl BackupTimer {
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            BackupTimer::Accel => 0,
            BackupTimer::CoastInterlock => 1,
            BackupTimer::BrakeToSpindown => 2,
            BackupTimer::SpindownToIdle => 3,
        }
    }

    /// Returns the timer armed while the mission sits in `state`, if any.
    #[must_use]
    pub const fn for_state(state: PodState) -> Option<Self> {
        match state {
            PodState::Accel => Some(BackupTimer::Accel),
            PodState::CoastInterlock => Some(BackupTimer::CoastInterlock),
            PodState::Brake => Some(BackupTimer::BrakeToSpindown),
            PodState::Spindown => Some(BackupTimer::SpindownToIdle),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            BackupTimer::Accel => "accel",
            BackupTimer::CoastInterlock => "coast-interlock",
            BackupTimer::BrakeToSpindown => "brake-to-spindown",
            BackupTimer::SpindownToIdle => "spindown-to-idle",
        }
    }
}

/// Backup timer durations in milliseconds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MissionTimerConfig {
    pub accel_ms: Millis,
    pub coast_interlock_ms: Millis,
    pub brake_to_spindown_ms: Millis,
    pub spindown_to_idle_ms: Millis,
}

impl MissionTimerConfig {
    pub const DEFAULT: Self = Self {
        accel_ms: 10_000,
        coast_interlock_ms: 1_000,
        brake_to_spindown_ms: 60_000,
        spindown_to_idle_ms: 120_000,
    };

    #[must_use]
    pub const fn duration(&self, timer: BackupTimer) -> Millis {
        match timer {
            BackupTimer::Accel => self.accel_ms,
            BackupTimer::CoastInterlock => self.coast_interlock_ms,
            BackupTimer::BrakeToSpindown => self.brake_to_spindown_ms,
            BackupTimer::SpindownToIdle => self.spindown_to_idle_ms,
        }
    }
}

impl Default for MissionTimerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The four backup timeouts, indexed by [`BackupTimer`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BackupTimers {
    timers: [Timeout; 4],
}

impl BackupTimers {
    #[must_use]
    pub const fn new(config: MissionTimerConfig) -> Self {
        Self {
            timers: [
                Timeout::new(config.accel_ms),
                Timeout::new(config.coast_interlock_ms),
                Timeout::new(config.brake_to_spindown_ms),
                Timeout::new(config.spindown_to_idle_ms),
            ],
        }
    }

    #[must_use]
    pub const fn get(&self, timer: BackupTimer) -> &Timeout {
        &self.timers[timer.as_index()]
    }

    #[must_use]
    pub const fn expired(&self, timer: BackupTimer) -> bool {
        self.get(timer).expired()
    }

    /// Starts `timer` from zero and stops every other backup timer.
    pub(crate) fn arm_exclusive(&mut self, timer: BackupTimer) {
        for candidate in ALL_BACKUP_TIMERS {
            if candidate == timer {
                self.timers[candidate.as_index()].restart();
            } else {
                self.timers[candidate.as_index()].reset();
            }
        }
    }

    pub(crate) fn stop(&mut self, timer: BackupTimer) {
        self.timers[timer.as_index()].reset();
    }

    pub(crate) fn tick(&mut self, delta: Millis) {
        for timer in &mut self.timers {
            timer.tick(delta);
        }
    }

    /// Number of timers currently started, expired or not.
    #[must_use]
    pub fn started_count(&self) -> usize {
        self.timers.iter().filter(|timer| timer.is_started()).count()
    }

    /// Iterates `(timer, timeout)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (BackupTimer, &Timeout)> + '_ {
        ALL_BACKUP_TIMERS
            .iter()
            .copied()
            .map(move |timer| (timer, self.get(timer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arming_one_timer_stops_the_others() {
        let mut timers = BackupTimers::new(MissionTimerConfig::DEFAULT);
        timers.arm_exclusive(BackupTimer::Accel);
        timers.tick(500);
        timers.arm_exclusive(BackupTimer::CoastInterlock);

        assert_eq!(timers.started_count(), 1);
        assert!(!timers.get(BackupTimer::Accel).is_started());
        assert!(timers.get(BackupTimer::CoastInterlock).is_live());
    }

    #[test]
    fn timed_states_map_to_their_timer() {
        assert_eq!(BackupTimer::for_state(PodState::Brake), Some(BackupTimer::BrakeToSpindown));
        assert_eq!(BackupTimer::for_state(PodState::Ready), None);
    }
}
