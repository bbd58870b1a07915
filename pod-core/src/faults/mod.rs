//! System-wide fault flags and the context memory guard.
//!
//! Faults never abort the control loop. They are latched into a [`FaultFlags`]
//! bitset that telemetry exports and that the next cycle's logic inspects.

use core::fmt;

/// Individual bits of the system fault bitset.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FaultFlag {
    /// Summary bit raised alongside every latching fault.
    General,
    /// Memory-guard canary mismatch in the flight-control context.
    GuardCorruption,
    /// A brake move was requested without a displacement-sensor sample.
    BrakeSensorUnavailable,
    /// The displacement sensor reported a gap outside the calibrated envelope.
    BrakeSensorOutOfRange,
    /// Both limit switches of an actuator reported closed.
    BrakeLimitConflict,
    /// Planner position and displacement sensor disagree.
    BrakePositionDisagreement,
    /// A brake move did not complete before its watchdog expired.
    BrakeMoveTimeout,
    /// A raw actuator move was attempted with the wrong development key.
    GuardKeyMismatch,
    /// The displacement sensor dropped out during a move.
    MlpDropout,
    /// No range-finder sample arrived within the freshness window.
    RangeSensorStale,
    /// A manual override moved an actuator.
    Modified,
}

impl FaultFlag {
    /// Bit position inside the exported bitset.
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            FaultFlag::General => 0,
            FaultFlag::GuardCorruption => 1,
            FaultFlag::BrakeSensorUnavailable => 2,
            FaultFlag::BrakeSensorOutOfRange => 3,
            FaultFlag::BrakeLimitConflict => 4,
            FaultFlag::BrakePositionDisagreement => 5,
            FaultFlag::BrakeMoveTimeout => 6,
            FaultFlag::GuardKeyMismatch => 7,
            FaultFlag::MlpDropout => 8,
            FaultFlag::RangeSensorStale => 9,
            FaultFlag::Modified => 31,
        }
    }

    /// Advisory flags do not raise [`FaultFlag::General`].
    #[must_use]
    pub const fn is_advisory(self) -> bool {
        matches!(
            self,
            FaultFlag::Modified | FaultFlag::MlpDropout | FaultFlag::RangeSensorStale
        )
    }

    const fn mask(self) -> u32 {
        1 << self.bit()
    }
}

impl fmt::Display for FaultFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FaultFlag::General => "general",
            FaultFlag::GuardCorruption => "guard-corruption",
            FaultFlag::BrakeSensorUnavailable => "brake-sensor-unavailable",
            FaultFlag::BrakeSensorOutOfRange => "brake-sensor-out-of-range",
            FaultFlag::BrakeLimitConflict => "brake-limit-conflict",
            FaultFlag::BrakePositionDisagreement => "brake-position-disagreement",
            FaultFlag::BrakeMoveTimeout => "brake-move-timeout",
            FaultFlag::GuardKeyMismatch => "guard-key-mismatch",
            FaultFlag::MlpDropout => "mlp-dropout",
            FaultFlag::RangeSensorStale => "range-sensor-stale",
            FaultFlag::Modified => "modified",
        };
        f.write_str(label)
    }
}

/// Every flag, in bit order.
pub const ALL_FAULT_FLAGS: [FaultFlag; 11] = [
    FaultFlag::General,
    FaultFlag::GuardCorruption,
    FaultFlag::BrakeSensorUnavailable,
    FaultFlag::BrakeSensorOutOfRange,
    FaultFlag::BrakeLimitConflict,
    FaultFlag::BrakePositionDisagreement,
    FaultFlag::BrakeMoveTimeout,
    FaultFlag::GuardKeyMismatch,
    FaultFlag::MlpDropout,
    FaultFlag::RangeSensorStale,
    FaultFlag::Modified,
];

/// Latching fault bitset exported with every telemetry snapshot.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct FaultFlags(u32);

impl FaultFlags {
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Latches `flag`, plus [`FaultFlag::General`] for non-advisory flags.
    ///
    /// Returns `true` when the flag was not already set.
    pub fn raise(&mut self, flag: FaultFlag) -> bool {
        let fresh = !self.contains(flag);
        self.0 |= flag.mask();
        if !flag.is_advisory() {
            self.0 |= FaultFlag::General.mask();
        }
        fresh
    }

    pub fn clear(&mut self, flag: FaultFlag) {
        self.0 &= !flag.mask();
    }

    pub fn clear_all(&mut self) {
        self.0 = 0;
    }

    #[must_use]
    pub const fn contains(&self, flag: FaultFlag) -> bool {
        self.0 & flag.mask() != 0
    }

    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterates the flags currently raised, in bit order.
    pub fn iter(&self) -> impl Iterator<Item = FaultFlag> + '_ {
        ALL_FAULT_FLAGS
            .iter()
            .copied()
            .filter(move |flag| self.contains(*flag))
    }
}

impl fmt::Display for FaultFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }

        for (index, flag) in self.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{flag}")?;
        }
        Ok(())
    }
}

/// Canary words placed inside the flight-control context.
pub const GUARD_WORD_HEAD: u32 = 0xAABB_CCDD;
pub const GUARD_WORD_TAIL: u32 = 0x1234_5678;

/// Pair of canary words checked at the top of every process cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryGuard {
    head: u32,
    tail: u32,
}

impl MemoryGuard {
    #[must_use]
    pub const fn new() -> Self {
        Self::from_words(GUARD_WORD_HEAD, GUARD_WORD_TAIL)
    }

    /// Builds a guard from arbitrary words, used to model a corrupted context.
    #[must_use]
    pub const fn from_words(head: u32, tail: u32) -> Self {
        Self { head, tail }
    }

    #[must_use]
    pub const fn is_intact(&self) -> bool {
        self.head == GUARD_WORD_HEAD && self.tail == GUARD_WORD_TAIL
    }
}

impl Default for MemoryGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latching_flag_raises_general() {
        let mut flags = FaultFlags::new();
        assert!(flags.raise(FaultFlag::BrakeLimitConflict));
        assert!(flags.contains(FaultFlag::General));
        assert!(!flags.raise(FaultFlag::BrakeLimitConflict));
    }

    #[test]
    fn advisory_flags_leave_general_clear() {
        let mut flags = FaultFlags::new();
        flags.raise(FaultFlag::Modified);
        flags.raise(FaultFlag::MlpDropout);

        assert!(!flags.contains(FaultFlag::General));
        assert_eq!(flags.bits(), (1 << 31) | (1 << 8));
    }

    #[test]
    fn display_lists_raised_flags_in_bit_order() {
        let mut flags = FaultFlags::new();
        flags.raise(FaultFlag::GuardKeyMismatch);

        let mut rendered = heapless::String::<64>::new();
        core::fmt::write(&mut rendered, format_args!("{flags}")).expect("format");
        assert_eq!(rendered.as_str(), "general,guard-key-mismatch");
    }

    #[test]
    fn guard_detects_corrupted_words() {
        assert!(MemoryGuard::new().is_intact());
        assert!(!MemoryGuard::from_words(GUARD_WORD_HEAD, 0).is_intact());
    }
}
