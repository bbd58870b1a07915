//! Two-rate tick accounting between the timer interrupts and the main loop.
//!
//! The 10 ms and 100 ms interrupts only bump saturating counters here; the
//! main loop is the single consumer and drains both once per cycle. No state
//! transition is ever taken from interrupt context.

use portable_atomic::{AtomicU32, Ordering};

use crate::timing::Millis;

/// Period of the fine tick.
pub const FAST_TICK_MS: Millis = 10;
/// Period of the coarse tick.
pub const SLOW_TICK_MS: Millis = 100;

/// Tick counts drained by the main loop for one cycle.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ElapsedTicks {
    pub fast: u32,
    pub slow: u32,
}

impl ElapsedTicks {
    pub const NONE: Self = Self { fast: 0, slow: 0 };

    #[must_use]
    pub const fn new(fast: u32, slow: u32) -> Self {
        Self { fast, slow }
    }

    /// Only coarse ticks; the shape produced by a 100 ms-only test harness.
    #[must_use]
    pub const fn slow(count: u32) -> Self {
        Self::new(0, count)
    }

    #[must_use]
    pub const fn fast_ms(&self) -> Millis {
        self.fast.saturating_mul(FAST_TICK_MS)
    }

    #[must_use]
    pub const fn slow_ms(&self) -> Millis {
        self.slow.saturating_mul(SLOW_TICK_MS)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fast == 0 && self.slow == 0
    }
}

/// Interrupt-written tick counters.
#[derive(Debug)]
pub struct TickCounters {
    fast: AtomicU32,
    slow: AtomicU32,
}

impl TickCounters {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fast: AtomicU32::new(0),
            slow: AtomicU32::new(0),
        }
    }

    /// Called from the 10 ms timer interrupt.
    pub fn tick_10ms(&self) {
        saturating_increment(&self.fast);
    }

    /// Called from the 100 ms timer interrupt.
    pub fn tick_100ms(&self) {
        saturating_increment(&self.slow);
    }

    /// Takes every pending tick; only the main loop may call this.
    pub fn drain(&self) -> ElapsedTicks {
        ElapsedTicks {
            fast: self.fast.swap(0, Ordering::AcqRel),
            slow: self.slow.swap(0, Ordering::AcqRel),
        }
    }

    /// Pending ticks without consuming them.
    pub fn pending(&self) -> ElapsedTicks {
        ElapsedTicks {
            fast: self.fast.load(Ordering::Acquire),
            slow: self.slow.load(Ordering::Acquire),
        }
    }
}

impl Default for TickCounters {
    fn default() -> Self {
        Self::new()
    }
}

fn saturating_increment(counter: &AtomicU32) {
    // `checked_add` returning `None` leaves a saturated counter untouched.
    let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |value| {
        value.checked_add(1)
    });
}
