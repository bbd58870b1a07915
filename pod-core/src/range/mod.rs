//! Freshness tracking for the laser range finder output.
//!
//! Only the decoded output is consumed here. Each coarse tick without a new
//! sample ages the reading; more than [`RANGE_STALE_TICKS`] ticks marks it
//! stale.

/// Coarse ticks tolerated without a new sample (500 ms).
pub const RANGE_STALE_TICKS: u32 = 5;

/// Decoded range-finder output.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RangeSample {
    pub distance_mm: i32,
    pub velocity_mm_s: i32,
    pub accel_mm_ss: i32,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RangeMonitor {
    latest: Option<RangeSample>,
    ticks_since_sample: u32,
}

impl RangeMonitor {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latest: None,
            ticks_since_sample: 0,
        }
    }

    /// Stores a fresh sample and restarts the freshness window.
    pub fn record(&mut self, sample: RangeSample) {
        self.latest = Some(sample);
        self.ticks_since_sample = 0;
    }

    /// Ages the current sample by `count` coarse ticks.
    pub fn tick(&mut self, count: u32) {
        self.ticks_since_sample = self.ticks_since_sample.saturating_add(count);
    }

    #[must_use]
    pub const fn is_stale(&self) -> bool {
        self.ticks_since_sample > RANGE_STALE_TICKS
    }

    #[must_use]
    pub const fn latest(&self) -> Option<RangeSample> {
        self.latest
    }

    /// Fresh sample, if the freshness window has not lapsed.
    #[must_use]
    pub const fn fresh(&self) -> Option<RangeSample> {
        if self.is_stale() { None } else { self.latest }
    }

    /// Returns `true` for a fresh sample whose speed is at or below the threshold.
    ///
    /// Hosts use this to derive the `pod_stop_confirmed` guard.
    #[must_use]
    pub fn pod_stopped(&self, threshold_mm_s: u32) -> bool {
        self.fresh()
            .is_some_and(|sample| sample.velocity_mm_s.unsigned_abs() <= threshold_mm_s)
    }
}
