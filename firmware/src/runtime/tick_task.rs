use embassy_time::{Duration, Ticker};
use pod_core::scheduler::{FAST_TICK_MS, SLOW_TICK_MS, TickCounters};

/// Fast ticks per slow tick.
const FAST_PER_SLOW: u32 = SLOW_TICK_MS / FAST_TICK_MS;

#[embassy_executor::task]
pub async fn run(ticks: &'static TickCounters) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(u64::from(FAST_TICK_MS)));
    let mut fast = 0;

    loop {
        ticker.next().await;
        ticks.tick_10ms();

        fast += 1;
        if fast == FAST_PER_SLOW {
            fast = 0;
            ticks.tick_100ms();
        }
    }
}
