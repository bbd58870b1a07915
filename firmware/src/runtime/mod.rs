use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::gpio::{Input, Pull};
use embassy_sync::channel::Channel;
use pod_core::scheduler::TickCounters;
use static_cell::StaticCell;

use crate::console::ConsoleQueue;
use crate::hw::{ActuatorInputs, BrakeSensors};
use crate::usb;

mod control_task;
mod tick_task;
mod usb_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static TICKS: TickCounters = TickCounters::new();
pub(super) static CONSOLE_RX_QUEUE: ConsoleQueue = Channel::new();
pub(super) static CONSOLE_TX_QUEUE: ConsoleQueue = Channel::new();
pub(super) static USB_STORAGE: StaticCell<usb::UsbDeviceStorage> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        ADC1,
        PA0,
        PA1,
        PB3,
        PB4,
        PB5,
        PB6,
        USB,
        PA11,
        PA12,
        ..
    } = hal::init(config);

    let sensors = BrakeSensors::new(
        Adc::new(ADC1),
        ActuatorInputs::new(
            Input::new(PB3, Pull::Up),
            Input::new(PB4, Pull::Up),
            PA0.degrade_adc(),
        ),
        ActuatorInputs::new(
            Input::new(PB5, Pull::Up),
            Input::new(PB6, Pull::Up),
            PA1.degrade_adc(),
        ),
    );

    spawner
        .spawn(tick_task::run(&TICKS))
        .expect("failed to spawn tick task");

    spawner
        .spawn(control_task::run(sensors))
        .expect("failed to spawn control task");

    spawner
        .spawn(usb_task::run(USB, PA12, PA11))
        .expect("failed to spawn USB task");

    core::future::pending::<()>().await;
}
