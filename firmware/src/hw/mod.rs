//! Brake sensor sampling on the STM32G0.
//!
//! Each actuator carries an extend and a retract limit switch (active low with
//! pull-ups) plus a magnetic linear position sensor read through ADC1. The
//! sampled values are handed to `pod-core` as [`BrakeFeedback`] once per
//! control cycle.

use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime};
use embassy_stm32::gpio::{Input, Level};
use embassy_stm32::peripherals::ADC1;
use pod_core::brakes::{BRAKE_COUNT, BrakeFeedback, LimitSwitch, LimitSwitches, SwitchState};

/// Inputs wired to one actuator.
pub struct ActuatorInputs<'d> {
    extend: Input<'d>,
    retract: Input<'d>,
    mlp: AnyAdcChannel<ADC1>,
    extend_level: Level,
    retract_level: Level,
}

impl<'d> ActuatorInputs<'d> {
    pub fn new(extend: Input<'d>, retract: Input<'d>, mlp: AnyAdcChannel<ADC1>) -> Self {
        let extend_level = extend.get_level();
        let retract_level = retract.get_level();
        Self {
            extend,
            retract,
            mlp,
            extend_level,
            retract_level,
        }
    }

    fn sample(&mut self, adc: &mut Adc<'_, ADC1>) -> BrakeFeedback {
        let switches = LimitSwitches {
            extend: read_switch(&self.extend, &mut self.extend_level),
            retract: read_switch(&self.retract, &mut self.retract_level),
        };
        BrakeFeedback {
            switches,
            mlp_sample: Some(adc.blocking_read(&mut self.mlp)),
        }
    }
}

/// ADC plus the inputs of both actuators, indexed like `BrakeId`.
pub struct BrakeSensors<'d> {
    adc: Adc<'d, ADC1>,
    actuators: [ActuatorInputs<'d>; BRAKE_COUNT],
}

impl<'d> BrakeSensors<'d> {
    pub fn new(mut adc: Adc<'d, ADC1>, left: ActuatorInputs<'d>, right: ActuatorInputs<'d>) -> Self {
        adc.set_sample_time(SampleTime::CYCLES160_5);
        Self {
            adc,
            actuators: [left, right],
        }
    }

    /// Samples both actuators; switch edges are latched between calls.
    pub fn sample(&mut self) -> [BrakeFeedback; BRAKE_COUNT] {
        let adc = &mut self.adc;
        self.actuators.each_mut().map(|inputs| inputs.sample(adc))
    }
}

fn read_switch(input: &Input<'_>, last: &mut Level) -> LimitSwitch {
    let level = input.get_level();
    let edge_seen = level != *last;
    *last = level;

    let state = match level {
        Level::Low => SwitchState::Closed,
        Level::High => SwitchState::Open,
    };
    LimitSwitch { state, edge_seen }
}
