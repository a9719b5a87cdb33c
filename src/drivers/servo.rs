//! Angle-addressed servo bank on top of a 12-bit PWM controller.
//!
//! Maps `(slot, degrees)` to an off-tick using a linear pulse-width range
//! (500–2500 µs over 180° for the dispenser servos) at the controller's
//! programmed frequency. Slots index into
//! [`DISPENSE_CHANNELS`](crate::pins::DISPENSE_CHANNELS).

use crate::app::ports::{PulseOutput, ServoOutput};
use crate::config::DispenseConfig;
use crate::error::{InvalidActuatorError, Result};
use crate::pins;

/// Pulse-width calibration shared by every servo on the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseRange {
    pub min_us: u16,
    pub max_us: u16,
    pub actuation_range_deg: u16,
    pub frequency_hz: u32,
}

impl PulseRange {
    pub fn from_config(cfg: &DispenseConfig, frequency_hz: u32) -> Self {
        Self {
            min_us: cfg.min_pulse_us,
            max_us: cfg.max_pulse_us,
            actuation_range_deg: cfg.actuation_range_deg,
            frequency_hz,
        }
    }

    /// Off-tick for `degrees`, or an error beyond the actuation range.
    pub fn ticks_for(&self, degrees: u16) -> Result<u16> {
        if degrees > self.actuation_range_deg {
            return Err(InvalidActuatorError::Angle(degrees).into());
        }
        let span = u64::from(self.max_us - self.min_us);
        let pulse_us = u64::from(self.min_us)
            + span * u64::from(degrees) / u64::from(self.actuation_range_deg);
        // ticks = pulse / period × 4096, rounded
        let ticks = (pulse_us * 4096 * u64::from(self.frequency_hz) + 500_000) / 1_000_000;
        Ok(ticks.min(u64::from(crate::drivers::pca9685::MAX_TICK)) as u16)
    }
}

/// Servos on consecutive dispense channels of one PWM controller.
pub struct ServoBank<P> {
    output: P,
    range: PulseRange,
    slots: u8,
}

impl<P: PulseOutput> ServoBank<P> {
    pub fn new(output: P, range: PulseRange, slots: u8) -> Self {
        let slots = slots.min(pins::DISPENSE_CHANNELS.len() as u8);
        Self { output, range, slots }
    }

    pub fn output(&self) -> &P {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut P {
        &mut self.output
    }
}

impl<P: PulseOutput> ServoOutput for ServoBank<P> {
    fn slot_count(&self) -> u8 {
        self.slots
    }

    fn set_angle(&mut self, slot: u8, degrees: u16) -> Result<()> {
        if slot >= self.slots {
            return Err(InvalidActuatorError::MotorSlot(i64::from(slot)).into());
        }
        let ticks = self.range.ticks_for(degrees)?;
        self.output
            .set_pulse(pins::DISPENSE_CHANNELS[slot as usize], 0, ticks)
    }
}
