//! Treat dispenser: one release → dwell → rest cycle per `command`.
//!
//! The rest write is unconditional. If the release write fails the dwell
//! is skipped but rest is still written; if the dwell unwinds, the
//! [`RestGuard`] writes rest on drop. Either way the first error wins.

use embedded_hal::delay::DelayNs;
use log::{debug, error, info};

use crate::app::ports::ServoOutput;
use crate::config::DispenseConfig;
use crate::error::{InvalidActuatorError, Result};

pub struct DispenseController<S, D> {
    servo: S,
    delay: D,
    cfg: DispenseConfig,
}

impl<S: ServoOutput, D: DelayNs> DispenseController<S, D> {
    pub fn new(servo: S, delay: D, cfg: DispenseConfig) -> Self {
        Self { servo, delay, cfg }
    }

    /// Run one dispense cycle on `motor_id`. Blocks for the dwell time.
    pub fn dispense(&mut self, motor_id: i64) -> Result<u8> {
        let slot = match u8::try_from(motor_id) {
            Ok(slot) if slot < self.servo.slot_count() => slot,
            _ => return Err(InvalidActuatorError::MotorSlot(motor_id).into()),
        };

        let mut guard = RestGuard {
            servo: &mut self.servo,
            slot,
            rest_deg: self.cfg.rest_deg,
            armed: true,
        };

        let released = guard.servo.set_angle(slot, self.cfg.release_deg);
        match released {
            Ok(()) => {
                debug!("Dispense: slot {} open, dwell {} ms", slot, self.cfg.dwell_ms);
                self.delay.delay_ms(self.cfg.dwell_ms);
            }
            Err(e) => error!("Dispense: release write on slot {} failed: {}", slot, e),
        }
        let rested = guard.rest();

        released.and(rested)?;
        info!("Dispense: slot {} cycled", slot);
        Ok(slot)
    }

    pub fn servo(&self) -> &S {
        &self.servo
    }

    pub fn servo_mut(&mut self) -> &mut S {
        &mut self.servo
    }
}

/// Returns a slot to its rest angle, either explicitly or on drop.
struct RestGuard<'a, S: ServoOutput> {
    servo: &'a mut S,
    slot: u8,
    rest_deg: u16,
    armed: bool,
}

impl<S: ServoOutput> RestGuard<'_, S> {
    fn rest(&mut self) -> Result<()> {
        self.armed = false;
        self.servo.set_angle(self.slot, self.rest_deg)
    }
}

impl<S: ServoOutput> Drop for RestGuard<'_, S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        error!("Dispense: cycle on slot {} interrupted, forcing rest", self.slot);
        if let Err(e) = self.servo.set_angle(self.slot, self.rest_deg) {
            error!("Dispense: rest write on slot {} failed: {}", self.slot, e);
        }
    }
}
