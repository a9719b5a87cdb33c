//! PCA9685 16-channel, 12-bit PWM controller driver.
//!
//! Converts a logical channel + on/off tick pair into one auto-incremented
//! I2C write of the channel's four LEDn registers.
//!
//! ## Bring-up contract
//!
//! The prescaler can only be written while the oscillator is asleep, so
//! [`Pca9685::init`] always runs the full sequence: normal mode → read
//! MODE1 → sleep → PRESCALE → restore MODE1 → wait ≥ 5 ms → restart with
//! auto-increment. Skipping or reordering a step leaves the controller at
//! its power-on 200 Hz.
//!
//! ## Dual-target design
//!
//! Generic over [`embedded_hal::i2c::I2c`]: on the Pi this is
//! `linux_embedded_hal::I2cdev`, in tests a recording mock bus.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as I2cError, I2c};
use log::{debug, info};

use crate::app::ports::PulseOutput;
use crate::error::{BusWriteError, Error, InvalidActuatorError, Result};
use crate::pins::{LED0_ON_L, MODE1, PCA9685_CHANNELS, PRESCALE};

/// MODE1: respond to the all-call address.
const MODE1_ALLCALL: u8 = 0x01;
/// MODE1: oscillator off.
const MODE1_SLEEP: u8 = 0x10;
/// MODE1: register auto-increment.
const MODE1_AI: u8 = 0x20;
/// MODE1: restart PWM channels after sleep.
const MODE1_RESTART: u8 = 0x80;

/// Oscillator stabilisation time after leaving sleep (datasheet: 500 µs;
/// 5 ms leaves margin for slow buses).
const OSC_SETTLE_MS: u32 = 5;

/// Largest value of the 12-bit on/off counters.
pub const MAX_TICK: u16 = 4095;

/// Compute the PRESCALE register value for `frequency_hz`:
/// `round(oscillator / (4096 × frequency)) − 1`.
///
/// The hardware clamps prescale to 3..=255; values outside that window are
/// a configuration error rather than a silent clamp.
pub fn prescale_for(oscillator_hz: u32, frequency_hz: u32) -> Result<u8> {
    if frequency_hz == 0 {
        return Err(Error::Config("PWM frequency is zero"));
    }
    let denom = 4096u64 * u64::from(frequency_hz);
    let rounded = (u64::from(oscillator_hz) + denom / 2) / denom;
    match rounded.checked_sub(1) {
        Some(p) if (3..=255).contains(&p) => Ok(p as u8),
        _ => Err(Error::Config("PWM frequency outside prescaler range")),
    }
}

/// Driver for one PCA9685 on an I2C bus.
pub struct Pca9685<I2C> {
    i2c: I2C,
    address: u8,
    prescale: Option<u8>,
}

impl<I2C: I2c> Pca9685<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            prescale: None,
        }
    }

    /// Program the output frequency and enable auto-increment.
    ///
    /// Must be called once before any [`PulseOutput::set_pulse`].
    pub fn init(
        &mut self,
        oscillator_hz: u32,
        frequency_hz: u32,
        delay: &mut impl DelayNs,
    ) -> Result<()> {
        // Validate before touching the bus.
        let prescale = prescale_for(oscillator_hz, frequency_hz)?;

        self.write_register(MODE1, 0x00)?;
        let old_mode = self.read_register(MODE1)?;
        let sleep_mode = (old_mode & !MODE1_RESTART) | MODE1_SLEEP;
        self.write_register(MODE1, sleep_mode)?;
        self.write_register(PRESCALE, prescale)?;
        self.write_register(MODE1, old_mode)?;
        delay.delay_ms(OSC_SETTLE_MS);
        self.write_register(MODE1, old_mode | MODE1_RESTART | MODE1_AI | MODE1_ALLCALL)?;

        self.prescale = Some(prescale);
        info!(
            "PCA9685@0x{:02X}: {} Hz (prescale {})",
            self.address, frequency_hz, prescale
        );
        Ok(())
    }

    /// Prescale written by the last successful [`init`](Self::init).
    pub fn prescale(&self) -> Option<u8> {
        self.prescale
    }

    /// Give the bus back (tests inspect the mock through this).
    pub fn release(self) -> I2C {
        self.i2c
    }

    pub fn bus(&self) -> &I2C {
        &self.i2c
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|e| bus_error(register, &e))
    }

    fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(|e| bus_error(register, &e))?;
        Ok(buf[0])
    }
}

fn bus_error(register: u8, e: &impl I2cError) -> Error {
    Error::Bus(BusWriteError {
        register,
        kind: e.kind(),
    })
}

impl<I2C: I2c> PulseOutput for Pca9685<I2C> {
    fn set_pulse(&mut self, channel: u8, on_tick: u16, off_tick: u16) -> Result<()> {
        if channel >= PCA9685_CHANNELS {
            return Err(InvalidActuatorError::Channel(channel).into());
        }
        for tick in [on_tick, off_tick] {
            if tick > MAX_TICK {
                return Err(InvalidActuatorError::PulseOutOfRange(tick).into());
            }
        }

        let register = LED0_ON_L + 4 * channel;
        let [on_l, on_h] = on_tick.to_le_bytes();
        let [off_l, off_h] = off_tick.to_le_bytes();
        self.i2c
            .write(self.address, &[register, on_l, on_h, off_l, off_h])
            .map_err(|e| bus_error(register, &e))?;
        debug!("PCA9685@0x{:02X}: ch{} on={} off={}", self.address, channel, on_tick, off_tick);
        Ok(())
    }
}
