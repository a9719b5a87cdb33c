//! Raspberry Pi hardware bring-up.
//!
//! Opens both PCA9685 boards through `linux-embedded-hal` and programs
//! them for servo frequency. This is the only module that touches
//! `/dev/i2c-*`; everything above it sees [`PulseOutput`] and
//! [`ServoOutput`](crate::app::ports::ServoOutput).
//!
//! [`PulseOutput`]: crate::app::ports::PulseOutput

use linux_embedded_hal::{Delay, I2cdev};
use log::{error, info};

use crate::config::{AgentConfig, PwmConfig};
use crate::drivers::pca9685::Pca9685;
use crate::drivers::servo::{PulseRange, ServoBank};
use crate::error::{Error, Result};
use crate::pins::Bank;

pub type LinuxPwm = Pca9685<I2cdev>;

/// Both actuator banks, initialised.
pub struct Hardware {
    /// Pan/tilt gimbal board.
    pub camera: LinuxPwm,
    /// Treat dispenser servos.
    pub dispense: ServoBank<LinuxPwm>,
}

/// Open and initialise the board for `bank`.
pub fn open_pwm(bank: Bank, cfg: &PwmConfig) -> Result<LinuxPwm> {
    let (path, address) = match bank {
        Bank::Camera => (&cfg.camera_bus, cfg.camera_address),
        Bank::Dispense => (&cfg.dispense_bus, cfg.dispense_address),
    };
    let bus = I2cdev::new(path).map_err(|e| {
        error!("Hardware: cannot open {}: {:?}", path, e);
        Error::Config("cannot open I2C device")
    })?;
    let mut pwm = Pca9685::new(bus, address);
    pwm.init(cfg.oscillator_hz, cfg.frequency_hz, &mut Delay)?;
    info!("Hardware: {:?} bank ready on {} @0x{:02X}", bank, path, address);
    Ok(pwm)
}

pub fn bring_up(cfg: &AgentConfig) -> Result<Hardware> {
    let camera = open_pwm(Bank::Camera, &cfg.pwm)?;
    let dispense = ServoBank::new(
        open_pwm(Bank::Dispense, &cfg.pwm)?,
        PulseRange::from_config(&cfg.dispense, cfg.pwm.frequency_hz),
        cfg.dispense.slots,
    );
    Ok(Hardware { camera, dispense })
}
