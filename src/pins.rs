//! PWM channel and bus assignments for the PetPal camera/dispenser head.
//!
//! Every controller references this module rather than hard-coding
//! channel numbers.
//!
//! Two PCA9685 boards are fitted:
//!
//! ```text
//!  /dev/i2c-3 ── PCA9685 @0x40 (camera)    ch0 = pan, ch1 = tilt
//!  /dev/i2c-1 ── PCA9685 @0x40 (dispense)  ch0..ch5 = treat motors
//! ```

// ---------------------------------------------------------------------------
// PCA9685 register map
// ---------------------------------------------------------------------------

/// Default 7-bit address (A0..A5 strapped low).
pub const PCA9685_ADDRESS: u8 = 0x40;
/// Mode register 1.
pub const MODE1: u8 = 0x00;
/// Prescaler for the PWM output frequency.
pub const PRESCALE: u8 = 0xFE;
/// First per-channel register; channel `n` starts at `LED0_ON_L + 4 * n`.
pub const LED0_ON_L: u8 = 0x06;
/// Hardware channel count.
pub const PCA9685_CHANNELS: u8 = 16;
/// Internal oscillator frequency (Hz).
pub const PCA9685_OSCILLATOR_HZ: u32 = 25_000_000;

// ---------------------------------------------------------------------------
// Camera gimbal (bank A)
// ---------------------------------------------------------------------------

/// Horizontal (left/right) axis.
pub const PAN_CHANNEL: u8 = 0;
/// Vertical (up/down) axis.
pub const TILT_CHANNEL: u8 = 1;

// ---------------------------------------------------------------------------
// Treat dispensers (bank B)
// ---------------------------------------------------------------------------

/// Channels of the dispense servos, indexed by motor slot.
pub const DISPENSE_CHANNELS: [u8; 6] = [0, 1, 2, 3, 4, 5];

/// Which PCA9685 a channel index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bank {
    Camera,
    Dispense,
}

/// Every (bank, channel) pair claimed by the gimbal.
pub const fn axis_channels() -> [(Bank, u8); 2] {
    [(Bank::Camera, PAN_CHANNEL), (Bank::Camera, TILT_CHANNEL)]
}

/// Every (bank, channel) pair claimed by a dispense motor.
pub fn dispense_channels() -> impl Iterator<Item = (Bank, u8)> {
    DISPENSE_CHANNELS.iter().map(|&ch| (Bank::Dispense, ch))
}
