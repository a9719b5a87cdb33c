//! Actuator controllers: gimbal motion, treat dispense, audio playback.
//!
//! Each controller exclusively owns the port it drives, so no locking is
//! needed around the PWM bus or the gimbal position.

pub mod dispense;
pub mod motion;
pub mod playback;
