//! Hardware drivers.
//!
//! Generic over `embedded-hal` traits so they run against
//! `linux-embedded-hal` on the Pi and against recording mocks in tests.

pub mod pca9685;
pub mod servo;
