//! PetPal library: device command relay and Raspberry Pi actuator agent.
//!
//! Exposes every module for the two binaries and for integration testing.
//! Only [`adapters::hardware`] depends on Linux I2C and is gated behind the
//! `linux-hw` feature.
//!
//! ```text
//!  control surface ─▶ relay (queues) ─▶ live channel ─▶ agent loop ─▶ controllers ─▶ PCA9685
//!  control surface ◀─ relay (latest) ◀─ live channel ◀─ capture threads
//! ```

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod capture;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod link;
pub mod pins;
pub mod relay;
