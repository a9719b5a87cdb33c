//! Application core — command interpretation and the agent loop.
//!
//! Business rules for the PetPal agent: which controller handles which
//! command, and how the live channel is kept alive. All interaction with
//! hardware and the network happens through **port traits** defined in
//! [`ports`] and [`crate::link::transport`], so this layer is fully
//! testable without real peripherals.

pub mod agent_loop;
pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
