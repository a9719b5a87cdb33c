//! Server-side command relay.
//!
//! Buffers control-surface commands per kind in bounded FIFOs, forwards
//! them to the connected agent, and keeps the latest telemetry frame of
//! each kind for the control surface to fetch.

pub mod queue;
pub mod server;
pub mod service;
pub mod telemetry;
