//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controllers / AgentService (domain)
//! ```
//!
//! Driven adapters (PWM controllers, servo banks, audio players, event
//! sinks, config storage) implement these traits. The controllers consume
//! them via generics, so the domain core never touches `/dev/i2c-*` or
//! spawns a process directly. Delays go through
//! [`embedded_hal::delay::DelayNs`] for the same reason.

use crate::error::{PlaybackError, Result};

// ───────────────────────────────────────────────────────────────
// Pulse output port (domain → PWM controller)
// ───────────────────────────────────────────────────────────────

/// Raw on/off tick output on a channel of a 12-bit PWM controller.
pub trait PulseOutput {
    /// Program `channel` to go high at `on_tick` and low at `off_tick`.
    ///
    /// Out-of-range arguments fail with
    /// [`InvalidActuatorError`](crate::error::InvalidActuatorError) before
    /// anything is written; bus failures surface as
    /// [`BusWriteError`](crate::error::BusWriteError).
    fn set_pulse(&mut self, channel: u8, on_tick: u16, off_tick: u16) -> Result<()>;
}

impl<T: PulseOutput + ?Sized> PulseOutput for &mut T {
    fn set_pulse(&mut self, channel: u8, on_tick: u16, off_tick: u16) -> Result<()> {
        (**self).set_pulse(channel, on_tick, off_tick)
    }
}

// ───────────────────────────────────────────────────────────────
// Servo port (domain → angle-addressed servo bank)
// ───────────────────────────────────────────────────────────────

/// A bank of angle-controlled servos addressed by slot.
pub trait ServoOutput {
    /// Number of addressable slots (`0..slot_count()`).
    fn slot_count(&self) -> u8;

    /// Rotate `slot` to `degrees`.
    fn set_angle(&mut self, slot: u8, degrees: u16) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// Audio sink port (domain → transcoder + speaker)
// ───────────────────────────────────────────────────────────────

/// Plays an audio blob in an arbitrary container, blocking until playback
/// has finished or failed.
pub trait AudioSink {
    fn play(&mut self, payload: &[u8]) -> core::result::Result<(), PlaybackError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AgentEvent`](super::events::AgentEvent)s
/// through this port. Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AgentEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists a configuration document.
///
/// Implementations MUST validate values before handing them out or
/// persisting them. Invalid ranges are rejected with
/// [`ConfigError::ValidationFailed`], not silently clamped: a bad
/// `motion.max_tick` would drive the gimbal into its end stops.
pub trait ConfigPort<C> {
    /// Load the configuration. Returns `C::default()` when none is stored.
    fn load(&self) -> core::result::Result<C, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &C) -> core::result::Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config could not be parsed.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
