//! Unified error types for the PetPal agent and relay.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! agent loop's error policy in one place: bus failures are fatal, every
//! other variant is logged and the loop carries on.
//! All variants are `Copy` so they can be passed through events and
//! returned from the dispatch path without allocation.

use core::fmt;

use embedded_hal::i2c::ErrorKind;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An I2C write to the PWM controller failed. The bus can no longer be
    /// trusted.
    Bus(BusWriteError),
    /// A channel, slot or pulse value was out of range. Nothing was written.
    InvalidActuator(InvalidActuatorError),
    /// The transcoder or player process failed.
    Playback(PlaybackError),
    /// An inbound live-channel line could not be decoded.
    Protocol(ProtocolDecodeError),
    /// The live channel was closed by the peer or failed at the socket level.
    ChannelDisconnect,
    /// Configuration is invalid.
    Config(&'static str),
}

impl Error {
    /// Bus failures terminate the agent: continuing could leave an actuator
    /// in uncontrolled motion.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Bus(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::InvalidActuator(e) => write!(f, "actuator: {e}"),
            Self::Playback(e) => write!(f, "playback: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::ChannelDisconnect => write!(f, "live channel disconnected"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

/// A register write (or the MODE1 read during init) failed on the I2C bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusWriteError {
    /// First register address of the failed transaction.
    pub register: u8,
    pub kind: ErrorKind,
}

impl fmt::Display for BusWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I2C transfer at register 0x{:02X} failed ({})", self.register, self.kind)
    }
}

impl From<BusWriteError> for Error {
    fn from(e: BusWriteError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator validation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidActuatorError {
    /// PWM channel index beyond the controller's 16 channels.
    Channel(u8),
    /// On/off tick outside the 12-bit counter range.
    PulseOutOfRange(u16),
    /// Dispense motor slot not present on the servo bank.
    MotorSlot(i64),
    /// Servo angle beyond the actuation range.
    Angle(u16),
}

impl fmt::Display for InvalidActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(ch) => write!(f, "PWM channel {ch} out of range"),
            Self::PulseOutOfRange(tick) => write!(f, "tick {tick} exceeds 12-bit range"),
            Self::MotorSlot(slot) => write!(f, "motor slot {slot} does not exist"),
            Self::Angle(deg) => write!(f, "angle {deg}\u{00b0} beyond actuation range"),
        }
    }
}

impl From<InvalidActuatorError> for Error {
    fn from(e: InvalidActuatorError) -> Self {
        Self::InvalidActuator(e)
    }
}

// ---------------------------------------------------------------------------
// Playback errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackError {
    /// Nothing to play.
    EmptyPayload,
    /// The transcoder or player binary could not be started.
    SpawnFailed,
    /// Writing the payload into the transcoder failed.
    FeedFailed,
    /// Transcoder exited unsuccessfully (`None` = killed by signal).
    TranscoderFailed(Option<i32>),
    /// Player exited unsuccessfully (`None` = killed by signal).
    PlayerFailed(Option<i32>),
    /// Playback did not finish within the configured limit; both processes
    /// were killed.
    Timeout,
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "empty audio payload"),
            Self::SpawnFailed => write!(f, "could not spawn transcoder/player"),
            Self::FeedFailed => write!(f, "could not feed payload to transcoder"),
            Self::TranscoderFailed(code) => write!(f, "transcoder exited with {code:?}"),
            Self::PlayerFailed(code) => write!(f, "player exited with {code:?}"),
            Self::Timeout => write!(f, "playback timed out"),
        }
    }
}

impl From<PlaybackError> for Error {
    fn from(e: PlaybackError) -> Self {
        Self::Playback(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolDecodeError {
    /// Line is not valid JSON (or not UTF-8).
    InvalidJson,
    /// JSON object has no string `type` field.
    MissingType,
    /// `type` is not one this side understands.
    UnknownType,
    /// A required field is missing or has the wrong shape.
    MalformedField(&'static str),
    /// The `data` field is not valid standard base64.
    InvalidBase64,
    /// Line exceeded the configured maximum length and was discarded.
    LineTooLong,
}

impl fmt::Display for ProtocolDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson => write!(f, "invalid JSON"),
            Self::MissingType => write!(f, "missing `type`"),
            Self::UnknownType => write!(f, "unrecognised `type`"),
            Self::MalformedField(field) => write!(f, "malformed field `{field}`"),
            Self::InvalidBase64 => write!(f, "invalid base64 payload"),
            Self::LineTooLong => write!(f, "line too long"),
        }
    }
}

impl From<ProtocolDecodeError> for Error {
    fn from(e: ProtocolDecodeError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
