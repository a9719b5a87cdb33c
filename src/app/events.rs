//! Outbound agent events.
//!
//! The [`AgentService`](super::service::AgentService) and
//! [`AgentLoop`](super::agent_loop::AgentLoop) emit these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide what to do with them: the binaries log them, tests assert on them.

use crate::control::motion::Axis;
use crate::error::{Error, ProtocolDecodeError};

use super::commands::CommandKind;

/// Structured events emitted by the agent core.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// The live channel is up after `backoffs` reconnect waits.
    Connected { backoffs: u32 },

    /// The live channel dropped.
    Disconnected,

    /// Waiting `backoff_ms` before reconnect attempt `attempt`.
    Reconnecting { attempt: u32, backoff_ms: u32 },

    /// Reconnection attempts exhausted; the loop is closing.
    GaveUp { attempts: u32 },

    /// A gimbal axis finished a sweep.
    Moved { axis: Axis, from: u16, to: u16 },

    /// A gimbal command was ignored because the axis is at its limit.
    AtBound { axis: Axis, position: u16 },

    /// A dispenser completed its release/dwell/rest cycle.
    Dispensed { slot: u8 },

    /// An audio payload played to completion.
    PlaybackFinished { bytes: usize },

    /// A command was rejected or failed without endangering the loop.
    CommandFailed { kind: CommandKind, error: Error },

    /// An inbound line was dropped.
    MessageDropped(ProtocolDecodeError),

    /// Captured frames sent to the relay this iteration.
    TelemetrySent { frames: usize },
}
