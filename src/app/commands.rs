//! Inbound commands to the agent.
//!
//! These are what the relay forwards over the live channel after
//! [`decode_downlink_line`](crate::link::messages::decode_downlink_line) has
//! validated them. The [`AgentService`](super::service::AgentService)
//! interprets each one and drives exactly one controller.

use serde::{Deserialize, Serialize};

/// Commands the relay can send into the agent core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the treat dispenser in `motor_id` once.
    Motor { motor_id: i64 },

    /// Nudge the camera gimbal one step.
    Cam { direction: CamDirection },

    /// Play a decoded audio blob through the speaker.
    Audio { payload: Vec<u8> },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Motor { .. } => CommandKind::Motor,
            Self::Cam { .. } => CommandKind::Cam,
            Self::Audio { .. } => CommandKind::Audio,
        }
    }
}

/// Discriminant of [`Command`], cheap to copy into events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Motor,
    Cam,
    Audio,
}

impl CommandKind {
    /// Order in which the relay drains its queues on each tick.
    pub const FORWARD_ORDER: [Self; 3] = [Self::Motor, Self::Cam, Self::Audio];
}

/// Camera nudge direction as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CamDirection {
    Left,
    Right,
    Up,
    Down,
}
