//! JSON message layer of the live channel and the control surface.
//!
//! Every message is one JSON object with a string `type`:
//!
//! | Direction          | `type`                          | Payload fields          |
//! |--------------------|---------------------------------|-------------------------|
//! | relay → agent      | `command` / `cam` / `audio`     | `motor` / `direction` / `data` |
//! | relay → agent      | `pong`                          | none                    |
//! | agent → relay      | `video` / `audio`               | `data` (base64)         |
//! | agent → relay      | `ping`                          | none                    |
//! | control → relay    | `command` / `cam` / `audio` / `latest` | as above, `media` |
//! | relay → control    | `ack` / `frame` / `empty` / `error` | see [`ControlReply`] |
//!
//! Decoding distinguishes why a line was rejected (see
//! [`ProtocolDecodeError`]); encoders cannot fail.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::app::commands::{CamDirection, Command};
use crate::error::ProtocolDecodeError;

use super::codec::encode_line;

type Object = Map<String, Value>;

/// Telemetry media kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// One JPEG frame.
    Video,
    /// One raw PCM chunk.
    Audio,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }
}

/// A captured frame travelling agent → relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryFrame {
    pub media: MediaKind,
    pub data: Vec<u8>,
}

/// Anything the relay sends down to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Downlink {
    Command(Command),
    /// Answer to the agent's heartbeat.
    Pong,
}

/// Anything the agent sends up to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Uplink {
    Telemetry(TelemetryFrame),
    /// Heartbeat; the relay answers with `pong`.
    Ping,
}

/// A control-surface request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    /// Queue a command for the agent.
    Submit(Command),
    /// Fetch the most recent telemetry frame of one kind.
    Latest(MediaKind),
}

/// Relay reply to a [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlReply {
    /// The submission was (or was not) queued. Says nothing about execution.
    Ack { accepted: bool, evicted: bool },
    Frame {
        media: MediaKind,
        seq: u64,
        data: Vec<u8>,
    },
    /// Nothing of that kind received yet.
    Empty { media: MediaKind },
    Error { reason: String },
}

// ── Decoding ─────────────────────────────────────────────────

fn parse_object(line: &str) -> Result<(Object, String), ProtocolDecodeError> {
    let value: Value = serde_json::from_str(line).map_err(|_| ProtocolDecodeError::InvalidJson)?;
    let Value::Object(obj) = value else {
        return Err(ProtocolDecodeError::InvalidJson);
    };
    let ty = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolDecodeError::MissingType)?
        .to_owned();
    Ok((obj, ty))
}

fn field_base64(obj: &Object) -> Result<Vec<u8>, ProtocolDecodeError> {
    let data = obj
        .get("data")
        .and_then(Value::as_str)
        .ok_or(ProtocolDecodeError::MalformedField("data"))?;
    decode_base64(data)
}

/// Standard-alphabet, padded base64 as used on every channel.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, ProtocolDecodeError> {
    B64.decode(data).map_err(|_| ProtocolDecodeError::InvalidBase64)
}

/// `None` when `ty` is not a command type.
fn command_from(ty: &str, obj: &Object) -> Option<Result<Command, ProtocolDecodeError>> {
    let cmd = match ty {
        // Any integer is a well-formed id; the dispenser decides which slots exist.
        "command" => obj
            .get("motor")
            .and_then(|m| m.as_i64().or_else(|| m.as_u64().map(|_| i64::MAX)))
            .map(|motor_id| Command::Motor { motor_id })
            .ok_or(ProtocolDecodeError::MalformedField("motor")),
        "cam" => obj
            .get("direction")
            .cloned()
            .and_then(|d| serde_json::from_value::<CamDirection>(d).ok())
            .map(|direction| Command::Cam { direction })
            .ok_or(ProtocolDecodeError::MalformedField("direction")),
        "audio" => field_base64(obj).map(|payload| Command::Audio { payload }),
        _ => return None,
    };
    Some(cmd)
}

/// Decode one relay → agent line.
pub fn decode_agent_line(line: &str) -> Result<Command, ProtocolDecodeError> {
    let (obj, ty) = parse_object(line)?;
    command_from(&ty, &obj).unwrap_or(Err(ProtocolDecodeError::UnknownType))
}

/// Decode one relay → agent line, heartbeat replies included.
pub fn decode_downlink_line(line: &str) -> Result<Downlink, ProtocolDecodeError> {
    let (obj, ty) = parse_object(line)?;
    if ty == "pong" {
        return Ok(Downlink::Pong);
    }
    command_from(&ty, &obj)
        .unwrap_or(Err(ProtocolDecodeError::UnknownType))
        .map(Downlink::Command)
}

/// Decode one agent → relay line, heartbeats included.
pub fn decode_uplink_line(line: &str) -> Result<Uplink, ProtocolDecodeError> {
    let (obj, ty) = parse_object(line)?;
    if ty == "ping" {
        return Ok(Uplink::Ping);
    }
    let media = MediaKind::parse(&ty).ok_or(ProtocolDecodeError::UnknownType)?;
    Ok(Uplink::Telemetry(TelemetryFrame {
        media,
        data: field_base64(&obj)?,
    }))
}

/// Decode one agent → relay telemetry line.
pub fn decode_telemetry_line(line: &str) -> Result<TelemetryFrame, ProtocolDecodeError> {
    let (obj, ty) = parse_object(line)?;
    let media = MediaKind::parse(&ty).ok_or(ProtocolDecodeError::UnknownType)?;
    Ok(TelemetryFrame {
        media,
        data: field_base64(&obj)?,
    })
}

/// Decode one control-surface request line.
pub fn decode_control_line(line: &str) -> Result<ControlRequest, ProtocolDecodeError> {
    let (obj, ty) = parse_object(line)?;
    if ty == "latest" {
        return obj
            .get("media")
            .and_then(Value::as_str)
            .and_then(MediaKind::parse)
            .map(ControlRequest::Latest)
            .ok_or(ProtocolDecodeError::MalformedField("media"));
    }
    command_from(&ty, &obj)
        .unwrap_or(Err(ProtocolDecodeError::UnknownType))
        .map(ControlRequest::Submit)
}

// ── Encoding ─────────────────────────────────────────────────

/// Encode a command for the agent, newline included.
pub fn encode_command(cmd: &Command) -> String {
    let value = match cmd {
        Command::Motor { motor_id } => json!({ "type": "command", "motor": motor_id }),
        Command::Cam { direction } => json!({ "type": "cam", "direction": direction }),
        Command::Audio { payload } => json!({ "type": "audio", "data": B64.encode(payload) }),
    };
    encode_line(value.to_string())
}

/// Encode a captured frame for the relay, newline included.
pub fn encode_telemetry(frame: &TelemetryFrame) -> String {
    let value = json!({ "type": frame.media.as_str(), "data": B64.encode(&frame.data) });
    encode_line(value.to_string())
}

pub fn encode_ping() -> String {
    encode_line(json!({ "type": "ping" }).to_string())
}

pub fn encode_pong() -> String {
    encode_line(json!({ "type": "pong" }).to_string())
}

/// Encode a control-surface reply, newline included.
pub fn encode_reply(reply: &ControlReply) -> String {
    let value = match reply {
        ControlReply::Ack { accepted, evicted } => {
            json!({ "type": "ack", "accepted": accepted, "evicted": evicted })
        }
        ControlReply::Frame { media, seq, data } => json!({
            "type": "frame",
            "media": media.as_str(),
            "seq": seq,
            "data": B64.encode(data),
        }),
        ControlReply::Empty { media } => json!({ "type": "empty", "media": media.as_str() }),
        ControlReply::Error { reason } => json!({ "type": "error", "reason": reason }),
    };
    encode_line(value.to_string())
}
