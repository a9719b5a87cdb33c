//! Relay service — command queues plus telemetry store.
//!
//! ```text
//!  control surface ──enqueue_*──▶ ┌─────────────────────────┐ ──next_batch──▶ agent
//!                                 │       RelayService       │
//!  control surface ◀──latest───── │ motor · cam · audio FIFO │ ◀──ingest────── agent
//!                                 │     TelemetryStore       │
//!                                 └─────────────────────────┘
//! ```
//!
//! Every method takes `&self`; the service is shared between the control
//! tasks and the agent session (or between threads, behind an `Arc`).

use std::path::PathBuf;

use heapless::Vec as HVec;
use log::{debug, info, warn};

use crate::app::commands::{CamDirection, Command, CommandKind};
use crate::config::QueueConfig;
use crate::error::ProtocolDecodeError;
use crate::link::messages::{
    ControlReply, ControlRequest, MediaKind, TelemetryFrame, decode_base64, decode_control_line,
    decode_telemetry_line,
};

use super::queue::{BoundedQueue, EnqueueOutcome};
use super::telemetry::{StoredFrame, TelemetryStore};

/// At most one command of each kind per forwarding tick.
pub type Batch = HVec<Command, 3>;

pub struct RelayService {
    motor: BoundedQueue<i64>,
    cam: BoundedQueue<CamDirection>,
    audio: BoundedQueue<Vec<u8>>,
    telemetry: TelemetryStore,
}

impl RelayService {
    pub fn new(queues: &QueueConfig, telemetry_dir: Option<PathBuf>) -> Self {
        Self {
            motor: BoundedQueue::new(queues.motor_capacity, queues.overflow),
            cam: BoundedQueue::new(queues.cam_capacity, queues.overflow),
            audio: BoundedQueue::new(queues.audio_capacity, queues.overflow),
            telemetry: TelemetryStore::new(telemetry_dir),
        }
    }

    // ── Producers ─────────────────────────────────────────────

    pub fn enqueue_motor(&self, motor_id: i64) -> EnqueueOutcome {
        log_outcome(CommandKind::Motor, self.motor.push(motor_id))
    }

    pub fn enqueue_cam(&self, direction: CamDirection) -> EnqueueOutcome {
        log_outcome(CommandKind::Cam, self.cam.push(direction))
    }

    /// Queue a base64-encoded audio blob; invalid base64 is refused.
    pub fn enqueue_audio(&self, payload_base64: &str) -> Result<EnqueueOutcome, ProtocolDecodeError> {
        let payload = decode_base64(payload_base64)?;
        Ok(self.enqueue_audio_bytes(payload))
    }

    pub fn enqueue_audio_bytes(&self, payload: Vec<u8>) -> EnqueueOutcome {
        log_outcome(CommandKind::Audio, self.audio.push(payload))
    }

    pub fn submit(&self, cmd: Command) -> EnqueueOutcome {
        match cmd {
            Command::Motor { motor_id } => self.enqueue_motor(motor_id),
            Command::Cam { direction } => self.enqueue_cam(direction),
            Command::Audio { payload } => self.enqueue_audio_bytes(payload),
        }
    }

    // ── Consumer ──────────────────────────────────────────────

    /// Dequeue the oldest command of one kind.
    pub fn pop(&self, kind: CommandKind) -> Option<Command> {
        match kind {
            CommandKind::Motor => self.motor.pop().map(|motor_id| Command::Motor { motor_id }),
            CommandKind::Cam => self.cam.pop().map(|direction| Command::Cam { direction }),
            CommandKind::Audio => self.audio.pop().map(|payload| Command::Audio { payload }),
        }
    }

    /// Dequeue at most one command per kind, in motor → cam → audio order.
    pub fn next_batch(&self) -> Batch {
        let mut batch = Batch::new();
        // Capacity equals the number of kinds, so the pushes cannot fail.
        for kind in CommandKind::FORWARD_ORDER {
            if let Some(cmd) = self.pop(kind) {
                let _ = batch.push(cmd);
            }
        }
        batch
    }

    /// Queued entries per kind: `(motor, cam, audio)`.
    pub fn pending(&self) -> (usize, usize, usize) {
        (self.motor.len(), self.cam.len(), self.audio.len())
    }

    // ── Telemetry ─────────────────────────────────────────────

    /// Store one agent → relay telemetry line.
    pub fn ingest_telemetry_line(&self, line: &str) -> Result<(MediaKind, u64), ProtocolDecodeError> {
        Ok(self.ingest(decode_telemetry_line(line)?))
    }

    /// Store a decoded frame; returns its kind and sequence number.
    pub fn ingest(&self, frame: TelemetryFrame) -> (MediaKind, u64) {
        let media = frame.media;
        let seq = self.telemetry.store(media, frame.data);
        debug!("Relay: {} frame #{}", media.as_str(), seq);
        (media, seq)
    }

    pub fn latest(&self, media: MediaKind) -> Option<StoredFrame> {
        self.telemetry.latest(media)
    }

    // ── Control surface ───────────────────────────────────────

    pub fn handle_control(&self, request: ControlRequest) -> ControlReply {
        match request {
            ControlRequest::Submit(cmd) => {
                let outcome = self.submit(cmd);
                ControlReply::Ack {
                    accepted: outcome.accepted(),
                    evicted: outcome.evicted(),
                }
            }
            ControlRequest::Latest(media) => match self.latest(media) {
                Some(StoredFrame { seq, data }) => ControlReply::Frame { media, seq, data },
                None => ControlReply::Empty { media },
            },
        }
    }

    /// Decode and answer one control-surface line.
    pub fn handle_control_line(&self, line: &str) -> ControlReply {
        match decode_control_line(line) {
            Ok(request) => self.handle_control(request),
            Err(e) => {
                warn!("Relay: bad control request: {}", e);
                ControlReply::Error {
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn log_outcome(kind: CommandKind, outcome: EnqueueOutcome) -> EnqueueOutcome {
    match outcome {
        EnqueueOutcome::Accepted => debug!("Relay: {:?} queued", kind),
        EnqueueOutcome::AcceptedEvicting => info!("Relay: {:?} queue full, oldest evicted", kind),
        EnqueueOutcome::Rejected => warn!("Relay: {:?} queue full, command rejected", kind),
    }
    outcome
}
