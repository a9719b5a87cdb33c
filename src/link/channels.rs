//! Telemetry outbox between the capture threads and the agent loop.
//!
//! Uses an `embassy-sync` bounded MPMC channel so capture threads never
//! block on the network: when the outbox is full the new frame is
//! dropped. Telemetry is overwrite-latest on the relay anyway.
//!
//! ```text
//! ┌───────────────┐ TelemetryFrame ┌──────────────┐
//! │ Capture thread│───────────────▶│  Agent loop  │──▶ live channel
//! │ (video/audio) │  try_send      │ try_receive  │
//! └───────────────┘                └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::debug;

use super::messages::TelemetryFrame;

/// Frames buffered between capture and the next serving iteration.
pub const OUTBOX_DEPTH: usize = 16;

pub type TelemetryOutbox = Channel<CriticalSectionRawMutex, TelemetryFrame, OUTBOX_DEPTH>;

/// Process-wide outbox used by the agent binary.
pub static TELEMETRY_OUTBOX: TelemetryOutbox = Channel::new();

/// Offer a frame to the outbox. Returns `false` if it was dropped.
pub fn offer(outbox: &TelemetryOutbox, frame: TelemetryFrame) -> bool {
    match outbox.try_send(frame) {
        Ok(()) => true,
        Err(_) => {
            debug!("Capture: outbox full, frame dropped");
            false
        }
    }
}
