//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured agent events through the
//! `log` facade (stderr via `env_logger`, or the journal under systemd).

use log::{info, warn};

use crate::app::events::AgentEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AgentEvent`] as one line.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AgentEvent) {
        match event {
            AgentEvent::Connected { backoffs: 0 } => {
                info!("LINK  | connected");
            }
            AgentEvent::Connected { backoffs } => {
                info!("LINK  | connected after {} reconnect waits", backoffs);
            }
            AgentEvent::Disconnected => {
                warn!("LINK  | disconnected");
            }
            AgentEvent::Reconnecting {
                attempt,
                backoff_ms,
            } => {
                info!("LINK  | reconnect #{} in {} ms", attempt, backoff_ms);
            }
            AgentEvent::GaveUp { attempts } => {
                warn!("LINK  | gave up after {} attempts", attempts);
            }
            AgentEvent::Moved { axis, from, to } => {
                info!("MOVE  | {:?} {} -> {}", axis, from, to);
            }
            AgentEvent::AtBound { axis, position } => {
                info!("MOVE  | {:?} at limit {}", axis, position);
            }
            AgentEvent::Dispensed { slot } => {
                info!("FEED  | slot {} dispensed", slot);
            }
            AgentEvent::PlaybackFinished { bytes } => {
                info!("AUDIO | played {} bytes", bytes);
            }
            AgentEvent::CommandFailed { kind, error } => {
                warn!("FAIL  | {:?}: {}", kind, error);
            }
            AgentEvent::MessageDropped(e) => {
                warn!("DROP  | inbound line: {}", e);
            }
            AgentEvent::TelemetrySent { frames } => {
                log::debug!("TELEM | {} frames sent", frames);
            }
        }
    }
}
