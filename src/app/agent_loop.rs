//! Agent loop — keeps the live channel up and feeds the agent service.
//!
//! ```text
//!              ┌────────────┐  ok   ┌─────────┐
//!   start ───▶ │ Connecting │──────▶│ Serving │◀─┐ iteration ok
//!              └────────────┘       └────┬────┴──┘
//!                 ▲    │ fail            │ channel lost
//!                 │    ▼                 ▼
//!              ┌──────────────────────────────┐ attempts ≥ max ┌─────────┐
//!              │ Reconnecting (sleep backoff) │───────────────▶│ Closing │
//!              └──────────────────────────────┘                └─────────┘
//! ```
//!
//! One serving iteration: drain up to one outbox's worth of telemetry →
//! heartbeat if nothing went out for `heartbeat_ms` → receive with a short
//! timeout → decode and dispatch → idle sleep. A fatal (bus) error from
//! dispatch ends the loop with that error. A relay that stays silent for
//! `peer_timeout_ms` (pongs included) counts as a lost channel.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::config::LinkConfig;
use crate::error::{Error, Result};
use crate::link::channels::{OUTBOX_DEPTH, TelemetryOutbox};
use crate::link::messages::{Downlink, decode_downlink_line, encode_ping, encode_telemetry};
use crate::link::transport::{Connector, LiveChannel};

use super::events::AgentEvent;
use super::ports::{AudioSink, EventSink, PulseOutput, ServoOutput};
use super::service::AgentService;

/// Connection state; `Serving` owns the open channel.
pub enum LinkState<C> {
    Connecting,
    Serving(C),
    Reconnecting,
    Closing,
}

pub struct AgentLoop<'o, C, D> {
    connector: C,
    delay: D,
    cfg: LinkConfig,
    outbox: &'o TelemetryOutbox,
    /// Consecutive failed connection attempts.
    attempt: u32,
    /// Loop time since the last inbound line (ms).
    since_rx_ms: u64,
    /// Loop time since the last outbound line (ms).
    since_tx_ms: u64,
}

impl<'o, C: Connector, D: DelayNs> AgentLoop<'o, C, D> {
    pub fn new(connector: C, delay: D, cfg: LinkConfig, outbox: &'o TelemetryOutbox) -> Self {
        Self {
            connector,
            delay,
            cfg,
            outbox,
            attempt: 0,
            since_rx_ms: 0,
            since_tx_ms: 0,
        }
    }

    /// Run until reconnection gives up (`Ok`) or a fatal error occurs.
    pub fn run<P, S, A, MD>(
        &mut self,
        service: &mut AgentService<P, S, A, MD>,
        sink: &mut impl EventSink,
    ) -> Result<()>
    where
        P: PulseOutput,
        S: ServoOutput,
        A: AudioSink,
        MD: DelayNs,
    {
        let mut state = LinkState::Connecting;
        loop {
            state = match self.step(state, service, sink)? {
                LinkState::Closing => {
                    info!("Link: closing");
                    return Ok(());
                }
                next => next,
            };
        }
    }

    /// Advance the state machine by one transition.
    pub fn step<P, S, A, MD>(
        &mut self,
        state: LinkState<C::Channel>,
        service: &mut AgentService<P, S, A, MD>,
        sink: &mut impl EventSink,
    ) -> Result<LinkState<C::Channel>>
    where
        P: PulseOutput,
        S: ServoOutput,
        A: AudioSink,
        MD: DelayNs,
    {
        Ok(match state {
            LinkState::Connecting => match self.connector.connect() {
                Ok(channel) => {
                    sink.emit(&AgentEvent::Connected {
                        backoffs: self.attempt,
                    });
                    self.attempt = 0;
                    self.since_rx_ms = 0;
                    self.since_tx_ms = 0;
                    LinkState::Serving(channel)
                }
                Err(e) => {
                    warn!("Link: connect failed: {}", e);
                    LinkState::Reconnecting
                }
            },

            LinkState::Serving(mut channel) => match self.serve_once(&mut channel, service, sink) {
                Ok(()) => LinkState::Serving(channel),
                Err(e) if e.is_fatal() => {
                    error!("Link: fatal error, stopping: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Link: leaving serving state: {}", e);
                    sink.emit(&AgentEvent::Disconnected);
                    LinkState::Reconnecting
                }
            },

            LinkState::Reconnecting => {
                let max = self.cfg.reconnect.max_attempts;
                if self.attempt >= max {
                    warn!("Link: giving up after {} attempts", self.attempt);
                    sink.emit(&AgentEvent::GaveUp {
                        attempts: self.attempt,
                    });
                    LinkState::Closing
                } else {
                    let backoff_ms = self.cfg.reconnect.backoff_ms(self.attempt);
                    self.attempt += 1;
                    info!(
                        "Link: reconnect attempt {}/{} in {} ms",
                        self.attempt, max, backoff_ms
                    );
                    sink.emit(&AgentEvent::Reconnecting {
                        attempt: self.attempt,
                        backoff_ms,
                    });
                    self.delay.delay_ms(backoff_ms);
                    LinkState::Connecting
                }
            }

            LinkState::Closing => LinkState::Closing,
        })
    }

    fn serve_once<P, S, A, MD>(
        &mut self,
        channel: &mut C::Channel,
        service: &mut AgentService<P, S, A, MD>,
        sink: &mut impl EventSink,
    ) -> Result<()>
    where
        P: PulseOutput,
        S: ServoOutput,
        A: AudioSink,
        MD: DelayNs,
    {
        // 1. Telemetry out, at most one outbox's worth
        let mut frames = 0;
        while frames < OUTBOX_DEPTH {
            let Ok(frame) = self.outbox.try_receive() else {
                break;
            };
            channel.send_line(&encode_telemetry(&frame))?;
            frames += 1;
        }
        if frames > 0 {
            self.since_tx_ms = 0;
            sink.emit(&AgentEvent::TelemetrySent { frames });
        }

        // 2. Heartbeat
        if self.since_tx_ms >= u64::from(self.cfg.heartbeat_ms) {
            debug!("Link: ping");
            channel.send_line(&encode_ping())?;
            self.since_tx_ms = 0;
        }

        // 3. Bounded receive
        let timeout = Duration::from_millis(u64::from(self.cfg.recv_timeout_ms));
        match channel.recv_timeout(timeout) {
            Ok(Some(line)) => {
                self.since_rx_ms = 0;
                match decode_downlink_line(&line) {
                    // 4. Dispatch, synchronously
                    Ok(Downlink::Command(cmd)) => service.handle(cmd, sink)?,
                    Ok(Downlink::Pong) => debug!("Link: pong"),
                    Err(e) => {
                        warn!("Link: dropped inbound line: {}", e);
                        sink.emit(&AgentEvent::MessageDropped(e));
                    }
                }
            }
            Ok(None) => {}
            Err(Error::Protocol(e)) => {
                self.since_rx_ms = 0;
                warn!("Link: dropped inbound line: {}", e);
                sink.emit(&AgentEvent::MessageDropped(e));
            }
            Err(e) => return Err(e),
        }

        // 5. Yield
        self.delay.delay_ms(self.cfg.idle_ms);

        let elapsed = u64::from(self.cfg.recv_timeout_ms) + u64::from(self.cfg.idle_ms);
        self.since_rx_ms += elapsed;
        self.since_tx_ms += elapsed;
        if self.since_rx_ms >= u64::from(self.cfg.peer_timeout_ms) {
            warn!("Link: relay silent for {} ms", self.since_rx_ms);
            return Err(Error::ChannelDisconnect);
        }
        Ok(())
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }
}
