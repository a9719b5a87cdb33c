//! Mock hardware and link adapters for integration tests.
//!
//! Every mock shares one virtual [`Clock`]: delays advance it instead of
//! sleeping, and every recorded call is stamped with the current time, so
//! tests can assert on the full timeline of a session.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::ErrorKind;

use petpal::app::events::AgentEvent;
use petpal::app::ports::{AudioSink, EventSink, PulseOutput, ServoOutput};
use petpal::error::{BusWriteError, Error, PlaybackError, Result};
use petpal::link::transport::{Connector, LiveChannel};

// ── Virtual clock ─────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct Clock(Rc<Cell<u64>>);

impl Clock {
    pub fn now_ms(&self) -> u64 {
        self.0.get()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

/// `DelayNs` that advances the shared clock and remembers every sleep.
#[derive(Clone)]
pub struct ClockDelay {
    clock: Clock,
    pub sleeps: Rc<RefCell<Vec<u32>>>,
}

impl ClockDelay {
    pub fn new(clock: &Clock) -> Self {
        Self {
            clock: clock.clone(),
            sleeps: Rc::default(),
        }
    }
}

impl DelayNs for ClockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_ms(u64::from(ns / 1_000_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.sleeps.borrow_mut().push(ms);
        self.clock.advance_ms(u64::from(ms));
    }
}

// ── PWM controller ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseWrite {
    pub at_ms: u64,
    pub channel: u8,
    pub off_tick: u16,
}

/// Records `set_pulse` calls; optionally starts failing after `fail_after`
/// successful writes.
pub struct RecordingPwm {
    clock: Clock,
    pub writes: Rc<RefCell<Vec<PulseWrite>>>,
    pub fail_after: Option<usize>,
}

impl RecordingPwm {
    pub fn new(clock: &Clock) -> Self {
        Self {
            clock: clock.clone(),
            writes: Rc::default(),
            fail_after: None,
        }
    }
}

impl PulseOutput for RecordingPwm {
    fn set_pulse(&mut self, channel: u8, _on_tick: u16, off_tick: u16) -> Result<()> {
        let mut writes = self.writes.borrow_mut();
        if self.fail_after.is_some_and(|n| writes.len() >= n) {
            return Err(Error::Bus(BusWriteError {
                register: 0x06 + 4 * channel,
                kind: ErrorKind::Other,
            }));
        }
        writes.push(PulseWrite {
            at_ms: self.clock.now_ms(),
            channel,
            off_tick,
        });
        Ok(())
    }
}

// ── Dispenser servos ──────────────────────────────────────────

pub struct RecordingServos {
    clock: Clock,
    pub slots: u8,
    /// `(time, slot, degrees)`
    pub moves: Rc<RefCell<Vec<(u64, u8, u16)>>>,
}

impl RecordingServos {
    pub fn new(clock: &Clock, slots: u8) -> Self {
        Self {
            clock: clock.clone(),
            slots,
            moves: Rc::default(),
        }
    }
}

impl ServoOutput for RecordingServos {
    fn slot_count(&self) -> u8 {
        self.slots
    }

    fn set_angle(&mut self, slot: u8, degrees: u16) -> Result<()> {
        self.moves
            .borrow_mut()
            .push((self.clock.now_ms(), slot, degrees));
        Ok(())
    }
}

// ── Speaker ───────────────────────────────────────────────────

/// "Plays" for a fixed virtual duration and records `(start, end, bytes)`.
pub struct TimedSpeaker {
    clock: Clock,
    pub duration_ms: u64,
    pub plays: Rc<RefCell<Vec<(u64, u64, usize)>>>,
}

impl TimedSpeaker {
    pub fn new(clock: &Clock, duration_ms: u64) -> Self {
        Self {
            clock: clock.clone(),
            duration_ms,
            plays: Rc::default(),
        }
    }
}

impl AudioSink for TimedSpeaker {
    fn play(&mut self, payload: &[u8]) -> core::result::Result<(), PlaybackError> {
        let start = self.clock.now_ms();
        self.clock.advance_ms(self.duration_ms);
        self.plays
            .borrow_mut()
            .push((start, self.clock.now_ms(), payload.len()));
        Ok(())
    }
}

// ── Events ────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingEvents {
    pub events: Vec<AgentEvent>,
}

#[allow(dead_code)]
impl RecordingEvents {
    pub fn count(&self, pred: impl Fn(&AgentEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingEvents {
    fn emit(&mut self, event: &AgentEvent) {
        self.events.push(event.clone());
    }
}

// ── Live channel ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Step {
    Line(String),
    Timeout,
    Fail(Error),
}

/// Replays a fixed script of receive outcomes, then reports a disconnect.
pub struct ScriptedChannel {
    script: VecDeque<Step>,
    pub sent: Rc<RefCell<Vec<String>>>,
}

impl ScriptedChannel {
    pub fn new(script: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: script.into_iter().collect(),
            sent: Rc::default(),
        }
    }

    pub fn lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(lines.into_iter().map(|l| Step::Line(l.to_owned())))
    }
}

impl LiveChannel for ScriptedChannel {
    fn recv_timeout(&mut self, _timeout: Duration) -> Result<Option<String>> {
        match self.script.pop_front() {
            Some(Step::Line(line)) => Ok(Some(line)),
            Some(Step::Timeout) => Ok(None),
            Some(Step::Fail(e)) => Err(e),
            None => Err(Error::ChannelDisconnect),
        }
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        self.sent.borrow_mut().push(line.to_owned());
        Ok(())
    }
}

/// Hands out pre-built channels in order; `None` entries (and running out)
/// fail the connection attempt.
pub struct ScriptedConnector {
    clock: Clock,
    outcomes: VecDeque<Option<ScriptedChannel>>,
    /// Virtual time of every `connect` call.
    pub attempts: Vec<u64>,
}

impl ScriptedConnector {
    pub fn new(clock: &Clock, outcomes: impl IntoIterator<Item = Option<ScriptedChannel>>) -> Self {
        Self {
            clock: clock.clone(),
            outcomes: outcomes.into_iter().collect(),
            attempts: Vec::new(),
        }
    }
}

impl Connector for ScriptedConnector {
    type Channel = ScriptedChannel;

    fn connect(&mut self) -> Result<ScriptedChannel> {
        self.attempts.push(self.clock.now_ms());
        self.outcomes
            .pop_front()
            .flatten()
            .ok_or(Error::ChannelDisconnect)
    }
}
