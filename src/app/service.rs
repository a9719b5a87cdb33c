//! Agent service — the hexagonal core on the Pi.
//!
//! [`AgentService`] owns the three controllers and turns each decoded
//! [`Command`] into exactly one physical side effect. Dispatch is
//! synchronous: the next command is not looked at until the previous
//! sweep, dispense cycle or playback has finished.
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!  Command ──────▶│         AgentService         │──▶ EventSink
//!                 │  Motion · Dispense · Playback │
//!                 └──┬────────────┬───────────┬──┘
//!               PulseOutput  ServoOutput   AudioSink
//! ```

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::control::dispense::DispenseController;
use crate::control::motion::{MotionController, MotionState, MoveOutcome};
use crate::control::playback::PlaybackPipeline;
use crate::error::{Error, Result};

use super::commands::Command;
use super::events::AgentEvent;
use super::ports::{AudioSink, EventSink, PulseOutput, ServoOutput};

// ───────────────────────────────────────────────────────────────
// AgentService
// ───────────────────────────────────────────────────────────────

pub struct AgentService<P, S, A, D> {
    motion: MotionController<P, D>,
    dispense: DispenseController<S, D>,
    playback: PlaybackPipeline<A>,
    handled: u64,
}

impl<P, S, A, D> AgentService<P, S, A, D>
where
    P: PulseOutput,
    S: ServoOutput,
    A: AudioSink,
    D: DelayNs,
{
    pub fn new(
        motion: MotionController<P, D>,
        dispense: DispenseController<S, D>,
        playback: PlaybackPipeline<A>,
    ) -> Self {
        Self {
            motion,
            dispense,
            playback,
            handled: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Write the initial gimbal position to the hardware.
    pub fn home(&mut self) -> Result<()> {
        self.motion.home()?;
        let s = self.motion.state();
        info!("AgentService homed gimbal to pan={} tilt={}", s.leftright, s.updown);
        Ok(())
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply one command to the hardware.
    ///
    /// Only fatal errors are returned; everything else is reported as
    /// [`AgentEvent::CommandFailed`] and swallowed.
    pub fn handle(&mut self, cmd: Command, sink: &mut impl EventSink) -> Result<()> {
        let kind = cmd.kind();
        self.handled += 1;

        let outcome: Result<AgentEvent> = match cmd {
            Command::Motor { motor_id } => self
                .dispense
                .dispense(motor_id)
                .map(|slot| AgentEvent::Dispensed { slot }),
            Command::Cam { direction } => {
                self.motion
                    .apply(direction)
                    .map(|(axis, outcome)| match outcome {
                        MoveOutcome::Moved { from, to } => AgentEvent::Moved { axis, from, to },
                        MoveOutcome::AtBound(position) => AgentEvent::AtBound { axis, position },
                    })
            }
            Command::Audio { payload } => self
                .playback
                .play(&payload)
                .map(|bytes| AgentEvent::PlaybackFinished { bytes })
                .map_err(Error::from),
        };

        match outcome {
            Ok(event) => {
                sink.emit(&event);
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(error) => {
                warn!("AgentService: {:?} command failed: {}", kind, error);
                sink.emit(&AgentEvent::CommandFailed { kind, error });
                Ok(())
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn motion_state(&self) -> MotionState {
        self.motion.state()
    }

    /// Commands seen since startup, failed ones included.
    pub fn handled(&self) -> u64 {
        self.handled
    }

    pub fn motion(&self) -> &MotionController<P, D> {
        &self.motion
    }

    pub fn dispense(&self) -> &DispenseController<S, D> {
        &self.dispense
    }

    pub fn playback(&self) -> &PlaybackPipeline<A> {
        &self.playback
    }
}
