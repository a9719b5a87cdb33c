//! Pan/tilt gimbal motion controller.
//!
//! Owns the only copy of the gimbal position and the PWM output that
//! drives it. Every `cam` command becomes one bounded, step-interpolated
//! sweep:
//!
//! ```text
//!   current ──(+/- step, clamped)──▶ candidate
//!   write current, current±stride, … (sleep step_delay after each)
//!   write candidate, commit
//! ```
//!
//! Sweeps block the caller; nothing else touches the PWM bus meanwhile.

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::app::commands::CamDirection;
use crate::app::ports::PulseOutput;
use crate::config::MotionConfig;
use crate::error::Result;
use crate::pins;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Left/right.
    Pan,
    /// Up/down.
    Tilt,
}

impl Axis {
    pub fn channel(self) -> u8 {
        match self {
            Self::Pan => pins::PAN_CHANNEL,
            Self::Tilt => pins::TILT_CHANNEL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
}

impl CamDirection {
    /// Which axis a camera nudge moves and which way.
    pub fn axis_motion(self) -> (Axis, Direction) {
        match self {
            Self::Left => (Axis::Pan, Direction::Decrease),
            Self::Right => (Axis::Pan, Direction::Increase),
            Self::Down => (Axis::Tilt, Direction::Decrease),
            Self::Up => (Axis::Tilt, Direction::Increase),
        }
    }
}

/// Gimbal position in raw PWM ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionState {
    pub leftright: u16,
    pub updown: u16,
}

impl MotionState {
    pub fn get(&self, axis: Axis) -> u16 {
        match axis {
            Axis::Pan => self.leftright,
            Axis::Tilt => self.updown,
        }
    }

    fn set(&mut self, axis: Axis, value: u16) {
        match axis {
            Axis::Pan => self.leftright = value,
            Axis::Tilt => self.updown = value,
        }
    }
}

/// Result of a [`MotionController::move_axis`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved { from: u16, to: u16 },
    /// Already at the limit in that direction; nothing was written.
    AtBound(u16),
}

pub struct MotionController<P, D> {
    output: P,
    delay: D,
    state: MotionState,
    cfg: MotionConfig,
}

impl<P: PulseOutput, D: DelayNs> MotionController<P, D> {
    /// Both axes start at `cfg.home_tick` (clamped into bounds).
    pub fn new(output: P, delay: D, cfg: MotionConfig) -> Self {
        let home = cfg.home_tick.clamp(cfg.min_tick, cfg.max_tick);
        Self::with_state(
            output,
            delay,
            cfg,
            MotionState {
                leftright: home,
                updown: home,
            },
        )
    }

    /// Start from a known position. Out-of-range values are clamped.
    pub fn with_state(output: P, delay: D, cfg: MotionConfig, state: MotionState) -> Self {
        let state = MotionState {
            leftright: state.leftright.clamp(cfg.min_tick, cfg.max_tick),
            updown: state.updown.clamp(cfg.min_tick, cfg.max_tick),
        };
        Self {
            output,
            delay,
            state,
            cfg,
        }
    }

    /// Drive both axes to the stored position without interpolation.
    pub fn home(&mut self) -> Result<()> {
        for axis in [Axis::Pan, Axis::Tilt] {
            self.output.set_pulse(axis.channel(), 0, self.state.get(axis))?;
        }
        Ok(())
    }

    pub fn apply(&mut self, direction: CamDirection) -> Result<(Axis, MoveOutcome)> {
        let (axis, dir) = direction.axis_motion();
        self.move_axis(axis, dir).map(|outcome| (axis, outcome))
    }

    /// Sweep `axis` one step in `direction`, clamped to the configured bounds.
    ///
    /// On a bus error the state keeps the last tick that was written
    /// successfully, so it still matches the hardware.
    pub fn move_axis(&mut self, axis: Axis, direction: Direction) -> Result<MoveOutcome> {
        let current = self.state.get(axis);
        let candidate = match direction {
            Direction::Increase => current.saturating_add(self.cfg.step),
            Direction::Decrease => current.saturating_sub(self.cfg.step),
        }
        .clamp(self.cfg.min_tick, self.cfg.max_tick);

        if candidate == current {
            debug!("Motion: {:?} at bound {}", axis, current);
            return Ok(MoveOutcome::AtBound(current));
        }

        let channel = axis.channel();
        let stride = self.cfg.stride.max(1);
        let mut pos = current;
        while pos != candidate {
            self.output.set_pulse(channel, 0, pos)?;
            self.state.set(axis, pos);
            self.delay.delay_ms(self.cfg.step_delay_ms);
            pos = if candidate > pos {
                pos.saturating_add(stride).min(candidate)
            } else {
                pos.saturating_sub(stride).max(candidate)
            };
        }
        self.output.set_pulse(channel, 0, candidate)?;
        self.state.set(axis, candidate);

        debug!("Motion: {:?} {} -> {}", axis, current, candidate);
        Ok(MoveOutcome::Moved {
            from: current,
            to: candidate,
        })
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn output(&self) -> &P {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut P {
        &mut self.output
    }
}
