//! Agent and relay configuration.
//!
//! All tunable parameters live here with their production defaults.
//! Values can be overridden from a JSON file via
//! [`FileConfigStore`](crate::adapters::config_file::FileConfigStore);
//! every loaded config passes [`Validate`] before it is used.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::pins;

/// Range checks applied after loading and before saving.
pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

// ═══════════════════════════════════════════════════════════════
//  Agent
// ═══════════════════════════════════════════════════════════════

/// Raspberry Pi agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// `host:port` of the relay's agent listener.
    pub relay_addr: String,
    pub pwm: PwmConfig,
    pub motion: MotionConfig,
    pub dispense: DispenseConfig,
    pub audio: AudioConfig,
    pub link: LinkConfig,
    pub capture: CaptureConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            relay_addr: "127.0.0.1:8765".into(),
            pwm: PwmConfig::default(),
            motion: MotionConfig::default(),
            dispense: DispenseConfig::default(),
            audio: AudioConfig::default(),
            link: LinkConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl Validate for AgentConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.relay_addr.is_empty() {
            return Err(ConfigError::ValidationFailed("relay_addr is empty"));
        }
        self.pwm.validate()?;
        self.motion.validate()?;
        self.dispense.validate()?;
        self.audio.validate()?;
        self.link.validate()?;
        self.capture.validate()
    }
}

/// PCA9685 bring-up parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PwmConfig {
    /// I2C device node of the camera gimbal board.
    pub camera_bus: String,
    /// I2C device node of the dispense servo board.
    pub dispense_bus: String,
    pub camera_address: u8,
    pub dispense_address: u8,
    /// Output frequency (Hz). Hobby servos expect 50 Hz.
    pub frequency_hz: u32,
    pub oscillator_hz: u32,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            camera_bus: "/dev/i2c-3".into(),
            dispense_bus: "/dev/i2c-1".into(),
            camera_address: pins::PCA9685_ADDRESS,
            dispense_address: pins::PCA9685_ADDRESS,
            frequency_hz: 50,
            oscillator_hz: pins::PCA9685_OSCILLATOR_HZ,
        }
    }
}

impl Validate for PwmConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        // PCA9685 datasheet: 24 Hz .. 1526 Hz with the internal oscillator.
        if !(24..=1526).contains(&self.frequency_hz) {
            return Err(ConfigError::ValidationFailed("pwm.frequency_hz outside 24..=1526"));
        }
        if self.oscillator_hz == 0 {
            return Err(ConfigError::ValidationFailed("pwm.oscillator_hz is zero"));
        }
        if self.camera_address > 0x7F || self.dispense_address > 0x7F {
            return Err(ConfigError::ValidationFailed("pwm address is not 7-bit"));
        }
        Ok(())
    }
}

/// Pan/tilt gimbal motion parameters (raw PWM ticks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub min_tick: u16,
    pub max_tick: u16,
    /// Position both axes are homed to at startup.
    pub home_tick: u16,
    /// Distance covered by one `cam` command.
    pub step: u16,
    /// Tick increment between interpolated writes.
    pub stride: u16,
    /// Pause after each interpolated write (ms).
    pub step_delay_ms: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            min_tick: 150,
            max_tick: 600,
            home_tick: 300,
            step: 25,
            stride: 1,
            step_delay_ms: 5,
        }
    }
}

impl Validate for MotionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_tick >= self.max_tick {
            return Err(ConfigError::ValidationFailed("motion.min_tick must be below max_tick"));
        }
        if self.max_tick > 4095 {
            return Err(ConfigError::ValidationFailed("motion.max_tick exceeds 12-bit range"));
        }
        if !(self.min_tick..=self.max_tick).contains(&self.home_tick) {
            return Err(ConfigError::ValidationFailed("motion.home_tick outside bounds"));
        }
        if self.step == 0 || self.stride == 0 {
            return Err(ConfigError::ValidationFailed("motion.step and motion.stride must be non-zero"));
        }
        Ok(())
    }
}

/// Treat dispenser servo parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispenseConfig {
    /// Number of populated motor slots (channels 0..slots on the dispense bank).
    pub slots: u8,
    pub release_deg: u16,
    pub rest_deg: u16,
    pub dwell_ms: u32,
    pub min_pulse_us: u16,
    pub max_pulse_us: u16,
    pub actuation_range_deg: u16,
}

impl Default for DispenseConfig {
    fn default() -> Self {
        Self {
            slots: pins::DISPENSE_CHANNELS.len() as u8,
            release_deg: 0,
            rest_deg: 90,
            dwell_ms: 2000,
            min_pulse_us: 500,
            max_pulse_us: 2500,
            actuation_range_deg: 180,
        }
    }
}

impl Validate for DispenseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.slots == 0 || self.slots as usize > pins::DISPENSE_CHANNELS.len() {
            return Err(ConfigError::ValidationFailed("dispense.slots outside 1..=6"));
        }
        if self.min_pulse_us >= self.max_pulse_us {
            return Err(ConfigError::ValidationFailed("dispense.min_pulse_us must be below max_pulse_us"));
        }
        if self.actuation_range_deg == 0
            || self.release_deg > self.actuation_range_deg
            || self.rest_deg > self.actuation_range_deg
        {
            return Err(ConfigError::ValidationFailed("dispense angles outside actuation range"));
        }
        Ok(())
    }
}

/// External transcoder / player commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// argv of the transcoder; reads the payload on stdin, writes WAV to stdout.
    pub transcoder: Vec<String>,
    /// argv of the player; reads WAV on stdin.
    pub player: Vec<String>,
    /// Upper bound on one playback (s).
    pub timeout_secs: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let argv = |s: &[&str]| s.iter().map(|a| (*a).to_owned()).collect();
        Self {
            transcoder: argv(&[
                "ffmpeg", "-hide_banner", "-loglevel", "error", "-i", "pipe:0", "-f", "wav", "pipe:1",
            ]),
            player: argv(&["aplay"]),
            timeout_secs: 120,
        }
    }
}

impl Validate for AudioConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.transcoder.is_empty() || self.player.is_empty() {
            return Err(ConfigError::ValidationFailed("audio commands must not be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed("audio.timeout_secs is zero"));
        }
        Ok(())
    }
}

/// Live-channel timing and reconnection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Receive timeout per loop iteration (ms). Expiry is not an error.
    pub recv_timeout_ms: u32,
    /// Sleep at the end of every serving iteration (ms).
    pub idle_ms: u32,
    /// Longest accepted JSON line (bytes).
    pub max_line_bytes: usize,
    /// Upper bound on one TCP connect (ms).
    pub connect_timeout_ms: u32,
    /// Send a `ping` line after this much loop time without sending (ms).
    pub heartbeat_ms: u32,
    /// Leave `Serving` after this much loop time without receiving (ms).
    pub peer_timeout_ms: u32,
    pub reconnect: ReconnectConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            recv_timeout_ms: 10,
            idle_ms: 100,
            max_line_bytes: 16 * 1024 * 1024,
            connect_timeout_ms: 5_000,
            heartbeat_ms: 20_000,
            peer_timeout_ms: 40_000,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Validate for LinkConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.recv_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("link.recv_timeout_ms is zero"));
        }
        if self.max_line_bytes < 64 {
            return Err(ConfigError::ValidationFailed("link.max_line_bytes below 64"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("link.connect_timeout_ms is zero"));
        }
        if self.heartbeat_ms == 0 || self.peer_timeout_ms <= self.heartbeat_ms {
            return Err(ConfigError::ValidationFailed(
                "link.peer_timeout_ms must exceed a non-zero heartbeat_ms",
            ));
        }
        self.reconnect.validate()
    }
}

/// Bounded exponential backoff (initial → ×2 … capped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Consecutive failed attempts before the agent gives up. 0 disables
    /// reconnection entirely.
    pub max_attempts: u32,
    pub initial_backoff_ms: u32,
    pub max_backoff_ms: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 2_000,
            max_backoff_ms: 60_000,
        }
    }
}

impl ReconnectConfig {
    /// Backoff before reconnect attempt number `attempt` (0-based).
    pub fn backoff_ms(&self, attempt: u32) -> u32 {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms)
    }
}

impl Validate for ReconnectConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::ValidationFailed("reconnect.initial_backoff_ms above max"));
        }
        Ok(())
    }
}

/// Camera / microphone capture processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub video_enabled: bool,
    /// argv producing an MJPEG byte stream on stdout.
    pub video_command: Vec<String>,
    /// Discard the splitter buffer if it grows beyond this without a frame.
    pub max_frame_bytes: usize,
    pub audio_enabled: bool,
    /// argv producing raw PCM on stdout.
    pub audio_command: Vec<String>,
    pub audio_chunk_bytes: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let argv = |s: &[&str]| s.iter().map(|a| (*a).to_owned()).collect();
        Self {
            video_enabled: true,
            video_command: argv(&[
                "libcamera-vid", "-t", "0", "--codec", "mjpeg", "--width", "640", "--height", "480",
                "--framerate", "15", "--nopreview", "-o", "-",
            ]),
            max_frame_bytes: 2 * 1024 * 1024,
            audio_enabled: true,
            audio_command: argv(&[
                "arecord", "-f", "S16_LE", "-r", "44100", "-c", "1", "-t", "raw", "-D", "plughw:3,0", "-",
            ]),
            audio_chunk_bytes: 4096,
        }
    }
}

impl Validate for CaptureConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.video_enabled && self.video_command.is_empty() {
            return Err(ConfigError::ValidationFailed("capture.video_command is empty"));
        }
        if self.audio_enabled && self.audio_command.is_empty() {
            return Err(ConfigError::ValidationFailed("capture.audio_command is empty"));
        }
        if self.audio_chunk_bytes == 0 || self.max_frame_bytes < 1024 {
            return Err(ConfigError::ValidationFailed("capture buffer sizes too small"));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Relay
// ═══════════════════════════════════════════════════════════════

/// What a full queue does with a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Refuse the new entry; the submitter is told `accepted: false`.
    RejectNew,
    /// Evict the oldest queued entry to make room.
    DropOldest,
}

/// Per-kind queue bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub motor_capacity: usize,
    pub cam_capacity: usize,
    pub audio_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            motor_capacity: 64,
            cam_capacity: 64,
            audio_capacity: 8,
            overflow: OverflowPolicy::RejectNew,
        }
    }
}

/// Relay server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Where the agent connects.
    pub agent_listen: String,
    /// Where control-surface clients submit commands.
    pub control_listen: String,
    /// Sleep between forwarding iterations (ms).
    pub poll_interval_ms: u32,
    pub max_line_bytes: usize,
    /// Drop the agent session after this long without an inbound line (ms).
    /// Must outlast the agent's longest blocking command (audio timeout).
    pub agent_timeout_ms: u32,
    /// Control-surface connections served at once; extra clients are
    /// refused with an error reply.
    pub max_control_clients: usize,
    /// Close control connections silent for this long (ms).
    pub control_idle_ms: u32,
    pub queues: QueueConfig,
    /// Directory receiving `latest.jpg` / `latest.pcm`; `None` keeps
    /// telemetry in memory only.
    pub telemetry_dir: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            agent_listen: "0.0.0.0:8765".into(),
            control_listen: "127.0.0.1:8766".into(),
            poll_interval_ms: 100,
            max_line_bytes: 16 * 1024 * 1024,
            agent_timeout_ms: 180_000,
            max_control_clients: 32,
            control_idle_ms: 30_000,
            queues: QueueConfig::default(),
            telemetry_dir: None,
        }
    }
}

impl Validate for RelayConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_listen.is_empty() || self.control_listen.is_empty() {
            return Err(ConfigError::ValidationFailed("listen addresses must not be empty"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("poll_interval_ms is zero"));
        }
        if self.max_line_bytes < 64 {
            return Err(ConfigError::ValidationFailed("max_line_bytes below 64"));
        }
        if self.agent_timeout_ms == 0 || self.control_idle_ms == 0 || self.max_control_clients == 0 {
            return Err(ConfigError::ValidationFailed("relay timeouts and client limit must be non-zero"));
        }
        let q = &self.queues;
        if q.motor_capacity == 0 || q.cam_capacity == 0 || q.audio_capacity == 0 {
            return Err(ConfigError::ValidationFailed("queue capacities must be non-zero"));
        }
        Ok(())
    }
}
