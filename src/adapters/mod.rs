//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                   |
//! |----------------|--------------------|-------------------------------|
//! | `capture`      | —                  | libcamera-vid / arecord       |
//! | `config_file`  | ConfigPort         | JSON file on disk             |
//! | `hardware`     | PulseOutput        | PCA9685 via /dev/i2c-* (Pi)   |
//! |                | ServoOutput        |                               |
//! | `log_sink`     | EventSink          | `log` facade                  |
//! | `playback`     | AudioSink          | ffmpeg → aplay                |

pub mod capture;
pub mod config_file;
#[cfg(feature = "linux-hw")]
pub mod hardware;
pub mod log_sink;
pub mod playback;
