//! Camera and microphone capture processes.
//!
//! Each capture is one child process (`libcamera-vid`, `arecord`) read by
//! a dedicated thread. The thread splits stdout into frames and offers
//! them to the telemetry outbox; it never blocks on the network.

use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};

use log::{info, warn};

use crate::capture::{AudioChunker, FrameSplitter, JpegSplitter};
use crate::config::CaptureConfig;
use crate::link::channels::{TelemetryOutbox, offer};
use crate::link::messages::{MediaKind, TelemetryFrame};

const READ_BUF_SIZE: usize = 64 * 1024;

/// Start every capture enabled in `cfg`.
pub fn spawn_all(
    cfg: &CaptureConfig,
    outbox: &'static TelemetryOutbox,
) -> io::Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::new();
    if cfg.video_enabled {
        handles.push(spawn_capture(
            &cfg.video_command,
            MediaKind::Video,
            JpegSplitter::new(cfg.max_frame_bytes),
            outbox,
        )?);
    }
    if cfg.audio_enabled {
        handles.push(spawn_capture(
            &cfg.audio_command,
            MediaKind::Audio,
            AudioChunker::new(cfg.audio_chunk_bytes),
            outbox,
        )?);
    }
    Ok(handles)
}

/// Spawn `argv` and pump its stdout through `splitter` into `outbox`.
pub fn spawn_capture<S>(
    argv: &[String],
    media: MediaKind,
    splitter: S,
    outbox: &'static TelemetryOutbox,
) -> io::Result<JoinHandle<()>>
where
    S: FrameSplitter + Send + 'static,
{
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty capture command"))?;
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .spawn()?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("capture stdout not piped"))?;
    info!("Capture: {} started ({})", media.as_str(), program);

    thread::Builder::new()
        .name(format!("capture-{}", media.as_str()))
        .spawn(move || {
            let frames = pump(stdout, media, splitter, outbox);
            let _ = child.kill();
            let _ = child.wait();
            warn!("Capture: {} stopped after {} frames", media.as_str(), frames);
        })
}

/// Read `source` to EOF; returns the number of frames produced.
pub fn pump(
    mut source: impl Read,
    media: MediaKind,
    mut splitter: impl FrameSplitter,
    outbox: &TelemetryOutbox,
) -> u64 {
    let mut buf = vec![0u8; READ_BUF_SIZE];
    let mut frames = Vec::new();
    let mut produced = 0;
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => return produced,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Capture: {} read failed: {}", media.as_str(), e);
                return produced;
            }
        };
        splitter.push(&buf[..n], &mut frames);
        for data in frames.drain(..) {
            produced += 1;
            offer(outbox, TelemetryFrame { media, data });
        }
    }
}
