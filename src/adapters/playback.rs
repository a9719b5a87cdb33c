//! Subprocess audio sink: transcoder piped into a player.
//!
//! ```text
//!  payload ──feed thread──▶ ffmpeg stdin │ ffmpeg stdout ──▶ aplay stdin ──▶ speaker
//! ```
//!
//! Both processes are polled with `try_wait` against a deadline. On expiry
//! both are killed and reaped before `PlaybackError::Timeout` is returned,
//! so no playback outlives its call.

use std::io::Write;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::app::ports::AudioSink;
use crate::config::AudioConfig;
use crate::error::PlaybackError;

const WAIT_POLL: Duration = Duration::from_millis(20);

pub struct ProcessAudioSink {
    transcoder: Vec<String>,
    player: Vec<String>,
    timeout: Duration,
}

impl ProcessAudioSink {
    pub fn new(transcoder: Vec<String>, player: Vec<String>, timeout: Duration) -> Self {
        Self {
            transcoder,
            player,
            timeout,
        }
    }

    pub fn from_config(cfg: &AudioConfig) -> Self {
        Self::new(
            cfg.transcoder.clone(),
            cfg.player.clone(),
            Duration::from_secs(u64::from(cfg.timeout_secs)),
        )
    }
}

fn command(argv: &[String]) -> Result<Command, PlaybackError> {
    let (program, args) = argv.split_first().ok_or(PlaybackError::SpawnFailed)?;
    let mut cmd = Command::new(program);
    cmd.args(args);
    Ok(cmd)
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl AudioSink for ProcessAudioSink {
    fn play(&mut self, payload: &[u8]) -> Result<(), PlaybackError> {
        let mut transcoder = command(&self.transcoder)?
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| {
                warn!("Audio: cannot start {:?}: {}", self.transcoder.first(), e);
                PlaybackError::SpawnFailed
            })?;

        let (Some(mut stdin), Some(wav)) = (transcoder.stdin.take(), transcoder.stdout.take()) else {
            reap(&mut transcoder);
            return Err(PlaybackError::SpawnFailed);
        };

        let mut player = match command(&self.player)
            .and_then(|mut c| {
                c.stdin(Stdio::from(wav))
                    .stdout(Stdio::null())
                    .spawn()
                    .map_err(|e| {
                        warn!("Audio: cannot start {:?}: {}", self.player.first(), e);
                        PlaybackError::SpawnFailed
                    })
            }) {
            Ok(p) => p,
            Err(e) => {
                reap(&mut transcoder);
                return Err(e);
            }
        };

        let data = payload.to_vec();
        let feeder = thread::spawn(move || stdin.write_all(&data));

        let deadline = Instant::now() + self.timeout;
        let mut transcoder_status: Option<ExitStatus> = None;
        let mut player_status: Option<ExitStatus> = None;
        loop {
            if transcoder_status.is_none() {
                transcoder_status = transcoder.try_wait().ok().flatten();
            }
            if player_status.is_none() {
                player_status = player.try_wait().ok().flatten();
            }
            if transcoder_status.is_some() && player_status.is_some() {
                break;
            }
            if Instant::now() >= deadline {
                warn!("Audio: playback exceeded {:?}, killing", self.timeout);
                reap(&mut transcoder);
                reap(&mut player);
                let _ = feeder.join();
                return Err(PlaybackError::Timeout);
            }
            thread::sleep(WAIT_POLL);
        }

        let fed = matches!(feeder.join(), Ok(Ok(())));
        match (transcoder_status, player_status) {
            (Some(t), _) if !t.success() => Err(PlaybackError::TranscoderFailed(t.code())),
            (_, Some(p)) if !p.success() => Err(PlaybackError::PlayerFailed(p.code())),
            _ if !fed => Err(PlaybackError::FeedFailed),
            _ => {
                debug!("Audio: {} bytes played", payload.len());
                Ok(())
            }
        }
    }
}
