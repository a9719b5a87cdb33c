//! Audio playback pipeline.
//!
//! Thin policy layer over an [`AudioSink`]: rejects empty payloads before
//! anything is spawned and logs the outcome. One payload at a time; the
//! call blocks until the sink reports completion.

use log::{info, warn};

use crate::app::ports::AudioSink;
use crate::error::PlaybackError;

pub struct PlaybackPipeline<A> {
    sink: A,
}

impl<A: AudioSink> PlaybackPipeline<A> {
    pub fn new(sink: A) -> Self {
        Self { sink }
    }

    pub fn play(&mut self, payload: &[u8]) -> Result<usize, PlaybackError> {
        if payload.is_empty() {
            return Err(PlaybackError::EmptyPayload);
        }
        info!("Audio: playing {} bytes", payload.len());
        match self.sink.play(payload) {
            Ok(()) => Ok(payload.len()),
            Err(e) => {
                warn!("Audio: playback failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn sink(&self) -> &A {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut A {
        &mut self.sink
    }
}
