//! Newline-delimited frame codec.
//!
//! Wire format:
//! ```text
//! ┌──────────────────────────────┬────┐
//! │ UTF-8 JSON object (≤ max B)  │ \n │
//! └──────────────────────────────┴────┘
//! ```
//!
//! The decoder accumulates incoming bytes and yields complete lines. A
//! single socket read may return part of a line, several lines, or both.
//! A line that grows past the limit is discarded up to its terminating
//! newline and reported once as [`ProtocolDecodeError::LineTooLong`].

use std::collections::VecDeque;

use crate::error::ProtocolDecodeError;

/// Decoder state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Collecting bytes of the current line.
    Collecting,
    /// Current line exceeded the limit; skip to the next `\n`.
    Discarding,
}

/// Streaming line decoder.
pub struct LineDecoder {
    state: DecoderState,
    max_line: usize,
    partial: Vec<u8>,
    ready: VecDeque<Result<String, ProtocolDecodeError>>,
}

impl LineDecoder {
    pub fn new(max_line: usize) -> Self {
        Self {
            state: DecoderState::Collecting,
            max_line,
            partial: Vec::new(),
            ready: VecDeque::new(),
        }
    }

    /// Feed bytes into the decoder. Completed lines become available
    /// through [`next_line`](Self::next_line).
    pub fn feed(&mut self, data: &[u8]) {
        for segment in data.split_inclusive(|&b| b == b'\n') {
            let terminated = segment.last() == Some(&b'\n');
            let body = if terminated {
                &segment[..segment.len() - 1]
            } else {
                segment
            };

            if self.state == DecoderState::Collecting {
                if self.partial.len() + body.len() > self.max_line {
                    self.partial = Vec::new();
                    self.state = DecoderState::Discarding;
                    self.ready.push_back(Err(ProtocolDecodeError::LineTooLong));
                } else {
                    self.partial.extend_from_slice(body);
                }
            }

            if terminated {
                if self.state == DecoderState::Collecting {
                    self.finish_line();
                }
                self.state = DecoderState::Collecting;
            }
        }
    }

    /// Pop the next complete line (without its terminator).
    pub fn next_line(&mut self) -> Option<Result<String, ProtocolDecodeError>> {
        self.ready.pop_front()
    }

    /// Bytes of the unterminated line held so far.
    pub fn pending(&self) -> usize {
        self.partial.len()
    }

    /// Reset decoder state (e.g. after a reconnect).
    pub fn reset(&mut self) {
        self.state = DecoderState::Collecting;
        self.partial.clear();
        self.ready.clear();
    }

    fn finish_line(&mut self) {
        let mut line = core::mem::take(&mut self.partial);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        self.ready
            .push_back(String::from_utf8(line).map_err(|_| ProtocolDecodeError::InvalidJson));
    }
}

/// Terminate an encoded message for the wire.
pub fn encode_line(mut json: String) -> String {
    json.push('\n');
    json
}
