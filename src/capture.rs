//! Byte-stream splitters for the camera and microphone captures.
//!
//! `libcamera-vid --codec mjpeg` writes back-to-back JPEG images with no
//! container, so frames are recovered by scanning for the SOI (`FF D8`)
//! and EOI (`FF D9`) markers. `arecord` output is headerless PCM and is
//! simply cut into fixed-size chunks.

/// Splits a continuous byte stream into telemetry frames.
pub trait FrameSplitter {
    /// Consume `data`, appending every completed frame to `out`.
    fn push(&mut self, data: &[u8], out: &mut Vec<Vec<u8>>);
}

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

fn find(haystack: &[u8], needle: [u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == needle)
}

/// Recovers JPEG images from an MJPEG byte stream.
pub struct JpegSplitter {
    buf: Vec<u8>,
    max_frame: usize,
}

impl JpegSplitter {
    /// A pending frame larger than `max_frame` is discarded.
    pub fn new(max_frame: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame,
        }
    }

    /// Bytes held while waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl FrameSplitter for JpegSplitter {
    fn push(&mut self, data: &[u8], out: &mut Vec<Vec<u8>>) {
        self.buf.extend_from_slice(data);
        loop {
            let Some(start) = find(&self.buf, SOI) else {
                // Keep a trailing 0xFF: it may be the first half of an SOI.
                let keep = usize::from(self.buf.last() == Some(&0xFF));
                self.buf.drain(..self.buf.len() - keep);
                return;
            };
            match find(&self.buf[start + 2..], EOI) {
                Some(rel) => {
                    let end = start + 2 + rel + 2;
                    out.push(self.buf[start..end].to_vec());
                    self.buf.drain(..end);
                }
                None => {
                    self.buf.drain(..start);
                    if self.buf.len() > self.max_frame {
                        log::warn!(
                            "Capture: JPEG frame exceeded {} bytes, discarding",
                            self.max_frame
                        );
                        self.buf.clear();
                    }
                    return;
                }
            }
        }
    }
}

/// Cuts raw PCM into fixed-size chunks.
pub struct AudioChunker {
    buf: Vec<u8>,
    chunk: usize,
}

impl AudioChunker {
    /// `chunk` is raised to at least 1.
    pub fn new(chunk: usize) -> Self {
        let chunk = chunk.max(1);
        Self {
            buf: Vec::with_capacity(chunk),
            chunk,
        }
    }
}

impl FrameSplitter for AudioChunker {
    fn push(&mut self, mut data: &[u8], out: &mut Vec<Vec<u8>>) {
        while !data.is_empty() {
            let take = (self.chunk - self.buf.len()).min(data.len());
            self.buf.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buf.len() == self.chunk {
                out.push(core::mem::replace(&mut self.buf, Vec::with_capacity(self.chunk)));
            }
        }
    }
}
