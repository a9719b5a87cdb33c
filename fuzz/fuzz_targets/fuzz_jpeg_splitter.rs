//! Fuzz target: `JpegSplitter::push`
//!
//! Camera output is untrusted bytes. Every emitted frame must be
//! delimited by SOI/EOI and the pending buffer must stay bounded.
//!
//! cargo fuzz run fuzz_jpeg_splitter

#![no_main]

use libfuzzer_sys::fuzz_target;
use petpal::capture::{FrameSplitter, JpegSplitter};

const MAX_FRAME: usize = 4096;

fuzz_target!(|data: &[u8]| {
    let mut splitter = JpegSplitter::new(MAX_FRAME);
    let mut frames = Vec::new();
    for chunk in data.chunks(97) {
        splitter.push(chunk, &mut frames);
        assert!(splitter.buffered() <= MAX_FRAME + 97);
    }
    for f in &frames {
        assert!(f.len() >= 4);
        assert_eq!(&f[..2], &[0xFF, 0xD8]);
        assert_eq!(&f[f.len() - 2..], &[0xFF, 0xD9]);
    }
});
