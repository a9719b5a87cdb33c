//! Fuzz target: `LineDecoder::feed`
//!
//! Drives arbitrary byte sequences into the streaming line decoder and
//! asserts that it never panics, never yields an over-long line, and
//! accepts bytes cleanly again after a reset.
//!
//! cargo fuzz run fuzz_line_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use petpal::link::codec::LineDecoder;

const MAX_LINE: usize = 256;

fuzz_target!(|data: &[u8]| {
    let mut decoder = LineDecoder::new(MAX_LINE);

    // First byte picks a split point so partial reads get exercised too.
    let split = data.first().map_or(0, |b| usize::from(*b)).min(data.len());
    decoder.feed(&data[..split]);
    decoder.feed(&data[split..]);

    while let Some(line) = decoder.next_line() {
        if let Ok(line) = line {
            assert!(line.len() <= MAX_LINE, "line exceeds limit");
            assert!(!line.contains('\n'), "terminator leaked into line");
        }
    }
    assert!(decoder.pending() <= MAX_LINE);

    decoder.reset();
    assert_eq!(decoder.pending(), 0);
    decoder.feed(data);
});
