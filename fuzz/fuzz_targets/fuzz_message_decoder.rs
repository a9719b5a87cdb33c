//! Fuzz target: JSON-lines message decoders
//!
//! Every inbound line, from the relay, the agent or a control client,
//! must decode to a value or a `ProtocolDecodeError`, never a panic. A
//! decoded command must survive re-encoding unchanged.
//!
//! cargo fuzz run fuzz_message_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use petpal::link::messages::{
    decode_agent_line, decode_control_line, decode_downlink_line, decode_telemetry_line,
    decode_uplink_line, encode_command,
};

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(cmd) = decode_agent_line(line) {
        let again = decode_agent_line(encode_command(&cmd).trim_end())
            .expect("re-encoded command must decode");
        assert_eq!(cmd, again);
    }
    let _ = decode_downlink_line(line);
    let _ = decode_uplink_line(line);
    let _ = decode_telemetry_line(line);
    let _ = decode_control_line(line);
});
