//! Live-channel plumbing shared by the agent and the relay.
//!
//! - [`codec`]: newline framing with a line-length cap
//! - [`messages`]: JSON message types and their decoders/encoders
//! - [`transport`]: `LiveChannel` / `Connector` traits, TCP implementation
//! - [`channels`]: telemetry outbox between capture threads and the agent loop

pub mod channels;
pub mod codec;
pub mod messages;
pub mod transport;
