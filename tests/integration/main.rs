//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters or loopback sockets. All tests run on the host
//! with no real hardware required.

mod agent_tests;
mod config_tests;
mod mock_hw;
