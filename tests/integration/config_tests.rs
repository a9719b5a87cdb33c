//! Configuration files as an operator would write them.

use std::path::PathBuf;

use petpal::adapters::config_file::FileConfigStore;
use petpal::app::ports::{ConfigError, ConfigPort};
use petpal::config::{AgentConfig, OverflowPolicy, RelayConfig, Validate};

fn write_temp(name: &str, body: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("petpal-it-{}-{}", std::process::id(), name));
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn defaults_are_valid() {
    AgentConfig::default().validate().unwrap();
    RelayConfig::default().validate().unwrap();
}

#[test]
fn partial_agent_file_keeps_other_defaults() {
    let path = write_temp(
        "agent.json",
        r#"{
            "relay_addr": "10.0.0.2:8765",
            "motion": { "step": 10 },
            "link": { "reconnect": { "max_attempts": 8 } }
        }"#,
    );
    let cfg = FileConfigStore::<AgentConfig>::new(&path).load().unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(cfg.relay_addr, "10.0.0.2:8765");
    assert_eq!(cfg.motion.step, 10);
    assert_eq!(cfg.motion.min_tick, 150);
    assert_eq!(cfg.motion.max_tick, 600);
    assert_eq!(cfg.link.reconnect.max_attempts, 8);
    assert_eq!(cfg.link.reconnect.initial_backoff_ms, 2_000);
    assert_eq!(cfg.dispense.dwell_ms, 2_000);
}

#[test]
fn inverted_motion_bounds_are_rejected() {
    let path = write_temp("bounds.json", r#"{ "motion": { "min_tick": 700 } }"#);
    let res = FileConfigStore::<AgentConfig>::new(&path).load();
    std::fs::remove_file(&path).unwrap();

    assert!(matches!(res, Err(ConfigError::ValidationFailed(_))));
}

#[test]
fn relay_overflow_policy_is_kebab_case() {
    let path = write_temp(
        "relay.json",
        r#"{ "queues": { "overflow": "drop-oldest", "audio_capacity": 2 }, "telemetry_dir": "/tmp/petpal" }"#,
    );
    let cfg = FileConfigStore::<RelayConfig>::new(&path).load().unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(cfg.queues.overflow, OverflowPolicy::DropOldest);
    assert_eq!(cfg.queues.audio_capacity, 2);
    assert_eq!(cfg.queues.motor_capacity, 64);
    assert_eq!(cfg.telemetry_dir.as_deref(), Some("/tmp/petpal"));
}

#[test]
fn backoff_schedule_doubles_up_to_the_cap() {
    let r = AgentConfig::default().link.reconnect;
    let schedule: Vec<u32> = (0..7).map(|n| r.backoff_ms(n)).collect();
    assert_eq!(schedule, [2_000, 4_000, 8_000, 16_000, 32_000, 60_000, 60_000]);
}

#[test]
fn liveness_settings_load_from_file() {
    let path = write_temp(
        "liveness.json",
        r#"{ "link": { "heartbeat_ms": 5000, "peer_timeout_ms": 12000, "connect_timeout_ms": 750 } }"#,
    );
    let cfg = FileConfigStore::<AgentConfig>::new(&path).load().unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(cfg.link.heartbeat_ms, 5_000);
    assert_eq!(cfg.link.peer_timeout_ms, 12_000);
    assert_eq!(cfg.link.connect_timeout_ms, 750);
    assert_eq!(cfg.link.recv_timeout_ms, 10);
}

#[test]
fn peer_timeout_shorter_than_heartbeat_is_rejected() {
    let path = write_temp(
        "liveness-bad.json",
        r#"{ "link": { "heartbeat_ms": 5000, "peer_timeout_ms": 4000 } }"#,
    );
    let res = FileConfigStore::<AgentConfig>::new(&path).load();
    std::fs::remove_file(&path).unwrap();

    assert!(matches!(res, Err(ConfigError::ValidationFailed(_))));
}
