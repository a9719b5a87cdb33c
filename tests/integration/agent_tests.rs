//! Agent loop → AgentService → actuators, end to end against mocks.
//!
//! Each test scripts what the relay "sends" and inspects the virtual
//! timeline of PWM writes, servo moves, playbacks and sleeps.

use super::mock_hw::{
    Clock, ClockDelay, PulseWrite, RecordingEvents, RecordingPwm, RecordingServos,
    ScriptedChannel, ScriptedConnector, Step, TimedSpeaker,
};

use core::time::Duration;

use petpal::app::agent_loop::AgentLoop;
use petpal::app::commands::CommandKind;
use petpal::app::events::AgentEvent;
use petpal::app::service::AgentService;
use petpal::config::{DispenseConfig, LinkConfig, MotionConfig};
use petpal::control::dispense::DispenseController;
use petpal::control::motion::{Axis, MotionController};
use petpal::control::playback::PlaybackPipeline;
use petpal::error::{Error, InvalidActuatorError, ProtocolDecodeError, Result};
use petpal::link::channels::{OUTBOX_DEPTH, TelemetryOutbox, offer};
use petpal::link::messages::{MediaKind, TelemetryFrame, decode_telemetry_line, encode_ping};
use petpal::link::transport::{Connector, LiveChannel};

type Service = AgentService<RecordingPwm, RecordingServos, TimedSpeaker, ClockDelay>;

struct Rig {
    clock: Clock,
    service: Service,
}

fn rig(audio_ms: u64) -> Rig {
    rig_with(audio_ms, None)
}

fn rig_with(audio_ms: u64, fail_after: Option<usize>) -> Rig {
    let clock = Clock::default();
    let mut pwm = RecordingPwm::new(&clock);
    pwm.fail_after = fail_after;
    let service = AgentService::new(
        MotionController::new(pwm, ClockDelay::new(&clock), MotionConfig::default()),
        DispenseController::new(
            RecordingServos::new(&clock, 6),
            ClockDelay::new(&clock),
            DispenseConfig::default(),
        ),
        PlaybackPipeline::new(TimedSpeaker::new(&clock, audio_ms)),
    );
    Rig { clock, service }
}

fn pan_writes(service: &Service) -> Vec<PulseWrite> {
    service
        .motion()
        .output()
        .writes
        .borrow()
        .iter()
        .copied()
        .filter(|w| w.channel == Axis::Pan.channel())
        .collect()
}

const CAM_LEFT: &str = r#"{"type":"cam","direction":"left"}"#;
const CAM_RIGHT: &str = r#"{"type":"cam","direction":"right"}"#;

// ── Motion ────────────────────────────────────────────────────

#[test]
fn cam_right_sweeps_pan_through_every_tick() {
    let Rig { clock, mut service } = rig(0);
    let outbox = TelemetryOutbox::new();
    let connector = ScriptedConnector::new(&clock, [Some(ScriptedChannel::lines([CAM_RIGHT]))]);
    let mut agent = AgentLoop::new(connector, ClockDelay::new(&clock), LinkConfig::default(), &outbox);
    let mut events = RecordingEvents::default();

    agent.run(&mut service, &mut events).unwrap();

    let ticks: Vec<u16> = pan_writes(&service).iter().map(|w| w.off_tick).collect();
    assert_eq!(ticks, (300..=325).collect::<Vec<_>>());
    assert_eq!(service.motion_state().leftright, 325);
    assert_eq!(service.motion_state().updown, 300);
    assert!(events.events.contains(&AgentEvent::Moved {
        axis: Axis::Pan,
        from: 300,
        to: 325,
    }));
}

#[test]
fn commands_queued_behind_audio_wait_for_playback_to_finish() {
    let Rig { clock, mut service } = rig(3_000);
    let outbox = TelemetryOutbox::new();
    let channel = ScriptedChannel::lines([r#"{"type":"audio","data":"AAEC"}"#, CAM_LEFT, CAM_LEFT]);
    let connector = ScriptedConnector::new(&clock, [Some(channel)]);
    let mut agent = AgentLoop::new(connector, ClockDelay::new(&clock), LinkConfig::default(), &outbox);
    let mut events = RecordingEvents::default();

    agent.run(&mut service, &mut events).unwrap();

    let plays = service.playback().sink().plays.borrow().clone();
    assert_eq!(plays.len(), 1);
    let (start, end, bytes) = plays[0];
    assert_eq!(bytes, 3);
    assert_eq!(end - start, 3_000);

    let writes = pan_writes(&service);
    assert_eq!(writes.len(), 2 * 26);
    assert!(
        writes.iter().all(|w| w.at_ms >= end),
        "gimbal moved while audio was still playing"
    );

    // Second sweep picks up where the first ended.
    let (first, second) = writes.split_at(26);
    assert_eq!(first.last().unwrap().off_tick, 275);
    assert_eq!(second.first().unwrap().off_tick, 275);
    assert!(second.first().unwrap().at_ms >= first.last().unwrap().at_ms);
    assert_eq!(service.motion_state().leftright, 250);
}

#[test]
fn cam_commands_at_bound_do_not_touch_hardware() {
    let Rig { clock, mut service } = rig(0);
    let outbox = TelemetryOutbox::new();
    // 300 → 150 takes six lefts; the seventh is at the bound.
    let lefts = [CAM_LEFT; 7];
    let connector = ScriptedConnector::new(&clock, [Some(ScriptedChannel::lines(lefts))]);
    let mut agent = AgentLoop::new(connector, ClockDelay::new(&clock), LinkConfig::default(), &outbox);
    let mut events = RecordingEvents::default();

    agent.run(&mut service, &mut events).unwrap();

    assert_eq!(service.motion_state().leftright, 150);
    assert!(pan_writes(&service).iter().all(|w| w.off_tick >= 150));
    assert_eq!(
        events.events.iter().filter(|e| matches!(e, AgentEvent::AtBound { .. })).count(),
        1
    );
}

// ── Dispense ──────────────────────────────────────────────────

#[test]
fn motor_command_opens_dwells_and_rests() {
    let Rig { clock, mut service } = rig(0);
    let outbox = TelemetryOutbox::new();
    let channel = ScriptedChannel::lines([r#"{"type":"command","motor":1}"#]);
    let connector = ScriptedConnector::new(&clock, [Some(channel)]);
    let mut agent = AgentLoop::new(connector, ClockDelay::new(&clock), LinkConfig::default(), &outbox);
    let mut events = RecordingEvents::default();

    agent.run(&mut service, &mut events).unwrap();

    let moves = service.dispense().servo().moves.borrow().clone();
    assert_eq!(moves.len(), 2);
    assert_eq!((moves[0].1, moves[0].2), (1, 0));
    assert_eq!((moves[1].1, moves[1].2), (1, 90));
    assert_eq!(moves[1].0 - moves[0].0, 2_000);
    assert!(events.events.contains(&AgentEvent::Dispensed { slot: 1 }));
}

#[test]
fn invalid_motor_is_reported_and_the_loop_keeps_serving() {
    let Rig { clock, mut service } = rig(0);
    let outbox = TelemetryOutbox::new();
    let channel = ScriptedChannel::lines([r#"{"type":"command","motor":9}"#, CAM_RIGHT]);
    let connector = ScriptedConnector::new(&clock, [Some(channel)]);
    let mut agent = AgentLoop::new(connector, ClockDelay::new(&clock), LinkConfig::default(), &outbox);
    let mut events = RecordingEvents::default();

    agent.run(&mut service, &mut events).unwrap();

    assert!(events.events.contains(&AgentEvent::CommandFailed {
        kind: CommandKind::Motor,
        error: Error::InvalidActuator(InvalidActuatorError::MotorSlot(9)),
    }));
    assert!(service.dispense().servo().moves.borrow().is_empty());
    assert_eq!(service.motion_state().leftright, 325);
    assert_eq!(service.handled(), 2);
}

#[test]
fn negative_and_oversized_motor_ids_are_invalid_actuators() {
    let Rig { clock, mut service } = rig(0);
    let outbox = TelemetryOutbox::new();
    let channel = ScriptedChannel::lines([
        r#"{"type":"command","motor":-1}"#,
        r#"{"type":"command","motor":4294967296}"#,
    ]);
    let connector = ScriptedConnector::new(&clock, [Some(channel)]);
    let mut agent = AgentLoop::new(connector, ClockDelay::new(&clock), LinkConfig::default(), &outbox);
    let mut events = RecordingEvents::default();

    agent.run(&mut service, &mut events).unwrap();

    for motor_id in [-1, 4_294_967_296] {
        assert!(events.events.contains(&AgentEvent::CommandFailed {
            kind: CommandKind::Motor,
            error: Error::InvalidActuator(InvalidActuatorError::MotorSlot(motor_id)),
        }));
    }
    assert!(service.dispense().servo().moves.borrow().is_empty());
}

// ── Protocol robustness ───────────────────────────────────────

#[test]
fn malformed_lines_are_dropped_without_side_effects() {
    let Rig { clock, mut service } = rig(0);
    let outbox = TelemetryOutbox::new();
    let channel = ScriptedChannel::new([
        Step::Line("not json".into()),
        Step::Line(r#"{"type":"dance"}"#.into()),
        Step::Line(r#"{"direction":"up"}"#.into()),
        Step::Fail(Error::Protocol(ProtocolDecodeError::LineTooLong)),
        Step::Timeout,
        Step::Line(CAM_RIGHT.into()),
    ]);
    let connector = ScriptedConnector::new(&clock, [Some(channel)]);
    let mut agent = AgentLoop::new(connector, ClockDelay::new(&clock), LinkConfig::default(), &outbox);
    let mut events = RecordingEvents::default();

    agent.run(&mut service, &mut events).unwrap();

    let dropped: Vec<_> = events
        .events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::MessageDropped(reason) => Some(*reason),
            _ => None,
        })
        .collect();
    assert_eq!(
        dropped,
        [
            ProtocolDecodeError::InvalidJson,
            ProtocolDecodeError::UnknownType,
            ProtocolDecodeError::MissingType,
            ProtocolDecodeError::LineTooLong,
        ]
    );
    // The same session survived all of it.
    assert_eq!(
        events.events.iter().filter(|e| matches!(e, AgentEvent::Connected { .. })).count(),
        1
    );
    assert_eq!(service.motion_state().leftright, 325);
    assert_eq!(service.handled(), 1);
}

// ── Reconnection ──────────────────────────────────────────────

#[test]
fn unreachable_relay_backs_off_exponentially_then_gives_up() {
    let Rig { clock, mut service } = rig(0);
    let outbox = TelemetryOutbox::new();
    let loop_delay = ClockDelay::new(&clock);
    let sleeps = loop_delay.sleeps.clone();
    let connector = ScriptedConnector::new(&clock, []);
    let mut agent = AgentLoop::new(connector, loop_delay, LinkConfig::default(), &outbox);
    let mut events = RecordingEvents::default();

    agent.run(&mut service, &mut events).unwrap();

    assert_eq!(*sleeps.borrow(), [2_000, 4_000, 8_000, 16_000, 32_000]);
    assert_eq!(agent.connector().attempts, [0, 2_000, 6_000, 14_000, 30_000, 62_000]);
    assert_eq!(events.events.last(), Some(&AgentEvent::GaveUp { attempts: 5 }));
}

#[test]
fn successful_reconnect_resets_the_backoff() {
    let Rig { clock, mut service } = rig(0);
    let outbox = TelemetryOutbox::new();
    let loop_delay = ClockDelay::new(&clock);
    let sleeps = loop_delay.sleeps.clone();
    let connector = ScriptedConnector::new(
        &clock,
        [
            Some(ScriptedChannel::lines([CAM_RIGHT])),
            None,
            Some(ScriptedChannel::lines([CAM_RIGHT])),
        ],
    );
    let mut agent = AgentLoop::new(connector, loop_delay, LinkConfig::default(), &outbox);
    let mut events = RecordingEvents::default();

    agent.run(&mut service, &mut events).unwrap();

    assert_eq!(service.motion_state().leftright, 350);
    assert!(events.events.contains(&AgentEvent::Connected { backoffs: 2 }));
    assert_eq!(
        events.events.iter().filter(|e| **e == AgentEvent::Disconnected).count(),
        2
    );
    // Backoff restarts at 2 s after the second session drops.
    let backoffs: Vec<u32> = sleeps.borrow().iter().copied().filter(|ms| *ms >= 1_000).collect();
    assert_eq!(backoffs, [2_000, 4_000, 2_000, 4_000, 8_000, 16_000, 32_000]);
}

#[test]
fn zero_max_attempts_closes_on_first_failure() {
    let Rig { clock, mut service } = rig(0);
    let outbox = TelemetryOutbox::new();
    let mut cfg = LinkConfig::default();
    cfg.reconnect.max_attempts = 0;
    let connector = ScriptedConnector::new(&clock, []);
    let mut agent = AgentLoop::new(connector, ClockDelay::new(&clock), cfg, &outbox);
    let mut events = RecordingEvents::default();

    agent.run(&mut service, &mut events).unwrap();

    assert_eq!(agent.connector().attempts.len(), 1);
    assert_eq!(events.events, [AgentEvent::GaveUp { attempts: 0 }]);
}

// ── Fatal errors ──────────────────────────────────────────────

#[test]
fn bus_error_stops_the_agent() {
    let Rig { clock, mut service } = rig_with(0, Some(3));
    let outbox = TelemetryOutbox::new();
    let channel = ScriptedChannel::lines([CAM_RIGHT, CAM_RIGHT]);
    let connector = ScriptedConnector::new(&clock, [Some(channel)]);
    let mut agent = AgentLoop::new(connector, ClockDelay::new(&clock), LinkConfig::default(), &outbox);
    let mut events = RecordingEvents::default();

    let err = agent.run(&mut service, &mut events).unwrap_err();

    assert!(matches!(err, Error::Bus(_)));
    assert!(err.is_fatal());
    // Three writes landed (300, 301, 302); state matches the last one.
    assert_eq!(service.motion_state().leftright, 302);
    assert_eq!(agent.connector().attempts.len(), 1);
    assert!(!events.events.iter().any(|e| matches!(e, AgentEvent::Reconnecting { .. })));
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn queued_telemetry_is_sent_before_receiving() {
    let Rig { clock, mut service } = rig(0);
    let outbox = TelemetryOutbox::new();
    assert!(offer(&outbox, TelemetryFrame {
        media: MediaKind::Video,
        data: vec![0xFF, 0xD8, 0xFF, 0xD9],
    }));
    assert!(offer(&outbox, TelemetryFrame {
        media: MediaKind::Audio,
        data: vec![1, 2, 3, 4],
    }));

    let channel = ScriptedChannel::new([Step::Timeout]);
    let sent = channel.sent.clone();
    let connector = ScriptedConnector::new(&clock, [Some(channel)]);
    let mut agent = AgentLoop::new(connector, ClockDelay::new(&clock), LinkConfig::default(), &outbox);
    let mut events = RecordingEvents::default();

    agent.run(&mut service, &mut events).unwrap();

    let sent = sent.borrow();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|l| l.ends_with('\n')));
    let video = decode_telemetry_line(sent[0].trim_end()).unwrap();
    assert_eq!(video.media, MediaKind::Video);
    assert_eq!(video.data, [0xFF, 0xD8, 0xFF, 0xD9]);
    let audio = decode_telemetry_line(sent[1].trim_end()).unwrap();
    assert_eq!(audio.media, MediaKind::Audio);
    assert!(events.events.contains(&AgentEvent::TelemetrySent { frames: 2 }));
    assert!(outbox.try_receive().is_err());
}

/// Offers a new frame for every line it sends, like a camera producing
/// faster than the link drains. Receives are logged as `<recv>`.
struct BusyCapture<'a> {
    outbox: &'a TelemetryOutbox,
    refills: usize,
    log: Vec<String>,
}

impl LiveChannel for BusyCapture<'_> {
    fn recv_timeout(&mut self, _timeout: Duration) -> Result<Option<String>> {
        self.log.push("<recv>".into());
        if self.log.iter().filter(|l| *l == "<recv>").count() > 1 {
            return Err(Error::ChannelDisconnect);
        }
        Ok(None)
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        self.log.push(line.to_owned());
        if self.refills > 0 {
            self.refills -= 1;
            offer(self.outbox, TelemetryFrame {
                media: MediaKind::Audio,
                data: vec![0; 4],
            });
        }
        Ok(())
    }
}

struct OneSession<'a>(Option<BusyCapture<'a>>);

impl<'a> Connector for OneSession<'a> {
    type Channel = BusyCapture<'a>;

    fn connect(&mut self) -> Result<BusyCapture<'a>> {
        self.0.take().ok_or(Error::ChannelDisconnect)
    }
}

#[test]
fn busy_capture_cannot_starve_the_receive() {
    let Rig { clock, mut service } = rig(0);
    let outbox = TelemetryOutbox::new();
    for _ in 0..OUTBOX_DEPTH {
        offer(&outbox, TelemetryFrame {
            media: MediaKind::Video,
            data: vec![0xFF, 0xD8, 0xFF, 0xD9],
        });
    }
    let mut cfg = LinkConfig::default();
    cfg.reconnect.max_attempts = 0;
    let channel = BusyCapture {
        outbox: &outbox,
        refills: 100,
        log: Vec::new(),
    };
    let mut agent = AgentLoop::new(OneSession(Some(channel)), ClockDelay::new(&clock), cfg, &outbox);
    let mut events = RecordingEvents::default();

    agent.run(&mut service, &mut events).unwrap();

    let sent: Vec<usize> = events
        .events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::TelemetrySent { frames } => Some(*frames),
            _ => None,
        })
        .collect();
    assert_eq!(sent, [OUTBOX_DEPTH, OUTBOX_DEPTH]);
    assert!(events.events.contains(&AgentEvent::Disconnected));
}

// ── Heartbeat ─────────────────────────────────────────────────

fn heartbeat_link() -> LinkConfig {
    let mut cfg = LinkConfig::default();
    cfg.recv_timeout_ms = 10;
    cfg.idle_ms = 100;
    cfg.heartbeat_ms = 300;
    cfg.peer_timeout_ms = 1_000;
    cfg.reconnect.max_attempts = 0;
    cfg
}

#[test]
fn silent_relay_is_pinged_then_dropped() {
    let Rig { clock, mut service } = rig(0);
    let outbox = TelemetryOutbox::new();
    let channel = ScriptedChannel::new(std::iter::repeat_n(Step::Timeout, 20));
    let sent = channel.sent.clone();
    let connector = ScriptedConnector::new(&clock, [Some(channel)]);
    let mut agent = AgentLoop::new(connector, ClockDelay::new(&clock), heartbeat_link(), &outbox);
    let mut events = RecordingEvents::default();

    agent.run(&mut service, &mut events).unwrap();

    // 110 ms of loop time per iteration: pings on iterations 4, 7 and 10,
    // and the tenth iteration crosses the 1 s silence limit.
    assert_eq!(*sent.borrow(), vec![encode_ping(); 3]);
    assert_eq!(clock.now_ms(), 1_000);
    assert_eq!(
        events.events,
        [
            AgentEvent::Connected { backoffs: 0 },
            AgentEvent::Disconnected,
            AgentEvent::GaveUp { attempts: 0 },
        ]
    );
}

#[test]
fn pongs_keep_a_quiet_session_alive() {
    let Rig { clock, mut service } = rig(0);
    let outbox = TelemetryOutbox::new();
    let mut script = Vec::new();
    for _ in 0..3 {
        script.extend(std::iter::repeat_n(Step::Timeout, 8));
        script.push(Step::Line(r#"{"type":"pong"}"#.into()));
    }
    script.push(Step::Line(CAM_RIGHT.into()));
    let connector = ScriptedConnector::new(&clock, [Some(ScriptedChannel::new(script))]);
    let mut agent = AgentLoop::new(connector, ClockDelay::new(&clock), heartbeat_link(), &outbox);
    let mut events = RecordingEvents::default();

    agent.run(&mut service, &mut events).unwrap();

    // Well past the silence limit, yet the final command still arrived.
    assert!(clock.now_ms() > 2_500);
    assert_eq!(service.motion_state().leftright, 325);
    assert!(!events.events.iter().any(|e| matches!(e, AgentEvent::MessageDropped(_))));
    assert_eq!(events.count(|e| *e == AgentEvent::Disconnected), 1);
}
