//! Relay network front-end.
//!
//! Runs on one thread using `edge-executor` for cooperative scheduling and
//! the `async-io-mini` reactor for socket readiness and timers:
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────────┐
//!  │  block_on(LocalExecutor::run)                                │
//!  │                                                              │
//!  │  ┌───────────────┐  ┌────────────────┐   ┌────────────────┐  │
//!  │  │ Agent session │  │ Control accept │──▶│ Control clients│  │
//!  │  │ one at a time │  │ wake-on-accept │   │ slot table 5ms⏱│  │
//!  │  └───────────────┘  └────────────────┘   └────────────────┘  │
//!  └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The agent session forwards at most one command per kind per poll
//! interval and stores inbound telemetry while it waits. Further agents
//! queue in the listen backlog until the current session ends.
//!
//! Control clients live in one slot table polled by a single task, so an
//! idle connection costs a non-blocking read per tick and never holds up
//! another client's submission. The table is capped at
//! `max_control_clients`; connections beyond it get an error reply.

use core::cell::RefCell;
use core::future::Future;
use core::time::Duration;
use std::io::{self, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::rc::Rc;
use std::time::Instant;

use async_io_mini::{Async, Timer};
use edge_executor::LocalExecutor;
use futures_lite::future;
use log::{debug, info, warn};

use crate::app::commands::CommandKind;
use crate::config::RelayConfig;
use crate::link::codec::LineDecoder;
use crate::link::messages::{
    ControlReply, Uplink, decode_uplink_line, encode_command, encode_pong, encode_reply,
};
use crate::link::transport::{read_some, write_all};

use super::service::RelayService;

const READ_BUF_SIZE: usize = 16 * 1024;

/// Control-table poll period.
const CONTROL_TICK: Duration = Duration::from_millis(5);

/// Reads per control client per tick.
const CONTROL_READS_PER_TICK: usize = 4;

/// Upper bound on writing one control reply.
const CONTROL_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Both listeners, bound and ready to serve.
pub struct RelayServer {
    agent: Async<TcpListener>,
    control: Async<TcpListener>,
    poll: Duration,
    max_line: usize,
    agent_timeout: Duration,
    max_control: usize,
    control_idle: Duration,
}

impl RelayServer {
    pub fn bind(cfg: &RelayConfig) -> io::Result<Self> {
        let agent = Async::new(TcpListener::bind(&cfg.agent_listen)?)?;
        let control = Async::new(TcpListener::bind(&cfg.control_listen)?)?;
        Ok(Self {
            agent,
            control,
            poll: Duration::from_millis(u64::from(cfg.poll_interval_ms)),
            max_line: cfg.max_line_bytes,
            agent_timeout: Duration::from_millis(u64::from(cfg.agent_timeout_ms)),
            max_control: cfg.max_control_clients,
            control_idle: Duration::from_millis(u64::from(cfg.control_idle_ms)),
        })
    }

    pub fn agent_addr(&self) -> io::Result<SocketAddr> {
        self.agent.get_ref().local_addr()
    }

    pub fn control_addr(&self) -> io::Result<SocketAddr> {
        self.control.get_ref().local_addr()
    }

    /// Serve forever on the calling thread.
    pub fn serve(&self, service: &RelayService) {
        let clients = ControlSlots::default();
        let executor: LocalExecutor<'_, 8> = LocalExecutor::new();

        executor.spawn(self.agent_sessions(service)).detach();
        executor.spawn(self.accept_control(&clients)).detach();
        executor.spawn(self.control_loop(&clients, service)).detach();

        info!(
            "Relay: agents on {:?}, control on {:?} ({} clients max)",
            self.agent_addr().ok(),
            self.control_addr().ok(),
            self.max_control
        );
        future::block_on(executor.run(core::future::pending::<()>()));
    }

    // ── Agent side ────────────────────────────────────────────

    async fn agent_sessions(&self, service: &RelayService) {
        loop {
            match self.agent.read_with(TcpListener::accept).await {
                Ok((stream, peer)) => {
                    info!("Relay: agent {} connected", peer);
                    match Async::new(stream) {
                        Ok(stream) => self.serve_agent(&stream, service).await,
                        Err(e) => warn!("Relay: agent socket setup failed: {}", e),
                    }
                    info!("Relay: agent {} disconnected", peer);
                }
                Err(e) => {
                    warn!("Relay: agent accept failed: {}", e);
                    Timer::after(self.poll).await;
                }
            }
        }
    }

    async fn serve_agent(&self, stream: &Async<TcpStream>, service: &RelayService) {
        let mut decoder = LineDecoder::new(self.max_line);
        let mut buf = vec![0u8; READ_BUF_SIZE];
        let mut last_rx = Instant::now();

        loop {
            if last_rx.elapsed() >= self.agent_timeout {
                warn!("Relay: agent silent for {:?}, dropping session", last_rx.elapsed());
                return;
            }

            // Forward
            if forward_due(service, |line| async move { write_all(stream, line.as_bytes()).await })
                .await
                .is_err()
            {
                return;
            }

            // Ingest telemetry until the poll interval elapses
            let mut tick = Timer::after(self.poll);
            loop {
                let read = async { read_some(stream, &mut buf).await.map(Some) };
                let expire = async {
                    (&mut tick).await;
                    Ok(None)
                };
                let outcome = future::or(read, expire).await;
                match outcome {
                    Ok(None) => break,
                    Ok(Some(0)) => return,
                    Ok(Some(n)) => {
                        last_rx = Instant::now();
                        decoder.feed(&buf[..n]);
                        let mut pong_due = false;
                        while let Some(line) = decoder.next_line() {
                            match line.and_then(|l| decode_uplink_line(&l)) {
                                Ok(Uplink::Telemetry(frame)) => {
                                    service.ingest(frame);
                                }
                                Ok(Uplink::Ping) => pong_due = true,
                                Err(e) => warn!("Relay: dropped agent line: {}", e),
                            }
                        }
                        if pong_due {
                            if let Err(e) = write_all(stream, encode_pong().as_bytes()).await {
                                warn!("Relay: pong failed: {}", e);
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Relay: agent read failed: {}", e);
                        return;
                    }
                }
            }
        }
    }

    // ── Control side ──────────────────────────────────────────

    async fn accept_control(&self, clients: &ControlSlots) {
        loop {
            match self.control.read_with(TcpListener::accept).await {
                Ok((stream, peer)) => match Async::new(stream) {
                    Ok(stream) => {
                        if clients.borrow().len() >= self.max_control {
                            warn!("Relay: control client {} refused, table full", peer);
                            let busy = encode_reply(&ControlReply::Error {
                                reason: "relay busy".into(),
                            });
                            let _ = bounded_write(&stream, &busy).await;
                            continue;
                        }
                        debug!("Relay: control client {} connected", peer);
                        clients.borrow_mut().push(ControlClient::new(stream, peer, self.max_line));
                    }
                    Err(e) => warn!("Relay: control socket setup failed: {}", e),
                },
                Err(e) => {
                    warn!("Relay: control accept failed: {}", e);
                    Timer::after(self.poll).await;
                }
            }
        }
    }

    /// Poll every control client once per tick, answer complete requests,
    /// drop closed, failed or idle connections.
    async fn control_loop(&self, clients: &ControlSlots, service: &RelayService) {
        let mut buf = vec![0u8; READ_BUF_SIZE];
        loop {
            let mut i = 0;
            loop {
                let (stream, peer, replies, mut open) = {
                    let mut table = clients.borrow_mut();
                    let Some(client) = table.get_mut(i) else {
                        break;
                    };
                    let open = client.pump(&mut buf, self.control_idle);
                    let replies = client.answer(service);
                    (client.stream.clone(), client.peer, replies, open)
                };

                for reply in replies {
                    if let Err(e) = bounded_write(&stream, &reply).await {
                        debug!("Relay: control client {} write failed: {}", peer, e);
                        open = false;
                        break;
                    }
                }

                if open {
                    i += 1;
                } else {
                    debug!("Relay: control client {} closed", peer);
                    clients.borrow_mut().remove(i);
                }
            }
            Timer::after(CONTROL_TICK).await;
        }
    }
}

// ── Forwarding ────────────────────────────────────────────────

/// Forward at most one queued command per kind, in motor → cam → audio
/// order, through `send`.
///
/// Commands are popped one at a time, so when a send fails only the
/// command in flight is lost; kinds not yet reached stay queued for the
/// next session. Returns how many commands went out.
pub async fn forward_due<F, Fut>(service: &RelayService, mut send: F) -> io::Result<usize>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    let mut sent = 0;
    for kind in CommandKind::FORWARD_ORDER {
        let Some(cmd) = service.pop(kind) else {
            continue;
        };
        if let Err(e) = send(encode_command(&cmd)).await {
            warn!("Relay: forwarding {:?} failed, command lost: {}", kind, e);
            return Err(e);
        }
        sent += 1;
    }
    Ok(sent)
}

// ── Control client slots ──────────────────────────────────────

type ControlSlots = RefCell<Vec<ControlClient>>;

struct ControlClient {
    stream: Rc<Async<TcpStream>>,
    peer: SocketAddr,
    decoder: LineDecoder,
    last_seen: Instant,
}

impl ControlClient {
    fn new(stream: Async<TcpStream>, peer: SocketAddr, max_line: usize) -> Self {
        Self {
            stream: Rc::new(stream),
            peer,
            decoder: LineDecoder::new(max_line),
            last_seen: Instant::now(),
        }
    }

    /// Non-blocking reads into the decoder. `false` once the client is
    /// gone or has been idle for `idle`.
    fn pump(&mut self, buf: &mut [u8], idle: Duration) -> bool {
        for _ in 0..CONTROL_READS_PER_TICK {
            let mut reader: &TcpStream = self.stream.get_ref();
            match reader.read(buf) {
                Ok(0) => return false,
                Ok(n) => {
                    self.last_seen = Instant::now();
                    self.decoder.feed(&buf[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    debug!("Relay: control client {} read failed: {}", self.peer, e);
                    return false;
                }
            }
        }
        if self.last_seen.elapsed() >= idle {
            debug!("Relay: control client {} idle", self.peer);
            return false;
        }
        true
    }

    /// Encoded replies to every complete request line buffered so far.
    fn answer(&mut self, service: &RelayService) -> Vec<String> {
        let mut replies = Vec::new();
        while let Some(line) = self.decoder.next_line() {
            let reply = match line {
                Ok(line) => service.handle_control_line(&line),
                Err(e) => ControlReply::Error {
                    reason: e.to_string(),
                },
            };
            replies.push(encode_reply(&reply));
        }
        replies
    }
}

async fn bounded_write(stream: &Async<TcpStream>, line: &str) -> io::Result<()> {
    let write = write_all(stream, line.as_bytes());
    let expire = async {
        Timer::after(CONTROL_WRITE_TIMEOUT).await;
        Err(io::ErrorKind::TimedOut.into())
    };
    future::or(write, expire).await
}
