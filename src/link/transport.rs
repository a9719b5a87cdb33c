//! Live-channel abstraction and its TCP implementation.
//!
//! The [`AgentLoop`](crate::app::agent_loop::AgentLoop) is generic over
//! [`Connector`] / [`LiveChannel`], so tests drive it with scripted
//! channels and production uses [`TcpConnector`].
//!
//! The TCP channel is synchronous at its API but uses the `async-io-mini`
//! reactor underneath: a receive is `future::or(read, Timer::after(..))`
//! driven by `block_on`, which gives a bounded wait without busy-polling.

use core::time::Duration;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use async_io_mini::{Async, Timer};
use futures_lite::future;
use log::{debug, info, warn};

use crate::error::{Error, Result};

use super::codec::LineDecoder;

const READ_BUF_SIZE: usize = 16 * 1024;

/// One established bidirectional line channel.
pub trait LiveChannel {
    /// Wait at most `timeout` for one complete line.
    ///
    /// `Ok(None)` on timeout. Over-long or non-UTF-8 lines come back as
    /// [`Error::Protocol`] and leave the channel usable; a closed or broken
    /// connection is [`Error::ChannelDisconnect`].
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<String>>;

    /// Write one already-terminated line.
    fn send_line(&mut self, line: &str) -> Result<()>;
}

/// Opens live channels.
pub trait Connector {
    type Channel: LiveChannel;

    fn connect(&mut self) -> Result<Self::Channel>;
}

// ── Reactor-backed socket helpers (shared with the relay) ─────

/// Read whatever is available once the socket becomes readable.
pub(crate) async fn read_some(stream: &Async<TcpStream>, buf: &mut [u8]) -> io::Result<usize> {
    stream
        .read_with(|s| {
            let mut r: &TcpStream = s;
            r.read(buf)
        })
        .await
}

/// Write all of `data`, waiting for writability as needed.
pub(crate) async fn write_all(stream: &Async<TcpStream>, mut data: &[u8]) -> io::Result<()> {
    while !data.is_empty() {
        let n = stream
            .write_with(|s| {
                let mut w: &TcpStream = s;
                w.write(data)
            })
            .await?;
        if n == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        data = &data[n..];
    }
    Ok(())
}

// ── TCP implementation ────────────────────────────────────────

/// Dials the relay's agent listener.
pub struct TcpConnector {
    addr: String,
    max_line: usize,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>, max_line: usize, connect_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            max_line,
            connect_timeout,
        }
    }
}

impl Connector for TcpConnector {
    type Channel = TcpLiveChannel;

    fn connect(&mut self) -> Result<TcpLiveChannel> {
        let addr = self
            .addr
            .to_socket_addrs()
            .ok()
            .and_then(|mut it| it.next())
            .ok_or(Error::Config("relay address does not resolve"))?;
        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout).map_err(|e| {
            warn!("Link: connect to {} failed: {}", addr, e);
            Error::ChannelDisconnect
        })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Link: TCP_NODELAY not set: {}", e);
        }
        info!("Link: connected to {}", addr);
        TcpLiveChannel::new(stream, self.max_line)
    }
}

/// A connected TCP socket speaking newline-delimited JSON.
pub struct TcpLiveChannel {
    stream: Async<TcpStream>,
    decoder: LineDecoder,
    buf: Vec<u8>,
}

impl TcpLiveChannel {
    pub fn new(stream: TcpStream, max_line: usize) -> Result<Self> {
        let stream = Async::new(stream).map_err(|_| Error::ChannelDisconnect)?;
        Ok(Self {
            stream,
            decoder: LineDecoder::new(max_line),
            buf: vec![0; READ_BUF_SIZE],
        })
    }
}

impl LiveChannel for TcpLiveChannel {
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<String>> {
        if let Some(line) = self.decoder.next_line() {
            return line.map(Some).map_err(Error::from);
        }

        let Self {
            stream,
            decoder,
            buf,
        } = self;
        let read = async { read_some(stream, buf).await.map(Some) };
        let expire = async {
            Timer::after(timeout).await;
            Ok(None)
        };

        match future::block_on(future::or(read, expire)) {
            Ok(None) => Ok(None),
            Ok(Some(0)) => {
                info!("Link: relay closed the connection");
                Err(Error::ChannelDisconnect)
            }
            Ok(Some(n)) => {
                decoder.feed(&buf[..n]);
                decoder.next_line().transpose().map_err(Error::from)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => {
                warn!("Link: read failed: {}", e);
                Err(Error::ChannelDisconnect)
            }
        }
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        future::block_on(write_all(&self.stream, line.as_bytes())).map_err(|e| {
            warn!("Link: write failed: {}", e);
            Error::ChannelDisconnect
        })
    }
}
