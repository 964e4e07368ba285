//! Datagram transport abstraction.
//!
//! The protocol core never touches sockets directly: it sends and receives
//! whole frames through the `Transport` trait. A timed-out or malformed
//! datagram is "no data this tick", never an error, so a lossy channel can't
//! crash a session loop.
//!
//! Two implementations exist:
//! - [`UdpTransport`] here, over a std UDP socket
//! - [`crate::link::LossyLink`], a deterministic in-process pair for tests
//!   and demo runs

use crate::error::{Error, Result};
use crate::frame::Frame;
use std::net::UdpSocket;
use std::time::Duration;

/// Receive buffer size; frames are tens of bytes but leave room for a few
/// kilobytes of oversized/foreign datagrams so they can be read and dropped.
const RECV_BUF_SIZE: usize = 2048;

/// Point-to-point datagram transport for protocol frames.
pub trait Transport {
    /// Send one frame to `dest` ("host:port").
    ///
    /// # Errors
    /// I/O failures and sends on a closed transport.
    fn send(&mut self, frame: &Frame, dest: &str) -> Result<()>;

    /// Receive one frame, waiting at most `timeout`.
    ///
    /// Returns `None` on timeout, on a malformed datagram, and after
    /// `close`; never propagates either condition as an error.
    fn recv(&mut self, timeout: Duration) -> Option<Frame>;

    /// Release the underlying channel. Subsequent sends fail and receives
    /// yield `None`.
    fn close(&mut self);
}

/// Counters describing transport-level behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportStats {
    /// Frames handed to the OS for sending
    pub frames_sent: u64,

    /// Frames received and parsed successfully
    pub frames_received: u64,

    /// Datagrams dropped because they failed to parse
    pub malformed: u64,

    /// Receive calls that returned nothing within the timeout
    pub timeouts: u64,
}

/// UDP implementation of [`Transport`].
///
/// # Thread Safety
/// Not thread-safe; the sessions are single-threaded control loops and own
/// their transport exclusively.
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    buf: [u8; RECV_BUF_SIZE],
    stats: TransportStats,
}

impl UdpTransport {
    /// Bind a socket on `addr` ("host:port"; port 0 for an ephemeral
    /// sender-side port).
    pub fn bind(addr: &str) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        Ok(Self {
            socket: Some(socket),
            buf: [0u8; RECV_BUF_SIZE],
            stats: TransportStats::default(),
        })
    }

    /// Local address of the bound socket, if still open.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, frame: &Frame, dest: &str) -> Result<()> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| Error::Channel("send on closed transport".to_string()))?;

        socket.send_to(&frame.serialize(), dest)?;
        self.stats.frames_sent += 1;
        Ok(())
    }

    fn recv(&mut self, timeout: Duration) -> Option<Frame> {
        let socket = self.socket.as_ref()?;

        // A zero read timeout is invalid for std sockets; use nonblocking
        // mode for poll-style receives instead.
        let configured = if timeout.is_zero() {
            socket.set_nonblocking(true)
        } else {
            socket
                .set_nonblocking(false)
                .and_then(|_| socket.set_read_timeout(Some(timeout)))
        };
        if configured.is_err() {
            self.stats.timeouts += 1;
            return None;
        }

        match socket.recv_from(&mut self.buf) {
            Ok((len, _peer)) => match Frame::deserialize(&self.buf[..len]) {
                Ok(frame) => {
                    self.stats.frames_received += 1;
                    Some(frame)
                }
                Err(_) => {
                    self.stats.malformed += 1;
                    None
                }
            },
            Err(_) => {
                // Timeout, WouldBlock, or transient socket error: all map
                // to "no data this tick"
                self.stats.timeouts += 1;
                None
            }
        }
    }

    fn close(&mut self) {
        // Dropping the socket releases the port
        self.socket = None;
    }
}
