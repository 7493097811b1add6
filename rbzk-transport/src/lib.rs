//! Transport layer for the ZK protocol
//!
//! Two framing variants exist: TCP wraps every packet in an 8-byte
//! outer frame, UDP sends the inner packet as a bare datagram. Both
//! hand complete inner packets (header + payload) to the session layer.

pub mod error;
pub mod tcp;
pub mod udp;

pub use error::{Error, Result};
pub use tcp::TcpTransport;
pub use udp::UdpTransport;

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

/// One de-framed reply as it came off the wire.
#[derive(Debug)]
pub struct Frame {
    /// Inner packet bytes (8-byte header + payload)
    pub bytes: BytesMut,

    /// Declared frame length (TCP) or datagram length (UDP)
    pub length: usize,

    /// TCP frames of 8 bytes or fewer are keep-alives, not replies
    pub keep_alive: bool,
}

/// Transport trait for the two communication modes
#[async_trait]
pub trait Transport: Send {
    /// Connect to device
    async fn connect(&mut self) -> Result<()>;

    /// Disconnect from device
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Send one inner packet, framing it as the mode requires
    async fn send(&mut self, inner: &[u8]) -> Result<()>;

    /// Receive one frame, waiting at most `timeout`
    async fn receive(&mut self, timeout: Duration) -> Result<Frame>;

    /// Get remote address
    fn remote_addr(&self) -> String;

    /// Largest chunk a bulk read may request in this mode
    fn max_chunk(&self) -> usize;
}
