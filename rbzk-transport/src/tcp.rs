//! TCP transport
//!
//! Every request and reply rides inside an 8-byte outer frame
//! `[0x5050, 0x7D82, length:u32]`. Frames declaring 8 bytes or fewer
//! are keep-alives.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use rbzk_core::constants::MAX_CHUNK_TCP;
use rbzk_core::packet::{decode_frame_header, encode_frame_header, FRAME_HEADER_SIZE, HEADER_SIZE};

use crate::{error::*, Frame, Transport};

/// Upper bound on a single frame; devices never send more per reply
const MAX_FRAME: usize = 1024 * 1024;

/// TCP transport
pub struct TcpTransport {
    addr: String,
    port: u16,
    socket_addr: Option<SocketAddr>,
    stream: Option<TcpStream>,
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create new TCP transport
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
            socket_addr: None,
            stream: None,
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Resolve address to SocketAddr
    async fn resolve_addr(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.socket_addr {
            return Ok(addr);
        }

        let addr_str = format!("{}:{}", self.addr, self.port);

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", addr_str, e)))?
            .collect();

        let addr = addrs
            .first()
            .ok_or_else(|| Error::InvalidAddress(format!("No addresses found for {}", addr_str)))?;

        self.socket_addr = Some(*addr);
        Ok(*addr)
    }

    async fn read_exact_timed(
        stream: &mut TcpStream,
        buf: &mut [u8],
        deadline: Duration,
    ) -> Result<()> {
        match timeout(deadline, stream.read_exact(buf)).await {
            Err(_) => Err(Error::ReadTimeout),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(Error::ConnectionClosed)
            }
            Ok(Err(e)) => Err(Error::Io(e)),
            Ok(Ok(_)) => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let addr = self.resolve_addr().await?;

        debug!("Connecting to {}...", addr);

        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectionTimeout)?
            .map_err(Error::Io)?;

        // Request/reply traffic; Nagle only adds latency
        stream.set_nodelay(true)?;

        debug!("Connected to {}", addr);

        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Disconnecting from {}...", self.remote_addr());
            let _ = stream.shutdown().await;
        }

        self.socket_addr = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, inner: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + inner.len());
        buf.put_slice(&encode_frame_header(inner.len() as u32));
        buf.put_slice(inner);

        trace!("Sending {} bytes: {:02X?}", buf.len(), &buf[..buf.len().min(24)]);

        stream.write_all(&buf).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn receive(&mut self, deadline: Duration) -> Result<Frame> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut header = [0u8; FRAME_HEADER_SIZE];
        Self::read_exact_timed(stream, &mut header, deadline).await?;

        let length = decode_frame_header(&header).map_err(|_| {
            let magic1 = u16::from_le_bytes([header[0], header[1]]);
            let magic2 = u16::from_le_bytes([header[2], header[3]]);
            Error::BadMagic { magic1, magic2 }
        })? as usize;

        if length > MAX_FRAME {
            return Err(Error::FrameTooLarge(length));
        }

        let mut bytes = BytesMut::zeroed(length);
        Self::read_exact_timed(stream, &mut bytes, deadline).await?;

        trace!(
            "Received frame of {} bytes: {:02X?}",
            length,
            &bytes[..bytes.len().min(24)]
        );

        Ok(Frame {
            keep_alive: length <= HEADER_SIZE,
            bytes,
            length,
        })
    }

    fn remote_addr(&self) -> String {
        self.socket_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.addr, self.port))
    }

    fn max_chunk(&self) -> usize {
        MAX_CHUNK_TCP
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("TCP transport dropped while still connected");
        }
    }
}
