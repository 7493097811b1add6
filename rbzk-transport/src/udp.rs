//! UDP transport
//!
//! The inner packet travels as a bare datagram; there is no outer
//! frame and no keep-alive.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use rbzk_core::constants::MAX_CHUNK_UDP;

use crate::{error::*, Frame, Transport};

/// UDP transport
pub struct UdpTransport {
    addr: String,
    port: u16,
    socket: Option<UdpSocket>,
    remote_addr: Option<SocketAddr>,
}

impl UdpTransport {
    /// Create new UDP transport
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
            socket: None,
            remote_addr: None,
        }
    }

    /// Resolve address to SocketAddr
    async fn resolve_addr(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.remote_addr {
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

        self.remote_addr = Some(*addr);
        Ok(*addr)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let remote = self.resolve_addr().await?;

        debug!("Connecting to {} via UDP...", remote);

        let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(Error::Io)?;
        socket.connect(remote).await.map_err(Error::Io)?;

        debug!("Connected to {} via UDP", remote);

        self.socket = Some(socket);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.socket.take().is_some() {
            debug!("Disconnecting from {}...", self.remote_addr());
        }

        self.remote_addr = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    async fn send(&mut self, inner: &[u8]) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(Error::NotConnected)?;

        trace!(
            "Sending {} bytes via UDP: {:02X?}",
            inner.len(),
            &inner[..inner.len().min(24)]
        );

        socket.send(inner).await.map_err(Error::Io)?;

        Ok(())
    }

    async fn receive(&mut self, deadline: Duration) -> Result<Frame> {
        let socket = self.socket.as_ref().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::zeroed(MAX_CHUNK_UDP + 8);

        let n = timeout(deadline, socket.recv(&mut buf))
            .await
            .map_err(|_| {
                warn!("UDP read timeout after {:?}", deadline);
                Error::ReadTimeout
            })?
            .map_err(Error::Io)?;

        if n == 0 {
            warn!("Received empty datagram");
            return Err(Error::ConnectionClosed);
        }

        buf.truncate(n);

        trace!("Received {} bytes via UDP: {:02X?}", n, &buf[..n.min(24)]);

        Ok(Frame {
            bytes: buf,
            length: n,
            keep_alive: false,
        })
    }

    fn remote_addr(&self) -> String {
        self.remote_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.addr, self.port))
    }

    fn max_chunk(&self) -> usize {
        MAX_CHUNK_UDP
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbzk_core::{Command, Packet};

    #[tokio::test]
    async fn test_udp_transport_create() {
        let transport = UdpTransport::new("192.168.1.201", 4370);
        assert!(!transport.is_connected());
        assert_eq!(transport.max_chunk(), 16 * 1024);
    }

    #[tokio::test]
    async fn test_udp_transport_invalid_address() {
        let mut transport = UdpTransport::new("invalid..address", 4370);
        assert!(transport.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_udp_datagram_roundtrip() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        let echo = tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            let (n, peer) = server.recv_from(&mut buf).await.unwrap();

            // Answer with an ACK_OK that echoes the request's ids
            let request = Packet::decode(BytesMut::from(&buf[..n])).unwrap();
            let reply = Packet::new(Command::AckOk, request.session_id, request.reply_id);
            server.send_to(&reply.encode(), peer).await.unwrap();

            request
        });

        let mut transport = UdpTransport::new(addr.ip().to_string(), addr.port());
        transport.connect().await.unwrap();

        let request = Packet::new(Command::Connect, 0, 0xFFFE);
        transport.send(&request.encode()).await.unwrap();

        let frame = transport.receive(Duration::from_secs(2)).await.unwrap();
        assert!(!frame.keep_alive);
        let reply = Packet::decode(frame.bytes).unwrap();
        assert_eq!(reply.command, Command::AckOk);
        assert_eq!(reply.reply_id, 0xFFFE);

        let seen = echo.await.unwrap();
        assert_eq!(seen.command, Command::Connect);

        transport.disconnect().await.unwrap();
    }
}
