//! Protocol packet structure and encoding/decoding

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    command::Command,
    constants::{TCP_MAGIC_1, TCP_MAGIC_2},
    error::{Error, Result},
};

/// Protocol packet
///
/// # Packet Structure
///
/// ```text
/// ┌─────────────┬─────────────┬─────────────┬─────────────┬─────────────┐
/// │   Command   │  Checksum   │  SessionID  │  ReplyID    │   Payload   │
/// │   2 bytes   │   2 bytes   │   2 bytes   │   2 bytes   │   N bytes   │
/// │ (LE u16)    │  (LE u16)   │  (LE u16)   │  (LE u16)   │   (bytes)   │
/// └─────────────┴─────────────┴─────────────┴─────────────┴─────────────┘
/// ```
///
/// All multi-byte values are little-endian. Over TCP the packet is
/// preceded by an 8-byte outer frame `[0x5050, 0x7D82, length:u32]`
/// where `length` counts the 8-byte header plus the payload.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    /// Command code
    pub command: Command,

    /// Session identifier (assigned by device on connect)
    pub session_id: u16,

    /// Reply number (advances per packet in a session)
    pub reply_id: u16,

    /// Packet payload (command-specific data)
    pub payload: Bytes,
}

/// Inner packet header size in bytes
pub const HEADER_SIZE: usize = 8;

/// TCP outer frame size in bytes
pub const FRAME_HEADER_SIZE: usize = 8;

impl Packet {
    /// Inner packet header size in bytes
    pub const HEADER_SIZE: usize = HEADER_SIZE;

    /// Create a new packet with empty payload
    pub fn new(command: Command, session_id: u16, reply_id: u16) -> Self {
        Self {
            command,
            session_id,
            reply_id,
            payload: Bytes::new(),
        }
    }

    /// Create a packet with payload
    pub fn with_payload(
        command: Command,
        session_id: u16,
        reply_id: u16,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            command,
            session_id,
            reply_id,
            payload: payload.into(),
        }
    }

    /// Calculate checksum for this packet
    pub fn checksum(&self) -> u16 {
        checksum::calculate(
            self.command.into(),
            self.session_id,
            self.reply_id,
            &self.payload,
        )
    }

    /// Encode the inner packet (header + payload, no outer frame)
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());

        buf.put_u16_le(self.command.into());
        buf.put_u16_le(self.checksum());
        buf.put_u16_le(self.session_id);
        buf.put_u16_le(self.reply_id);
        buf.put_slice(&self.payload);

        buf
    }

    /// Encode the packet with the TCP outer frame prepended
    pub fn encode_tcp(&self) -> BytesMut {
        let inner = self.encode();
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + inner.len());
        buf.put_slice(&encode_frame_header(inner.len() as u32));
        buf.put_slice(&inner);
        buf
    }

    /// Decode an inner packet from bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is shorter than a header, the
    /// command code is unknown, or the checksum does not verify.
    pub fn decode(mut buf: BytesMut) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::PacketTooShort {
                expected: HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let command_raw = buf.get_u16_le();
        let checksum_received = buf.get_u16_le();
        let session_id = buf.get_u16_le();
        let reply_id = buf.get_u16_le();

        let command = Command::try_from(command_raw)?;
        let payload = buf.freeze();

        let packet = Self {
            command,
            session_id,
            reply_id,
            payload,
        };

        let checksum_calculated = packet.checksum();
        if checksum_calculated != checksum_received {
            return Err(Error::ChecksumMismatch {
                expected: checksum_calculated,
                received: checksum_received,
            });
        }

        Ok(packet)
    }

    /// Check if this is a success response
    pub fn is_success(&self) -> bool {
        self.command.is_success()
    }

    /// Get total inner packet size
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Build the 8-byte TCP outer frame header for an inner packet of
/// `length` bytes.
pub fn encode_frame_header(length: u32) -> [u8; FRAME_HEADER_SIZE] {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    header[0..2].copy_from_slice(&TCP_MAGIC_1.to_le_bytes());
    header[2..4].copy_from_slice(&TCP_MAGIC_2.to_le_bytes());
    header[4..8].copy_from_slice(&length.to_le_bytes());
    header
}

/// Parse a TCP outer frame header, returning the declared inner length.
///
/// # Errors
///
/// Returns [`Error::BadFrameMagic`] when the magic words do not match.
pub fn decode_frame_header(header: &[u8; FRAME_HEADER_SIZE]) -> Result<u32> {
    let magic1 = u16::from_le_bytes([header[0], header[1]]);
    let magic2 = u16::from_le_bytes([header[2], header[3]]);

    if magic1 != TCP_MAGIC_1 || magic2 != TCP_MAGIC_2 {
        return Err(Error::BadFrameMagic { magic1, magic2 });
    }

    Ok(u32::from_le_bytes([header[4], header[5], header[6], header[7]]))
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("command", &self.command)
            .field("session_id", &format!("0x{:04X}", self.session_id))
            .field("reply_id", &format!("0x{:04X}", self.reply_id))
            .field("checksum", &format!("0x{:04X}", self.checksum()))
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet[{}](session={}, reply={}, len={})",
            self.command,
            self.session_id,
            self.reply_id,
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_packet_new() {
        let packet = Packet::new(Command::Connect, 0, 0xFFFE);
        assert_eq!(packet.command, Command::Connect);
        assert_eq!(packet.session_id, 0);
        assert_eq!(packet.reply_id, 0xFFFE);
        assert_eq!(packet.payload.len(), 0);
    }

    #[test]
    fn test_connect_packet_golden() {
        // First packet on the wire: CMD_CONNECT, no session yet
        let packet = Packet::new(Command::Connect, 0, 0xFFFE);
        let encoded = packet.encode();
        assert_eq!(
            encoded.as_ref(),
            &[0xE8, 0x03, 0x17, 0xFC, 0x00, 0x00, 0xFE, 0xFF]
        );
    }

    #[test]
    fn test_read_buffer_packet_golden() {
        let payload = vec![0x00, 0x00, 0x00, 0x00, 0x54, 0x07, 0x00, 0x00];
        let packet = Packet::with_payload(Command::ReadBuffer, 13838, 3, payload);
        let encoded = packet.encode();
        assert_eq!(
            encoded.as_ref(),
            &[
                0xE0, 0x05, 0xB9, 0xBC, 0x0E, 0x36, 0x03, 0x00, // header
                0x00, 0x00, 0x00, 0x00, 0x54, 0x07, 0x00, 0x00, // payload
            ]
        );
    }

    #[test]
    fn test_packet_encode_decode() {
        let original = Packet::with_payload(Command::Connect, 0, 0xFFFE, vec![1, 2, 3, 4]);

        let decoded = Packet::decode(original.encode()).unwrap();

        assert_eq!(original.command, decoded.command);
        assert_eq!(original.session_id, decoded.session_id);
        assert_eq!(original.reply_id, decoded.reply_id);
        assert_eq!(original.payload, decoded.payload);
    }

    #[test]
    fn test_packet_checksum_verification() {
        let packet = Packet::new(Command::Connect, 0, 65534);
        let mut encoded = packet.encode();

        // Corrupt checksum (bytes 2-3)
        encoded[2] ^= 0xFF;
        encoded[3] ^= 0xFF;

        let result = Packet::decode(encoded);
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_packet_too_short() {
        let buf = BytesMut::from(&[1, 2, 3][..]);
        assert!(matches!(
            Packet::decode(buf),
            Err(Error::PacketTooShort { .. })
        ));
    }

    #[test]
    fn test_tcp_frame_roundtrip() {
        let packet = Packet::with_payload(Command::AckOk, 100, 200, vec![9, 8, 7]);
        let framed = packet.encode_tcp();

        assert_eq!(framed.len(), FRAME_HEADER_SIZE + packet.size());

        let mut header = [0u8; FRAME_HEADER_SIZE];
        header.copy_from_slice(&framed[..FRAME_HEADER_SIZE]);
        let length = decode_frame_header(&header).unwrap();
        assert_eq!(length as usize, packet.size());

        let inner = BytesMut::from(&framed[FRAME_HEADER_SIZE..]);
        let decoded = Packet::decode(inner).unwrap();
        assert_eq!(decoded.payload.as_ref(), &[9, 8, 7]);
    }

    #[test]
    fn test_bad_frame_magic() {
        let header = [0x00, 0x50, 0x82, 0x7D, 0x08, 0x00, 0x00, 0x00];
        assert!(matches!(
            decode_frame_header(&header),
            Err(Error::BadFrameMagic { .. })
        ));
    }

    #[test]
    fn test_frame_header_magic_bytes() {
        let header = encode_frame_header(16);
        assert_eq!(&header[..4], &[0x50, 0x50, 0x82, 0x7D]);
        assert_eq!(&header[4..], &[0x10, 0x00, 0x00, 0x00]);
    }
}
