//! User records
//!
//! Two layouts exist in the field. The compact 28-byte form (ZK6
//! firmware) carries a numeric user id and a single-byte group; the
//! 72-byte form (ZK8) carries both as null-terminated strings. The
//! selector is always `total_size / record_count` of the downloaded
//! roster, never a hard-coded width.

use std::fmt;

use crate::encoding::{leading_digits, Encoding};
use crate::error::{Error, Result};

/// A user stored on the device.
///
/// `uid` is the device-assigned slot number; `user_id` is the
/// caller-assigned identifier shown on badges and exports.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct User {
    pub uid: u16,
    pub user_id: String,
    pub name: String,
    pub privilege: u8,
    pub password: String,
    pub group_id: String,
    pub card: u32,
}

/// Compact layout width (ZK6)
pub const RECORD_ZK6: usize = 28;

/// Wide layout width (ZK8)
pub const RECORD_ZK8: usize = 72;

impl User {
    /// Encode into the 28-byte compact layout.
    ///
    /// The numeric fields take the leading digits of `user_id` and
    /// `group_id`; non-numeric ids pack as 0.
    pub fn encode_zk6(&self, encoding: Encoding) -> Vec<u8> {
        let mut buf = Vec::with_capacity(RECORD_ZK6);
        buf.extend_from_slice(&self.uid.to_le_bytes());
        buf.push(self.privilege);
        buf.extend_from_slice(&encoding.encode_field(&self.password, 5));
        buf.extend_from_slice(&encoding.encode_field(&self.name, 8));
        buf.extend_from_slice(&self.card.to_le_bytes());
        buf.push(0); // pad
        buf.push(leading_digits(&self.group_id) as u8);
        buf.extend_from_slice(&0i16.to_le_bytes()); // timezone
        buf.extend_from_slice(&leading_digits(&self.user_id).to_le_bytes());
        buf
    }

    /// Encode into the 72-byte wide layout.
    pub fn encode_zk8(&self, encoding: Encoding) -> Vec<u8> {
        let mut buf = Vec::with_capacity(RECORD_ZK8);
        buf.extend_from_slice(&self.uid.to_le_bytes());
        buf.push(self.privilege);
        buf.extend_from_slice(&encoding.encode_field(&self.password, 8));
        buf.extend_from_slice(&encoding.encode_field(&self.name, 24));
        buf.extend_from_slice(&self.card.to_le_bytes());
        buf.push(0); // pad
        buf.extend_from_slice(&encoding.encode_field(&self.group_id, 7));
        buf.push(0); // pad
        buf.extend_from_slice(&encoding.encode_field(&self.user_id, 24));
        buf
    }

    /// Encode into whichever layout the firmware reports.
    pub fn encode(&self, record_size: usize, encoding: Encoding) -> Result<Vec<u8>> {
        match record_size {
            RECORD_ZK6 => Ok(self.encode_zk6(encoding)),
            RECORD_ZK8 => Ok(self.encode_zk8(encoding)),
            other => Err(Error::RecordSize(other)),
        }
    }

    /// Decode one 28-byte record.
    pub fn decode_zk6(buf: &[u8], encoding: Encoding) -> Result<Self> {
        if buf.len() < RECORD_ZK6 {
            return Err(Error::parse(format!(
                "user record truncated: {} bytes",
                buf.len()
            )));
        }

        let user_id_num = u32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]);

        Ok(Self {
            uid: u16::from_le_bytes([buf[0], buf[1]]),
            privilege: buf[2],
            password: encoding.decode_field(&buf[3..8]),
            name: encoding.decode_field(&buf[8..16]),
            card: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
            group_id: buf[21].to_string(),
            user_id: user_id_num.to_string(),
        })
    }

    /// Decode one 72-byte record.
    pub fn decode_zk8(buf: &[u8], encoding: Encoding) -> Result<Self> {
        if buf.len() < RECORD_ZK8 {
            return Err(Error::parse(format!(
                "user record truncated: {} bytes",
                buf.len()
            )));
        }

        Ok(Self {
            uid: u16::from_le_bytes([buf[0], buf[1]]),
            privilege: buf[2],
            password: encoding.decode_field(&buf[3..11]),
            name: encoding.decode_field(&buf[11..35]),
            card: u32::from_le_bytes([buf[35], buf[36], buf[37], buf[38]]),
            group_id: encoding.decode_field(&buf[40..47]),
            user_id: encoding.decode_field(&buf[48..72]),
        })
    }

    /// Parse a whole roster buffer of `record_size`-wide records.
    pub fn parse_all(buf: &[u8], record_size: usize, encoding: Encoding) -> Result<Vec<Self>> {
        let decode: fn(&[u8], Encoding) -> Result<Self> = match record_size {
            RECORD_ZK6 => Self::decode_zk6,
            RECORD_ZK8 => Self::decode_zk8,
            other => return Err(Error::RecordSize(other)),
        };

        buf.chunks_exact(record_size)
            .map(|chunk| decode(chunk, encoding))
            .collect()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "User[uid={}, id={}, name={}, privilege={}]",
            self.uid, self.user_id, self.name, self.privilege
        )
    }
}
