//! Device occupancy counters
//!
//! `CMD_GET_FREE_SIZES` answers with twenty little-endian i32 fields;
//! only about half of them mean anything. Newer firmware appends a
//! 12-byte face block.

use std::fmt;

use crate::error::{Error, Result};

/// Counts and capacities reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceSizes {
    pub users: i32,
    pub fingers: i32,
    pub records: i32,
    pub dummy: i32,
    pub cards: i32,
    pub fingers_cap: i32,
    pub users_cap: i32,
    pub records_cap: i32,
    pub fingers_available: i32,
    pub users_available: i32,
    pub records_available: i32,
    pub faces: i32,
    pub faces_cap: i32,
}

/// Size of the mandatory counter block
const BASE_BLOCK: usize = 80;

/// Size of the optional face tail
const FACE_BLOCK: usize = 12;

impl DeviceSizes {
    /// Parse the reply payload of `CMD_GET_FREE_SIZES`.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < BASE_BLOCK {
            return Err(Error::parse(format!(
                "free-sizes block truncated: {} bytes",
                buf.len()
            )));
        }

        let field = |i: usize| -> i32 {
            let at = i * 4;
            i32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
        };

        let mut sizes = Self {
            users: field(4),
            fingers: field(6),
            records: field(8),
            dummy: field(10),
            cards: field(12),
            fingers_cap: field(14),
            users_cap: field(15),
            records_cap: field(16),
            fingers_available: field(17),
            users_available: field(18),
            records_available: field(19),
            faces: 0,
            faces_cap: 0,
        };

        if buf.len() >= BASE_BLOCK + FACE_BLOCK {
            sizes.faces = field(20);
            sizes.faces_cap = field(22);
        }

        Ok(sizes)
    }
}

impl fmt::Display for DeviceSizes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "users {}/{}, fingers {}/{}, records {}/{}",
            self.users,
            self.users_cap,
            self.fingers,
            self.fingers_cap,
            self.records,
            self.records_cap
        )
    }
}
