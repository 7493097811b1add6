//! Attendance records
//!
//! Three layouts exist in the field (8, 16 and 40 bytes); as with user
//! records the selector is `total_size / record_count`. Records whose
//! timestamp does not decode are skipped with a warning rather than
//! failing the whole download.

use std::fmt;

use chrono::NaiveDateTime;
use tracing::warn;

use crate::encoding::Encoding;
use crate::error::{Error, Result};

/// One clock punch.
///
/// `status` is the device's verification mode and is deliberately left
/// uninterpreted; `punch` is 0 for check-in and 1 for check-out by
/// convention, other values pass through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendance {
    pub uid: u16,
    pub user_id: String,
    pub timestamp: NaiveDateTime,
    pub status: u8,
    pub punch: u8,
}

/// Compact layout width
pub const RECORD_SMALL: usize = 8;

/// Numeric-id layout width
pub const RECORD_WIDE: usize = 16;

/// String-id layout width
pub const RECORD_FULL: usize = 40;

impl Attendance {
    /// Parse a whole attendance buffer of `record_size`-wide records.
    pub fn parse_all(buf: &[u8], record_size: usize, encoding: Encoding) -> Result<Vec<Self>> {
        let decode: fn(&[u8], Encoding) -> Option<Self> = match record_size {
            RECORD_SMALL => Self::decode_small,
            RECORD_WIDE => Self::decode_wide,
            RECORD_FULL => Self::decode_full,
            other => return Err(Error::RecordSize(other)),
        };

        Ok(buf
            .chunks_exact(record_size)
            .filter_map(|chunk| decode(chunk, encoding))
            .collect())
    }

    /// 8-byte layout: `uid:u16, status:u8, timestamp:u32, punch:u8`.
    ///
    /// Carries no user id; the caller resolves `uid` against the
    /// roster.
    fn decode_small(buf: &[u8], _encoding: Encoding) -> Option<Self> {
        let raw_ts = u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]);
        Some(Self {
            uid: u16::from_le_bytes([buf[0], buf[1]]),
            user_id: String::new(),
            timestamp: decode_timestamp(raw_ts)?,
            status: buf[2],
            punch: buf[7],
        })
    }

    /// 16-byte layout: `user_id:u32, timestamp:u32, status:u8,
    /// punch:u8, reserved:2s, workcode:u32`.
    ///
    /// The numeric id is stringified here, at the record boundary.
    fn decode_wide(buf: &[u8], _encoding: Encoding) -> Option<Self> {
        let user_id_num = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let raw_ts = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Some(Self {
            uid: 0,
            user_id: user_id_num.to_string(),
            timestamp: decode_timestamp(raw_ts)?,
            status: buf[8],
            punch: buf[9],
        })
    }

    /// 40-byte layout: `uid:u16, user_id:24s, status:u8, timestamp:u32,
    /// punch:u8, reserved:8s`.
    fn decode_full(buf: &[u8], encoding: Encoding) -> Option<Self> {
        let raw_ts = u32::from_le_bytes([buf[27], buf[28], buf[29], buf[30]]);
        Some(Self {
            uid: u16::from_le_bytes([buf[0], buf[1]]),
            user_id: encoding.decode_field(&buf[2..26]),
            timestamp: decode_timestamp(raw_ts)?,
            status: buf[26],
            punch: buf[31],
        })
    }
}

fn decode_timestamp(raw: u32) -> Option<NaiveDateTime> {
    match rbzk_core::time::decode(raw) {
        Ok(t) => Some(t),
        Err(_) => {
            warn!(raw, "Skipping attendance record with undecodable timestamp");
            None
        }
    }
}

impl fmt::Display for Attendance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Attendance[user={}, time={}, status={}, punch={}]",
            self.user_id, self.timestamp, self.status, self.punch
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rbzk_core::time;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn small_record(uid: u16, t: NaiveDateTime, status: u8, punch: u8) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..2].copy_from_slice(&uid.to_le_bytes());
        buf[2] = status;
        buf[3..7].copy_from_slice(&time::encode(t).to_le_bytes());
        buf[7] = punch;
        buf
    }

    #[test]
    fn test_small_layout() {
        let when = ts(2025, 3, 14, 9, 26, 53);
        let buf = small_record(20, when, 1, 0);

        let records = Attendance::parse_all(&buf, RECORD_SMALL, Encoding::Utf8).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].uid, 20);
        assert_eq!(records[0].user_id, "");
        assert_eq!(records[0].timestamp, when);
        assert_eq!(records[0].status, 1);
        assert_eq!(records[0].punch, 0);
    }

    #[test]
    fn test_wide_layout_stringifies_numeric_id() {
        let when = ts(2024, 11, 2, 17, 1, 9);
        let mut buf = [0u8; 16];
        buf[0..4].copy_from_slice(&10042u32.to_le_bytes());
        buf[4..8].copy_from_slice(&time::encode(when).to_le_bytes());
        buf[8] = 4;
        buf[9] = 1;

        let records = Attendance::parse_all(&buf, RECORD_WIDE, Encoding::Utf8).unwrap();
        assert_eq!(records[0].user_id, "10042");
        assert_eq!(records[0].timestamp, when);
        assert_eq!(records[0].punch, 1);
    }

    #[test]
    fn test_full_layout() {
        let when = ts(2023, 7, 1, 6, 0, 0);
        let mut buf = [0u8; 40];
        buf[0..2].copy_from_slice(&65u16.to_le_bytes());
        buf[2..5].copy_from_slice(b"E65");
        buf[26] = 15;
        buf[27..31].copy_from_slice(&time::encode(when).to_le_bytes());
        buf[31] = 1;

        let records = Attendance::parse_all(&buf, RECORD_FULL, Encoding::Utf8).unwrap();
        assert_eq!(records[0].uid, 65);
        assert_eq!(records[0].user_id, "E65");
        assert_eq!(records[0].status, 15);
        assert_eq!(records[0].timestamp, when);
    }

    #[test]
    fn test_bad_timestamp_is_skipped() {
        let good = small_record(1, ts(2025, 1, 10, 8, 0, 0), 1, 0);
        // Day 30 of a packed February never decodes
        let mut bad = small_record(2, ts(2025, 2, 28, 8, 0, 0), 1, 0);
        let raw = u32::from_le_bytes([bad[3], bad[4], bad[5], bad[6]]) + 2 * 86400;
        bad[3..7].copy_from_slice(&raw.to_le_bytes());

        let mut buf = Vec::new();
        buf.extend_from_slice(&good);
        buf.extend_from_slice(&bad);

        let records = Attendance::parse_all(&buf, RECORD_SMALL, Encoding::Utf8).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].uid, 1);
    }

    #[test]
    fn test_unknown_width_rejected() {
        assert!(matches!(
            Attendance::parse_all(&[0; 24], 24, Encoding::Utf8),
            Err(Error::RecordSize(24))
        ));
    }
}
