//! Device clock codec
//!
//! The device has no timezone; timestamps are local wall-clock values
//! packed into a u32 where every month is 31 days:
//!
//! ```text
//! compact = (((year-2000)*12 + month-1)*31 + day-1)*86400
//!         + hour*3600 + minute*60 + second
//! ```
//!
//! A second "hex" form carries the six calendar fields as raw bytes
//! `[YY MM DD HH mm ss]` with the year offset from 2000.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{Error, Result};

/// Encode a local date-time into the compact u32 form.
///
/// Defined for years 2000-2099; the device cannot represent dates
/// outside that window.
pub fn encode(t: NaiveDateTime) -> u32 {
    let yy = (t.year() - 2000).clamp(0, 99) as u32;
    let days = (yy * 12 + (t.month() - 1)) * 31 + (t.day() - 1);
    days * 86400 + t.hour() * 3600 + t.minute() * 60 + t.second()
}

/// Decode the compact u32 form back into a date-time.
///
/// # Errors
///
/// Returns [`Error::InvalidTimestamp`] when the packed fields do not
/// form a calendar date (the 31-day-month packing admits values like
/// February 30 that no real device emits).
pub fn decode(raw: u32) -> Result<NaiveDateTime> {
    let second = raw % 60;
    let minute = (raw / 60) % 60;
    let hour = (raw / 3600) % 24;

    let days = raw / 86400;
    let day = days % 31 + 1;
    let month = (days / 31) % 12 + 1;
    let year = (days / 31 / 12) as i32 + 2000;

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or(Error::InvalidTimestamp(raw))
}

/// Encode a date-time into the 6-byte hex form.
pub fn encode_hex(t: NaiveDateTime) -> [u8; 6] {
    [
        (t.year() - 2000).clamp(0, 99) as u8,
        t.month() as u8,
        t.day() as u8,
        t.hour() as u8,
        t.minute() as u8,
        t.second() as u8,
    ]
}

/// Decode the 6-byte hex form.
///
/// # Errors
///
/// Returns [`Error::PacketTooShort`] when fewer than six bytes are
/// given, or [`Error::InvalidTimestamp`] when the fields are not a
/// calendar date.
pub fn decode_hex(raw: &[u8]) -> Result<NaiveDateTime> {
    if raw.len() < 6 {
        return Err(Error::PacketTooShort {
            expected: 6,
            actual: raw.len(),
        });
    }

    NaiveDate::from_ymd_opt(raw[0] as i32 + 2000, raw[1] as u32, raw[2] as u32)
        .and_then(|d| d.and_hms_opt(raw[3] as u32, raw[4] as u32, raw[5] as u32))
        .ok_or(Error::InvalidTimestamp(u32::from_le_bytes([
            raw[0], raw[1], raw[2], raw[3],
        ])))
}
