//! Fingerprint templates
//!
//! Templates travel as a size-prefixed stream: each entry starts with a
//! u16 total length (header included), then `uid:u16, finger_id:u8,
//! valid:u8` and the opaque template blob. The blob format is
//! device-specific and never interpreted here.

use std::fmt;

use bytes::Bytes;
use tracing::warn;

use crate::error::Result;

/// One enrolled fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerTemplate {
    pub uid: u16,
    /// Finger slot, 0-9
    pub finger_id: u8,
    /// 1 = valid, 0 = duplicate/invalid
    pub valid: u8,
    pub template: Bytes,
}

/// Entry header: size + uid + finger id + valid flag
const ENTRY_HEADER: usize = 6;

impl FingerTemplate {
    pub fn new(uid: u16, finger_id: u8, valid: u8, template: impl Into<Bytes>) -> Self {
        Self {
            uid,
            finger_id,
            valid,
            template: template.into(),
        }
    }

    /// Encode one stream entry (used by the loopback test device).
    pub fn encode_entry(&self) -> Vec<u8> {
        let total = ENTRY_HEADER + self.template.len();
        let mut buf = Vec::with_capacity(total);
        buf.extend_from_slice(&(total as u16).to_le_bytes());
        buf.extend_from_slice(&self.uid.to_le_bytes());
        buf.push(self.finger_id);
        buf.push(self.valid);
        buf.extend_from_slice(&self.template);
        buf
    }

    /// Parse a template stream into its entries.
    ///
    /// A truncated tail is dropped with a warning; devices occasionally
    /// pad the final chunk.
    pub fn parse_stream(mut buf: &[u8]) -> Result<Vec<Self>> {
        let mut templates = Vec::new();

        while buf.len() >= ENTRY_HEADER {
            let size = u16::from_le_bytes([buf[0], buf[1]]) as usize;
            if size < ENTRY_HEADER || size > buf.len() {
                warn!(
                    size,
                    remaining = buf.len(),
                    "Dropping truncated template stream tail"
                );
                break;
            }

            templates.push(Self {
                uid: u16::from_le_bytes([buf[2], buf[3]]),
                finger_id: buf[4],
                valid: buf[5],
                template: Bytes::copy_from_slice(&buf[ENTRY_HEADER..size]),
            });

            buf = &buf[size..];
        }

        Ok(templates)
    }
}

impl fmt::Display for FingerTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FingerTemplate[uid={}, finger={}, valid={}, {} bytes]",
            self.uid,
            self.finger_id,
            self.valid,
            self.template.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stream_roundtrip() {
        let a = FingerTemplate::new(1, 0, 1, vec![0xAA; 512]);
        let b = FingerTemplate::new(1, 1, 1, vec![0xBB; 300]);
        let c = FingerTemplate::new(9, 5, 0, vec![0xCC; 64]);

        let mut stream = Vec::new();
        for t in [&a, &b, &c] {
            stream.extend_from_slice(&t.encode_entry());
        }

        let parsed = FingerTemplate::parse_stream(&stream).unwrap();
        assert_eq!(parsed, vec![a, b, c]);
    }

    #[test]
    fn test_empty_stream() {
        assert!(FingerTemplate::parse_stream(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_tail_dropped() {
        let a = FingerTemplate::new(1, 0, 1, vec![0xAA; 16]);
        let mut stream = a.encode_entry();
        // Claim 100 bytes but provide 10
        stream.extend_from_slice(&100u16.to_le_bytes());
        stream.extend_from_slice(&[0u8; 8]);

        let parsed = FingerTemplate::parse_stream(&stream).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0], a);
    }
}
