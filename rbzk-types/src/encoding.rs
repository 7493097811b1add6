//! Fixed-width string fields
//!
//! Names and ids travel as null-padded fixed-width fields. The name
//! encoding is configurable per connection; firmware in the field ships
//! either UTF-8 or Latin-1 tables.

use crate::error::{Error, Result};

/// Name encoding used by the device firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
}

impl Encoding {
    /// Resolve an encoding from its configured name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            other => Err(Error::validation(format!("unknown encoding: {other}"))),
        }
    }

    /// Decode a fixed-width field: stop at the first NUL, then decode.
    pub fn decode_field(self, field: &[u8]) -> String {
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        let raw = &field[..end];

        match self {
            Self::Utf8 => String::from_utf8_lossy(raw).into_owned(),
            Self::Latin1 => raw.iter().map(|&b| b as char).collect(),
        }
    }

    /// Encode into a fixed-width null-padded field, truncating to fit.
    pub fn encode_field(self, value: &str, width: usize) -> Vec<u8> {
        let mut out = match self {
            Self::Utf8 => {
                let mut cut = width.min(value.len());
                while cut > 0 && !value.is_char_boundary(cut) {
                    cut -= 1;
                }
                value.as_bytes()[..cut].to_vec()
            }
            Self::Latin1 => value
                .chars()
                .take(width)
                .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
                .collect(),
        };

        out.resize(width, 0);
        out
    }
}

/// Parse the leading decimal digits of an id string (0 when there are
/// none). The numeric user-id field of the compact user layout cannot
/// carry arbitrary strings.
pub fn leading_digits(value: &str) -> u32 {
    let digits: String = value.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_name() {
        assert_eq!(Encoding::from_name("UTF-8").unwrap(), Encoding::Utf8);
        assert_eq!(Encoding::from_name("latin-1").unwrap(), Encoding::Latin1);
        assert_eq!(Encoding::from_name("iso-8859-1").unwrap(), Encoding::Latin1);
        assert!(Encoding::from_name("shift-jis").is_err());
    }

    #[test]
    fn test_decode_stops_at_nul() {
        let field = [b'A', b'n', b'a', 0, b'X', b'X'];
        assert_eq!(Encoding::Utf8.decode_field(&field), "Ana");
    }

    #[test]
    fn test_encode_pads_with_nul() {
        let field = Encoding::Utf8.encode_field("Bo", 5);
        assert_eq!(field, vec![b'B', b'o', 0, 0, 0]);
    }

    #[test]
    fn test_encode_truncates_to_width() {
        let field = Encoding::Utf8.encode_field("Borislav", 5);
        assert_eq!(field, b"Boris".to_vec());
    }

    #[test]
    fn test_utf8_truncation_respects_char_boundary() {
        // "Łukasz": 'Ł' is two bytes in UTF-8
        let field = Encoding::Utf8.encode_field("Łukasz", 3);
        assert_eq!(field, vec![0xC5, 0x81, b'u']);
    }

    #[test]
    fn test_latin1_roundtrip() {
        let field = Encoding::Latin1.encode_field("Müller", 8);
        assert_eq!(Encoding::Latin1.decode_field(&field), "Müller");
    }

    #[test]
    fn test_latin1_replaces_unmappable() {
        let field = Encoding::Latin1.encode_field("名前", 4);
        assert_eq!(&field[..2], b"??");
    }

    #[test]
    fn test_leading_digits() {
        assert_eq!(leading_digits("123"), 123);
        assert_eq!(leading_digits("42abc"), 42);
        assert_eq!(leading_digits("JD1"), 0);
        assert_eq!(leading_digits(""), 0);
    }
}
