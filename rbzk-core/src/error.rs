//! Error types for rbzk-core

/// Result type alias for core protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Packet is too short to be valid
    #[error("Packet too short: expected at least {expected} bytes, got {actual} bytes")]
    PacketTooShort {
        expected: usize,
        actual: usize,
    },

    /// Checksum verification failed
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        expected: u16,
        received: u16,
    },

    /// Unknown command code
    #[error("Unknown command code: {0}")]
    UnknownCommand(u16),

    /// TCP frame does not start with the protocol magic words
    #[error("Bad frame magic: 0x{magic1:04X} 0x{magic2:04X}")]
    BadFrameMagic {
        magic1: u16,
        magic2: u16,
    },

    /// Invalid session state
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),

    /// Device timestamp does not decode to a calendar date
    #[error("Invalid device timestamp: {0}")]
    InvalidTimestamp(u32),
}
