//! High-level error types
//!
//! Layer errors bubble up through `#[from]`; `kind()` folds the whole
//! hierarchy into the seven failure classes callers branch on.

use rbzk_core::Command;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] rbzk_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] rbzk_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] rbzk_types::Error),

    #[error("Device not connected")]
    NotConnected,

    #[error("Authentication rejected by device")]
    Unauthenticated,

    #[error("Device returned error for {command}")]
    Device { command: Command },

    #[error("Identifier already exists: {0}")]
    Exists(String),

    #[error("Protocol violation: {0}")]
    Protocol(String),
}

/// Failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Socket-level failure (refused, unreachable, reset, broken pipe)
    Network,

    /// Per-operation receive deadline exceeded
    Timeout,

    /// Malformed frame, bad checksum, unexpected reply, exhausted retries
    Protocol,

    /// Device rejected the challenge-response
    Auth,

    /// Well-formed request answered with a device error
    Device,

    /// Duplicate identifier
    Exists,

    /// Operation attempted on a closed connection
    State,
}

impl ErrorKind {
    /// Fatal kinds tear the connection down; the caller must reconnect.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Protocol)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(t) => match t {
                rbzk_transport::Error::ConnectionTimeout
                | rbzk_transport::Error::ReadTimeout => ErrorKind::Timeout,
                rbzk_transport::Error::BadMagic { .. }
                | rbzk_transport::Error::FrameTooLarge(_) => ErrorKind::Protocol,
                rbzk_transport::Error::NotConnected
                | rbzk_transport::Error::AlreadyConnected => ErrorKind::State,
                rbzk_transport::Error::ConnectionClosed
                | rbzk_transport::Error::Io(_)
                | rbzk_transport::Error::InvalidAddress(_) => ErrorKind::Network,
            },
            Self::Core(_) | Self::Types(_) | Self::Protocol(_) => ErrorKind::Protocol,
            Self::NotConnected => ErrorKind::State,
            Self::Unauthenticated => ErrorKind::Auth,
            Self::Device { .. } => ErrorKind::Device,
            Self::Exists(_) => ErrorKind::Exists,
        }
    }
}
