//! Session state for a device connection
//!
//! A session tracks the device-assigned session id, the reply counter,
//! and the connection state machine. The device echoes both ids in every
//! reply header; the client adopts the echoed reply id as its next
//! baseline so it always tracks the device's view of the exchange.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected
    Disconnected,

    /// Connected without a communication password
    Connected,

    /// Connected after challenge-response authentication
    Authenticated,
}

/// Session handle
///
/// Cheap to clone (Arc internally). The handle does not make the
/// connection shareable: packet I/O still happens through exactly one
/// transport owned by one device handle.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// Session ID assigned by device (0 when not connected)
    session_id: AtomicU16,

    /// Reply counter
    reply_id: AtomicU16,

    /// Current session state
    state: parking_lot::RwLock<SessionState>,
}

impl Session {
    /// Reply id carried by the very first packet of a session
    pub const INITIAL_REPLY_ID: u16 = 0xFFFE;

    /// Create a new disconnected session
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                session_id: AtomicU16::new(0),
                reply_id: AtomicU16::new(Self::INITIAL_REPLY_ID),
                state: parking_lot::RwLock::new(SessionState::Disconnected),
            }),
        }
    }

    /// Get current session ID
    pub fn session_id(&self) -> u16 {
        self.inner.session_id.load(Ordering::Acquire)
    }

    /// Get the reply id of the most recent packet
    pub fn reply_id(&self) -> u16 {
        self.inner.reply_id.load(Ordering::Acquire)
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        !matches!(self.state(), SessionState::Disconnected)
    }

    /// Check if the session went through challenge-response auth
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state(), SessionState::Authenticated)
    }

    /// Initialize session with the device-assigned session ID
    pub fn initialize(&self, session_id: u16) -> Result<()> {
        let mut state = self.inner.state.write();

        if *state != SessionState::Disconnected {
            return Err(Error::InvalidSessionState(format!(
                "Cannot initialize from state: {:?}",
                *state
            )));
        }

        self.inner.session_id.store(session_id, Ordering::Release);
        *state = SessionState::Connected;

        Ok(())
    }

    /// Mark the session as authenticated
    pub fn authenticate(&self) -> Result<()> {
        let mut state = self.inner.state.write();

        if *state != SessionState::Connected {
            return Err(Error::InvalidSessionState(format!(
                "Cannot authenticate from state: {:?}",
                *state
            )));
        }

        *state = SessionState::Authenticated;
        Ok(())
    }

    /// Close session and reset ids
    pub fn close(&self) {
        self.inner.session_id.store(0, Ordering::Release);
        self.inner
            .reply_id
            .store(Self::INITIAL_REPLY_ID, Ordering::Release);
        *self.inner.state.write() = SessionState::Disconnected;
    }

    /// Advance the reply counter and return the id for the next packet.
    ///
    /// The counter runs modulo 0xFFFF, so it follows 0xFFFE with 0.
    pub fn advance_reply_id(&self) -> u16 {
        let next = self.reply_id().wrapping_add(1) % 0xFFFF;
        self.inner.reply_id.store(next, Ordering::Release);
        next
    }

    /// Adopt the reply id echoed by the device as the next baseline
    pub fn sync_reply_id(&self, echoed: u16) {
        self.inner.reply_id.store(echoed, Ordering::Release);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
