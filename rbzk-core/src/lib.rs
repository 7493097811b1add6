//! # rbzk-core
//!
//! Core protocol implementation for ZK-family biometric attendance
//! terminals.
//!
//! This crate provides the low-level protocol primitives:
//! - Packet structure and encoding/decoding, TCP outer-frame codec
//! - Checksum calculation
//! - Device clock codec
//! - Challenge-response key derivation
//! - Command definitions and protocol constants
//! - Session id / reply id state

pub mod auth;
pub mod checksum;
pub mod command;
pub mod constants;
pub mod error;
pub mod packet;
pub mod session;
pub mod time;

pub use auth::make_commkey;
pub use command::Command;
pub use error::{Error, Result};
pub use packet::Packet;
pub use session::{Session, SessionState};

pub use constants::DEFAULT_PORT;

/// Inner packet header size
pub const HEADER_SIZE: usize = packet::HEADER_SIZE;
