//! # rbzk
//!
//! Client library for ZK-family fingerprint and biometric attendance
//! terminals speaking the binary request/response protocol on port
//! 4370.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rbzk::{Device, DeviceOptions};
//!
//! #[tokio::main]
//! async fn main() -> rbzk::Result<()> {
//!     let mut device = Device::new(DeviceOptions::new("192.168.1.201"));
//!     device.connect().await?;
//!
//!     let info = device.device_info().await?;
//!     println!("{info}");
//!
//!     for log in device.get_attendance().await? {
//!         println!("{log}");
//!     }
//!
//!     device.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! A device handle is deliberately not shareable: the protocol
//! correlates replies through a client-advanced reply id, so exactly
//! one request may be in flight per socket. Open one handle per worker
//! when parallelism is needed.

pub mod bulk;
pub mod device;
pub mod error;

pub use device::{Device, DeviceOptions, NewUser};
pub use error::{Error, ErrorKind, Result};

// Re-export the vocabulary callers need
pub use rbzk_core::{constants, Command};
pub use rbzk_types::{Attendance, DeviceInfo, DeviceSizes, Encoding, FingerTemplate, User};
