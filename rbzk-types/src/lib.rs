//! Domain types for rbzk
//!
//! Value objects for users, attendance records, fingerprint templates
//! and device counters, together with their bit-exact wire layouts.

pub mod attendance;
pub mod device_info;
pub mod encoding;
pub mod error;
pub mod sizes;
pub mod template;
pub mod user;

pub use attendance::Attendance;
pub use device_info::DeviceInfo;
pub use encoding::Encoding;
pub use error::{Error, Result};
pub use sizes::DeviceSizes;
pub use template::FingerTemplate;
pub use user::User;
