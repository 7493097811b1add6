//! Device identity strings

use std::fmt;

/// Identity and firmware details collected from the device.
///
/// The firmware version comes back as a raw string; everything else is
/// read through the option interface (`<key>=<value>` replies).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    /// Firmware version string
    pub firmware_version: String,

    /// Device serial number
    pub serial_number: String,

    /// Platform name
    pub platform: String,

    /// Device name (user-assigned)
    pub device_name: String,

    /// MAC address
    pub mac_address: String,

    /// Face algorithm version
    pub face_version: String,

    /// Fingerprint algorithm version
    pub fingerprint_version: String,

    /// Extended user-record format flag
    pub extend_fmt: String,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device[SN: {}, FW: {}]",
            self.serial_number, self.firmware_version
        )
    }
}
