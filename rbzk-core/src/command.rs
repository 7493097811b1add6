//! Protocol command definitions

use std::fmt;

use crate::error::{Error, Result};

/// Protocol command codes
///
/// Requests run from the client to the device; `Ack*`, `PrepareData`,
/// `Data` and `TcpStillAlive` come back from the device.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    // Database operations
    UserWrq = 8,
    UserTempRrq = 9,
    OptionsRrq = 11,
    OptionsWrq = 12,
    AttLogRrq = 13,
    ClearData = 14,
    ClearAttLog = 15,
    DeleteUser = 18,

    // Access control and display
    Unlock = 31,
    DoorStateRrq = 35,
    GetFreeSizes = 50,
    WriteLcd = 66,
    ClearLcd = 67,
    GetUserTemp = 88,

    // Clock
    GetTime = 201,
    SetTime = 202,

    // Connection lifecycle
    Connect = 1000,
    Exit = 1001,
    EnableDevice = 1002,
    DisableDevice = 1003,
    Restart = 1004,
    PowerOff = 1005,
    Sleep = 1006,
    Resume = 1007,

    // Device interaction
    RefreshData = 1013,
    TestVoice = 1017,

    // Device information
    GetVersion = 1100,
    Auth = 1102,

    // Bulk transfer
    PrepareData = 1500,
    Data = 1501,
    FreeData = 1502,
    PrepareBuffer = 1503,
    ReadBuffer = 1504,

    // Responses
    AckOk = 2000,
    AckError = 2001,
    AckData = 2002,
    AckUnauth = 2005,
    TcpStillAlive = 2007,
}

impl Command {
    /// Check if this is a response command (from device to PC)
    pub fn is_response(self) -> bool {
        matches!(
            self,
            Self::AckOk
                | Self::AckError
                | Self::AckData
                | Self::AckUnauth
                | Self::TcpStillAlive
                | Self::PrepareData
                | Self::Data
        )
    }

    /// Check if this is a success response.
    ///
    /// `AckData` is defined but carries no success semantics on the
    /// firmware in the field; only these three codes do.
    pub fn is_success(self) -> bool {
        matches!(self, Self::AckOk | Self::PrepareData | Self::Data)
    }

    /// Check if this is a device-level error response
    pub fn is_error(self) -> bool {
        matches!(self, Self::AckError)
    }

    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::UserWrq => "CMD_USER_WRQ",
            Self::UserTempRrq => "CMD_USERTEMP_RRQ",
            Self::OptionsRrq => "CMD_OPTIONS_RRQ",
            Self::OptionsWrq => "CMD_OPTIONS_WRQ",
            Self::AttLogRrq => "CMD_ATTLOG_RRQ",
            Self::ClearData => "CMD_CLEAR_DATA",
            Self::ClearAttLog => "CMD_CLEAR_ATTLOG",
            Self::DeleteUser => "CMD_DELETE_USER",
            Self::Unlock => "CMD_UNLOCK",
            Self::DoorStateRrq => "CMD_DOORSTATE_RRQ",
            Self::GetFreeSizes => "CMD_GET_FREE_SIZES",
            Self::WriteLcd => "CMD_WRITE_LCD",
            Self::ClearLcd => "CMD_CLEAR_LCD",
            Self::GetUserTemp => "CMD_GET_USERTEMP",
            Self::GetTime => "CMD_GET_TIME",
            Self::SetTime => "CMD_SET_TIME",
            Self::Connect => "CMD_CONNECT",
            Self::Exit => "CMD_EXIT",
            Self::EnableDevice => "CMD_ENABLEDEVICE",
            Self::DisableDevice => "CMD_DISABLEDEVICE",
            Self::Restart => "CMD_RESTART",
            Self::PowerOff => "CMD_POWEROFF",
            Self::Sleep => "CMD_SLEEP",
            Self::Resume => "CMD_RESUME",
            Self::RefreshData => "CMD_REFRESHDATA",
            Self::TestVoice => "CMD_TESTVOICE",
            Self::GetVersion => "CMD_GET_VERSION",
            Self::Auth => "CMD_AUTH",
            Self::PrepareData => "CMD_PREPARE_DATA",
            Self::Data => "CMD_DATA",
            Self::FreeData => "CMD_FREE_DATA",
            Self::PrepareBuffer => "CMD_PREPARE_BUFFER",
            Self::ReadBuffer => "CMD_READ_BUFFER",
            Self::AckOk => "CMD_ACK_OK",
            Self::AckError => "CMD_ACK_ERROR",
            Self::AckData => "CMD_ACK_DATA",
            Self::AckUnauth => "CMD_ACK_UNAUTH",
            Self::TcpStillAlive => "CMD_TCP_STILL_ALIVE",
        }
    }
}

impl From<Command> for u16 {
    fn from(cmd: Command) -> u16 {
        cmd as u16
    }
}

impl TryFrom<u16> for Command {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            8 => Ok(Self::UserWrq),
            9 => Ok(Self::UserTempRrq),
            11 => Ok(Self::OptionsRrq),
            12 => Ok(Self::OptionsWrq),
            13 => Ok(Self::AttLogRrq),
            14 => Ok(Self::ClearData),
            15 => Ok(Self::ClearAttLog),
            18 => Ok(Self::DeleteUser),
            31 => Ok(Self::Unlock),
            35 => Ok(Self::DoorStateRrq),
            50 => Ok(Self::GetFreeSizes),
            66 => Ok(Self::WriteLcd),
            67 => Ok(Self::ClearLcd),
            88 => Ok(Self::GetUserTemp),
            201 => Ok(Self::GetTime),
            202 => Ok(Self::SetTime),
            1000 => Ok(Self::Connect),
            1001 => Ok(Self::Exit),
            1002 => Ok(Self::EnableDevice),
            1003 => Ok(Self::DisableDevice),
            1004 => Ok(Self::Restart),
            1005 => Ok(Self::PowerOff),
            1006 => Ok(Self::Sleep),
            1007 => Ok(Self::Resume),
            1013 => Ok(Self::RefreshData),
            1017 => Ok(Self::TestVoice),
            1100 => Ok(Self::GetVersion),
            1102 => Ok(Self::Auth),
            1500 => Ok(Self::PrepareData),
            1501 => Ok(Self::Data),
            1502 => Ok(Self::FreeData),
            1503 => Ok(Self::PrepareBuffer),
            1504 => Ok(Self::ReadBuffer),
            2000 => Ok(Self::AckOk),
            2001 => Ok(Self::AckError),
            2002 => Ok(Self::AckData),
            2005 => Ok(Self::AckUnauth),
            2007 => Ok(Self::TcpStillAlive),
            _ => Err(Error::UnknownCommand(value)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), *self as u16)
    }
}
