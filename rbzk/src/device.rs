//! High-level device interface
//!
//! One `Device` owns one socket and one session; methods take
//! `&mut self`, so exactly one request is in flight at a time. Callers
//! that want parallelism open one device handle per worker.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use chrono::NaiveDateTime;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use rbzk_core::constants::{fct, AUTH_TICKS, DEFAULT_TIMEOUT, PROBE_TIMEOUT};
use rbzk_core::{make_commkey, time, Command, Packet, Session};
use rbzk_transport::{TcpTransport, Transport, UdpTransport};
use rbzk_types::user::{RECORD_ZK6, RECORD_ZK8};
use rbzk_types::{Attendance, DeviceInfo, DeviceSizes, Encoding, FingerTemplate, User};

use crate::error::{Error, Result};

/// Connection options.
///
/// Defaults: port 4370, 60 s operation timeout, no password, TCP,
/// reachability probe on, UTF-8 names.
#[derive(Debug, Clone)]
pub struct DeviceOptions {
    pub ip: String,
    pub port: u16,
    pub timeout: Duration,
    pub password: u32,
    pub force_udp: bool,
    pub omit_ping: bool,
    pub verbose: bool,
    pub encoding: Encoding,
}

impl DeviceOptions {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port: rbzk_core::DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT),
            password: 0,
            force_udp: false,
            omit_ping: false,
            verbose: false,
            encoding: Encoding::Utf8,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn password(mut self, password: u32) -> Self {
        self.password = password;
        self
    }

    pub fn force_udp(mut self, force_udp: bool) -> Self {
        self.force_udp = force_udp;
        self
    }

    pub fn omit_ping(mut self, omit_ping: bool) -> Self {
        self.omit_ping = omit_ping;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// Fields of a user record to write; unset ids are allocated from the
/// device's current roster.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub uid: Option<u16>,
    pub user_id: Option<String>,
    pub name: String,
    pub privilege: u8,
    pub password: String,
    pub group_id: String,
    pub card: u32,
}

/// One decoded reply.
#[derive(Debug)]
pub(crate) struct Reply {
    pub code: Command,
    pub session_id: u16,
    pub reply_id: u16,
    pub payload: Bytes,
    pub frame_len: usize,
}

/// A ZK attendance terminal.
///
/// # Examples
///
/// ```no_run
/// use rbzk::{Device, DeviceOptions};
///
/// #[tokio::main]
/// async fn main() -> rbzk::Result<()> {
///     let mut device = Device::new(DeviceOptions::new("192.168.1.201"));
///
///     device.connect().await?;
///     for user in device.get_users().await? {
///         println!("{user}");
///     }
///     device.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct Device {
    transport: Box<dyn Transport>,
    session: Session,
    options: DeviceOptions,
    sizes: Option<DeviceSizes>,
    users_cache: Vec<User>,
    user_record_size: usize,
    next_uid: u16,
    next_user_id: String,
}

impl Device {
    /// Create a device handle; no traffic until [`connect`](Self::connect).
    pub fn new(options: DeviceOptions) -> Self {
        let transport: Box<dyn Transport> = if options.force_udp {
            Box::new(UdpTransport::new(options.ip.clone(), options.port))
        } else {
            Box::new(
                TcpTransport::new(options.ip.clone(), options.port)
                    .with_connect_timeout(Duration::from_secs(PROBE_TIMEOUT)),
            )
        };

        Self {
            transport,
            session: Session::new(),
            options,
            sizes: None,
            users_cache: Vec::new(),
            user_record_size: RECORD_ZK6,
            next_uid: 1,
            next_user_id: "1".to_string(),
        }
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.session.is_connected() && self.transport.is_connected()
    }

    /// Counters from the last `read_sizes` call
    pub fn sizes(&self) -> Option<&DeviceSizes> {
        self.sizes.as_ref()
    }

    /// Next free device slot, per the last roster download
    pub fn next_uid(&self) -> u16 {
        self.next_uid
    }

    /// Next unused user id, per the last roster download
    pub fn next_user_id(&self) -> &str {
        &self.next_user_id
    }

    /// User record width the firmware reported (28 or 72 bytes)
    pub fn user_record_size(&self) -> usize {
        self.user_record_size
    }

    // Session lifecycle

    /// Connect and establish a session, authenticating when the device
    /// asks for it.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        match self.connect_inner().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.teardown().await;
                Err(e)
            }
        }
    }

    async fn connect_inner(&mut self) -> Result<()> {
        if !self.options.omit_ping {
            self.probe().await?;
        }

        info!("Connecting to {}...", self.transport.remote_addr());
        self.transport.connect().await?;

        let hello = Packet::new(Command::Connect, 0, Session::INITIAL_REPLY_ID);
        self.transmit(&hello).await?;
        let reply = self.receive_response().await?;

        let session_id = reply.session_id;

        match reply.code {
            Command::AckOk => {
                self.session.initialize(session_id)?;
                info!("Connected (session_id={})", session_id);
                Ok(())
            }
            Command::AckUnauth => {
                debug!("Device requires authentication (session_id={})", session_id);

                let key = make_commkey(self.options.password, session_id, AUTH_TICKS);
                let reply_id = self.session.advance_reply_id();
                let auth = Packet::with_payload(Command::Auth, session_id, reply_id, key);

                self.transmit(&auth).await?;
                let reply = self.receive_response().await?;

                match reply.code {
                    code if code.is_success() => {
                        self.session.initialize(session_id)?;
                        self.session.authenticate()?;
                        info!("Authenticated (session_id={})", session_id);
                        Ok(())
                    }
                    Command::AckUnauth => Err(Error::Unauthenticated),
                    other => Err(Error::Protocol(format!(
                        "unexpected reply to CMD_AUTH: {other}"
                    ))),
                }
            }
            other => Err(Error::Protocol(format!(
                "unexpected reply to CMD_CONNECT: {other}"
            ))),
        }
    }

    /// Probe the endpoint before opening the real transport, so an
    /// unplugged device fails in seconds instead of a full timeout.
    async fn probe(&self) -> Result<()> {
        let addr = format!("{}:{}", self.options.ip, self.options.port);

        match timeout(
            Duration::from_secs(PROBE_TIMEOUT),
            tokio::net::TcpStream::connect(&addr),
        )
        .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(Error::Transport(rbzk_transport::Error::Io(e))),
            Err(_) => Err(Error::Transport(rbzk_transport::Error::Io(
                std::io::Error::other(format!("no route to device at {addr}")),
            ))),
        }
    }

    /// Say goodbye and close the socket.
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }

        info!("Disconnecting from {}...", self.transport.remote_addr());

        if let Err(e) = self.exchange(Command::Exit, Bytes::new()).await {
            warn!("CMD_EXIT failed, closing anyway: {e}");
        }

        self.teardown().await;
        Ok(())
    }

    pub(crate) async fn teardown(&mut self) {
        let _ = self.transport.disconnect().await;
        self.session.close();
        self.sizes = None;
        self.users_cache.clear();
    }

    // Administrative operations

    /// Resume accepting punches at the terminal.
    pub async fn enable_device(&mut self) -> Result<()> {
        let reply = self.exchange(Command::EnableDevice, Bytes::new()).await?;
        self.ensure_ack(Command::EnableDevice, &reply)
    }

    /// Stop accepting punches (terminal shows "Working...").
    pub async fn disable_device(&mut self) -> Result<()> {
        let reply = self.exchange(Command::DisableDevice, Bytes::new()).await?;
        self.ensure_ack(Command::DisableDevice, &reply)
    }

    /// Reload device-internal caches after writes.
    pub async fn refresh_data(&mut self) -> Result<()> {
        let reply = self.exchange(Command::RefreshData, Bytes::new()).await?;
        self.ensure_ack(Command::RefreshData, &reply)
    }

    /// Restart the device. It drops the connection without a goodbye;
    /// the handle is unusable until reconnected.
    pub async fn restart(&mut self) -> Result<()> {
        self.fire_and_forget(Command::Restart).await
    }

    /// Power the device off. Same contract as [`restart`](Self::restart).
    pub async fn power_off(&mut self) -> Result<()> {
        self.fire_and_forget(Command::PowerOff).await
    }

    /// Put the device to sleep.
    pub async fn sleep(&mut self) -> Result<()> {
        let reply = self.exchange(Command::Sleep, Bytes::new()).await?;
        self.ensure_ack(Command::Sleep, &reply)
    }

    /// Wake the device from sleep.
    pub async fn resume(&mut self) -> Result<()> {
        let reply = self.exchange(Command::Resume, Bytes::new()).await?;
        self.ensure_ack(Command::Resume, &reply)
    }

    async fn fire_and_forget(&mut self, command: Command) -> Result<()> {
        self.ensure_connected()?;

        warn!("Sending {command}; device will drop the connection");

        let reply_id = self.session.advance_reply_id();
        let packet = Packet::new(command, self.session.session_id(), reply_id);
        let send_result = self.transmit(&packet).await;

        self.teardown().await;
        send_result
    }

    /// Play one of the built-in voice prompts (index 0-51).
    pub async fn test_voice(&mut self, index: u32) -> Result<()> {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u32_le(index);

        let reply = self.exchange(Command::TestVoice, payload.freeze()).await?;
        self.ensure_ack(Command::TestVoice, &reply)
    }

    /// Pulse the door relay open for `seconds`.
    pub async fn unlock(&mut self, seconds: u32) -> Result<()> {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u32_le(seconds * 10); // wire unit is tenths of a second

        let reply = self.exchange(Command::Unlock, payload.freeze()).await?;
        self.ensure_ack(Command::Unlock, &reply)
    }

    /// Report whether the door sensor reads open.
    pub async fn door_state(&mut self) -> Result<bool> {
        let reply = self.exchange(Command::DoorStateRrq, Bytes::new()).await?;
        match reply.code {
            Command::AckOk => Ok(true),
            Command::AckError => Ok(false),
            other => Err(Error::Protocol(format!(
                "unexpected reply to {}: {other}",
                Command::DoorStateRrq
            ))),
        }
    }

    /// Write a line of text to the terminal LCD.
    pub async fn write_lcd(&mut self, line: u16, text: &str) -> Result<()> {
        let encoded = match self.options.encoding {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            enc => enc.encode_field(text, text.chars().count()),
        };

        let mut payload = BytesMut::with_capacity(4 + encoded.len());
        payload.put_u16_le(line);
        payload.put_u8(0);
        payload.put_u8(b' ');
        payload.put_slice(&encoded);

        let reply = self.exchange(Command::WriteLcd, payload.freeze()).await?;
        self.ensure_ack(Command::WriteLcd, &reply)
    }

    /// Restore the default LCD contents.
    pub async fn clear_lcd(&mut self) -> Result<()> {
        let reply = self.exchange(Command::ClearLcd, Bytes::new()).await?;
        self.ensure_ack(Command::ClearLcd, &reply)
    }

    // Clock

    /// Read the device wall clock.
    pub async fn get_time(&mut self) -> Result<NaiveDateTime> {
        let reply = self.exchange(Command::GetTime, Bytes::new()).await?;
        self.ensure_ack(Command::GetTime, &reply)?;

        if reply.payload.len() < 4 {
            return Err(Error::Protocol(format!(
                "clock reply too short: {} bytes",
                reply.payload.len()
            )));
        }

        let raw = u32::from_le_bytes([
            reply.payload[0],
            reply.payload[1],
            reply.payload[2],
            reply.payload[3],
        ]);
        Ok(time::decode(raw)?)
    }

    /// Set the device wall clock.
    pub async fn set_time(&mut self, when: NaiveDateTime) -> Result<()> {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u32_le(time::encode(when));

        let reply = self.exchange(Command::SetTime, payload.freeze()).await?;
        self.ensure_ack(Command::SetTime, &reply)
    }

    // Device identity

    /// Firmware version string.
    pub async fn firmware_version(&mut self) -> Result<String> {
        let reply = self.exchange(Command::GetVersion, Bytes::new()).await?;
        self.ensure_ack(Command::GetVersion, &reply)?;
        Ok(self.decode_reply_string(&reply.payload))
    }

    /// Read one device option; replies have the form `<key>=<value>\0`.
    pub async fn read_option(&mut self, key: &str) -> Result<String> {
        let mut payload = BytesMut::with_capacity(key.len() + 1);
        payload.put_slice(key.as_bytes());
        payload.put_u8(0);

        let reply = self.exchange(Command::OptionsRrq, payload.freeze()).await?;
        self.ensure_ack(Command::OptionsRrq, &reply)?;

        let text = self.decode_reply_string(&reply.payload);
        let value = match text.split_once('=') {
            Some((_, value)) => value.to_string(),
            None => text,
        };
        Ok(value)
    }

    /// Device serial number.
    pub async fn serial_number(&mut self) -> Result<String> {
        self.read_option("~SerialNumber").await
    }

    /// Platform name.
    pub async fn platform(&mut self) -> Result<String> {
        self.read_option("~Platform").await
    }

    /// User-assigned device name.
    pub async fn device_name(&mut self) -> Result<String> {
        self.read_option("~DeviceName").await
    }

    /// MAC address.
    pub async fn mac_address(&mut self) -> Result<String> {
        self.read_option("MAC").await
    }

    /// Face algorithm version.
    pub async fn face_version(&mut self) -> Result<String> {
        self.read_option("ZKFaceVersion").await
    }

    /// Fingerprint algorithm version.
    pub async fn fingerprint_version(&mut self) -> Result<String> {
        self.read_option("~ZKFPVersion").await
    }

    /// Extended user-record format flag.
    pub async fn extend_fmt(&mut self) -> Result<String> {
        self.read_option("~ExtendFmt").await
    }

    /// Collect the identity block. Options the firmware does not know
    /// come back empty instead of failing the whole read.
    pub async fn device_info(&mut self) -> Result<DeviceInfo> {
        let firmware_version = self.firmware_version().await?;

        let mut info = DeviceInfo {
            firmware_version,
            ..DeviceInfo::default()
        };

        for (slot, key) in [
            (0, "~SerialNumber"),
            (1, "~Platform"),
            (2, "~DeviceName"),
            (3, "MAC"),
            (4, "ZKFaceVersion"),
            (5, "~ZKFPVersion"),
            (6, "~ExtendFmt"),
        ] {
            let value = match self.read_option(key).await {
                Ok(value) => value,
                Err(e) if !e.kind().is_fatal() => {
                    debug!("option {key} unavailable: {e}");
                    String::new()
                }
                Err(e) => return Err(e),
            };

            match slot {
                0 => info.serial_number = value,
                1 => info.platform = value,
                2 => info.device_name = value,
                3 => info.mac_address = value,
                4 => info.face_version = value,
                5 => info.fingerprint_version = value,
                _ => info.extend_fmt = value,
            }
        }

        Ok(info)
    }

    // Counters and datasets

    /// Read occupancy counters and remember them for record-size
    /// dispatch.
    pub async fn read_sizes(&mut self) -> Result<DeviceSizes> {
        let reply = self.exchange(Command::GetFreeSizes, Bytes::new()).await?;
        self.ensure_ack(Command::GetFreeSizes, &reply)?;

        let sizes = DeviceSizes::parse(&reply.payload)?;
        self.sizes = Some(sizes);
        Ok(sizes)
    }

    /// Download the user roster.
    ///
    /// Also refreshes `next_uid` / `next_user_id` and the record width
    /// used by [`set_user`](Self::set_user).
    pub async fn get_users(&mut self) -> Result<Vec<User>> {
        let sizes = self.read_sizes().await?;

        if sizes.users <= 0 {
            self.users_cache.clear();
            self.next_uid = 1;
            self.next_user_id = "1".to_string();
            return Ok(Vec::new());
        }

        let data = self
            .bulk_read_locked(Command::UserTempRrq, fct::USER, 0)
            .await?;

        let body = strip_size_prefix(&data)?;
        let record_size = body.len() / sizes.users as usize;
        if record_size != RECORD_ZK6 && record_size != RECORD_ZK8 {
            return Err(Error::Protocol(format!(
                "roster of {} bytes for {} users gives no known record width",
                body.len(),
                sizes.users
            )));
        }
        self.user_record_size = record_size;

        let users = User::parse_all(body, record_size, self.options.encoding)?;

        self.next_uid = users.iter().map(|u| u.uid).max().unwrap_or(0).wrapping_add(1);
        let mut candidate = self.next_uid as u32;
        while users.iter().any(|u| u.user_id == candidate.to_string()) {
            candidate += 1;
        }
        self.next_user_id = candidate.to_string();

        self.users_cache = users.clone();
        debug!(
            "Downloaded {} users ({}-byte records), next_uid={}",
            users.len(),
            record_size,
            self.next_uid
        );

        Ok(users)
    }

    /// Create or overwrite a user record.
    ///
    /// Unset ids are allocated from the current roster; an explicit
    /// `user_id` already taken by a different slot fails with the
    /// duplicate-identifier kind before anything is sent.
    pub async fn set_user(&mut self, new: NewUser) -> Result<User> {
        self.ensure_connected()?;

        let roster = self.get_users().await?;

        let uid = new.uid.unwrap_or(self.next_uid);
        let user_id = new.user_id.unwrap_or_else(|| self.next_user_id.clone());

        if roster
            .iter()
            .any(|u| u.user_id == user_id && u.uid != uid)
        {
            return Err(Error::Exists(user_id));
        }

        let user = User {
            uid,
            user_id,
            name: new.name,
            privilege: new.privilege,
            password: new.password,
            group_id: new.group_id,
            card: new.card,
        };

        let record = user.encode(self.user_record_size, self.options.encoding)?;
        let reply = self.exchange(Command::UserWrq, record.into()).await?;
        self.ensure_ack(Command::UserWrq, &reply)?;

        self.refresh_data().await?;

        self.users_cache.retain(|u| u.uid != user.uid);
        self.users_cache.push(user.clone());
        if user.uid >= self.next_uid {
            self.next_uid = user.uid.wrapping_add(1);
        }

        Ok(user)
    }

    /// Delete the user in device slot `uid`.
    pub async fn delete_user(&mut self, uid: u16) -> Result<()> {
        let mut payload = BytesMut::with_capacity(2);
        payload.put_u16_le(uid);

        let reply = self.exchange(Command::DeleteUser, payload.freeze()).await?;
        self.ensure_ack(Command::DeleteUser, &reply)?;

        self.refresh_data().await?;
        self.users_cache.retain(|u| u.uid != uid);
        Ok(())
    }

    /// Download attendance records.
    ///
    /// Records that carry only a device `uid` get their `user_id`
    /// resolved against the roster; unknown uids fall through as the
    /// decimal uid.
    pub async fn get_attendance(&mut self) -> Result<Vec<Attendance>> {
        let sizes = self.read_sizes().await?;

        if sizes.records <= 0 {
            return Ok(Vec::new());
        }

        if self.users_cache.is_empty() && sizes.users > 0 {
            self.get_users().await?;
        }

        let data = self
            .bulk_read_locked(Command::AttLogRrq, fct::ATTLOG, 0)
            .await?;

        let body = strip_size_prefix(&data)?;
        let record_size = body.len() / sizes.records as usize;

        let mut logs = Attendance::parse_all(body, record_size, self.options.encoding)?;

        for log in &mut logs {
            if log.user_id.is_empty() {
                log.user_id = self
                    .users_cache
                    .iter()
                    .find(|u| u.uid == log.uid)
                    .map(|u| u.user_id.clone())
                    .unwrap_or_else(|| log.uid.to_string());
            }
        }

        debug!("Downloaded {} attendance records", logs.len());
        Ok(logs)
    }

    /// Erase all attendance records.
    pub async fn clear_attendance(&mut self) -> Result<()> {
        let reply = self.exchange(Command::ClearAttLog, Bytes::new()).await?;
        self.ensure_ack(Command::ClearAttLog, &reply)?;
        self.refresh_data().await
    }

    /// Factory-wipe users, templates and records.
    pub async fn clear_data(&mut self) -> Result<()> {
        let reply = self.exchange(Command::ClearData, Bytes::new()).await?;
        self.ensure_ack(Command::ClearData, &reply)?;

        self.users_cache.clear();
        self.next_uid = 1;
        self.next_user_id = "1".to_string();
        self.refresh_data().await
    }

    /// Download every enrolled fingerprint template.
    pub async fn get_templates(&mut self) -> Result<Vec<FingerTemplate>> {
        let sizes = self.read_sizes().await?;

        if sizes.fingers <= 0 {
            return Ok(Vec::new());
        }

        let data = self
            .bulk_read_locked(Command::PrepareData, fct::FINGERTMP, 0)
            .await?;

        let body = strip_size_prefix(&data)?;
        Ok(FingerTemplate::parse_stream(body)?)
    }

    /// Fetch one template by slot and finger.
    pub async fn get_user_template(
        &mut self,
        uid: u16,
        finger_id: u16,
    ) -> Result<FingerTemplate> {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u16_le(uid);
        payload.put_u16_le(finger_id);

        let reply = self.exchange(Command::GetUserTemp, payload.freeze()).await?;

        let blob = match reply.code {
            Command::PrepareData => match self.drain_prepared(&reply).await {
                Ok(blob) => blob,
                Err(e) => {
                    if e.kind().is_fatal() {
                        self.teardown().await;
                    }
                    return Err(e);
                }
            },
            Command::Data => reply.payload,
            Command::AckError => {
                return Err(Error::Device {
                    command: Command::GetUserTemp,
                })
            }
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected reply to {}: {other}",
                    Command::GetUserTemp
                )))
            }
        };

        Ok(FingerTemplate::new(uid, finger_id as u8, 1, blob))
    }

    // Exchange plumbing

    pub(crate) fn max_chunk(&self) -> usize {
        self.transport.max_chunk()
    }

    fn ensure_connected(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    /// Send one request and read one reply, tearing the connection
    /// down on fatal failures so later calls fail fast.
    pub(crate) async fn exchange(&mut self, command: Command, payload: Bytes) -> Result<Reply> {
        match self.exchange_inner(command, payload).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                if e.kind().is_fatal() {
                    self.teardown().await;
                }
                Err(e)
            }
        }
    }

    async fn exchange_inner(&mut self, command: Command, payload: Bytes) -> Result<Reply> {
        self.ensure_connected()?;

        let reply_id = self.session.advance_reply_id();
        let packet =
            Packet::with_payload(command, self.session.session_id(), reply_id, payload);

        self.transmit(&packet).await?;
        self.receive_response().await
    }

    /// Receive the next real reply, skipping keep-alive frames.
    async fn receive_response(&mut self) -> Result<Reply> {
        let mut reply = self.receive_reply().await?;
        while reply.code == Command::TcpStillAlive {
            trace!("Keep-alive frame, waiting for the real reply");
            reply = self.receive_reply().await?;
        }
        Ok(reply)
    }

    async fn transmit(&mut self, packet: &Packet) -> Result<()> {
        trace!("Sending: {:?}", packet);

        let data = packet.encode();
        if self.options.verbose {
            debug!("TX ({} bytes): {:02X?}", data.len(), &data[..data.len().min(32)]);
        }

        self.transport.send(&data).await?;
        Ok(())
    }

    /// Read and decode one frame; adopts the echoed reply id.
    pub(crate) async fn receive_reply(&mut self) -> Result<Reply> {
        let frame = self.transport.receive(self.options.timeout).await?;

        if frame.keep_alive {
            return Ok(Reply {
                code: Command::TcpStillAlive,
                session_id: self.session.session_id(),
                reply_id: self.session.reply_id(),
                payload: Bytes::new(),
                frame_len: frame.length,
            });
        }

        if self.options.verbose {
            debug!(
                "RX ({} bytes): {:02X?}",
                frame.bytes.len(),
                &frame.bytes[..frame.bytes.len().min(32)]
            );
        }

        let length = frame.length;
        let packet = Packet::decode(frame.bytes)?;
        trace!("Received: {:?}", packet);

        self.session.sync_reply_id(packet.reply_id);

        Ok(Reply {
            code: packet.command,
            session_id: packet.session_id,
            reply_id: packet.reply_id,
            payload: packet.payload,
            frame_len: length,
        })
    }

    fn ensure_ack(&self, command: Command, reply: &Reply) -> Result<()> {
        if reply.code.is_success() {
            return Ok(());
        }

        match reply.code {
            Command::AckUnauth => Err(Error::Unauthenticated),
            Command::AckError => Err(Error::Device { command }),
            other => Err(Error::Protocol(format!(
                "unexpected reply to {command}: {other}"
            ))),
        }
    }

    fn decode_reply_string(&self, payload: &[u8]) -> String {
        self.options.encoding.decode_field(payload).trim().to_string()
    }

    /// Run a bulk read with the device disabled, re-enabling it in a
    /// release position. A failing enable after a failing read is a
    /// warning, never the primary error.
    async fn bulk_read_locked(
        &mut self,
        inner: Command,
        fct_selector: u32,
        ext: u32,
    ) -> Result<Bytes> {
        self.disable_device().await?;

        let data = self.read_with_buffer(inner, fct_selector, ext).await;

        match self.enable_device().await {
            Ok(()) => {}
            Err(e) => warn!("re-enable after bulk read failed: {e}"),
        }

        data
    }
}

/// Bulk datasets start with their own u32 length.
fn strip_size_prefix(data: &[u8]) -> Result<&[u8]> {
    if data.is_empty() {
        return Ok(data);
    }
    if data.len() < 4 {
        return Err(Error::Protocol(format!(
            "bulk dataset of {} bytes has no size prefix",
            data.len()
        )));
    }

    let declared = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let body = &data[4..];

    if declared > body.len() {
        return Err(Error::Protocol(format!(
            "bulk dataset truncated: declared {declared}, got {}",
            body.len()
        )));
    }

    Ok(&body[..declared])
}
