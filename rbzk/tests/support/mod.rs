//! In-process fake terminal for integration tests.
//!
//! Serves one TCP connection with real frames (outer frame + inner
//! packet, checksummed), keeps a tiny in-memory user/attendance store,
//! and logs every request so tests can assert on the traffic.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use rbzk_core::{make_commkey, time, Command, Packet};
use rbzk_types::{Encoding, FingerTemplate, User};

/// One request as the fake terminal saw it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub command: u16,
    pub reply_id: u16,
    pub payload: Vec<u8>,
}

pub type RequestLog = Arc<Mutex<Vec<SeenRequest>>>;

/// Fake terminal configuration and state.
pub struct FakeTerminal {
    pub session_id: u16,
    /// Communication password; `Some` makes CMD_CONNECT answer UNAUTH
    pub password: Option<u32>,
    /// Preloaded roster, served at this record width
    pub users: Vec<User>,
    pub user_record_size: usize,
    /// Raw attendance dataset (without size prefix) and record count
    pub attendance: Vec<u8>,
    pub attendance_count: i32,
    /// Preloaded templates for bulk and single reads
    pub templates: Vec<FingerTemplate>,
    /// Close the connection after serving this many READ_BUFFER chunks
    pub fail_after_chunks: Option<usize>,
    /// Answer PREPARE_BUFFER with the whole dataset in one CMD_DATA
    pub direct_data: bool,
    /// Emit a zero-length keep-alive frame before every reply
    pub keepalive_before_reply: bool,
    /// Answer CMD_USER_WRQ / CMD_DELETE_USER with CMD_ACK_ERROR
    pub reject_writes: bool,
    /// Answer CMD_PREPARE_BUFFER with CMD_ACK_ERROR
    pub reject_reads: bool,
}

impl Default for FakeTerminal {
    fn default() -> Self {
        Self {
            session_id: 0x360E,
            password: None,
            users: Vec::new(),
            user_record_size: rbzk_types::user::RECORD_ZK8,
            attendance: Vec::new(),
            attendance_count: 0,
            templates: Vec::new(),
            fail_after_chunks: None,
            direct_data: false,
            keepalive_before_reply: false,
            reject_writes: false,
            reject_reads: false,
        }
    }
}

pub struct Running {
    pub addr: std::net::SocketAddr,
    pub log: RequestLog,
    pub handle: JoinHandle<()>,
}

impl FakeTerminal {
    /// Bind a listener and serve connections until the task is dropped.
    pub async fn spawn(self) -> Running {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let log: RequestLog = Arc::new(Mutex::new(Vec::new()));

        let log_clone = log.clone();
        let handle = tokio::spawn(async move {
            let mut state = self;
            loop {
                let Ok((sock, _)) = listener.accept().await else {
                    return;
                };
                state.serve(sock, log_clone.clone()).await;
            }
        });

        Running { addr, log, handle }
    }

    async fn serve(&mut self, mut sock: TcpStream, log: RequestLog) {
        let mut chunks_served = 0usize;
        // Device-side transfer buffer between PREPARE_BUFFER and FREE_DATA
        let mut buffer: Option<Vec<u8>> = None;

        loop {
            let Some(request) = read_request(&mut sock).await else {
                return;
            };

            log.lock().unwrap().push(SeenRequest {
                command: request.command.into(),
                reply_id: request.reply_id,
                payload: request.payload.to_vec(),
            });

            if self.keepalive_before_reply {
                let keepalive = rbzk_core::packet::encode_frame_header(0);
                if sock.write_all(&keepalive).await.is_err() {
                    return;
                }
            }

            let reply_id = request.reply_id;
            match request.command {
                Command::Connect => {
                    let code = if self.password.is_some() {
                        Command::AckUnauth
                    } else {
                        Command::AckOk
                    };
                    self.reply(&mut sock, code, reply_id, &[]).await;
                }
                Command::Auth => {
                    let expected =
                        make_commkey(self.password.unwrap_or(0), self.session_id, 50);
                    let code = if request.payload.as_ref() == expected.as_ref() {
                        Command::AckOk
                    } else {
                        Command::AckUnauth
                    };
                    self.reply(&mut sock, code, reply_id, &[]).await;
                }
                Command::Exit => {
                    self.reply(&mut sock, Command::AckOk, reply_id, &[]).await;
                    return;
                }
                Command::Restart | Command::PowerOff => {
                    // Real hardware reboots without a goodbye
                    return;
                }
                Command::GetFreeSizes => {
                    let block = self.free_sizes_block();
                    self.reply(&mut sock, Command::AckOk, reply_id, &block).await;
                }
                Command::GetTime => {
                    let raw = time::encode(
                        chrono::NaiveDate::from_ymd_opt(2025, 5, 17)
                            .unwrap()
                            .and_hms_opt(10, 45, 0)
                            .unwrap(),
                    );
                    self.reply(&mut sock, Command::AckOk, reply_id, &raw.to_le_bytes())
                        .await;
                }
                Command::GetVersion => {
                    self.reply(&mut sock, Command::AckOk, reply_id, b"Ver 6.60 Apr 2020")
                        .await;
                }
                Command::OptionsRrq => {
                    let key = String::from_utf8_lossy(
                        request.payload.split(|&b| b == 0).next().unwrap_or(&[]),
                    )
                    .to_string();
                    let value = match key.as_str() {
                        "~SerialNumber" => "A8N5204260001",
                        "~Platform" => "ZMM220_TFT",
                        "~DeviceName" => "K40",
                        "MAC" => "00:17:61:C8:EC:17",
                        _ => "",
                    };
                    let line = format!("{key}={value}\0");
                    self.reply(&mut sock, Command::AckOk, reply_id, line.as_bytes())
                        .await;
                }
                Command::UserWrq => {
                    if self.reject_writes {
                        self.reply(&mut sock, Command::AckError, reply_id, &[]).await;
                    } else {
                        let user = decode_user(&request.payload, self.user_record_size);
                        self.users.retain(|u| u.uid != user.uid);
                        self.users.push(user);
                        self.reply(&mut sock, Command::AckOk, reply_id, &[]).await;
                    }
                }
                Command::DeleteUser => {
                    let uid = u16::from_le_bytes([request.payload[0], request.payload[1]]);
                    let code = if self.reject_writes || !self.users.iter().any(|u| u.uid == uid)
                    {
                        Command::AckError
                    } else {
                        self.users.retain(|u| u.uid != uid);
                        Command::AckOk
                    };
                    self.reply(&mut sock, code, reply_id, &[]).await;
                }
                Command::PrepareBuffer if self.reject_reads => {
                    self.reply(&mut sock, Command::AckError, reply_id, &[]).await;
                }
                Command::PrepareBuffer => {
                    let inner = u16::from_le_bytes([request.payload[1], request.payload[2]]);
                    let dataset = self.dataset_for(inner);
                    if self.direct_data {
                        self.reply(&mut sock, Command::Data, reply_id, &dataset).await;
                    } else {
                        chunks_served = 0;
                        let total = (dataset.len() as u32).to_le_bytes();
                        buffer = Some(dataset);
                        self.reply(&mut sock, Command::AckOk, reply_id, &total).await;
                    }
                }
                Command::ReadBuffer => {
                    if let Some(limit) = self.fail_after_chunks {
                        if chunks_served >= limit {
                            return; // simulate the device falling over mid-transfer
                        }
                    }
                    chunks_served += 1;

                    let start = i32::from_le_bytes(request.payload[0..4].try_into().unwrap())
                        as usize;
                    let size = i32::from_le_bytes(request.payload[4..8].try_into().unwrap())
                        as usize;
                    let chunk: Vec<u8> = buffer
                        .as_ref()
                        .map(|b| b[start.min(b.len())..(start + size).min(b.len())].to_vec())
                        .unwrap_or_default();
                    self.reply(&mut sock, Command::Data, reply_id, &chunk).await;
                }
                Command::FreeData => {
                    buffer = None;
                    self.reply(&mut sock, Command::AckOk, reply_id, &[]).await;
                }
                Command::GetUserTemp => {
                    let uid = u16::from_le_bytes([request.payload[0], request.payload[1]]);
                    let finger =
                        u16::from_le_bytes([request.payload[2], request.payload[3]]) as u8;
                    match self
                        .templates
                        .iter()
                        .find(|t| t.uid == uid && t.finger_id == finger)
                    {
                        None => {
                            self.reply(&mut sock, Command::AckError, reply_id, &[]).await
                        }
                        Some(template) => {
                            let blob = template.template.clone();
                            // Announce, stream in small pieces, then ack
                            let announce = (blob.len() as u32).to_le_bytes();
                            self.reply(&mut sock, Command::PrepareData, reply_id, &announce)
                                .await;
                            for piece in blob.chunks(256) {
                                self.reply(&mut sock, Command::Data, reply_id, piece).await;
                            }
                            self.reply(&mut sock, Command::AckOk, reply_id, &[]).await;
                        }
                    }
                }
                // Everything else is a plain acknowledged toggle
                _ => {
                    self.reply(&mut sock, Command::AckOk, reply_id, &[]).await;
                }
            }
        }
    }

    async fn reply(&self, sock: &mut TcpStream, code: Command, reply_id: u16, payload: &[u8]) {
        let packet = Packet::with_payload(code, self.session_id, reply_id, payload.to_vec());
        let _ = sock.write_all(&packet.encode_tcp()).await;
    }

    fn free_sizes_block(&self) -> Vec<u8> {
        let mut fields = [0i32; 20];
        fields[4] = self.users.len() as i32;
        fields[6] = self.templates.len() as i32;
        fields[8] = self.attendance_count;
        fields[14] = 10_000;
        fields[15] = 3_000;
        fields[16] = 100_000;
        fields[17] = 10_000 - self.templates.len() as i32;
        fields[18] = 3_000 - self.users.len() as i32;
        fields[19] = 100_000 - self.attendance_count;
        fields.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Build the size-prefixed dataset a PREPARE_BUFFER names.
    fn dataset_for(&self, inner: u16) -> Vec<u8> {
        let body: Vec<u8> = match Command::try_from(inner) {
            Ok(Command::UserTempRrq) => self
                .users
                .iter()
                .flat_map(|u| {
                    u.encode(self.user_record_size, Encoding::Utf8).unwrap()
                })
                .collect(),
            Ok(Command::AttLogRrq) => self.attendance.clone(),
            Ok(Command::PrepareData) => self
                .templates
                .iter()
                .flat_map(|t| t.encode_entry())
                .collect(),
            _ => Vec::new(),
        };

        let mut dataset = (body.len() as u32).to_le_bytes().to_vec();
        dataset.extend_from_slice(&body);
        dataset
    }
}

fn decode_user(payload: &[u8], record_size: usize) -> User {
    match record_size {
        rbzk_types::user::RECORD_ZK6 => User::decode_zk6(payload, Encoding::Utf8).unwrap(),
        _ => User::decode_zk8(payload, Encoding::Utf8).unwrap(),
    }
}

async fn read_request(sock: &mut TcpStream) -> Option<Packet> {
    let mut header = [0u8; 8];
    sock.read_exact(&mut header).await.ok()?;
    let length = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;

    let mut inner = vec![0u8; length];
    sock.read_exact(&mut inner).await.ok()?;

    Packet::decode(BytesMut::from(&inner[..])).ok()
}

/// Roster entry helper for tests.
pub fn user(uid: u16, user_id: &str, name: &str) -> User {
    User {
        uid,
        user_id: user_id.to_string(),
        name: name.to_string(),
        privilege: 0,
        password: String::new(),
        group_id: String::new(),
        card: 0,
    }
}

/// 8-byte attendance record helper.
pub fn attendance_small(uid: u16, t: chrono::NaiveDateTime, status: u8, punch: u8) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf[0..2].copy_from_slice(&uid.to_le_bytes());
    buf[2] = status;
    buf[3..7].copy_from_slice(&time::encode(t).to_le_bytes());
    buf[7] = punch;
    buf
}

/// Commands seen so far, as raw codes.
pub fn seen_codes(log: &RequestLog) -> Vec<u16> {
    log.lock().unwrap().iter().map(|r| r.command).collect()
}
