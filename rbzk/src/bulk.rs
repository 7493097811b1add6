//! Bulk transfer engine
//!
//! Datasets larger than one reply arrive through a device-side buffer:
//! the client announces the read with `CMD_PREPARE_BUFFER`, pulls the
//! buffer down in `CMD_READ_BUFFER` chunks, and releases it with
//! `CMD_FREE_DATA`. Small datasets short-circuit: the device may answer
//! the prepare with `CMD_DATA` carrying everything at once. Either way
//! the same top-level request must accept both shapes.
//!
//! A chunk itself can arrive in two shapes: a single `CMD_DATA` reply,
//! or a `CMD_PREPARE_DATA` announcement followed by `CMD_DATA` stream
//! packets and a terminal `CMD_ACK_OK`.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use rbzk_core::constants::CHUNK_RETRIES;
use rbzk_core::Command;

use crate::device::{Device, Reply};
use crate::error::{Error, Result};

impl Device {
    /// Read a complete dataset through the device-side buffer.
    ///
    /// `inner` names the dataset (`CMD_USERTEMP_RRQ`, `CMD_ATTLOG_RRQ`,
    /// ...); `fct_selector` and `ext` narrow it down.
    pub(crate) async fn read_with_buffer(
        &mut self,
        inner: Command,
        fct_selector: u32,
        ext: u32,
    ) -> Result<Bytes> {
        match self.read_with_buffer_inner(inner, fct_selector, ext).await {
            Ok(data) => Ok(data),
            Err(e) => {
                if e.kind().is_fatal() {
                    self.teardown().await;
                }
                Err(e)
            }
        }
    }

    async fn read_with_buffer_inner(
        &mut self,
        inner: Command,
        fct_selector: u32,
        ext: u32,
    ) -> Result<Bytes> {
        let mut payload = BytesMut::with_capacity(11);
        payload.put_u8(1);
        payload.put_u16_le(inner.into());
        payload.put_u32_le(fct_selector);
        payload.put_u32_le(ext);

        debug!("Preparing buffered read of {inner}");
        let reply = self
            .exchange(Command::PrepareBuffer, payload.freeze())
            .await?;

        match reply.code {
            // Whole dataset fits in this reply
            Command::Data => {
                debug!("{inner}: dataset fits in one reply ({} bytes)", reply.payload.len());
                Ok(reply.payload)
            }
            code if code.is_success() => {
                if reply.payload.len() < 4 {
                    return Err(Error::Protocol(format!(
                        "prepare reply for {inner} too short: {} bytes",
                        reply.payload.len()
                    )));
                }

                let total = u32::from_le_bytes([
                    reply.payload[0],
                    reply.payload[1],
                    reply.payload[2],
                    reply.payload[3],
                ]) as usize;

                if total == 0 {
                    self.free_buffer().await?;
                    return Ok(Bytes::new());
                }

                let max_chunk = self.max_chunk();
                debug!("{inner}: {total} bytes buffered, chunking by {max_chunk}");

                let mut data = BytesMut::with_capacity(total);
                let mut start = 0usize;
                while start < total {
                    let size = (total - start).min(max_chunk);
                    let chunk = self.read_chunk(start, size).await?;
                    data.put_slice(&chunk);
                    start += size;
                }

                self.free_buffer().await?;

                debug!("{inner}: downloaded {} bytes", data.len());
                Ok(data.freeze())
            }
            Command::AckError => Err(Error::Device {
                command: Command::PrepareBuffer,
            }),
            other => Err(Error::Protocol(format!(
                "unexpected reply preparing {inner}: {other}"
            ))),
        }
    }

    /// Release the device-side transfer buffer.
    async fn free_buffer(&mut self) -> Result<()> {
        let reply = self.exchange(Command::FreeData, Bytes::new()).await?;
        if reply.code.is_success() {
            Ok(())
        } else {
            Err(Error::Protocol(format!(
                "device refused to free the transfer buffer: {}",
                reply.code
            )))
        }
    }

    /// Read one chunk of the buffered dataset, retrying transient
    /// failures.
    async fn read_chunk(&mut self, start: usize, size: usize) -> Result<Bytes> {
        let mut payload = BytesMut::with_capacity(8);
        payload.put_i32_le(start as i32);
        payload.put_i32_le(size as i32);
        let payload = payload.freeze();

        for attempt in 1..=CHUNK_RETRIES {
            if attempt > 1 {
                debug!("Chunk at {start}: attempt {attempt}/{CHUNK_RETRIES}");
            }

            let reply = self
                .exchange(Command::ReadBuffer, payload.clone())
                .await?;

            if let Some(chunk) = self.receive_chunk(&reply, size).await? {
                return Ok(chunk);
            }
        }

        Err(Error::Protocol(format!(
            "chunk at offset {start} failed after {CHUNK_RETRIES} attempts"
        )))
    }

    /// Accept one chunk reply. `Ok(None)` means the attempt is
    /// retryable; stream-level damage is an error.
    async fn receive_chunk(&mut self, reply: &Reply, expected: usize) -> Result<Option<Bytes>> {
        match reply.code {
            Command::Data => {
                if reply.payload.len() == expected {
                    Ok(Some(reply.payload.clone()))
                } else {
                    warn!(
                        "chunk reply carried {} bytes, wanted {expected}",
                        reply.payload.len()
                    );
                    Ok(None)
                }
            }
            Command::PrepareData => Ok(Some(self.drain_prepared(reply).await?)),
            other => {
                warn!("unexpected chunk reply {other}, retrying");
                Ok(None)
            }
        }
    }

    /// Drain a `CMD_PREPARE_DATA` stream: the announcement's first four
    /// bytes give the size, `CMD_DATA` packets carry the bytes, and a
    /// terminal `CMD_ACK_OK` closes the stream.
    pub(crate) async fn drain_prepared(&mut self, announcement: &Reply) -> Result<Bytes> {
        if announcement.payload.len() < 4 {
            return Err(Error::Protocol(format!(
                "data announcement too short: {} bytes",
                announcement.payload.len()
            )));
        }

        let announced = u32::from_le_bytes([
            announcement.payload[0],
            announcement.payload[1],
            announcement.payload[2],
            announcement.payload[3],
        ]) as usize;

        let mut data = BytesMut::with_capacity(announced);
        // Some firmware starts the stream right behind the size word
        if announcement.payload.len() > 4 {
            data.put_slice(&announcement.payload[4..]);
        }

        while data.len() < announced {
            let packet = self.receive_reply().await?;
            match packet.code {
                Command::Data => data.put_slice(&packet.payload),
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected {other} inside a data stream"
                    )))
                }
            }
        }

        let terminator = self.receive_reply().await?;
        if terminator.code != Command::AckOk {
            return Err(Error::Protocol(format!(
                "data stream ended with {} instead of {}",
                terminator.code,
                Command::AckOk
            )));
        }

        data.truncate(announced);
        Ok(data.freeze())
    }
}
