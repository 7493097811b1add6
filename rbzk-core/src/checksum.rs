//! ZK packet checksum
//!
//! 16-bit ones-complement sum over the header (checksum field zeroed)
//! followed by the payload:
//! 1. Sum successive little-endian u16 words
//! 2. After each addition, while the sum exceeds 0xFFFF, subtract 0xFFFF
//!    (end-around carry)
//! 3. Add a trailing odd byte, if any, and reduce again
//! 4. Complement; while the signed result is negative, add 0xFFFF

use tracing::trace;

/// Compute the checksum of a raw buffer.
///
/// The buffer must already have the checksum field zeroed (bytes 2-3 of
/// the header when checksumming a whole packet).
pub fn compute(buf: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut chunks = buf.chunks_exact(2);
    for word in &mut chunks {
        sum += u16::from_le_bytes([word[0], word[1]]) as u32;
        while sum > 0xFFFF {
            sum -= 0xFFFF;
        }
    }
    if let [last] = chunks.remainder() {
        sum += *last as u32;
        while sum > 0xFFFF {
            sum -= 0xFFFF;
        }
    }

    let mut checksum = !(sum as i32);
    while checksum < 0 {
        checksum += 0xFFFF;
    }

    checksum as u16
}

/// Calculate the checksum of a packet from its header fields and payload.
pub fn calculate(command: u16, session_id: u16, reply_id: u16, payload: &[u8]) -> u16 {
    let mut buf = Vec::with_capacity(8 + payload.len());

    buf.extend_from_slice(&command.to_le_bytes());
    buf.extend_from_slice(&[0, 0]); // checksum placeholder
    buf.extend_from_slice(&session_id.to_le_bytes());
    buf.extend_from_slice(&reply_id.to_le_bytes());
    buf.extend_from_slice(payload);

    let checksum = compute(&buf);

    trace!(
        command,
        session_id,
        reply_id,
        payload_len = payload.len(),
        checksum = format!("0x{:04X}", checksum),
        "Calculated checksum"
    );

    checksum
}

/// Verify a received checksum
pub fn verify(
    command: u16,
    session_id: u16,
    reply_id: u16,
    payload: &[u8],
    expected: u16,
) -> bool {
    calculate(command, session_id, reply_id, payload) == expected
}
