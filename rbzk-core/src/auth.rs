//! Challenge-response authentication
//!
//! Devices with a communication password answer `CMD_CONNECT` with
//! `CMD_ACK_UNAUTH`; the client then proves knowledge of the password by
//! sending a commkey scrambled with the session id.

use bytes::Bytes;

/// Create the authentication key from password and session_id
///
/// # Algorithm
///
/// 1. Reverse the 32 bits of the password
/// 2. Add the session id
/// 3. XOR the four little-endian bytes with `'Z' 'K' 'S' 'O'`
/// 4. Swap the two little-endian u16 halves
/// 5. XOR with the ticks byte — except the third byte, which is the
///    ticks byte itself (the device expects this asymmetry)
pub fn make_commkey(password: u32, session_id: u16, ticks: u8) -> Bytes {
    let mut k: u32 = 0;
    for i in 0..32 {
        if (password & (1 << i)) != 0 {
            k = (k << 1) | 1;
        } else {
            k <<= 1;
        }
    }

    k = k.wrapping_add(session_id as u32);

    let bytes = k.to_le_bytes();
    let xored = [
        bytes[0] ^ b'Z',
        bytes[1] ^ b'K',
        bytes[2] ^ b'S',
        bytes[3] ^ b'O',
    ];

    let low = u16::from_le_bytes([xored[0], xored[1]]);
    let high = u16::from_le_bytes([xored[2], xored[3]]);

    let mut swapped = [0u8; 4];
    swapped[0..2].copy_from_slice(&high.to_le_bytes());
    swapped[2..4].copy_from_slice(&low.to_le_bytes());

    let result = [
        swapped[0] ^ ticks,
        swapped[1] ^ ticks,
        ticks,
        swapped[3] ^ ticks,
    ];

    Bytes::copy_from_slice(&result)
}
