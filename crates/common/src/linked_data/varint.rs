//! Unsigned LEB128 varints, as used by multiformats, block
//! containers and protobuf.

/// Longest encoding of a `u64`.
pub const MAX_LEN: usize = 10;

/// Append the varint encoding of `value` to `out`.
pub fn encode(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Decode a varint from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed, or `None`
///  if the input ends early or overflows 64 bits.
pub fn decode(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, byte) in bytes.iter().take(MAX_LEN).enumerate() {
        let part = (byte & 0x7f) as u64;
        if i == MAX_LEN - 1 && part > 1 {
            return None;
        }
        value |= part << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}
