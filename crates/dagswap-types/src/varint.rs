//! Unsigned LEB128 varints as used by the multiformats family.
//!
//! Values are limited to 63 bits (at most 9 encoded bytes) and must be
//! minimally encoded.

/// Maximum encoded length of a multiformats varint.
pub const MAX_VARINT_LEN: usize = 9;

/// Append the varint encoding of `value` to `out`.
pub fn encode(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Encode `value` into a fresh buffer.
pub fn to_vec(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_VARINT_LEN);
    encode(value, &mut out);
    out
}

/// Decode a varint from the front of `input`.
///
/// Returns the value and the number of bytes consumed, or `None` if the
/// input is truncated, over-long, or not minimally encoded.
pub fn decode(input: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in input.iter().enumerate().take(MAX_VARINT_LEN) {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            // A trailing zero byte means a longer-than-necessary encoding.
            if i > 0 && byte == 0 {
                return None;
            }
            return Some((value, i + 1));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_are_single_byte() {
        assert_eq!(to_vec(0), vec![0x00]);
        assert_eq!(to_vec(0x12), vec![0x12]);
        assert_eq!(to_vec(0x7f), vec![0x7f]);
    }

    #[test]
    fn multi_byte_values() {
        assert_eq!(to_vec(0x80), vec![0x80, 0x01]);
        assert_eq!(to_vec(0x0129), vec![0xa9, 0x02]);
        assert_eq!(decode(&[0xa9, 0x02, 0xff]), Some((0x0129, 2)));
    }

    #[test]
    fn truncated_input_fails() {
        assert_eq!(decode(&[]), None);
        assert_eq!(decode(&[0x80]), None);
    }

    #[test]
    fn non_minimal_encoding_fails() {
        assert_eq!(decode(&[0x81, 0x00]), None);
    }

    #[test]
    fn over_long_input_fails() {
        assert_eq!(decode(&[0xff; 10]), None);
    }

    #[test]
    fn roundtrip_boundaries() {
        for value in [1u64, 127, 128, 16_383, 16_384, u32::MAX as u64, (1 << 63) - 1] {
            let bytes = to_vec(value);
            assert_eq!(decode(&bytes), Some((value, bytes.len())));
        }
    }
}
