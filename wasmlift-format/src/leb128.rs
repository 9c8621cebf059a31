//! LEB128 variable-length integer codecs.
//!
//! Decoding enforces the two malformed-encoding checks the Wasm binary
//! format requires: an integer must not spend more than
//! `ceil(bit_width / 7)` bytes ([`ErrorKind::IntegerTooLong`]), and the
//! unused high bits of the final byte must be a valid sign/zero extension
//! of the value ([`ErrorKind::IntegerOverflow`]). Encoding always emits the
//! minimal byte count for a value, so `decode(encode(n)) == n` and a
//! reader that also accepts non-minimal encodings is strictly more
//! permissive than the writer.

use wasmlift_error::{Error, ErrorKind, Result};

fn max_bytes(bits: u32) -> usize {
    ((bits + 6) / 7) as usize
}

/// Read an unsigned LEB128 integer of up to `bits` significant bits,
/// starting at `input[pos]`. Returns the decoded value and the number of
/// bytes consumed.
pub fn read_uleb(input: &[u8], pos: usize, bits: u32) -> Result<(u64, usize)> {
    let limit = max_bytes(bits);
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    let mut consumed = 0usize;

    loop {
        if consumed == limit {
            return Err(Error::at(pos, ErrorKind::IntegerTooLong { max_bytes: limit }));
        }
        let offset = pos + consumed;
        if offset >= input.len() {
            return Err(Error::at(
                pos,
                ErrorKind::UnexpectedEof { needed: consumed + 1, available: input.len().saturating_sub(pos) },
            ));
        }
        let byte = input[offset];
        consumed += 1;

        let low_bits = u64::from(byte & 0x7f);
        let is_last = consumed == limit;
        if is_last {
            let used_bits = bits - shift;
            let mask: u8 = if used_bits >= 7 { 0x7f } else { (1u8 << used_bits) - 1 };
            if byte & 0x7f & !mask != 0 {
                return Err(Error::at(pos, ErrorKind::IntegerOverflow));
            }
        }
        result |= low_bits << shift;

        if byte & 0x80 == 0 {
            return Ok((result, consumed));
        }
        shift += 7;
    }
}

/// Read a signed LEB128 integer of up to `bits` significant bits (sign
/// extended to `i64`), starting at `input[pos]`.
pub fn read_sleb(input: &[u8], pos: usize, bits: u32) -> Result<(i64, usize)> {
    let limit = max_bytes(bits);
    let mut result: i64 = 0;
    let mut shift: u32 = 0;
    let mut consumed = 0usize;
    let mut last_byte = 0u8;

    loop {
        if consumed == limit {
            return Err(Error::at(pos, ErrorKind::IntegerTooLong { max_bytes: limit }));
        }
        let offset = pos + consumed;
        if offset >= input.len() {
            return Err(Error::at(
                pos,
                ErrorKind::UnexpectedEof { needed: consumed + 1, available: input.len().saturating_sub(pos) },
            ));
        }
        let byte = input[offset];
        consumed += 1;
        last_byte = byte;

        result |= i64::from(byte & 0x7f) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            break;
        }
    }

    if shift < 64 && (last_byte & 0x40) != 0 {
        result |= -1i64 << shift;
    }

    // The final byte's bits above `bits` (but within the 7 payload bits)
    // must agree with the sign bit we just extended with.
    if shift > bits {
        let sign_bits = ((result >> (bits - 1)) & 1) * -1;
        let extra = result >> bits;
        if extra != sign_bits && extra != 0 {
            return Err(Error::at(pos, ErrorKind::IntegerOverflow));
        }
    }

    Ok((result, consumed))
}

/// Decode a `u32` LEB128 integer.
pub fn read_u32(input: &[u8], pos: usize) -> Result<(u32, usize)> {
    let (value, len) = read_uleb(input, pos, 32)?;
    Ok((value as u32, len))
}

/// Decode an `i32` LEB128 integer.
pub fn read_i32(input: &[u8], pos: usize) -> Result<(i32, usize)> {
    let (value, len) = read_sleb(input, pos, 32)?;
    Ok((value as i32, len))
}

/// Decode a `u64` LEB128 integer.
pub fn read_u64(input: &[u8], pos: usize) -> Result<(u64, usize)> {
    read_uleb(input, pos, 64)
}

/// Decode an `i64` LEB128 integer.
pub fn read_i64(input: &[u8], pos: usize) -> Result<(i64, usize)> {
    read_sleb(input, pos, 64)
}

/// Encode a `u32` as minimal unsigned LEB128.
#[must_use]
pub fn write_u32(value: u32) -> Vec<u8> {
    write_uleb(u64::from(value))
}

/// Encode a `u64` as minimal unsigned LEB128.
#[must_use]
pub fn write_u64(value: u64) -> Vec<u8> {
    write_uleb(value)
}

fn write_uleb(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

/// Encode an `i32` as minimal signed LEB128.
#[must_use]
pub fn write_i32(value: i32) -> Vec<u8> {
    write_sleb(i64::from(value))
}

/// Encode an `i64` as minimal signed LEB128.
#[must_use]
pub fn write_i64(value: i64) -> Vec<u8> {
    write_sleb(value)
}

fn write_sleb(mut value: i64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_small_unsigned() {
        for n in [0u32, 1, 127, 128, 300, u32::MAX] {
            let bytes = write_u32(n);
            let (decoded, len) = read_u32(&bytes, 0).unwrap();
            assert_eq!(decoded, n);
            assert_eq!(len, bytes.len());
        }
    }

    #[test]
    fn round_trips_signed() {
        for n in [0i32, -1, 64, -64, 65, -65, i32::MIN, i32::MAX] {
            let bytes = write_i32(n);
            let (decoded, len) = read_i32(&bytes, 0).unwrap();
            assert_eq!(decoded, n);
            assert_eq!(len, bytes.len());
        }
    }

    #[test]
    fn writer_uses_minimal_encoding() {
        assert_eq!(write_u32(0), vec![0x00]);
        assert_eq!(write_u32(127), vec![0x7f]);
        assert_eq!(write_u32(128), vec![0x80, 0x01]);
        assert_eq!(write_i32(-1), vec![0x7f]);
        assert_eq!(write_i32(64), vec![0xc0, 0x00]);
    }

    #[test]
    fn reader_accepts_nonminimal_encoding() {
        // 1 encoded with a redundant continuation byte.
        let (value, len) = read_u32(&[0x81, 0x00], 0).unwrap();
        assert_eq!(value, 1);
        assert_eq!(len, 2);
    }

    #[test]
    fn overlong_u32_is_rejected() {
        let bytes = [0x80, 0x80, 0x80, 0x80, 0x80, 0x00];
        let err = read_u32(&bytes, 0).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IntegerTooLong { .. }));
    }

    #[test]
    fn overflowing_high_bits_are_rejected() {
        // 5-byte u32 whose final byte sets bits above bit 31.
        let bytes = [0xff, 0xff, 0xff, 0xff, 0x1f];
        let err = read_u32(&bytes, 0).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IntegerOverflow));
    }

    #[test]
    fn truncated_input_is_eof() {
        let err = read_u32(&[0x80], 0).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnexpectedEof { .. }));
    }
}
