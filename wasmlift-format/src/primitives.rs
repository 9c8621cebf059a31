//! Byte-level primitives used by every reader: single bytes, fixed-size
//! spans, length-prefixed byte vectors, UTF-8 strings, and IEEE-754
//! floats.

use wasmlift_error::{Error, ErrorKind, Result};

use crate::leb128;

/// Read a single byte at `pos`.
pub fn read_u8(input: &[u8], pos: usize) -> Result<(u8, usize)> {
    input.get(pos).copied().map(|b| (b, 1)).ok_or_else(|| {
        Error::at(pos, ErrorKind::UnexpectedEof { needed: 1, available: input.len().saturating_sub(pos) })
    })
}

/// Read `len` raw bytes at `pos`, returning a borrowed slice.
pub fn read_bytes(input: &[u8], pos: usize, len: usize) -> Result<(&[u8], usize)> {
    let end = pos.checked_add(len).ok_or_else(|| {
        Error::at(pos, ErrorKind::UnexpectedEof { needed: len, available: input.len().saturating_sub(pos) })
    })?;
    input.get(pos..end).map(|s| (s, len)).ok_or_else(|| {
        Error::at(pos, ErrorKind::UnexpectedEof { needed: len, available: input.len().saturating_sub(pos) })
    })
}

/// Read a LEB128 `u32` length followed by that many raw bytes.
pub fn read_byte_vec(input: &[u8], pos: usize) -> Result<(&[u8], usize)> {
    let (len, len_size) = leb128::read_u32(input, pos)?;
    let (bytes, data_size) = read_bytes(input, pos + len_size, len as usize)?;
    Ok((bytes, len_size + data_size))
}

/// Read a length-prefixed UTF-8 string.
pub fn read_string(input: &[u8], pos: usize) -> Result<(String, usize)> {
    let (bytes, consumed) = read_byte_vec(input, pos)?;
    let text = core::str::from_utf8(bytes).map_err(|_| Error::at(pos, ErrorKind::BadUtf8))?;
    Ok((text.to_string(), consumed))
}

/// Encode a string as a LEB128 length prefix followed by its UTF-8 bytes.
#[must_use]
pub fn write_string(value: &str) -> Vec<u8> {
    let mut out = leb128::write_u32(value.len() as u32);
    out.extend_from_slice(value.as_bytes());
    out
}

/// Encode a byte slice as a LEB128 length prefix followed by the bytes.
#[must_use]
pub fn write_byte_vec(value: &[u8]) -> Vec<u8> {
    let mut out = leb128::write_u32(value.len() as u32);
    out.extend_from_slice(value);
    out
}

/// Read a little-endian `f32`.
pub fn read_f32(input: &[u8], pos: usize) -> Result<(f32, usize)> {
    let (bytes, consumed) = read_bytes(input, pos, 4)?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    Ok((f32::from_le_bytes(buf), consumed))
}

/// Read a little-endian `f64`.
pub fn read_f64(input: &[u8], pos: usize) -> Result<(f64, usize)> {
    let (bytes, consumed) = read_bytes(input, pos, 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok((f64::from_le_bytes(buf), consumed))
}

/// Encode an `f32` as little-endian bytes, preserving its bit pattern
/// (including NaN payloads) exactly.
#[must_use]
pub fn write_f32(value: f32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Encode an `f64` as little-endian bytes, preserving its bit pattern
/// (including NaN payloads) exactly.
#[must_use]
pub fn write_f64(value: f64) -> [u8; 8] {
    value.to_le_bytes()
}
