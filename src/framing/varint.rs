// Variable-length integers for the signature/delta record streams.
//
// Base-128, big-endian: most-significant group first.
// Each byte has bit 7 set except the final byte.

use std::io::{self, Read, Write};

/// Maximum encoded length for a 64-bit value (ceil(64/7) = 10).
pub const MAX_VARINT_LEN: usize = 10;

/// Overflow guard: if these bits are set before a shift, the next `<< 7`
/// would lose data.
const U64_OVERFLOW_MASK: u64 = 0xFE00_0000_0000_0000;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a `u64` into the tail of `buf`.
/// Returns the number of bytes used (1..=10); the encoding is
/// `buf[MAX_VARINT_LEN - n..]`.
#[inline]
pub fn encode_u64(mut num: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = MAX_VARINT_LEN;
    loop {
        i -= 1;
        buf[i] = (num as u8 & 0x7F) | 0x80;
        num >>= 7;
        if num == 0 {
            break;
        }
    }
    buf[MAX_VARINT_LEN - 1] &= 0x7F;
    MAX_VARINT_LEN - i
}

/// Append the encoding of `num` to `out`.
pub fn push_u64(out: &mut Vec<u8>, num: u64) {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u64(num, &mut buf);
    out.extend_from_slice(&buf[MAX_VARINT_LEN - len..]);
}

/// Encode a `u64` and write it to a `Write` sink.
pub fn write_u64<W: Write>(w: &mut W, num: u64) -> io::Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u64(num, &mut buf);
    w.write_all(&buf[MAX_VARINT_LEN - len..])
}

// ---------------------------------------------------------------------------
// Streaming decode
// ---------------------------------------------------------------------------

/// Outcome of reading a varint that may legitimately start at end-of-stream.
#[derive(Debug)]
pub enum VarIntError {
    /// The stream ended before the integer was complete.
    Truncated,
    /// The value does not fit in 64 bits.
    Overflow,
    /// Underlying read failure.
    Io(io::Error),
}

/// Read one byte, retrying on `Interrupted`. `Ok(None)` means end-of-stream.
pub fn read_byte<R: Read>(r: &mut R) -> io::Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match r.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Read a `u64` varint whose first byte has already been consumed.
pub fn read_u64_after<R: Read>(r: &mut R, first: u8) -> Result<u64, VarIntError> {
    let mut val = u64::from(first & 0x7F);
    let mut byte = first;
    while byte & 0x80 != 0 {
        byte = match read_byte(r).map_err(VarIntError::Io)? {
            Some(b) => b,
            None => return Err(VarIntError::Truncated),
        };
        if val & U64_OVERFLOW_MASK != 0 {
            return Err(VarIntError::Overflow);
        }
        val = (val << 7) | u64::from(byte & 0x7F);
    }
    Ok(val)
}

/// Read a `u64` varint. `Ok(None)` if the stream is exhausted before the
/// first byte.
pub fn read_u64<R: Read>(r: &mut R) -> Result<Option<u64>, VarIntError> {
    match read_byte(r).map_err(VarIntError::Io)? {
        Some(first) => read_u64_after(r, first).map(Some),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
