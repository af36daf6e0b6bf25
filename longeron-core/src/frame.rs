//! Length-prefix frame header codec.
//!
//! Every application message on the stream is preceded by a fixed-size
//! header: a little-endian `u32` payload length. The total frame on the wire
//! is `HEADER_SIZE + payload_len` with no other framing, magic numbers, or
//! escape sequences.

use crate::error::{LongeronError, Result};

/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = core::mem::size_of::<u32>();

/// Encode a payload length into `dst`.
///
/// # Panics
///
/// Panics in debug builds if `payload_len` does not fit a `u32`.
#[inline]
pub fn encode_header(payload_len: usize, dst: &mut [u8; HEADER_SIZE]) {
    debug_assert!(payload_len <= u32::MAX as usize);
    dst.copy_from_slice(&(payload_len as u32).to_le_bytes());
}

/// Decode a frame header, validating the declared length against `max`.
///
/// A zero-length frame is never legal on this wire, and a length above the
/// receiver's configured bound is a hard protocol error; both fail with
/// `MalformedHeader`.
#[inline]
pub fn decode_header(src: &[u8; HEADER_SIZE], max: usize) -> Result<usize> {
    let len = u32::from_le_bytes(*src) as usize;
    if len == 0 || len > max {
        return Err(LongeronError::MalformedHeader { len, max });
    }
    Ok(len)
}

/// Total size of a frame on the wire.
#[inline]
#[must_use]
pub const fn total_frame_size(payload_len: usize) -> usize {
    HEADER_SIZE + payload_len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let mut hdr = [0u8; HEADER_SIZE];
        encode_header(8192, &mut hdr);
        assert_eq!(decode_header(&hdr, 8192).unwrap(), 8192);
        assert_eq!(total_frame_size(8192), 8192 + HEADER_SIZE);
    }

    #[test]
    fn little_endian_layout() {
        let mut hdr = [0u8; HEADER_SIZE];
        encode_header(0x0102_0304, &mut hdr);
        assert_eq!(hdr, [0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn zero_length_rejected() {
        let hdr = [0u8; HEADER_SIZE];
        let err = decode_header(&hdr, 8192).unwrap_err();
        assert!(matches!(err, LongeronError::MalformedHeader { len: 0, .. }));
    }

    #[test]
    fn oversize_rejected() {
        let mut hdr = [0u8; HEADER_SIZE];
        encode_header(8193, &mut hdr);
        let err = decode_header(&hdr, 8192).unwrap_err();
        assert!(matches!(
            err,
            LongeronError::MalformedHeader { len: 8193, max: 8192 }
        ));
    }

    #[test]
    fn bound_is_inclusive() {
        let mut hdr = [0u8; HEADER_SIZE];
        encode_header(8192, &mut hdr);
        assert!(decode_header(&hdr, 8192).is_ok());
    }
}
