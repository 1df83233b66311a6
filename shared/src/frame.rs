//! Length-prefixed framing of the inbound byte stream
//!
//! Every frame on the wire starts with a VarInt length of at most three
//! bytes (21 bits). The splitter accumulates socket reads in a `BytesMut`
//! and yields complete frame bodies; it never waits for more than the
//! prefix announces.

use crate::error::{ProtocolError, Result};
use crate::varint::{write_var_int, MAX_21_BIT_VALUE};
use bytes::{Buf, Bytes, BytesMut};

const MAX_PREFIX_BYTES: usize = 3;

/// Outcome of scanning the length prefix at the front of the buffer
enum Prefix {
    Complete { length: usize, width: usize },
    Incomplete,
}

fn scan_prefix(buf: &[u8]) -> Result<Prefix> {
    let mut length = 0usize;

    for (index, byte) in buf.iter().take(MAX_PREFIX_BYTES).enumerate() {
        length |= usize::from(byte & 0x7F) << (index * 7);
        if byte & 0x80 == 0 {
            return Ok(Prefix::Complete {
                length,
                width: index + 1,
            });
        }
    }

    if buf.len() >= MAX_PREFIX_BYTES {
        return Err(ProtocolError::corrupted("frame length prefix wider than 21 bits"));
    }
    Ok(Prefix::Incomplete)
}

/// Splits a byte stream into frame bodies.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameSplitter;

impl FrameSplitter {
    pub fn new() -> Self {
        Self
    }

    /// Removes and returns the next complete frame body from `buf`.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Empty frames are
    /// skipped. A prefix wider than three bytes clears the buffer and
    /// fails with `CorruptedFrame`.
    pub fn split(&self, buf: &mut BytesMut) -> Result<Option<Bytes>> {
        loop {
            // Runs of zero bytes are empty frames
            let zeros = buf.iter().take_while(|byte| **byte == 0).count();
            buf.advance(zeros);

            if buf.is_empty() {
                return Ok(None);
            }

            let (length, width) = match scan_prefix(&buf[..]) {
                Ok(Prefix::Complete { length, width }) => (length, width),
                Ok(Prefix::Incomplete) => return Ok(None),
                Err(e) => {
                    buf.clear();
                    return Err(e);
                }
            };

            if length == 0 {
                buf.advance(width);
                continue;
            }

            if buf.len() < width + length {
                return Ok(None);
            }

            buf.advance(width);
            return Ok(Some(buf.split_to(length).freeze()));
        }
    }

    /// Appends `body` to `out` behind its length prefix.
    pub fn write_frame(&self, body: &[u8], out: &mut BytesMut) -> Result<()> {
        if body.len() > MAX_21_BIT_VALUE {
            return Err(ProtocolError::FrameTooLarge {
                size: body.len(),
                max: MAX_21_BIT_VALUE,
            });
        }
        out.reserve(body.len() + MAX_PREFIX_BYTES);
        write_var_int(out, body.len() as u32);
        out.extend_from_slice(body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_single_frame() {
        let splitter = FrameSplitter::new();
        let mut buf = BytesMut::from(&[0x03, 0x01, 0x02, 0x03][..]);

        let frame = splitter.split(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], &[0x01, 0x02, 0x03]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_split_waits_for_body() {
        let splitter = FrameSplitter::new();
        let mut buf = BytesMut::from(&[0x05, 0x01, 0x02][..]);

        assert!(splitter.split(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 3);

        buf.extend_from_slice(&[0x03, 0x04, 0x05]);
        let frame = splitter.split(&mut buf).unwrap().unwrap();
        assert_eq!(frame.len(), 5);
    }

    #[test]
    fn test_split_waits_for_prefix() {
        let splitter = FrameSplitter::new();
        let mut buf = BytesMut::from(&[0x80][..]);
        assert!(splitter.split(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_split_multiple_frames_in_order() {
        let splitter = FrameSplitter::new();
        let mut buf = BytesMut::new();
        splitter.write_frame(b"first", &mut buf).unwrap();
        splitter.write_frame(b"second", &mut buf).unwrap();

        assert_eq!(&splitter.split(&mut buf).unwrap().unwrap()[..], b"first");
        assert_eq!(&splitter.split(&mut buf).unwrap().unwrap()[..], b"second");
        assert!(splitter.split(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_split_skips_empty_frames() {
        let splitter = FrameSplitter::new();
        let mut buf = BytesMut::from(&[0x00, 0x00, 0x80, 0x00, 0x01, 0xAA][..]);

        let frame = splitter.split(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], &[0xAA]);
    }

    #[test]
    fn test_split_rejects_wide_prefix() {
        let splitter = FrameSplitter::new();
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0xFF, 0x01, 0x00][..]);

        let result = splitter.split(&mut buf);
        assert!(matches!(result, Err(ProtocolError::CorruptedFrame(_))));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_write_frame_rejects_oversized_body() {
        let splitter = FrameSplitter::new();
        let body = vec![0u8; MAX_21_BIT_VALUE + 1];
        let mut out = BytesMut::new();
        assert!(matches!(
            splitter.write_frame(&body, &mut out),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }
}
