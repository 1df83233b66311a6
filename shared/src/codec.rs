//! Per-connection packet codec
//!
//! Combines the frame splitter with the optional compression layer. The
//! inbound side buffers raw socket bytes and hands out packet payloads;
//! the outbound side turns payloads into wire frames.

use crate::compression::CompressionContext;
use crate::error::Result;
use crate::frame::FrameSplitter;
use bytes::{Bytes, BytesMut};

#[derive(Debug, Default)]
pub struct PacketCodec {
    splitter: FrameSplitter,
    compression: Option<CompressionContext>,
    inbound: BytesMut,
}

impl PacketCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches both directions to the compressed frame format.
    ///
    /// Replaces any previous context, which releases its streams.
    pub fn enable_compression(&mut self, threshold: usize) {
        self.compression = Some(CompressionContext::new(threshold));
    }

    pub fn compression_threshold(&self) -> Option<usize> {
        self.compression.as_ref().map(CompressionContext::threshold)
    }

    /// Buffer socket reads are appended to
    pub fn inbound_mut(&mut self) -> &mut BytesMut {
        &mut self.inbound
    }

    pub fn feed(&mut self, data: &[u8]) {
        self.inbound.extend_from_slice(data);
    }

    /// Next complete packet payload, or `None` if more bytes are needed.
    pub fn next_payload(&mut self) -> Result<Option<Bytes>> {
        let body = match self.splitter.split(&mut self.inbound)? {
            Some(body) => body,
            None => return Ok(None),
        };

        match self.compression.as_mut() {
            Some(context) => context.decompress_frame(body).map(Some),
            None => Ok(Some(body)),
        }
    }

    /// Appends the wire frame for `payload` to `out`.
    pub fn encode(&mut self, payload: &[u8], out: &mut BytesMut) -> Result<()> {
        match self.compression.as_mut() {
            Some(context) => context.compress_frame(payload, out),
            None => self.splitter.write_frame(payload, out),
        }
    }

    /// Releases the compression streams, if any. Safe to call repeatedly.
    pub fn release(&mut self) -> bool {
        self.compression
            .as_mut()
            .map_or(false, CompressionContext::release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;

    #[test]
    fn test_uncompressed_exchange() {
        let mut sender = PacketCodec::new();
        let mut receiver = PacketCodec::new();

        let mut wire = BytesMut::new();
        sender.encode(b"\x00hello", &mut wire).unwrap();
        sender.encode(b"\x01world", &mut wire).unwrap();

        // Deliver one byte at a time
        let mut payloads = Vec::new();
        for byte in wire.iter() {
            receiver.feed(&[*byte]);
            while let Some(payload) = receiver.next_payload().unwrap() {
                payloads.push(payload);
            }
        }
        assert_eq!(payloads.len(), 2);
        assert_eq!(&payloads[1][..], b"\x01world");
    }

    #[test]
    fn test_compressed_exchange() {
        let mut sender = PacketCodec::new();
        let mut receiver = PacketCodec::new();
        sender.enable_compression(64);
        receiver.enable_compression(64);

        let large = vec![7u8; 5000];
        let mut wire = BytesMut::new();
        sender.encode(b"\x02tiny", &mut wire).unwrap();
        sender.encode(&large, &mut wire).unwrap();
        assert!(wire.len() < large.len());

        receiver.feed(&wire);
        assert_eq!(&receiver.next_payload().unwrap().unwrap()[..], b"\x02tiny");
        assert_eq!(&receiver.next_payload().unwrap().unwrap()[..], &large[..]);
        assert!(receiver.next_payload().unwrap().is_none());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut codec = PacketCodec::new();
        assert!(!codec.release());

        codec.enable_compression(256);
        assert_eq!(codec.compression_threshold(), Some(256));
        assert!(codec.release());
        assert!(!codec.release());

        let mut out = BytesMut::new();
        assert!(matches!(
            codec.encode(b"x", &mut out),
            Err(ProtocolError::Released)
        ));
    }
}
