//! Threshold-gated zlib compression of frames
//!
//! Once compression is enabled, a frame body carries a second VarInt
//! after the outer length:
//!
//! ```text
//! [packet length][data length][payload]
//! ```
//!
//! `data length == 0` marks a raw payload, anything else is the size of
//! the payload after inflating it. Payloads below the threshold are sent
//! raw, everything else is deflated.

use crate::error::{ProtocolError, Result};
use crate::varint::{read_var_int, write_var_int, LengthMark};
use bytes::{Bytes, BytesMut};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

/// Compressed payloads must stay below this size (21-bit length field)
pub const MAX_COMPRESSED_LENGTH: usize = 1 << 21;
/// Largest uncompressed size a peer may claim, checked before inflating
pub const MAX_UNCOMPRESSED_SIZE: usize = 8 * 1024 * 1024;
/// Tolerance for raw frames that claim to be under the threshold
pub const RAW_FRAME_SLACK: usize = 2;

/// Per-connection compression state.
///
/// Owns a deflate and an inflate stream. Both are released together,
/// exactly once, either through [`CompressionContext::release`] or when
/// the context is dropped.
pub struct CompressionContext {
    threshold: usize,
    deflater: Option<Compress>,
    inflater: Option<Decompress>,
}

impl CompressionContext {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            deflater: Some(Compress::new(Compression::default(), true)),
            inflater: Some(Decompress::new(true)),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn is_released(&self) -> bool {
        self.deflater.is_none() && self.inflater.is_none()
    }

    /// Frees both zlib streams. Returns `false` if they were already freed.
    pub fn release(&mut self) -> bool {
        let deflater = self.deflater.take();
        let inflater = self.inflater.take();
        deflater.is_some() || inflater.is_some()
    }

    /// Appends a complete frame for `payload` to `out`.
    ///
    /// On error nothing is appended.
    pub fn compress_frame(&mut self, payload: &[u8], out: &mut BytesMut) -> Result<()> {
        let deflater = self.deflater.as_mut().ok_or(ProtocolError::Released)?;

        if payload.len() < self.threshold {
            write_var_int(out, (payload.len() + 1) as u32);
            write_var_int(out, 0);
            out.extend_from_slice(payload);
            return Ok(());
        }

        let start = out.len();
        let mark = LengthMark::reserve(out);
        write_var_int(out, payload.len() as u32);

        let result = deflate(deflater, payload).and_then(|compressed| {
            out.extend_from_slice(&compressed);
            mark.backpatch(out)
        });

        if let Err(e) = result {
            out.truncate(start);
            return Err(e);
        }
        Ok(())
    }

    /// Returns the payload carried by one frame body.
    ///
    /// The body is what the frame splitter produced, i.e. everything after
    /// the outer length prefix.
    pub fn decompress_frame(&mut self, mut body: Bytes) -> Result<Bytes> {
        let inflater = self.inflater.as_mut().ok_or(ProtocolError::Released)?;
        let claimed = read_var_int(&mut body)? as usize;

        if claimed == 0 {
            if body.len() > self.threshold + RAW_FRAME_SLACK {
                return Err(ProtocolError::corrupted(format!(
                    "raw frame of {} bytes above threshold {}",
                    body.len(),
                    self.threshold
                )));
            }
            return Ok(body);
        }

        if claimed < self.threshold {
            return Err(ProtocolError::corrupted(format!(
                "compressed size {} below threshold {}",
                claimed, self.threshold
            )));
        }
        if claimed > MAX_UNCOMPRESSED_SIZE {
            return Err(ProtocolError::corrupted(format!(
                "claimed size {} exceeds {}",
                claimed, MAX_UNCOMPRESSED_SIZE
            )));
        }

        inflate(inflater, &body, claimed)
    }
}

impl Drop for CompressionContext {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for CompressionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionContext")
            .field("threshold", &self.threshold)
            .field("released", &self.is_released())
            .finish()
    }
}

fn deflate(deflater: &mut Compress, input: &[u8]) -> Result<Vec<u8>> {
    deflater.reset();
    let mut output = Vec::with_capacity(input.len() / 2 + 64);

    loop {
        if output.len() >= MAX_COMPRESSED_LENGTH {
            return Err(ProtocolError::FrameTooLarge {
                size: output.len(),
                max: MAX_COMPRESSED_LENGTH,
            });
        }
        if output.len() == output.capacity() {
            output.reserve(output.capacity().max(64));
        }

        let consumed = deflater.total_in() as usize;
        let status = deflater
            .compress_vec(&input[consumed..], &mut output, FlushCompress::Finish)
            .map_err(|e| ProtocolError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        if status == Status::StreamEnd {
            break;
        }
    }

    if output.len() >= MAX_COMPRESSED_LENGTH {
        return Err(ProtocolError::FrameTooLarge {
            size: output.len(),
            max: MAX_COMPRESSED_LENGTH,
        });
    }
    Ok(output)
}

fn inflate(inflater: &mut Decompress, input: &[u8], claimed: usize) -> Result<Bytes> {
    inflater.reset(true);
    // One spare byte so an oversized stream shows up instead of stalling
    let mut output = Vec::with_capacity(claimed + 1);

    loop {
        let consumed = inflater.total_in() as usize;
        let produced = output.len();

        let status = inflater
            .decompress_vec(&input[consumed..], &mut output, FlushDecompress::Finish)
            .map_err(|e| ProtocolError::corrupted(format!("inflate failed: {}", e)))?;

        if output.len() > claimed {
            return Err(ProtocolError::corrupted(format!(
                "payload inflates past claimed size {}",
                claimed
            )));
        }
        if status == Status::StreamEnd {
            break;
        }
        if inflater.total_in() as usize == consumed && output.len() == produced {
            return Err(ProtocolError::corrupted("truncated compressed payload"));
        }
    }

    if output.len() != claimed {
        return Err(ProtocolError::corrupted(format!(
            "claimed {} bytes but inflated {}",
            claimed,
            output.len()
        )));
    }
    Ok(Bytes::from(output))
}
