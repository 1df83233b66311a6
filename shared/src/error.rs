//! Error types for the wire protocol

use thiserror::Error;

/// Failures raised while framing, compressing or parsing packets.
///
/// Every variant except `Io` means the peer sent bytes no conforming
/// client would produce.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("corrupted frame: {0}")]
    CorruptedFrame(String),

    #[error("frame too large: {size} bytes exceeds {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("compression context already released")]
    Released,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    pub fn corrupted(message: impl Into<String>) -> Self {
        ProtocolError::CorruptedFrame(message.into())
    }
}

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
