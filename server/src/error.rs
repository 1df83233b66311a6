//! Reasons a verification session ends early

use shared::ProtocolError;
use std::io::ErrorKind;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("corrupted frame: {0}")]
    CorruptedFrame(String),

    #[error("frame too large: {size} bytes exceeds {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("illegal packet: {0}")]
    IllegalPacket(String),

    #[error("keepalive id {received} does not match the challenge")]
    ChallengeMismatch { received: i64 },

    #[error("challenge echo replayed")]
    DuplicateEcho,

    #[error("too many packets ({count} > {max})")]
    TooManyPackets { count: u32, max: u32 },

    #[error("no verdict within {0:?}")]
    Timeout(Duration),

    #[error("transport disconnected: {0}")]
    TransportDisconnect(String),
}

impl VerificationError {
    pub fn illegal(message: impl Into<String>) -> Self {
        VerificationError::IllegalPacket(message.into())
    }

    /// Whether this failure lands the peer in the blacklist.
    ///
    /// Timeouts and transport failures never do: they are what a slow or
    /// flaky genuine client looks like.
    pub fn blacklists(&self) -> bool {
        !matches!(
            self,
            VerificationError::Timeout(_) | VerificationError::TransportDisconnect(_)
        )
    }

    /// Short stable name for logs and verdict events
    pub fn kind(&self) -> &'static str {
        match self {
            VerificationError::CorruptedFrame(_) => "corrupted_frame",
            VerificationError::FrameTooLarge { .. } => "frame_too_large",
            VerificationError::IllegalPacket(_) => "illegal_packet",
            VerificationError::ChallengeMismatch { .. } => "challenge_mismatch",
            VerificationError::DuplicateEcho => "duplicate_echo",
            VerificationError::TooManyPackets { .. } => "too_many_packets",
            VerificationError::Timeout(_) => "timeout",
            VerificationError::TransportDisconnect(_) => "disconnect",
        }
    }
}

impl From<ProtocolError> for VerificationError {
    fn from(error: ProtocolError) -> Self {
        match error {
            ProtocolError::CorruptedFrame(message) => VerificationError::CorruptedFrame(message),
            ProtocolError::FrameTooLarge { size, max } => {
                VerificationError::FrameTooLarge { size, max }
            }
            ProtocolError::Released => {
                VerificationError::TransportDisconnect("connection torn down".to_string())
            }
            ProtocolError::Io(e) => e.into(),
        }
    }
}

impl From<std::io::Error> for VerificationError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            ErrorKind::UnexpectedEof => {
                VerificationError::TransportDisconnect("closed by peer".to_string())
            }
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
                VerificationError::TransportDisconnect("reset by peer".to_string())
            }
            _ => VerificationError::TransportDisconnect(error.to_string()),
        }
    }
}
