//! Host side of the login phase
//!
//! The gate reads the handshake and login start itself, answers with
//! `SetCompression` and `LoginSuccess` once a connection is released from
//! the queue, or turns it away with a login disconnect.

use crate::connection::Transport;
use bytes::BytesMut;
use shared::packets::{Handshake, LoginClientbound, LoginStart, NextState};
use shared::{ProtocolVersion, Result};
use tokio::io::{AsyncRead, AsyncWrite};

/// What a client asked for when it connected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub handshake: Handshake,
    pub username: String,
}

impl LoginRequest {
    pub fn version(&self) -> ProtocolVersion {
        self.handshake.protocol_version
    }
}

/// Reads the handshake and, for a login intent, the login start packet.
///
/// Returns `None` for status pings, which the gate does not serve.
pub async fn read_login<S>(transport: &mut Transport<S>) -> Result<Option<LoginRequest>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handshake = Handshake::decode(transport.read_payload().await?)?;
    if handshake.next_state != NextState::Login {
        return Ok(None);
    }

    let start = LoginStart::decode(transport.read_payload().await?)?;
    Ok(Some(LoginRequest {
        handshake,
        username: start.username,
    }))
}

/// Finishes the login phase, switching on compression first if enabled.
pub async fn accept_login<S>(
    transport: &mut Transport<S>,
    username: &str,
    compression_threshold: Option<usize>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut payload = BytesMut::new();

    if let Some(threshold) = compression_threshold {
        LoginClientbound::SetCompression {
            threshold: threshold as i32,
        }
        .encode(&mut payload);
        transport.queue(&payload)?;
        // Everything after SetCompression uses the compressed format
        transport.codec_mut().enable_compression(threshold);
        payload.clear();
    }

    LoginClientbound::LoginSuccess {
        uuid: random_uuid(),
        username: username.to_string(),
    }
    .encode(&mut payload);
    transport.queue(&payload)?;
    transport.flush().await?;
    Ok(())
}

/// Refuses the login with a message shown on the client's screen.
pub async fn reject_login<S>(transport: &mut Transport<S>, message: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut payload = BytesMut::new();
    LoginClientbound::disconnect(message).encode(&mut payload);
    transport.queue(&payload)?;
    transport.flush().await?;
    Ok(())
}

/// Hyphenated version 4 UUID
fn random_uuid() -> String {
    let bits = rand::random::<u128>();
    let bits = (bits & !(0xF << 76)) | (0x4 << 76);
    let bits = (bits & !(0x3 << 62)) | (0x2 << 62);
    let hex = format!("{:032x}", bits);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
