//! Scripted client for exercising a running gate by hand.
//!
//! `genuine` behaves like a vanilla client, `bot` chats before it has
//! answered anything, `silent` logs in and never speaks again.

use bytes::BytesMut;
use clap::{Parser, ValueEnum};
use log::{info, warn};
use server::Transport;
use shared::packets::{
    brand_message, ClientSettings, Clientbound, Handshake, LoginClientbound, LoginStart, NextState,
    Serverbound,
};
use shared::ProtocolVersion;
use tokio::net::TcpStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Genuine,
    Bot,
    Silent,
}

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Gate address
    #[clap(short, long, default_value = "127.0.0.1:25565")]
    server: String,
    /// Protocol version number to announce
    #[clap(long, default_value = "340")]
    protocol: i32,
    #[clap(short, long, default_value = "Steve")]
    username: String,
    #[clap(short, long, value_enum, default_value = "genuine")]
    mode: Mode,
}

fn send(
    transport: &mut Transport<TcpStream>,
    version: ProtocolVersion,
    packet: &Serverbound,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut payload = BytesMut::new();
    packet.encode(version, &mut payload)?;
    transport.queue(&payload)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let version = ProtocolVersion(args.protocol);

    let stream = TcpStream::connect(&args.server).await?;
    info!("Connected to {} as {} ({:?})", args.server, args.username, args.mode);
    let mut transport = Transport::new(stream);

    let mut payload = BytesMut::new();
    Handshake {
        protocol_version: version,
        server_address: "localhost".to_string(),
        server_port: 25565,
        next_state: NextState::Login,
    }
    .encode(&mut payload);
    transport.queue(&payload)?;
    payload.clear();
    LoginStart {
        username: args.username.clone(),
    }
    .encode(&mut payload);
    transport.queue(&payload)?;
    transport.flush().await?;

    // Login phase
    loop {
        match LoginClientbound::decode(transport.read_payload().await?)? {
            LoginClientbound::SetCompression { threshold } => {
                info!("Compression threshold {}", threshold);
                if let Ok(threshold) = usize::try_from(threshold) {
                    transport.codec_mut().enable_compression(threshold);
                }
            }
            LoginClientbound::LoginSuccess { uuid, username } => {
                info!("Logged in as {} ({})", username, uuid);
                break;
            }
            LoginClientbound::Disconnect { reason } => {
                info!("Refused: {}", reason);
                return Ok(());
            }
        }
    }

    // Play phase
    loop {
        let payload = match transport.read_payload().await {
            Ok(payload) => payload,
            Err(e) => {
                info!("Connection closed: {}", e);
                return Ok(());
            }
        };
        let packet = match Clientbound::decode(version, payload) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
        };
        info!("Received {}", packet.name());

        match (args.mode, packet) {
            (_, Clientbound::Disconnect { reason }) => {
                info!("Disconnected: {}", reason);
                return Ok(());
            }
            (Mode::Genuine, Clientbound::JoinGame(_)) => {
                send(&mut transport, version, &Serverbound::ClientSettings(ClientSettings::default()))?;
                send(&mut transport, version, &brand_message(version, "vanilla"))?;
            }
            (Mode::Genuine, Clientbound::KeepAlive { id }) => {
                send(&mut transport, version, &Serverbound::KeepAlive { id })?;
            }
            (
                Mode::Genuine,
                Clientbound::PlayerPositionAndLook {
                    x,
                    y,
                    z,
                    yaw,
                    pitch,
                    teleport_id,
                },
            ) => {
                if version.has_teleport_id() {
                    send(&mut transport, version, &Serverbound::TeleportConfirm { teleport_id })?;
                }
                send(
                    &mut transport,
                    version,
                    &Serverbound::PlayerPositionRotation {
                        x,
                        y,
                        z,
                        yaw,
                        pitch,
                        on_ground: true,
                    },
                )?;
            }
            (Mode::Bot, Clientbound::JoinGame(_)) => {
                send(
                    &mut transport,
                    version,
                    &Serverbound::ChatMessage {
                        message: "/register hunter2 hunter2".to_string(),
                    },
                )?;
            }
            _ => {}
        }
        transport.flush().await?;
    }
}
