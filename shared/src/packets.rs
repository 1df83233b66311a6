//! The minimal packet surface of the verification exchange
//!
//! A packet payload is `[packet id VarInt][fields]`, carried inside one
//! frame. Decoders are strict: truncated fields, trailing bytes and
//! out-of-range enum values are all `CorruptedFrame`, since a genuine
//! client never produces them.

use crate::error::{ProtocolError, Result};
use crate::varint::{read_var_int, write_var_int};
use crate::version::ProtocolVersion;
use bytes::{Buf, BufMut, Bytes, BytesMut};

const MAX_USERNAME_CHARS: usize = 16;
const MAX_ADDRESS_CHARS: usize = 255;
const MAX_LOCALE_CHARS: usize = 16;
const MAX_CHANNEL_CHARS: usize = 32_767;
const MAX_CHAT_CHARS: usize = 256;
const MAX_REASON_CHARS: usize = 262_144;

fn need(buf: &Bytes, len: usize, what: &str) -> Result<()> {
    if buf.remaining() < len {
        return Err(ProtocolError::corrupted(format!("truncated {}", what)));
    }
    Ok(())
}

fn read_u8(buf: &mut Bytes, what: &str) -> Result<u8> {
    need(buf, 1, what)?;
    Ok(buf.get_u8())
}

fn read_bool(buf: &mut Bytes, what: &str) -> Result<bool> {
    match read_u8(buf, what)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ProtocolError::corrupted(format!("{} is not a bool: {}", what, other))),
    }
}

fn read_u16(buf: &mut Bytes, what: &str) -> Result<u16> {
    need(buf, 2, what)?;
    Ok(buf.get_u16())
}

fn read_i32(buf: &mut Bytes, what: &str) -> Result<i32> {
    need(buf, 4, what)?;
    Ok(buf.get_i32())
}

fn read_i64(buf: &mut Bytes, what: &str) -> Result<i64> {
    need(buf, 8, what)?;
    Ok(buf.get_i64())
}

fn read_f32(buf: &mut Bytes, what: &str) -> Result<f32> {
    need(buf, 4, what)?;
    Ok(buf.get_f32())
}

fn read_f64(buf: &mut Bytes, what: &str) -> Result<f64> {
    need(buf, 8, what)?;
    Ok(buf.get_f64())
}

fn expect_end(buf: &Bytes, what: &str) -> Result<()> {
    if buf.has_remaining() {
        return Err(ProtocolError::corrupted(format!(
            "{} has {} trailing bytes",
            what,
            buf.remaining()
        )));
    }
    Ok(())
}

/// Reads a VarInt-prefixed UTF-8 string of at most `max_chars` characters.
pub fn read_string(buf: &mut Bytes, max_chars: usize) -> Result<String> {
    let len = read_var_int(buf)? as usize;
    if len > max_chars.saturating_mul(4) {
        return Err(ProtocolError::corrupted(format!(
            "string of {} bytes exceeds {} chars",
            len, max_chars
        )));
    }
    need(buf, len, "string")?;

    let raw = buf.split_to(len);
    let text = std::str::from_utf8(&raw)
        .map_err(|_| ProtocolError::corrupted("string is not UTF-8"))?;
    if text.chars().count() > max_chars {
        return Err(ProtocolError::corrupted(format!(
            "string exceeds {} chars",
            max_chars
        )));
    }
    Ok(text.to_owned())
}

pub fn write_string(out: &mut BytesMut, text: &str) {
    write_var_int(out, text.len() as u32);
    out.extend_from_slice(text.as_bytes());
}

/// Splits a packet payload into its id and fields.
pub fn split_id(mut payload: Bytes) -> Result<(u32, Bytes)> {
    let id = read_var_int(&mut payload)?;
    Ok((id, payload))
}

/// Wraps plain text in a JSON chat component.
pub fn text_component(text: &str) -> String {
    let mut json = String::with_capacity(text.len() + 12);
    json.push_str("{\"text\":\"");
    for c in text.chars() {
        match c {
            '"' => json.push_str("\\\""),
            '\\' => json.push_str("\\\\"),
            '\n' => json.push_str("\\n"),
            c if c.is_control() => json.push_str(&format!("\\u{:04x}", c as u32)),
            c => json.push(c),
        }
    }
    json.push_str("\"}");
    json
}

fn unsupported(version: ProtocolVersion) -> ProtocolError {
    ProtocolError::corrupted(format!("unsupported protocol version {}", version.0))
}

fn encode_position(version: ProtocolVersion, x: i32, y: i32, z: i32) -> i64 {
    let x = i64::from(x) & 0x3FF_FFFF;
    let y = i64::from(y) & 0xFFF;
    let z = i64::from(z) & 0x3FF_FFFF;
    if version >= ProtocolVersion::V1_14 {
        x << 38 | z << 12 | y
    } else {
        x << 38 | y << 26 | z
    }
}

fn decode_position(version: ProtocolVersion, packed: i64) -> (i32, i32, i32) {
    let x = packed >> 38;
    let (y, z) = if version >= ProtocolVersion::V1_14 {
        (packed << 52 >> 52, packed << 26 >> 38)
    } else {
        (packed << 26 >> 52, packed << 38 >> 38)
    };
    (x as i32, y as i32, z as i32)
}

fn write_keep_alive_id(version: ProtocolVersion, out: &mut BytesMut, id: i64) {
    if version.keep_alive_is_long() {
        out.put_i64(id);
    } else {
        write_var_int(out, id as i32 as u32);
    }
}

fn read_keep_alive_id(version: ProtocolVersion, buf: &mut Bytes) -> Result<i64> {
    if version.keep_alive_is_long() {
        read_i64(buf, "keep alive id")
    } else {
        Ok(i64::from(read_var_int(buf)? as i32))
    }
}

/// Requested state after the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    Status,
    Login,
}

/// First packet of every connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub protocol_version: ProtocolVersion,
    pub server_address: String,
    pub server_port: u16,
    pub next_state: NextState,
}

impl Handshake {
    pub const ID: u32 = 0x00;

    pub fn decode(payload: Bytes) -> Result<Self> {
        let (id, mut buf) = split_id(payload)?;
        if id != Self::ID {
            return Err(ProtocolError::corrupted(format!("expected handshake, got {:#04x}", id)));
        }

        let protocol_version = ProtocolVersion(read_var_int(&mut buf)? as i32);
        let server_address = read_string(&mut buf, MAX_ADDRESS_CHARS)?;
        let server_port = read_u16(&mut buf, "server port")?;
        let next_state = match read_var_int(&mut buf)? {
            1 => NextState::Status,
            2 => NextState::Login,
            other => {
                return Err(ProtocolError::corrupted(format!("invalid next state {}", other)))
            }
        };
        expect_end(&buf, "handshake")?;

        Ok(Self {
            protocol_version,
            server_address,
            server_port,
            next_state,
        })
    }

    pub fn encode(&self, out: &mut BytesMut) {
        write_var_int(out, Self::ID);
        write_var_int(out, self.protocol_version.0 as u32);
        write_string(out, &self.server_address);
        out.put_u16(self.server_port);
        write_var_int(
            out,
            match self.next_state {
                NextState::Status => 1,
                NextState::Login => 2,
            },
        );
    }
}

/// Client's login request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginStart {
    pub username: String,
}

impl LoginStart {
    pub const ID: u32 = 0x00;

    pub fn decode(payload: Bytes) -> Result<Self> {
        let (id, mut buf) = split_id(payload)?;
        if id != Self::ID {
            return Err(ProtocolError::corrupted(format!("expected login start, got {:#04x}", id)));
        }
        let username = read_string(&mut buf, MAX_USERNAME_CHARS)?;
        expect_end(&buf, "login start")?;
        Ok(Self { username })
    }

    pub fn encode(&self, out: &mut BytesMut) {
        write_var_int(out, Self::ID);
        write_string(out, &self.username);
    }
}

/// Server packets of the login phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginClientbound {
    Disconnect { reason: String },
    LoginSuccess { uuid: String, username: String },
    SetCompression { threshold: i32 },
}

impl LoginClientbound {
    pub const DISCONNECT_ID: u32 = 0x00;
    pub const LOGIN_SUCCESS_ID: u32 = 0x02;
    pub const SET_COMPRESSION_ID: u32 = 0x03;

    pub fn disconnect(text: &str) -> Self {
        LoginClientbound::Disconnect {
            reason: text_component(text),
        }
    }

    pub fn encode(&self, out: &mut BytesMut) {
        match self {
            LoginClientbound::Disconnect { reason } => {
                write_var_int(out, Self::DISCONNECT_ID);
                write_string(out, reason);
            }
            LoginClientbound::LoginSuccess { uuid, username } => {
                write_var_int(out, Self::LOGIN_SUCCESS_ID);
                write_string(out, uuid);
                write_string(out, username);
            }
            LoginClientbound::SetCompression { threshold } => {
                write_var_int(out, Self::SET_COMPRESSION_ID);
                write_var_int(out, *threshold as u32);
            }
        }
    }

    pub fn decode(payload: Bytes) -> Result<Self> {
        let (id, mut buf) = split_id(payload)?;
        let packet = match id {
            Self::DISCONNECT_ID => LoginClientbound::Disconnect {
                reason: read_string(&mut buf, MAX_REASON_CHARS)?,
            },
            Self::LOGIN_SUCCESS_ID => LoginClientbound::LoginSuccess {
                uuid: read_string(&mut buf, 36)?,
                username: read_string(&mut buf, MAX_USERNAME_CHARS)?,
            },
            Self::SET_COMPRESSION_ID => LoginClientbound::SetCompression {
                threshold: read_var_int(&mut buf)? as i32,
            },
            other => {
                return Err(ProtocolError::corrupted(format!(
                    "unknown login packet {:#04x}",
                    other
                )))
            }
        };
        expect_end(&buf, "login packet")?;
        Ok(packet)
    }
}

/// The world the client is dropped into during verification
#[derive(Debug, Clone, PartialEq)]
pub struct JoinGame {
    pub entity_id: i32,
    pub gamemode: u8,
    pub dimension: i32,
    pub hashed_seed: i64,
    pub difficulty: u8,
    pub max_players: u8,
    pub level_type: String,
    pub view_distance: u32,
    pub reduced_debug_info: bool,
    pub enable_respawn_screen: bool,
}

impl JoinGame {
    /// A flat adventure-mode overworld with a minimal view distance
    pub fn verification_world(entity_id: i32) -> Self {
        Self {
            entity_id,
            gamemode: 2,
            dimension: 0,
            hashed_seed: 0,
            difficulty: 0,
            max_players: 1,
            level_type: "flat".to_string(),
            view_distance: 2,
            reduced_debug_info: true,
            enable_respawn_screen: true,
        }
    }

    fn encode_fields(&self, version: ProtocolVersion, out: &mut BytesMut) {
        out.put_i32(self.entity_id);
        out.put_u8(self.gamemode);
        if version >= ProtocolVersion::V1_9_1 {
            out.put_i32(self.dimension);
        } else {
            out.put_i8(self.dimension as i8);
        }
        if version >= ProtocolVersion::V1_15 {
            out.put_i64(self.hashed_seed);
        }
        if version < ProtocolVersion::V1_14 {
            out.put_u8(self.difficulty);
        }
        out.put_u8(self.max_players);
        write_string(out, &self.level_type);
        if version >= ProtocolVersion::V1_14 {
            write_var_int(out, self.view_distance);
        }
        out.put_u8(u8::from(self.reduced_debug_info));
        if version >= ProtocolVersion::V1_15 {
            out.put_u8(u8::from(self.enable_respawn_screen));
        }
    }

    fn decode_fields(version: ProtocolVersion, buf: &mut Bytes) -> Result<Self> {
        let entity_id = read_i32(buf, "entity id")?;
        let gamemode = read_u8(buf, "gamemode")?;
        let dimension = if version >= ProtocolVersion::V1_9_1 {
            read_i32(buf, "dimension")?
        } else {
            i32::from(read_u8(buf, "dimension")? as i8)
        };
        let hashed_seed = if version >= ProtocolVersion::V1_15 {
            read_i64(buf, "hashed seed")?
        } else {
            0
        };
        let difficulty = if version < ProtocolVersion::V1_14 {
            read_u8(buf, "difficulty")?
        } else {
            0
        };
        let max_players = read_u8(buf, "max players")?;
        let level_type = read_string(buf, 16)?;
        let view_distance = if version >= ProtocolVersion::V1_14 {
            read_var_int(buf)?
        } else {
            0
        };
        let reduced_debug_info = read_bool(buf, "reduced debug info")?;
        let enable_respawn_screen = if version >= ProtocolVersion::V1_15 {
            read_bool(buf, "respawn screen")?
        } else {
            true
        };

        Ok(Self {
            entity_id,
            gamemode,
            dimension,
            hashed_seed,
            difficulty,
            max_players,
            level_type,
            view_distance,
            reduced_debug_info,
            enable_respawn_screen,
        })
    }
}

/// Server packets of the play phase used by the verification exchange
#[derive(Debug, Clone, PartialEq)]
pub enum Clientbound {
    JoinGame(JoinGame),
    SpawnPosition {
        x: i32,
        y: i32,
        z: i32,
    },
    PlayerPositionAndLook {
        x: f64,
        y: f64,
        z: f64,
        yaw: f32,
        pitch: f32,
        teleport_id: u32,
    },
    KeepAlive {
        id: i64,
    },
    Disconnect {
        reason: String,
    },
}

impl Clientbound {
    pub fn disconnect(text: &str) -> Self {
        Clientbound::Disconnect {
            reason: text_component(text),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Clientbound::JoinGame(_) => "JoinGame",
            Clientbound::SpawnPosition { .. } => "SpawnPosition",
            Clientbound::PlayerPositionAndLook { .. } => "PlayerPositionAndLook",
            Clientbound::KeepAlive { .. } => "KeepAlive",
            Clientbound::Disconnect { .. } => "Disconnect",
        }
    }

    pub fn encode(&self, version: ProtocolVersion, out: &mut BytesMut) -> Result<()> {
        let ids = version.ids().ok_or_else(|| unsupported(version))?.clientbound;

        match self {
            Clientbound::JoinGame(join) => {
                write_var_int(out, ids.join_game);
                join.encode_fields(version, out);
            }
            Clientbound::SpawnPosition { x, y, z } => {
                write_var_int(out, ids.spawn_position);
                out.put_i64(encode_position(version, *x, *y, *z));
            }
            Clientbound::PlayerPositionAndLook {
                x,
                y,
                z,
                yaw,
                pitch,
                teleport_id,
            } => {
                write_var_int(out, ids.player_position_look);
                out.put_f64(*x);
                out.put_f64(*y);
                out.put_f64(*z);
                out.put_f32(*yaw);
                out.put_f32(*pitch);
                // Absolute coordinates
                out.put_u8(0);
                if version.has_teleport_id() {
                    write_var_int(out, *teleport_id);
                }
            }
            Clientbound::KeepAlive { id } => {
                write_var_int(out, ids.keep_alive);
                write_keep_alive_id(version, out, *id);
            }
            Clientbound::Disconnect { reason } => {
                write_var_int(out, ids.disconnect);
                write_string(out, reason);
            }
        }
        Ok(())
    }

    pub fn decode(version: ProtocolVersion, payload: Bytes) -> Result<Self> {
        let ids = version.ids().ok_or_else(|| unsupported(version))?.clientbound;
        let (id, mut buf) = split_id(payload)?;

        let packet = if id == ids.join_game {
            Clientbound::JoinGame(JoinGame::decode_fields(version, &mut buf)?)
        } else if id == ids.spawn_position {
            let (x, y, z) = decode_position(version, read_i64(&mut buf, "position")?);
            Clientbound::SpawnPosition { x, y, z }
        } else if id == ids.player_position_look {
            let x = read_f64(&mut buf, "x")?;
            let y = read_f64(&mut buf, "y")?;
            let z = read_f64(&mut buf, "z")?;
            let yaw = read_f32(&mut buf, "yaw")?;
            let pitch = read_f32(&mut buf, "pitch")?;
            let _flags = read_u8(&mut buf, "flags")?;
            let teleport_id = if version.has_teleport_id() {
                read_var_int(&mut buf)?
            } else {
                0
            };
            Clientbound::PlayerPositionAndLook {
                x,
                y,
                z,
                yaw,
                pitch,
                teleport_id,
            }
        } else if id == ids.keep_alive {
            Clientbound::KeepAlive {
                id: read_keep_alive_id(version, &mut buf)?,
            }
        } else if id == ids.disconnect {
            Clientbound::Disconnect {
                reason: read_string(&mut buf, MAX_REASON_CHARS)?,
            }
        } else {
            return Err(ProtocolError::corrupted(format!(
                "unknown clientbound packet {:#04x}",
                id
            )));
        };

        expect_end(&buf, packet.name())?;
        Ok(packet)
    }
}

/// Client options sent once the world is loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub locale: String,
    pub view_distance: i8,
    pub chat_mode: u32,
    pub chat_colors: bool,
    pub skin_parts: u8,
    pub main_hand: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            locale: "en_us".to_string(),
            view_distance: 8,
            chat_mode: 0,
            chat_colors: true,
            skin_parts: 0x7F,
            main_hand: 1,
        }
    }
}

impl ClientSettings {
    fn encode_fields(&self, version: ProtocolVersion, out: &mut BytesMut) {
        write_string(out, &self.locale);
        out.put_i8(self.view_distance);
        if version >= ProtocolVersion::V1_9 {
            write_var_int(out, self.chat_mode);
        } else {
            out.put_u8(self.chat_mode as u8);
        }
        out.put_u8(u8::from(self.chat_colors));
        out.put_u8(self.skin_parts);
        if version >= ProtocolVersion::V1_9 {
            write_var_int(out, self.main_hand);
        }
    }

    fn decode_fields(version: ProtocolVersion, buf: &mut Bytes) -> Result<Self> {
        let locale = read_string(buf, MAX_LOCALE_CHARS)?;
        let view_distance = read_u8(buf, "view distance")? as i8;
        let chat_mode = if version >= ProtocolVersion::V1_9 {
            read_var_int(buf)?
        } else {
            u32::from(read_u8(buf, "chat mode")?)
        };
        let chat_colors = read_bool(buf, "chat colors")?;
        let skin_parts = read_u8(buf, "skin parts")?;
        let main_hand = if version >= ProtocolVersion::V1_9 {
            read_var_int(buf)?
        } else {
            1
        };

        if chat_mode > 2 {
            return Err(ProtocolError::corrupted(format!("invalid chat mode {}", chat_mode)));
        }
        if main_hand > 1 {
            return Err(ProtocolError::corrupted(format!("invalid main hand {}", main_hand)));
        }

        Ok(Self {
            locale,
            view_distance,
            chat_mode,
            chat_colors,
            skin_parts,
            main_hand,
        })
    }
}

/// Client packets of the play phase
#[derive(Debug, Clone, PartialEq)]
pub enum Serverbound {
    TeleportConfirm {
        teleport_id: u32,
    },
    ChatMessage {
        message: String,
    },
    ClientSettings(ClientSettings),
    PluginMessage {
        channel: String,
        data: Bytes,
    },
    KeepAlive {
        id: i64,
    },
    PlayerOnGround {
        on_ground: bool,
    },
    PlayerPosition {
        x: f64,
        y: f64,
        z: f64,
        on_ground: bool,
    },
    PlayerPositionRotation {
        x: f64,
        y: f64,
        z: f64,
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    PlayerRotation {
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    ResourcePackStatus {
        result: u32,
    },
    /// Any packet id outside the mapped surface
    Other {
        id: u32,
    },
}

impl Serverbound {
    pub fn name(&self) -> &'static str {
        match self {
            Serverbound::TeleportConfirm { .. } => "TeleportConfirm",
            Serverbound::ChatMessage { .. } => "ChatMessage",
            Serverbound::ClientSettings(_) => "ClientSettings",
            Serverbound::PluginMessage { .. } => "PluginMessage",
            Serverbound::KeepAlive { .. } => "KeepAlive",
            Serverbound::PlayerOnGround { .. } => "PlayerOnGround",
            Serverbound::PlayerPosition { .. } => "PlayerPosition",
            Serverbound::PlayerPositionRotation { .. } => "PlayerPositionRotation",
            Serverbound::PlayerRotation { .. } => "PlayerRotation",
            Serverbound::ResourcePackStatus { .. } => "ResourcePackStatus",
            Serverbound::Other { .. } => "Other",
        }
    }

    pub fn decode(version: ProtocolVersion, payload: Bytes) -> Result<Self> {
        let ids = version.ids().ok_or_else(|| unsupported(version))?.serverbound;
        let (id, mut buf) = split_id(payload)?;
        let buf = &mut buf;

        let packet = if Some(id) == ids.teleport_confirm {
            Serverbound::TeleportConfirm {
                teleport_id: read_var_int(buf)?,
            }
        } else if id == ids.chat_message {
            Serverbound::ChatMessage {
                message: read_string(buf, MAX_CHAT_CHARS)?,
            }
        } else if id == ids.client_settings {
            Serverbound::ClientSettings(ClientSettings::decode_fields(version, buf)?)
        } else if id == ids.plugin_message {
            let channel = read_string(buf, MAX_CHANNEL_CHARS)?;
            let data = buf.split_to(buf.len());
            Serverbound::PluginMessage { channel, data }
        } else if id == ids.keep_alive {
            Serverbound::KeepAlive {
                id: read_keep_alive_id(version, buf)?,
            }
        } else if id == ids.player_on_ground {
            Serverbound::PlayerOnGround {
                on_ground: read_bool(buf, "on ground")?,
            }
        } else if id == ids.player_position {
            Serverbound::PlayerPosition {
                x: read_f64(buf, "x")?,
                y: read_f64(buf, "y")?,
                z: read_f64(buf, "z")?,
                on_ground: read_bool(buf, "on ground")?,
            }
        } else if id == ids.player_position_rotation {
            Serverbound::PlayerPositionRotation {
                x: read_f64(buf, "x")?,
                y: read_f64(buf, "y")?,
                z: read_f64(buf, "z")?,
                yaw: read_f32(buf, "yaw")?,
                pitch: read_f32(buf, "pitch")?,
                on_ground: read_bool(buf, "on ground")?,
            }
        } else if id == ids.player_rotation {
            Serverbound::PlayerRotation {
                yaw: read_f32(buf, "yaw")?,
                pitch: read_f32(buf, "pitch")?,
                on_ground: read_bool(buf, "on ground")?,
            }
        } else if id == ids.resource_pack_status {
            if version < ProtocolVersion::V1_9 {
                // 1.8 echoes the pack hash first
                read_string(buf, 40)?;
            }
            Serverbound::ResourcePackStatus {
                result: read_var_int(buf)?,
            }
        } else {
            return Ok(Serverbound::Other { id });
        };

        expect_end(buf, packet.name())?;
        Ok(packet)
    }

    pub fn encode(&self, version: ProtocolVersion, out: &mut BytesMut) -> Result<()> {
        let ids = version.ids().ok_or_else(|| unsupported(version))?.serverbound;

        match self {
            Serverbound::TeleportConfirm { teleport_id } => {
                let id = ids.teleport_confirm.ok_or_else(|| {
                    ProtocolError::corrupted("teleport confirm does not exist before 1.9")
                })?;
                write_var_int(out, id);
                write_var_int(out, *teleport_id);
            }
            Serverbound::ChatMessage { message } => {
                write_var_int(out, ids.chat_message);
                write_string(out, message);
            }
            Serverbound::ClientSettings(settings) => {
                write_var_int(out, ids.client_settings);
                settings.encode_fields(version, out);
            }
            Serverbound::PluginMessage { channel, data } => {
                write_var_int(out, ids.plugin_message);
                write_string(out, channel);
                out.extend_from_slice(data);
            }
            Serverbound::KeepAlive { id } => {
                write_var_int(out, ids.keep_alive);
                write_keep_alive_id(version, out, *id);
            }
            Serverbound::PlayerOnGround { on_ground } => {
                write_var_int(out, ids.player_on_ground);
                out.put_u8(u8::from(*on_ground));
            }
            Serverbound::PlayerPosition { x, y, z, on_ground } => {
                write_var_int(out, ids.player_position);
                out.put_f64(*x);
                out.put_f64(*y);
                out.put_f64(*z);
                out.put_u8(u8::from(*on_ground));
            }
            Serverbound::PlayerPositionRotation {
                x,
                y,
                z,
                yaw,
                pitch,
                on_ground,
            } => {
                write_var_int(out, ids.player_position_rotation);
                out.put_f64(*x);
                out.put_f64(*y);
                out.put_f64(*z);
                out.put_f32(*yaw);
                out.put_f32(*pitch);
                out.put_u8(u8::from(*on_ground));
            }
            Serverbound::PlayerRotation {
                yaw,
                pitch,
                on_ground,
            } => {
                write_var_int(out, ids.player_rotation);
                out.put_f32(*yaw);
                out.put_f32(*pitch);
                out.put_u8(u8::from(*on_ground));
            }
            Serverbound::ResourcePackStatus { result } => {
                write_var_int(out, ids.resource_pack_status);
                if version < ProtocolVersion::V1_9 {
                    write_string(out, "");
                }
                write_var_int(out, *result);
            }
            Serverbound::Other { id } => {
                write_var_int(out, *id);
            }
        }
        Ok(())
    }
}

/// Builds the brand plugin message a vanilla client sends.
pub fn brand_message(version: ProtocolVersion, brand: &str) -> Serverbound {
    let mut data = BytesMut::new();
    write_string(&mut data, brand);
    Serverbound::PluginMessage {
        channel: version.brand_channel().to_string(),
        data: data.freeze(),
    }
}
