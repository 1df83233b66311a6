//! Protocol versions and their packet id tables
//!
//! Only the packets the verification exchange touches are mapped. Ids
//! move between releases, so every version range carries its own table.

use std::fmt;

/// Serverbound play packet ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerboundIds {
    pub teleport_confirm: Option<u32>,
    pub chat_message: u32,
    pub client_settings: u32,
    pub plugin_message: u32,
    pub keep_alive: u32,
    pub player_on_ground: u32,
    pub player_position: u32,
    pub player_position_rotation: u32,
    pub player_rotation: u32,
    pub resource_pack_status: u32,
}

/// Clientbound play packet ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientboundIds {
    pub keep_alive: u32,
    pub join_game: u32,
    pub spawn_position: u32,
    pub player_position_look: u32,
    pub disconnect: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketIds {
    pub serverbound: ServerboundIds,
    pub clientbound: ClientboundIds,
}

/// Release protocol numbers sharing one packet id table
struct VersionRange {
    protocols: &'static [i32],
    name: &'static str,
    ids: PacketIds,
}

const V1_8_IDS: PacketIds = PacketIds {
    serverbound: ServerboundIds {
        teleport_confirm: None,
        chat_message: 0x01,
        client_settings: 0x15,
        plugin_message: 0x17,
        keep_alive: 0x00,
        player_on_ground: 0x03,
        player_position: 0x04,
        player_position_rotation: 0x06,
        player_rotation: 0x05,
        resource_pack_status: 0x19,
    },
    clientbound: ClientboundIds {
        keep_alive: 0x00,
        join_game: 0x01,
        spawn_position: 0x05,
        player_position_look: 0x08,
        disconnect: 0x40,
    },
};

const V1_9_IDS: PacketIds = PacketIds {
    serverbound: ServerboundIds {
        teleport_confirm: Some(0x00),
        chat_message: 0x02,
        client_settings: 0x04,
        plugin_message: 0x09,
        keep_alive: 0x0B,
        player_on_ground: 0x0F,
        player_position: 0x0C,
        player_position_rotation: 0x0D,
        player_rotation: 0x0E,
        resource_pack_status: 0x16,
    },
    clientbound: ClientboundIds {
        keep_alive: 0x1F,
        join_game: 0x23,
        spawn_position: 0x43,
        player_position_look: 0x2E,
        disconnect: 0x1A,
    },
};

const V1_12_IDS: PacketIds = PacketIds {
    serverbound: ServerboundIds {
        teleport_confirm: Some(0x00),
        chat_message: 0x03,
        client_settings: 0x05,
        plugin_message: 0x0A,
        keep_alive: 0x0C,
        player_on_ground: 0x0D,
        player_position: 0x0E,
        player_position_rotation: 0x0F,
        player_rotation: 0x10,
        resource_pack_status: 0x18,
    },
    clientbound: ClientboundIds {
        keep_alive: 0x1F,
        join_game: 0x23,
        spawn_position: 0x45,
        player_position_look: 0x2E,
        disconnect: 0x1A,
    },
};

const V1_12_1_IDS: PacketIds = PacketIds {
    serverbound: ServerboundIds {
        teleport_confirm: Some(0x00),
        chat_message: 0x02,
        client_settings: 0x04,
        plugin_message: 0x09,
        keep_alive: 0x0B,
        player_on_ground: 0x0C,
        player_position: 0x0D,
        player_position_rotation: 0x0E,
        player_rotation: 0x0F,
        resource_pack_status: 0x18,
    },
    clientbound: ClientboundIds {
        keep_alive: 0x1F,
        join_game: 0x23,
        spawn_position: 0x46,
        player_position_look: 0x2F,
        disconnect: 0x1A,
    },
};

const V1_13_IDS: PacketIds = PacketIds {
    serverbound: ServerboundIds {
        teleport_confirm: Some(0x00),
        chat_message: 0x02,
        client_settings: 0x04,
        plugin_message: 0x0A,
        keep_alive: 0x0E,
        player_on_ground: 0x0F,
        player_position: 0x10,
        player_position_rotation: 0x11,
        player_rotation: 0x12,
        resource_pack_status: 0x1D,
    },
    clientbound: ClientboundIds {
        keep_alive: 0x21,
        join_game: 0x25,
        spawn_position: 0x49,
        player_position_look: 0x32,
        disconnect: 0x1B,
    },
};

const V1_14_SERVERBOUND: ServerboundIds = ServerboundIds {
    teleport_confirm: Some(0x00),
    chat_message: 0x03,
    client_settings: 0x05,
    plugin_message: 0x0B,
    keep_alive: 0x0F,
    player_on_ground: 0x14,
    player_position: 0x11,
    player_position_rotation: 0x12,
    player_rotation: 0x13,
    resource_pack_status: 0x1F,
};

const V1_14_IDS: PacketIds = PacketIds {
    serverbound: V1_14_SERVERBOUND,
    clientbound: ClientboundIds {
        keep_alive: 0x20,
        join_game: 0x25,
        spawn_position: 0x4D,
        player_position_look: 0x35,
        disconnect: 0x1A,
    },
};

const V1_15_IDS: PacketIds = PacketIds {
    serverbound: V1_14_SERVERBOUND,
    clientbound: ClientboundIds {
        keep_alive: 0x21,
        join_game: 0x26,
        spawn_position: 0x4E,
        player_position_look: 0x36,
        disconnect: 0x1B,
    },
};

const RANGES: &[VersionRange] = &[
    VersionRange { protocols: &[47], name: "1.8.x", ids: V1_8_IDS },
    VersionRange {
        protocols: &[107, 108, 109, 110, 210, 315, 316],
        name: "1.9-1.11.2",
        ids: V1_9_IDS,
    },
    VersionRange { protocols: &[335], name: "1.12", ids: V1_12_IDS },
    VersionRange { protocols: &[338, 340], name: "1.12.1-1.12.2", ids: V1_12_1_IDS },
    VersionRange { protocols: &[393, 401, 404], name: "1.13.x", ids: V1_13_IDS },
    VersionRange {
        protocols: &[477, 480, 485, 490, 498],
        name: "1.14.x",
        ids: V1_14_IDS,
    },
    VersionRange { protocols: &[573, 575, 578], name: "1.15.x", ids: V1_15_IDS },
];

/// A client's protocol version number as sent in the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion(pub i32);

impl ProtocolVersion {
    pub const V1_8: Self = Self(47);
    pub const V1_9: Self = Self(107);
    pub const V1_9_1: Self = Self(108);
    pub const V1_12: Self = Self(335);
    pub const V1_12_1: Self = Self(338);
    pub const V1_12_2: Self = Self(340);
    pub const V1_13: Self = Self(393);
    pub const V1_14: Self = Self(477);
    pub const V1_15: Self = Self(573);
    pub const V1_15_2: Self = Self(578);

    pub const MINIMUM: Self = Self::V1_8;
    pub const MAXIMUM: Self = Self::V1_15_2;

    fn range(self) -> Option<&'static VersionRange> {
        RANGES
            .iter()
            .find(|range| range.protocols.contains(&self.0))
    }

    pub fn is_supported(self) -> bool {
        self.range().is_some()
    }

    /// Packet ids for this version, `None` if unsupported
    pub fn ids(self) -> Option<&'static PacketIds> {
        self.range().map(|range| &range.ids)
    }

    pub fn name(self) -> &'static str {
        self.range().map_or("unsupported", |range| range.name)
    }

    /// KeepAlive ids became longs in 1.12.2
    pub fn keep_alive_is_long(self) -> bool {
        self >= Self::V1_12_2
    }

    /// Position look packets carry a teleport id since 1.9
    pub fn has_teleport_id(self) -> bool {
        self >= Self::V1_9
    }

    /// Channel the client announces its brand on
    pub fn brand_channel(self) -> &'static str {
        if self >= Self::V1_13 {
            "minecraft:brand"
        } else {
            "MC|Brand"
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}
