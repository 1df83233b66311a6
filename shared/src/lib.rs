//! Wire protocol shared by the verification server and the test client
//!
//! Covers the VarInt codec, length-prefixed framing, threshold-gated
//! compression and the small set of packets a verification session sends
//! and expects.

pub mod codec;
pub mod compression;
pub mod error;
pub mod frame;
pub mod packets;
pub mod varint;
pub mod version;

pub use codec::PacketCodec;
pub use compression::CompressionContext;
pub use error::{ProtocolError, Result};
pub use frame::FrameSplitter;
pub use packets::{Clientbound, Serverbound};
pub use version::ProtocolVersion;
