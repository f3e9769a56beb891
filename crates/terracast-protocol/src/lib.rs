//! Wire protocol for the state-synchronization layer: packet kinds, headers,
//! payload types, the binary codec, the voxel zero-run compressor, and the
//! datagram transport seam.

pub mod codec;
pub mod header;
pub mod packets;
pub mod player;
pub mod transport;
pub mod voxel_rle;

pub use codec::{CodecError, MAX_DATAGRAM_BYTES, Packet, decode_packet, encode_packet};
pub use header::{PacketHeader, PacketKind};
pub use packets::{
    ClientCommands, ConnectionHandshake, ConnectionRequest, GameStateSnapshot, HandshakeAccepted,
    Payload, Ping, PlayerJoined, PlayerLeft, PlayerTeamChange, RosterEntry, TeamId,
    TeamSelectRequest,
};
pub use player::{InputCommand, MovementSimulator, PlayerClaim, PlayerSnapshot, WalkingMovement};
pub use transport::{DatagramTransport, LoopbackTransport, TransportError};
pub use voxel_rle::{EncodedChunk, MAX_ENCODED_CHUNK_BYTES, RleError};
