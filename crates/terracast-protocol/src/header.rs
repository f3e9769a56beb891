//! Packet kinds and the fixed header prepended to every datagram.

use serde::{Deserialize, Serialize};

/// Discriminant for every packet on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketKind {
    /// Client asks to join the server.
    ConnectionRequest,
    /// Liveness probe; the client echoes the server's sequence number.
    Ping,
    /// Server accepts or rejects a connection request.
    ConnectionHandshake,
    /// Broadcast: a new player joined.
    PlayerJoined,
    /// Client asks to switch teams.
    TeamSelectRequest,
    /// Broadcast: a player's team changed.
    PlayerTeamChange,
    /// Client announces a voluntary disconnect.
    ClientDisconnect,
    /// Broadcast: a player left.
    PlayerLeft,
    /// Client's per-interval input commands, prediction claim, and edits.
    ClientCommands,
    /// Server's periodic authoritative snapshot.
    GameStateSnapshot,
    /// Bulk chunk voxel transfer (world download).
    ChunkVoxels,
}

/// Header carried by every packet.
///
/// `total_size` is the byte length of the payload body that follows the
/// header; the decoder uses it to reject datagrams truncated in flight.
/// `session_tag` authenticates the sender within a session; packets bearing
/// an unrecognized tag are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketHeader {
    /// Payload discriminant; must match the payload that follows.
    pub kind: PacketKind,
    /// Payload length in bytes.
    pub total_size: u32,
    /// Sender's tick at send time.
    pub tick: u64,
    /// Per-sender monotonically increasing packet counter.
    pub packet_counter: u32,
    /// Random per-session tag assigned at handshake; `0` before handshake.
    pub session_tag: u32,
    /// Sender's client id; `0` for the server and for pre-handshake packets.
    pub client_id: u16,
}
