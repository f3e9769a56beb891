//! Payload types for every packet kind.
//!
//! The top-level [`Payload`] enum mirrors [`PacketKind`]; the codec verifies
//! that a decoded payload matches the kind announced in the header.

use serde::{Deserialize, Serialize};

use terracast_voxel::{ChunkCorrection, TickEdits};

use crate::header::PacketKind;
use crate::player::{InputCommand, PlayerClaim, PlayerSnapshot};
use crate::voxel_rle::EncodedChunk;

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

/// Team affiliation of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamId {
    /// Red team.
    Red,
    /// Blue team.
    Blue,
}

impl TeamId {
    /// The opposing team.
    pub fn other(self) -> Self {
        match self {
            Self::Red => Self::Blue,
            Self::Blue => Self::Red,
        }
    }
}

// ---------------------------------------------------------------------------
// Connection lifecycle
// ---------------------------------------------------------------------------

/// Client-to-server join request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    /// Desired player name.
    pub player_name: String,
    /// Wire-protocol version the client speaks.
    pub protocol_version: u8,
}

/// Liveness probe. The server sends one per ping interval; the client echoes
/// the sequence number back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    /// Sequence number for matching request and echo.
    pub sequence: u32,
}

/// One player's roster line, sent in the handshake and join broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// The player's client id.
    pub client_id: u16,
    /// Display name.
    pub player_name: String,
    /// Current team.
    pub team: TeamId,
}

/// Everything a freshly accepted client needs to start simulating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeAccepted {
    /// Assigned client id.
    pub client_id: u16,
    /// Random session tag the client must echo in every header.
    pub session_tag: u32,
    /// Server tick at acceptance.
    pub tick: u64,
    /// Fixed simulation tick rate in Hz.
    pub tick_rate: u32,
    /// Ticks between client command flushes.
    pub command_interval_ticks: u32,
    /// Ticks between server snapshot dispatches.
    pub snapshot_interval_ticks: u32,
    /// Number of chunks the world download will deliver.
    pub loaded_chunk_count: u32,
    /// Spawn state for the local player.
    pub spawn: PlayerClaim,
    /// Players already connected.
    pub roster: Vec<RosterEntry>,
}

/// Server's answer to a [`ConnectionRequest`]. Rejection is a recoverable
/// outcome surfaced to the player, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConnectionHandshake {
    /// Connection accepted.
    Accepted(HandshakeAccepted),
    /// Connection rejected (server full, version mismatch, bad name).
    Rejected {
        /// Human-readable reason.
        reason: String,
    },
}

/// Broadcast: a new player joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerJoined {
    /// The joining player.
    pub entry: RosterEntry,
}

/// Client request to switch teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSelectRequest {
    /// Requested team.
    pub team: TeamId,
}

/// Broadcast: a player's team changed (server-validated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerTeamChange {
    /// Player whose team changed.
    pub client_id: u16,
    /// The new team.
    pub team: TeamId,
}

/// Broadcast: a player left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLeft {
    /// The departed player.
    pub client_id: u16,
}

// ---------------------------------------------------------------------------
// Gameplay traffic
// ---------------------------------------------------------------------------

/// Client's per-interval upload: cached inputs, the current prediction claim,
/// and the accumulated terrain edits (if any).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientCommands {
    /// Input commands cached since the previous flush, oldest first.
    pub commands: Vec<InputCommand>,
    /// Predicted state after the newest command.
    pub claim: PlayerClaim,
    /// Accumulated edits for this interval; `None` when no voxel changed.
    pub edits: Option<TickEdits>,
    /// `true` while the client has processed a hard correction that the
    /// server has not yet seen acknowledged; releases the server's
    /// `WaitingOnCorrection` hold.
    pub correction_ack: bool,
}

/// Server's periodic authoritative snapshot.
///
/// `terrain_correction` is the private trailing payload attached only to a
/// client whose reported edits diverged; the rest of the packet is identical
/// for every receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    /// Newest client tick the server has fully processed for the receiver.
    pub confirmed_tick: u64,
    /// Authoritative state of every connected player.
    pub players: Vec<PlayerSnapshot>,
    /// Terrain changes confirmed since the last dispatch, for display.
    pub broadcast_edits: Vec<ChunkCorrection>,
    /// Receiver-specific corrected edit set; present only after terrain
    /// divergence.
    pub terrain_correction: Option<Vec<ChunkCorrection>>,
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Every packet body, one variant per [`PacketKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// See [`ConnectionRequest`].
    ConnectionRequest(ConnectionRequest),
    /// See [`Ping`].
    Ping(Ping),
    /// See [`ConnectionHandshake`].
    ConnectionHandshake(ConnectionHandshake),
    /// See [`PlayerJoined`].
    PlayerJoined(PlayerJoined),
    /// See [`TeamSelectRequest`].
    TeamSelectRequest(TeamSelectRequest),
    /// See [`PlayerTeamChange`].
    PlayerTeamChange(PlayerTeamChange),
    /// Voluntary client disconnect notice.
    ClientDisconnect,
    /// See [`PlayerLeft`].
    PlayerLeft(PlayerLeft),
    /// See [`ClientCommands`].
    ClientCommands(ClientCommands),
    /// See [`GameStateSnapshot`].
    GameStateSnapshot(GameStateSnapshot),
    /// Bulk world transfer: a batch of encoded chunks.
    ChunkVoxels {
        /// Compressed chunks in this datagram.
        chunks: Vec<EncodedChunk>,
    },
}

impl Payload {
    /// The [`PacketKind`] this payload belongs under.
    pub fn kind(&self) -> PacketKind {
        match self {
            Self::ConnectionRequest(_) => PacketKind::ConnectionRequest,
            Self::Ping(_) => PacketKind::Ping,
            Self::ConnectionHandshake(_) => PacketKind::ConnectionHandshake,
            Self::PlayerJoined(_) => PacketKind::PlayerJoined,
            Self::TeamSelectRequest(_) => PacketKind::TeamSelectRequest,
            Self::PlayerTeamChange(_) => PacketKind::PlayerTeamChange,
            Self::ClientDisconnect => PacketKind::ClientDisconnect,
            Self::PlayerLeft(_) => PacketKind::PlayerLeft,
            Self::ClientCommands(_) => PacketKind::ClientCommands,
            Self::GameStateSnapshot(_) => PacketKind::GameStateSnapshot,
            Self::ChunkVoxels { .. } => PacketKind::ChunkVoxels,
        }
    }
}
