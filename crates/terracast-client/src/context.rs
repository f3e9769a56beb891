//! The client-side networking context.
//!
//! [`ClientContext`] is the explicitly owned state object passed into every
//! networking entry point, one per server connection, with no globals. It owns
//! the session, predictor, accumulator, voxel grid, interpolation state,
//! world download, roster, and the event buffer read by UI and render code.

use terracast_protocol::codec::{CodecError, Packet, decode_packet};
use terracast_protocol::packets::{Payload, RosterEntry, TeamId, TeamSelectRequest};
use terracast_protocol::player::{InputCommand, MovementSimulator, PlayerClaim};
use terracast_protocol::voxel_rle::RleError;
use terracast_sync::{Accumulator, DEFAULT_RING_CAPACITY, EventBuffer, SyncError};
use terracast_voxel::VoxelGrid;

use crate::download::WorldDownload;
use crate::interpolation::{InterpolationQueue, RemotePlayers};
use crate::predictor::Predictor;
use crate::session::{ClientSession, ClientSessionState};
use crate::snapshot::handle_snapshot;

/// High-level notifications consumed by UI and render systems.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The handshake was rejected or failed; recoverable.
    ConnectionFailed {
        /// Server-supplied reason.
        reason: String,
    },
    /// The handshake was accepted.
    Connected,
    /// Another player joined.
    PlayerJoined(RosterEntry),
    /// A player left.
    PlayerLeft {
        /// The departed player.
        client_id: u16,
    },
    /// A player's team changed.
    TeamChanged {
        /// The player whose team changed.
        client_id: u16,
        /// The new team.
        team: TeamId,
    },
    /// The server reported the local player dead while it was locally alive.
    LocalPlayerDied,
    /// Every handshake-announced chunk has arrived.
    WorldDownloadComplete,
}

/// Errors raised by client packet processing.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A datagram failed to decode.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Accumulation or rollback failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
    /// A world-download chunk failed to decode.
    #[error(transparent)]
    Rle(#[from] RleError),
}

// ---------------------------------------------------------------------------
// ClientContext
// ---------------------------------------------------------------------------

/// All client-side state for one server connection.
pub struct ClientContext {
    /// Connection lifecycle and outbound header bookkeeping.
    pub session: ClientSession,
    /// Local player prediction.
    pub predictor: Predictor,
    /// Unconfirmed edit history.
    pub accumulator: Accumulator,
    /// Loaded world chunks.
    pub grid: VoxelGrid,
    /// Voxel blend staging for other clients' edits.
    pub interpolation: InterpolationQueue,
    /// Remote player snapshot buffers.
    pub remotes: RemotePlayers,
    /// In-progress world download, if any.
    pub download: Option<WorldDownload>,
    /// Known players, maintained from roster broadcasts.
    pub roster: Vec<RosterEntry>,
    /// Notifications for UI / render consumers.
    pub events: EventBuffer<ClientEvent>,
}

impl ClientContext {
    /// Creates a disconnected context.
    pub fn new() -> Self {
        Self {
            session: ClientSession::new(),
            predictor: Predictor::new(PlayerClaim::at_spawn(glam::Vec3::ZERO), 1, 0),
            accumulator: Accumulator::new(DEFAULT_RING_CAPACITY),
            grid: VoxelGrid::new(),
            interpolation: InterpolationQueue::new(),
            remotes: RemotePlayers::new(),
            download: None,
            roster: Vec::new(),
            events: EventBuffer::new(),
        }
    }

    /// Starts a connection attempt. Returns the request packet to send.
    pub fn connect(&mut self, player_name: &str) -> Packet {
        self.session
            .request_connection(player_name, self.predictor.current_tick())
    }

    /// Builds a team-change request packet.
    pub fn select_team(&mut self, team: TeamId) -> Packet {
        let tick = self.predictor.current_tick();
        self.session
            .make_packet(Payload::TeamSelectRequest(TeamSelectRequest { team }), tick)
    }

    /// Runs one prediction tick and, at the command interval, flushes the
    /// outbound `ClientCommands` packet.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Sync`] if edit accumulation fails.
    pub fn advance_tick(
        &mut self,
        input: InputCommand,
        sim: &dyn MovementSimulator,
    ) -> Result<Option<Packet>, ClientError> {
        self.predictor.tick(input, sim, &mut self.grid);
        self.interpolation.advance(&mut self.grid);

        if self.session.state() != ClientSessionState::Connected || !self.predictor.should_flush() {
            return Ok(None);
        }
        let payload = self.predictor.flush(&mut self.accumulator, &mut self.grid)?;
        let tick = self.predictor.current_tick();
        Ok(Some(
            self.session
                .make_packet(Payload::ClientCommands(payload), tick),
        ))
    }

    /// Processes one inbound datagram. Returns any immediate replies (ping
    /// echoes) to send.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on malformed datagrams or failed rollback;
    /// packets with a wrong session tag are dropped silently (logged).
    pub fn handle_datagram(&mut self, data: &[u8]) -> Result<Vec<Packet>, ClientError> {
        let packet = decode_packet(data)?;
        if !self.session.accepts_tag(packet.header.session_tag) {
            tracing::warn!(
                "dropping {:?} with unrecognized session tag {:#x}",
                packet.header.kind,
                packet.header.session_tag
            );
            return Ok(Vec::new());
        }

        let mut replies = Vec::new();
        match packet.payload {
            Payload::ConnectionHandshake(handshake) => {
                if let Some(params) = self.session.handle_handshake(&handshake).cloned() {
                    self.predictor =
                        Predictor::new(params.spawn, params.command_interval_ticks, params.tick);
                    self.accumulator = Accumulator::new(DEFAULT_RING_CAPACITY);
                    self.roster = params.roster;
                    self.events.send(ClientEvent::Connected);
                    if params.loaded_chunk_count == 0 {
                        self.download = None;
                        self.events.send(ClientEvent::WorldDownloadComplete);
                    } else {
                        self.download = Some(WorldDownload::new(params.loaded_chunk_count));
                    }
                } else if let terracast_protocol::packets::ConnectionHandshake::Rejected { reason } =
                    handshake
                {
                    self.events.send(ClientEvent::ConnectionFailed { reason });
                }
            }
            Payload::Ping(ping) => {
                let tick = self.predictor.current_tick();
                replies.push(self.session.echo_ping(ping, tick));
            }
            Payload::PlayerJoined(joined) => {
                if joined.entry.client_id != self.session.client_id() {
                    self.roster.push(joined.entry.clone());
                    self.events.send(ClientEvent::PlayerJoined(joined.entry));
                }
            }
            Payload::PlayerTeamChange(change) => {
                if let Some(entry) = self
                    .roster
                    .iter_mut()
                    .find(|e| e.client_id == change.client_id)
                {
                    entry.team = change.team;
                }
                self.events.send(ClientEvent::TeamChanged {
                    client_id: change.client_id,
                    team: change.team,
                });
            }
            Payload::PlayerLeft(left) => {
                self.roster.retain(|e| e.client_id != left.client_id);
                self.remotes.remove(left.client_id);
                self.events.send(ClientEvent::PlayerLeft {
                    client_id: left.client_id,
                });
            }
            Payload::GameStateSnapshot(snapshot) => {
                handle_snapshot(
                    self.session.client_id(),
                    &snapshot,
                    &mut self.predictor,
                    &mut self.accumulator,
                    &mut self.grid,
                    &mut self.interpolation,
                    &mut self.remotes,
                    &mut self.events,
                )?;
            }
            Payload::ChunkVoxels { chunks } => {
                if let Some(download) = self.download.as_mut() {
                    if download.apply(&chunks, &mut self.grid)? {
                        self.download = None;
                        self.events.send(ClientEvent::WorldDownloadComplete);
                    }
                } else {
                    tracing::warn!("ChunkVoxels outside an active world download");
                }
            }
            other => {
                tracing::warn!("unexpected client-bound packet: {:?}", other.kind());
            }
        }
        Ok(replies)
    }
}

impl Default for ClientContext {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use terracast_protocol::codec::encode_packet;
    use terracast_protocol::packets::{ConnectionHandshake, HandshakeAccepted, Ping};
    use terracast_protocol::player::WalkingMovement;

    fn handshake_packet(loaded_chunk_count: u32) -> Vec<u8> {
        let packet = Packet::new(
            Payload::ConnectionHandshake(ConnectionHandshake::Accepted(HandshakeAccepted {
                client_id: 2,
                session_tag: 0x1234,
                tick: 50,
                tick_rate: 60,
                command_interval_ticks: 2,
                snapshot_interval_ticks: 4,
                loaded_chunk_count,
                spawn: PlayerClaim::at_spawn(Vec3::new(8.0, 8.0, 8.0)),
                roster: Vec::new(),
            })),
            50,
            1,
            0,
            0,
        );
        encode_packet(&packet).unwrap()
    }

    fn connected_context() -> ClientContext {
        let mut ctx = ClientContext::new();
        ctx.connect("ada");
        ctx.handle_datagram(&handshake_packet(0)).unwrap();
        ctx
    }

    #[test]
    fn test_handshake_initializes_prediction() {
        let ctx = connected_context();
        assert_eq!(ctx.session.state(), ClientSessionState::Connected);
        assert_eq!(ctx.predictor.state().position, Vec3::new(8.0, 8.0, 8.0));
        assert_eq!(ctx.predictor.current_tick(), 50);
        assert!(ctx.events.read().any(|e| matches!(e, ClientEvent::Connected)));
    }

    #[test]
    fn test_wrong_session_tag_dropped() {
        let mut ctx = connected_context();
        let bogus = Packet::new(Payload::Ping(Ping { sequence: 1 }), 0, 1, 0xBAD, 0);
        let replies = ctx
            .handle_datagram(&encode_packet(&bogus).unwrap())
            .unwrap();
        assert!(replies.is_empty());
    }

    #[test]
    fn test_ping_is_echoed() {
        let mut ctx = connected_context();
        let ping = Packet::new(Payload::Ping(Ping { sequence: 9 }), 0, 1, 0x1234, 0);
        let replies = ctx.handle_datagram(&encode_packet(&ping).unwrap()).unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].payload, Payload::Ping(Ping { sequence: 9 }));
    }

    #[test]
    fn test_commands_flush_on_interval() {
        let mut ctx = connected_context();
        let sim = WalkingMovement::default();
        let input = InputCommand {
            tick: 0,
            dt: 0.016,
            buttons: 0,
            view_dir: Vec3::Z,
            flags: 0,
            stroke: None,
        };

        let first = ctx.advance_tick(input.clone(), &sim).unwrap();
        assert!(first.is_none());
        let second = ctx.advance_tick(input, &sim).unwrap();
        let packet = second.unwrap();
        assert!(matches!(packet.payload, Payload::ClientCommands(_)));
        assert_eq!(packet.header.session_tag, 0x1234);
    }
}
