//! The server-side networking context.
//!
//! [`ServerContext`] is the explicitly owned state object for one server
//! session: client table, authoritative voxel grid, tick counter, and the
//! event buffer. All packet entry points take it by reference; there is no
//! global networking state.

use std::net::SocketAddr;

use terracast_protocol::codec::{CodecError, PROTOCOL_VERSION, Packet, decode_packet};
use terracast_protocol::packets::{
    ConnectionHandshake, ConnectionRequest, HandshakeAccepted, Payload, Ping, PlayerJoined,
    PlayerLeft, PlayerTeamChange, TeamId,
};
use terracast_protocol::player::{MovementSimulator, PlayerClaim};
use terracast_sync::EventBuffer;
use terracast_voxel::{ChunkCorrection, VoxelGrid};

use crate::reconciliation::{dispatch_snapshots, process_client_commands};
use crate::registry::ServerListing;
use crate::session::{ClientTable, JoinError, RemoteClient};
use crate::world_transfer::{DEFAULT_PACKETS_PER_TICK, WorldTransfer};

/// Tuning knobs for a server session.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Display name shown in listings.
    pub server_name: String,
    /// Maximum simultaneous clients.
    pub max_clients: usize,
    /// Simulation tick rate in Hz.
    pub tick_rate: u32,
    /// Ticks between client command flushes (sent in the handshake).
    pub command_interval_ticks: u32,
    /// Ticks between snapshot dispatches.
    pub snapshot_interval_ticks: u32,
    /// Ticks between pings to each client.
    pub ping_interval_ticks: u64,
    /// Ticks of silence after which a client is disconnected.
    pub timeout_ticks: u64,
    /// World-transfer packets sent per client per tick.
    pub transfer_packets_per_tick: usize,
    /// Spawn state handed to new players.
    pub spawn: PlayerClaim,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            server_name: "terracast server".to_owned(),
            max_clients: crate::session::DEFAULT_MAX_CLIENTS,
            tick_rate: 60,
            command_interval_ticks: 3,
            snapshot_interval_ticks: 6,
            ping_interval_ticks: 120,
            timeout_ticks: 600,
            transfer_packets_per_tick: DEFAULT_PACKETS_PER_TICK,
            spawn: PlayerClaim::at_spawn(glam::Vec3::new(8.0, 24.0, 8.0)),
        }
    }
}

impl ServerOptions {
    /// Builds options from a loaded network config. Second-based intervals
    /// are converted to ticks at the configured tick rate.
    pub fn from_config(network: &terracast_config::NetworkConfig) -> Self {
        let tick_rate = network.tick_rate.max(1);
        Self {
            server_name: network.server_name.clone(),
            max_clients: network.max_players as usize,
            tick_rate,
            command_interval_ticks: network.command_interval_ticks.max(1),
            snapshot_interval_ticks: network.snapshot_interval_ticks.max(1),
            ping_interval_ticks: u64::from(network.ping_interval_seconds) * u64::from(tick_rate),
            timeout_ticks: u64::from(network.timeout_seconds) * u64::from(tick_rate),
            transfer_packets_per_tick: network.transfer_packets_per_tick.max(1) as usize,
            ..Self::default()
        }
    }
}

/// High-level notifications for embedding code (UI, logs, registry).
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// A client completed the handshake.
    PlayerJoined {
        /// Assigned client id.
        client_id: u16,
        /// Player name.
        name: String,
    },
    /// A client left (voluntarily or by timeout).
    PlayerLeft {
        /// The departed client.
        client_id: u16,
    },
    /// A team change was applied.
    TeamChanged {
        /// The player whose team changed.
        client_id: u16,
        /// The new team.
        team: TeamId,
    },
}

/// Errors raised by server packet processing.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A datagram failed to decode.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Stamps an outbound packet with a client's header bookkeeping.
fn packet_for(client: &mut RemoteClient, tick: u64, payload: Payload) -> (SocketAddr, Packet) {
    client.packet_counter += 1;
    (
        client.addr,
        Packet::new(payload, tick, client.packet_counter, client.session_tag, 0),
    )
}

// ---------------------------------------------------------------------------
// ServerContext
// ---------------------------------------------------------------------------

/// All server-side state for one listening session.
pub struct ServerContext {
    /// Tuning knobs.
    pub options: ServerOptions,
    /// Connected clients.
    pub table: ClientTable,
    /// Authoritative world.
    pub grid: VoxelGrid,
    /// Notifications for embedding code.
    pub events: EventBuffer<ServerEvent>,
    /// Current server tick.
    tick: u64,
}

impl ServerContext {
    /// Creates a context around an already-generated world.
    pub fn new(options: ServerOptions, grid: VoxelGrid) -> Self {
        Self {
            table: ClientTable::new(options.max_clients),
            options,
            grid,
            events: EventBuffer::new(),
            tick: 0,
        }
    }

    /// Current server tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Current facts for the registry listing endpoint.
    pub fn listing(&self) -> ServerListing {
        ServerListing {
            name: self.options.server_name.clone(),
            players: self.table.len() as u32,
            max_players: self.options.max_clients as u32,
            tick_rate: self.options.tick_rate,
        }
    }

    /// Builds one packet per connected client carrying the same payload.
    fn broadcast(&mut self, payload: &Payload) -> Vec<(SocketAddr, Packet)> {
        let tick = self.tick;
        self.table
            .iter_mut()
            .map(|client| packet_for(client, tick, payload.clone()))
            .collect()
    }

    /// Processes one inbound datagram, returning the packets to send.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Codec`] on malformed datagrams. Packets with an
    /// unrecognized session tag are dropped and logged, not fatal.
    pub fn handle_datagram(
        &mut self,
        from: SocketAddr,
        data: &[u8],
        sim: &dyn MovementSimulator,
    ) -> Result<Vec<(SocketAddr, Packet)>, ServerError> {
        let packet = decode_packet(data)?;

        if let Payload::ConnectionRequest(request) = packet.payload {
            return Ok(self.handle_connection_request(from, &request));
        }

        let tick = self.tick;
        let Some(client) = self.table.get_by_addr_mut(from) else {
            tracing::warn!("datagram from unknown peer {from}");
            return Ok(Vec::new());
        };
        if packet.header.session_tag != client.session_tag {
            tracing::warn!(
                "dropping {:?} from client {} with unrecognized session tag {:#x}",
                packet.header.kind,
                client.client_id,
                packet.header.session_tag
            );
            return Ok(Vec::new());
        }
        client.last_heard_tick = tick;
        let client_id = client.client_id;

        match packet.payload {
            Payload::ClientCommands(commands) => {
                process_client_commands(client, commands, sim, &mut self.grid);
                Ok(Vec::new())
            }
            // Ping echoes only refresh liveness, handled above.
            Payload::Ping(_) => Ok(Vec::new()),
            Payload::TeamSelectRequest(request) => {
                if self.table.team_change_allowed(client_id, request.team) {
                    if let Some(client) = self.table.get_mut(client_id) {
                        client.team = request.team;
                    }
                    self.events.send(ServerEvent::TeamChanged {
                        client_id,
                        team: request.team,
                    });
                    Ok(self.broadcast(&Payload::PlayerTeamChange(PlayerTeamChange {
                        client_id,
                        team: request.team,
                    })))
                } else {
                    tracing::debug!("client {client_id} team change denied (balance)");
                    Ok(Vec::new())
                }
            }
            Payload::ClientDisconnect => Ok(self.drop_client(client_id)),
            other => {
                tracing::warn!("unexpected server-bound packet: {:?}", other.kind());
                Ok(Vec::new())
            }
        }
    }

    fn handle_connection_request(
        &mut self,
        from: SocketAddr,
        request: &ConnectionRequest,
    ) -> Vec<(SocketAddr, Packet)> {
        if request.protocol_version != PROTOCOL_VERSION {
            let err = JoinError::VersionMismatch {
                client: request.protocol_version,
                server: PROTOCOL_VERSION,
            };
            return vec![self.rejection(from, err.to_string())];
        }

        let spawn = self.options.spawn;
        let tick = self.tick;

        // A request from a known address is a handshake retry (the original
        // reply was lost); re-admitting would leak a second slot.
        let retry = self
            .table
            .iter()
            .find(|c| c.addr == from)
            .map(|c| c.client_id);
        let (client_id, fresh_join) = match retry {
            Some(client_id) => {
                tracing::info!("handshake retry from client {client_id}");
                (client_id, false)
            }
            None => match self.table.join(from, &request.player_name, spawn, tick) {
                Ok(client) => (client.client_id, true),
                Err(err) => return vec![self.rejection(from, err.to_string())],
            },
        };

        // Queue the world download and build the handshake.
        let transfer = WorldTransfer::new(&self.grid, self.options.transfer_packets_per_tick);
        let loaded_chunk_count = transfer.total_chunks();
        let roster = self.table.roster();

        let mut out = Vec::new();
        let mut entry = None;
        if let Some(client) = self.table.get_mut(client_id) {
            client.transfer = Some(transfer);
            entry = Some(client.roster_entry());
            let accepted = HandshakeAccepted {
                client_id,
                session_tag: client.session_tag,
                tick,
                tick_rate: self.options.tick_rate,
                command_interval_ticks: self.options.command_interval_ticks,
                snapshot_interval_ticks: self.options.snapshot_interval_ticks,
                loaded_chunk_count,
                spawn,
                roster,
            };
            // The handshake delivers the session tag, so it is the one
            // tagged packet the client cannot validate yet; send it untagged
            // like the rejection path.
            client.packet_counter += 1;
            out.push((
                client.addr,
                Packet::new(
                    Payload::ConnectionHandshake(ConnectionHandshake::Accepted(accepted)),
                    tick,
                    client.packet_counter,
                    0,
                    0,
                ),
            ));
        }

        if let Some(entry) = entry
            && fresh_join
        {
            self.events.send(ServerEvent::PlayerJoined {
                client_id,
                name: entry.player_name.clone(),
            });
            for (addr, packet) in self.broadcast(&Payload::PlayerJoined(PlayerJoined { entry })) {
                if addr != from {
                    out.push((addr, packet));
                }
            }
        }
        out
    }

    fn rejection(&self, to: SocketAddr, reason: String) -> (SocketAddr, Packet) {
        tracing::info!("rejecting connection from {to}: {reason}");
        (
            to,
            Packet::new(
                Payload::ConnectionHandshake(ConnectionHandshake::Rejected { reason }),
                self.tick,
                0,
                0,
                0,
            ),
        )
    }

    /// Removes a client and broadcasts the departure.
    fn drop_client(&mut self, client_id: u16) -> Vec<(SocketAddr, Packet)> {
        if self.table.remove(client_id).is_some() {
            self.events.send(ServerEvent::PlayerLeft { client_id });
            self.broadcast(&Payload::PlayerLeft(PlayerLeft { client_id }))
        } else {
            Vec::new()
        }
    }

    /// Advances one server tick: world-transfer drip, ping schedule, timeout
    /// sweep, and (on the dispatch interval) snapshot dispatch.
    pub fn advance_tick(&mut self) -> Vec<(SocketAddr, Packet)> {
        self.tick += 1;
        let tick = self.tick;
        let mut out = Vec::new();

        // World-transfer drip, a few packets per client per tick.
        for client in self.table.iter_mut() {
            let Some(transfer) = client.transfer.as_mut() else {
                continue;
            };
            let payloads = transfer.next_payloads();
            if transfer.is_complete() {
                client.transfer = None;
            }
            for payload in payloads {
                out.push(packet_for(client, tick, payload));
            }
        }

        // Ping schedule.
        let ping_interval = self.options.ping_interval_ticks;
        for client in self.table.iter_mut() {
            if tick - client.last_ping_tick >= ping_interval {
                client.last_ping_tick = tick;
                client.ping_sequence += 1;
                let ping = Payload::Ping(Ping {
                    sequence: client.ping_sequence,
                });
                out.push(packet_for(client, tick, ping));
            }
        }

        // Timeout sweep.
        let timeout = self.options.timeout_ticks;
        let timed_out: Vec<u16> = self
            .table
            .iter()
            .filter(|c| tick - c.last_heard_tick >= timeout)
            .map(|c| c.client_id)
            .collect();
        for client_id in timed_out {
            tracing::warn!("client {client_id} timed out");
            out.extend(self.drop_client(client_id));
        }

        // Snapshot dispatch.
        if tick % u64::from(self.options.snapshot_interval_ticks) == 0 {
            out.extend(self.dispatch());
        }
        out
    }

    fn dispatch(&mut self) -> Vec<(SocketAddr, Packet)> {
        // Server-confirmed terrain changes this interval, with colors.
        let mut broadcast_edits: Vec<ChunkCorrection> = Vec::new();
        for coord in self.grid.take_touched() {
            let Some(chunk) = self.grid.chunk_mut(coord) else {
                continue;
            };
            let corrections = chunk.collect_corrections();
            chunk.reset_epoch();
            if !corrections.is_empty() {
                broadcast_edits.push(ChunkCorrection {
                    coord,
                    needs_correction: false,
                    corrections,
                });
            }
        }
        broadcast_edits.sort_unstable_by_key(|c| (c.coord.x, c.coord.y, c.coord.z));

        let tick = self.tick;
        let snapshots = dispatch_snapshots(&mut self.table, &self.grid, tick, broadcast_edits);
        let mut out = Vec::new();
        for (client_id, snapshot) in snapshots {
            if let Some(client) = self.table.get_mut(client_id) {
                out.push(packet_for(client, tick, Payload::GameStateSnapshot(snapshot)));
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
