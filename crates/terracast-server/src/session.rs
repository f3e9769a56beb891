//! Connected-client table: bounded slots, session tags, liveness, teams.
//!
//! The table is the server's per-peer ownership root: each slot owns exactly
//! one set of reported edits and one latest prediction claim, plus the sync
//! state machine driving correction dispatch.

use std::net::SocketAddr;

use rand::Rng;

use terracast_protocol::packets::{RosterEntry, TeamId};
use terracast_protocol::player::{InputCommand, PlayerClaim};
use terracast_voxel::ChunkEdits;

use crate::world_transfer::WorldTransfer;

/// Default maximum number of simultaneously connected clients.
pub const DEFAULT_MAX_CLIENTS: usize = 16;

/// Errors raised when admitting a client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    /// Every slot is occupied.
    #[error("server is full ({max} clients)")]
    ServerFull {
        /// Configured capacity.
        max: usize,
    },
    /// The client speaks a different protocol version.
    #[error("protocol version mismatch: client {client}, server {server}")]
    VersionMismatch {
        /// Client's version.
        client: u8,
        /// Server's version.
        server: u8,
    },
    /// The requested player name is empty.
    #[error("player name cannot be empty")]
    EmptyName,
}

// ---------------------------------------------------------------------------
// RemoteClient
// ---------------------------------------------------------------------------

/// Per-client reconciliation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Client inputs are replayed normally.
    Normal,
    /// A correction is outstanding; inputs are ignored until the client's
    /// claims realign with server truth.
    WaitingOnCorrection,
}

/// Server-side state for one connected client.
#[derive(Debug)]
pub struct RemoteClient {
    /// Assigned client id (slot index + 1; `0` is reserved for the server).
    pub client_id: u16,
    /// Datagram source address.
    pub addr: SocketAddr,
    /// Display name.
    pub name: String,
    /// Team, assigned at join for balance.
    pub team: TeamId,
    /// Random nonzero session tag the client must echo.
    pub session_tag: u32,
    /// Outbound packet counter for this client.
    pub packet_counter: u32,
    /// Reconciliation state.
    pub sync_state: SyncState,
    /// Latest client-claimed prediction, retained for diffing.
    pub claim: PlayerClaim,
    /// Authoritative state produced by replaying the client's inputs.
    pub motion: PlayerClaim,
    /// Client-reported edits merged since the last dispatch.
    pub reported_edits: Vec<ChunkEdits>,
    /// Commands cached since the last dispatch; cleared on correction.
    pub pending_commands: Vec<InputCommand>,
    /// Newest client tick whose commands the server has processed.
    pub confirmed_tick: u64,
    /// Server tick of the last packet heard from this client.
    pub last_heard_tick: u64,
    /// Server tick of the last ping sent.
    pub last_ping_tick: u64,
    /// Sequence of the last ping sent.
    pub ping_sequence: u32,
    /// In-progress world transfer, if any.
    pub transfer: Option<WorldTransfer>,
}

impl RemoteClient {
    /// This client's roster line.
    pub fn roster_entry(&self) -> RosterEntry {
        RosterEntry {
            client_id: self.client_id,
            player_name: self.name.clone(),
            team: self.team,
        }
    }

    /// Drains the commands cached since the last dispatch, for game-logic
    /// consumers (weapon fire, interaction triggers). Cleared without being
    /// drained when a correction invalidates them.
    pub fn take_pending_commands(&mut self) -> Vec<InputCommand> {
        std::mem::take(&mut self.pending_commands)
    }
}

// ---------------------------------------------------------------------------
// ClientTable
// ---------------------------------------------------------------------------

/// Bounded slot table of connected clients.
#[derive(Debug)]
pub struct ClientTable {
    slots: Vec<Option<RemoteClient>>,
}

impl ClientTable {
    /// Creates an empty table with `max_clients` slots.
    pub fn new(max_clients: usize) -> Self {
        Self {
            slots: (0..max_clients).map(|_| None).collect(),
        }
    }

    /// Admits a client into the first free slot, assigning id, session tag,
    /// and a balance-preserving team.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::ServerFull`] when no slot is free or
    /// [`JoinError::EmptyName`] for an empty name.
    pub fn join(
        &mut self,
        addr: SocketAddr,
        name: &str,
        spawn: PlayerClaim,
        server_tick: u64,
    ) -> Result<&mut RemoteClient, JoinError> {
        if name.is_empty() {
            return Err(JoinError::EmptyName);
        }
        let team = self.balanced_team();
        let Some(slot) = self.slots.iter().position(Option::is_none) else {
            return Err(JoinError::ServerFull {
                max: self.slots.len(),
            });
        };

        let client = RemoteClient {
            client_id: slot as u16 + 1,
            addr,
            name: name.to_owned(),
            team,
            session_tag: random_session_tag(),
            packet_counter: 0,
            sync_state: SyncState::Normal,
            claim: spawn,
            motion: spawn,
            reported_edits: Vec::new(),
            pending_commands: Vec::new(),
            confirmed_tick: 0,
            last_heard_tick: server_tick,
            last_ping_tick: server_tick,
            ping_sequence: 0,
            transfer: None,
        };
        tracing::info!(
            "client {} ({}) joined from {} on team {:?}",
            client.client_id,
            client.name,
            addr,
            team
        );
        Ok(self.slots[slot].insert(client))
    }

    /// Removes a client, returning its state.
    pub fn remove(&mut self, client_id: u16) -> Option<RemoteClient> {
        let slot = client_id.checked_sub(1)? as usize;
        self.slots.get_mut(slot)?.take()
    }

    /// Looks a client up by id.
    pub fn get(&self, client_id: u16) -> Option<&RemoteClient> {
        let slot = client_id.checked_sub(1)? as usize;
        self.slots.get(slot)?.as_ref()
    }

    /// Looks a client up mutably by id.
    pub fn get_mut(&mut self, client_id: u16) -> Option<&mut RemoteClient> {
        let slot = client_id.checked_sub(1)? as usize;
        self.slots.get_mut(slot)?.as_mut()
    }

    /// Looks a client up by source address.
    pub fn get_by_addr_mut(&mut self, addr: SocketAddr) -> Option<&mut RemoteClient> {
        self.iter_mut().find(|c| c.addr == addr)
    }

    /// Iterates connected clients.
    pub fn iter(&self) -> impl Iterator<Item = &RemoteClient> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Iterates connected clients mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RemoteClient> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    /// Number of connected clients.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Returns `true` if no client is connected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot capacity.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Full roster of connected players.
    pub fn roster(&self) -> Vec<RosterEntry> {
        self.iter().map(RemoteClient::roster_entry).collect()
    }

    /// The team a new player should join to keep sizes balanced.
    pub fn balanced_team(&self) -> TeamId {
        let red = self.iter().filter(|c| c.team == TeamId::Red).count();
        let blue = self.iter().filter(|c| c.team == TeamId::Blue).count();
        if red <= blue { TeamId::Red } else { TeamId::Blue }
    }

    /// Whether `client_id` may switch to `team` without leaving the teams
    /// unbalanced by more than one player.
    pub fn team_change_allowed(&self, client_id: u16, team: TeamId) -> bool {
        let Some(client) = self.get(client_id) else {
            return false;
        };
        if client.team == team {
            return false;
        }
        let joining = self.iter().filter(|c| c.team == team).count() + 1;
        let leaving = self
            .iter()
            .filter(|c| c.team == team.other())
            .count()
            .saturating_sub(1);
        joining <= leaving + 1
    }
}

fn random_session_tag() -> u32 {
    let mut rng = rand::rng();
    loop {
        let tag: u32 = rng.random();
        if tag != 0 {
            return tag;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::net::{Ipv4Addr, SocketAddr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, port))
    }

    fn spawn() -> PlayerClaim {
        PlayerClaim::at_spawn(Vec3::ZERO)
    }

    #[test]
    fn test_join_assigns_ids_and_tags() {
        let mut table = ClientTable::new(4);
        let a_tag = {
            let a = table.join(addr(1), "ada", spawn(), 0).unwrap();
            assert_eq!(a.client_id, 1);
            a.session_tag
        };
        let b = table.join(addr(2), "bob", spawn(), 0).unwrap();
        assert_eq!(b.client_id, 2);
        assert_ne!(b.session_tag, 0);
        assert_ne!(b.session_tag, a_tag);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_full_table_rejects_join() {
        let mut table = ClientTable::new(1);
        table.join(addr(1), "ada", spawn(), 0).unwrap();
        let err = table.join(addr(2), "bob", spawn(), 0).unwrap_err();
        assert_eq!(err, JoinError::ServerFull { max: 1 });
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut table = ClientTable::new(4);
        assert_eq!(
            table.join(addr(1), "", spawn(), 0).unwrap_err(),
            JoinError::EmptyName
        );
    }

    #[test]
    fn test_slot_reuse_after_leave() {
        let mut table = ClientTable::new(2);
        table.join(addr(1), "ada", spawn(), 0).unwrap();
        table.join(addr(2), "bob", spawn(), 0).unwrap();
        table.remove(1);
        let c = table.join(addr(3), "cyd", spawn(), 0).unwrap();
        assert_eq!(c.client_id, 1);
    }

    #[test]
    fn test_teams_stay_balanced_at_join() {
        let mut table = ClientTable::new(8);
        for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
            table.join(addr(i as u16 + 1), name, spawn(), 0).unwrap();
        }
        let red = table.iter().filter(|c| c.team == TeamId::Red).count();
        let blue = table.iter().filter(|c| c.team == TeamId::Blue).count();
        assert_eq!(red, 2);
        assert_eq!(blue, 2);
    }

    #[test]
    fn test_team_change_balance_rule() {
        let mut table = ClientTable::new(8);
        for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
            table.join(addr(i as u16 + 1), name, spawn(), 0).unwrap();
        }
        // 2v2: moving anyone makes it 3v1, not allowed.
        let red_id = table
            .iter()
            .find(|c| c.team == TeamId::Red)
            .unwrap()
            .client_id;
        assert!(!table.team_change_allowed(red_id, TeamId::Blue));

        // 2v1 after a blue leaves: red→blue is allowed (1v2).
        let blue_id = table
            .iter()
            .find(|c| c.team == TeamId::Blue)
            .unwrap()
            .client_id;
        table.remove(blue_id);
        assert!(table.team_change_allowed(red_id, TeamId::Blue));
    }
}
