//! Authoritative re-simulation, divergence detection, and correction
//! dispatch.
//!
//! The server replays each client's input commands against its own state and
//! diffs the result against the client's claims on every snapshot-dispatch
//! interval. State divergence is an epsilon comparison per axis; terrain
//! divergence walks the client's reported edit sets against server truth,
//! rewriting any wrong final value. A client found diverged receives one
//! correction and is ignored (inputs only) until its claims realign.

use terracast_protocol::packets::{ClientCommands, GameStateSnapshot};
use terracast_protocol::player::{MovementSimulator, PlayerClaim, PlayerSnapshot};
use terracast_sync::merge_edits;
use terracast_voxel::{ChunkCorrection, Voxel, VoxelCorrection, VoxelGrid, brush};

use crate::session::{ClientTable, RemoteClient, SyncState};

/// Per-axis tolerance when comparing claimed and authoritative state.
pub const STATE_EPSILON: f32 = 1e-6;

// ---------------------------------------------------------------------------
// Command processing
// ---------------------------------------------------------------------------

/// Processes one `ClientCommands` payload.
///
/// In `Normal` state the inputs are replayed against the authoritative
/// simulation; while `WaitingOnCorrection` the input payload is dropped
/// (preventing runaway divergence) but reported terrain edits are still
/// merged so the next dispatch can diff and correct them.
pub fn process_client_commands(
    client: &mut RemoteClient,
    payload: ClientCommands,
    sim: &dyn MovementSimulator,
    grid: &mut VoxelGrid,
) {
    if client.sync_state == SyncState::WaitingOnCorrection && payload.correction_ack {
        tracing::debug!("client {} acknowledged correction", client.client_id);
        client.sync_state = SyncState::Normal;
    }

    if client.sync_state == SyncState::Normal {
        for command in &payload.commands {
            client.motion = sim.simulate(&client.motion, command, command.dt);
            client.motion.tick = command.tick;
            if let Some(stroke) = &command.stroke
                && client.motion.alive
            {
                brush::apply_stroke(grid, stroke);
            }
        }
        client.pending_commands.extend(payload.commands);
    } else {
        tracing::debug!(
            "client {} is awaiting correction; dropping {} commands",
            client.client_id,
            payload.commands.len()
        );
    }

    if let Some(edits) = &payload.edits {
        merge_edits(&mut client.reported_edits, &edits.chunks);
    }
    client.confirmed_tick = client.confirmed_tick.max(payload.claim.tick);
    client.claim = payload.claim;
}

// ---------------------------------------------------------------------------
// Divergence detection
// ---------------------------------------------------------------------------

fn axes_diverge(a: glam::Vec3, b: glam::Vec3) -> bool {
    (a.x - b.x).abs() > STATE_EPSILON
        || (a.y - b.y).abs() > STATE_EPSILON
        || (a.z - b.z).abs() > STATE_EPSILON
}

/// Compares server truth against the client's claim: position, view
/// direction, up, velocity (per-axis epsilon), interaction mode, and alive
/// state.
pub fn needs_state_correction(truth: &PlayerClaim, claim: &PlayerClaim) -> bool {
    axes_diverge(truth.position, claim.position)
        || axes_diverge(truth.view_dir, claim.view_dir)
        || axes_diverge(truth.up, claim.up)
        || axes_diverge(truth.velocity, claim.velocity)
        || truth.flags != claim.flags
        || truth.alive != claim.alive
}

/// Walks the client's reported edits against server truth. Any voxel whose
/// claimed final value disagrees is rewritten to the truth and its chunk
/// entry flagged. Returns whether anything diverged plus the (corrected)
/// edit set as a correction payload.
pub fn diff_terrain(
    client: &mut RemoteClient,
    grid: &VoxelGrid,
) -> (bool, Vec<ChunkCorrection>) {
    let mut diverged = false;
    let mut corrections = Vec::with_capacity(client.reported_edits.len());

    for chunk_edits in &mut client.reported_edits {
        let mut chunk_diverged = false;
        let mut list = Vec::with_capacity(chunk_edits.edits.len());
        for edit in &mut chunk_edits.edits {
            let truth = grid
                .voxel(chunk_edits.coord, edit.index)
                .unwrap_or(Voxel::EMPTY);
            if edit.final_value != truth.value {
                edit.final_value = truth.value;
                edit.color = truth.color;
                chunk_diverged = true;
            }
            list.push(VoxelCorrection {
                index: edit.index,
                final_value: edit.final_value,
                color: edit.color,
            });
        }
        corrections.push(ChunkCorrection {
            coord: chunk_edits.coord,
            needs_correction: chunk_diverged,
            corrections: list,
        });
        diverged |= chunk_diverged;
    }

    (diverged, corrections)
}

// ---------------------------------------------------------------------------
// Snapshot dispatch
// ---------------------------------------------------------------------------

fn base_snapshot(client: &RemoteClient, server_tick: u64) -> PlayerSnapshot {
    PlayerSnapshot {
        client_id: client.client_id,
        tick: server_tick,
        position: client.motion.position,
        view_dir: client.motion.view_dir,
        up: client.motion.up,
        velocity: client.motion.velocity,
        flags: client.motion.flags,
        alive: client.motion.alive,
        health: client.motion.health,
        needs_correction: false,
        server_waiting: false,
    }
}

/// Builds one snapshot per connected client for this dispatch interval.
///
/// The shared part (player states, broadcast edits) is identical for every
/// receiver; the receiver's own player entry carries the correction
/// booleans, and a freshly diverged receiver additionally gets its corrected
/// edit set as the private trailing payload. Each client's reported edits
/// are consumed by the diff.
pub fn dispatch_snapshots(
    table: &mut ClientTable,
    grid: &VoxelGrid,
    server_tick: u64,
    broadcast_edits: Vec<ChunkCorrection>,
) -> Vec<(u16, GameStateSnapshot)> {
    struct Decision {
        base: PlayerSnapshot,
        needs_correction: bool,
        server_waiting: bool,
        confirmed_tick: u64,
        private: Option<Vec<ChunkCorrection>>,
    }

    let mut decisions: Vec<Decision> = Vec::new();
    for client in table.iter_mut() {
        let state_diverged = needs_state_correction(&client.motion, &client.claim);
        let (terrain_diverged, corrected) = diff_terrain(client, grid);
        client.reported_edits.clear();
        let needs = state_diverged || terrain_diverged;

        let (needs_correction, server_waiting, private) = match (client.sync_state, needs) {
            (SyncState::Normal, true) => {
                // Fresh divergence: send the one correction and hold input.
                client.sync_state = SyncState::WaitingOnCorrection;
                client.pending_commands.clear();
                tracing::info!(
                    "client {} diverged (state: {state_diverged}, terrain: {terrain_diverged})",
                    client.client_id
                );
                (true, false, terrain_diverged.then_some(corrected))
            }
            (SyncState::WaitingOnCorrection, true) => {
                // Correction already outstanding; don't resend.
                (true, true, None)
            }
            (SyncState::WaitingOnCorrection, false) => {
                // The client's claims realigned: the correction took effect.
                client.sync_state = SyncState::Normal;
                (false, false, None)
            }
            (SyncState::Normal, false) => (false, false, None),
        };

        decisions.push(Decision {
            base: base_snapshot(client, server_tick),
            needs_correction,
            server_waiting,
            confirmed_tick: client.confirmed_tick,
            private,
        });
    }

    decisions
        .iter()
        .map(|receiver| {
            let players = decisions
                .iter()
                .map(|d| {
                    let mut snapshot = d.base;
                    if d.base.client_id == receiver.base.client_id {
                        snapshot.needs_correction = receiver.needs_correction;
                        snapshot.server_waiting = receiver.server_waiting;
                    }
                    snapshot
                })
                .collect();
            (
                receiver.base.client_id,
                GameStateSnapshot {
                    confirmed_tick: receiver.confirmed_tick,
                    players,
                    broadcast_edits: broadcast_edits.clone(),
                    terrain_correction: receiver.private.clone(),
                },
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
