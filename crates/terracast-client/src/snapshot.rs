//! Processing of server snapshots: hard correction vs happy-path merge.
//!
//! The branch is `needs_correction && !server_waiting`. On correction the
//! client is forcibly aligned: predicted state is overwritten, and, if the
//! server found terrain divergence, local history is rolled back to the
//! server-confirmed tick and the authoritative corrections are applied
//! verbatim. On the happy path the client keeps its own still-unconfirmed
//! edits (no rubber-banding) and animates everyone else's edits through the
//! interpolation queue.

use rustc_hash::{FxHashMap, FxHashSet};

use terracast_protocol::packets::GameStateSnapshot;
use terracast_sync::{Accumulator, EventBuffer, SyncError};
use terracast_voxel::{ChunkCoord, ChunkCorrection, Voxel, VoxelGrid};

use crate::context::ClientEvent;
use crate::interpolation::{InterpolationQueue, RemotePlayers};
use crate::predictor::Predictor;

/// Applies one received snapshot to the local world.
///
/// Remote players' entries are queued for interpolation; the local player's
/// entry drives the correction / happy-path branch.
///
/// # Errors
///
/// Returns [`SyncError`] if a required rollback target has already left the
/// ring (the server and client have diverged beyond repair; the caller
/// should disconnect).
#[allow(clippy::too_many_arguments)]
pub fn handle_snapshot(
    local_client_id: u16,
    snapshot: &GameStateSnapshot,
    predictor: &mut Predictor,
    accumulator: &mut Accumulator,
    grid: &mut VoxelGrid,
    interpolation: &mut InterpolationQueue,
    remotes: &mut RemotePlayers,
    events: &mut EventBuffer<ClientEvent>,
) -> Result<(), SyncError> {
    let mut local = None;
    for player in &snapshot.players {
        if player.client_id == local_client_id {
            local = Some(player);
        } else {
            remotes.push(*player);
        }
    }

    let Some(local) = local else {
        tracing::warn!("snapshot does not include local client {local_client_id}");
        return Ok(());
    };

    if local.needs_correction && !local.server_waiting {
        // Correction path: the server's word replaces prediction wholesale.
        if predictor.state().alive && !local.alive {
            events.send(ClientEvent::LocalPlayerDied);
        }
        predictor.hard_correct(local);

        if let Some(correction) = &snapshot.terrain_correction {
            // Terrain diverged: rewind local edits to the confirmed tick,
            // then take the server's values exactly. No interpolation; the
            // client is being forcibly aligned.
            accumulator.revert_to_tick(grid, snapshot.confirmed_tick)?;
            for chunk in &snapshot.broadcast_edits {
                apply_corrections(grid, chunk);
            }
            for chunk in correction {
                apply_corrections(grid, chunk);
            }
        } else {
            // Only state diverged; broadcast edits apply as-is.
            for chunk in &snapshot.broadcast_edits {
                apply_corrections(grid, chunk);
            }
        }
        accumulator.prune_confirmed(snapshot.confirmed_tick);
    } else if !local.needs_correction {
        // Happy path: merge-and-interpolate. A clean snapshot also means any
        // earlier correction has been fully acknowledged.
        predictor.clear_correction_pending();
        interpolation.finish(grid);

        // Union of our own edits the server has not yet confirmed.
        let own = accumulator.merged_since(snapshot.confirmed_tick);
        let mut own_voxels: FxHashMap<ChunkCoord, FxHashSet<u16>> = FxHashMap::default();
        for chunk_edits in &own {
            if let Some(chunk) = grid.chunk_mut(chunk_edits.coord) {
                chunk.set_merge_marked(true);
            }
            own_voxels.insert(
                chunk_edits.coord,
                chunk_edits.edits.iter().map(|e| e.index).collect(),
            );
        }

        for chunk_corr in &snapshot.broadcast_edits {
            let marked = grid
                .chunk(chunk_corr.coord)
                .is_some_and(|c| c.merge_marked());
            for voxel_corr in &chunk_corr.corrections {
                if marked
                    && own_voxels
                        .get(&chunk_corr.coord)
                        .is_some_and(|set| set.contains(&voxel_corr.index))
                {
                    // Our own unconfirmed edit; keep the predicted value.
                    continue;
                }
                let Some(current) = grid.voxel(chunk_corr.coord, voxel_corr.index) else {
                    continue;
                };
                interpolation.stage(
                    chunk_corr.coord,
                    voxel_corr.index,
                    current.value,
                    Voxel {
                        value: voxel_corr.final_value,
                        color: voxel_corr.color,
                    },
                );
            }
        }

        for chunk_edits in &own {
            if let Some(chunk) = grid.chunk_mut(chunk_edits.coord) {
                chunk.set_merge_marked(false);
            }
        }
        accumulator.prune_confirmed(snapshot.confirmed_tick);
    } else {
        // needs_correction && server_waiting: the correction this refers to
        // was already processed; don't reprocess a stale correction path.
        tracing::debug!("snapshot flagged server_waiting; ignoring stale correction");
    }

    Ok(())
}

/// Writes one chunk's authoritative values, bypassing the history tracker.
fn apply_corrections(grid: &mut VoxelGrid, chunk: &ChunkCorrection) {
    for voxel_corr in &chunk.corrections {
        if grid
            .write(
                chunk.coord,
                voxel_corr.index,
                Voxel {
                    value: voxel_corr.final_value,
                    color: voxel_corr.color,
                },
            )
            .is_err()
        {
            tracing::warn!(
                "correction for unloaded chunk ({}, {}, {})",
                chunk.coord.x,
                chunk.coord.y,
                chunk.coord.z
            );
            return;
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
    use terracast_protocol::player::{PlayerClaim, PlayerSnapshot};
    use terracast_voxel::{Chunk, VoxelCorrection};

    const LOCAL_ID: u16 = 1;

    struct Harness {
        predictor: Predictor,
        accumulator: Accumulator,
        grid: VoxelGrid,
        interpolation: InterpolationQueue,
        remotes: RemotePlayers,
        events: EventBuffer<ClientEvent>,
    }

    impl Harness {
        fn new() -> Self {
            let mut grid = VoxelGrid::new();
            grid.load_chunk(ChunkCoord::new(0, 0, 0), Chunk::new());
            Self {
                predictor: Predictor::new(PlayerClaim::at_spawn(Vec3::ZERO), 2, 0),
                accumulator: Accumulator::new(16),
                grid,
                interpolation: InterpolationQueue::new(),
                remotes: RemotePlayers::new(),
                events: EventBuffer::new(),
            }
        }

        fn apply(&mut self, snapshot: &GameStateSnapshot) -> Result<(), SyncError> {
            handle_snapshot(
                LOCAL_ID,
                snapshot,
                &mut self.predictor,
                &mut self.accumulator,
                &mut self.grid,
                &mut self.interpolation,
                &mut self.remotes,
                &mut self.events,
            )
        }
    }

    fn local_player(needs_correction: bool, server_waiting: bool) -> PlayerSnapshot {
        PlayerSnapshot {
            client_id: LOCAL_ID,
            tick: 10,
            position: Vec3::new(1.0, 2.0, 3.0),
            view_dir: Vec3::Z,
            up: Vec3::Y,
            velocity: Vec3::ZERO,
            flags: 0,
            alive: true,
            health: 100.0,
            needs_correction,
            server_waiting,
        }
    }

    fn snapshot_with(players: Vec<PlayerSnapshot>) -> GameStateSnapshot {
        GameStateSnapshot {
            confirmed_tick: 0,
            players,
            broadcast_edits: Vec::new(),
            terrain_correction: None,
        }
    }

    #[test]
    fn test_happy_path_leaves_prediction_untouched() {
        let mut h = Harness::new();
        let before = *h.predictor.state();
        h.apply(&snapshot_with(vec![local_player(false, false)]))
            .unwrap();
        let after = *h.predictor.state();
        assert_eq!(before.position, after.position);
        assert_eq!(before.velocity, after.velocity);
        assert_eq!(before.view_dir, after.view_dir);
    }

    #[test]
    fn test_correction_path_snaps_to_server_truth() {
        let mut h = Harness::new();
        h.apply(&snapshot_with(vec![local_player(true, false)]))
            .unwrap();
        assert_eq!(h.predictor.state().position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_server_waiting_suppresses_reprocessing() {
        let mut h = Harness::new();
        let before = *h.predictor.state();
        h.apply(&snapshot_with(vec![local_player(true, true)]))
            .unwrap();
        assert_eq!(h.predictor.state().position, before.position);
    }

    #[test]
    fn test_death_event_on_server_reported_death() {
        let mut h = Harness::new();
        let mut dead = local_player(true, false);
        dead.alive = false;
        h.apply(&snapshot_with(vec![dead])).unwrap();
        assert!(
            h.events
                .read()
                .any(|e| matches!(e, ClientEvent::LocalPlayerDied))
        );
    }

    #[test]
    fn test_terrain_correction_reverts_then_applies() {
        let mut h = Harness::new();
        let coord = ChunkCoord::new(0, 0, 0);

        // Client predicted an edit at tick 5 the server will reject.
        h.grid.write_tracked(coord, 10, Voxel::new(200, 3)).unwrap();
        h.accumulator.accumulate(&mut h.grid, 5).unwrap();

        let mut snap = snapshot_with(vec![local_player(true, false)]);
        snap.confirmed_tick = 0;
        snap.terrain_correction = Some(vec![ChunkCorrection {
            coord,
            needs_correction: true,
            corrections: vec![VoxelCorrection {
                index: 10,
                final_value: 50,
                color: 9,
            }],
        }]);

        h.apply(&snap).unwrap();
        // Exact resync, no interpolation.
        assert_eq!(h.grid.voxel(coord, 10).unwrap(), Voxel::new(50, 9));
        assert!(h.interpolation.is_empty());
        assert!(h.accumulator.ring().is_empty());
    }

    #[test]
    fn test_happy_path_keeps_own_edits_stages_others() {
        let mut h = Harness::new();
        let coord = ChunkCoord::new(0, 0, 0);

        // Our own unconfirmed edit at voxel 10.
        h.grid.write_tracked(coord, 10, Voxel::new(120, 2)).unwrap();
        h.accumulator.accumulate(&mut h.grid, 5).unwrap();

        // Server broadcast touches voxel 10 (ours) and voxel 20 (someone
        // else's).
        let mut snap = snapshot_with(vec![local_player(false, false)]);
        snap.confirmed_tick = 2;
        snap.broadcast_edits = vec![ChunkCorrection {
            coord,
            needs_correction: false,
            corrections: vec![
                VoxelCorrection {
                    index: 10,
                    final_value: 120,
                    color: 2,
                },
                VoxelCorrection {
                    index: 20,
                    final_value: 80,
                    color: 4,
                },
            ],
        }];

        h.apply(&snap).unwrap();

        // Own voxel untouched and not staged; the other voxel is staged, not
        // snapped.
        assert_eq!(h.grid.voxel(coord, 10).unwrap(), Voxel::new(120, 2));
        assert_eq!(h.interpolation.len(), 1);
        assert_eq!(h.grid.voxel(coord, 20).unwrap().value, 0);

        // Merge flags were transient.
        assert!(!h.grid.chunk(coord).unwrap().merge_marked());
    }

    #[test]
    fn test_happy_path_prunes_confirmed_batches() {
        let mut h = Harness::new();
        let coord = ChunkCoord::new(0, 0, 0);
        h.grid.write_tracked(coord, 1, Voxel::new(10, 0)).unwrap();
        h.accumulator.accumulate(&mut h.grid, 3).unwrap();
        h.grid.write_tracked(coord, 2, Voxel::new(20, 0)).unwrap();
        h.accumulator.accumulate(&mut h.grid, 6).unwrap();

        let mut snap = snapshot_with(vec![local_player(false, false)]);
        snap.confirmed_tick = 4;
        h.apply(&snap).unwrap();

        assert_eq!(h.accumulator.ring().len(), 1);
        assert_eq!(h.accumulator.ring().oldest_tick(), Some(6));
    }

    #[test]
    fn test_remote_players_are_buffered_not_predicted() {
        let mut h = Harness::new();
        let mut remote = local_player(false, false);
        remote.client_id = 9;
        h.apply(&snapshot_with(vec![local_player(false, false), remote]))
            .unwrap();
        let poses = h.remotes.advance(0.5);
        assert_eq!(poses.len(), 1);
        assert_eq!(poses[0].0, 9);
    }
}
