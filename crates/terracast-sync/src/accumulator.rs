//! Epoch snapshotting and revert-to-tick rollback over the edit ring.
//!
//! The accumulator owns copies of edit sets, never chunk references, so a
//! retained batch stays valid even if its chunk is later unloaded and
//! rebuilt.

use terracast_voxel::{ChunkEdits, EditError, TickEdits, Voxel, VoxelGrid};

use crate::merge::merge_edits;
use crate::ring::{EditRing, RingError};

/// Errors raised by accumulator operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// A chunk's epoch exceeded the per-report edit capacity.
    #[error(transparent)]
    Edit(#[from] EditError),
    /// The edit ring rejected the operation.
    #[error(transparent)]
    Ring(#[from] RingError),
}

/// Tick-stamped accumulation of unconfirmed terraform edits.
#[derive(Debug)]
pub struct Accumulator {
    ring: EditRing,
    /// Newest tick confirmed by the server; rollback cannot go below this.
    confirmed_tick: u64,
}

impl Accumulator {
    /// Creates an accumulator with the given ring capacity.
    pub fn new(ring_capacity: usize) -> Self {
        Self {
            ring: EditRing::new(ring_capacity),
            confirmed_tick: 0,
        }
    }

    /// Snapshots every chunk touched this epoch into a new batch stamped with
    /// `tick`, pushes it onto the ring, and resets the touched chunks'
    /// epochs. Returns `None` (and pushes nothing) if no voxel changed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if a chunk exceeded the per-report edit capacity
    /// or the ring is full. The grid's epoch state is left unreset so the
    /// caller can retry after pruning.
    pub fn accumulate(
        &mut self,
        grid: &mut VoxelGrid,
        tick: u64,
    ) -> Result<Option<TickEdits>, SyncError> {
        if !grid.has_touched_chunks() {
            return Ok(None);
        }

        let mut coords: Vec<_> = grid.touched_chunks().collect();
        coords.sort_unstable_by_key(|c| (c.x, c.y, c.z));

        let mut chunks = Vec::with_capacity(coords.len());
        for coord in &coords {
            let Some(chunk) = grid.chunk(*coord) else {
                continue;
            };
            let edits = chunk.collect_edits()?;
            if !edits.is_empty() {
                chunks.push(ChunkEdits {
                    coord: *coord,
                    edits,
                });
            }
        }

        if chunks.is_empty() {
            grid.take_touched();
            return Ok(None);
        }

        let batch = TickEdits { tick, chunks };
        self.ring.push(batch.clone())?;

        for coord in grid.take_touched() {
            if let Some(chunk) = grid.chunk_mut(coord) {
                chunk.reset_epoch();
            }
        }
        Ok(Some(batch))
    }

    /// Rolls the grid back to its state as of `target`: pops batches newest
    /// first and restores every voxel's `final → initial`, stopping *before*
    /// reverting the batch stamped `target` (exclusive on the old side,
    /// inclusive on the new).
    ///
    /// # Errors
    ///
    /// Returns [`RingError::TickUnreachable`] if `target` is older than the
    /// newest already-confirmed tick; the ring no longer covers that state.
    pub fn revert_to_tick(&mut self, grid: &mut VoxelGrid, target: u64) -> Result<(), SyncError> {
        if target < self.confirmed_tick {
            return Err(SyncError::Ring(RingError::TickUnreachable {
                target,
                floor: self.confirmed_tick,
            }));
        }

        while self.ring.newest_tick().is_some_and(|t| t > target) {
            let Some(batch) = self.ring.pop_newest() else {
                break;
            };
            for chunk_edits in &batch.chunks {
                for edit in &chunk_edits.edits {
                    let Some(current) = grid.voxel(chunk_edits.coord, edit.index) else {
                        tracing::warn!(
                            "revert skipped unloaded chunk ({}, {}, {})",
                            chunk_edits.coord.x,
                            chunk_edits.coord.y,
                            chunk_edits.coord.z
                        );
                        break;
                    };
                    let restored = Voxel {
                        value: edit.initial_value,
                        color: current.color,
                    };
                    let _ = grid.write(chunk_edits.coord, edit.index, restored);
                }
            }
        }
        Ok(())
    }

    /// Drops every retained batch with `tick <= confirmed` and raises the
    /// rollback floor.
    pub fn prune_confirmed(&mut self, confirmed: u64) {
        self.confirmed_tick = self.confirmed_tick.max(confirmed);
        self.ring.prune_confirmed(confirmed);
    }

    /// Newest tick the server has confirmed.
    pub fn confirmed_tick(&self) -> u64 {
        self.confirmed_tick
    }

    /// Union of all retained edits newer than `after`, oldest batch first.
    pub fn merged_since(&self, after: u64) -> Vec<ChunkEdits> {
        let mut merged = Vec::new();
        for batch in self.ring.iter_newer_than(after) {
            merge_edits(&mut merged, &batch.chunks);
        }
        merged
    }

    /// The underlying ring.
    pub fn ring(&self) -> &EditRing {
        &self.ring
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
