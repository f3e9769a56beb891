//! First-touch modification history for terraform rollback.
//!
//! Every chunk owns a [`ChunkHistory`] sidecar that captures each voxel's
//! value the *first* time it is written within a tracking epoch (the interval
//! between two edit reports). Repeat writes to the same voxel do not touch the
//! capture, so an epoch collapses any edit sequence into a single
//! `initial → final` pair per voxel. The accumulator resets the epoch once it
//! has snapshotted the pending edits.

use crate::chunk::{CHUNK_VOLUME, Chunk, Voxel};
use crate::edits::{EditError, MAX_EDITS_PER_CHUNK, VoxelCorrection, VoxelEdit};

/// Sentinel marking a pool slot as "not captured this epoch".
///
/// Legal densities are capped at 254, so `0xFF` can never collide with a
/// captured value.
pub const HISTORY_UNSET: u8 = 0xFF;

// ---------------------------------------------------------------------------
// ChunkHistory
// ---------------------------------------------------------------------------

/// Per-chunk capture of voxel initial values within the current epoch.
#[derive(Debug, Clone)]
pub struct ChunkHistory {
    /// Captured initial density per voxel; [`HISTORY_UNSET`] when untouched.
    initial_values: Box<[u8; CHUNK_VOLUME]>,
    /// Linear indices of voxels touched this epoch, in first-touch order.
    touched: Vec<u16>,
}

impl ChunkHistory {
    /// Creates an empty history (nothing captured).
    pub fn new() -> Self {
        Self {
            initial_values: Box::new([HISTORY_UNSET; CHUNK_VOLUME]),
            touched: Vec::new(),
        }
    }

    /// Captures `current` as the initial value for `index` on first touch.
    /// Idempotent for repeat touches within the same epoch.
    pub fn record(&mut self, index: u16, current: u8) {
        let slot = &mut self.initial_values[index as usize];
        if *slot == HISTORY_UNSET {
            *slot = current;
            self.touched.push(index);
        }
    }

    /// Returns the captured initial value for `index`, if touched this epoch.
    pub fn initial(&self, index: u16) -> Option<u8> {
        let v = self.initial_values[index as usize];
        (v != HISTORY_UNSET).then_some(v)
    }

    /// Linear indices touched this epoch, in first-touch order.
    pub fn touched(&self) -> &[u16] {
        &self.touched
    }

    /// Returns `true` if no voxel has been touched this epoch.
    pub fn is_empty(&self) -> bool {
        self.touched.is_empty()
    }

    /// Clears the capture back to the unset sentinel and empties the stack.
    pub fn reset_epoch(&mut self) {
        for &index in &self.touched {
            self.initial_values[index as usize] = HISTORY_UNSET;
        }
        self.touched.clear();
    }
}

impl Default for ChunkHistory {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tracked chunk access
// ---------------------------------------------------------------------------

impl Chunk {
    /// Writes a voxel through the history tracker, making the edit
    /// rollback-capable. The first write per epoch captures the prior value.
    ///
    /// No-op with a warning if the index is out of bounds.
    pub fn write_tracked(&mut self, index: u16, voxel: Voxel) {
        if index as usize >= CHUNK_VOLUME {
            tracing::warn!("Chunk::write_tracked out of bounds: {index}");
            return;
        }
        let (voxels, history) = self.parts_mut();
        history.record(index, voxels[index as usize].value);
        voxels[index as usize] = voxel;
        self.set_remesh();
        self.bump_version();
    }

    /// Returns `true` if this chunk has unreported edits in the current epoch.
    pub fn has_pending_edits(&self) -> bool {
        !self.history().is_empty()
    }

    /// Client view of the epoch capture: one [`VoxelEdit`] per touched voxel
    /// carrying the true initial value for server verification.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::CapacityExceeded`] if the epoch touched more than
    /// [`MAX_EDITS_PER_CHUNK`] voxels.
    pub fn collect_edits(&self) -> Result<Vec<VoxelEdit>, EditError> {
        let history = self.history();
        if history.touched().len() > MAX_EDITS_PER_CHUNK {
            return Err(EditError::CapacityExceeded {
                count: history.touched().len(),
                max: MAX_EDITS_PER_CHUNK,
            });
        }
        Ok(history
            .touched()
            .iter()
            .map(|&index| {
                let voxel = self.get(index);
                VoxelEdit {
                    index,
                    initial_value: history.initial(index).unwrap_or(voxel.value),
                    final_value: voxel.value,
                    color: voxel.color,
                }
            })
            .collect())
    }

    /// Server view of the epoch capture: one [`VoxelCorrection`] per touched
    /// voxel carrying the current color. The initial value is implicit on the
    /// authoritative side and is not sent.
    pub fn collect_corrections(&self) -> Vec<VoxelCorrection> {
        self.history()
            .touched()
            .iter()
            .map(|&index| {
                let voxel = self.get(index);
                VoxelCorrection {
                    index,
                    final_value: voxel.value,
                    color: voxel.color,
                }
            })
            .collect()
    }

    /// Clears the epoch capture. Called once per report/snapshot interval
    /// after the pending edits have been snapshotted.
    pub fn reset_epoch(&mut self) {
        let (_, history) = self.parts_mut();
        history.reset_epoch();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
