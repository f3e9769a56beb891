//! Edit-set types exchanged between predictor, accumulator, and wire.
//!
//! Two directional shapes exist for a modified voxel. The client→server
//! report ([`VoxelEdit`]) carries the true initial value so the server can
//! verify the claimed delta; the server→client correction
//! ([`VoxelCorrection`]) carries only the authoritative final value and its
//! display color, since the client realigns exactly.

use serde::{Deserialize, Serialize};

use crate::grid::ChunkCoord;

/// Maximum voxel edits a single chunk may report per epoch.
pub const MAX_EDITS_PER_CHUNK: usize = 512;

/// Errors raised while assembling edit sets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    /// A chunk's epoch touched more voxels than one report may carry.
    #[error("chunk epoch touched {count} voxels, report capacity is {max}")]
    CapacityExceeded {
        /// Voxels touched this epoch.
        count: usize,
        /// Report capacity ([`MAX_EDITS_PER_CHUNK`]).
        max: usize,
    },
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// A single predicted voxel change, as reported by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoxelEdit {
    /// Linear voxel index within the chunk (`0..4096`).
    pub index: u16,
    /// Density before any edit this epoch, for server verification and
    /// client rollback.
    pub initial_value: u8,
    /// Density after the last edit this epoch.
    pub final_value: u8,
    /// Palette color the client painted.
    pub color: u8,
}

/// All of one chunk's reported edits for an epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkEdits {
    /// Which chunk the edits belong to.
    pub coord: ChunkCoord,
    /// Per-voxel edits, capacity-bounded by [`MAX_EDITS_PER_CHUNK`].
    pub edits: Vec<VoxelEdit>,
}

/// A tick-stamped batch of chunk edits: everything known to have changed as
/// of `tick`, not yet confirmed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEdits {
    /// Prediction tick the batch was accumulated at.
    pub tick: u64,
    /// Edited chunks.
    pub chunks: Vec<ChunkEdits>,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// An authoritative voxel value pushed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoxelCorrection {
    /// Linear voxel index within the chunk (`0..4096`).
    pub index: u16,
    /// Authoritative density.
    pub final_value: u8,
    /// Display color for the mesher.
    pub color: u8,
}

/// One chunk's worth of authoritative voxel values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkCorrection {
    /// Which chunk the values belong to.
    pub coord: ChunkCoord,
    /// `true` if the server found the client's claim for this chunk wrong;
    /// such chunks are resynced exactly, never interpolated.
    pub needs_correction: bool,
    /// Authoritative per-voxel values.
    pub corrections: Vec<VoxelCorrection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_edits_serde_roundtrip() {
        let batch = TickEdits {
            tick: 42,
            chunks: vec![ChunkEdits {
                coord: ChunkCoord::new(1, -2, 3),
                edits: vec![VoxelEdit {
                    index: 10,
                    initial_value: 0,
                    final_value: 120,
                    color: 4,
                }],
            }],
        };
        let text = serde_json::to_string(&batch).unwrap();
        let decoded: TickEdits = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, batch);
    }
}
