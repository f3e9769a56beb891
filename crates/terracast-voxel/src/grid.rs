//! Chunk grid storage keyed by [`ChunkCoord`], using an
//! [`FxHashMap`](rustc_hash::FxHashMap) for fast coordinate hashing.
//!
//! The grid also maintains the set of chunks with a non-empty modification
//! history this epoch, so the accumulator can snapshot pending edits without
//! walking every loaded chunk.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::chunk::{CHUNK_SIZE, Chunk, Voxel};

// ---------------------------------------------------------------------------
// ChunkCoord
// ---------------------------------------------------------------------------

/// Grid coordinate of a chunk. World voxel position = `coord * 16 + local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    /// Grid X coordinate.
    pub x: i16,
    /// Grid Y coordinate.
    pub y: i16,
    /// Grid Z coordinate.
    pub z: i16,
}

impl ChunkCoord {
    /// Creates a coordinate.
    pub fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    /// Chunk coordinate containing the given world-space voxel position.
    pub fn containing(wx: i32, wy: i32, wz: i32) -> Self {
        Self {
            x: wx.div_euclid(CHUNK_SIZE as i32) as i16,
            y: wy.div_euclid(CHUNK_SIZE as i32) as i16,
            z: wz.div_euclid(CHUNK_SIZE as i32) as i16,
        }
    }

    /// World-space position of this chunk's origin voxel.
    pub fn world_origin(self) -> (i32, i32, i32) {
        (
            self.x as i32 * CHUNK_SIZE as i32,
            self.y as i32 * CHUNK_SIZE as i32,
            self.z as i32 * CHUNK_SIZE as i32,
        )
    }
}

/// Errors raised by grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// The addressed chunk is not loaded.
    #[error("chunk ({0}, {1}, {2}) is not loaded")]
    ChunkNotLoaded(i16, i16, i16),
}

// ---------------------------------------------------------------------------
// VoxelGrid
// ---------------------------------------------------------------------------

/// All loaded chunks plus the touched-this-epoch set.
#[derive(Debug, Default)]
pub struct VoxelGrid {
    chunks: FxHashMap<ChunkCoord, Chunk>,
    /// Chunks with a non-empty history this epoch.
    touched: FxHashSet<ChunkCoord>,
}

impl VoxelGrid {
    /// Creates an empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads (or replaces) a chunk at the given coordinate.
    pub fn load_chunk(&mut self, coord: ChunkCoord, chunk: Chunk) {
        self.chunks.insert(coord, chunk);
    }

    /// Unloads a chunk, returning it if present.
    pub fn unload_chunk(&mut self, coord: ChunkCoord) -> Option<Chunk> {
        self.touched.remove(&coord);
        self.chunks.remove(&coord)
    }

    /// Returns a reference to the chunk at `coord`.
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    /// Returns a mutable reference to the chunk at `coord`.
    ///
    /// History-tracked writes made through this reference bypass the grid's
    /// touched set; prefer [`VoxelGrid::write_tracked`].
    pub fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    /// Number of loaded chunks.
    pub fn loaded_count(&self) -> usize {
        self.chunks.len()
    }

    /// Iterates over all loaded chunks.
    pub fn iter(&self) -> impl Iterator<Item = (&ChunkCoord, &Chunk)> {
        self.chunks.iter()
    }

    /// Reads a voxel, if the chunk is loaded.
    pub fn voxel(&self, coord: ChunkCoord, index: u16) -> Option<Voxel> {
        self.chunks.get(&coord).map(|c| c.get(index))
    }

    /// Writes a voxel through the chunk's history tracker and records the
    /// chunk in the touched set.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ChunkNotLoaded`] if the chunk is absent.
    pub fn write_tracked(
        &mut self,
        coord: ChunkCoord,
        index: u16,
        voxel: Voxel,
    ) -> Result<(), GridError> {
        let chunk = self
            .chunks
            .get_mut(&coord)
            .ok_or(GridError::ChunkNotLoaded(coord.x, coord.y, coord.z))?;
        chunk.write_tracked(index, voxel);
        self.touched.insert(coord);
        Ok(())
    }

    /// Writes a voxel **without** history tracking (server-confirmed values).
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ChunkNotLoaded`] if the chunk is absent.
    pub fn write(&mut self, coord: ChunkCoord, index: u16, voxel: Voxel) -> Result<(), GridError> {
        let chunk = self
            .chunks
            .get_mut(&coord)
            .ok_or(GridError::ChunkNotLoaded(coord.x, coord.y, coord.z))?;
        chunk.write(index, voxel);
        Ok(())
    }

    /// Coordinates of chunks touched this epoch, in unspecified order.
    pub fn touched_chunks(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.touched.iter().copied()
    }

    /// Returns `true` if any chunk has pending edits this epoch.
    pub fn has_touched_chunks(&self) -> bool {
        !self.touched.is_empty()
    }

    /// Drains the touched set, returning the coordinates it held.
    pub fn take_touched(&mut self) -> Vec<ChunkCoord> {
        self.touched.drain().collect()
    }

    /// Chunks whose mesh needs rebuilding, for the render side.
    pub fn iter_remesh(&self) -> impl Iterator<Item = &ChunkCoord> {
        self.chunks
            .iter()
            .filter(|(_, c)| c.needs_remesh())
            .map(|(coord, _)| coord)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_containing_negative_coordinates() {
        assert_eq!(ChunkCoord::containing(0, 0, 0), ChunkCoord::new(0, 0, 0));
        assert_eq!(ChunkCoord::containing(15, 0, 0), ChunkCoord::new(0, 0, 0));
        assert_eq!(ChunkCoord::containing(16, 0, 0), ChunkCoord::new(1, 0, 0));
        assert_eq!(
            ChunkCoord::containing(-1, -16, -17),
            ChunkCoord::new(-1, -1, -2)
        );
    }

    #[test]
    fn test_tracked_write_marks_chunk_touched() {
        let mut grid = VoxelGrid::new();
        let coord = ChunkCoord::new(0, 0, 0);
        grid.load_chunk(coord, Chunk::new());

        grid.write_tracked(coord, 10, Voxel::new(80, 1)).unwrap();
        assert!(grid.has_touched_chunks());
        assert_eq!(grid.take_touched(), vec![coord]);
        assert!(!grid.has_touched_chunks());
    }

    #[test]
    fn test_write_to_unloaded_chunk_errors() {
        let mut grid = VoxelGrid::new();
        let err = grid
            .write_tracked(ChunkCoord::new(9, 9, 9), 0, Voxel::EMPTY)
            .unwrap_err();
        assert_eq!(err, GridError::ChunkNotLoaded(9, 9, 9));
    }

    #[test]
    fn test_untracked_write_does_not_touch() {
        let mut grid = VoxelGrid::new();
        let coord = ChunkCoord::new(0, 0, 0);
        grid.load_chunk(coord, Chunk::new());
        grid.write(coord, 0, Voxel::new(5, 0)).unwrap();
        assert!(!grid.has_touched_chunks());
    }

    #[test]
    fn test_unload_clears_touched_entry() {
        let mut grid = VoxelGrid::new();
        let coord = ChunkCoord::new(2, 0, 0);
        grid.load_chunk(coord, Chunk::new());
        grid.write_tracked(coord, 1, Voxel::new(9, 0)).unwrap();
        grid.unload_chunk(coord);
        assert!(!grid.has_touched_chunks());
    }
}
