//! Dense voxel storage for 16×16×16 terrain chunks.
//!
//! Terraforming stores a continuous density per voxel, so chunks keep a flat
//! `[Voxel; 4096]` array rather than a palette. Each chunk carries dirty flags
//! read by downstream systems (meshing, replication) and a version counter
//! incremented on every mutation.

use serde::{Deserialize, Serialize};

use crate::history::ChunkHistory;

/// Side length of a chunk in voxels.
pub const CHUNK_SIZE: usize = 16;

/// Total number of voxels in a chunk (16³).
pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

/// Maximum legal voxel density. The value `255` is reserved as the wire
/// sentinel that introduces a zero run in the chunk codec.
pub const MAX_DENSITY: u8 = 254;

// ---------------------------------------------------------------------------
// Voxel
// ---------------------------------------------------------------------------

/// A single terrain voxel: surface density plus a palette color index.
///
/// Density `0` is empty space; `1..=254` is increasingly solid terrain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Voxel {
    /// Surface density in `0..=254`.
    pub value: u8,
    /// Palette color index used by the mesher.
    pub color: u8,
}

impl Voxel {
    /// The empty voxel (zero density, color 0).
    pub const EMPTY: Self = Self { value: 0, color: 0 };

    /// Creates a voxel, clamping the density to [`MAX_DENSITY`].
    pub fn new(value: u8, color: u8) -> Self {
        Self {
            value: value.min(MAX_DENSITY),
            color,
        }
    }

    /// Returns `true` if this voxel is empty space.
    pub fn is_empty(self) -> bool {
        self.value == 0
    }
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// A 16³ voxel volume with its modification-history sidecar and dirty flags.
///
/// Voxel indices are linear in `0..4096`; use [`Chunk::linear_index`] to map
/// `(x, y, z)` local coordinates. Out-of-bounds reads return the empty voxel
/// and out-of-bounds writes are ignored with a warning, matching the chunk
/// API used by the render side.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Flat voxel array, `x * 256 + y * 16 + z` indexing.
    voxels: Box<[Voxel; CHUNK_VOLUME]>,
    /// First-touch capture of initial values for the current tracking epoch.
    history: ChunkHistory,
    /// Mesh needs rebuilding; read and cleared by the render side.
    needs_remesh: bool,
    /// Scratch flag set while a merge pass walks this chunk's edit set.
    merge_marked: bool,
    /// Monotonically increasing mutation counter.
    version: u64,
}

impl Chunk {
    /// Creates an empty chunk (all voxels zero density).
    pub fn new() -> Self {
        Self {
            voxels: Box::new([Voxel::EMPTY; CHUNK_VOLUME]),
            history: ChunkHistory::new(),
            needs_remesh: false,
            merge_marked: false,
            version: 0,
        }
    }

    /// Creates a chunk filled with the given voxel.
    pub fn new_filled(fill: Voxel) -> Self {
        Self {
            voxels: Box::new([fill; CHUNK_VOLUME]),
            ..Self::new()
        }
    }

    /// Creates a chunk from a full voxel array, e.g. a decoded world
    /// transfer. Returns `None` unless exactly [`CHUNK_VOLUME`] voxels are
    /// given.
    pub fn from_voxels(voxels: &[Voxel]) -> Option<Self> {
        let mut chunk = Self::new();
        if voxels.len() != CHUNK_VOLUME {
            return None;
        }
        chunk.voxels.copy_from_slice(voxels);
        chunk.needs_remesh = true;
        Some(chunk)
    }

    /// Maps local `(x, y, z)` coordinates (each in `0..16`) to a linear index.
    pub fn linear_index(x: usize, y: usize, z: usize) -> u16 {
        (x * CHUNK_SIZE * CHUNK_SIZE + y * CHUNK_SIZE + z) as u16
    }

    /// Returns the voxel at the given linear index.
    ///
    /// Returns [`Voxel::EMPTY`] if the index is out of bounds.
    pub fn get(&self, index: u16) -> Voxel {
        let Some(v) = self.voxels.get(index as usize) else {
            tracing::warn!("Chunk::get out of bounds: {index}");
            return Voxel::EMPTY;
        };
        *v
    }

    /// Writes a voxel **without** recording history.
    ///
    /// Used for server-confirmed values (corrections, interpolation targets)
    /// that must not re-enter the client's own edit reports. No-op with a
    /// warning if the index is out of bounds.
    pub fn write(&mut self, index: u16, voxel: Voxel) {
        let Some(slot) = self.voxels.get_mut(index as usize) else {
            tracing::warn!("Chunk::write out of bounds: {index}");
            return;
        };
        *slot = voxel;
        self.needs_remesh = true;
        self.version += 1;
    }

    /// Returns a read-only view of the whole voxel array.
    pub fn voxels(&self) -> &[Voxel; CHUNK_VOLUME] {
        &self.voxels
    }

    /// Returns the history sidecar.
    pub fn history(&self) -> &ChunkHistory {
        &self.history
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut [Voxel; CHUNK_VOLUME], &mut ChunkHistory) {
        (&mut self.voxels, &mut self.history)
    }

    /// Returns `true` if the mesh needs rebuilding.
    pub fn needs_remesh(&self) -> bool {
        self.needs_remesh
    }

    /// Clears the remesh flag; called by the render side after rebuilding.
    pub fn clear_remesh(&mut self) {
        self.needs_remesh = false;
    }

    pub(crate) fn set_remesh(&mut self) {
        self.needs_remesh = true;
    }

    /// Returns `true` if a merge pass has marked this chunk.
    pub fn merge_marked(&self) -> bool {
        self.merge_marked
    }

    /// Sets or clears the merge scratch flag.
    pub fn set_merge_marked(&mut self, marked: bool) {
        self.merge_marked = marked;
    }

    /// Returns the mutation counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
