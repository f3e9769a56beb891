//! Voxel data model for terraformable terrain: dense 16³ chunks, first-touch
//! modification history, chunk grid storage, and the edit-set types that flow
//! between client and server.

pub mod brush;
pub mod chunk;
pub mod edits;
pub mod grid;
pub mod history;

pub use brush::{BrushOp, BrushStroke};
pub use chunk::{CHUNK_SIZE, CHUNK_VOLUME, Chunk, MAX_DENSITY, Voxel};
pub use edits::{
    ChunkCorrection, ChunkEdits, EditError, MAX_EDITS_PER_CHUNK, TickEdits, VoxelCorrection,
    VoxelEdit,
};
pub use grid::{ChunkCoord, GridError, VoxelGrid};
pub use history::{ChunkHistory, HISTORY_UNSET};
