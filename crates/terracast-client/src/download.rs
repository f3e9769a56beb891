//! World bulk-transfer receiver.
//!
//! The handshake announces how many chunks the server will deliver; the
//! server drips `ChunkVoxels` packets over several ticks. The download is
//! complete only once the running chunk total equals the announced count;
//! packet order does not matter.

use terracast_protocol::voxel_rle::{EncodedChunk, RleError};
use terracast_voxel::{Chunk, VoxelGrid};

/// Tracks an in-progress world download.
#[derive(Debug)]
pub struct WorldDownload {
    expected: u32,
    received: u32,
}

impl WorldDownload {
    /// Starts a download expecting the handshake-announced chunk count.
    pub fn new(expected: u32) -> Self {
        Self {
            expected,
            received: 0,
        }
    }

    /// Decodes a batch of chunks into the grid. Returns `true` once the
    /// running total reaches the announced count.
    ///
    /// # Errors
    ///
    /// Returns [`RleError`] if a chunk body fails to decode; the batch is
    /// abandoned mid-way and the counts reflect only the chunks applied.
    pub fn apply(&mut self, chunks: &[EncodedChunk], grid: &mut VoxelGrid) -> Result<bool, RleError> {
        for encoded in chunks {
            let voxels = encoded.decode()?;
            let Some(chunk) = Chunk::from_voxels(&voxels) else {
                return Err(RleError::LengthMismatch {
                    expected: terracast_voxel::CHUNK_VOLUME,
                    actual: voxels.len(),
                });
            };
            grid.load_chunk(encoded.coord, chunk);
            self.received += 1;
        }
        tracing::debug!("world download {}/{} chunks", self.received, self.expected);
        Ok(self.is_complete())
    }

    /// Returns `true` once every announced chunk has arrived.
    pub fn is_complete(&self) -> bool {
        self.received >= self.expected
    }

    /// Chunks applied so far.
    pub fn received(&self) -> u32 {
        self.received
    }

    /// Chunks announced by the handshake.
    pub fn expected(&self) -> u32 {
        self.expected
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
