//! Bulk world transfer: split the loaded world across datagrams and drip a
//! few packets per tick.
//!
//! The per-packet chunk count comes from the worst-case encoded chunk size,
//! so any mix of chunk contents fits one datagram. The receiver knows the
//! expected total from the handshake and treats the transfer as complete only
//! once its running count matches.

use std::collections::VecDeque;

use terracast_protocol::codec::MAX_DATAGRAM_BYTES;
use terracast_protocol::packets::Payload;
use terracast_protocol::voxel_rle::{EncodedChunk, MAX_ENCODED_CHUNK_BYTES};
use terracast_voxel::VoxelGrid;

/// Conservative per-chunk envelope overhead (coord, flags, length prefix).
const CHUNK_ENTRY_OVERHEAD: usize = 16;

/// Conservative header + framing overhead per packet.
const PACKET_OVERHEAD: usize = 64;

/// Default number of transfer packets sent per tick.
pub const DEFAULT_PACKETS_PER_TICK: usize = 2;

/// Chunks guaranteed to fit one datagram even at worst-case encoding.
pub fn max_chunks_per_packet() -> usize {
    (MAX_DATAGRAM_BYTES - PACKET_OVERHEAD) / (MAX_ENCODED_CHUNK_BYTES + CHUNK_ENTRY_OVERHEAD)
}

/// One client's in-progress world transfer.
#[derive(Debug)]
pub struct WorldTransfer {
    batches: VecDeque<Vec<EncodedChunk>>,
    packets_per_tick: usize,
    total_chunks: u32,
}

impl WorldTransfer {
    /// Encodes the whole grid and splits it into per-datagram batches.
    pub fn new(grid: &VoxelGrid, packets_per_tick: usize) -> Self {
        let per_packet = max_chunks_per_packet().max(1);
        let mut all: Vec<EncodedChunk> = grid
            .iter()
            .map(|(coord, chunk)| EncodedChunk::from_chunk(*coord, chunk))
            .collect();
        all.sort_unstable_by_key(|e| (e.coord.x, e.coord.y, e.coord.z));
        let total_chunks = all.len() as u32;

        let mut batches = VecDeque::new();
        while !all.is_empty() {
            let take = all.len().min(per_packet);
            batches.push_back(all.drain(..take).collect());
        }

        Self {
            batches,
            packets_per_tick: packets_per_tick.max(1),
            total_chunks,
        }
    }

    /// Returns up to `packets_per_tick` payloads for this tick.
    pub fn next_payloads(&mut self) -> Vec<Payload> {
        let mut out = Vec::new();
        for _ in 0..self.packets_per_tick {
            let Some(chunks) = self.batches.pop_front() else {
                break;
            };
            out.push(Payload::ChunkVoxels { chunks });
        }
        out
    }

    /// Returns `true` once every batch has been handed out.
    pub fn is_complete(&self) -> bool {
        self.batches.is_empty()
    }

    /// Total chunks in the transfer (announced in the handshake).
    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    /// Packets still queued.
    pub fn packets_remaining(&self) -> usize {
        self.batches.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
