//! Zero-run compression for bulk chunk voxel payloads.
//!
//! Terrain chunks are mostly empty space, so the codec targets runs of
//! zero-density voxels. Wire format, per voxel:
//!
//! ```text
//! non-empty voxel        → (value, color)        2 bytes, value in 1..=254
//! zero run, length <= 3  → (0, color) per voxel  2 bytes each
//! zero run, length >= 4  → 255 255 count:u32 LE  6 bytes total
//! all 4096 voxels zero   → body omitted entirely (uniform_empty flag)
//! ```
//!
//! `255` is reserved as the run sentinel and is never a legal density.
//! Voxels inside a sentinel run decode with color 0; empty space carries no
//! meaningful color.

use serde::{Deserialize, Serialize};

use terracast_voxel::{CHUNK_VOLUME, Chunk, ChunkCoord, Voxel};

/// Sentinel byte introducing a zero run.
pub const RUN_SENTINEL: u8 = 255;

/// Minimum zero-run length encoded with the sentinel form.
pub const MIN_SENTINEL_RUN: usize = 4;

/// Worst-case encoded body size: every voxel a literal pair.
pub const MAX_ENCODED_CHUNK_BYTES: usize = CHUNK_VOLUME * 2;

/// Errors raised by the chunk voxel codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RleError {
    /// The body ended mid-pair or mid-run.
    #[error("encoded body truncated at byte {offset}")]
    Truncated {
        /// Byte offset where decoding stopped.
        offset: usize,
    },
    /// Decoding produced the wrong number of voxels.
    #[error("decoded {actual} voxels, expected {expected}")]
    LengthMismatch {
        /// Expected voxel count.
        expected: usize,
        /// Actual decoded count.
        actual: usize,
    },
}

// ---------------------------------------------------------------------------
// EncodedChunk
// ---------------------------------------------------------------------------

/// One chunk's compressed voxel payload within a [`ChunkVoxels`] packet.
///
/// [`ChunkVoxels`]: crate::packets::Payload::ChunkVoxels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedChunk {
    /// Which chunk this body belongs to.
    pub coord: ChunkCoord,
    /// `true` if every voxel is zero; the body is omitted.
    pub uniform_empty: bool,
    /// Zero-run-encoded voxel pairs; empty when `uniform_empty`.
    pub body: Vec<u8>,
}

impl EncodedChunk {
    /// Encodes a chunk's voxels.
    pub fn from_chunk(coord: ChunkCoord, chunk: &Chunk) -> Self {
        let (uniform_empty, body) = encode_voxels(chunk.voxels());
        Self {
            coord,
            uniform_empty,
            body,
        }
    }

    /// Upper bound on this entry's wire footprint, for packet budgeting.
    pub fn wire_size(&self) -> usize {
        // coord + flag + length varint, then the body.
        8 + self.body.len()
    }

    /// Decodes the body back into a voxel array.
    ///
    /// # Errors
    ///
    /// Returns [`RleError`] if the body is malformed or does not decode to
    /// exactly [`CHUNK_VOLUME`] voxels.
    pub fn decode(&self) -> Result<Vec<Voxel>, RleError> {
        decode_voxels(self.uniform_empty, &self.body)
    }
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Encodes a voxel array. Returns `(uniform_empty, body)`.
pub fn encode_voxels(voxels: &[Voxel]) -> (bool, Vec<u8>) {
    if voxels.iter().all(|v| v.value == 0) {
        return (true, Vec::new());
    }

    let mut body = Vec::new();
    let mut i = 0;
    while i < voxels.len() {
        let voxel = voxels[i];
        if voxel.value == 0 {
            let mut run = 1;
            while i + run < voxels.len() && voxels[i + run].value == 0 {
                run += 1;
            }
            if run >= MIN_SENTINEL_RUN {
                body.push(RUN_SENTINEL);
                body.push(RUN_SENTINEL);
                body.extend_from_slice(&(run as u32).to_le_bytes());
            } else {
                for v in &voxels[i..i + run] {
                    body.push(0);
                    body.push(v.color);
                }
            }
            i += run;
        } else {
            body.push(voxel.value);
            body.push(voxel.color);
            i += 1;
        }
    }
    (false, body)
}

/// Decodes an encoded body into exactly [`CHUNK_VOLUME`] voxels.
///
/// # Errors
///
/// Returns [`RleError`] on truncated input, a reserved density byte in a
/// literal position, or a length mismatch.
pub fn decode_voxels(uniform_empty: bool, body: &[u8]) -> Result<Vec<Voxel>, RleError> {
    if uniform_empty {
        return Ok(vec![Voxel::EMPTY; CHUNK_VOLUME]);
    }

    let mut voxels = Vec::with_capacity(CHUNK_VOLUME);
    let mut offset = 0;
    while offset < body.len() {
        let value = body[offset];
        if value == RUN_SENTINEL {
            if body.len() < offset + 6 || body[offset + 1] != RUN_SENTINEL {
                return Err(RleError::Truncated { offset });
            }
            let count = u32::from_le_bytes([
                body[offset + 2],
                body[offset + 3],
                body[offset + 4],
                body[offset + 5],
            ]) as usize;
            if voxels.len() + count > CHUNK_VOLUME {
                return Err(RleError::LengthMismatch {
                    expected: CHUNK_VOLUME,
                    actual: voxels.len() + count,
                });
            }
            voxels.extend(std::iter::repeat_n(Voxel::EMPTY, count));
            offset += 6;
        } else {
            let Some(&color) = body.get(offset + 1) else {
                return Err(RleError::Truncated { offset });
            };
            voxels.push(Voxel { value, color });
            offset += 2;
        }
    }

    if voxels.len() != CHUNK_VOLUME {
        return Err(RleError::LengthMismatch {
            expected: CHUNK_VOLUME,
            actual: voxels.len(),
        });
    }
    Ok(voxels)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_chunk() -> Vec<Voxel> {
        vec![Voxel::new(100, 3); CHUNK_VOLUME]
    }

    fn roundtrip(voxels: &[Voxel]) -> Vec<Voxel> {
        let (uniform_empty, body) = encode_voxels(voxels);
        decode_voxels(uniform_empty, &body).unwrap()
    }

    #[test]
    fn test_roundtrip_no_zero_run() {
        let voxels = solid_chunk();
        assert_eq!(roundtrip(&voxels), voxels);
    }

    #[test]
    fn test_roundtrip_zero_run_of_three_stays_literal() {
        let mut voxels = solid_chunk();
        for v in &mut voxels[10..13] {
            *v = Voxel::EMPTY;
        }
        let (uniform_empty, body) = encode_voxels(&voxels);
        assert!(!uniform_empty);
        // 3 zeros stay literal pairs: full-size body.
        assert_eq!(body.len(), CHUNK_VOLUME * 2);
        assert_eq!(decode_voxels(false, &body).unwrap(), voxels);
    }

    #[test]
    fn test_roundtrip_zero_run_of_four_uses_sentinel() {
        let mut voxels = solid_chunk();
        for v in &mut voxels[10..14] {
            *v = Voxel::EMPTY;
        }
        let (_, body) = encode_voxels(&voxels);
        // 4 pairs (8 bytes) collapse to one 6-byte sentinel run.
        assert_eq!(body.len(), CHUNK_VOLUME * 2 - 8 + 6);
        assert_eq!(decode_voxels(false, &body).unwrap(), voxels);
    }

    #[test]
    fn test_fully_empty_chunk_omits_body() {
        let voxels = vec![Voxel::EMPTY; CHUNK_VOLUME];
        let (uniform_empty, body) = encode_voxels(&voxels);
        assert!(uniform_empty);
        assert!(body.is_empty());
        assert_eq!(decode_voxels(true, &body).unwrap(), voxels);
    }

    #[test]
    fn test_short_zero_runs_keep_colors() {
        let mut voxels = solid_chunk();
        voxels[20] = Voxel { value: 0, color: 7 };
        let decoded = roundtrip(&voxels);
        assert_eq!(decoded[20].color, 7);
    }

    #[test]
    fn test_truncated_body_rejected() {
        let voxels = solid_chunk();
        let (_, body) = encode_voxels(&voxels);
        let result = decode_voxels(false, &body[..body.len() - 1]);
        assert!(matches!(result, Err(RleError::Truncated { .. })));
    }

    #[test]
    fn test_short_body_rejected() {
        let result = decode_voxels(false, &[100, 1]);
        assert!(matches!(
            result,
            Err(RleError::LengthMismatch { actual: 1, .. })
        ));
    }

    #[test]
    fn test_overlong_run_rejected() {
        let mut body = vec![RUN_SENTINEL, RUN_SENTINEL];
        body.extend_from_slice(&(CHUNK_VOLUME as u32 + 1).to_le_bytes());
        let result = decode_voxels(false, &body);
        assert!(matches!(result, Err(RleError::LengthMismatch { .. })));
    }

    #[test]
    fn test_terrain_like_chunk_compresses_well() {
        // Bottom half solid, top half empty.
        let mut voxels = vec![Voxel::new(200, 1); CHUNK_VOLUME];
        for v in &mut voxels[CHUNK_VOLUME / 2..] {
            *v = Voxel::EMPTY;
        }
        let (_, body) = encode_voxels(&voxels);
        assert!(body.len() <= CHUNK_VOLUME + 6);
        assert_eq!(decode_voxels(false, &body).unwrap(), voxels);
    }
}
