//! Merge of overlapping edit sets.
//!
//! Resolution rule per voxel: keep the destination's `initial_value` (the
//! oldest capture wins, so rollback still restores the true pre-edit state),
//! overwrite `final_value` and `color` with the source's (last writer wins on
//! the outcome). Chunks absent from the destination are appended whole.
//!
//! The per-chunk voxel index lives in a transient side table scoped to this
//! call, giving O(edits) behavior without persisting any scratch state in
//! the chunks themselves.

use rustc_hash::FxHashMap;

use terracast_voxel::{ChunkCoord, ChunkEdits};

/// Merges `src` into `dst` in place.
pub fn merge_edits(dst: &mut Vec<ChunkEdits>, src: &[ChunkEdits]) {
    let mut chunk_slots: FxHashMap<ChunkCoord, usize> = dst
        .iter()
        .enumerate()
        .map(|(slot, chunk)| (chunk.coord, slot))
        .collect();

    for src_chunk in src {
        let slot = match chunk_slots.get(&src_chunk.coord) {
            Some(&slot) => slot,
            None => {
                chunk_slots.insert(src_chunk.coord, dst.len());
                dst.push(ChunkEdits {
                    coord: src_chunk.coord,
                    edits: Vec::with_capacity(src_chunk.edits.len()),
                });
                dst.len() - 1
            }
        };
        let dst_chunk = &mut dst[slot];

        // Transient index over the destination chunk's edits.
        let mut voxel_slots: FxHashMap<u16, usize> = dst_chunk
            .edits
            .iter()
            .enumerate()
            .map(|(i, e)| (e.index, i))
            .collect();

        for edit in &src_chunk.edits {
            match voxel_slots.get(&edit.index) {
                Some(&i) => {
                    dst_chunk.edits[i].final_value = edit.final_value;
                    dst_chunk.edits[i].color = edit.color;
                }
                None => {
                    voxel_slots.insert(edit.index, dst_chunk.edits.len());
                    dst_chunk.edits.push(*edit);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use terracast_voxel::VoxelEdit;

    fn edit(index: u16, initial: u8, fin: u8) -> VoxelEdit {
        VoxelEdit {
            index,
            initial_value: initial,
            final_value: fin,
            color: fin / 2,
        }
    }

    fn chunk(x: i16, edits: Vec<VoxelEdit>) -> ChunkEdits {
        ChunkEdits {
            coord: ChunkCoord::new(x, 0, 0),
            edits,
        }
    }

    #[test]
    fn test_disjoint_chunks_append() {
        let mut dst = vec![chunk(0, vec![edit(1, 0, 10)])];
        merge_edits(&mut dst, &[chunk(1, vec![edit(2, 0, 20)])]);
        assert_eq!(dst.len(), 2);
        assert_eq!(dst[1].coord, ChunkCoord::new(1, 0, 0));
    }

    #[test]
    fn test_overlapping_voxel_keeps_initial_takes_final() {
        let mut dst = vec![chunk(0, vec![edit(7, 40, 80)])];
        merge_edits(&mut dst, &[chunk(0, vec![edit(7, 80, 120)])]);

        assert_eq!(dst.len(), 1);
        assert_eq!(dst[0].edits.len(), 1);
        let merged = dst[0].edits[0];
        assert_eq!(merged.initial_value, 40, "oldest capture wins");
        assert_eq!(merged.final_value, 120, "last writer wins");
        assert_eq!(merged.color, 60);
    }

    #[test]
    fn test_same_chunk_new_voxels_append() {
        let mut dst = vec![chunk(0, vec![edit(1, 0, 10)])];
        merge_edits(&mut dst, &[chunk(0, vec![edit(2, 0, 20), edit(1, 10, 15)])]);
        assert_eq!(dst[0].edits.len(), 2);
        assert_eq!(dst[0].edits[0].final_value, 15);
        assert_eq!(dst[0].edits[1].index, 2);
    }

    #[test]
    fn test_merge_matches_sequential_application() {
        // merge(merge(A,B),C) must equal applying A, B, C in order.
        let a = vec![chunk(0, vec![edit(1, 0, 10), edit(2, 0, 20)])];
        let b = vec![chunk(0, vec![edit(1, 10, 30)]), chunk(1, vec![edit(5, 0, 50)])];
        let c = vec![chunk(1, vec![edit(5, 50, 60)]), chunk(0, vec![edit(3, 0, 33)])];

        let mut merged = a.clone();
        merge_edits(&mut merged, &b);
        merge_edits(&mut merged, &c);

        // Sequential ground truth: final value per (chunk, voxel) is the last
        // write; initial is the first capture.
        let mut finals: FxHashMap<(ChunkCoord, u16), (u8, u8)> = FxHashMap::default();
        for set in [&a, &b, &c] {
            for ch in set.iter() {
                for e in &ch.edits {
                    finals
                        .entry((ch.coord, e.index))
                        .and_modify(|v| v.1 = e.final_value)
                        .or_insert((e.initial_value, e.final_value));
                }
            }
        }

        let mut seen = 0;
        for ch in &merged {
            for e in &ch.edits {
                let (initial, fin) = finals[&(ch.coord, e.index)];
                assert_eq!(e.initial_value, initial);
                assert_eq!(e.final_value, fin);
                seen += 1;
            }
        }
        assert_eq!(seen, finals.len());
    }

    #[test]
    fn test_duplicate_src_voxels_resolve_in_order() {
        let mut dst = Vec::new();
        merge_edits(&mut dst, &[chunk(0, vec![edit(4, 0, 10), edit(4, 10, 25)])]);
        assert_eq!(dst[0].edits.len(), 1);
        assert_eq!(dst[0].edits[0].initial_value, 0);
        assert_eq!(dst[0].edits[0].final_value, 25);
    }
}
