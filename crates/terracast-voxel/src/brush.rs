//! Deterministic spherical terraform brush.
//!
//! The brush is applied on the client during prediction and replayed on the
//! server from the same [`BrushStroke`] parameters, so the arithmetic here
//! must be identical on both sides. All writes go through the history
//! tracker, which makes every stroke rollback-capable.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::chunk::{CHUNK_SIZE, Chunk, MAX_DENSITY, Voxel};
use crate::grid::{ChunkCoord, VoxelGrid};

/// Whether a stroke adds or removes terrain density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrushOp {
    /// Add density (build terrain up).
    Raise,
    /// Remove density (dig terrain out).
    Carve,
}

/// A single terraform action, in world voxel units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrushStroke {
    /// Sphere center in world voxel coordinates.
    pub center: Vec3,
    /// Sphere radius in voxels.
    pub radius: f32,
    /// Peak density change at the center; falls off linearly to the rim.
    pub strength: u8,
    /// Add or remove.
    pub op: BrushOp,
    /// Palette color painted onto raised voxels.
    pub color: u8,
}

/// Applies a stroke to every loaded voxel within its radius.
///
/// Voxels in unloaded chunks are skipped; both peers skip the same voxels
/// because chunk residency around a player is part of the replicated state.
/// Returns the number of voxels changed.
pub fn apply_stroke(grid: &mut VoxelGrid, stroke: &BrushStroke) -> u32 {
    let min = (stroke.center - Vec3::splat(stroke.radius)).floor();
    let max = (stroke.center + Vec3::splat(stroke.radius)).ceil();
    let mut changed = 0u32;

    for wx in (min.x as i32)..=(max.x as i32) {
        for wy in (min.y as i32)..=(max.y as i32) {
            for wz in (min.z as i32)..=(max.z as i32) {
                let pos = Vec3::new(wx as f32, wy as f32, wz as f32);
                let dist = pos.distance(stroke.center);
                if dist > stroke.radius {
                    continue;
                }

                let falloff = 1.0 - dist / stroke.radius;
                let delta = (f32::from(stroke.strength) * falloff) as u8;
                if delta == 0 {
                    continue;
                }

                let coord = ChunkCoord::containing(wx, wy, wz);
                let Some(chunk) = grid.chunk(coord) else {
                    continue;
                };
                let (ox, oy, oz) = coord.world_origin();
                let index = Chunk::linear_index(
                    (wx - ox) as usize % CHUNK_SIZE,
                    (wy - oy) as usize % CHUNK_SIZE,
                    (wz - oz) as usize % CHUNK_SIZE,
                );

                let old = chunk.get(index);
                let new = match stroke.op {
                    BrushOp::Raise => Voxel {
                        value: old.value.saturating_add(delta).min(MAX_DENSITY),
                        color: stroke.color,
                    },
                    BrushOp::Carve => Voxel {
                        value: old.value.saturating_sub(delta),
                        color: old.color,
                    },
                };
                if new == old {
                    continue;
                }

                // Chunk residency was checked above; the write cannot fail.
                let _ = grid.write_tracked(coord, index, new);
                changed += 1;
            }
        }
    }

    changed
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_grid() -> VoxelGrid {
        let mut grid = VoxelGrid::new();
        for x in -1..=1 {
            for y in -1..=1 {
                for z in -1..=1 {
                    grid.load_chunk(ChunkCoord::new(x, y, z), Chunk::new());
                }
            }
        }
        grid
    }

    #[test]
    fn test_raise_builds_density_at_center() {
        let mut grid = loaded_grid();
        let stroke = BrushStroke {
            center: Vec3::new(8.0, 8.0, 8.0),
            radius: 3.0,
            strength: 100,
            op: BrushOp::Raise,
            color: 5,
        };
        let changed = apply_stroke(&mut grid, &stroke);
        assert!(changed > 0);

        let center = grid
            .voxel(ChunkCoord::new(0, 0, 0), Chunk::linear_index(8, 8, 8))
            .unwrap();
        assert_eq!(center.value, 100);
        assert_eq!(center.color, 5);
    }

    #[test]
    fn test_carve_inverts_raise() {
        let mut grid = loaded_grid();
        let raise = BrushStroke {
            center: Vec3::new(8.0, 8.0, 8.0),
            radius: 3.0,
            strength: 80,
            op: BrushOp::Raise,
            color: 1,
        };
        apply_stroke(&mut grid, &raise);
        apply_stroke(
            &mut grid,
            &BrushStroke {
                op: BrushOp::Carve,
                ..raise
            },
        );

        let center = grid
            .voxel(ChunkCoord::new(0, 0, 0), Chunk::linear_index(8, 8, 8))
            .unwrap();
        assert_eq!(center.value, 0);
    }

    #[test]
    fn test_density_saturates_at_max() {
        let mut grid = loaded_grid();
        let stroke = BrushStroke {
            center: Vec3::new(8.0, 8.0, 8.0),
            radius: 2.0,
            strength: 200,
            op: BrushOp::Raise,
            color: 0,
        };
        apply_stroke(&mut grid, &stroke);
        apply_stroke(&mut grid, &stroke);

        let center = grid
            .voxel(ChunkCoord::new(0, 0, 0), Chunk::linear_index(8, 8, 8))
            .unwrap();
        assert_eq!(center.value, MAX_DENSITY);
    }

    #[test]
    fn test_stroke_spanning_chunks_touches_both() {
        let mut grid = loaded_grid();
        // Centered on the boundary between chunk (0,0,0) and (1,0,0).
        let stroke = BrushStroke {
            center: Vec3::new(16.0, 8.0, 8.0),
            radius: 3.0,
            strength: 100,
            op: BrushOp::Raise,
            color: 2,
        };
        apply_stroke(&mut grid, &stroke);

        let touched: Vec<_> = grid.touched_chunks().collect();
        assert!(touched.contains(&ChunkCoord::new(0, 0, 0)));
        assert!(touched.contains(&ChunkCoord::new(1, 0, 0)));
    }

    #[test]
    fn test_stroke_is_history_tracked() {
        let mut grid = loaded_grid();
        apply_stroke(
            &mut grid,
            &BrushStroke {
                center: Vec3::new(8.0, 8.0, 8.0),
                radius: 2.0,
                strength: 60,
                op: BrushOp::Raise,
                color: 0,
            },
        );
        let chunk = grid.chunk(ChunkCoord::new(0, 0, 0)).unwrap();
        assert!(chunk.has_pending_edits());
        let edits = chunk.collect_edits().unwrap();
        assert!(edits.iter().all(|e| e.initial_value == 0));
    }

    #[test]
    fn test_unloaded_chunks_are_skipped() {
        let mut grid = VoxelGrid::new();
        grid.load_chunk(ChunkCoord::new(0, 0, 0), Chunk::new());
        let stroke = BrushStroke {
            center: Vec3::new(16.0, 8.0, 8.0),
            radius: 4.0,
            strength: 100,
            op: BrushOp::Raise,
            color: 0,
        };
        // Half the sphere falls into the unloaded chunk (1,0,0).
        let changed = apply_stroke(&mut grid, &stroke);
        assert!(changed > 0);
        assert_eq!(grid.touched_chunks().count(), 1);
    }
}
