//! Smoothing of other clients' changes: voxel edit blending and remote
//! player pose interpolation.
//!
//! Voxels changed by *other* players are not snapped; they animate from the
//! current local value to the server value over a fixed short window. Remote
//! players never run prediction; their snapshots queue in a bounded ring
//! and are drained by interpolation to hide network jitter.

use std::collections::VecDeque;

use glam::Vec3;
use rustc_hash::FxHashMap;

use terracast_protocol::player::PlayerSnapshot;
use terracast_voxel::{ChunkCoord, Voxel, VoxelGrid};

/// Ticks a staged voxel blend takes to reach the server value.
pub const INTERPOLATION_WINDOW_TICKS: u32 = 6;

/// Snapshots retained per remote player.
pub const REMOTE_BUFFER_CAPACITY: usize = 8;

// ---------------------------------------------------------------------------
// Voxel interpolation
// ---------------------------------------------------------------------------

/// One staged voxel blend.
#[derive(Debug, Clone, Copy)]
struct VoxelBlend {
    coord: ChunkCoord,
    index: u16,
    from_value: u8,
    to: Voxel,
}

/// Client-only staging of voxel blends for edits made by other players.
#[derive(Debug)]
pub struct InterpolationQueue {
    blends: Vec<VoxelBlend>,
    window_ticks: u32,
    elapsed_ticks: u32,
}

impl InterpolationQueue {
    /// Creates an empty queue with the default window.
    pub fn new() -> Self {
        Self::with_window(INTERPOLATION_WINDOW_TICKS)
    }

    /// Creates an empty queue with a custom window length.
    pub fn with_window(window_ticks: u32) -> Self {
        Self {
            blends: Vec::new(),
            window_ticks: window_ticks.max(1),
            elapsed_ticks: 0,
        }
    }

    /// Stages a blend from the current local value to the server value.
    /// Staging restarts the window for the whole queue.
    pub fn stage(&mut self, coord: ChunkCoord, index: u16, from_value: u8, to: Voxel) {
        self.blends.push(VoxelBlend {
            coord,
            index,
            from_value,
            to,
        });
        self.elapsed_ticks = 0;
    }

    /// Advances the blend window by one tick, writing interpolated values.
    /// Writes bypass the history tracker: these voxels are server-confirmed.
    pub fn advance(&mut self, grid: &mut VoxelGrid) {
        if self.blends.is_empty() {
            return;
        }
        self.elapsed_ticks += 1;
        if self.elapsed_ticks >= self.window_ticks {
            self.finish(grid);
            return;
        }

        let t = self.elapsed_ticks as f32 / self.window_ticks as f32;
        for blend in &self.blends {
            let value =
                blend.from_value as f32 + (blend.to.value as f32 - blend.from_value as f32) * t;
            let _ = grid.write(
                blend.coord,
                blend.index,
                Voxel {
                    value: value.round() as u8,
                    color: blend.to.color,
                },
            );
        }
    }

    /// Snaps every staged blend to its final value and clears the queue.
    pub fn finish(&mut self, grid: &mut VoxelGrid) {
        for blend in self.blends.drain(..) {
            let _ = grid.write(blend.coord, blend.index, blend.to);
        }
        self.elapsed_ticks = 0;
    }

    /// Returns `true` while blends are in flight.
    pub fn is_active(&self) -> bool {
        !self.blends.is_empty()
    }

    /// Number of staged blends.
    pub fn len(&self) -> usize {
        self.blends.len()
    }

    /// Returns `true` if no blend is staged.
    pub fn is_empty(&self) -> bool {
        self.blends.is_empty()
    }
}

impl Default for InterpolationQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Remote players
// ---------------------------------------------------------------------------

/// A remote player's displayed pose, blended between buffered snapshots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemotePose {
    /// Interpolated position.
    pub position: Vec3,
    /// Interpolated view direction.
    pub view_dir: Vec3,
    /// Whether the player is alive (taken from the newer snapshot).
    pub alive: bool,
}

#[derive(Debug)]
struct RemoteLane {
    buffer: VecDeque<PlayerSnapshot>,
    /// Blend progress between the two oldest buffered snapshots.
    progress: f32,
}

/// Bounded per-player snapshot buffers drained by interpolation.
#[derive(Debug, Default)]
pub struct RemotePlayers {
    lanes: FxHashMap<u16, RemoteLane>,
}

impl RemotePlayers {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a snapshot for a remote player, evicting the oldest when the
    /// buffer is full.
    pub fn push(&mut self, snapshot: PlayerSnapshot) {
        let lane = self
            .lanes
            .entry(snapshot.client_id)
            .or_insert_with(|| RemoteLane {
                buffer: VecDeque::with_capacity(REMOTE_BUFFER_CAPACITY),
                progress: 0.0,
            });
        if lane.buffer.len() >= REMOTE_BUFFER_CAPACITY {
            lane.buffer.pop_front();
        }
        lane.buffer.push_back(snapshot);
    }

    /// Removes a departed player's lane.
    pub fn remove(&mut self, client_id: u16) {
        self.lanes.remove(&client_id);
    }

    /// Advances every lane by `step` (fraction of a snapshot interval) and
    /// returns the current poses.
    pub fn advance(&mut self, step: f32) -> Vec<(u16, RemotePose)> {
        let mut poses = Vec::with_capacity(self.lanes.len());
        for (&client_id, lane) in &mut self.lanes {
            let Some(pose) = lane.advance(step) else {
                continue;
            };
            poses.push((client_id, pose));
        }
        poses.sort_unstable_by_key(|(id, _)| *id);
        poses
    }
}

impl RemoteLane {
    fn advance(&mut self, step: f32) -> Option<RemotePose> {
        if self.buffer.len() >= 2 {
            self.progress += step;
            while self.progress >= 1.0 && self.buffer.len() > 2 {
                self.buffer.pop_front();
                self.progress -= 1.0;
            }
            if self.progress >= 1.0 {
                self.progress = 1.0;
            }
            let from = &self.buffer[0];
            let to = &self.buffer[1];
            let t = self.progress.clamp(0.0, 1.0);
            let pose = RemotePose {
                position: from.position.lerp(to.position, t),
                view_dir: from.view_dir.lerp(to.view_dir, t).normalize_or_zero(),
                alive: to.alive,
            };
            if self.progress >= 1.0 {
                self.buffer.pop_front();
                self.progress = 0.0;
            }
            Some(pose)
        } else {
            let only = self.buffer.front()?;
            Some(RemotePose {
                position: only.position,
                view_dir: only.view_dir,
                alive: only.alive,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
