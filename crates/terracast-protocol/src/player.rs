//! Player kinematic state on the wire, input commands, and the movement seam.
//!
//! [`MovementSimulator::simulate`] is deterministic and **must** be identical
//! on client and server: the client runs it at input latency for prediction
//! and the server replays the same commands against authoritative state.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use terracast_voxel::BrushStroke;

// ---------------------------------------------------------------------------
// Input bits
// ---------------------------------------------------------------------------

/// Movement button: forward.
pub const BUTTON_FORWARD: u32 = 1 << 0;
/// Movement button: backward.
pub const BUTTON_BACKWARD: u32 = 1 << 1;
/// Movement button: strafe left.
pub const BUTTON_LEFT: u32 = 1 << 2;
/// Movement button: strafe right.
pub const BUTTON_RIGHT: u32 = 1 << 3;
/// Movement button: jump / ascend.
pub const BUTTON_ASCEND: u32 = 1 << 4;
/// Movement button: crouch / descend.
pub const BUTTON_DESCEND: u32 = 1 << 5;

/// Interaction-mode flag: player is in terraform mode.
pub const FLAG_TERRAFORMING: u32 = 1 << 0;
/// Interaction-mode flag: player is flying.
pub const FLAG_FLYING: u32 = 1 << 1;

// ---------------------------------------------------------------------------
// InputCommand
// ---------------------------------------------------------------------------

/// One tick's worth of player input, cached locally and replayed on the
/// server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputCommand {
    /// Prediction tick this input belongs to.
    pub tick: u64,
    /// Simulation step in seconds.
    pub dt: f32,
    /// Pressed [`BUTTON_FORWARD`]-style movement bits.
    pub buttons: u32,
    /// View direction at input time (unit vector).
    pub view_dir: Vec3,
    /// Interaction-mode flags active at input time.
    pub flags: u32,
    /// Terraform action performed this tick, if any.
    pub stroke: Option<BrushStroke>,
}

// ---------------------------------------------------------------------------
// PlayerClaim
// ---------------------------------------------------------------------------

/// Client-claimed predicted state, sent with every command interval. The
/// server retains the latest claim per client for divergence diffing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerClaim {
    /// Prediction tick the claim corresponds to.
    pub tick: u64,
    /// Claimed position in world voxel units.
    pub position: Vec3,
    /// Claimed view direction (unit vector).
    pub view_dir: Vec3,
    /// Claimed up vector (unit vector).
    pub up: Vec3,
    /// Claimed velocity in voxels per second.
    pub velocity: Vec3,
    /// Interaction-mode flags ([`FLAG_TERRAFORMING`], ...).
    pub flags: u32,
    /// Whether the player considers itself alive.
    pub alive: bool,
    /// Current health.
    pub health: f32,
}

impl PlayerClaim {
    /// A spawn-state claim at the given position.
    pub fn at_spawn(position: Vec3) -> Self {
        Self {
            tick: 0,
            position,
            view_dir: Vec3::new(0.0, 0.0, 1.0),
            up: Vec3::new(0.0, 1.0, 0.0),
            velocity: Vec3::ZERO,
            flags: 0,
            alive: true,
            health: 100.0,
        }
    }
}

// ---------------------------------------------------------------------------
// PlayerSnapshot
// ---------------------------------------------------------------------------

/// Server-authoritative per-player state broadcast each dispatch interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Which player this snapshot describes.
    pub client_id: u16,
    /// Server tick the state is authoritative for.
    pub tick: u64,
    /// Authoritative position.
    pub position: Vec3,
    /// Authoritative view direction.
    pub view_dir: Vec3,
    /// Authoritative up vector.
    pub up: Vec3,
    /// Authoritative velocity.
    pub velocity: Vec3,
    /// Interaction-mode flags.
    pub flags: u32,
    /// Whether the player is alive.
    pub alive: bool,
    /// Authoritative health.
    pub health: f32,
    /// This snapshot requires the receiving client to roll back.
    pub needs_correction: bool,
    /// A correction is already outstanding; don't reprocess a stale one.
    pub server_waiting: bool,
}

// ---------------------------------------------------------------------------
// Movement seam
// ---------------------------------------------------------------------------

/// Deterministic movement step shared by client prediction and server replay.
pub trait MovementSimulator {
    /// Applies one input command to `state` over `dt` seconds and returns the
    /// resulting state. Must not read any per-peer state.
    fn simulate(&self, state: &PlayerClaim, input: &InputCommand, dt: f32) -> PlayerClaim;
}

/// Reference integrator: button-driven walking with instant velocity.
///
/// Real deployments substitute the game's physics step here; tests and both
/// peers of this crate's own test harness use this one.
#[derive(Debug, Clone)]
pub struct WalkingMovement {
    /// Movement speed in voxels per second.
    pub speed: f32,
}

impl Default for WalkingMovement {
    fn default() -> Self {
        Self { speed: 6.0 }
    }
}

impl MovementSimulator for WalkingMovement {
    fn simulate(&self, state: &PlayerClaim, input: &InputCommand, dt: f32) -> PlayerClaim {
        let forward = input.view_dir.normalize_or_zero();
        let right = forward.cross(state.up).normalize_or_zero();

        let mut wish = Vec3::ZERO;
        if input.buttons & BUTTON_FORWARD != 0 {
            wish += forward;
        }
        if input.buttons & BUTTON_BACKWARD != 0 {
            wish -= forward;
        }
        if input.buttons & BUTTON_RIGHT != 0 {
            wish += right;
        }
        if input.buttons & BUTTON_LEFT != 0 {
            wish -= right;
        }
        if input.buttons & BUTTON_ASCEND != 0 {
            wish += state.up;
        }
        if input.buttons & BUTTON_DESCEND != 0 {
            wish -= state.up;
        }

        let velocity = wish.normalize_or_zero() * self.speed;
        PlayerClaim {
            position: state.position + velocity * dt,
            velocity,
            view_dir: forward,
            flags: input.flags,
            ..*state
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
