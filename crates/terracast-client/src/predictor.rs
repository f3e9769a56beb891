//! Local player prediction at input latency.
//!
//! Each game tick runs the fixed phase sequence `ApplyInput →
//! (optional) Terraform → CacheAction`: the input is applied through the
//! external movement step, terraform strokes are written through the history
//! tracker (making them rollback-capable), and the input is cached for the
//! next command flush. Independently of the tick rate, the predictor flushes
//! its caches into one `ClientCommands` payload every command interval.

use terracast_protocol::packets::ClientCommands;
use terracast_protocol::player::{InputCommand, MovementSimulator, PlayerClaim, PlayerSnapshot};
use terracast_sync::{Accumulator, SyncError};
use terracast_voxel::{VoxelGrid, brush};

/// Client-side prediction state for the local player.
#[derive(Debug)]
pub struct Predictor {
    /// Predicted state after the most recent tick.
    state: PlayerClaim,
    /// Inputs cached since the last flush, oldest first.
    cached: Vec<InputCommand>,
    /// Ticks between command flushes.
    command_interval_ticks: u32,
    /// Ticks elapsed since the last flush.
    ticks_since_flush: u32,
    /// Current prediction tick.
    tick: u64,
    /// A processed hard correction awaits server acknowledgement; carried on
    /// every flush until a clean snapshot arrives.
    correction_pending: bool,
}

impl Predictor {
    /// Creates a predictor starting from the handshake spawn state.
    pub fn new(spawn: PlayerClaim, command_interval_ticks: u32, start_tick: u64) -> Self {
        Self {
            state: spawn,
            cached: Vec::new(),
            command_interval_ticks: command_interval_ticks.max(1),
            ticks_since_flush: 0,
            tick: start_tick,
            correction_pending: false,
        }
    }

    /// Runs one prediction tick. Returns the new predicted state.
    pub fn tick(
        &mut self,
        mut input: InputCommand,
        sim: &dyn MovementSimulator,
        grid: &mut VoxelGrid,
    ) -> &PlayerClaim {
        self.tick += 1;
        input.tick = self.tick;

        // ApplyInput: external movement step produces the new kinematics.
        self.state = sim.simulate(&self.state, &input, input.dt);
        self.state.tick = self.tick;

        // Terraform: voxel writes go through the tracker so they can be
        // rolled back when the server disagrees.
        if let Some(stroke) = &input.stroke
            && self.state.alive
        {
            brush::apply_stroke(grid, stroke);
        }

        // CacheAction: retain the input for the next command flush.
        self.cached.push(input);
        self.ticks_since_flush += 1;
        &self.state
    }

    /// Returns `true` once a full command interval has elapsed.
    pub fn should_flush(&self) -> bool {
        self.ticks_since_flush >= self.command_interval_ticks
    }

    /// Flushes all cached inputs, the current claim, and the accumulated
    /// edits into one upload payload, then clears the per-interval caches.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if edit accumulation fails (per-chunk capacity
    /// or a full ring); the caches are left intact for retry.
    pub fn flush(
        &mut self,
        accumulator: &mut Accumulator,
        grid: &mut VoxelGrid,
    ) -> Result<ClientCommands, SyncError> {
        let edits = accumulator.accumulate(grid, self.tick)?;
        let commands = std::mem::take(&mut self.cached);
        self.ticks_since_flush = 0;
        Ok(ClientCommands {
            commands,
            claim: self.state,
            edits,
            correction_ack: self.correction_pending,
        })
    }

    /// Hard-overwrites the predicted state with server truth and clears the
    /// cached actions and per-interval counters (correction path).
    pub fn hard_correct(&mut self, truth: &PlayerSnapshot) {
        self.state = PlayerClaim {
            tick: self.tick,
            position: truth.position,
            view_dir: truth.view_dir,
            up: truth.up,
            velocity: truth.velocity,
            flags: truth.flags,
            alive: truth.alive,
            health: truth.health,
        };
        self.cached.clear();
        self.ticks_since_flush = 0;
        self.correction_pending = true;
    }

    /// Stops carrying the correction acknowledgement; called once a clean
    /// snapshot shows the server released its hold.
    pub fn clear_correction_pending(&mut self) {
        self.correction_pending = false;
    }

    /// Returns `true` while a processed correction awaits acknowledgement.
    pub fn correction_pending(&self) -> bool {
        self.correction_pending
    }

    /// The current predicted state.
    pub fn state(&self) -> &PlayerClaim {
        &self.state
    }

    /// The current prediction tick.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Number of cached, unflushed inputs.
    pub fn cached_len(&self) -> usize {
        self.cached.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use terracast_protocol::player::{BUTTON_FORWARD, WalkingMovement};
    use terracast_voxel::{BrushOp, BrushStroke, Chunk, ChunkCoord};

    fn forward_input() -> InputCommand {
        InputCommand {
            tick: 0,
            dt: 0.1,
            buttons: BUTTON_FORWARD,
            view_dir: Vec3::new(0.0, 0.0, 1.0),
            flags: 0,
            stroke: None,
        }
    }

    fn setup() -> (Predictor, VoxelGrid, WalkingMovement) {
        let mut grid = VoxelGrid::new();
        grid.load_chunk(ChunkCoord::new(0, 0, 0), Chunk::new());
        (
            Predictor::new(PlayerClaim::at_spawn(Vec3::ZERO), 3, 0),
            grid,
            WalkingMovement::default(),
        )
    }

    #[test]
    fn test_input_applies_at_local_latency() {
        let (mut predictor, mut grid, sim) = setup();
        let state = predictor.tick(forward_input(), &sim, &mut grid);
        assert!(state.position.z > 0.0);
        assert_eq!(state.tick, 1);
    }

    #[test]
    fn test_flush_fires_on_interval_not_tick_rate() {
        let (mut predictor, mut grid, sim) = setup();
        predictor.tick(forward_input(), &sim, &mut grid);
        predictor.tick(forward_input(), &sim, &mut grid);
        assert!(!predictor.should_flush());
        predictor.tick(forward_input(), &sim, &mut grid);
        assert!(predictor.should_flush());
    }

    #[test]
    fn test_flush_drains_caches_and_carries_edits() {
        let (mut predictor, mut grid, sim) = setup();
        let mut accumulator = Accumulator::new(8);

        let mut input = forward_input();
        input.stroke = Some(BrushStroke {
            center: Vec3::new(8.0, 8.0, 8.0),
            radius: 2.0,
            strength: 90,
            op: BrushOp::Raise,
            color: 1,
        });
        predictor.tick(input, &sim, &mut grid);
        predictor.tick(forward_input(), &sim, &mut grid);
        predictor.tick(forward_input(), &sim, &mut grid);

        let payload = predictor.flush(&mut accumulator, &mut grid).unwrap();
        assert_eq!(payload.commands.len(), 3);
        assert_eq!(payload.claim.tick, 3);
        let edits = payload.edits.unwrap();
        assert_eq!(edits.tick, 3);
        assert!(!edits.chunks.is_empty());

        // Caches cleared.
        assert_eq!(predictor.cached_len(), 0);
        assert!(!predictor.should_flush());
    }

    #[test]
    fn test_flush_without_terraform_has_no_edits() {
        let (mut predictor, mut grid, sim) = setup();
        let mut accumulator = Accumulator::new(8);
        predictor.tick(forward_input(), &sim, &mut grid);
        let payload = predictor.flush(&mut accumulator, &mut grid).unwrap();
        assert!(payload.edits.is_none());
    }

    #[test]
    fn test_dead_player_cannot_terraform() {
        let (mut predictor, mut grid, sim) = setup();
        predictor.hard_correct(&PlayerSnapshot {
            client_id: 1,
            tick: 0,
            position: Vec3::ZERO,
            view_dir: Vec3::Z,
            up: Vec3::Y,
            velocity: Vec3::ZERO,
            flags: 0,
            alive: false,
            health: 0.0,
            needs_correction: true,
            server_waiting: false,
        });

        let mut input = forward_input();
        input.stroke = Some(BrushStroke {
            center: Vec3::new(8.0, 8.0, 8.0),
            radius: 2.0,
            strength: 90,
            op: BrushOp::Raise,
            color: 1,
        });
        predictor.tick(input, &sim, &mut grid);
        assert!(!grid.has_touched_chunks());
    }

    #[test]
    fn test_hard_correct_overwrites_and_clears() {
        let (mut predictor, mut grid, sim) = setup();
        predictor.tick(forward_input(), &sim, &mut grid);

        predictor.hard_correct(&PlayerSnapshot {
            client_id: 1,
            tick: 1,
            position: Vec3::new(5.0, 6.0, 7.0),
            view_dir: Vec3::Z,
            up: Vec3::Y,
            velocity: Vec3::ZERO,
            flags: 0,
            alive: true,
            health: 80.0,
            needs_correction: true,
            server_waiting: false,
        });

        assert_eq!(predictor.state().position, Vec3::new(5.0, 6.0, 7.0));
        assert_eq!(predictor.state().health, 80.0);
        assert_eq!(predictor.cached_len(), 0);
    }
}
