// Execution scheduler: owns every in-flight execution and drives its
// lifecycle one tick at a time.
//
// Per tick, in order:
// 1. Initialise pending executions in insertion order and move them to the
//    active list. During the spawn phase, executions that do not run in the
//    spawn phase stay pending (uninitialised) until it ends.
// 2. Tick every active execution still reporting `is_active()`, in list
//    order, skipping non-spawn-phase executions during the spawn phase.
// 3. Queue executions created during this tick (boat follow-on attacks) as
//    pending for the next tick.
// 4. Prune inactive executions.
//
// Pruning happens only after the whole tick, so no execution observes its
// own removal, and follow-ons never run in the tick that created them.
//
// See also: `execution/mod.rs` for the lifecycle contract, `sim.rs` which
// calls `tick` once per turn.

use log::debug;

use crate::config::GameConfig;
use crate::execution::{ExecCtx, Execution};
use crate::world::World;

#[derive(Debug, Default)]
pub struct ExecutionScheduler {
    pending: Vec<Execution>,
    active: Vec<Execution>,
}

impl ExecutionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an execution. It is initialised at the start of the next tick.
    pub fn add(&mut self, execution: Execution) {
        self.pending.push(execution);
    }

    pub fn pending(&self) -> &[Execution] {
        &self.pending
    }

    pub fn active(&self) -> &[Execution] {
        &self.active
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tick(&mut self, world: &mut World, config: &GameConfig, tick: u64) {
        let mut follow_ons = Vec::new();
        let mut ctx = ExecCtx::new(world, config, tick, &mut follow_ons);
        let spawn_phase = ctx.in_spawn_phase();

        let mut deferred = Vec::new();
        for mut execution in self.pending.drain(..) {
            if spawn_phase && !execution.active_during_spawn_phase() {
                deferred.push(execution);
                continue;
            }
            execution.init(&mut ctx);
            self.active.push(execution);
        }
        self.pending = deferred;

        for execution in &mut self.active {
            if !execution.is_active() {
                continue;
            }
            if spawn_phase && !execution.active_during_spawn_phase() {
                continue;
            }
            execution.tick(&mut ctx);
        }

        let before = self.active.len();
        self.active.retain(Execution::is_active);
        if self.active.len() != before || !follow_ons.is_empty() {
            debug!(
                "tick {tick}: pruned {} executions, queued {} follow-ons",
                before - self.active.len(),
                follow_ons.len()
            );
        }
        self.pending.append(&mut follow_ons);
    }
}
