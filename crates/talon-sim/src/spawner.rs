//! Spawner behavior: scheduled emission, kill tracking, checkpoints
//!
//! A spawner walks a point list on a fixed schedule once its trigger
//! condition arms it. The schedule is measured against the spawner's own
//! elapsed clock, so one oversized frame delta emits every point whose
//! time has passed rather than dropping any.

use crate::checkpoint::CheckpointRecord;
use crate::events::SimEvent;
use crate::instance::{SpawnerRef, SpawnerState};
use crate::sim::Simulation;
use talon_core::{SpawnId, TalonError};

impl Simulation {
    pub(crate) fn tick_spawner(&mut self, id: SpawnId) {
        self.run_emission(id);
    }

    /// Arm the emission schedule from the spawner's current clock. Any
    /// earlier firing's tracking is discarded; a zero-duration schedule
    /// emits every point here and now.
    pub(crate) fn fire_spawner(&mut self, id: SpawnId) {
        let Some(inst) = self.pool.get_mut(id) else {
            return;
        };
        if !inst.is_active() {
            return;
        }
        let elapsed = inst.elapsed;
        let Some(state) = inst.spawner_state_mut() else {
            return;
        };
        state.fire_start = elapsed;
        state.progress = Some(0);
        state.tracked.clear();
        state.unkilled = 0;

        self.run_emission(id);
        self.bus.push(SimEvent::SpawnerTriggered { id });
    }

    /// The external trigger path. Works on any active spawner, which also
    /// lets a script re-arm one that already fired on its own condition.
    pub fn trigger_spawner(&mut self, id: SpawnId) -> bool {
        let is_spawner = self
            .pool
            .get(id)
            .map(|i| i.is_active() && i.template().as_spawner().is_some())
            .unwrap_or(false);
        if !is_spawner {
            return false;
        }
        self.fire_spawner(id);
        true
    }

    /// Emit every point whose schedule time has passed, then evaluate the
    /// despawn condition. Point `p` is due once `elapsed - fire_start`
    /// reaches `(p + 1)` intervals, so triggering at `t` and next ticking
    /// at `t + k * interval` lands exactly `k` spawns.
    fn run_emission(&mut self, id: SpawnId) {
        let Some(inst) = self.pool.get(id) else {
            return;
        };
        let template = inst.template().clone();
        let Some(spawner) = template.as_spawner() else {
            return;
        };
        let Some(state) = inst.spawner_state() else {
            return;
        };
        let Some(mut progress) = state.progress else {
            return;
        };
        let origin = inst.position;
        let run = inst.elapsed - state.fire_start;
        let per = spawner.per_point_interval();
        let total = spawner.points.len();

        let mut emitted: Vec<(SpawnId, bool)> = Vec::new();
        while progress < total && run >= per * (progress as f64 + 1.0) {
            let offset = spawner.points[progress];
            let rotation = (spawner.start_rotation
                + spawner.rotation_increment * progress as f32)
                .to_radians();
            progress += 1;

            let Some(spawn_template) = &spawner.spawn else {
                continue;
            };
            match self.spawn(spawn_template, origin + offset, SpawnerRef::Instance(id)) {
                Ok(child) => {
                    let combatant = self
                        .pool
                        .get_mut(child)
                        .map(|c| {
                            c.rotation = rotation;
                            c.template().is_entity()
                        })
                        .unwrap_or(false);
                    emitted.push((child, combatant));
                }
                Err(err) => {
                    // The schedule moves on so a bad name warns once per
                    // point instead of every tick
                    tracing::warn!(template = %spawn_template, error = %err, "scheduled spawn failed");
                }
            }
        }

        let Some(state) = self.pool.get_mut(id).and_then(|i| i.spawner_state_mut()) else {
            return;
        };
        for (child, combatant) in emitted {
            state.tracked.push(child);
            if combatant {
                state.unkilled += 1;
            }
        }
        state.progress = Some(progress);

        if progress >= total {
            use talon_template::DespawnCondition::*;
            let done = match spawner.despawn_condition {
                None => false,
                AllSpawned => true,
                RequireKill => state.tracked.is_empty() && state.unkilled == 0,
            };
            if done {
                self.despawn(id);
            }
        }
    }

    /// React to this tick's queued events before they drain: kill-tracking
    /// bookkeeping keyed off the despawned instance's creator. Events
    /// appended while reacting are picked up by the same walk.
    pub(crate) fn process_reactions(&mut self) {
        let mut index = 0;
        while index < self.bus.pending().len() {
            let event = self.bus.pending()[index].clone();
            self.react(&event);
            index += 1;
        }
    }

    fn react(&mut self, event: &SimEvent) {
        match *event {
            SimEvent::Destroyed {
                id,
                by_player: true,
                ..
            } => {
                let Some(owner) = self.tracking_owner(id) else {
                    return;
                };
                if let Some(state) = self.pool.get_mut(owner).and_then(|i| i.spawner_state_mut()) {
                    if state.tracked.contains(&id) {
                        state.unkilled = state.unkilled.saturating_sub(1);
                    }
                }
            }
            SimEvent::Despawned { id, .. } => {
                let Some(owner) = self.tracking_owner(id) else {
                    return;
                };
                let owner_name = self
                    .pool
                    .get(owner)
                    .map(|i| i.template_name().to_string())
                    .unwrap_or_default();
                if let Some(state) = self.pool.get_mut(owner).and_then(|i| i.spawner_state_mut()) {
                    match state.tracked.iter().position(|&t| t == id) {
                        Some(slot) => {
                            state.tracked.swap_remove(slot);
                        }
                        None => {
                            let err = TalonError::TrackedSpawnDesync {
                                spawner: owner_name,
                                detail: format!("despawned instance {id:?} was not tracked"),
                            };
                            tracing::warn!(error = %err, "kill tracking skipped an update");
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// The spawner responsible for an instance's kill tracking: its
    /// creator, if that creator is a spawner that has fired.
    fn tracking_owner(&self, id: SpawnId) -> Option<SpawnId> {
        let owner = match self.pool.get(id)?.spawner {
            SpawnerRef::Instance(owner) => owner,
            _ => return None,
        };
        let armed = self
            .pool
            .get(owner)?
            .spawner_state()
            .map(|s| s.progress.is_some())
            .unwrap_or(false);
        armed.then_some(owner)
    }

    // ---- checkpoints ---------------------------------------------------

    /// Snapshot every named spawner's schedule plus the current score.
    /// Unnamed spawners have no stable identity and are skipped.
    pub fn save_checkpoint(&mut self) {
        let records: Vec<(String, CheckpointRecord)> = self
            .pool
            .instances()
            .filter_map(|inst| {
                let name = inst.name.clone()?;
                let state = inst.spawner_state()?;
                Some((
                    name,
                    CheckpointRecord::Spawner {
                        template: inst.template_name().to_string(),
                        fire_start: state.fire_start,
                        progress: state.progress,
                    },
                ))
            })
            .collect();
        for (name, record) in records {
            self.checkpoints.set(name, record);
        }
        self.checkpoints.set_score(self.score);
        self.bus.push(SimEvent::CheckpointSave);
    }

    /// Restore every named spawner from its snapshot: schedule fields come
    /// back verbatim, the template is rebound through the bank, and kill
    /// tracking starts over. A spawner without a snapshot falls back to
    /// the unfired state.
    pub fn load_checkpoint(&mut self) {
        let bank = self.bank().clone();
        let named: Vec<(SpawnId, String)> = self
            .pool
            .instances()
            .filter(|inst| inst.spawner_state().is_some())
            .filter_map(|inst| inst.name.clone().map(|name| (inst.id(), name)))
            .collect();

        for (id, name) in named {
            let record = self.checkpoints.restore(&name).cloned();
            match record {
                Ok(CheckpointRecord::Spawner {
                    template,
                    fire_start,
                    progress,
                }) => {
                    let rebind = self
                        .pool
                        .get(id)
                        .map(|i| i.template_name() != template)
                        .unwrap_or(false);
                    if rebind {
                        match bank.resolve(&template) {
                            Ok(resolved) => {
                                if let Some(inst) = self.pool.get_mut(id) {
                                    inst.rebind_template(resolved);
                                }
                            }
                            Err(err) => {
                                tracing::warn!(actor = %name, error = %err, "checkpoint rebind failed");
                            }
                        }
                    }
                    if let Some(state) =
                        self.pool.get_mut(id).and_then(|i| i.spawner_state_mut())
                    {
                        state.fire_start = fire_start;
                        state.progress = progress;
                        state.tracked.clear();
                        state.unkilled = 0;
                    }
                }
                Ok(CheckpointRecord::Trigger { .. }) => {}
                Err(err) => {
                    tracing::debug!(actor = %name, error = %err, "no snapshot, using the unfired state");
                    if let Some(state) =
                        self.pool.get_mut(id).and_then(|i| i.spawner_state_mut())
                    {
                        *state = SpawnerState::default();
                    }
                }
            }
        }

        self.score = self.checkpoints.score();
        self.bus.push(SimEvent::ScoreChanged { score: self.score });
        self.bus.push(SimEvent::CheckpointLoad);
    }
}
