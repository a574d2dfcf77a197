//! Entity behavior: movement and weapon cadence
//!
//! Runs inside the tick pass as `impl Simulation` so motion can resolve
//! targets and spawner anchors through the pool, and so firing goes
//! through the normal spawn path.

use crate::events::SimEvent;
use crate::instance::{phase_for_health, slot_count, SpawnerRef};
use crate::sim::Simulation;
use talon_core::{SpawnId, Vec2};
use talon_template::{Motion, Pilot, WeaponSpec};

impl Simulation {
    pub(crate) fn tick_entity(&mut self, id: SpawnId, dt: f64) {
        self.entity_weapons(id, dt);
        self.entity_movement(id, dt);
    }

    fn entity_movement(&mut self, id: SpawnId, dt: f64) {
        let Some(inst) = self.pool.get(id) else {
            return;
        };
        let template = inst.template().clone();
        let Some(entity) = template.as_entity() else {
            return;
        };
        let position = inst.position;
        let rotation = inst.rotation;
        let elapsed = inst.elapsed;
        let prev_sample = inst.entity_state().and_then(|s| s.last_path_sample);
        let prev_spawner_pos = inst.entity_state().and_then(|s| s.last_spawner_pos);
        let step_scale = entity.speed * dt as f32;

        let mut next_pos = position;
        let mut next_rot = rotation;
        let mut next_sample = prev_sample;

        match &entity.motion {
            Motion::Standard { turn_speed } => match entity.pilot {
                Pilot::Player { device } => {
                    next_pos = position + self.input.move_vector(device) * step_scale;
                    if let Some(bounds) = self.bounds {
                        next_pos = bounds.clamp_point(next_pos);
                    }
                }
                Pilot::Scripted => {
                    next_rot = rotation + turn_speed.to_radians() * dt as f32;
                    next_pos = position + Vec2::from_angle(next_rot) * step_scale;
                }
            },
            Motion::Path { curve } => {
                let t = elapsed as f32;
                if !curve.looping() && t > curve.end_time() {
                    // Off the end of an open path: keep flying straight
                    next_pos = position + Vec2::from_angle(rotation) * step_scale;
                } else {
                    // The curve's own timing drives position; heading
                    // follows the sample-to-sample direction
                    let sample = curve.sample(t);
                    if let Some(prev) = prev_sample {
                        let step = sample.position - prev.position;
                        next_pos = position + step;
                        if step.length() > f32::EPSILON {
                            next_rot = step.angle();
                        }
                    }
                    next_sample = Some(sample);
                }
            }
            Motion::Follow { target, turn_speed } => {
                // An unresolvable target holds the current course
                if let Some(goal) = self.resolve_point(target) {
                    let bearing = position.bearing_to(goal, rotation);
                    let max_turn = turn_speed.to_radians() * dt as f32;
                    next_rot = rotation + bearing.clamp(-max_turn, max_turn);
                }
                next_pos = position + Vec2::from_angle(next_rot) * step_scale;
            }
        }

        let mut next_spawner_pos = prev_spawner_pos;
        if entity.move_with_spawner {
            if let Some(now) = self.resolve_spawner_pos(id) {
                if let Some(prev) = prev_spawner_pos {
                    next_pos = next_pos + (now - prev);
                }
                next_spawner_pos = Some(now);
            }
        }

        let Some(inst) = self.pool.get_mut(id) else {
            return;
        };
        inst.position = next_pos;
        inst.rotation = next_rot;
        if let Some(state) = inst.entity_state_mut() {
            state.last_path_sample = next_sample;
            state.last_spawner_pos = next_spawner_pos;
        }
    }

    /// One weapon slot fires at a time; timers keep counting across slot
    /// rotation and only a phase change resets them.
    fn entity_weapons(&mut self, id: SpawnId, dt: f64) {
        let Some(inst) = self.pool.get(id) else {
            return;
        };
        let template = inst.template().clone();
        let Some(entity) = template.as_entity() else {
            return;
        };

        let (held, just_pressed) = match entity.pilot {
            Pilot::Player { device } => {
                let held = self.input.fire(device) > 0.0;
                let prev = inst.entity_state().map(|s| s.fire_held).unwrap_or(false);
                (held, held && !prev)
            }
            Pilot::Scripted => (true, false),
        };
        let position = inst.position;
        let rotation = inst.rotation;

        // A pickup-granted weapon replaces the whole active set
        let state = inst.entity_state();
        let weapons: Vec<WeaponSpec> = match state.and_then(|s| s.weapon_override.clone()) {
            Some(weapon) => vec![weapon],
            None => {
                let phase = state.map(|s| s.phase).unwrap_or(0);
                let options = entity
                    .phases
                    .get(phase)
                    .map(|p| p.options.clone())
                    .unwrap_or_default();
                if options.is_empty() {
                    template.base_weapon().into_iter().collect()
                } else {
                    options
                }
            }
        };

        let mut shot: Option<WeaponSpec> = None;
        {
            let Some(state) = self.pool.get_mut(id).and_then(|i| i.entity_state_mut()) else {
                return;
            };
            state.fire_held = held;
            if weapons.is_empty() {
                return;
            }
            if state.weapons.len() != weapons.len() {
                state.reset_weapons(weapons.len());
            }
            for timer in &mut state.weapons {
                timer.since_fire += dt;
            }
            state.slot_elapsed += dt;

            // Rotate to the next slot when the active one times out, or
            // right away when rotation lands on a spent fire-once slot
            let current_index = state.slot.min(weapons.len() - 1);
            let current = &weapons[current_index];
            let switch_after = f64::from(current.time_until_switch);
            let timed_out = switch_after > 0.0 && state.slot_elapsed >= switch_after;
            let spent = current.fire_once && state.weapons[current_index].fired;
            if weapons.len() > 1 && (timed_out || spent) {
                state.slot = (state.slot + 1) % weapons.len();
                state.slot_elapsed = 0.0;
            }

            let slot = state.slot.min(weapons.len() - 1);
            let weapon = &weapons[slot];
            let timer = &mut state.weapons[slot];
            let wants = held && (weapon.autofire || just_pressed);
            let ready = timer.since_fire > f64::from(weapon.interval);
            let discharged = weapon.fire_once && timer.fired;
            if wants && ready && !discharged {
                // Full cooldown restart; no remainder carry between shots
                timer.since_fire = 0.0;
                timer.fired = true;
                shot = Some(weapon.clone());
                if weapon.fire_once && weapons.len() > 1 {
                    state.slot = (slot + 1) % weapons.len();
                    state.slot_elapsed = 0.0;
                }
            }
        }

        if let Some(weapon) = shot {
            match self.spawn(&weapon.projectile, position, SpawnerRef::Instance(id)) {
                Ok(projectile) => {
                    if let Some(p) = self.pool.get_mut(projectile) {
                        p.rotation = rotation + weapon.rotation_offset.to_radians();
                    }
                }
                Err(err) => {
                    tracing::warn!(template = %weapon.projectile, error = %err, "projectile spawn failed");
                }
            }
        }
    }

    /// Restore health up to the template maximum. Phase follows health in
    /// both directions, so healing can walk an entity back up its bands.
    pub fn heal(&mut self, id: SpawnId, amount: i32) {
        if amount <= 0 {
            return;
        }
        let Some(inst) = self.pool.get_mut(id) else {
            return;
        };
        if !inst.is_active() {
            return;
        }
        let template = inst.template().clone();
        let Some(entity) = template.as_entity() else {
            return;
        };
        let Some(state) = inst.entity_state_mut() else {
            return;
        };

        state.hp = (state.hp + amount).min(entity.hp);
        let hp = state.hp;
        let mut phase_changed = None;
        if !entity.phases.is_empty() {
            let next = phase_for_health(&entity.phases, hp);
            if next != state.phase {
                state.phase = next;
                state.reset_weapons(slot_count(&entity.phases, next));
                phase_changed = Some(next);
            }
        }

        self.bus.push(SimEvent::HealthChanged {
            id,
            hp,
            max_hp: entity.hp,
        });
        if let Some(phase) = phase_changed {
            self.bus.push(SimEvent::PhaseChanged { id, phase });
        }
    }
}
