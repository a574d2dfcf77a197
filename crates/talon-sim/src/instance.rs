//! Pooled instance state
//!
//! An `Instance` is one reusable simulation object: a template binding
//! plus the mutable state the tick passes drive. Construction happens at
//! most once per pool slot; after that the same instance is reconfigured
//! in place every time it is recycled out of the spare set.

use std::sync::Arc;
use talon_core::{PathSample, SpawnId, Vec2};
use talon_template::{PhaseSpec, Pilot, SpawnTemplate, TemplateKind, WeaponSpec};

/// Weak reference to whatever created an instance.
///
/// Resolved through the pool (or the anchor table) on demand; holding an
/// id instead of a reference keeps recycled instances from pinning each
/// other alive.
#[derive(Debug, Clone, PartialEq)]
pub enum SpawnerRef {
    /// No creator: stage-authored or spawned directly by the host
    World,
    /// Created by another pooled instance
    Instance(SpawnId),
    /// Anchored to a named world position
    Anchor(String),
}

/// Cooldown bookkeeping for one weapon slot
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeaponTimer {
    /// Seconds since this slot last fired
    pub since_fire: f64,
    /// Set after the first shot; gates fire-once slots
    pub fired: bool,
}

/// Mutable combatant state
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub hp: i32,
    /// Index into the template's ascending phase list
    pub phase: usize,
    /// One timer per weapon slot of the active phase (or the single base
    /// weapon when unphased)
    pub weapons: Vec<WeaponTimer>,
    /// Active slot within the current phase
    pub slot: usize,
    /// Seconds the active slot has been selected
    pub slot_elapsed: f64,
    /// Weapon granted by a pickup; replaces the base weapon while held
    pub weapon_override: Option<WeaponSpec>,
    /// Spawner position at the previous tick, for move-with-spawner
    pub last_spawner_pos: Option<Vec2>,
    /// Previous path sample, for heading along path motion
    pub last_path_sample: Option<PathSample>,
    /// Fire input was held on the previous tick
    pub fire_held: bool,
}

impl EntityState {
    pub fn new(template: &talon_template::EntityTemplate) -> Self {
        let phase = phase_for_health(&template.phases, template.hp);
        let mut state = Self {
            hp: template.hp,
            phase,
            weapons: Vec::new(),
            slot: 0,
            slot_elapsed: 0.0,
            weapon_override: None,
            last_spawner_pos: None,
            last_path_sample: None,
            fire_held: false,
        };
        state.reset_weapons(slot_count(&template.phases, phase));
        state
    }

    /// Zero every slot timer and reselect the first slot
    pub fn reset_weapons(&mut self, slots: usize) {
        self.weapons = vec![WeaponTimer::default(); slots.max(1)];
        self.slot = 0;
        self.slot_elapsed = 0.0;
    }
}

/// Number of weapon slots the given phase provides (1 when unphased)
pub fn slot_count(phases: &[PhaseSpec], phase: usize) -> usize {
    phases
        .get(phase)
        .map(|p| p.options.len().max(1))
        .unwrap_or(1)
}

/// Select the phase for a health value: the smallest threshold still at
/// or above `hp`, with health above every threshold landing in the last
/// (highest) phase. Monotonic in health by construction, given the
/// ascending sort applied at template load.
pub fn phase_for_health(phases: &[PhaseSpec], hp: i32) -> usize {
    if phases.is_empty() {
        return 0;
    }
    phases
        .iter()
        .position(|p| p.hp_mark >= hp)
        .unwrap_or(phases.len() - 1)
}

/// Mutable emitter state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnerState {
    /// Elapsed time at the moment the schedule was (re)armed
    pub fire_start: f64,
    /// Spawn counter into the point list; None until triggered
    pub progress: Option<usize>,
    /// Live spawns registered for kill tracking
    pub tracked: Vec<SpawnId>,
    /// Tracked combatants not yet destroyed with player attribution
    pub unkilled: usize,
}

/// Behavior payload dispatched by the simulation loop
#[derive(Debug, Clone, PartialEq)]
pub enum BehaviorState {
    Effect,
    Entity(EntityState),
    Spawner(SpawnerState),
    Pickup,
}

impl BehaviorState {
    pub fn for_template(template: &SpawnTemplate) -> Self {
        match &template.kind {
            TemplateKind::Effect(_) => BehaviorState::Effect,
            TemplateKind::Entity(entity) => BehaviorState::Entity(EntityState::new(entity)),
            TemplateKind::Spawner(_) => BehaviorState::Spawner(SpawnerState::default()),
            TemplateKind::Pickup(_) => BehaviorState::Pickup,
        }
    }
}

/// A live, reusable simulation object bound to a template
#[derive(Debug, Clone)]
pub struct Instance {
    id: SpawnId,
    template: Arc<SpawnTemplate>,
    /// Drives collision groups and visibility together; flipped only
    /// through the simulation's activation path
    pub(crate) active: bool,
    pub position: Vec2,
    /// Heading in radians
    pub rotation: f32,
    /// Simulation seconds since last (re)activation
    pub elapsed: f64,
    pub spawner: SpawnerRef,
    /// Creator chain traces back to a player
    pub player_spawned: bool,
    /// Has entered the view at least once since activation
    pub seen: bool,
    /// Stable actor name; only pre-placed instances have one
    pub name: Option<String>,
    pub state: BehaviorState,
}

impl Instance {
    pub fn new(
        id: SpawnId,
        template: Arc<SpawnTemplate>,
        position: Vec2,
        rotation: f32,
        spawner: SpawnerRef,
    ) -> Self {
        let state = BehaviorState::for_template(&template);
        Self {
            id,
            template,
            active: false,
            position,
            rotation,
            elapsed: 0.0,
            spawner,
            player_spawned: false,
            seen: false,
            name: None,
            state,
        }
    }

    /// Rebind for reuse out of the spare set: fresh behavior state, timers
    /// and flags cleared, pose set. The active flag is left for the
    /// activation path.
    pub fn configure(
        &mut self,
        template: Arc<SpawnTemplate>,
        position: Vec2,
        rotation: f32,
        spawner: SpawnerRef,
    ) {
        self.state = BehaviorState::for_template(&template);
        self.template = template;
        self.position = position;
        self.rotation = rotation;
        self.elapsed = 0.0;
        self.spawner = spawner;
        self.player_spawned = false;
        self.seen = false;
    }

    /// Swap the bound template without touching pose or behavior state.
    /// Checkpoint restore uses this; everything else goes through
    /// `configure`.
    pub(crate) fn rebind_template(&mut self, template: Arc<SpawnTemplate>) {
        self.template = template;
    }

    pub fn id(&self) -> SpawnId {
        self.id
    }

    pub fn template(&self) -> &Arc<SpawnTemplate> {
        &self.template
    }

    pub fn template_name(&self) -> &str {
        &self.template.name
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Visibility mirrors the active flag
    pub fn is_visible(&self) -> bool {
        self.active
    }

    pub fn is_player(&self) -> bool {
        matches!(
            self.template.as_entity().map(|e| e.pilot),
            Some(Pilot::Player { .. })
        )
    }

    /// Player-piloted or spawned down a player-attributed chain
    pub fn is_player_attributed(&self) -> bool {
        self.is_player() || self.player_spawned
    }

    pub fn entity_state(&self) -> Option<&EntityState> {
        match &self.state {
            BehaviorState::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn entity_state_mut(&mut self) -> Option<&mut EntityState> {
        match &mut self.state {
            BehaviorState::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn spawner_state(&self) -> Option<&SpawnerState> {
        match &self.state {
            BehaviorState::Spawner(s) => Some(s),
            _ => None,
        }
    }

    pub fn spawner_state_mut(&mut self) -> Option<&mut SpawnerState> {
        match &mut self.state {
            BehaviorState::Spawner(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phases(marks: &[i32]) -> Vec<PhaseSpec> {
        marks
            .iter()
            .map(|&hp_mark| PhaseSpec {
                hp_mark,
                options: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn test_phase_boundary_selection() {
        let phases = phases(&[3, 6, 10]);
        // Full health sits in the highest band
        assert_eq!(phase_for_health(&phases, 10), 2);
        assert_eq!(phase_for_health(&phases, 8), 2);
        // One hit from 8 to 5 lands in the 6 band, not the 3 band
        assert_eq!(phase_for_health(&phases, 5), 1);
        assert_eq!(phase_for_health(&phases, 6), 1);
        assert_eq!(phase_for_health(&phases, 3), 0);
        assert_eq!(phase_for_health(&phases, 1), 0);
    }

    #[test]
    fn test_phase_monotonic_in_health() {
        let phases = phases(&[2, 5, 9, 14]);
        let mut last_mark = i32::MIN;
        for hp in 1..=20 {
            let mark = phases[phase_for_health(&phases, hp)].hp_mark;
            assert!(
                mark >= last_mark,
                "threshold decreased between hp {} and {}",
                hp - 1,
                hp
            );
            last_mark = mark;
        }
    }

    #[test]
    fn test_health_above_all_marks_uses_last_phase() {
        let phases = phases(&[3, 6]);
        assert_eq!(phase_for_health(&phases, 40), 1);
    }

    #[test]
    fn test_no_phases_selects_zero() {
        assert_eq!(phase_for_health(&[], 7), 0);
    }

    #[test]
    fn test_reset_weapons_always_has_a_slot() {
        let mut state = EntityState {
            hp: 1,
            phase: 0,
            weapons: Vec::new(),
            slot: 3,
            slot_elapsed: 2.0,
            weapon_override: None,
            last_spawner_pos: None,
            last_path_sample: None,
            fire_held: true,
        };
        state.reset_weapons(0);
        assert_eq!(state.weapons.len(), 1);
        assert_eq!(state.slot, 0);
        assert_eq!(state.slot_elapsed, 0.0);
        assert!(!state.weapons[0].fired);
    }
}
