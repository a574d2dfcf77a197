//! Stage driver
//!
//! A [`Stage`] owns the scripted layer above the simulation: the scroll
//! that carries the view and the players through a static world, the
//! pre-placed actors, and the position-keyed triggers. It feeds one
//! simulation tick per frame and watches the returned events for boss
//! deaths that disable linked triggers.

use crate::format::StageFile;
use crate::trigger::{StageTrigger, TriggerAction};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use talon_core::{Rect, Result, SpawnId, TalonError, Vec2};
use talon_sim::{CheckpointRecord, SimEvent, Simulation, SpawnerRef};

/// A pre-placed actor as authored in the stage file
#[derive(Debug, Clone)]
pub struct StageActor {
    pub template: String,
    pub position: Vec2,
    /// Heading in radians
    pub rotation: f32,
    pub name: Option<String>,
    pub active: bool,
}

/// One loaded stage: scroll state, placed actors, and triggers
#[derive(Debug)]
pub struct Stage {
    pub(crate) name: String,
    /// Current scroll velocity; `ChangeScroll` triggers rewrite it
    pub(crate) scroll: Vec2,
    pub(crate) base_scroll: Vec2,
    /// Stage position, the center of the view rect
    pub(crate) position: Vec2,
    pub(crate) view_size: Vec2,
    pub(crate) bounds_size: Option<Vec2>,
    pub(crate) alarm_sound: Option<String>,
    pub(crate) anchors: HashMap<String, Vec2>,
    pub(crate) walls: Vec<Rect>,
    pub(crate) actors: Vec<StageActor>,
    pub(crate) triggers: Vec<StageTrigger>,
    /// Ids handed back by the pool at `start`, index-aligned with `actors`
    pub(crate) placed: Vec<SpawnId>,
}

impl Stage {
    /// Load a stage from a TOML file
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load a stage from a TOML string
    pub fn load_str(content: &str) -> Result<Self> {
        let file: StageFile = toml::from_str(content)?;
        file.into_stage()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn scroll(&self) -> Vec2 {
        self.scroll
    }

    pub fn alarm_sound(&self) -> Option<&str> {
        self.alarm_sound.as_deref()
    }

    pub fn actors(&self) -> &[StageActor] {
        &self.actors
    }

    pub fn triggers(&self) -> &[StageTrigger] {
        &self.triggers
    }

    pub fn trigger_names(&self) -> Vec<&str> {
        self.triggers.iter().map(|t| t.name.as_str()).collect()
    }

    /// Ids of the pre-placed actors; empty before `start`
    pub fn placed(&self) -> &[SpawnId] {
        &self.placed
    }

    /// Begin the stage from the top: clears score and checkpoints, seeds
    /// anchors and walls, places every authored actor, and broadcasts the
    /// player spawn that arms waiting spawners.
    pub fn start(&mut self, sim: &mut Simulation) -> Result<()> {
        sim.clear_stats();
        for (name, position) in &self.anchors {
            sim.register_anchor(name, *position);
        }
        for wall in &self.walls {
            sim.add_wall(*wall);
        }

        self.position = Vec2::ZERO;
        self.scroll = self.base_scroll;
        self.apply_view(sim);

        self.placed.clear();
        for actor in &self.actors {
            let id = sim.place(
                &actor.template,
                actor.position,
                actor.rotation,
                actor.name.as_deref(),
                actor.active,
            )?;
            self.placed.push(id);
        }

        sim.push_event(SimEvent::StageStart);
        sim.broadcast_player_spawn();
        Ok(())
    }

    /// Advance the stage and the simulation by one frame.
    ///
    /// The scroll moves the stage position and carries the movables with
    /// it, so players and their escorts hold their place on screen while
    /// the world slides past. Triggers are checked against the new
    /// position before the simulation steps.
    pub fn tick(&mut self, sim: &mut Simulation, dt: f64) -> Vec<SimEvent> {
        let step = self.scroll * dt as f32;
        if step != Vec2::ZERO {
            self.position = self.position + step;
            sim.shift_movables(step);
        }
        self.apply_view(sim);

        let fired: Vec<usize> = self
            .triggers
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.disabled && t.satisfied(self.position, self.scroll, sim.view()))
            .map(|(i, _)| i)
            .collect();
        for index in fired {
            self.fire_trigger(index, sim);
        }

        let events = sim.tick(dt);
        for event in &events {
            if let SimEvent::BossDestroyed { template, .. } = event {
                for trigger in &mut self.triggers {
                    if trigger.boss_link.as_deref() == Some(template.as_str()) {
                        trigger.disabled = true;
                    }
                }
            }
        }
        events
    }

    /// Rebuild the field from the last checkpoint and resume.
    ///
    /// Placed actors are reconfigured to their authored pose, saved
    /// spawner schedules and trigger flags are restored over that, and
    /// the stage jumps to the checkpoint anchor with the movables in tow.
    pub fn restart_from_checkpoint(&mut self, sim: &mut Simulation) -> Result<()> {
        if self.placed.len() != self.actors.len() {
            return Err(TalonError::StageError(
                "stage has not been started".to_string(),
            ));
        }

        sim.clear_field();

        for trigger in &mut self.triggers {
            trigger.disabled = false;
        }
        self.scroll = self.base_scroll;
        self.position = Vec2::ZERO;

        for (id, actor) in self.placed.iter().zip(&self.actors) {
            if let Some(inst) = sim.instance_mut(*id) {
                let template = inst.template().clone();
                inst.configure(template, actor.position, actor.rotation, SpawnerRef::World);
            }
        }

        sim.load_checkpoint();
        self.load_trigger_states(sim);

        // Activation after the load: placement and player-spawn fires
        // override restored schedules, external spawners keep theirs.
        for (id, actor) in self.placed.iter().zip(&self.actors) {
            if actor.active {
                sim.set_active(*id, true);
            }
        }

        if let Some(anchor) = sim.checkpoints.anchor().cloned() {
            let delta = anchor.position - self.position;
            self.position = anchor.position;
            sim.shift_movables(delta);
        }
        self.apply_view(sim);

        sim.push_event(SimEvent::StageStart);
        sim.broadcast_player_spawn();
        Ok(())
    }

    fn apply_view(&self, sim: &mut Simulation) {
        sim.set_view(Rect::from_center_size(self.position, self.view_size));
        let bounds_size = self.bounds_size.unwrap_or(self.view_size);
        sim.set_bounds(Some(Rect::from_center_size(self.position, bounds_size)));
    }

    fn fire_trigger(&mut self, index: usize, sim: &mut Simulation) {
        let name = self.triggers[index].name.clone();
        let position = self.triggers[index].position;
        let action = self.triggers[index].action.clone();
        let fire_once = self.triggers[index].fire_once;
        tracing::debug!(trigger = %name, "stage trigger fired");
        sim.push_event(SimEvent::StageTriggered { name: name.clone() });

        match action {
            TriggerAction::EventOnly => {}
            TriggerAction::Checkpoint => {
                sim.checkpoints.set_anchor(&name, position);
                sim.save_checkpoint();
                // Saved before the fire-once flag lands, so the restored
                // trigger is armed and re-saves on the next pass.
                self.save_trigger_states(sim);
            }
            TriggerAction::Jump { to, move_all } => match sim.resolve_point(&to) {
                Some(dest) => {
                    let delta = dest - self.position;
                    if move_all {
                        sim.shift_active(delta);
                    } else {
                        sim.shift_movables(delta);
                    }
                    self.position = dest;
                    self.apply_view(sim);
                }
                None => {
                    tracing::warn!(trigger = %name, target = %to, "jump destination did not resolve");
                }
            },
            TriggerAction::ChangeScroll { to } => {
                self.scroll = to;
            }
            TriggerAction::BossAlarm => {
                sim.push_event(SimEvent::BossAlarm);
            }
        }

        if fire_once {
            self.triggers[index].disabled = true;
        }
    }

    fn save_trigger_states(&self, sim: &mut Simulation) {
        for trigger in &self.triggers {
            sim.checkpoints.set(
                trigger.name.clone(),
                CheckpointRecord::Trigger {
                    disabled: trigger.disabled,
                },
            );
        }
    }

    fn load_trigger_states(&mut self, sim: &Simulation) {
        for trigger in &mut self.triggers {
            if let Some(CheckpointRecord::Trigger { disabled }) = sim.checkpoints.get(&trigger.name)
            {
                trigger.disabled = *disabled;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use talon_sim::BehaviorState;
    use talon_template::{
        DespawnCondition, EntityTemplate, Motion, Pilot, SoundSet, SpawnTemplate,
        SpawnTrigger, SpawnerTemplate, TemplateBank, TemplateKind,
    };

    const DT: f64 = 0.25;

    fn entity(name: &str, entity: EntityTemplate) -> SpawnTemplate {
        SpawnTemplate {
            name: name.to_string(),
            sprite: None,
            collision_radius: 0.2,
            collision_layer: 1,
            collision_mask: 0,
            interval: 1.0,
            interval_spawn: None,
            despawn_spawn: None,
            sounds: SoundSet::default(),
            kind: TemplateKind::Entity(entity),
        }
    }

    fn drone_body() -> EntityTemplate {
        EntityTemplate {
            motion: Motion::Standard { turn_speed: 0.0 },
            speed: 0.0,
            move_with_spawner: false,
            ram_damage: 0,
            misc_self_damage: 0,
            hp: 1,
            score: 100,
            is_boss: false,
            ends_stage: false,
            destroy_spawn: None,
            phases: Vec::new(),
            pilot: Pilot::Scripted,
        }
    }

    fn sim_with(templates: Vec<SpawnTemplate>) -> Simulation {
        let mut bank = TemplateBank::new();
        for t in templates {
            bank.insert(t);
        }
        Simulation::new(Arc::new(bank))
    }

    fn base_sim() -> Simulation {
        let player = entity(
            "player_ship",
            EntityTemplate {
                hp: 3,
                score: 0,
                pilot: Pilot::Player { device: 0 },
                ..drone_body()
            },
        );
        let drone = entity("drone", drone_body());
        let boss = entity(
            "boss_core",
            EntityTemplate {
                is_boss: true,
                score: 500,
                ..drone_body()
            },
        );
        let wave = SpawnTemplate {
            name: "wave".to_string(),
            sprite: None,
            collision_radius: 0.2,
            collision_layer: 1,
            collision_mask: 0,
            interval: 1.0,
            interval_spawn: None,
            despawn_spawn: None,
            sounds: SoundSet::default(),
            kind: TemplateKind::Spawner(SpawnerTemplate {
                trigger: SpawnTrigger::External,
                spawn: Some("drone".to_string()),
                points: (0..4).map(|i| Vec2::new(i as f32, 0.0)).collect(),
                start_rotation: 0.0,
                rotation_increment: 0.0,
                duration: 1.0,
                despawn_condition: DespawnCondition::None,
            }),
        };
        sim_with(vec![player, drone, boss, wave])
    }

    fn count(sim: &Simulation, template: &str) -> usize {
        sim.pool()
            .active_ids()
            .iter()
            .filter(|&&id| {
                sim.instance(id)
                    .map(|i| i.template_name() == template)
                    .unwrap_or(false)
            })
            .count()
    }

    fn trigger_count(events: &[SimEvent], name: &str) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, SimEvent::StageTriggered { name: n } if n == name))
            .count()
    }

    #[test]
    fn test_scroll_fires_pass_trigger_once() {
        let raw = r#"
            [stage]
            name = "s"
            scroll = [0.0, -4.0]

            [[triggers]]
            name = "gate"
            position = [0.0, -1.0]
            condition = "pass_y"
        "#;
        let mut stage = Stage::load_str(raw).unwrap();
        let mut sim = base_sim();
        stage.start(&mut sim).unwrap();

        let mut fired = 0;
        for _ in 0..8 {
            let events = stage.tick(&mut sim, DT);
            fired += trigger_count(&events, "gate");
        }
        assert_eq!(fired, 1, "fire-once trigger must not repeat");
        assert!(stage.triggers()[0].disabled);
    }

    #[test]
    fn test_change_scroll_trigger_rewrites_the_scroll() {
        let raw = r#"
            [stage]
            name = "s"
            scroll = [0.0, -4.0]

            [[triggers]]
            name = "hold"
            position = [0.0, -1.0]
            condition = "pass_y"
            action = { change_scroll = { to = [0.0, 0.0] } }
        "#;
        let mut stage = Stage::load_str(raw).unwrap();
        let mut sim = base_sim();
        stage.start(&mut sim).unwrap();

        stage.tick(&mut sim, DT);
        stage.tick(&mut sim, DT);
        assert_eq!(stage.scroll(), Vec2::ZERO);
        let held = stage.position();
        stage.tick(&mut sim, DT);
        assert_eq!(stage.position(), held, "zero scroll holds the position");
    }

    #[test]
    fn test_checkpoint_action_saves_anchor_records_and_score() {
        let raw = r#"
            [stage]
            name = "s"
            scroll = [0.0, -4.0]

            [[actors]]
            template = "wave"
            position = [0.0, -20.0]
            name = "wave_1"

            [[triggers]]
            name = "mid"
            position = [0.0, -1.0]
            condition = "pass_y"
            action = "checkpoint"
        "#;
        let mut stage = Stage::load_str(raw).unwrap();
        let mut sim = base_sim();
        stage.start(&mut sim).unwrap();

        let drone = sim.spawn("drone", Vec2::ZERO, SpawnerRef::World).unwrap();
        sim.apply_damage(drone, 1, true);
        assert_eq!(sim.score(), 100);

        stage.tick(&mut sim, DT);
        stage.tick(&mut sim, DT);

        let anchor = sim.checkpoints.anchor().expect("checkpoint anchor set");
        assert_eq!(anchor.name, "mid");
        assert_eq!(anchor.position, Vec2::new(0.0, -1.0));
        assert_eq!(sim.checkpoints.score(), 100);
        assert_eq!(
            sim.checkpoints.get("mid"),
            Some(&CheckpointRecord::Trigger { disabled: false }),
            "the firing trigger saves as still armed"
        );
        assert!(matches!(
            sim.checkpoints.get("wave_1"),
            Some(CheckpointRecord::Spawner { .. })
        ));
    }

    #[test]
    fn test_jump_carries_movables_and_recenters_the_view() {
        let raw = r#"
            [stage]
            name = "s"
            scroll = [0.0, -4.0]

            [anchors]
            arena = [0.0, -50.0]

            [[actors]]
            template = "player_ship"
            position = [0.0, 10.0]
            name = "player_1"

            [[triggers]]
            name = "leap"
            position = [0.0, -1.0]
            condition = "pass_y"
            action = { jump = { to = "arena" } }
        "#;
        let mut stage = Stage::load_str(raw).unwrap();
        let mut sim = base_sim();
        stage.start(&mut sim).unwrap();

        stage.tick(&mut sim, DT);
        stage.tick(&mut sim, DT);

        assert_eq!(stage.position(), Vec2::new(0.0, -50.0));
        assert_eq!(sim.view().center(), Vec2::new(0.0, -50.0));
        let player = sim.named("player_1").unwrap();
        let pos = sim.instance(player).unwrap().position;
        assert_eq!(pos, Vec2::new(0.0, -40.0), "player keeps its screen offset");
    }

    #[test]
    fn test_boss_death_disables_linked_triggers() {
        let raw = r#"
            [stage]
            name = "s"

            [[triggers]]
            name = "alarm"
            position = [0.0, -1000.0]
            condition = "pass_y"
            action = "boss_alarm"
            fire_once = false
            boss_link = "boss_core"
        "#;
        let mut stage = Stage::load_str(raw).unwrap();
        let mut sim = base_sim();
        stage.start(&mut sim).unwrap();
        stage.tick(&mut sim, DT);

        let boss = sim
            .spawn("boss_core", Vec2::new(0.0, -5.0), SpawnerRef::World)
            .unwrap();
        sim.apply_damage(boss, 1, true);
        let events = stage.tick(&mut sim, DT);

        assert!(events
            .iter()
            .any(|e| matches!(e, SimEvent::BossDestroyed { .. })));
        assert!(stage.triggers()[0].disabled);
    }

    #[test]
    fn test_restart_resumes_schedule_score_and_position() {
        let raw = r#"
            [stage]
            name = "s"
            scroll = [0.0, -4.0]

            [[actors]]
            template = "player_ship"
            position = [0.0, 10.0]
            name = "player_1"

            [[actors]]
            template = "wave"
            position = [0.0, -20.0]
            name = "wave_1"

            [[triggers]]
            name = "mid"
            position = [0.0, -1.0]
            condition = "pass_y"
            action = "checkpoint"
        "#;
        let mut stage = Stage::load_str(raw).unwrap();
        let mut sim = base_sim();
        stage.start(&mut sim).unwrap();
        let wave = sim.named("wave_1").unwrap();

        let drone = sim.spawn("drone", Vec2::ZERO, SpawnerRef::World).unwrap();
        sim.apply_damage(drone, 1, true);

        assert!(sim.trigger_spawner(wave));
        stage.tick(&mut sim, DT);
        assert_eq!(count(&sim, "drone"), 1);
        stage.tick(&mut sim, DT);

        stage.restart_from_checkpoint(&mut sim).unwrap();

        assert_eq!(stage.position(), Vec2::new(0.0, -1.0));
        assert_eq!(sim.score(), 100, "score comes back from the checkpoint");
        assert_eq!(count(&sim, "drone"), 0, "the field is swept on restart");
        let player = sim.named("player_1").unwrap();
        assert_eq!(
            sim.instance(player).unwrap().position,
            Vec2::new(0.0, 9.0),
            "players ride the jump to the anchor"
        );
        match &sim.instance(wave).unwrap().state {
            BehaviorState::Spawner(state) => {
                assert_eq!(state.progress, Some(1), "schedule restored mid-run");
            }
            other => panic!("expected spawner state, got {other:?}"),
        }

        // One emission landed before the save, so the resumed schedule
        // owes its second point after half the duration.
        stage.tick(&mut sim, DT);
        assert_eq!(count(&sim, "drone"), 0);
        stage.tick(&mut sim, DT);
        assert_eq!(count(&sim, "drone"), 1);
    }

    #[test]
    fn test_restart_before_start_is_an_error() {
        let raw = r#"
            [stage]
            name = "s"

            [[actors]]
            template = "drone"
            position = [0.0, 0.0]
        "#;
        let mut stage = Stage::load_str(raw).unwrap();
        let mut sim = base_sim();
        assert!(matches!(
            stage.restart_from_checkpoint(&mut sim),
            Err(TalonError::StageError(_))
        ));
    }
}
