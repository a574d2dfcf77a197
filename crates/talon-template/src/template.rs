//! Template asset definitions
//!
//! A template file holds `[template.<name>]` tables. The common table
//! carries the collision profile and sub-spawn references; at most one of
//! the optional `effect` / `entity` / `spawner` / `pickup` sub-tables
//! selects the behavior kind (none means a plain effect spawnable).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use talon_core::{PathCurve, Result, TalonError, Vec2};

/// Trigger condition arming a spawner's emission schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnTrigger {
    /// Fire on first entry into the visible play area
    OnSeen,
    /// Fire as soon as the spawner is activated
    OnPlaced,
    /// Fire only on an explicit external request
    External,
    /// Fire on the stage's player-spawn broadcast
    PlayerSpawn,
}

/// When a spawner removes itself after emitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DespawnCondition {
    /// Never self-despawn from emission completion
    #[default]
    None,
    /// Despawn once every point has been emitted
    AllSpawned,
    /// Despawn once every tracked spawn is gone and each combatant among
    /// them was destroyed by the player
    RequireKill,
}

/// Per-lifecycle audio cues attached to a template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoundSet {
    #[serde(default)]
    pub spawn: Option<String>,
    #[serde(default)]
    pub idle: Option<String>,
    #[serde(default)]
    pub despawn: Option<String>,
    #[serde(default)]
    pub destroy: Option<String>,
}

impl SoundSet {
    pub fn is_empty(&self) -> bool {
        self.spawn.is_none()
            && self.idle.is_none()
            && self.despawn.is_none()
            && self.destroy.is_none()
    }
}

/// A single weapon slot: what to fire and how often
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponSpec {
    /// Template name of the projectile to spawn
    pub projectile: String,
    /// Keep firing while the fire input is held
    #[serde(default = "default_true")]
    pub autofire: bool,
    /// Cooldown between shots, seconds
    #[serde(default = "default_interval")]
    pub interval: f32,
    /// Discharge at most once per phase
    #[serde(default)]
    pub fire_once: bool,
    /// Seconds this slot stays selected before rotating onward
    #[serde(default)]
    pub time_until_switch: f32,
    /// Degrees added to the firing entity's heading
    #[serde(default)]
    pub rotation_offset: f32,
}

fn default_true() -> bool {
    true
}

fn default_interval() -> f32 {
    1.0
}

/// An HP-banded weapon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    /// The phase is selected while current health is at or below this mark
    pub hp_mark: i32,
    /// Weapon slots cycled while the phase is active
    #[serde(default)]
    pub options: Vec<WeaponSpec>,
}

/// How an entity steers each tick
#[derive(Debug, Clone, PartialEq)]
pub enum Motion {
    /// Constant-rate turn, forward at full speed
    Standard { turn_speed: f32 },
    /// Steer along a Catmull-Rom path sampled by elapsed time
    Path { curve: PathCurve },
    /// Turn toward a named target, clamped by the turn rate
    Follow { target: String, turn_speed: f32 },
}

/// Who drives an entity's direction and fire input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pilot {
    /// Template-driven movement, fire input always held
    Scripted,
    /// Input axes from the given device
    Player { device: u32 },
}

/// Combatant configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTemplate {
    pub motion: Motion,
    pub speed: f32,
    pub move_with_spawner: bool,
    pub ram_damage: i32,
    pub misc_self_damage: i32,
    pub hp: i32,
    pub score: i64,
    pub is_boss: bool,
    pub ends_stage: bool,
    pub destroy_spawn: Option<String>,
    /// Sorted ascending by hp_mark at load time
    pub phases: Vec<PhaseSpec>,
    pub pilot: Pilot,
}

/// Emitter configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnerTemplate {
    pub trigger: SpawnTrigger,
    pub spawn: Option<String>,
    /// Offset points relative to the spawner, one emission each
    pub points: Vec<Vec2>,
    /// Degrees applied to the first emission
    pub start_rotation: f32,
    /// Degrees added per emission point
    pub rotation_increment: f32,
    /// Seconds to spread all emissions over; zero fires everything at once
    pub duration: f32,
    pub despawn_condition: DespawnCondition,
}

impl SpawnerTemplate {
    /// Schedule interval between consecutive emission points
    pub fn per_point_interval(&self) -> f64 {
        if self.points.is_empty() {
            0.0
        } else {
            f64::from(self.duration) / self.points.len() as f64
        }
    }
}

/// Effect configuration (plain spawnables and visual effects)
#[derive(Debug, Clone, PartialEq)]
pub struct EffectTemplate {
    /// Animation window in seconds; the effect despawns itself once its
    /// elapsed time passes this. None means no self-removal.
    pub lifetime: Option<f32>,
}

/// What a pickup grants on player contact
#[derive(Debug, Clone, PartialEq)]
pub enum PickupEffect {
    Heal { amount: i32 },
    ScoreBonus { amount: i64 },
    Weapon { weapon: WeaponSpec },
}

/// Pickup configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PickupTemplate {
    pub effect: PickupEffect,
}

/// Behavior kind payload selected by the template's sub-table
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateKind {
    Effect(EffectTemplate),
    Entity(EntityTemplate),
    Spawner(SpawnerTemplate),
    Pickup(PickupTemplate),
}

impl TemplateKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TemplateKind::Effect(_) => "effect",
            TemplateKind::Entity(_) => "entity",
            TemplateKind::Spawner(_) => "spawner",
            TemplateKind::Pickup(_) => "pickup",
        }
    }
}

/// The immutable configuration asset behind every pooled spawnable.
///
/// Pool matching compares template names: a spare instance is only reused
/// for the template name it was last bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnTemplate {
    pub name: String,
    /// Visual asset key handed to the host; the simulation never reads it
    pub sprite: Option<String>,
    pub collision_radius: f32,
    pub collision_layer: u32,
    pub collision_mask: u32,
    /// Seconds between self-interval emissions
    pub interval: f32,
    /// Template spawned every `interval` seconds at the instance position
    pub interval_spawn: Option<String>,
    /// Template spawned at the last position when the instance despawns
    pub despawn_spawn: Option<String>,
    pub sounds: SoundSet,
    pub kind: TemplateKind,
}

impl SpawnTemplate {
    pub fn is_entity(&self) -> bool {
        matches!(self.kind, TemplateKind::Entity(_))
    }

    pub fn as_entity(&self) -> Option<&EntityTemplate> {
        match &self.kind {
            TemplateKind::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_spawner(&self) -> Option<&SpawnerTemplate> {
        match &self.kind {
            TemplateKind::Spawner(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_pickup(&self) -> Option<&PickupTemplate> {
        match &self.kind {
            TemplateKind::Pickup(p) => Some(p),
            _ => None,
        }
    }

    /// The unphased fallback weapon built from the interval-spawn fields
    pub fn base_weapon(&self) -> Option<WeaponSpec> {
        self.interval_spawn.as_ref().map(|projectile| WeaponSpec {
            projectile: projectile.clone(),
            autofire: true,
            interval: self.interval,
            fire_once: false,
            time_until_switch: 0.0,
            rotation_offset: 0.0,
        })
    }
}

/// TOML file format for templates
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateFile {
    #[serde(default)]
    pub template: HashMap<String, TemplateDef>,
}

/// Template definition as it appears in TOML files
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateDef {
    #[serde(default)]
    pub sprite: Option<String>,
    #[serde(default = "default_radius")]
    pub collision_radius: f32,
    #[serde(default)]
    pub collision_layer: u32,
    #[serde(default)]
    pub collision_mask: u32,
    #[serde(default = "default_interval")]
    pub interval: f32,
    #[serde(default)]
    pub interval_spawn: Option<String>,
    #[serde(default)]
    pub despawn_spawn: Option<String>,
    #[serde(default)]
    pub sounds: SoundSet,
    #[serde(default)]
    pub effect: Option<EffectDef>,
    #[serde(default)]
    pub entity: Option<EntityDef>,
    #[serde(default)]
    pub spawner: Option<SpawnerDef>,
    #[serde(default)]
    pub pickup: Option<PickupDef>,
}

fn default_radius() -> f32 {
    0.5
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EffectDef {
    #[serde(default)]
    pub lifetime: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityDef {
    #[serde(default)]
    pub speed: f32,
    /// Degrees per second for standard and follow motion
    #[serde(default)]
    pub turn_speed: f32,
    #[serde(default)]
    pub path: Option<Vec<[f32; 2]>>,
    #[serde(default)]
    pub loop_path: bool,
    #[serde(default)]
    pub follow: Option<String>,
    #[serde(default)]
    pub move_with_spawner: bool,
    #[serde(default)]
    pub ram_damage: i32,
    #[serde(default)]
    pub misc_self_damage: i32,
    #[serde(default = "default_hp")]
    pub hp: i32,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub is_boss: bool,
    #[serde(default)]
    pub ends_stage: bool,
    #[serde(default)]
    pub destroy_spawn: Option<String>,
    #[serde(default)]
    pub phases: Vec<PhaseSpec>,
    /// Input device id; presence makes this a player-piloted entity
    #[serde(default)]
    pub device: Option<u32>,
}

fn default_hp() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpawnerDef {
    pub trigger: SpawnTrigger,
    #[serde(default)]
    pub spawn: Option<String>,
    #[serde(default = "default_points")]
    pub points: Vec<[f32; 2]>,
    #[serde(default)]
    pub start_rotation: f32,
    #[serde(default)]
    pub rotation_increment: f32,
    #[serde(default)]
    pub duration: f32,
    #[serde(default)]
    pub despawn_condition: DespawnCondition,
}

fn default_points() -> Vec<[f32; 2]> {
    vec![[0.0, 0.0]]
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PickupDef {
    #[serde(default)]
    pub heal: Option<i32>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub weapon: Option<WeaponSpec>,
}

impl TemplateDef {
    /// Build the runtime template, resolving the behavior kind from the
    /// sub-tables. More than one sub-table is a configuration error.
    pub fn into_template(self, name: &str) -> Result<SpawnTemplate> {
        let sub_tables = [
            self.effect.is_some(),
            self.entity.is_some(),
            self.spawner.is_some(),
            self.pickup.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count();
        if sub_tables > 1 {
            return Err(TalonError::ValidationError(format!(
                "template '{}' declares more than one behavior kind",
                name
            )));
        }

        if self.interval <= 0.0 {
            return Err(TalonError::ValueOutOfRange {
                field: format!("template.{}.interval", name),
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
                value: f64::from(self.interval),
            });
        }

        let kind = if let Some(entity) = self.entity {
            TemplateKind::Entity(entity.into_entity(name)?)
        } else if let Some(spawner) = self.spawner {
            TemplateKind::Spawner(spawner.into_spawner(name)?)
        } else if let Some(pickup) = self.pickup {
            TemplateKind::Pickup(pickup.into_pickup(name)?)
        } else {
            let effect = self.effect.unwrap_or_default();
            TemplateKind::Effect(EffectTemplate {
                lifetime: effect.lifetime,
            })
        };

        Ok(SpawnTemplate {
            name: name.to_string(),
            sprite: self.sprite,
            collision_radius: self.collision_radius,
            collision_layer: self.collision_layer,
            collision_mask: self.collision_mask,
            interval: self.interval,
            interval_spawn: self.interval_spawn,
            despawn_spawn: self.despawn_spawn,
            sounds: self.sounds,
            kind,
        })
    }
}

impl EntityDef {
    fn into_entity(self, name: &str) -> Result<EntityTemplate> {
        if self.path.is_some() && self.follow.is_some() {
            return Err(TalonError::ValidationError(format!(
                "entity '{}' sets both path and follow motion",
                name
            )));
        }

        let motion = if let Some(raw_points) = self.path {
            if raw_points.len() < 2 {
                return Err(TalonError::ValidationError(format!(
                    "entity '{}' path needs at least 2 points",
                    name
                )));
            }
            let points = raw_points.into_iter().map(Vec2::from_array).collect();
            Motion::Path {
                curve: PathCurve::new(points, self.loop_path),
            }
        } else if let Some(target) = self.follow {
            Motion::Follow {
                target,
                turn_speed: self.turn_speed,
            }
        } else {
            Motion::Standard {
                turn_speed: self.turn_speed,
            }
        };

        let mut phases = self.phases;
        phases.sort_by_key(|p| p.hp_mark);

        Ok(EntityTemplate {
            motion,
            speed: self.speed,
            move_with_spawner: self.move_with_spawner,
            ram_damage: self.ram_damage,
            misc_self_damage: self.misc_self_damage,
            hp: self.hp,
            score: self.score,
            is_boss: self.is_boss,
            ends_stage: self.ends_stage,
            destroy_spawn: self.destroy_spawn,
            phases,
            pilot: match self.device {
                Some(device) => Pilot::Player { device },
                None => Pilot::Scripted,
            },
        })
    }
}

impl SpawnerDef {
    fn into_spawner(self, name: &str) -> Result<SpawnerTemplate> {
        if self.points.is_empty() {
            return Err(TalonError::ValidationError(format!(
                "spawner '{}' has no emission points",
                name
            )));
        }
        if self.duration < 0.0 {
            return Err(TalonError::ValueOutOfRange {
                field: format!("template.{}.spawner.duration", name),
                min: 0.0,
                max: f64::MAX,
                value: f64::from(self.duration),
            });
        }

        Ok(SpawnerTemplate {
            trigger: self.trigger,
            spawn: self.spawn,
            points: self.points.into_iter().map(Vec2::from_array).collect(),
            start_rotation: self.start_rotation,
            rotation_increment: self.rotation_increment,
            duration: self.duration,
            despawn_condition: self.despawn_condition,
        })
    }
}

impl PickupDef {
    fn into_pickup(self, name: &str) -> Result<PickupTemplate> {
        let effect = match (self.heal, self.score, self.weapon) {
            (Some(amount), None, None) => PickupEffect::Heal { amount },
            (None, Some(amount), None) => PickupEffect::ScoreBonus { amount },
            (None, None, Some(weapon)) => PickupEffect::Weapon { weapon },
            _ => {
                return Err(TalonError::ValidationError(format!(
                    "pickup '{}' must set exactly one of heal, score, weapon",
                    name
                )))
            }
        };
        Ok(PickupTemplate { effect })
    }
}
