//! Stage file schema
//!
//! Stages are authored as TOML: a `[stage]` header, an `[anchors]` table
//! of named points, and `[[actors]]` / `[[triggers]]` / `[[walls]]`
//! arrays. Positions are `[x, y]` arrays in stage space and rotations are
//! degrees; conversion to runtime types happens in one pass with
//! cross-reference validation.

use crate::stage::{Stage, StageActor};
use crate::trigger::{StageTrigger, TriggerAction, TriggerCondition};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use talon_core::{Rect, Result, TalonError, Vec2};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageFile {
    pub stage: StageDef,
    #[serde(default)]
    pub anchors: HashMap<String, [f32; 2]>,
    #[serde(default)]
    pub actors: Vec<ActorDef>,
    #[serde(default)]
    pub triggers: Vec<TriggerDef>,
    #[serde(default)]
    pub walls: Vec<WallDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDef {
    pub name: String,
    /// Stage scroll velocity, units per second
    #[serde(default)]
    pub scroll: [f32; 2],
    /// View rectangle size, centered on the stage position
    #[serde(default = "default_view")]
    pub view: [f32; 2],
    /// Player movement area size; defaults to the view size
    #[serde(default)]
    pub bounds: Option<[f32; 2]>,
    /// Cue played on the boss alarm broadcast
    #[serde(default)]
    pub alarm_sound: Option<String>,
}

fn default_view() -> [f32; 2] {
    [48.0, 36.0]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorDef {
    pub template: String,
    pub position: [f32; 2],
    /// Heading in degrees
    #[serde(default)]
    pub rotation: f32,
    /// Stable name for checkpoints, jump targets, and follow targets
    #[serde(default)]
    pub name: Option<String>,
    /// Start active; inactive actors wait for an explicit activation
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerDef {
    pub name: String,
    pub position: [f32; 2],
    pub condition: TriggerCondition,
    #[serde(default)]
    pub action: ActionDef,
    #[serde(default = "default_true")]
    pub fire_once: bool,
    #[serde(default)]
    pub boss_link: Option<String>,
}

/// Trigger action as authored; `jump` destinations stay names until fire
/// time so they can point at live actors as well as anchors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionDef {
    #[default]
    EventOnly,
    Checkpoint,
    Jump {
        to: String,
        #[serde(default)]
        move_all: bool,
    },
    ChangeScroll {
        to: [f32; 2],
    },
    BossAlarm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallDef {
    pub center: [f32; 2],
    pub size: [f32; 2],
}

fn default_true() -> bool {
    true
}

impl StageFile {
    /// Build the runtime stage, validating names and cross-references
    pub fn into_stage(self) -> Result<Stage> {
        let mut names: HashSet<&str> = HashSet::new();
        for actor in &self.actors {
            if let Some(name) = &actor.name {
                if !names.insert(name) {
                    return Err(TalonError::DuplicateActorName(name.clone()));
                }
            }
        }
        for trigger in &self.triggers {
            if !names.insert(&trigger.name) {
                return Err(TalonError::DuplicateActorName(trigger.name.clone()));
            }
        }

        for trigger in &self.triggers {
            if let ActionDef::Jump { to, .. } = &trigger.action {
                let resolvable = self.anchors.contains_key(to)
                    || self
                        .actors
                        .iter()
                        .any(|a| a.name.as_deref() == Some(to.as_str()));
                if !resolvable {
                    return Err(TalonError::ValidationError(format!(
                        "trigger '{}' jumps to unknown destination '{}'",
                        trigger.name, to
                    )));
                }
            }
        }

        let anchors = self
            .anchors
            .into_iter()
            .map(|(name, p)| (name, Vec2::from_array(p)))
            .collect();

        let actors = self
            .actors
            .into_iter()
            .map(|def| StageActor {
                template: def.template,
                position: Vec2::from_array(def.position),
                rotation: def.rotation.to_radians(),
                name: def.name,
                active: def.active,
            })
            .collect();

        let triggers = self
            .triggers
            .into_iter()
            .map(|def| StageTrigger {
                name: def.name,
                position: Vec2::from_array(def.position),
                condition: def.condition,
                action: match def.action {
                    ActionDef::EventOnly => TriggerAction::EventOnly,
                    ActionDef::Checkpoint => TriggerAction::Checkpoint,
                    ActionDef::Jump { to, move_all } => TriggerAction::Jump { to, move_all },
                    ActionDef::ChangeScroll { to } => TriggerAction::ChangeScroll {
                        to: Vec2::from_array(to),
                    },
                    ActionDef::BossAlarm => TriggerAction::BossAlarm,
                },
                fire_once: def.fire_once,
                disabled: false,
                boss_link: def.boss_link,
            })
            .collect();

        let walls = self
            .walls
            .into_iter()
            .map(|def| {
                Rect::from_center_size(Vec2::from_array(def.center), Vec2::from_array(def.size))
            })
            .collect();

        let scroll = Vec2::from_array(self.stage.scroll);
        Ok(Stage {
            name: self.stage.name,
            scroll,
            base_scroll: scroll,
            position: Vec2::ZERO,
            view_size: Vec2::from_array(self.stage.view),
            bounds_size: self.stage.bounds.map(Vec2::from_array),
            alarm_sound: self.stage.alarm_sound,
            anchors,
            walls,
            actors,
            triggers,
            placed: Vec::new(),
        })
    }
}
