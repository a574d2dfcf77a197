//! Scroll-driven stage triggers
//!
//! A trigger is a named point in stage space with a fire condition and
//! one action. The stage evaluates conditions each tick while the trigger
//! is enabled; firing broadcasts `StageTriggered` and runs the action.

use serde::{Deserialize, Serialize};
use talon_core::{Rect, Vec2};

/// When a trigger fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerCondition {
    /// The stage position has crossed this trigger's x coordinate in the
    /// direction the stage scrolls
    PassX,
    /// As `PassX`, along y
    PassY,
    /// The trigger point has entered the view rectangle
    OnSeen,
}

/// What a trigger does beyond broadcasting `StageTriggered`
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerAction {
    /// Broadcast only
    EventOnly,
    /// Register this trigger as the restart point and run checkpoint-save
    Checkpoint,
    /// Relocate the stage to a named destination, carrying the movables
    /// (optionally every active spawnable) along
    Jump { to: String, move_all: bool },
    /// Replace the global scroll vector
    ChangeScroll { to: Vec2 },
    /// Broadcast the boss-encounter alarm
    BossAlarm,
}

/// One stage trigger's runtime state
#[derive(Debug, Clone, PartialEq)]
pub struct StageTrigger {
    pub name: String,
    /// Stage-space point the condition tests against
    pub position: Vec2,
    pub condition: TriggerCondition,
    pub action: TriggerAction,
    /// Disable after the first firing
    pub fire_once: bool,
    pub disabled: bool,
    /// Auto-disable when a boss of this template is destroyed, regardless
    /// of the fire condition
    pub boss_link: Option<String>,
}

impl StageTrigger {
    /// Condition test for this tick. Pass conditions compare the stage
    /// position against the trigger point along one axis, oriented by the
    /// scroll direction on that axis.
    pub fn satisfied(&self, stage_pos: Vec2, scroll: Vec2, view: Rect) -> bool {
        match self.condition {
            TriggerCondition::PassX => passed(stage_pos.x, self.position.x, scroll.x),
            TriggerCondition::PassY => passed(stage_pos.y, self.position.y, scroll.y),
            TriggerCondition::OnSeen => view.contains(self.position),
        }
    }
}

fn passed(stage: f32, trigger: f32, scroll: f32) -> bool {
    if scroll > 0.0 {
        stage > trigger
    } else {
        stage < trigger
    }
}
