//! Talon Stage - Scripted stage flow over the simulation
//!
//! Stages script the layer the simulation does not know about:
//! - `StageFile` - the TOML stage schema with validated cross-references
//! - `Stage` - scroll, pre-placed actors, and per-frame trigger checks
//! - `StageTrigger` - position-keyed actions: checkpoints, jumps, scroll
//!   changes, and boss alarms
//!
//! The stage moves the view through a static world; players and their
//! escorts are carried along so the scroll reads as forward motion.

mod format;
mod stage;
mod trigger;

pub use format::{ActionDef, ActorDef, StageDef, StageFile, TriggerDef, WallDef};
pub use stage::{Stage, StageActor};
pub use trigger::{StageTrigger, TriggerAction, TriggerCondition};
