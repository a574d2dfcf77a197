//! Talon Template - Spawnable configuration assets
//!
//! Templates are the immutable configuration assets behind every pooled
//! spawnable: collision profile, sub-spawn references, and a behavior
//! kind payload (effect, entity, spawner, or pickup). The `TemplateBank`
//! loads them from TOML files and validates every cross-reference.

mod bank;
mod template;

pub use bank::TemplateBank;
pub use template::{
    DespawnCondition, EffectTemplate, EntityTemplate, Motion, PhaseSpec, PickupEffect,
    PickupTemplate, Pilot, SoundSet, SpawnTemplate, SpawnTrigger, SpawnerTemplate, TemplateDef,
    TemplateFile, TemplateKind, WeaponSpec,
};
