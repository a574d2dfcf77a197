//! Talon Sim - Pooled spawnable simulation core
//!
//! The runtime half of the engine:
//! - `Pool` - recycling instance storage split into active and spare sets
//! - `Instance` / `SpawnerRef` - one reusable simulation object and its creator link
//! - `Simulation` - the fixed-timestep update hub everything talks to
//! - `CollisionWorld` - sensor-based overlap detection on rapier2d
//! - `EventBus` / `SimEvent` - per-tick lifecycle broadcast queue
//! - `CheckpointStore` - keyed snapshots for mid-stage restarts
//! - `SimClock` - fixed-timestep accumulator for hosts
//! - `AudioRouter` - turns lifecycle events into playback commands

mod audio;
mod checkpoint;
mod clock;
mod collision;
mod entity;
mod events;
mod input;
mod instance;
mod pool;
mod sim;
mod spawner;

pub use audio::{AudioCommand, AudioRouter};
pub use checkpoint::{CheckpointAnchor, CheckpointRecord, CheckpointStore};
pub use clock::SimClock;
pub use collision::{CollisionWorld, Contact};
pub use events::{EventBus, SimEvent};
pub use input::{Axis, InputState};
pub use instance::{
    BehaviorState, EntityState, Instance, SpawnerRef, SpawnerState, WeaponTimer,
};
pub use pool::Pool;
pub use sim::Simulation;
