//! Talon Core - Foundational types for the Talon engine
//!
//! This crate provides the core types that all other Talon crates depend on:
//! - `SpawnId` - Stable spawnable instance identifiers
//! - `Vec2`, `Rect` - Spatial types
//! - `PathCurve` - Time-sampled movement paths
//! - Error types and Result alias

mod error;
mod id;
mod math;
mod path;

pub use error::{Result, TalonError};
pub use id::SpawnId;
pub use math::{wrap_angle, Rect, Vec2};
pub use path::{catmull_rom, PathCurve, PathSample};
