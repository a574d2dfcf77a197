//! In-memory checkpoint registry
//!
//! Checkpoints snapshot the resumable part of a stage: per-actor records
//! keyed by stable actor name, the trigger position to restart from, and
//! the score at save time. The registry lives for the process; nothing
//! here touches disk.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use talon_core::{Result, TalonError, Vec2};

/// One actor's saved state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CheckpointRecord {
    /// A spawner's emission schedule, restored verbatim
    Spawner {
        template: String,
        fire_start: f64,
        progress: Option<usize>,
    },
    /// A stage trigger's disabled flag
    Trigger { disabled: bool },
}

/// The stage trigger registered as the current restart point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointAnchor {
    pub name: String,
    pub position: Vec2,
}

/// Keyed snapshot registry consumed by spawners and stage triggers
#[derive(Debug, Default)]
pub struct CheckpointStore {
    records: HashMap<String, CheckpointRecord>,
    anchor: Option<CheckpointAnchor>,
    score: i64,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record under an actor name
    pub fn set(&mut self, key: impl Into<String>, record: CheckpointRecord) {
        self.records.insert(key.into(), record);
    }

    /// Get a record by actor name
    pub fn get(&self, key: &str) -> Option<&CheckpointRecord> {
        self.records.get(key)
    }

    /// Get a record by actor name, or fail with `StateNotFound`.
    ///
    /// Callers treat the error as a soft fallback to the default state,
    /// never as an abort.
    pub fn restore(&self, key: &str) -> Result<&CheckpointRecord> {
        self.records
            .get(key)
            .ok_or_else(|| TalonError::StateNotFound(key.to_string()))
    }

    pub fn has(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<CheckpointRecord> {
        self.records.remove(key)
    }

    /// Drop all records, the anchor, and the saved score
    pub fn clear(&mut self) {
        self.records.clear();
        self.anchor = None;
        self.score = 0;
    }

    /// All stored actor names, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.records.keys().map(|s| s.as_str()).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn anchor(&self) -> Option<&CheckpointAnchor> {
        self.anchor.as_ref()
    }

    pub fn set_anchor(&mut self, name: impl Into<String>, position: Vec2) {
        self.anchor = Some(CheckpointAnchor {
            name: name.into(),
            position,
        });
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn set_score(&mut self, score: i64) {
        self.score = score;
    }
}
