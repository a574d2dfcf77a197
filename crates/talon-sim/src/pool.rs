//! Active/spare instance bookkeeping
//!
//! The pool owns every instance for the life of the process. An id is in
//! exactly one of the two sets at all times: `recycle`/`adopt_active`
//! place it in active, `deactivate` moves it to spare, and nothing ever
//! removes it from the map. Spare matching compares bound template
//! names, so a slot is only reused for the template it last held.

use crate::instance::Instance;
use std::collections::HashMap;
use talon_core::SpawnId;

#[derive(Debug, Default)]
pub struct Pool {
    instances: HashMap<SpawnId, Instance>,
    /// Update order for the tick pass: insertion order, oldest first
    active: Vec<SpawnId>,
    spare: Vec<SpawnId>,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly constructed instance straight into the active set
    pub fn adopt_active(&mut self, instance: Instance) -> SpawnId {
        let id = instance.id();
        debug_assert!(!self.instances.contains_key(&id));
        self.instances.insert(id, instance);
        self.active.push(id);
        id
    }

    /// Move the first spare bound to `template_name` into the active set
    /// and return its id for reconfiguration. None means no match; the
    /// caller constructs fresh (pool exhaustion is never an error).
    pub fn recycle(&mut self, template_name: &str) -> Option<SpawnId> {
        let idx = self.spare.iter().position(|id| {
            self.instances
                .get(id)
                .map(|inst| inst.template_name() == template_name)
                .unwrap_or(false)
        })?;
        let id = self.spare.remove(idx);
        self.active.push(id);
        Some(id)
    }

    /// Move a specific tracked instance from spare to active, for
    /// pre-placed actors woken by name rather than recycled by template
    pub fn make_active(&mut self, id: SpawnId) -> bool {
        let Some(idx) = self.spare.iter().position(|&s| s == id) else {
            return false;
        };
        self.spare.remove(idx);
        self.active.push(id);
        true
    }

    /// Move an active instance to the spare set. Returns false (no-op)
    /// if the id is not currently active.
    pub fn deactivate(&mut self, id: SpawnId) -> bool {
        let Some(idx) = self.active.iter().position(|&a| a == id) else {
            return false;
        };
        self.active.remove(idx);
        self.spare.push(id);
        true
    }

    /// Register a pre-placed instance exactly once, into active or spare
    /// by its current active flag. Returns false if already tracked.
    pub fn track(&mut self, instance: Instance) -> bool {
        let id = instance.id();
        if self.instances.contains_key(&id) {
            return false;
        }
        if instance.is_active() {
            self.active.push(id);
        } else {
            self.spare.push(id);
        }
        self.instances.insert(id, instance);
        true
    }

    /// Membership test over both sets
    pub fn is_tracked(&self, id: SpawnId) -> bool {
        self.instances.contains_key(&id)
    }

    pub fn get(&self, id: SpawnId) -> Option<&Instance> {
        self.instances.get(&id)
    }

    pub fn get_mut(&mut self, id: SpawnId) -> Option<&mut Instance> {
        self.instances.get_mut(&id)
    }

    pub fn active_ids(&self) -> &[SpawnId] {
        &self.active
    }

    pub fn spare_ids(&self) -> &[SpawnId] {
        &self.spare
    }

    /// Snapshot of the active set for a tick pass; appends during the
    /// pass land in `active` but not in the snapshot
    pub fn active_snapshot(&self) -> Vec<SpawnId> {
        self.active.clone()
    }

    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn spare_count(&self) -> usize {
        self.spare.len()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
