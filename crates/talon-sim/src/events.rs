//! Simulation events and the bus that carries them

use talon_core::SpawnId;

/// A lifecycle notification produced during a simulation tick.
///
/// Events accumulate on the bus in the order they happen and are drained
/// once per tick; consumers see that exact order. They describe what
/// happened and carry no way to mutate pool state.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Spawned {
        id: SpawnId,
        template: String,
    },
    Despawned {
        id: SpawnId,
        template: String,
    },
    SpawnerTriggered {
        id: SpawnId,
    },
    HealthChanged {
        id: SpawnId,
        hp: i32,
        max_hp: i32,
    },
    PhaseChanged {
        id: SpawnId,
        phase: usize,
    },
    Destroyed {
        id: SpawnId,
        template: String,
        by_player: bool,
    },
    BossSpawned {
        id: SpawnId,
        template: String,
    },
    BossDestroyed {
        id: SpawnId,
        template: String,
    },
    BossAlarm,
    PickupCollected {
        id: SpawnId,
        by: SpawnId,
    },
    ScoreChanged {
        score: i64,
    },
    /// Stage start broadcast that arms player-spawn spawner triggers
    PlayerSpawn,
    StageStart,
    StageEnd,
    StageTriggered {
        name: String,
    },
    CheckpointSave,
    CheckpointLoad,
}

/// A simple event queue that the simulation pushes to and consumers drain
pub struct EventBus {
    events: Vec<SimEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Push an event onto the bus
    pub fn push(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Drain all events from the bus, returning them
    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read pending events without draining them
    pub fn pending(&self) -> &[SimEvent] {
        &self.events
    }

    /// Check if there are pending events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of pending events
    pub fn len(&self) -> usize {
        self.events.len()
    }
}
