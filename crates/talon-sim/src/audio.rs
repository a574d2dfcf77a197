//! Audio routing: maps simulation events to sound playback
//!
//! Reads the `sounds` table on each instance's template and turns
//! lifecycle events into host-facing commands. The simulation never
//! plays anything itself; the host drains commands after each tick.

use crate::events::SimEvent;
use crate::pool::Pool;
use talon_core::{SpawnId, Vec2};

/// A sound to play in response to a simulation event
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCommand {
    /// Play a one-shot, optionally at a world position
    Play {
        sound: String,
        position: Option<Vec2>,
        volume: f64,
    },
    /// Start an instance's looping idle track
    Loop { id: SpawnId, sound: String },
    /// Stop whatever is looping on an instance's track
    Stop { id: SpawnId },
}

/// Turns lifecycle events into AudioCommands via template sound sets
#[derive(Debug, Clone, Default)]
pub struct AudioRouter {
    /// Cue fired on the boss alarm; stage files set this
    pub alarm_sound: Option<String>,
}

impl AudioRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a tick's events and generate audio commands. Despawned
    /// instances are still pool-tracked, so position lookups hold for
    /// every lifecycle event.
    pub fn process_events(&self, events: &[SimEvent], pool: &Pool) -> Vec<AudioCommand> {
        let mut commands = Vec::new();

        for event in events {
            match event {
                SimEvent::Spawned { id, .. } => {
                    let Some(inst) = pool.get(*id) else { continue };
                    let sounds = &inst.template().sounds;
                    if let Some(sound) = &sounds.spawn {
                        commands.push(self.play(sound, Some(inst.position)));
                    }
                    if let Some(sound) = &sounds.idle {
                        commands.push(AudioCommand::Loop {
                            id: *id,
                            sound: sound.clone(),
                        });
                    }
                }
                SimEvent::Despawned { id, .. } => {
                    let Some(inst) = pool.get(*id) else { continue };
                    let sounds = &inst.template().sounds;
                    if sounds.idle.is_some() {
                        commands.push(AudioCommand::Stop { id: *id });
                    }
                    if let Some(sound) = &sounds.despawn {
                        commands.push(self.play(sound, Some(inst.position)));
                    }
                }
                SimEvent::Destroyed { id, .. } => {
                    let Some(inst) = pool.get(*id) else { continue };
                    let sounds = &inst.template().sounds;
                    if sounds.idle.is_some() {
                        commands.push(AudioCommand::Stop { id: *id });
                    }
                    if let Some(sound) = &sounds.destroy {
                        commands.push(self.play(sound, Some(inst.position)));
                    }
                }
                SimEvent::PickupCollected { id, .. } => {
                    let Some(inst) = pool.get(*id) else { continue };
                    if let Some(sound) = &inst.template().sounds.destroy {
                        commands.push(self.play(sound, Some(inst.position)));
                    }
                }
                SimEvent::BossAlarm => {
                    if let Some(sound) = &self.alarm_sound {
                        commands.push(self.play(sound, None));
                    }
                }
                _ => {}
            }
        }

        commands
    }

    fn play(&self, sound: &str, position: Option<Vec2>) -> AudioCommand {
        AudioCommand::Play {
            sound: sound.to_string(),
            position,
            volume: 1.0,
        }
    }
}
