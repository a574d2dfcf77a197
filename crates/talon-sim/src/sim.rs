//! The simulation context
//!
//! `Simulation` is the single object every component talks to: it owns
//! the pool, the collision world, the event bus, input, score, and the
//! checkpoint store, and runs the fixed-timestep update pass. One tick:
//! behavior over a snapshot of the active set, collision step and
//! contact resolution, visibility sweep, then internal reactions over
//! the queued events before they are drained to the host.

use crate::collision::{CollisionWorld, Contact};
use crate::events::{EventBus, SimEvent};
use crate::input::InputState;
use crate::instance::{Instance, SpawnerRef};
use crate::pool::Pool;
use crate::CheckpointStore;
use std::collections::HashMap;
use std::sync::Arc;
use talon_core::{Rect, Result, SpawnId, TalonError, Vec2};
use talon_template::{SpawnTrigger, TemplateBank, TemplateKind};

/// Default view rectangle size, world units
const DEFAULT_VIEW_SIZE: Vec2 = Vec2 { x: 24.0, y: 18.0 };
/// How far outside the view an instance may drift before the unseen
/// despawn policy removes it
const DEFAULT_DESPAWN_MARGIN: f32 = 2.0;

/// A damage or pickup application deferred until all contacts of a step
/// are classified, so resolution order matches contact order
enum PendingHit {
    Damage {
        target: SpawnId,
        amount: i32,
        by_player: bool,
    },
    Pickup {
        pickup: SpawnId,
        player: SpawnId,
    },
}

pub struct Simulation {
    bank: Arc<TemplateBank>,
    pub(crate) pool: Pool,
    pub(crate) collision: CollisionWorld,
    pub(crate) bus: EventBus,
    pub input: InputState,
    pub checkpoints: CheckpointStore,
    /// Named world positions from the stage file
    anchors: HashMap<String, Vec2>,
    /// Pre-placed actors by stable name
    named: HashMap<String, SpawnId>,
    view: Rect,
    despawn_margin: f32,
    /// Player movement clamp
    pub(crate) bounds: Option<Rect>,
    pub(crate) score: i64,
    total_time: f64,
}

impl Simulation {
    pub fn new(bank: Arc<TemplateBank>) -> Self {
        Self {
            bank,
            pool: Pool::new(),
            collision: CollisionWorld::new(),
            bus: EventBus::new(),
            input: InputState::new(),
            checkpoints: CheckpointStore::new(),
            anchors: HashMap::new(),
            named: HashMap::new(),
            view: Rect::from_center_size(Vec2::ZERO, DEFAULT_VIEW_SIZE),
            despawn_margin: DEFAULT_DESPAWN_MARGIN,
            bounds: None,
            score: 0,
            total_time: 0.0,
        }
    }

    pub fn bank(&self) -> &Arc<TemplateBank> {
        &self.bank
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn view(&self) -> Rect {
        self.view
    }

    pub fn set_view(&mut self, view: Rect) {
        self.view = view;
    }

    pub fn set_despawn_margin(&mut self, margin: f32) {
        self.despawn_margin = margin.max(0.0);
    }

    pub fn set_bounds(&mut self, bounds: Option<Rect>) {
        self.bounds = bounds;
    }

    pub fn register_anchor(&mut self, name: &str, position: Vec2) {
        self.anchors.insert(name.to_string(), position);
    }

    pub fn anchor(&self, name: &str) -> Option<Vec2> {
        self.anchors.get(name).copied()
    }

    /// Register static collision geometry
    pub fn add_wall(&mut self, rect: Rect) {
        self.collision.add_wall(rect);
    }

    pub fn instance(&self, id: SpawnId) -> Option<&Instance> {
        self.pool.get(id)
    }

    pub fn instance_mut(&mut self, id: SpawnId) -> Option<&mut Instance> {
        self.pool.get_mut(id)
    }

    /// Resolve a pre-placed actor by its stable name
    pub fn named(&self, name: &str) -> Option<SpawnId> {
        self.named.get(name).copied()
    }

    /// Active player-piloted entities, in update order
    pub fn player_ids(&self) -> Vec<SpawnId> {
        self.pool
            .active_ids()
            .iter()
            .copied()
            .filter(|&id| self.pool.get(id).map(|i| i.is_player()).unwrap_or(false))
            .collect()
    }

    /// Resolve a named point: the live player first, then pre-placed
    /// actors, then stage anchors
    pub fn resolve_point(&self, name: &str) -> Option<Vec2> {
        if name == "player" {
            if let Some(&id) = self
                .pool
                .active_ids()
                .iter()
                .find(|&&id| self.pool.get(id).map(|i| i.is_player()).unwrap_or(false))
            {
                return self.pool.get(id).map(|i| i.position);
            }
        }
        if let Some(&id) = self.named.get(name) {
            if let Some(inst) = self.pool.get(id) {
                if inst.is_active() {
                    return Some(inst.position);
                }
            }
        }
        self.anchors.get(name).copied()
    }

    /// Position of whatever created an instance, if it still resolves
    pub(crate) fn resolve_spawner_pos(&self, id: SpawnId) -> Option<Vec2> {
        match &self.pool.get(id)?.spawner {
            SpawnerRef::World => None,
            SpawnerRef::Instance(src) => self.pool.get(*src).map(|s| s.position),
            SpawnerRef::Anchor(name) => self.anchors.get(name).copied(),
        }
    }

    /// Let collaborators queue an event for this tick's drain. Events
    /// carry no way to mutate pool state.
    pub fn push_event(&mut self, event: SimEvent) {
        self.bus.push(event);
    }

    // ---- lifecycle -----------------------------------------------------

    /// Spawn an instance of a template: reuse a spare bound to the same
    /// template name, or construct fresh. Position is explicit;
    /// orientation and player attribution are inherited from the
    /// creating instance. A missing template is a contract violation.
    pub fn spawn(
        &mut self,
        template_name: &str,
        position: Vec2,
        spawner: SpawnerRef,
    ) -> Result<SpawnId> {
        let template = self.bank.resolve(template_name)?;

        let (rotation, attributed) = match &spawner {
            SpawnerRef::Instance(src) => self
                .pool
                .get(*src)
                .map(|s| (s.rotation, s.is_player_attributed()))
                .unwrap_or((0.0, false)),
            _ => (0.0, false),
        };

        let id = match self.pool.recycle(template_name) {
            Some(id) => {
                if let Some(inst) = self.pool.get_mut(id) {
                    inst.configure(template.clone(), position, rotation, spawner);
                }
                id
            }
            None => {
                let inst = Instance::new(SpawnId::new(), template.clone(), position, rotation, spawner);
                let id = self.pool.adopt_active(inst);
                self.collision
                    .insert_instance(id, position, template.collision_radius);
                id
            }
        };

        if attributed {
            if let Some(inst) = self.pool.get_mut(id) {
                inst.player_spawned = true;
            }
        }

        self.finish_activation(id);
        Ok(id)
    }

    /// Pre-place a stage actor. The instance starts inactive; pass
    /// `active` to wake it immediately. Named actors must be unique.
    pub fn place(
        &mut self,
        template_name: &str,
        position: Vec2,
        rotation: f32,
        name: Option<&str>,
        active: bool,
    ) -> Result<SpawnId> {
        let template = self.bank.resolve(template_name)?;
        let mut inst = Instance::new(SpawnId::new(), template, position, rotation, SpawnerRef::World);
        if let Some(name) = name {
            if self.named.contains_key(name) {
                return Err(TalonError::DuplicateActorName(name.to_string()));
            }
            inst.name = Some(name.to_string());
        }
        let id = inst.id();
        self.request_track(inst);
        if active {
            self.set_active(id, true);
        }
        Ok(id)
    }

    /// Register an externally constructed instance exactly once, into
    /// active or spare by its current active flag. Returns false if the
    /// id is already tracked.
    pub fn request_track(&mut self, instance: Instance) -> bool {
        let id = instance.id();
        let template = instance.template().clone();
        let position = instance.position;
        let name = instance.name.clone();
        let was_active = instance.is_active();

        if !self.pool.track(instance) {
            return false;
        }
        if !self.collision.contains(id) {
            self.collision
                .insert_instance(id, position, template.collision_radius);
        }
        if let Some(name) = name {
            if self.named.contains_key(&name) {
                tracing::warn!(actor = %name, "duplicate actor name, keeping the first");
            } else {
                self.named.insert(name, id);
            }
        }
        if was_active {
            self.finish_activation(id);
        }
        true
    }

    /// Membership test over both pool sets
    pub fn is_tracked(&self, id: SpawnId) -> bool {
        self.pool.is_tracked(id)
    }

    /// Wake a tracked spare instance, or despawn an active one. Both
    /// directions are no-ops (false) when the instance is already on
    /// the requested side.
    pub fn set_active(&mut self, id: SpawnId, active: bool) -> bool {
        if active {
            if !self.pool.make_active(id) {
                return false;
            }
            self.finish_activation(id);
            true
        } else {
            self.despawn(id)
        }
    }

    /// Move an active instance to spare, clear its active flag (which
    /// disables collision and visibility together), spawn its
    /// despawn-template at the last position, and broadcast. Returns
    /// false without side effects if the instance is not active.
    pub fn despawn(&mut self, id: SpawnId) -> bool {
        if !self.pool.deactivate(id) {
            return false;
        }
        let Some(inst) = self.pool.get_mut(id) else {
            return true;
        };
        inst.active = false;
        let template = inst.template().clone();
        let position = inst.position;

        self.collision
            .set_active(id, false, template.collision_layer, template.collision_mask);
        self.bus.push(SimEvent::Despawned {
            id,
            template: template.name.clone(),
        });
        if let Some(effect) = &template.despawn_spawn {
            if let Err(err) = self.spawn(effect, position, SpawnerRef::Instance(id)) {
                tracing::warn!(template = %effect, error = %err, "despawn-template spawn failed");
            }
        }
        true
    }

    /// Shared tail of every activation path: one flag drives collision
    /// groups and visibility, timers restart, lifecycle events go out.
    fn finish_activation(&mut self, id: SpawnId) {
        let spawner_pos = self.resolve_spawner_pos(id);
        let Some(inst) = self.pool.get_mut(id) else {
            return;
        };
        inst.active = true;
        inst.elapsed = 0.0;
        inst.seen = false;
        if let Some(state) = inst.entity_state_mut() {
            state.last_spawner_pos = spawner_pos;
        }
        let template = inst.template().clone();
        let position = inst.position;

        self.collision
            .set_active(id, true, template.collision_layer, template.collision_mask);
        self.collision.teleport(id, position);

        self.bus.push(SimEvent::Spawned {
            id,
            template: template.name.clone(),
        });
        match &template.kind {
            TemplateKind::Entity(entity) if entity.is_boss => {
                self.bus.push(SimEvent::BossSpawned {
                    id,
                    template: template.name.clone(),
                });
            }
            TemplateKind::Spawner(spawner) if spawner.trigger == SpawnTrigger::OnPlaced => {
                self.fire_spawner(id);
            }
            _ => {}
        }
    }

    // ---- update pass ---------------------------------------------------

    /// Advance the simulation by one fixed step and return the tick's
    /// events in the order they happened.
    pub fn tick(&mut self, dt: f64) -> Vec<SimEvent> {
        self.total_time += dt;

        // Instances appended mid-tick are not in the snapshot and first
        // run next tick; instances despawned mid-tick fail the active
        // guard. Nothing is double-processed.
        for id in self.pool.active_snapshot() {
            let active = self.pool.get(id).map(|i| i.is_active()).unwrap_or(false);
            if active {
                self.tick_instance(id, dt);
            }
        }

        self.sync_collision(dt);
        let contacts = self.collision.drain_contacts();
        self.resolve_contacts(&contacts);
        self.visibility_sweep();
        self.process_reactions();

        self.bus.drain()
    }

    /// Base spawnable behavior plus the per-kind dispatch
    fn tick_instance(&mut self, id: SpawnId, dt: f64) {
        let Some(inst) = self.pool.get_mut(id) else {
            return;
        };
        let template = inst.template().clone();
        let elapsed_before = inst.elapsed;
        inst.elapsed += dt;
        let elapsed = inst.elapsed;
        let position = inst.position;

        // Self-interval emission; entities route their interval weapon
        // through the firing cadence instead
        if !template.is_entity() {
            if let Some(interval_template) = &template.interval_spawn {
                let interval = f64::from(template.interval);
                let crossed = interval > 0.0
                    && (elapsed / interval).floor() > (elapsed_before / interval).floor();
                if crossed {
                    if let Err(err) =
                        self.spawn(interval_template, position, SpawnerRef::Instance(id))
                    {
                        tracing::warn!(template = %interval_template, error = %err, "interval spawn failed");
                    }
                }
            }
        }

        match &template.kind {
            TemplateKind::Effect(effect) => {
                if let Some(lifetime) = effect.lifetime {
                    if elapsed > f64::from(lifetime) {
                        self.despawn(id);
                    }
                }
            }
            TemplateKind::Entity(_) => self.tick_entity(id, dt),
            TemplateKind::Spawner(_) => self.tick_spawner(id),
            TemplateKind::Pickup(_) => {}
        }
    }

    fn sync_collision(&mut self, dt: f64) {
        for &id in self.pool.active_ids() {
            if let Some(inst) = self.pool.get(id) {
                self.collision.set_position(id, inst.position);
            }
        }
        self.collision.step(dt as f32);
    }

    /// Classify every contact first, then apply in contact order;
    /// applications can despawn either side of a later contact, which
    /// the active guard in `apply_damage` absorbs.
    fn resolve_contacts(&mut self, contacts: &[Contact]) {
        let mut pending = Vec::new();

        for contact in contacts {
            match *contact {
                Contact::Pair { a, b } => {
                    let Some(ta) = self.pool.get(a).map(|i| i.template().clone()) else {
                        continue;
                    };
                    let Some(tb) = self.pool.get(b).map(|i| i.template().clone()) else {
                        continue;
                    };
                    match (&ta.kind, &tb.kind) {
                        (TemplateKind::Entity(ea), TemplateKind::Entity(eb)) => {
                            // Bidirectional ram exchange
                            let attr_a = self.pool.get(a).map(|i| i.is_player_attributed());
                            let attr_b = self.pool.get(b).map(|i| i.is_player_attributed());
                            pending.push(PendingHit::Damage {
                                target: b,
                                amount: ea.ram_damage,
                                by_player: attr_a.unwrap_or(false),
                            });
                            pending.push(PendingHit::Damage {
                                target: a,
                                amount: eb.ram_damage,
                                by_player: attr_b.unwrap_or(false),
                            });
                        }
                        (TemplateKind::Entity(_), TemplateKind::Pickup(_)) => {
                            if self.pool.get(a).map(|i| i.is_player()).unwrap_or(false) {
                                pending.push(PendingHit::Pickup { pickup: b, player: a });
                            }
                        }
                        (TemplateKind::Pickup(_), TemplateKind::Entity(_)) => {
                            if self.pool.get(b).map(|i| i.is_player()).unwrap_or(false) {
                                pending.push(PendingHit::Pickup { pickup: a, player: b });
                            }
                        }
                        _ => {}
                    }
                }
                Contact::Wall { id } => {
                    if let Some(damage) = self
                        .pool
                        .get(id)
                        .and_then(|i| i.template().as_entity())
                        .map(|e| e.misc_self_damage)
                    {
                        pending.push(PendingHit::Damage {
                            target: id,
                            amount: damage,
                            by_player: false,
                        });
                    }
                }
            }
        }

        for hit in pending {
            match hit {
                PendingHit::Damage {
                    target,
                    amount,
                    by_player,
                } => self.apply_damage(target, amount, by_player),
                PendingHit::Pickup { pickup, player } => self.collect_pickup(pickup, player),
            }
        }
    }

    /// First view entry marks the instance seen and fires on-seen hooks;
    /// leaving the margin-expanded view after being seen despawns it.
    fn visibility_sweep(&mut self) {
        let view = self.view;
        let keep = view.expanded(self.despawn_margin);

        for id in self.pool.active_snapshot() {
            let Some(inst) = self.pool.get(id) else {
                continue;
            };
            if !inst.is_active() {
                continue;
            }
            let position = inst.position;
            if view.contains(position) {
                if !inst.seen {
                    self.notify_seen(id);
                }
            } else if inst.seen && !keep.contains(position) && !inst.is_player() {
                self.notify_unseen(id);
            }
        }
    }

    /// Host hook: an instance entered the visible region
    pub fn notify_seen(&mut self, id: SpawnId) {
        let Some(inst) = self.pool.get_mut(id) else {
            return;
        };
        if !inst.is_active() || inst.seen {
            return;
        }
        inst.seen = true;
        let on_seen_spawner = inst
            .template()
            .as_spawner()
            .map(|s| s.trigger == SpawnTrigger::OnSeen)
            .unwrap_or(false);
        if on_seen_spawner {
            self.fire_spawner(id);
        }
    }

    /// Host hook: an instance left the visible region. Leaving the play
    /// area is the generic removal policy.
    pub fn notify_unseen(&mut self, id: SpawnId) {
        self.despawn(id);
    }

    /// Host hook: this instance's one-shot visual finished
    pub fn notify_animation_finished(&mut self, id: SpawnId) {
        self.despawn(id);
    }

    // ---- combat --------------------------------------------------------

    /// The damage/phase state machine. Zero damage is ignored; health
    /// changes rebroadcast; phase recomputes monotonically from health;
    /// death runs score attribution, the destroy-template, and despawn.
    pub fn apply_damage(&mut self, id: SpawnId, amount: i32, by_player: bool) {
        use crate::instance::{phase_for_health, slot_count};

        if amount == 0 {
            return;
        }
        let Some(inst) = self.pool.get_mut(id) else {
            return;
        };
        if !inst.is_active() {
            return;
        }
        let template = inst.template().clone();
        let Some(entity) = template.as_entity() else {
            return;
        };
        let Some(state) = inst.entity_state_mut() else {
            return;
        };

        state.hp -= amount;
        let hp = state.hp;
        let mut phase_changed = None;
        if hp > 0 && !entity.phases.is_empty() {
            let next = phase_for_health(&entity.phases, hp);
            if next != state.phase {
                state.phase = next;
                state.reset_weapons(slot_count(&entity.phases, next));
                phase_changed = Some(next);
            }
        }
        let position = inst.position;

        self.bus.push(SimEvent::HealthChanged {
            id,
            hp,
            max_hp: entity.hp,
        });
        if let Some(phase) = phase_changed {
            self.bus.push(SimEvent::PhaseChanged { id, phase });
        }

        if hp <= 0 {
            if by_player && entity.score != 0 {
                self.add_score(entity.score);
            }
            if let Some(effect) = &entity.destroy_spawn {
                if let Err(err) = self.spawn(effect, position, SpawnerRef::Instance(id)) {
                    tracing::warn!(template = %effect, error = %err, "destroy-template spawn failed");
                }
            }
            self.bus.push(SimEvent::Destroyed {
                id,
                template: template.name.clone(),
                by_player,
            });
            if entity.is_boss {
                self.bus.push(SimEvent::BossDestroyed {
                    id,
                    template: template.name.clone(),
                });
            }
            if entity.ends_stage {
                self.bus.push(SimEvent::StageEnd);
            }
            self.despawn(id);
        }
    }

    fn collect_pickup(&mut self, pickup: SpawnId, player: SpawnId) {
        use talon_template::PickupEffect;

        let Some(inst) = self.pool.get(pickup) else {
            return;
        };
        if !inst.is_active() {
            return;
        }
        let Some(effect) = inst.template().as_pickup().map(|p| p.effect.clone()) else {
            return;
        };

        match effect {
            PickupEffect::Heal { amount } => self.heal(player, amount),
            PickupEffect::ScoreBonus { amount } => self.add_score(amount),
            PickupEffect::Weapon { weapon } => {
                if let Some(state) = self.pool.get_mut(player).and_then(|i| i.entity_state_mut()) {
                    state.weapon_override = Some(weapon);
                }
            }
        }
        self.bus.push(SimEvent::PickupCollected {
            id: pickup,
            by: player,
        });
        self.despawn(pickup);
    }

    pub(crate) fn add_score(&mut self, points: i64) {
        self.score += points;
        self.bus.push(SimEvent::ScoreChanged { score: self.score });
    }

    // ---- stage integration ---------------------------------------------

    /// Broadcast the player-spawn notification and fire every active
    /// spawner waiting on it
    pub fn broadcast_player_spawn(&mut self) {
        self.bus.push(SimEvent::PlayerSpawn);
        let waiting: Vec<SpawnId> = self
            .pool
            .active_ids()
            .iter()
            .copied()
            .filter(|&id| {
                self.pool
                    .get(id)
                    .and_then(|i| i.template().as_spawner())
                    .map(|s| s.trigger == SpawnTrigger::PlayerSpawn)
                    .unwrap_or(false)
            })
            .collect();
        for id in waiting {
            self.fire_spawner(id);
        }
    }

    /// Shift every active instance, for jump relocations that carry the
    /// whole field along
    pub fn shift_active(&mut self, delta: Vec2) {
        for id in self.pool.active_snapshot() {
            if let Some(inst) = self.pool.get_mut(id) {
                inst.position = inst.position + delta;
                let position = inst.position;
                self.collision.teleport(id, position);
            }
        }
    }

    /// Shift the instances that ride along with the view: player
    /// entities and player-spawn spawners
    pub fn shift_movables(&mut self, delta: Vec2) {
        for id in self.pool.active_snapshot() {
            let Some(inst) = self.pool.get_mut(id) else {
                continue;
            };
            let rides = inst.is_player()
                || inst
                    .template()
                    .as_spawner()
                    .map(|s| s.trigger == SpawnTrigger::PlayerSpawn)
                    .unwrap_or(false);
            if rides {
                inst.position = inst.position + delta;
                let position = inst.position;
                self.collision.teleport(id, position);
            }
        }
    }

    /// Sweep every active instance into the spare set without lifecycle
    /// effects. Stage teardown before a restart: no despawn-templates, no
    /// events, nothing for kill tracking to react to.
    pub fn clear_field(&mut self) {
        for id in self.pool.active_snapshot() {
            if !self.pool.deactivate(id) {
                continue;
            }
            let Some(inst) = self.pool.get_mut(id) else {
                continue;
            };
            inst.active = false;
            let (layer, mask) = {
                let t = inst.template();
                (t.collision_layer, t.collision_mask)
            };
            self.collision.set_active(id, false, layer, mask);
        }
    }

    /// Zero the score and forget checkpoint data, for a fresh stage run
    pub fn clear_stats(&mut self) {
        self.score = 0;
        self.checkpoints.clear();
        self.bus.push(SimEvent::ScoreChanged { score: 0 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talon_template::{
        EffectTemplate, EntityTemplate, Motion, PickupEffect, PickupTemplate, Pilot, SoundSet,
        SpawnTemplate, WeaponSpec,
    };

    const DT: f64 = 1.0 / 60.0;

    fn effect(name: &str) -> SpawnTemplate {
        SpawnTemplate {
            name: name.to_string(),
            sprite: None,
            collision_radius: 0.5,
            collision_layer: 0,
            collision_mask: 0,
            interval: 1.0,
            interval_spawn: None,
            despawn_spawn: None,
            sounds: SoundSet::default(),
            kind: TemplateKind::Effect(EffectTemplate { lifetime: None }),
        }
    }

    fn base_entity() -> EntityTemplate {
        EntityTemplate {
            motion: Motion::Standard { turn_speed: 0.0 },
            speed: 0.0,
            move_with_spawner: false,
            ram_damage: 0,
            misc_self_damage: 0,
            hp: 10,
            score: 0,
            is_boss: false,
            ends_stage: false,
            destroy_spawn: None,
            phases: Vec::new(),
            pilot: Pilot::Scripted,
        }
    }

    fn combatant(name: &str, entity: EntityTemplate) -> SpawnTemplate {
        SpawnTemplate {
            collision_layer: 1,
            collision_mask: 1,
            kind: TemplateKind::Entity(entity),
            ..effect(name)
        }
    }

    fn pickup(name: &str, effect_kind: PickupEffect) -> SpawnTemplate {
        SpawnTemplate {
            collision_layer: 1,
            collision_mask: 1,
            kind: TemplateKind::Pickup(PickupTemplate {
                effect: effect_kind,
            }),
            ..effect(name)
        }
    }

    fn sim_with(templates: Vec<SpawnTemplate>) -> Simulation {
        let mut bank = TemplateBank::new();
        for t in templates {
            bank.insert(t);
        }
        Simulation::new(Arc::new(bank))
    }

    fn count(sim: &Simulation, template: &str) -> usize {
        sim.pool()
            .active_ids()
            .iter()
            .filter(|&&id| {
                sim.instance(id)
                    .map(|i| i.template_name() == template)
                    .unwrap_or(false)
            })
            .count()
    }

    #[test]
    fn test_spawn_reuses_the_spare_slot() {
        let mut sim = sim_with(vec![effect("mote"), effect("spark")]);

        let first = sim.spawn("mote", Vec2::ZERO, SpawnerRef::World).unwrap();
        sim.despawn(first);
        let again = sim.spawn("mote", Vec2::new(5.0, 0.0), SpawnerRef::World).unwrap();
        assert_eq!(again, first, "same template reclaims the slot");
        assert_eq!(sim.instance(again).unwrap().position, Vec2::new(5.0, 0.0));

        // A different template never steals the slot
        sim.despawn(again);
        let other = sim.spawn("spark", Vec2::ZERO, SpawnerRef::World).unwrap();
        assert_ne!(other, first);
        assert_eq!(sim.pool().len(), 2);
    }

    #[test]
    fn test_despawn_and_activate_are_one_way() {
        let mut sim = sim_with(vec![effect("mote")]);
        let id = sim.spawn("mote", Vec2::ZERO, SpawnerRef::World).unwrap();

        assert!(!sim.set_active(id, true), "already active");
        assert!(sim.despawn(id));
        assert!(!sim.despawn(id), "already spare");
        assert!(sim.set_active(id, true));
    }

    #[test]
    fn test_despawn_hides_and_deactivates_together() {
        let mut sim = sim_with(vec![effect("mote")]);
        let id = sim.spawn("mote", Vec2::ZERO, SpawnerRef::World).unwrap();

        let inst = sim.instance(id).unwrap();
        assert!(inst.is_active() && inst.is_visible());

        sim.despawn(id);
        let inst = sim.instance(id).unwrap();
        assert!(!inst.is_active() && !inst.is_visible());
    }

    #[test]
    fn test_interval_emission_crosses_each_boundary() {
        let mut sparker = effect("sparker");
        sparker.interval = 2.0;
        sparker.interval_spawn = Some("mote".to_string());
        let mut sim = sim_with(vec![sparker, effect("mote")]);

        sim.spawn("sparker", Vec2::ZERO, SpawnerRef::World).unwrap();
        for _ in 0..3 {
            sim.tick(0.5);
        }
        assert_eq!(count(&sim, "mote"), 0);

        // The fourth half-second tick lands on the 2.0 boundary
        sim.tick(0.5);
        assert_eq!(count(&sim, "mote"), 1);

        for _ in 0..4 {
            sim.tick(0.5);
        }
        assert_eq!(count(&sim, "mote"), 2);
    }

    #[test]
    fn test_despawn_template_marks_the_last_position() {
        let mut drone = effect("drone");
        drone.despawn_spawn = Some("husk".to_string());
        let mut sim = sim_with(vec![drone, effect("husk")]);

        let id = sim
            .spawn("drone", Vec2::new(3.0, 2.0), SpawnerRef::World)
            .unwrap();
        sim.despawn(id);

        assert_eq!(count(&sim, "husk"), 1);
        let husk_pos = sim
            .pool()
            .active_ids()
            .iter()
            .filter_map(|&i| sim.instance(i))
            .find(|i| i.template_name() == "husk")
            .map(|i| i.position)
            .unwrap();
        assert_eq!(husk_pos, Vec2::new(3.0, 2.0));
    }

    #[test]
    fn test_seen_then_offscreen_despawns() {
        let mut sim = sim_with(vec![effect("scout")]);

        // Far right of the default 24x18 view
        let id = sim
            .spawn("scout", Vec2::new(20.0, 0.0), SpawnerRef::World)
            .unwrap();
        sim.tick(DT);
        sim.tick(DT);
        let inst = sim.instance(id).unwrap();
        assert!(inst.is_active() && !inst.seen, "never seen, never swept");

        sim.instance_mut(id).unwrap().position = Vec2::ZERO;
        sim.tick(DT);
        assert!(sim.instance(id).unwrap().seen);

        // Outside the view but inside the despawn margin
        sim.instance_mut(id).unwrap().position = Vec2::new(13.0, 0.0);
        sim.tick(DT);
        assert!(sim.instance(id).unwrap().is_active());

        sim.instance_mut(id).unwrap().position = Vec2::new(15.0, 0.0);
        let events = sim.tick(DT);
        assert!(!sim.instance(id).unwrap().is_active());
        assert!(events
            .iter()
            .any(|e| matches!(e, SimEvent::Despawned { id: d, .. } if *d == id)));
    }

    #[test]
    fn test_players_never_drift_despawn() {
        let mut ship = base_entity();
        ship.pilot = Pilot::Player { device: 0 };
        let mut sim = sim_with(vec![combatant("ship", ship)]);

        let id = sim.spawn("ship", Vec2::ZERO, SpawnerRef::World).unwrap();
        sim.tick(DT);
        assert!(sim.instance(id).unwrap().seen);

        sim.instance_mut(id).unwrap().position = Vec2::new(30.0, 0.0);
        sim.tick(DT);
        sim.tick(DT);
        assert!(sim.instance(id).unwrap().is_active());
    }

    #[test]
    fn test_ram_exchange_is_bidirectional() {
        let mut ship = base_entity();
        ship.pilot = Pilot::Player { device: 0 };
        ship.hp = 5;
        ship.ram_damage = 3;
        let mut raider = base_entity();
        raider.hp = 3;
        raider.ram_damage = 1;
        raider.score = 150;
        let mut sim = sim_with(vec![combatant("ship", ship), combatant("raider", raider)]);

        let ship_id = sim.spawn("ship", Vec2::ZERO, SpawnerRef::World).unwrap();
        let raider_id = sim
            .spawn("raider", Vec2::new(0.3, 0.0), SpawnerRef::World)
            .unwrap();
        let events = sim.tick(DT);

        // The raider dies to the ship's ram; the ship eats the raider's
        assert!(!sim.instance(raider_id).unwrap().is_active());
        assert_eq!(
            sim.instance(ship_id).unwrap().entity_state().unwrap().hp,
            4
        );
        assert_eq!(sim.score(), 150);
        assert!(events.iter().any(|e| matches!(
            e,
            SimEvent::Destroyed { id, by_player: true, .. } if *id == raider_id
        )));
    }

    #[test]
    fn test_projectile_kill_credits_the_player() {
        let mut ship = base_entity();
        ship.pilot = Pilot::Player { device: 0 };
        let mut ship_template = combatant("ship", ship);
        ship_template.collision_mask = 0;
        let mut bolt = base_entity();
        bolt.hp = 1;
        bolt.ram_damage = 2;
        let mut raider = base_entity();
        raider.hp = 2;
        raider.ram_damage = 1;
        raider.score = 150;
        let mut sim = sim_with(vec![
            ship_template,
            combatant("bolt", bolt),
            combatant("raider", raider),
        ]);

        let ship_id = sim
            .spawn("ship", Vec2::new(-5.0, 0.0), SpawnerRef::World)
            .unwrap();
        let raider_id = sim
            .spawn("raider", Vec2::new(0.3, 0.0), SpawnerRef::World)
            .unwrap();
        let bolt_id = sim
            .spawn("bolt", Vec2::ZERO, SpawnerRef::Instance(ship_id))
            .unwrap();
        assert!(sim.instance(bolt_id).unwrap().is_player_attributed());

        let events = sim.tick(DT);

        // Mutual destruction, but only the raider's death is a player kill
        assert!(!sim.instance(raider_id).unwrap().is_active());
        assert!(!sim.instance(bolt_id).unwrap().is_active());
        assert_eq!(sim.score(), 150);
        assert!(events.iter().any(|e| matches!(
            e,
            SimEvent::Destroyed { id, by_player: true, .. } if *id == raider_id
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            SimEvent::Destroyed { id, by_player: false, .. } if *id == bolt_id
        )));
    }

    #[test]
    fn test_wall_contact_applies_self_damage_once() {
        let mut crasher = base_entity();
        crasher.hp = 3;
        crasher.misc_self_damage = 1;
        let mut sim = sim_with(vec![combatant("crasher", crasher)]);
        sim.add_wall(Rect::new(Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0)));

        let id = sim.spawn("crasher", Vec2::ZERO, SpawnerRef::World).unwrap();
        for _ in 0..3 {
            sim.tick(DT);
        }

        // One overlap start, one application
        assert_eq!(sim.instance(id).unwrap().entity_state().unwrap().hp, 2);
    }

    #[test]
    fn test_score_pickup_credits_only_players() {
        let mut ship = base_entity();
        ship.pilot = Pilot::Player { device: 0 };
        let mut sim = sim_with(vec![
            combatant("ship", ship),
            combatant("drone", base_entity()),
            pickup("gem", PickupEffect::ScoreBonus { amount: 250 }),
        ]);

        // A scripted entity passes over the gem without collecting it
        let drone_id = sim.spawn("drone", Vec2::ZERO, SpawnerRef::World).unwrap();
        let gem = sim.spawn("gem", Vec2::new(0.2, 0.0), SpawnerRef::World).unwrap();
        sim.tick(DT);
        assert!(sim.instance(gem).unwrap().is_active());
        assert_eq!(sim.score(), 0);
        sim.despawn(drone_id);

        let ship_id = sim.spawn("ship", Vec2::new(0.2, 0.0), SpawnerRef::World).unwrap();
        let events = sim.tick(DT);
        assert!(!sim.instance(gem).unwrap().is_active());
        assert_eq!(sim.score(), 250);
        assert!(events.iter().any(|e| matches!(
            e,
            SimEvent::PickupCollected { id, by } if *id == gem && *by == ship_id
        )));
    }

    #[test]
    fn test_weapon_pickup_replaces_the_active_set() {
        let mut ship = base_entity();
        ship.pilot = Pilot::Player { device: 0 };
        let granted = WeaponSpec {
            projectile: "bolt".to_string(),
            autofire: true,
            interval: 0.2,
            fire_once: false,
            time_until_switch: 0.0,
            rotation_offset: 0.0,
        };
        let mut sim = sim_with(vec![
            combatant("ship", ship),
            pickup("cache", PickupEffect::Weapon { weapon: granted }),
        ]);

        let ship_id = sim.spawn("ship", Vec2::ZERO, SpawnerRef::World).unwrap();
        sim.spawn("cache", Vec2::new(0.2, 0.0), SpawnerRef::World).unwrap();
        sim.tick(DT);

        let state = sim.instance(ship_id).unwrap().entity_state().unwrap();
        assert_eq!(
            state.weapon_override.as_ref().map(|w| w.projectile.as_str()),
            Some("bolt")
        );
    }

    #[test]
    fn test_place_rejects_duplicate_names() {
        let mut sim = sim_with(vec![effect("gate")]);
        sim.place("gate", Vec2::ZERO, 0.0, Some("gate_1"), false).unwrap();

        let err = sim
            .place("gate", Vec2::ONE, 0.0, Some("gate_1"), false)
            .unwrap_err();
        assert!(matches!(err, TalonError::DuplicateActorName(_)));
    }

    #[test]
    fn test_resolve_point_prefers_live_player() {
        let mut ship = base_entity();
        ship.pilot = Pilot::Player { device: 0 };
        let mut sim = sim_with(vec![combatant("ship", ship), effect("gate")]);
        sim.register_anchor("base", Vec2::new(9.0, 9.0));

        assert_eq!(sim.resolve_point("player"), None);
        sim.spawn("ship", Vec2::new(2.0, 3.0), SpawnerRef::World).unwrap();
        assert_eq!(sim.resolve_point("player"), Some(Vec2::new(2.0, 3.0)));

        // Named actors resolve only while active; anchors always do
        let gate = sim
            .place("gate", Vec2::new(4.0, 4.0), 0.0, Some("gate_1"), false)
            .unwrap();
        assert_eq!(sim.resolve_point("gate_1"), None);
        sim.set_active(gate, true);
        assert_eq!(sim.resolve_point("gate_1"), Some(Vec2::new(4.0, 4.0)));
        assert_eq!(sim.resolve_point("base"), Some(Vec2::new(9.0, 9.0)));
    }

    #[test]
    fn test_clear_field_sweeps_without_lifecycle() {
        let mut drone = effect("drone");
        drone.despawn_spawn = Some("husk".to_string());
        let mut sim = sim_with(vec![drone, effect("husk")]);

        sim.spawn("drone", Vec2::ZERO, SpawnerRef::World).unwrap();
        sim.tick(DT);

        sim.clear_field();
        let events = sim.tick(DT);
        assert_eq!(sim.pool().active_count(), 0);
        assert_eq!(count(&sim, "husk"), 0);
        assert!(events
            .iter()
            .all(|e| !matches!(e, SimEvent::Despawned { .. })));
    }
}
