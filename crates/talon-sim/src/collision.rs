//! Collision world wrapping Rapier 2D
//!
//! Every pooled instance gets a kinematic body with a ball sensor;
//! stage walls are standalone fixed cuboids. Deactivating an instance
//! empties its interaction groups instead of removing the collider, so
//! spare instances keep their physics slot across reuse.

use bimap::BiMap;
use rapier2d::prelude::*;
use std::collections::HashMap;
use talon_core::{Rect, SpawnId, Vec2};

/// One overlap that began during the last step, already resolved back
/// to spawn ids. Pairs are ordered by id; wall contacts carry only the
/// instance side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    Pair { a: SpawnId, b: SpawnId },
    Wall { id: SpawnId },
}

/// Wraps Rapier's physics pipeline and body/collider sets
pub struct CollisionWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub query_pipeline: QueryPipeline,

    /// Spawn id <-> sensor collider handle
    handles: BiMap<SpawnId, ColliderHandle>,
    bodies: HashMap<SpawnId, RigidBodyHandle>,

    /// Collision events from the last step
    collision_recv: crossbeam::channel::Receiver<CollisionEvent>,
    contact_force_recv: crossbeam::channel::Receiver<ContactForceEvent>,
    event_handler: ChannelEventCollector,
}

impl CollisionWorld {
    pub fn new() -> Self {
        let (collision_send, collision_recv) = crossbeam::channel::unbounded();
        let (contact_force_send, contact_force_recv) = crossbeam::channel::unbounded();
        let event_handler = ChannelEventCollector::new(collision_send, contact_force_send);

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            handles: BiMap::new(),
            bodies: HashMap::new(),
            collision_recv,
            contact_force_recv,
            event_handler,
        }
    }

    /// Step the collision pipeline by dt seconds. Zero gravity; bodies
    /// move only where the simulation puts them.
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;

        self.physics_pipeline.step(
            &vector![0.0, 0.0],
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &self.event_handler,
        );
    }

    /// Register an instance's sensor. Called once per pool slot; reuse
    /// goes through `set_position`/`set_active` instead.
    pub fn insert_instance(&mut self, id: SpawnId, position: Vec2, radius: f32) {
        debug_assert!(!self.handles.contains_left(&id));
        let body = RigidBodyBuilder::kinematic_position_based()
            .translation(vector![position.x, position.y])
            .build();
        let body_handle = self.rigid_body_set.insert(body);

        // Instance bodies are kinematic and walls are fixed, neither of
        // which the default pair filter checks; widen it so sensor
        // overlaps between them still report.
        let collider = ColliderBuilder::ball(radius.max(f32::EPSILON))
            .sensor(true)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .active_collision_types(
                ActiveCollisionTypes::default()
                    | ActiveCollisionTypes::KINEMATIC_KINEMATIC
                    | ActiveCollisionTypes::KINEMATIC_FIXED,
            )
            .collision_groups(InteractionGroups::none())
            .build();
        let collider_handle =
            self.collider_set
                .insert_with_parent(collider, body_handle, &mut self.rigid_body_set);

        self.handles.insert(id, collider_handle);
        self.bodies.insert(id, body_handle);
    }

    pub fn contains(&self, id: SpawnId) -> bool {
        self.handles.contains_left(&id)
    }

    /// Write the instance position for the next step
    pub fn set_position(&mut self, id: SpawnId, position: Vec2) {
        if let Some(body) = self
            .bodies
            .get(&id)
            .and_then(|h| self.rigid_body_set.get_mut(*h))
        {
            body.set_next_kinematic_translation(vector![position.x, position.y]);
        }
    }

    /// Discontinuous reposition; skips kinematic velocity estimation
    pub fn teleport(&mut self, id: SpawnId, position: Vec2) {
        if let Some(body) = self
            .bodies
            .get(&id)
            .and_then(|h| self.rigid_body_set.get_mut(*h))
        {
            body.set_translation(vector![position.x, position.y], true);
        }
    }

    /// Flip the sensor between its template groups and no interaction
    /// at all. Inactive instances collide with nothing.
    pub fn set_active(&mut self, id: SpawnId, active: bool, layer: u32, mask: u32) {
        let Some(handle) = self.handles.get_by_left(&id) else {
            return;
        };
        if let Some(collider) = self.collider_set.get_mut(*handle) {
            let groups = if active {
                InteractionGroups::new(
                    Group::from_bits_truncate(layer),
                    Group::from_bits_truncate(mask),
                )
            } else {
                InteractionGroups::none()
            };
            collider.set_collision_groups(groups);
        }
    }

    /// Add a fixed wall collider covering `rect`. Walls are solid but
    /// still pair with sensors; they interact with every layer.
    pub fn add_wall(&mut self, rect: Rect) {
        let center = rect.center();
        let size = rect.size();
        let collider = ColliderBuilder::cuboid((size.x * 0.5).max(0.01), (size.y * 0.5).max(0.01))
            .translation(vector![center.x, center.y])
            .build();
        self.collider_set.insert(collider);
    }

    /// Drain overlap-start events from the last step, resolved to
    /// spawn ids and sorted for a stable processing order
    pub fn drain_contacts(&mut self) -> Vec<Contact> {
        let mut contacts = Vec::new();
        while let Ok(event) = self.collision_recv.try_recv() {
            let CollisionEvent::Started(h1, h2, _) = event else {
                continue;
            };
            let a = self.handles.get_by_right(&h1).copied();
            let b = self.handles.get_by_right(&h2).copied();
            match (a, b) {
                (Some(a), Some(b)) => {
                    let (a, b) = if a <= b { (a, b) } else { (b, a) };
                    contacts.push(Contact::Pair { a, b });
                }
                (Some(id), None) | (None, Some(id)) => contacts.push(Contact::Wall { id }),
                (None, None) => {}
            }
        }
        contacts.sort_by_key(|c| match *c {
            Contact::Pair { a, b } => (0, a, b),
            Contact::Wall { id } => (1, id, id),
        });
        contacts
    }

    /// Drain contact force events from the last step
    pub fn drain_contact_force_events(&self) -> Vec<ContactForceEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.contact_force_recv.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for CollisionWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYER: u32 = 0b01;
    const MASK: u32 = 0b11;

    #[test]
    fn test_create_collision_world() {
        let world = CollisionWorld::new();
        assert_eq!(world.rigid_body_set.len(), 0);
        assert_eq!(world.collider_set.len(), 0);
    }

    #[test]
    fn test_overlap_reports_once_on_start() {
        let mut world = CollisionWorld::new();
        let a = SpawnId::new();
        let b = SpawnId::new();
        world.insert_instance(a, Vec2::new(0.0, 0.0), 0.5);
        world.insert_instance(b, Vec2::new(10.0, 0.0), 0.5);
        world.set_active(a, true, LAYER, MASK);
        world.set_active(b, true, LAYER, MASK);

        world.step(1.0 / 60.0);
        assert!(world.drain_contacts().is_empty());

        // Move b onto a; the overlap begins exactly once
        world.set_position(b, Vec2::new(0.2, 0.0));
        world.step(1.0 / 60.0);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        assert_eq!(world.drain_contacts(), vec![Contact::Pair { a: lo, b: hi }]);

        world.step(1.0 / 60.0);
        assert!(world.drain_contacts().is_empty());
    }

    #[test]
    fn test_inactive_sensor_pairs_with_nothing() {
        let mut world = CollisionWorld::new();
        let a = SpawnId::new();
        let b = SpawnId::new();
        world.insert_instance(a, Vec2::new(0.0, 0.0), 0.5);
        world.insert_instance(b, Vec2::new(0.2, 0.0), 0.5);
        world.set_active(a, true, LAYER, MASK);
        // b stays inactive: groups are empty, overlap never reported

        world.step(1.0 / 60.0);
        assert!(world.drain_contacts().is_empty());

        world.set_active(b, true, LAYER, MASK);
        world.step(1.0 / 60.0);
        assert_eq!(world.drain_contacts().len(), 1);
    }

    #[test]
    fn test_wall_contact_resolves_to_instance_side() {
        let mut world = CollisionWorld::new();
        let id = SpawnId::new();
        world.insert_instance(id, Vec2::new(0.0, 0.0), 0.5);
        world.set_active(id, true, LAYER, MASK);
        world.add_wall(Rect::new(Vec2::new(-1.0, -0.25), Vec2::new(1.0, 0.25)));

        world.step(1.0 / 60.0);
        assert_eq!(world.drain_contacts(), vec![Contact::Wall { id }]);
    }

    #[test]
    fn test_mask_filters_layers() {
        let mut world = CollisionWorld::new();
        let a = SpawnId::new();
        let b = SpawnId::new();
        world.insert_instance(a, Vec2::new(0.0, 0.0), 0.5);
        world.insert_instance(b, Vec2::new(0.2, 0.0), 0.5);
        // Layers are disjoint and masks exclude each other
        world.set_active(a, true, 0b01, 0b01);
        world.set_active(b, true, 0b10, 0b10);

        world.step(1.0 / 60.0);
        assert!(world.drain_contacts().is_empty());
    }
}
