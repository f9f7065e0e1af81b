#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Reference world that hosts spawned enemies.
//!
//! The world owns template registrations and instances. It implements
//! [`InstanceFactory`] so the scheduler can run against it headlessly, and it
//! is mutated by adapters exclusively through [`apply`].

mod navigation;
mod pool;

use std::collections::{BTreeMap, BTreeSet};

use glam::{Quat, Vec3};
use horde_core::{Command, Event, InstanceFactory, InstanceHandle, Liveness, TemplateId};
use tracing::debug;

pub use navigation::WalkableArea;
pub use pool::{Acquired, InstancePool, PoolConfig};

#[derive(Clone, Copy, Debug)]
struct Instance {
    template: TemplateId,
    position: Vec3,
    orientation: Quat,
    liveness: Liveness,
    activations: u32,
}

/// Authoritative state of the reference world.
#[derive(Debug, Default)]
pub struct World {
    templates: BTreeSet<TemplateId>,
    instances: BTreeMap<InstanceHandle, Instance>,
    pool: Option<InstancePool>,
    next_handle: u64,
}

impl World {
    /// Creates a world without instance reuse.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a world that parks defeated instances for reuse.
    #[must_use]
    pub fn with_pool(config: PoolConfig) -> Self {
        Self {
            pool: Some(InstancePool::new(config)),
            ..Self::default()
        }
    }

    fn create(
        &mut self,
        template: TemplateId,
        position: Vec3,
        orientation: Quat,
        liveness: Liveness,
    ) -> InstanceHandle {
        self.next_handle = self.next_handle.saturating_add(1);
        let handle = InstanceHandle::new(self.next_handle);
        let activations = u32::from(liveness == Liveness::Active);
        let _ = self.instances.insert(
            handle,
            Instance {
                template,
                position,
                orientation,
                liveness,
                activations,
            },
        );
        handle
    }

    fn warm_up(&mut self, template: TemplateId) {
        let Some(warmup) = self.pool.as_ref().map(|pool| pool.config().warmup) else {
            return;
        };
        for _ in 0..warmup {
            let handle = self.create(template, Vec3::ZERO, Quat::IDENTITY, Liveness::Inactive);
            if let Some(pool) = self.pool.as_mut() {
                pool.release(template, handle);
            }
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::RegisterTemplate { template } => {
            if world.templates.insert(template) {
                world.warm_up(template);
                debug!(template = template.get(), "template registered");
            }
        }
        Command::UnregisterTemplate { template } => {
            if !world.templates.remove(&template) {
                return;
            }
            if let Some(pool) = world.pool.as_mut() {
                for handle in pool.evict(template) {
                    let _ = world.instances.remove(&handle);
                }
            }
            debug!(template = template.get(), "template unregistered");
        }
        Command::DefeatInstance { instance } => {
            let Some(record) = world.instances.get_mut(&instance) else {
                return;
            };
            if record.liveness != Liveness::Active {
                return;
            }
            let template = record.template;
            if world.pool.is_some() {
                record.liveness = Liveness::Inactive;
            } else {
                let _ = world.instances.remove(&instance);
            }
            out_events.push(Event::InstanceDefeated { instance, template });
        }
    }
}

impl InstanceFactory for World {
    fn instantiate(
        &mut self,
        template: TemplateId,
        position: Vec3,
        orientation: Quat,
    ) -> Option<InstanceHandle> {
        if !self.templates.contains(&template) {
            return None;
        }

        let acquired = self
            .pool
            .as_mut()
            .map_or(Acquired::Expand, |pool| pool.acquire(template));
        match acquired {
            Acquired::Reused(handle) => {
                let record = self.instances.get_mut(&handle)?;
                record.position = position;
                record.orientation = orientation;
                record.liveness = Liveness::Active;
                record.activations = record.activations.saturating_add(1);
                Some(handle)
            }
            Acquired::Expand => {
                Some(self.create(template, position, orientation, Liveness::Active))
            }
            Acquired::Exhausted => {
                debug!(template = template.get(), "instance pool exhausted");
                None
            }
        }
    }

    fn liveness(&self, instance: InstanceHandle) -> Liveness {
        self.instances
            .get(&instance)
            .map_or(Liveness::Destroyed, |record| record.liveness)
    }

    fn recycle(&mut self, template: TemplateId, instance: InstanceHandle) {
        let Some(record) = self.instances.get(&instance) else {
            return;
        };
        if record.liveness == Liveness::Active || record.template != template {
            return;
        }
        match self.pool.as_mut() {
            Some(pool) if self.templates.contains(&template) => pool.release(template, instance),
            _ => {
                let _ = self.instances.remove(&instance);
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use glam::{Quat, Vec3};
    use horde_core::{InstanceHandle, Liveness, TemplateId};

    use super::World;

    /// Reports whether `template` can currently be instantiated.
    #[must_use]
    pub fn is_registered(world: &World, template: TemplateId) -> bool {
        world.templates.contains(&template)
    }

    /// Captures a read-only snapshot of a single instance.
    #[must_use]
    pub fn instance(world: &World, handle: InstanceHandle) -> Option<InstanceSnapshot> {
        world.instances.get(&handle).map(|record| InstanceSnapshot {
            handle,
            template: record.template,
            position: record.position,
            orientation: record.orientation,
            liveness: record.liveness,
            activations: record.activations,
        })
    }

    /// Handles of every active instance in ascending order.
    #[must_use]
    pub fn active_instances(world: &World) -> Vec<InstanceHandle> {
        world
            .instances
            .iter()
            .filter(|(_, record)| record.liveness == Liveness::Active)
            .map(|(handle, _)| *handle)
            .collect()
    }

    /// Number of instances parked for `template`.
    #[must_use]
    pub fn pooled(world: &World, template: TemplateId) -> usize {
        world
            .pool
            .as_ref()
            .map_or(0, |pool| pool.available(template))
    }

    /// Number of instances the world has ever created.
    #[must_use]
    pub fn created_count(world: &World) -> u64 {
        world.next_handle
    }

    /// Read-only description of an instance.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct InstanceSnapshot {
        /// Instance handle.
        pub handle: InstanceHandle,
        /// Template the instance was created from.
        pub template: TemplateId,
        /// Last spawn position.
        pub position: Vec3,
        /// Last spawn orientation.
        pub orientation: Quat,
        /// Current lifetime state.
        pub liveness: Liveness,
        /// Number of times the instance was activated.
        pub activations: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(world: &mut World, template: TemplateId) {
        let mut events = Vec::new();
        apply(world, Command::RegisterTemplate { template }, &mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn unregistered_templates_do_not_instantiate() {
        let mut world = World::new();
        assert_eq!(
            world.instantiate(TemplateId::new(4), Vec3::ZERO, Quat::IDENTITY),
            None
        );
    }

    #[test]
    fn defeat_without_pool_destroys_instance() {
        let template = TemplateId::new(1);
        let mut world = World::new();
        registered(&mut world, template);
        let handle = world
            .instantiate(template, Vec3::new(1.0, 0.0, 2.0), Quat::IDENTITY)
            .expect("registered template");
        assert_eq!(world.liveness(handle), Liveness::Active);

        let mut events = Vec::new();
        apply(&mut world, Command::DefeatInstance { instance: handle }, &mut events);
        assert_eq!(
            events,
            vec![Event::InstanceDefeated {
                instance: handle,
                template
            }]
        );
        assert_eq!(world.liveness(handle), Liveness::Destroyed);

        events.clear();
        apply(&mut world, Command::DefeatInstance { instance: handle }, &mut events);
        assert!(events.is_empty(), "second defeat is ignored");
    }

    #[test]
    fn unregistering_evicts_parked_instances() {
        let template = TemplateId::new(2);
        let mut world = World::with_pool(PoolConfig {
            warmup: 3,
            auto_expand: true,
        });
        registered(&mut world, template);
        assert_eq!(query::pooled(&world, template), 3);

        let mut events = Vec::new();
        apply(&mut world, Command::UnregisterTemplate { template }, &mut events);
        assert_eq!(query::pooled(&world, template), 0);
        assert!(!query::is_registered(&world, template));
        assert!(query::active_instances(&world).is_empty());
    }
}
