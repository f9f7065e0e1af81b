use std::collections::{BTreeMap, VecDeque};

use horde_core::{InstanceHandle, TemplateId};
use serde::{Deserialize, Serialize};

/// Settings controlling how the reuse pool grows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Instances created per template before the first wave.
    pub warmup: u32,
    /// Creates fresh instances when a template's free list is empty.
    pub auto_expand: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            warmup: 0,
            auto_expand: true,
        }
    }
}

/// Outcome of requesting an instance from the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquired {
    /// A parked instance was handed out.
    Reused(InstanceHandle),
    /// The free list was empty and the pool may grow.
    Expand,
    /// The free list was empty and growth is disabled.
    Exhausted,
}

/// Free lists of parked instances keyed by template.
#[derive(Clone, Debug, Default)]
pub struct InstancePool {
    config: PoolConfig,
    free: BTreeMap<TemplateId, VecDeque<InstanceHandle>>,
}

impl InstancePool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            free: BTreeMap::new(),
        }
    }

    /// Settings the pool was created with.
    #[must_use]
    pub const fn config(&self) -> PoolConfig {
        self.config
    }

    /// Takes the oldest parked instance of `template`.
    pub fn acquire(&mut self, template: TemplateId) -> Acquired {
        match self.free.get_mut(&template).and_then(VecDeque::pop_front) {
            Some(instance) => Acquired::Reused(instance),
            None if self.config.auto_expand => Acquired::Expand,
            None => Acquired::Exhausted,
        }
    }

    /// Parks `instance` for later reuse. Releasing the same handle twice is ignored.
    pub fn release(&mut self, template: TemplateId, instance: InstanceHandle) {
        let free = self.free.entry(template).or_default();
        if !free.contains(&instance) {
            free.push_back(instance);
        }
    }

    /// Drops every parked instance of `template`, returning their handles.
    pub fn evict(&mut self, template: TemplateId) -> Vec<InstanceHandle> {
        self.free
            .remove(&template)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Number of parked instances of `template`.
    #[must_use]
    pub fn available(&self, template: TemplateId) -> usize {
        self.free.get(&template).map_or(0, VecDeque::len)
    }
}
