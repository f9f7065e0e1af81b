//! Serialisable authoring surface for wave profiles.

use horde_core::{CatalogEntry, SpecialArchetype};
use horde_system_allocation::BossPosition;
use serde::{Deserialize, Serialize};

/// Raw `(x, y)` keyframes as written in configuration files.
pub type KeyframePairs = Vec<[f32; 2]>;

/// Complete description of a wave profile prior to validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveProfileConfig {
    /// Per-wave curves.
    pub curves: CurveConfig,
    /// Global multipliers applied on top of the curves.
    pub multipliers: GlobalMultipliers,
    /// Regular enemies.
    pub normal: Vec<CatalogEntry>,
    /// Elite enemies drawn according to the elite chance.
    pub elite: Vec<CatalogEntry>,
    /// Used in place of `normal` when `normal` is empty.
    pub fallback: Vec<CatalogEntry>,
    /// Boss inserted on boss waves.
    pub boss: Option<BossConfig>,
    /// Periodic special-wave rules.
    pub archetypes: ArchetypeRules,
    /// Ends a wave as soon as its spawn queue runs dry.
    pub end_early_when_queue_empty: bool,
}

impl Default for WaveProfileConfig {
    fn default() -> Self {
        Self {
            curves: CurveConfig::default(),
            multipliers: GlobalMultipliers::default(),
            normal: Vec::new(),
            elite: Vec::new(),
            fallback: Vec::new(),
            boss: None,
            archetypes: ArchetypeRules::default(),
            end_early_when_queue_empty: true,
        }
    }
}

/// Keyframes for every per-wave curve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    /// Wave → duration in seconds.
    pub duration: KeyframePairs,
    /// Wave → budget.
    pub budget: KeyframePairs,
    /// Wave → spawns per second.
    pub spawn_rate: KeyframePairs,
    /// Wave → maximum entries generated.
    pub population_cap: KeyframePairs,
    /// Wave → maximum simultaneously alive; empty or non-positive means unbounded.
    pub concurrency_cap: KeyframePairs,
    /// Normalised progress → spawn rate multiplier.
    pub pacing: KeyframePairs,
    /// Wave → probability of drawing an elite first.
    pub elite_chance: KeyframePairs,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            duration: vec![[1.0, 20.0], [20.0, 60.0]],
            budget: vec![[1.0, 10.0], [20.0, 80.0]],
            spawn_rate: vec![[1.0, 1.0]],
            population_cap: vec![[1.0, 50.0]],
            concurrency_cap: Vec::new(),
            pacing: vec![[0.0, 1.0], [1.0, 1.0]],
            elite_chance: vec![[1.0, 0.0]],
        }
    }
}

/// Multipliers applied to every wave.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalMultipliers {
    /// Scales the budget curve.
    pub budget: f32,
    /// Scales the duration curve.
    pub duration: f32,
    /// Scales the spawn-rate curve.
    pub spawn_rate: f32,
}

impl Default for GlobalMultipliers {
    fn default() -> Self {
        Self {
            budget: 1.0,
            duration: 1.0,
            spawn_rate: 1.0,
        }
    }
}

/// Boss inserted on boss waves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BossConfig {
    /// Catalog description of the boss.
    pub entry: CatalogEntry,
    /// Deducts the boss cost from the wave budget before regular allocation.
    #[serde(default = "default_true")]
    pub consumes_budget: bool,
    /// Where the boss lands in the spawn order.
    #[serde(default)]
    pub position: BossPosition,
    /// Accepts boss waves that contain no regular entries.
    #[serde(default)]
    pub allow_boss_only_waves: bool,
}

fn default_true() -> bool {
    true
}

/// Periodic rule for one special archetype.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchetypeRule {
    /// Whether the rule participates in resolution.
    pub enabled: bool,
    /// The rule applies to every wave that is a multiple of this period.
    pub period: u32,
    /// Budget override multiplier.
    pub budget: f32,
    /// Duration override multiplier.
    pub duration: f32,
    /// Spawn-rate override multiplier.
    pub spawn_rate: f32,
    /// Population-cap override multiplier.
    pub population_cap: f32,
    /// Cost-bias magnitude; its sign is fixed by the archetype.
    pub cost_bias: f32,
}

impl Default for ArchetypeRule {
    fn default() -> Self {
        Self {
            enabled: false,
            period: 0,
            budget: 1.0,
            duration: 1.0,
            spawn_rate: 1.0,
            population_cap: 1.0,
            cost_bias: 0.0,
        }
    }
}

impl ArchetypeRule {
    /// Enabled rule with neutral multipliers firing every `period` waves.
    #[must_use]
    pub fn every(period: u32) -> Self {
        Self {
            enabled: true,
            period,
            ..Self::default()
        }
    }
}

/// Rules for every special archetype.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchetypeRules {
    /// Fast waves.
    pub rush: ArchetypeRule,
    /// Heavy waves.
    pub tank: ArchetypeRule,
    /// Crowded waves.
    pub swarm: ArchetypeRule,
    /// Boss waves.
    pub boss: ArchetypeRule,
}

impl ArchetypeRules {
    /// Rule governing `archetype`, if it has one.
    #[must_use]
    pub const fn rule(&self, archetype: SpecialArchetype) -> Option<&ArchetypeRule> {
        match archetype {
            SpecialArchetype::None => None,
            SpecialArchetype::Rush => Some(&self.rush),
            SpecialArchetype::Tank => Some(&self.tank),
            SpecialArchetype::Swarm => Some(&self.swarm),
            SpecialArchetype::Boss => Some(&self.boss),
        }
    }
}
