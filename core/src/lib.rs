#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Horde wave engine.
//!
//! This crate defines the vocabulary that connects the pure systems, the
//! reference world, and adapters. Systems evaluate immutable configuration
//! (catalogs, curves) and report what happened through [`Event`] values that
//! callers collect into buffers. Spawned enemies are opaque
//! [`InstanceHandle`] values produced by an [`InstanceFactory`]
//! collaborator; the engine never looks inside them, it only asks whether they
//! are still alive.

use std::{cmp::Ordering, fmt};

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Index of a wave. Waves are numbered from one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct WaveIndex(u32);

impl WaveIndex {
    /// The first wave of a run.
    pub const FIRST: Self = Self(1);

    /// Creates a wave index, promoting zero to the first wave.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        if value == 0 {
            Self::FIRST
        } else {
            Self(value)
        }
    }

    /// Retrieves the numeric wave number.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns the wave that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Reports whether this wave lands on a multiple of `period`.
    ///
    /// A zero period never matches.
    #[must_use]
    pub const fn is_multiple_of(self, period: u32) -> bool {
        period != 0 && self.0 % period == 0
    }

    /// Wave number as a curve abscissa.
    #[must_use]
    pub fn as_curve_x(self) -> f32 {
        self.0 as f32
    }
}

impl TryFrom<u32> for WaveIndex {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value == 0 {
            return Err("wave indices start at 1".to_owned());
        }
        Ok(Self(value))
    }
}

impl From<WaveIndex> for u32 {
    fn from(wave: WaveIndex) -> Self {
        wave.0
    }
}

impl fmt::Display for WaveIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a spawnable enemy template understood by the instance factory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(u32);

impl TemplateId {
    /// Creates a new template identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Opaque handle to an instance created by an [`InstanceFactory`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceHandle(u64);

impl InstanceHandle {
    /// Creates a new instance handle.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the handle.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Notifications broadcast while waves are generated, paced, and cleared.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A wave was generated and its spawn queue is ready.
    WaveStarted {
        /// Wave that started.
        wave: WaveIndex,
    },
    /// An enemy was emitted from the spawn queue.
    EnemySpawned {
        /// Wave that owns the spawned enemy.
        wave: WaveIndex,
        /// Handle returned by the instance factory.
        instance: InstanceHandle,
        /// Template the enemy was created from.
        template: TemplateId,
        /// World-space location chosen by the placement strategy.
        position: Vec3,
    },
    /// Every enemy of the wave was emitted and none remain alive.
    AllEnemiesDefeated {
        /// Wave that was cleared.
        wave: WaveIndex,
    },
    /// The wave finished; the next wave is generated immediately afterwards.
    WaveEnded {
        /// Wave that ended.
        wave: WaveIndex,
    },
    /// The world defeated an instance in response to a command.
    InstanceDefeated {
        /// Instance that was defeated.
        instance: InstanceHandle,
        /// Template the instance was created from.
        template: TemplateId,
    },
}

/// Commands that express all permissible mutations of the reference world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Makes a template available for instantiation.
    RegisterTemplate {
        /// Template being loaded.
        template: TemplateId,
    },
    /// Removes a template; queued references to it will resolve to nothing.
    UnregisterTemplate {
        /// Template being unloaded.
        template: TemplateId,
    },
    /// Marks a live instance as defeated.
    DefeatInstance {
        /// Instance being defeated.
        instance: InstanceHandle,
    },
}

/// Lifetime state of an instance as reported by the factory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Liveness {
    /// The instance exists and participates in the simulation.
    Active,
    /// The instance exists but was deactivated, typically parked in a reuse pool.
    Inactive,
    /// The instance no longer exists.
    Destroyed,
}

/// Determines which lifetime states still count towards the live population.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessPolicy {
    /// Only destroyed instances leave the live set.
    DestroyedOnly,
    /// Destroyed and deactivated instances both leave the live set.
    #[default]
    DestroyedOrInactive,
}

impl LivenessPolicy {
    /// Reports whether an instance in the provided state is still alive.
    #[must_use]
    pub const fn is_alive(self, liveness: Liveness) -> bool {
        match (self, liveness) {
            (_, Liveness::Active) => true,
            (Self::DestroyedOnly, Liveness::Inactive) => true,
            (Self::DestroyedOrInactive, Liveness::Inactive) => false,
            (_, Liveness::Destroyed) => false,
        }
    }
}

/// Collaborator that turns template references into live instances.
pub trait InstanceFactory {
    /// Creates an instance of `template` at the provided pose.
    ///
    /// Returns `None` when the template cannot be resolved, for example
    /// because it was unloaded after the wave was generated.
    fn instantiate(
        &mut self,
        template: TemplateId,
        position: Vec3,
        orientation: Quat,
    ) -> Option<InstanceHandle>;

    /// Reports the lifetime state of a previously created instance.
    fn liveness(&self, instance: InstanceHandle) -> Liveness;

    /// Hands an instance that left the live set back for reuse.
    fn recycle(&mut self, _template: TemplateId, _instance: InstanceHandle) {}
}

/// Collaborator exposing the walkable surface used to snap spawn locations.
pub trait NavigationSurface {
    /// Finds the closest walkable point within `max_distance` of `position`.
    fn nearest_point(&self, position: Vec3, max_distance: f32) -> Option<Vec3>;
}

/// Special wave variants that override a wave's parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialArchetype {
    /// Ordinary wave without overrides.
    #[default]
    None,
    /// Fast wave with a shorter window and a higher spawn rate.
    Rush,
    /// Heavy wave that favours expensive entries.
    Tank,
    /// Crowded wave that favours cheap entries.
    Swarm,
    /// Wave that inserts the configured boss entry.
    Boss,
}

impl SpecialArchetype {
    /// Archetypes in resolution priority order, highest first.
    pub const PRIORITY: [Self; 4] = [Self::Boss, Self::Tank, Self::Swarm, Self::Rush];
}

impl fmt::Display for SpecialArchetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "none",
            Self::Rush => "rush",
            Self::Tank => "tank",
            Self::Swarm => "swarm",
            Self::Boss => "boss",
        };
        f.write_str(label)
    }
}

/// Single `(x, y)` control point of a [`Curve`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keyframe {
    /// Abscissa, a wave index or a normalised progress value.
    pub x: f32,
    /// Value produced at `x`.
    pub y: f32,
}

impl Keyframe {
    /// Creates a keyframe.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Reasons a curve definition may be rejected.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum CurveError {
    /// A keyframe contained NaN or an infinite coordinate.
    #[error("keyframe {index} is not finite")]
    NonFinite {
        /// Position of the offending keyframe as authored.
        index: usize,
    },
}

/// Piecewise-linear interpolant over keyframes with constant extrapolation.
///
/// An empty curve evaluates to zero everywhere.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f32; 2]>", into = "Vec<[f32; 2]>")]
pub struct Curve {
    keys: Vec<Keyframe>,
}

impl Curve {
    /// Builds a curve from keyframes in any order.
    pub fn new(keys: Vec<Keyframe>) -> Result<Self, CurveError> {
        if let Some(index) = keys
            .iter()
            .position(|key| !key.x.is_finite() || !key.y.is_finite())
        {
            return Err(CurveError::NonFinite { index });
        }

        let mut keys = keys;
        keys.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
        Ok(Self { keys })
    }

    /// Curve that yields `value` everywhere.
    #[must_use]
    pub fn constant(value: f32) -> Self {
        Self {
            keys: vec![Keyframe::new(1.0, value)],
        }
    }

    /// Straight line through two keyframes, flat beyond them.
    #[must_use]
    pub fn linear(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        let mut keys = vec![Keyframe::new(x0, y0), Keyframe::new(x1, y1)];
        keys.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
        Self { keys }
    }

    /// Keyframes sorted by abscissa.
    #[must_use]
    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    /// Reports whether the curve has no keyframes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Evaluates the curve at `x`.
    #[must_use]
    pub fn evaluate(&self, x: f32) -> f32 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return 0.0;
        };

        if x <= first.x {
            return first.y;
        }
        if x >= last.x {
            return last.y;
        }

        let upper_index = self.keys.partition_point(|key| key.x <= x);
        let lower = self.keys[upper_index - 1];
        let upper = self.keys[upper_index];
        let span = upper.x - lower.x;
        if span <= f32::EPSILON {
            return upper.y;
        }

        let t = (x - lower.x) / span;
        lower.y + (upper.y - lower.y) * t
    }
}

impl TryFrom<Vec<[f32; 2]>> for Curve {
    type Error = CurveError;

    fn try_from(pairs: Vec<[f32; 2]>) -> Result<Self, Self::Error> {
        Self::new(
            pairs
                .into_iter()
                .map(|[x, y]| Keyframe::new(x, y))
                .collect(),
        )
    }
}

impl From<Curve> for Vec<[f32; 2]> {
    fn from(curve: Curve) -> Self {
        curve.keys.into_iter().map(|key| [key.x, key.y]).collect()
    }
}

const DEFAULT_MAX_WAVE: u32 = 999;

/// Authored description of one enemy archetype.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    template: Option<TemplateId>,
    #[serde(default = "default_cost")]
    cost: u32,
    #[serde(default = "default_weight")]
    weight: f32,
    #[serde(default = "default_min_wave")]
    min_wave: u32,
    #[serde(default = "default_max_wave")]
    max_wave: u32,
    #[serde(default)]
    tags: Vec<String>,
}

fn default_cost() -> u32 {
    1
}

fn default_weight() -> f32 {
    1.0
}

fn default_min_wave() -> u32 {
    1
}

fn default_max_wave() -> u32 {
    DEFAULT_MAX_WAVE
}

impl CatalogEntry {
    /// Creates an entry available from wave 1 onwards.
    #[must_use]
    pub fn new(name: impl Into<String>, template: TemplateId, cost: u32, weight: f32) -> Self {
        Self {
            name: name.into(),
            template: Some(template),
            cost,
            weight,
            min_wave: 1,
            max_wave: DEFAULT_MAX_WAVE,
            tags: Vec::new(),
        }
    }

    /// Restricts the entry to the inclusive wave window.
    #[must_use]
    pub fn with_wave_window(mut self, min_wave: u32, max_wave: u32) -> Self {
        self.min_wave = min_wave;
        self.max_wave = max_wave;
        self
    }

    /// Attaches descriptive tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Drops the template reference, as if the asset were never assigned.
    #[must_use]
    pub fn without_template(mut self) -> Self {
        self.template = None;
        self
    }

    /// Human readable label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Template instantiated when the entry is chosen.
    #[must_use]
    pub const fn template(&self) -> Option<TemplateId> {
        self.template
    }

    /// Budget consumed when the entry is chosen.
    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    /// Relative selection weight.
    #[must_use]
    pub const fn weight(&self) -> f32 {
        self.weight
    }

    /// First wave the entry may appear in.
    #[must_use]
    pub const fn min_wave(&self) -> u32 {
        self.min_wave
    }

    /// Last wave the entry may appear in.
    #[must_use]
    pub const fn max_wave(&self) -> u32 {
        self.max_wave
    }

    /// Descriptive tags attached by designers.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Reports whether the entry carries `tag`. An empty tag never matches.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        !tag.is_empty() && self.tags.iter().any(|candidate| candidate == tag)
    }

    /// Reports whether the entry may be chosen for `wave`.
    #[must_use]
    pub fn is_available_for(&self, wave: WaveIndex) -> bool {
        let wave = wave.get();
        wave >= self.min_wave
            && wave <= self.max_wave
            && self.template.is_some()
            && self.cost > 0
            && self.weight > 0.0
    }
}

/// Structural problems that prevent the scheduler from starting.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigurationError {
    /// No wave profile was supplied.
    #[error("no wave profile configured")]
    MissingProfile,
    /// Normal, fallback, and elite catalogs are all empty.
    #[error("wave profile has no catalog entries")]
    EmptyCatalogs,
    /// Point-based placement was selected without any points.
    #[error("point-based placement requires at least one spawn point")]
    EmptySpawnPoints,
    /// A curve failed validation.
    #[error("curve `{curve}` is invalid: {source}")]
    InvalidCurve {
        /// Name of the offending curve.
        curve: &'static str,
        /// Underlying curve error.
        #[source]
        source: CurveError,
    },
    /// A tunable fell outside its permitted range.
    #[error("`{field}` must be {requirement}, got {value}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Human readable constraint.
        requirement: &'static str,
        /// Offending value.
        value: f32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_keyframe_curve_is_constant() {
        let curve = Curve::new(vec![Keyframe::new(1.0, 7.5)]).expect("valid curve");
        for wave in 1..=50 {
            assert_eq!(curve.evaluate(wave as f32), 7.5, "wave {wave}");
        }
        assert_eq!(Curve::constant(7.5), curve);
    }

    #[test]
    fn linear_segments_interpolate_between_keys() {
        let curve = Curve::linear(1.0, 10.0, 21.0, 30.0);
        assert_eq!(curve.evaluate(1.0), 10.0);
        assert_eq!(curve.evaluate(11.0), 20.0);
        assert_eq!(curve.evaluate(21.0), 30.0);
    }

    #[test]
    fn curve_extrapolates_flat_beyond_keys() {
        let curve = Curve::linear(0.0, 1.0, 1.0, 3.0);
        assert_eq!(curve.evaluate(-4.0), 1.0);
        assert_eq!(curve.evaluate(9.0), 3.0);
    }

    #[test]
    fn keys_are_sorted_on_construction() {
        let curve = Curve::new(vec![
            Keyframe::new(10.0, 100.0),
            Keyframe::new(0.0, 0.0),
            Keyframe::new(5.0, 20.0),
        ])
        .expect("valid curve");
        assert_eq!(curve.evaluate(2.5), 10.0);
        assert_eq!(curve.evaluate(7.5), 60.0);
    }

    #[test]
    fn empty_curve_evaluates_to_zero() {
        assert_eq!(Curve::default().evaluate(3.0), 0.0);
    }

    #[test]
    fn non_finite_keyframes_are_rejected() {
        let error = Curve::new(vec![Keyframe::new(1.0, 2.0), Keyframe::new(f32::NAN, 1.0)])
            .expect_err("nan must be rejected");
        assert_eq!(error, CurveError::NonFinite { index: 1 });
    }

    #[test]
    fn curve_deserializes_from_pairs() {
        #[derive(Deserialize)]
        struct Holder {
            curve: Curve,
        }

        let holder: Holder = toml::from_str("curve = [[20.0, 60.0], [1.0, 20.0]]").expect("parse");
        assert_eq!(holder.curve.keys()[0], Keyframe::new(1.0, 20.0));
        assert_eq!(holder.curve.evaluate(20.0), 60.0);
    }

    #[test]
    fn entry_availability_honours_window_and_template() {
        let entry = CatalogEntry::new("grunt", TemplateId::new(1), 2, 1.0).with_wave_window(3, 5);
        assert!(!entry.is_available_for(WaveIndex::new(2)));
        assert!(entry.is_available_for(WaveIndex::new(3)));
        assert!(entry.is_available_for(WaveIndex::new(5)));
        assert!(!entry.is_available_for(WaveIndex::new(6)));
        assert!(!entry.clone().without_template().is_available_for(WaveIndex::new(4)));
        assert!(!CatalogEntry::new("free", TemplateId::new(2), 0, 1.0).is_available_for(WaveIndex::FIRST));
        assert!(!CatalogEntry::new("never", TemplateId::new(3), 1, 0.0).is_available_for(WaveIndex::FIRST));
    }

    #[test]
    fn entry_tags_match_exactly() {
        let entry = CatalogEntry::new("brute", TemplateId::new(4), 5, 1.0).with_tags(["heavy", "melee"]);
        assert_eq!(entry.tags(), ["heavy", "melee"]);
        assert!(entry.has_tag("heavy"));
        assert!(!entry.has_tag("ranged"));
        assert!(!entry.has_tag(""));
    }

    #[test]
    fn wave_index_periods() {
        let wave = WaveIndex::new(10);
        assert!(wave.is_multiple_of(5));
        assert!(!wave.is_multiple_of(3));
        assert!(!wave.is_multiple_of(0));
        assert_eq!(WaveIndex::new(0), WaveIndex::FIRST);
        assert_eq!(wave.next().get(), 11);
    }

    #[test]
    fn liveness_policy_controls_inactive_instances() {
        assert!(LivenessPolicy::DestroyedOnly.is_alive(Liveness::Inactive));
        assert!(!LivenessPolicy::DestroyedOrInactive.is_alive(Liveness::Inactive));
        assert!(!LivenessPolicy::DestroyedOnly.is_alive(Liveness::Destroyed));
        assert!(LivenessPolicy::DestroyedOrInactive.is_alive(Liveness::Active));
    }
}
