#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Placement strategy choosing where each spawn emission happens.
//!
//! Points are selected on the XZ plane; the Y coordinate is taken from the
//! authored point, area centre, or ring anchor.

use std::f32::consts::TAU;

use glam::{Mat4, Vec2, Vec3};
use horde_core::{ConfigurationError, NavigationSurface};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Samples drawn for area and ring shapes before giving up on leaving the view.
pub const DEFAULT_OUTSIDE_VIEW_ATTEMPTS: u32 = 8;

/// Authored spawn location.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// World-space position.
    pub position: Vec3,
    /// Relative weight used by [`SpawnMode::WeightedRandom`].
    #[serde(default = "default_point_weight")]
    pub weight: f32,
}

fn default_point_weight() -> f32 {
    1.0
}

impl SpawnPoint {
    /// Point with unit weight.
    #[must_use]
    pub const fn new(position: Vec3) -> Self {
        Self {
            position,
            weight: 1.0,
        }
    }

    /// Point with an explicit weight.
    #[must_use]
    pub const fn weighted(position: Vec3, weight: f32) -> Self {
        Self { position, weight }
    }
}

/// Region spawn locations are drawn from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpawnShape {
    /// Fixed set of authored points.
    Points {
        /// Candidate points in authored order.
        points: Vec<SpawnPoint>,
    },
    /// Uniformly random point inside an axis-aligned rectangle.
    Area {
        /// Centre of the rectangle.
        center: Vec3,
        /// Half extents along X and Z.
        half_extents: Vec2,
    },
    /// Uniformly random point inside an annulus around the anchor.
    Ring {
        /// Inner radius.
        inner_radius: f32,
        /// Outer radius.
        outer_radius: f32,
    },
}

/// How a candidate is chosen from a point set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnMode {
    /// Cycle through points in order.
    #[default]
    RoundRobin,
    /// Uniformly random point.
    Random,
    /// Random point proportional to its weight.
    WeightedRandom,
    /// Point closest to the anchor.
    NearestToAnchor,
    /// Point farthest from the anchor.
    FarthestFromAnchor,
    /// Random point outside the reference viewpoint's frustum.
    OutsideView,
}

/// Complete placement configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Region candidates are drawn from.
    pub shape: SpawnShape,
    /// Selection mode.
    #[serde(default)]
    pub mode: SpawnMode,
    /// Snaps results onto the navigation surface within this radius.
    #[serde(default)]
    pub snap_radius: Option<f32>,
    /// Samples tried for area and ring shapes in [`SpawnMode::OutsideView`].
    #[serde(default = "default_outside_view_attempts")]
    pub outside_view_attempts: u32,
}

fn default_outside_view_attempts() -> u32 {
    DEFAULT_OUTSIDE_VIEW_ATTEMPTS
}

impl PlacementConfig {
    /// Configuration with the default mode and no snapping.
    #[must_use]
    pub fn new(shape: SpawnShape) -> Self {
        Self {
            shape,
            mode: SpawnMode::default(),
            snap_radius: None,
            outside_view_attempts: DEFAULT_OUTSIDE_VIEW_ATTEMPTS,
        }
    }

    /// Overrides the selection mode.
    #[must_use]
    pub fn with_mode(mut self, mode: SpawnMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enables navigation snapping.
    #[must_use]
    pub fn with_snap_radius(mut self, radius: f32) -> Self {
        self.snap_radius = Some(radius);
        self
    }

    /// Rejects configurations that can never produce a location.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match &self.shape {
            SpawnShape::Points { points } if points.is_empty() => {
                Err(ConfigurationError::EmptySpawnPoints)
            }
            _ => Ok(()),
        }
    }

    /// Non-fatal oddities worth reporting to designers, given the inputs the
    /// caller will supply at emission time.
    #[must_use]
    pub fn warnings(&self, context: &PlacementContext<'_>) -> Vec<PlacementWarning> {
        let mut warnings = Vec::new();
        if let SpawnShape::Ring {
            inner_radius,
            outer_radius,
        } = self.shape
        {
            if outer_radius <= 0.0 || inner_radius < 0.0 || inner_radius > outer_radius {
                warnings.push(PlacementWarning::InvalidRingRadii);
            }
            if context.anchor.is_none() {
                warnings.push(PlacementWarning::RingWithoutAnchor);
            }
        }
        if !matches!(self.shape, SpawnShape::Points { .. })
            && !matches!(self.mode, SpawnMode::RoundRobin | SpawnMode::OutsideView)
        {
            warnings.push(PlacementWarning::ModeIgnoredForShape);
        }
        if self.mode == SpawnMode::OutsideView && context.viewpoint.is_none() {
            warnings.push(PlacementWarning::OutsideViewWithoutViewpoint);
        }
        warnings
    }
}

/// Non-fatal placement configuration problems.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlacementWarning {
    /// Ring radii are negative, zero, or inverted; they are normalised at runtime.
    InvalidRingRadii,
    /// The selection mode only applies to point sets and is ignored.
    ModeIgnoredForShape,
    /// A ring has no anchor and is centred on the origin.
    RingWithoutAnchor,
    /// Outside-view mode has no viewpoint and behaves like its fallback.
    OutsideViewWithoutViewpoint,
}

/// Reference viewpoint used to keep spawns out of sight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewpoint {
    view_projection: Mat4,
}

impl Viewpoint {
    /// Wraps a view-projection matrix producing clip depth in `[0, w]`.
    #[must_use]
    pub const fn new(view_projection: Mat4) -> Self {
        Self { view_projection }
    }

    /// Right-handed perspective camera at `eye` looking at `target`.
    #[must_use]
    pub fn perspective(
        eye: Vec3,
        target: Vec3,
        fov_y_radians: f32,
        aspect_ratio: f32,
        z_near: f32,
        z_far: f32,
    ) -> Self {
        let view = Mat4::look_at_rh(eye, target, Vec3::Y);
        let projection = Mat4::perspective_rh(fov_y_radians, aspect_ratio, z_near, z_far);
        Self::new(projection * view)
    }

    /// Reports whether `point` lies inside the frustum.
    #[must_use]
    pub fn contains(&self, point: Vec3) -> bool {
        let clip = self.view_projection * point.extend(1.0);
        clip.w > 0.0
            && clip.x.abs() <= clip.w
            && clip.y.abs() <= clip.w
            && clip.z >= 0.0
            && clip.z <= clip.w
    }
}

/// Per-emission inputs supplied by the caller.
#[derive(Clone, Copy, Default)]
pub struct PlacementContext<'a> {
    /// Anchor used by rings and anchor-relative modes, usually the player.
    pub anchor: Option<Vec3>,
    /// Viewpoint spawns should stay out of.
    pub viewpoint: Option<&'a Viewpoint>,
    /// Surface used to snap results.
    pub navigation: Option<&'a dyn NavigationSurface>,
}

impl std::fmt::Debug for PlacementContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacementContext")
            .field("anchor", &self.anchor)
            .field("viewpoint", &self.viewpoint)
            .field("navigation", &self.navigation.is_some())
            .finish()
    }
}

/// Stateful placement strategy owning its cursor and random stream.
#[derive(Debug)]
pub struct Placement {
    config: PlacementConfig,
    cursor: usize,
    rng: ChaCha8Rng,
    candidates: Vec<usize>,
}

impl Placement {
    /// Creates a strategy after validating `config`.
    pub fn new(config: PlacementConfig, seed: u64) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            config,
            cursor: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            candidates: Vec::new(),
        })
    }

    /// Chooses the location of the next emission.
    pub fn choose_location(&mut self, context: &PlacementContext<'_>) -> Vec3 {
        let position = match &self.config.shape {
            SpawnShape::Points { points } => {
                let index = select_point(
                    points,
                    self.config.mode,
                    context,
                    &mut self.cursor,
                    &mut self.candidates,
                    &mut self.rng,
                );
                points[index].position
            }
            shape => {
                let attempts = if self.config.mode == SpawnMode::OutsideView {
                    self.config.outside_view_attempts.max(1)
                } else {
                    1
                };
                sample_outside_view(shape, attempts, context, &mut self.rng)
            }
        };

        match (self.config.snap_radius, context.navigation) {
            (Some(radius), Some(navigation)) => navigation
                .nearest_point(position, radius)
                .unwrap_or(position),
            _ => position,
        }
    }
}

fn select_point(
    points: &[SpawnPoint],
    mode: SpawnMode,
    context: &PlacementContext<'_>,
    cursor: &mut usize,
    candidates: &mut Vec<usize>,
    rng: &mut ChaCha8Rng,
) -> usize {
    match mode {
        SpawnMode::RoundRobin => {
            let index = *cursor % points.len();
            *cursor = (index + 1) % points.len();
            index
        }
        SpawnMode::Random => rng.gen_range(0..points.len()),
        SpawnMode::WeightedRandom => weighted_index(points, rng),
        SpawnMode::NearestToAnchor | SpawnMode::FarthestFromAnchor => {
            let Some(anchor) = context.anchor else {
                return rng.gen_range(0..points.len());
            };
            extreme_index(points, anchor, mode == SpawnMode::FarthestFromAnchor)
        }
        SpawnMode::OutsideView => {
            candidates.clear();
            if let Some(viewpoint) = context.viewpoint {
                candidates.extend(
                    points
                        .iter()
                        .enumerate()
                        .filter(|(_, point)| !viewpoint.contains(point.position))
                        .map(|(index, _)| index),
                );
            }
            if candidates.is_empty() {
                rng.gen_range(0..points.len())
            } else {
                candidates[rng.gen_range(0..candidates.len())]
            }
        }
    }
}

fn weighted_index(points: &[SpawnPoint], rng: &mut ChaCha8Rng) -> usize {
    let total: f32 = points.iter().map(|point| point.weight.max(0.0)).sum();
    if total <= 0.0 || !total.is_finite() {
        return rng.gen_range(0..points.len());
    }

    let roll = rng.gen::<f32>() * total;
    let mut cumulative = 0.0;
    let mut last = 0;
    for (index, point) in points.iter().enumerate() {
        let weight = point.weight.max(0.0);
        if weight <= 0.0 {
            continue;
        }
        cumulative += weight;
        last = index;
        if cumulative >= roll {
            return index;
        }
    }
    last
}

fn extreme_index(points: &[SpawnPoint], anchor: Vec3, farthest: bool) -> usize {
    let mut best = 0;
    let mut best_distance = points[0].position.distance_squared(anchor);
    for (index, point) in points.iter().enumerate().skip(1) {
        let distance = point.position.distance_squared(anchor);
        let better = if farthest {
            distance > best_distance
        } else {
            distance < best_distance
        };
        if better {
            best = index;
            best_distance = distance;
        }
    }
    best
}

fn sample_outside_view(
    shape: &SpawnShape,
    attempts: u32,
    context: &PlacementContext<'_>,
    rng: &mut ChaCha8Rng,
) -> Vec3 {
    let first = sample_shape(shape, context, rng);
    let Some(viewpoint) = context.viewpoint.filter(|_| attempts > 1) else {
        return first;
    };
    if !viewpoint.contains(first) {
        return first;
    }

    for _ in 1..attempts {
        let candidate = sample_shape(shape, context, rng);
        if !viewpoint.contains(candidate) {
            return candidate;
        }
    }
    first
}

fn sample_shape(shape: &SpawnShape, context: &PlacementContext<'_>, rng: &mut ChaCha8Rng) -> Vec3 {
    match *shape {
        SpawnShape::Points { ref points } => points[rng.gen_range(0..points.len())].position,
        SpawnShape::Area {
            center,
            half_extents,
        } => {
            let x = (rng.gen::<f32>() * 2.0 - 1.0) * half_extents.x.abs();
            let z = (rng.gen::<f32>() * 2.0 - 1.0) * half_extents.y.abs();
            center + Vec3::new(x, 0.0, z)
        }
        SpawnShape::Ring {
            inner_radius,
            outer_radius,
        } => {
            let anchor = context.anchor.unwrap_or(Vec3::ZERO);
            let inner = inner_radius.max(0.0);
            let outer = outer_radius.max(inner);
            let inner_sq = inner * inner;
            let radius = (inner_sq + rng.gen::<f32>() * (outer * outer - inner_sq)).sqrt();
            let angle = rng.gen::<f32>() * TAU;
            anchor + Vec3::new(radius * angle.cos(), 0.0, radius * angle.sin())
        }
    }
}
