//! Flat walkable surface used to snap spawn locations.

use glam::{Vec2, Vec3};
use horde_core::NavigationSurface;
use serde::{Deserialize, Serialize};

/// Axis-aligned walkable rectangle on the XZ plane at a fixed height.
///
/// The nearest walkable point is the clamp of the query onto the rectangle,
/// lifted to the surface height. Deserialised corners are normalised the same
/// way [`WalkableArea::new`] normalises them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "AreaBounds")]
pub struct WalkableArea {
    min: Vec2,
    max: Vec2,
    height: f32,
}

#[derive(Deserialize)]
struct AreaBounds {
    min: Vec2,
    max: Vec2,
    height: f32,
}

impl From<AreaBounds> for WalkableArea {
    fn from(bounds: AreaBounds) -> Self {
        Self::new(bounds.min, bounds.max, bounds.height)
    }
}

impl WalkableArea {
    /// Creates an area spanning the two corners, in any order.
    #[must_use]
    pub fn new(corner_a: Vec2, corner_b: Vec2, height: f32) -> Self {
        Self {
            min: corner_a.min(corner_b),
            max: corner_a.max(corner_b),
            height,
        }
    }

    /// Lower corner on the XZ plane.
    #[must_use]
    pub const fn min(&self) -> Vec2 {
        self.min
    }

    /// Upper corner on the XZ plane.
    #[must_use]
    pub const fn max(&self) -> Vec2 {
        self.max
    }

    /// Height of the surface.
    #[must_use]
    pub const fn height(&self) -> f32 {
        self.height
    }
}

impl NavigationSurface for WalkableArea {
    fn nearest_point(&self, position: Vec3, max_distance: f32) -> Option<Vec3> {
        let planar = Vec2::new(position.x, position.z).clamp(self.min, self.max);
        let snapped = Vec3::new(planar.x, self.height, planar.y);
        (snapped.distance(position) <= max_distance).then_some(snapped)
    }
}
