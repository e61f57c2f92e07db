//! Geometric helpers: box orientations, containment and collision tests.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::PlacedBox;
use crate::types::Vec3;

/// One of the six axis-aligned orientations of a box.
///
/// The name lists which input component ends up on the container's x, y and z
/// axis. `Xyz` keeps the input orientation, `Zyx` swaps length and width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Xyz,
    Xzy,
    Yxz,
    Yzx,
    Zxy,
    Zyx,
}

impl Orientation {
    /// All orientations, identity first.
    pub const ALL: [Orientation; 6] = [
        Orientation::Xyz,
        Orientation::Xzy,
        Orientation::Yxz,
        Orientation::Yzx,
        Orientation::Zxy,
        Orientation::Zyx,
    ];

    /// Maps input dimensions onto the container axes.
    #[inline]
    pub fn apply(self, dims: Vec3) -> Vec3 {
        let Vec3 { x, y, z } = dims;
        match self {
            Orientation::Xyz => Vec3::new(x, y, z),
            Orientation::Xzy => Vec3::new(x, z, y),
            Orientation::Yxz => Vec3::new(y, x, z),
            Orientation::Yzx => Vec3::new(y, z, x),
            Orientation::Zxy => Vec3::new(z, x, y),
            Orientation::Zyx => Vec3::new(z, y, x),
        }
    }
}

/// Returns all six axis-aligned permutations of `dims`, identity first.
///
/// # Examples
/// ```
/// use boxfit::geometry::{orientations_of, Orientation};
/// use boxfit::types::Vec3;
///
/// let all = orientations_of(Vec3::new(1.0, 2.0, 3.0));
/// assert_eq!(all.len(), 6);
/// assert_eq!(all[0], (Orientation::Xyz, Vec3::new(1.0, 2.0, 3.0)));
/// ```
pub fn orientations_of(dims: Vec3) -> [(Orientation, Vec3); 6] {
    Orientation::ALL.map(|orientation| (orientation, orientation.apply(dims)))
}

/// Orientations a strategy should try for a box.
///
/// Only the input orientation when rotation is disabled. With rotation, permutations
/// that produce an already listed dimension triple are skipped.
pub fn candidate_orientations(dims: Vec3, allow_rotation: bool) -> Vec<(Orientation, Vec3)> {
    if !allow_rotation {
        return vec![(Orientation::Xyz, dims)];
    }

    let mut candidates: Vec<(Orientation, Vec3)> = Vec::with_capacity(6);
    for (orientation, oriented) in orientations_of(dims) {
        if !candidates.iter().any(|(_, seen)| *seen == oriented) {
            candidates.push((orientation, oriented));
        }
    }
    candidates
}

/// Checks whether oriented dimensions fit into a free region.
///
/// Componentwise `dims <= space` with a tolerance relative to the space size.
#[inline]
pub fn fits(dims: Vec3, space: Vec3, epsilon: f64) -> bool {
    dims.fits_within(&space, epsilon)
}

/// Sum of the three distinct face areas, `l·w + w·h + h·l`.
#[inline]
pub fn surface_area(dims: Vec3) -> f64 {
    dims.x * dims.y + dims.y * dims.z + dims.z * dims.x
}

/// Checks whether two placed boxes overlap with positive volume.
///
/// Uses Axis-Aligned Bounding Box (AABB) collision detection. Boxes that
/// merely touch do not intersect.
pub fn intersects(a: &PlacedBox, b: &PlacedBox, epsilon: f64) -> bool {
    a.bounding_box().intersects(&b.bounding_box(), epsilon)
}

/// Length of the overlap of two intervals, at least 0.0.
///
/// ```
/// assert_eq!(boxfit::geometry::overlap_1d(0.0, 5.0, 3.0, 8.0), 2.0);
/// ```
pub fn overlap_1d(a1: f64, a2: f64, b1: f64, b2: f64) -> f64 {
    (a2.min(b2) - a1.max(b1)).max(0.0)
}
