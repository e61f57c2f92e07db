//! Common types and traits for 3D geometry.
//!
//! Axis convention used throughout the crate: `x` is the length, `y` the height
//! (vertical axis) and `z` the width of an object. Positions always refer to the
//! minimum corner.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Relative tolerance for containment comparisons.
///
/// Scaled by the magnitude of the bound being compared against, see [`tolerance`].
pub const EPSILON_GENERAL: f64 = 1e-9;

/// Absolute tolerance for matching a top face against a bottom face when stacking.
pub const EPSILON_HEIGHT: f64 = 1e-3;

/// Returns the absolute tolerance for comparisons against `bound`.
#[inline]
pub fn tolerance(bound: f64, epsilon: f64) -> f64 {
    epsilon * bound.abs().max(1.0)
}

/// Represents a 3D vector or point in space.
///
/// Used for positions, dimensions, and calculations in 3D space.
///
/// # Examples
/// ```
/// use boxfit::types::Vec3;
///
/// let position = Vec3::new(1.0, 2.0, 3.0);
/// let dimensions = Vec3::new(10.0, 20.0, 30.0);
/// let center = position + dimensions * 0.5;
/// assert_eq!(center, Vec3::new(6.0, 12.0, 18.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new 3D vector.
    ///
    /// # Parameters
    /// * `x` - X component (length)
    /// * `y` - Y component (height)
    /// * `z` - Z component (width)
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a zero vector (origin).
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Converts to tuple format.
    #[inline]
    pub const fn as_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }

    /// Creates from tuple format.
    #[inline]
    pub const fn from_tuple(tuple: (f64, f64, f64)) -> Self {
        Self::new(tuple.0, tuple.1, tuple.2)
    }

    /// Calculates the volume (product of all components).
    #[inline]
    pub fn volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// Checks if the vector fits within another vector (component-wise <=).
    ///
    /// The tolerance is relative to each component of `container`.
    ///
    /// # Parameters
    /// * `container` - The outer vector (e.g., free space dimensions)
    /// * `epsilon` - Relative numerical tolerance for the comparison
    #[inline]
    pub fn fits_within(&self, container: &Self, epsilon: f64) -> bool {
        self.x <= container.x + tolerance(container.x, epsilon)
            && self.y <= container.y + tolerance(container.y, epsilon)
            && self.z <= container.z + tolerance(container.z, epsilon)
    }

    /// Returns the midpoint between the origin and this point.
    #[inline]
    pub fn center(&self) -> Self {
        Self::new(self.x / 2.0, self.y / 2.0, self.z / 2.0)
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl From<(f64, f64, f64)> for Vec3 {
    #[inline]
    fn from(tuple: (f64, f64, f64)) -> Self {
        Self::from_tuple(tuple)
    }
}

impl From<Vec3> for (f64, f64, f64) {
    #[inline]
    fn from(vec: Vec3) -> Self {
        vec.as_tuple()
    }
}

/// Trait for objects with 3D dimensions.
pub trait Dimensional {
    /// Returns the dimensions of the object.
    fn dimensions(&self) -> Vec3;

    /// Calculates the volume.
    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }
}

/// Trait for objects with weight.
pub trait Weighted {
    /// Returns the weight in kg.
    fn weight(&self) -> f64;
}

/// Represents an Axis-Aligned Bounding Box (AABB).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner (position)
    pub min: Vec3,
    /// Maximum corner (position + dimensions)
    pub max: Vec3,
}

impl BoundingBox {
    /// Creates a new bounding box.
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates a bounding box from position and dimensions.
    #[inline]
    pub fn from_position_and_dims(position: Vec3, dims: Vec3) -> Self {
        Self::new(position, position + dims)
    }

    /// Checks if two bounding boxes intersect with a positive volume.
    ///
    /// Touching faces do not count as an intersection. Overlaps thinner than
    /// `epsilon` on any axis are ignored as well.
    #[inline]
    pub fn intersects(&self, other: &Self, epsilon: f64) -> bool {
        Self::overlap_1d(self.min.x, self.max.x, other.min.x, other.max.x) > epsilon
            && Self::overlap_1d(self.min.y, self.max.y, other.min.y, other.max.y) > epsilon
            && Self::overlap_1d(self.min.z, self.max.z, other.min.z, other.max.z) > epsilon
    }

    /// Calculates the overlap length in one dimension.
    #[inline]
    pub fn overlap_1d(a_min: f64, a_max: f64, b_min: f64, b_max: f64) -> f64 {
        (a_max.min(b_max) - a_min.max(b_min)).max(0.0)
    }

    /// Calculates the overlap area in the XZ (floor) plane.
    #[inline]
    pub fn overlap_area_xz(&self, other: &Self) -> f64 {
        let overlap_x = Self::overlap_1d(self.min.x, self.max.x, other.min.x, other.max.x);
        let overlap_z = Self::overlap_1d(self.min.z, self.max.z, other.min.z, other.max.z);
        overlap_x * overlap_z
    }
}

/// Center of mass calculation helper.
///
/// Accumulates weighted positions. Falls back to the plain mean of all points
/// when every point carries zero weight.
#[derive(Clone, Debug, Default)]
pub struct CenterOfMassCalculator {
    weighted: Vec3,
    unweighted: Vec3,
    total_weight: f64,
    count: usize,
}

impl CenterOfMassCalculator {
    /// Creates a new calculator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a weighted point.
    pub fn add_point(&mut self, point: Vec3, weight: f64) {
        self.weighted = self.weighted + point * weight;
        self.unweighted = self.unweighted + point;
        self.total_weight += weight;
        self.count += 1;
    }

    /// Total weight added so far.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Calculates the center of mass.
    ///
    /// # Returns
    /// `None` if no point was added.
    pub fn compute(&self) -> Option<Vec3> {
        if self.count == 0 {
            None
        } else if self.total_weight > 0.0 {
            Some(Self::divide(self.weighted, self.total_weight))
        } else {
            Some(Self::divide(self.unweighted, self.count as f64))
        }
    }

    fn divide(sum: Vec3, divisor: f64) -> Vec3 {
        Vec3::new(sum.x / divisor, sum.y / divisor, sum.z / divisor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_vec3_volume() {
        let dims = Vec3::new(10.0, 20.0, 30.0);
        assert!((dims.volume() - 6000.0).abs() < 1e-9);
    }

    #[test]
    fn test_vec3_fits_within() {
        let small = Vec3::new(5.0, 5.0, 5.0);
        let large = Vec3::new(10.0, 10.0, 10.0);

        assert!(small.fits_within(&large, EPSILON_GENERAL));
        assert!(!large.fits_within(&small, EPSILON_GENERAL));
    }

    #[test]
    fn test_fits_within_absorbs_rounding() {
        // 0.1 + 0.2 != 0.3 in binary floating point
        let dims = Vec3::new(0.1 + 0.2, 1.0, 1.0);
        let space = Vec3::new(0.3, 1.0, 1.0);
        assert!(dims.fits_within(&space, EPSILON_GENERAL));
        assert!(!Vec3::new(0.31, 1.0, 1.0).fits_within(&space, EPSILON_GENERAL));
    }

    #[test]
    fn test_bounding_box_intersects() {
        let a = BoundingBox::from_position_and_dims(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0));
        let b = BoundingBox::from_position_and_dims(
            Vec3::new(5.0, 5.0, 5.0),
            Vec3::new(10.0, 10.0, 10.0),
        );
        let c = BoundingBox::from_position_and_dims(
            Vec3::new(20.0, 20.0, 20.0),
            Vec3::new(10.0, 10.0, 10.0),
        );
        let touching = BoundingBox::from_position_and_dims(
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 10.0, 10.0),
        );

        assert!(a.intersects(&b, 0.0));
        assert!(!a.intersects(&c, 0.0));
        assert!(!a.intersects(&touching, 0.0));
    }

    #[test]
    fn test_bounding_box_overlap_area() {
        let a = BoundingBox::from_position_and_dims(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0));
        let b = BoundingBox::from_position_and_dims(
            Vec3::new(5.0, 0.0, 5.0),
            Vec3::new(10.0, 10.0, 10.0),
        );

        let overlap = a.overlap_area_xz(&b);
        assert!((overlap - 25.0).abs() < 1e-9); // 5x5 overlap
    }

    #[test]
    fn test_center_of_mass_calculator() {
        let mut calc = CenterOfMassCalculator::new();
        calc.add_point(Vec3::new(0.0, 0.0, 0.0), 10.0);
        calc.add_point(Vec3::new(10.0, 0.0, 4.0), 10.0);

        let center = calc.compute().unwrap();
        assert!((center.x - 5.0).abs() < 1e-9);
        assert!((center.y - 0.0).abs() < 1e-9);
        assert!((center.z - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_center_of_mass_without_weight_uses_mean() {
        let mut calc = CenterOfMassCalculator::new();
        assert!(calc.compute().is_none());

        calc.add_point(Vec3::new(2.0, 2.0, 2.0), 0.0);
        calc.add_point(Vec3::new(4.0, 6.0, 8.0), 0.0);
        assert_eq!(calc.compute(), Some(Vec3::new(3.0, 4.0, 5.0)));
    }
}
