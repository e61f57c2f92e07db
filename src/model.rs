//! Data models for the box packing engine.
//!
//! This module defines the fundamental data structures for 3D packing:
//! - `BoxSpec`: A box type to be packed, with quantity, weight and handling flags
//! - `BoxUnit`: One expanded instance of a `BoxSpec`
//! - `PlacedBox`: A unit with its position and orientation in the container
//! - `UnplacedBox`: Units of a spec that could not be placed, with the reason
//! - `Container`: The packing container with optional weight limits

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::geometry::Orientation;
use crate::types::{BoundingBox, Dimensional, Vec3, Weighted};

/// Structurally invalid input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
}

fn validate_dimension(value: f64, name: &str) -> Result<(), ConfigurationError> {
    if value <= 0.0 || !value.is_finite() {
        return Err(ConfigurationError::InvalidDimension(format!(
            "{} must be positive and finite, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_dims(dims: Vec3, prefix: &str) -> Result<(), ConfigurationError> {
    validate_dimension(dims.x, &format!("{prefix}length"))?;
    validate_dimension(dims.y, &format!("{prefix}height"))?;
    validate_dimension(dims.z, &format!("{prefix}width"))?;
    Ok(())
}

fn validate_positive_weight(value: f64, name: &str) -> Result<(), ConfigurationError> {
    if value <= 0.0 || !value.is_finite() {
        return Err(ConfigurationError::InvalidWeight(format!(
            "{} must be positive and finite, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn default_quantity() -> u32 {
    1
}

fn default_stackable() -> bool {
    true
}

/// Handling flags of a box type.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BoxFlags {
    /// Fragile boxes only rest on supports weighing at least half as much.
    #[serde(default)]
    pub fragile: bool,
    /// Whether other boxes may rest on top of this one.
    #[serde(default = "default_stackable")]
    pub stackable: bool,
}

impl Default for BoxFlags {
    fn default() -> Self {
        Self {
            fragile: false,
            stackable: true,
        }
    }
}

/// A box type to be packed.
///
/// Dimensions are given as `x` = length, `y` = height, `z` = width.
/// Unset optional fields use these defaults: quantity 1, weight 0, not fragile,
/// stackable, no stacking weight limit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "A",
    "dims": { "x": 40.0, "y": 30.0, "z": 20.0 },
    "quantity": 4,
    "weight": 5.0,
    "flags": { "fragile": false, "stackable": true }
}))]
pub struct BoxSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub dims: Vec3,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub flags: BoxFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_stack_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl BoxSpec {
    /// Creates a spec with default weight and flags.
    ///
    /// # Examples
    /// ```
    /// use boxfit::model::BoxSpec;
    ///
    /// let spec = BoxSpec::new((20.0, 10.0, 30.0), 3).with_weight(2.5);
    /// assert_eq!(spec.quantity, 3);
    /// assert!(spec.validate().is_ok());
    ///
    /// assert!(BoxSpec::new((-1.0, 10.0, 30.0), 1).validate().is_err());
    /// ```
    pub fn new(dims: impl Into<Vec3>, quantity: u32) -> Self {
        Self {
            id: None,
            name: None,
            dims: dims.into(),
            quantity,
            color: None,
            weight: None,
            flags: BoxFlags::default(),
            max_stack_weight: None,
            priority: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_flags(mut self, fragile: bool, stackable: bool) -> Self {
        self.flags = BoxFlags { fragile, stackable };
        self
    }

    pub fn with_max_stack_weight(mut self, weight: f64) -> Self {
        self.max_stack_weight = Some(weight);
        self
    }

    /// Weight of a single unit, 0 when unset.
    pub fn unit_weight(&self) -> f64 {
        self.weight.unwrap_or(0.0)
    }

    /// Checks dimensions, quantity and weights.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_dims(self.dims, "Box ")?;
        if self.quantity == 0 {
            return Err(ConfigurationError::InvalidQuantity(
                "Box quantity must be at least 1".to_string(),
            ));
        }
        if let Some(weight) = self.weight {
            validate_positive_weight(weight, "Box weight")?;
        }
        if let Some(limit) = self.max_stack_weight {
            if limit < 0.0 || !limit.is_finite() {
                return Err(ConfigurationError::InvalidWeight(format!(
                    "Maximum stack weight must be non-negative and finite, got: {}",
                    limit
                )));
            }
        }
        Ok(())
    }

    /// Expands the spec into `quantity` independent units.
    pub fn units(&self, spec_index: usize, color: Option<String>) -> Vec<BoxUnit> {
        (0..self.quantity as usize)
            .map(|instance| BoxUnit {
                spec_index,
                instance,
                id: self.id.clone(),
                name: self.name.clone(),
                dims: self.dims,
                weight: self.unit_weight(),
                fragile: self.flags.fragile,
                stackable: self.flags.stackable,
                max_stack_weight: self.max_stack_weight,
                color: color.clone(),
            })
            .collect()
    }
}

impl Dimensional for BoxSpec {
    fn dimensions(&self) -> Vec3 {
        self.dims
    }
}

/// A single instance of a box spec, ready for placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BoxUnit {
    /// Index of the originating spec in the input list.
    pub spec_index: usize,
    /// Zero-based instance number within the spec.
    pub instance: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Dimensions as specified, before any rotation.
    pub dims: Vec3,
    pub weight: f64,
    pub fragile: bool,
    pub stackable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_stack_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Dimensional for BoxUnit {
    fn dimensions(&self) -> Vec3 {
        self.dims
    }
}

impl Weighted for BoxUnit {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// A unit placed in the container.
///
/// `position` is the minimum corner, `dims` the oriented dimensions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlacedBox {
    #[serde(flatten)]
    pub unit: BoxUnit,
    pub position: Vec3,
    #[serde(rename = "placed_dims")]
    pub dims: Vec3,
    pub orientation: Orientation,
}

impl PlacedBox {
    pub fn new(unit: BoxUnit, position: Vec3, orientation: Orientation) -> Self {
        let dims = orientation.apply(unit.dims);
        Self {
            unit,
            position,
            dims,
            orientation,
        }
    }

    /// Returns the top Y coordinate of the placed box.
    pub fn top_y(&self) -> f64 {
        self.position.y + self.dims.y
    }

    /// Returns the geometric center.
    pub fn center(&self) -> Vec3 {
        self.position + self.dims.center()
    }

    /// Calculates the bounding box of the placed box.
    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_position_and_dims(self.position, self.dims)
    }

    /// Whether the box was rotated away from its input orientation.
    pub fn is_rotated(&self) -> bool {
        self.orientation != Orientation::Xyz
    }
}

impl Dimensional for PlacedBox {
    fn dimensions(&self) -> Vec3 {
        self.dims
    }
}

impl Weighted for PlacedBox {
    fn weight(&self) -> f64 {
        self.unit.weight
    }
}

/// Reasons why a unit could not be placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnplacedReason {
    InvalidBox,
    InvalidContainer,
    DimensionsExceedContainer,
    NoFreeSpace,
    WeightLimitExceeded,
    NoStableSupport,
}

impl UnplacedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplacedReason::InvalidBox => "invalid_box",
            UnplacedReason::InvalidContainer => "invalid_container",
            UnplacedReason::DimensionsExceedContainer => "dimensions_exceed_container",
            UnplacedReason::NoFreeSpace => "no_free_space",
            UnplacedReason::WeightLimitExceeded => "weight_limit_exceeded",
            UnplacedReason::NoStableSupport => "no_stable_support",
        }
    }
}

impl std::fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnplacedReason::InvalidBox => {
                write!(f, "Box has invalid dimensions, weight or quantity")
            }
            UnplacedReason::InvalidContainer => {
                write!(f, "Container dimensions are invalid")
            }
            UnplacedReason::DimensionsExceedContainer => {
                write!(f, "Box does not fit into the container in any allowed orientation")
            }
            UnplacedReason::NoFreeSpace => {
                write!(f, "No free space left that can hold the box")
            }
            UnplacedReason::WeightLimitExceeded => {
                write!(f, "Box would exceed the container's weight limit")
            }
            UnplacedReason::NoStableSupport => {
                write!(f, "No position with admissible support found")
            }
        }
    }
}

/// Units of one box spec that could not be placed.
///
/// `spec.quantity` holds the number of unplaced units for this reason. A spec
/// rejected with `InvalidBox` for a zero quantity keeps its entry with
/// quantity 0, so every input spec that was not packed shows up here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UnplacedBox {
    pub spec_index: usize,
    pub spec: BoxSpec,
    pub reason: UnplacedReason,
}

impl UnplacedBox {
    pub fn quantity(&self) -> u32 {
        self.spec.quantity
    }
}

/// The packing container.
///
/// A missing `max_weight` means the load is not weight constrained.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Container {
    pub dims: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_weight_per_level: Option<f64>,
}

impl Container {
    /// Creates a new container with validation.
    ///
    /// # Examples
    /// ```
    /// use boxfit::model::Container;
    ///
    /// assert!(Container::new((100.0, 100.0, 100.0), Some(500.0)).is_ok());
    /// assert!(Container::new((100.0, 0.0, 100.0), None).is_err());
    /// ```
    pub fn new(dims: impl Into<Vec3>, max_weight: Option<f64>) -> Result<Self, ConfigurationError> {
        let container = Self {
            dims: dims.into(),
            max_weight,
            max_weight_per_level: None,
        };
        container.validate()?;
        Ok(container)
    }

    /// Creates a container without a weight limit and without validation.
    pub fn unchecked(dims: impl Into<Vec3>) -> Self {
        Self {
            dims: dims.into(),
            max_weight: None,
            max_weight_per_level: None,
        }
    }

    pub fn with_max_weight_per_level(mut self, limit: f64) -> Self {
        self.max_weight_per_level = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_dims(self.dims, "Container ")?;
        if let Some(limit) = self.max_weight {
            validate_positive_weight(limit, "Container max weight")?;
        }
        if let Some(limit) = self.max_weight_per_level {
            validate_positive_weight(limit, "Container max weight per level")?;
        }
        Ok(())
    }

    /// Calculates the total volume of the container.
    pub fn total_volume(&self) -> f64 {
        self.dims.volume()
    }

    /// Calculates the geometric center of the floor (XZ plane).
    #[inline]
    pub fn center_xz(&self) -> (f64, f64) {
        (self.dims.x / 2.0, self.dims.z / 2.0)
    }
}

impl Dimensional for Container {
    fn dimensions(&self) -> Vec3 {
        self.dims
    }
}
