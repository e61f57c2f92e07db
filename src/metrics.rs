//! Summary statistics of a packing result.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::{Container, PlacedBox, UnplacedBox};
use crate::optimizer::PackingConfig;
use crate::types::{CenterOfMassCalculator, Dimensional, Vec3, Weighted};

/// Utilization, weight distribution and stability of a packing result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PackingMetrics {
    /// Placed volume as a percentage of the container volume
    pub volume_utilization: f64,
    /// Placed weight as a percentage of the weight limit, 0 without a limit
    pub weight_utilization: f64,
    pub total_weight: f64,
    pub container_volume: f64,
    pub used_volume: f64,
    pub center_of_gravity: Vec3,
    /// Center of gravity lies within the tolerated floor region
    pub is_stable: bool,
    /// Approximate number of stacked levels
    pub levels: u32,
    pub placed_count: usize,
    pub unplaced_count: usize,
}

impl PackingMetrics {
    /// Computes the metrics for `placed` boxes in `container`.
    pub fn compute(
        container: &Container,
        placed: &[PlacedBox],
        unplaced: &[UnplacedBox],
        config: &PackingConfig,
    ) -> Self {
        let container_volume = container.total_volume();
        let used_volume: f64 = placed.iter().map(|p| p.volume()).sum();

        let mut com = CenterOfMassCalculator::new();
        for p in placed {
            com.add_point(p.center(), p.weight());
        }
        let total_weight = com.total_weight();
        let center_of_gravity = com.compute().unwrap_or_default();

        let volume_utilization = if container_volume > 0.0 {
            used_volume / container_volume * 100.0
        } else {
            0.0
        };
        let weight_utilization = match container.max_weight {
            Some(limit) if limit > 0.0 => total_weight / limit * 100.0,
            _ => 0.0,
        };

        Self {
            volume_utilization,
            weight_utilization,
            total_weight,
            container_volume,
            used_volume,
            center_of_gravity,
            is_stable: is_stable(container, placed, center_of_gravity, config.stability_ratio),
            levels: levels(placed),
            placed_count: placed.len(),
            unplaced_count: unplaced.iter().map(|u| u.quantity() as usize).sum(),
        }
    }

    /// Volume utilization rounded to two decimals.
    pub fn rounded_utilization(&self) -> f64 {
        (self.volume_utilization * 100.0).round() / 100.0
    }
}

fn is_stable(container: &Container, placed: &[PlacedBox], cog: Vec3, ratio: f64) -> bool {
    if placed.is_empty() {
        return true;
    }
    let (center_x, center_z) = container.center_xz();
    let tolerance = ratio * container.dims.x.min(container.dims.z);
    (cog.x - center_x).abs() <= tolerance && (cog.z - center_z).abs() <= tolerance
}

fn levels(placed: &[PlacedBox]) -> u32 {
    let max_top = placed.iter().map(|p| p.top_y()).fold(0.0_f64, f64::max);
    let min_height = placed.iter().map(|p| p.dims.y).fold(f64::INFINITY, f64::min);
    if placed.is_empty() || min_height <= 0.0 {
        return 0;
    }
    // 0.6 / 0.2 is not exactly 3.0 in floating point
    (max_top / min_height - 1e-9).ceil().max(0.0) as u32
}
