//! First-fit decreasing placement with physical constraints.
//!
//! Units are processed by descending volume. Free spaces are kept sorted by
//! position (lowest first, then front to back, then left to right) and the first
//! space and orientation that passes all checks is taken:
//!
//! 1. the oriented box fits into the space,
//! 2. the container weight limit is kept, if there is one,
//! 3. the box is supported, if stackability or fragility is respected.
//!
//! A box on the floor is always supported. Above the floor at least one box
//! must end at the candidate's bottom and overlap its footprint. With
//! stackability respected every such box must be stackable and accept the
//! candidate's weight. A fragile candidate rejects supports lighter than half
//! its own weight.

use crate::best_fit::sort_by_volume_desc;
use crate::geometry::{Orientation, candidate_orientations, fits, overlap_1d};
use crate::model::{BoxUnit, Container, PlacedBox, UnplacedReason};
use crate::optimizer::{PackingConfig, PackingOptions, PackingRun, PlacementStrategy};
use crate::space::{FreeSpaceTracker, SplitPolicy};
use crate::types::{Vec3, tolerance};

/// Minimum share of the candidate's weight a support must carry under a fragile box.
const FRAGILE_SUPPORT_RATIO: f64 = 0.5;

/// How far a unit got through the admissibility checks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    NoSpace,
    Fits,
    WithinWeight,
}

pub struct ConstrainedPacker {
    allow_rotation: bool,
    respect_stackability: bool,
    respect_fragility: bool,
    epsilon: f64,
    support_epsilon: f64,
}

impl ConstrainedPacker {
    pub fn new(options: &PackingOptions, config: &PackingConfig) -> Self {
        Self {
            allow_rotation: options.rotation_enabled(),
            respect_stackability: options.respect_stackability,
            respect_fragility: options.respect_fragility,
            epsilon: config.general_epsilon,
            support_epsilon: config.support_epsilon,
        }
    }

    fn checks_support(&self) -> bool {
        self.respect_stackability || self.respect_fragility
    }

    /// Whether a box with `dims` at `position` rests on admissible supports.
    fn is_supported(&self, unit: &BoxUnit, position: Vec3, dims: Vec3, placed: &[PlacedBox]) -> bool {
        if position.y <= self.support_epsilon {
            return true;
        }

        let mut supported = false;
        for below in placed {
            if (below.top_y() - position.y).abs() >= self.support_epsilon {
                continue;
            }
            let overlap_x = overlap_1d(
                position.x,
                position.x + dims.x,
                below.position.x,
                below.position.x + below.dims.x,
            );
            let overlap_z = overlap_1d(
                position.z,
                position.z + dims.z,
                below.position.z,
                below.position.z + below.dims.z,
            );
            if overlap_x <= self.support_epsilon || overlap_z <= self.support_epsilon {
                continue;
            }

            if self.respect_stackability {
                if !below.unit.stackable {
                    return false;
                }
                if below.unit.max_stack_weight.is_some_and(|limit| limit < unit.weight) {
                    return false;
                }
            }
            if unit.fragile && below.unit.weight < unit.weight * FRAGILE_SUPPORT_RATIO {
                return false;
            }
            supported = true;
        }
        supported
    }
}

impl PlacementStrategy for ConstrainedPacker {
    fn place(&self, container: &Container, mut units: Vec<BoxUnit>, run: &mut PackingRun<'_>) {
        sort_by_volume_desc(&mut units);
        let mut tracker = FreeSpaceTracker::new(container.dims, self.epsilon);

        for unit in units {
            let orientations = candidate_orientations(unit.dims, self.allow_rotation);
            let mut stage = Stage::NoSpace;
            let mut chosen: Option<(usize, Orientation, Vec3)> = None;

            'spaces: for (space_index, space) in tracker.spaces().iter().enumerate() {
                for &(orientation, dims) in &orientations {
                    if !fits(dims, space.dims, self.epsilon) {
                        continue;
                    }
                    stage = stage.max(Stage::Fits);

                    if let Some(limit) = container.max_weight {
                        if run.total_weight() + unit.weight > limit + tolerance(limit, self.epsilon) {
                            continue;
                        }
                    }
                    stage = stage.max(Stage::WithinWeight);

                    if self.checks_support() && !self.is_supported(&unit, space.position, dims, run.placed()) {
                        continue;
                    }
                    chosen = Some((space_index, orientation, dims));
                    break 'spaces;
                }
            }

            match chosen {
                Some((space_index, orientation, dims)) => {
                    let position = tracker.commit(space_index, dims, SplitPolicy::Constrained);
                    tracker.sort_by_position();
                    run.place(PlacedBox::new(unit, position, orientation));
                }
                None => {
                    let reason = match stage {
                        Stage::NoSpace => {
                            let fits_empty = orientations
                                .iter()
                                .any(|&(_, dims)| fits(dims, container.dims, self.epsilon));
                            if fits_empty {
                                UnplacedReason::NoFreeSpace
                            } else {
                                UnplacedReason::DimensionsExceedContainer
                            }
                        }
                        Stage::Fits => UnplacedReason::WeightLimitExceeded,
                        Stage::WithinWeight => UnplacedReason::NoStableSupport,
                    };
                    run.reject(&unit, reason);
                }
            }
        }
    }
}
