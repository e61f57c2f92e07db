//! Best-fit placement over free spaces.
//!
//! Units are processed by descending volume. For each unit every free space and
//! every allowed orientation is scored by
//! `waste + surface_weight * surface_area`, where waste is the unused volume of
//! the space. The lowest score wins; ties keep the first candidate in
//! (space, orientation) order with spaces sorted by ascending volume.

use std::cmp::Ordering;

use crate::geometry::{Orientation, candidate_orientations, fits, surface_area};
use crate::model::{BoxUnit, Container, PlacedBox, UnplacedReason};
use crate::optimizer::{PackingConfig, PackingOptions, PackingRun, PlacementStrategy};
use crate::space::{FreeSpaceTracker, SplitPolicy};
use crate::types::{Dimensional, Vec3};

#[derive(Copy, Clone, Debug)]
struct Candidate {
    space_index: usize,
    orientation: Orientation,
    dims: Vec3,
    score: f64,
}

pub struct BestFitPacker {
    allow_rotation: bool,
    epsilon: f64,
    surface_weight: f64,
}

impl BestFitPacker {
    pub fn new(options: &PackingOptions, config: &PackingConfig) -> Self {
        Self {
            allow_rotation: options.rotation_enabled(),
            epsilon: config.general_epsilon,
            surface_weight: config.surface_weight,
        }
    }

    fn best_candidate(&self, tracker: &FreeSpaceTracker, orientations: &[(Orientation, Vec3)]) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for (space_index, space) in tracker.spaces().iter().enumerate() {
            for &(orientation, dims) in orientations {
                if !fits(dims, space.dims, self.epsilon) {
                    continue;
                }
                let waste = space.volume() - dims.volume();
                let score = waste + self.surface_weight * surface_area(dims);
                if best.is_none_or(|current| score < current.score) {
                    best = Some(Candidate {
                        space_index,
                        orientation,
                        dims,
                        score,
                    });
                }
            }
        }
        best
    }
}

/// Sorts units by descending volume, keeping input order among equal volumes.
pub(crate) fn sort_by_volume_desc(units: &mut [BoxUnit]) {
    units.sort_by(|a, b| b.volume().partial_cmp(&a.volume()).unwrap_or(Ordering::Equal));
}

impl PlacementStrategy for BestFitPacker {
    fn place(&self, container: &Container, mut units: Vec<BoxUnit>, run: &mut PackingRun<'_>) {
        sort_by_volume_desc(&mut units);
        let mut tracker = FreeSpaceTracker::new(container.dims, self.epsilon);

        for unit in units {
            tracker.sort_by_volume();
            let orientations = candidate_orientations(unit.dims, self.allow_rotation);

            match self.best_candidate(&tracker, &orientations) {
                Some(candidate) => {
                    let position = tracker.commit(candidate.space_index, candidate.dims, SplitPolicy::BestFit);
                    run.place(PlacedBox::new(unit, position, candidate.orientation));
                }
                None => {
                    let fits_empty = orientations
                        .iter()
                        .any(|&(_, dims)| fits(dims, container.dims, self.epsilon));
                    let reason = if fits_empty {
                        UnplacedReason::NoFreeSpace
                    } else {
                        UnplacedReason::DimensionsExceedContainer
                    };
                    run.reject(&unit, reason);
                }
            }
        }
    }
}
