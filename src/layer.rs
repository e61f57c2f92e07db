//! Row/column/layer placement.
//!
//! Units are placed in input order along x. A row wraps forward in z by the
//! deepest box of the row, a layer wraps up in y by the tallest box of the layer.
//! The first placed box therefore seeds the layer height. Units keep their input
//! orientation.

use crate::geometry::{Orientation, fits};
use crate::model::{BoxUnit, Container, PlacedBox, UnplacedReason};
use crate::optimizer::{PackingConfig, PackingOptions, PackingRun, PlacementStrategy};
use crate::types::{Vec3, tolerance};

/// Fill cursor of the layer strategy.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
struct Cursor {
    x: f64,
    y: f64,
    z: f64,
    /// Deepest box (z extent) in the current row
    row_depth: f64,
    /// Tallest box (y extent) in the current layer
    layer_height: f64,
}

impl Cursor {
    /// Computes the position for `dims` and the cursor after placing it.
    ///
    /// Returns `None` when the box would reach past the container ceiling. The
    /// receiver stays untouched so a failed unit does not move the cursor.
    fn advance(self, dims: Vec3, bounds: Vec3, epsilon: f64) -> Option<(Vec3, Cursor)> {
        let mut next = self;

        if next.x + dims.x > bounds.x + tolerance(bounds.x, epsilon) {
            next.x = 0.0;
            next.z += next.row_depth;
            next.row_depth = 0.0;
        }

        if next.z + dims.z > bounds.z + tolerance(bounds.z, epsilon) {
            next.x = 0.0;
            next.z = 0.0;
            next.row_depth = 0.0;
            next.y += next.layer_height;
            next.layer_height = 0.0;
        }

        if next.y + dims.y > bounds.y + tolerance(bounds.y, epsilon) {
            return None;
        }

        let position = Vec3::new(next.x, next.y, next.z);
        next.x += dims.x;
        next.row_depth = next.row_depth.max(dims.z);
        next.layer_height = next.layer_height.max(dims.y);
        Some((position, next))
    }
}

pub struct LayerPacker {
    stop_on_overflow: bool,
    epsilon: f64,
}

impl LayerPacker {
    pub fn new(options: &PackingOptions, config: &PackingConfig) -> Self {
        Self {
            stop_on_overflow: options.stop_on_overflow,
            epsilon: config.general_epsilon,
        }
    }
}

impl PlacementStrategy for LayerPacker {
    fn place(&self, container: &Container, units: Vec<BoxUnit>, run: &mut PackingRun<'_>) {
        let bounds = container.dims;
        let mut cursor = Cursor::default();
        let mut halted = false;

        for unit in units {
            if halted {
                run.reject(&unit, UnplacedReason::NoFreeSpace);
                continue;
            }
            if !fits(unit.dims, bounds, self.epsilon) {
                run.reject(&unit, UnplacedReason::DimensionsExceedContainer);
                continue;
            }

            match cursor.advance(unit.dims, bounds, self.epsilon) {
                Some((position, next)) => {
                    cursor = next;
                    run.place(PlacedBox::new(unit, position, Orientation::Xyz));
                }
                None => {
                    if self.stop_on_overflow {
                        log::debug!("layer fill reached the ceiling, stopping");
                        halted = true;
                    }
                    run.reject(&unit, UnplacedReason::NoFreeSpace);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{BoxSpec, Container, UnplacedReason};
    use crate::optimizer::{Algorithm, PackingOptions, pack};
    use crate::types::Vec3;

    fn layer() -> PackingOptions {
        PackingOptions::new(Algorithm::Layer)
    }

    fn positions(result: &crate::optimizer::PackingResult) -> Vec<(f64, f64, f64)> {
        result
            .placed_boxes
            .iter()
            .map(|placed| placed.position.as_tuple())
            .collect()
    }

    #[test]
    fn fills_a_row_along_x() {
        let container = Container::new((100.0, 100.0, 100.0), None).unwrap();
        let result = pack(&container, &[BoxSpec::new((20.0, 20.0, 20.0), 3)], &layer());

        assert_eq!(
            positions(&result),
            vec![(0.0, 0.0, 0.0), (20.0, 0.0, 0.0), (40.0, 0.0, 0.0)]
        );
        assert!(result.is_complete());
    }

    #[test]
    fn oversized_box_is_reported() {
        let container = Container::new((10.0, 10.0, 10.0), None).unwrap();
        let result = pack(&container, &[BoxSpec::new((20.0, 20.0, 20.0), 1)], &layer());

        assert!(result.placed_boxes.is_empty());
        assert_eq!(result.unplaced_boxes.len(), 1);
        assert_eq!(
            result.unplaced_boxes[0].reason,
            UnplacedReason::DimensionsExceedContainer
        );
    }

    #[test]
    fn wraps_rows_and_layers() {
        let container = Container::new((20.0, 20.0, 20.0), None).unwrap();
        let result = pack(&container, &[BoxSpec::new((10.0, 10.0, 10.0), 8)], &layer());

        assert_eq!(
            positions(&result),
            vec![
                (0.0, 0.0, 0.0),
                (10.0, 0.0, 0.0),
                (0.0, 0.0, 10.0),
                (10.0, 0.0, 10.0),
                (0.0, 10.0, 0.0),
                (10.0, 10.0, 0.0),
                (0.0, 10.0, 10.0),
                (10.0, 10.0, 10.0),
            ]
        );
    }

    #[test]
    fn rows_advance_by_deepest_box() {
        let container = Container::new((30.0, 10.0, 30.0), None).unwrap();
        let boxes = vec![
            BoxSpec::new((10.0, 5.0, 20.0), 1),
            BoxSpec::new((10.0, 10.0, 5.0), 1),
            BoxSpec::new((20.0, 5.0, 5.0), 1),
        ];
        let result = pack(&container, &boxes, &layer());

        assert_eq!(
            positions(&result),
            vec![(0.0, 0.0, 0.0), (10.0, 0.0, 0.0), (0.0, 0.0, 20.0)]
        );
    }

    #[test]
    fn continues_after_overflow_by_default() {
        let container = Container::new((10.0, 10.0, 10.0), None).unwrap();
        let boxes = vec![
            BoxSpec::new((10.0, 6.0, 10.0), 1),
            BoxSpec::new((10.0, 6.0, 10.0), 1),
            BoxSpec::new((10.0, 4.0, 10.0), 1),
        ];
        let result = pack(&container, &boxes, &layer());

        assert_eq!(result.placed_count(), 2);
        assert_eq!(result.placed_boxes[1].position, Vec3::new(0.0, 6.0, 0.0));
        assert_eq!(result.unplaced_boxes.len(), 1);
        assert_eq!(result.unplaced_boxes[0].spec_index, 1);
    }

    #[test]
    fn stop_on_overflow_halts() {
        let container = Container::new((10.0, 10.0, 10.0), None).unwrap();
        let boxes = vec![
            BoxSpec::new((10.0, 6.0, 10.0), 1),
            BoxSpec::new((10.0, 6.0, 10.0), 1),
            BoxSpec::new((10.0, 4.0, 10.0), 1),
        ];
        let result = pack(&container, &boxes, &layer().with_stop_on_overflow(true));

        assert_eq!(result.placed_count(), 1);
        assert_eq!(result.unplaced_count(), 2);
        assert!(
            result
                .unplaced_boxes
                .iter()
                .all(|entry| entry.reason == UnplacedReason::NoFreeSpace)
        );
    }

    #[test]
    fn ignores_rotation_request() {
        let container = Container::new((10.0, 30.0, 30.0), None).unwrap();
        let result = pack(
            &container,
            &[BoxSpec::new((30.0, 10.0, 10.0), 1)],
            &layer().with_rotation(true),
        );

        assert!(result.placed_boxes.is_empty());
        assert_eq!(
            result.unplaced_boxes[0].reason,
            UnplacedReason::DimensionsExceedContainer
        );
    }
}
