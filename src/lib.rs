//! Interactive 3D box packing.
//!
//! Places cuboid boxes into a cuboid container with one of three strategies
//! (layer fill, best fit, constrained first fit) and reports placements, boxes
//! that did not fit and summary metrics. The [`api`] module serves the same
//! functionality over HTTP.

pub mod api;
pub mod best_fit;
pub mod config;
pub mod constrained;
pub mod geometry;
pub mod layer;
pub mod metrics;
pub mod model;
pub mod optimizer;
pub mod space;
pub mod types;

pub use metrics::PackingMetrics;
pub use model::{BoxFlags, BoxSpec, Container, PlacedBox, UnplacedBox, UnplacedReason};
pub use optimizer::{
    Algorithm, ColorAssigner, PackEvent, Packer, PackingConfig, PackingOptions, PackingResult, Palette, pack,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::intersects;

    const ALGORITHMS: [Algorithm; 3] = [Algorithm::Layer, Algorithm::BestFit, Algorithm::Constrained];

    fn mixed_boxes() -> Vec<BoxSpec> {
        vec![
            BoxSpec::new((40.0, 30.0, 20.0), 6).with_weight(5.0),
            BoxSpec::new((25.0, 25.0, 25.0), 5).with_weight(8.0),
            BoxSpec::new((60.0, 10.0, 30.0), 3).with_weight(3.0),
            BoxSpec::new((15.0, 45.0, 15.0), 4).with_weight(2.0),
            BoxSpec::new((130.0, 5.0, 5.0), 1),
            BoxSpec::new((10.0, 0.0, 10.0), 2),
        ]
    }

    fn container() -> Container {
        Container::new((100.0, 80.0, 60.0), Some(150.0)).unwrap()
    }

    fn all_options() -> Vec<PackingOptions> {
        let mut options = Vec::new();
        for algorithm in ALGORITHMS {
            options.push(PackingOptions::new(algorithm));
            options.push(PackingOptions::new(algorithm).with_rotation(false));
        }
        options.push(
            PackingOptions::new(Algorithm::Constrained)
                .with_stackability(true)
                .with_fragility(true),
        );
        options
    }

    #[test]
    fn every_unit_is_accounted_for() {
        let boxes = mixed_boxes();
        let expected: usize = boxes.iter().map(|b| b.quantity as usize).sum();

        for options in all_options() {
            let result = pack(&container(), &boxes, &options);
            assert_eq!(
                result.placed_count() + result.unplaced_count(),
                expected,
                "{:?}",
                options
            );
            assert!(
                result
                    .unplaced_boxes
                    .iter()
                    .any(|u| u.spec_index == 5 && u.reason == UnplacedReason::InvalidBox)
            );
            assert!(
                result
                    .unplaced_boxes
                    .iter()
                    .any(|u| u.spec_index == 4 && u.reason == UnplacedReason::DimensionsExceedContainer)
            );
        }
    }

    #[test]
    fn placed_boxes_stay_inside_and_apart() {
        let container = container();
        let eps = PackingConfig::default().general_epsilon;

        for options in all_options() {
            let result = pack(&container, &mixed_boxes(), &options);
            assert!(result.placed_count() > 0, "{:?}", options);

            for placed in &result.placed_boxes {
                let end = placed.position + placed.dims;
                assert!(placed.position.x >= 0.0 && placed.position.y >= 0.0 && placed.position.z >= 0.0);
                assert!(end.fits_within(&container.dims, eps), "{:?} leaves the container", placed);
            }
            for (i, a) in result.placed_boxes.iter().enumerate() {
                for b in &result.placed_boxes[i + 1..] {
                    assert!(!intersects(a, b, eps), "{:?}: {:?} overlaps {:?}", options, a, b);
                }
            }
        }
    }

    #[test]
    fn rotation_preserves_dimensions() {
        for options in all_options() {
            let result = pack(&container(), &mixed_boxes(), &options);
            for placed in &result.placed_boxes {
                let mut original = [placed.unit.dims.x, placed.unit.dims.y, placed.unit.dims.z];
                let mut oriented = [placed.dims.x, placed.dims.y, placed.dims.z];
                original.sort_by(f64::total_cmp);
                oriented.sort_by(f64::total_cmp);
                assert_eq!(original, oriented);
                if !options.rotation_enabled() {
                    assert!(!placed.is_rotated());
                }
            }
        }
    }

    #[test]
    fn packing_is_deterministic() {
        for options in all_options() {
            let first = pack(&container(), &mixed_boxes(), &options);
            let second = pack(&container(), &mixed_boxes(), &options);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn constrained_respects_weight_limit() {
        let container = Container::new((100.0, 80.0, 60.0), Some(40.0)).unwrap();
        let result = pack(&container, &mixed_boxes(), &PackingOptions::new(Algorithm::Constrained));
        assert!(result.metrics.total_weight <= 40.0);
        assert!(
            result
                .unplaced_boxes
                .iter()
                .any(|u| u.reason == UnplacedReason::WeightLimitExceeded)
        );
    }

    #[test]
    fn constrained_stacks_rest_on_boxes() {
        let options = PackingOptions::new(Algorithm::Constrained).with_stackability(true);
        let result = pack(&container(), &mixed_boxes(), &options);
        let support_eps = PackingConfig::default().support_epsilon;

        for placed in result.placed_boxes.iter().filter(|p| p.position.y > support_eps) {
            let footprint = placed.bounding_box();
            let supported = result.placed_boxes.iter().any(|below| {
                (below.top_y() - placed.position.y).abs() < support_eps
                    && below.bounding_box().overlap_area_xz(&footprint) > 0.0
            });
            assert!(supported, "{:?} floats", placed);
        }
    }

    #[test]
    fn larger_container_never_places_fewer() {
        let cubes = vec![BoxSpec::new((10.0, 10.0, 10.0), 30)];
        for algorithm in ALGORITHMS {
            let small = pack(
                &Container::new((20.0, 20.0, 20.0), None).unwrap(),
                &cubes,
                &PackingOptions::new(algorithm),
            );
            assert_eq!(small.placed_count(), 8, "{}", algorithm);
        }

        let growing = [
            (50.0, 40.0, 30.0),
            (75.0, 60.0, 45.0),
            (100.0, 80.0, 60.0),
            (125.0, 100.0, 75.0),
            (150.0, 120.0, 90.0),
            (200.0, 160.0, 120.0),
        ];
        for options in all_options() {
            let counts: Vec<usize> = growing
                .iter()
                .map(|&dims| pack(&Container::new(dims, None).unwrap(), &mixed_boxes(), &options).placed_count())
                .collect();
            assert!(counts.windows(2).all(|w| w[0] <= w[1]), "{:?}: {:?}", options, counts);
            assert!(counts[0] < counts[counts.len() - 1], "{:?}: {:?}", options, counts);
        }
    }

    #[test]
    fn metrics_follow_placements() {
        for options in all_options() {
            let result = pack(&container(), &mixed_boxes(), &options);
            let used: f64 = result.placed_boxes.iter().map(|p| p.dims.volume()).sum();
            assert!((result.metrics.used_volume - used).abs() < 1e-6);
            assert!(result.metrics.volume_utilization <= 100.0 + 1e-9);
            assert_eq!(result.metrics.placed_count, result.placed_count());
            assert_eq!(result.metrics.unplaced_count, result.unplaced_count());
        }
    }
}
