//! Free-space bookkeeping for a single packing run.
//!
//! The tracker owns the list of empty axis-aligned regions of the container.
//! Placing a box consumes one space and replaces it with its residual fragments.
//! Spaces may overlap each other, but no space ever overlaps a placed box: when a
//! box is committed, every other space it cuts into is carved around it. Carved
//! pieces already covered by another space are dropped, which keeps the list from
//! growing with every overlap.

use std::cmp::Ordering;

use crate::types::{BoundingBox, Vec3, tolerance};

/// An empty axis-aligned region of the container.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FreeSpace {
    /// Minimum corner.
    pub position: Vec3,
    /// Extent along x (length), y (height), z (width).
    pub dims: Vec3,
}

impl FreeSpace {
    pub const fn new(position: Vec3, dims: Vec3) -> Self {
        Self { position, dims }
    }

    pub fn volume(&self) -> f64 {
        self.dims.volume()
    }

    /// Maximum corner.
    pub fn end(&self) -> Vec3 {
        self.position + self.dims
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_position_and_dims(self.position, self.dims)
    }

    /// Whether `other` lies entirely inside this space.
    pub fn contains(&self, other: &FreeSpace, epsilon: f64) -> bool {
        let (end, other_end) = (self.end(), other.end());
        self.position.x - epsilon <= other.position.x
            && self.position.y - epsilon <= other.position.y
            && self.position.z - epsilon <= other.position.z
            && other_end.x <= end.x + epsilon
            && other_end.y <= end.y + epsilon
            && other_end.z <= end.z + epsilon
    }

    fn is_degenerate(&self, min_extent: f64) -> bool {
        self.dims.x <= min_extent || self.dims.y <= min_extent || self.dims.z <= min_extent
    }

    /// Maximal sub-regions of this space lying outside `obstacle`.
    ///
    /// Up to six pieces (below/above the obstacle on each axis); they overlap each
    /// other where the obstacle does not reach a corner.
    fn carve(&self, obstacle: &BoundingBox, min_extent: f64) -> Vec<FreeSpace> {
        let start = self.position;
        let end = self.end();
        let mut pieces = Vec::with_capacity(6);

        if obstacle.min.x > start.x {
            pieces.push(FreeSpace::new(
                start,
                Vec3::new(obstacle.min.x - start.x, self.dims.y, self.dims.z),
            ));
        }
        if obstacle.max.x < end.x {
            pieces.push(FreeSpace::new(
                Vec3::new(obstacle.max.x, start.y, start.z),
                Vec3::new(end.x - obstacle.max.x, self.dims.y, self.dims.z),
            ));
        }
        if obstacle.min.y > start.y {
            pieces.push(FreeSpace::new(
                start,
                Vec3::new(self.dims.x, obstacle.min.y - start.y, self.dims.z),
            ));
        }
        if obstacle.max.y < end.y {
            pieces.push(FreeSpace::new(
                Vec3::new(start.x, obstacle.max.y, start.z),
                Vec3::new(self.dims.x, end.y - obstacle.max.y, self.dims.z),
            ));
        }
        if obstacle.min.z > start.z {
            pieces.push(FreeSpace::new(
                start,
                Vec3::new(self.dims.x, self.dims.y, obstacle.min.z - start.z),
            ));
        }
        if obstacle.max.z < end.z {
            pieces.push(FreeSpace::new(
                Vec3::new(start.x, start.y, obstacle.max.z),
                Vec3::new(self.dims.x, self.dims.y, end.z - obstacle.max.z),
            ));
        }

        pieces.retain(|piece| !piece.is_degenerate(min_extent));
        pieces
    }
}

/// How the consumed space is split after a placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitPolicy {
    /// Three orthogonal cuts plus three corner cuts.
    BestFit,
    /// Above (up to the ceiling), right and behind the box.
    Constrained,
}

/// Active free spaces of one packing run.
#[derive(Clone, Debug)]
pub struct FreeSpaceTracker {
    container_dims: Vec3,
    spaces: Vec<FreeSpace>,
    /// Boxes committed so far
    occupied: Vec<BoundingBox>,
    min_extent: f64,
}

impl FreeSpaceTracker {
    /// Starts with a single space covering the whole container.
    pub fn new(container_dims: Vec3, epsilon: f64) -> Self {
        let largest = container_dims.x.max(container_dims.y).max(container_dims.z);
        Self {
            container_dims,
            spaces: vec![FreeSpace::new(Vec3::zero(), container_dims)],
            occupied: Vec::new(),
            min_extent: tolerance(largest, epsilon),
        }
    }

    pub fn spaces(&self) -> &[FreeSpace] {
        &self.spaces
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    /// Sorts spaces by ascending volume, tightest first. Stable.
    pub fn sort_by_volume(&mut self) {
        self.spaces.sort_by(|a, b| {
            a.volume()
                .partial_cmp(&b.volume())
                .unwrap_or(Ordering::Equal)
        });
    }

    /// Sorts spaces bottom-left-back first: ascending y, then z, then x. Stable.
    pub fn sort_by_position(&mut self) {
        self.spaces.sort_by(|a, b| {
            let (pa, pb) = (a.position, b.position);
            pa.y.partial_cmp(&pb.y)
                .unwrap_or(Ordering::Equal)
                .then_with(|| pa.z.partial_cmp(&pb.z).unwrap_or(Ordering::Equal))
                .then_with(|| pa.x.partial_cmp(&pb.x).unwrap_or(Ordering::Equal))
        });
    }

    /// Residual fragments of `used` after placing a box of `dims` at its origin.
    ///
    /// A fragment is produced for every axis the box does not fill (right, above,
    /// behind) plus the three corner regions between them.
    pub fn split_best_fit(&self, used: &FreeSpace, dims: Vec3) -> Vec<FreeSpace> {
        let Vec3 { x, y, z } = used.position;
        let dx = used.dims.x - dims.x;
        let dy = used.dims.y - dims.y;
        let dz = used.dims.z - dims.z;
        let (has_x, has_y, has_z) = (
            dx > self.min_extent,
            dy > self.min_extent,
            dz > self.min_extent,
        );

        let mut fragments = Vec::with_capacity(6);
        if has_x {
            fragments.push(FreeSpace::new(
                Vec3::new(x + dims.x, y, z),
                Vec3::new(dx, used.dims.y, used.dims.z),
            ));
        }
        if has_y {
            fragments.push(FreeSpace::new(
                Vec3::new(x, y + dims.y, z),
                Vec3::new(used.dims.x, dy, used.dims.z),
            ));
        }
        if has_z {
            fragments.push(FreeSpace::new(
                Vec3::new(x, y, z + dims.z),
                Vec3::new(used.dims.x, used.dims.y, dz),
            ));
        }
        if has_x && has_y {
            fragments.push(FreeSpace::new(
                Vec3::new(x + dims.x, y + dims.y, z),
                Vec3::new(dx, dy, dims.z),
            ));
        }
        if has_x && has_z {
            fragments.push(FreeSpace::new(
                Vec3::new(x + dims.x, y, z + dims.z),
                Vec3::new(dx, dims.y, dz),
            ));
        }
        if has_y && has_z {
            fragments.push(FreeSpace::new(
                Vec3::new(x, y + dims.y, z + dims.z),
                Vec3::new(dims.x, dy, dz),
            ));
        }
        fragments
    }

    /// Residual fragments for the constrained strategy.
    ///
    /// The space above the box reaches the container ceiling. The space to the
    /// right takes the full depth of the used space, the space behind keeps the
    /// box's length, so together they cover the used floor around the box.
    pub fn split_constrained(&self, used: &FreeSpace, position: Vec3, dims: Vec3) -> Vec<FreeSpace> {
        let box_end = position + dims;
        let used_end = used.end();
        let mut fragments = Vec::with_capacity(3);

        if self.container_dims.y - box_end.y > self.min_extent {
            fragments.push(FreeSpace::new(
                Vec3::new(position.x, box_end.y, position.z),
                Vec3::new(dims.x, self.container_dims.y - box_end.y, dims.z),
            ));
        }
        if used_end.x - box_end.x > self.min_extent {
            fragments.push(FreeSpace::new(
                Vec3::new(box_end.x, position.y, used.position.z),
                Vec3::new(used_end.x - box_end.x, used.dims.y, used.dims.z),
            ));
        }
        if used_end.z - box_end.z > self.min_extent {
            fragments.push(FreeSpace::new(
                Vec3::new(position.x, position.y, box_end.z),
                Vec3::new(dims.x, used.dims.y, used_end.z - box_end.z),
            ));
        }
        fragments
    }

    /// Commits a box placed at the origin of space `index`.
    ///
    /// The consumed space is removed, every other space intersecting the box is
    /// carved around it, and the consumed space's fragments, clipped against all
    /// earlier boxes, are appended. Carved pieces lying inside another space are
    /// dropped; the split fragments themselves are always kept.
    /// Returns the box position.
    pub fn commit(&mut self, index: usize, dims: Vec3, policy: SplitPolicy) -> Vec3 {
        let used = self.spaces.remove(index);
        let position = used.position;
        let fragments = match policy {
            SplitPolicy::BestFit => self.split_best_fit(&used, dims),
            SplitPolicy::Constrained => self.split_constrained(&used, position, dims),
        };

        let obstacle = BoundingBox::from_position_and_dims(position, dims);
        let previous = std::mem::take(&mut self.spaces);
        let mut carved = Vec::new();
        let mut cut = 0usize;
        for space in previous {
            if space.bounding_box().intersects(&obstacle, self.min_extent) {
                cut += 1;
                carved.extend(space.carve(&obstacle, self.min_extent));
            } else {
                self.spaces.push(space);
            }
        }

        // Fragments reaching past the used space (the constrained "above" cut)
        // must not cover boxes committed earlier.
        let mut fragments = fragments;
        for placed in &self.occupied {
            fragments = fragments
                .into_iter()
                .flat_map(|fragment| {
                    if fragment.bounding_box().intersects(placed, self.min_extent) {
                        fragment.carve(placed, self.min_extent)
                    } else {
                        vec![fragment]
                    }
                })
                .collect();
        }

        let pieces = carved.len();
        let carved = self.drop_covered(carved, &fragments);
        if cut > 0 {
            log::trace!(
                "carved {} free spaces around box at {:?}: kept {} of {} pieces",
                cut,
                position,
                carved.len(),
                pieces
            );
        }

        self.occupied.push(obstacle);
        self.spaces.extend(carved);
        self.spaces.extend(fragments);
        position
    }

    /// Keeps the carved pieces not contained in an untouched space, a new
    /// fragment, or another piece. Of two identical pieces the first survives.
    fn drop_covered(&self, carved: Vec<FreeSpace>, fragments: &[FreeSpace]) -> Vec<FreeSpace> {
        let eps = self.min_extent;
        let mut kept: Vec<FreeSpace> = Vec::with_capacity(carved.len());
        for (i, piece) in carved.iter().enumerate() {
            let covered = self
                .spaces
                .iter()
                .chain(fragments)
                .chain(&kept)
                .any(|space| space.contains(piece, eps))
                || carved[i + 1..]
                    .iter()
                    .any(|later| later.contains(piece, eps) && !piece.contains(later, eps));
            if !covered {
                kept.push(*piece);
            }
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EPSILON_GENERAL;

    fn tracker(dims: (f64, f64, f64)) -> FreeSpaceTracker {
        FreeSpaceTracker::new(Vec3::from_tuple(dims), EPSILON_GENERAL)
    }

    #[test]
    fn starts_with_whole_container() {
        let t = tracker((10.0, 20.0, 30.0));
        assert_eq!(t.len(), 1);
        assert_eq!(t.spaces()[0].position, Vec3::zero());
        assert_eq!(t.spaces()[0].dims, Vec3::new(10.0, 20.0, 30.0));
    }

    #[test]
    fn best_fit_split_produces_six_fragments() {
        let t = tracker((100.0, 100.0, 100.0));
        let used = t.spaces()[0];
        let fragments = t.split_best_fit(&used, Vec3::new(60.0, 50.0, 40.0));

        assert_eq!(fragments.len(), 6);
        assert_eq!(fragments[0], FreeSpace::new(Vec3::new(60.0, 0.0, 0.0), Vec3::new(40.0, 100.0, 100.0)));
        assert_eq!(fragments[1], FreeSpace::new(Vec3::new(0.0, 50.0, 0.0), Vec3::new(100.0, 50.0, 100.0)));
        assert_eq!(fragments[2], FreeSpace::new(Vec3::new(0.0, 0.0, 40.0), Vec3::new(100.0, 100.0, 60.0)));
        assert_eq!(fragments[3], FreeSpace::new(Vec3::new(60.0, 50.0, 0.0), Vec3::new(40.0, 50.0, 40.0)));
        assert_eq!(fragments[4], FreeSpace::new(Vec3::new(60.0, 0.0, 40.0), Vec3::new(40.0, 50.0, 60.0)));
        assert_eq!(fragments[5], FreeSpace::new(Vec3::new(0.0, 50.0, 40.0), Vec3::new(60.0, 50.0, 60.0)));
    }

    #[test]
    fn best_fit_split_skips_filled_axes() {
        let t = tracker((100.0, 100.0, 100.0));
        let used = t.spaces()[0];
        let fragments = t.split_best_fit(&used, Vec3::new(100.0, 40.0, 100.0));

        assert_eq!(
            fragments,
            vec![FreeSpace::new(Vec3::new(0.0, 40.0, 0.0), Vec3::new(100.0, 60.0, 100.0))]
        );
        assert!(t.split_best_fit(&used, Vec3::new(100.0, 100.0, 100.0)).is_empty());
    }

    #[test]
    fn constrained_split_produces_above_right_behind() {
        let t = tracker((100.0, 80.0, 60.0));
        let used = t.spaces()[0];
        let fragments = t.split_constrained(&used, Vec3::zero(), Vec3::new(30.0, 20.0, 10.0));

        assert_eq!(
            fragments,
            vec![
                FreeSpace::new(Vec3::new(0.0, 20.0, 0.0), Vec3::new(30.0, 60.0, 10.0)),
                FreeSpace::new(Vec3::new(30.0, 0.0, 0.0), Vec3::new(70.0, 80.0, 60.0)),
                FreeSpace::new(Vec3::new(0.0, 0.0, 10.0), Vec3::new(30.0, 80.0, 50.0)),
            ]
        );
    }

    #[test]
    fn commit_carves_overlapping_spaces() {
        let mut t = tracker((100.0, 100.0, 100.0));
        t.commit(0, Vec3::new(60.0, 60.0, 60.0), SplitPolicy::BestFit);
        assert_eq!(t.len(), 6);

        // The right slab overlaps the space above the first box.
        let index = t
            .spaces()
            .iter()
            .position(|s| s.position == Vec3::new(0.0, 60.0, 0.0))
            .unwrap();
        let placed_at = t.commit(index, Vec3::new(100.0, 40.0, 40.0), SplitPolicy::BestFit);
        assert_eq!(placed_at, Vec3::new(0.0, 60.0, 0.0));

        let placed = BoundingBox::from_position_and_dims(placed_at, Vec3::new(100.0, 40.0, 40.0));
        let first = BoundingBox::from_position_and_dims(Vec3::zero(), Vec3::new(60.0, 60.0, 60.0));
        for space in t.spaces() {
            assert!(!space.bounding_box().intersects(&placed, 0.0), "{space:?} overlaps new box");
            assert!(!space.bounding_box().intersects(&first, 0.0), "{space:?} overlaps first box");
        }
    }

    #[test]
    fn contains_checks_all_axes() {
        let outer = FreeSpace::new(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0));
        let inner = FreeSpace::new(Vec3::new(2.0, 0.0, 3.0), Vec3::new(8.0, 5.0, 7.0));
        let poking_out = FreeSpace::new(Vec3::new(2.0, 0.0, 3.0), Vec3::new(8.0, 5.0, 8.0));

        assert!(outer.contains(&inner, EPSILON_GENERAL));
        assert!(outer.contains(&outer, EPSILON_GENERAL));
        assert!(!inner.contains(&outer, EPSILON_GENERAL));
        assert!(!outer.contains(&poking_out, EPSILON_GENERAL));
    }

    #[test]
    fn covered_carved_pieces_are_dropped() {
        let mut t = tracker((100.0, 100.0, 100.0));
        t.commit(0, Vec3::new(60.0, 60.0, 60.0), SplitPolicy::BestFit);
        let index = t
            .spaces()
            .iter()
            .position(|s| s.position == Vec3::new(0.0, 60.0, 0.0))
            .unwrap();
        t.commit(index, Vec3::new(100.0, 40.0, 40.0), SplitPolicy::BestFit);

        // The corner above the first box is cut down to a piece inside the
        // slab behind it.
        assert_eq!(t.len(), 6);
        assert!(t.spaces().iter().all(|s| s.position != Vec3::new(60.0, 60.0, 40.0)));
        assert!(t.spaces().contains(&FreeSpace::new(
            Vec3::new(60.0, 0.0, 40.0),
            Vec3::new(40.0, 100.0, 60.0)
        )));
    }

    #[test]
    fn space_count_stays_bounded_for_hundreds_of_boxes() {
        let mut t = tracker((120.0, 100.0, 80.0));
        let dims = [
            Vec3::new(12.0, 7.0, 9.0),
            Vec3::new(5.0, 11.0, 6.0),
            Vec3::new(8.0, 4.0, 13.0),
        ];
        let mut placed = Vec::new();

        for unit in 0..180 {
            let box_dims = dims[unit % dims.len()];
            t.sort_by_volume();
            let index = t
                .spaces()
                .iter()
                .position(|s| crate::geometry::fits(box_dims, s.dims, EPSILON_GENERAL))
                .expect("every unit fits in this container");
            let position = t.commit(index, box_dims, SplitPolicy::BestFit);
            placed.push(BoundingBox::from_position_and_dims(position, box_dims));
            assert!(t.len() <= 500, "{} spaces after {} boxes", t.len(), unit + 1);
        }

        for space in t.spaces() {
            for placed in &placed {
                assert!(!space.bounding_box().intersects(placed, 0.0), "{space:?} overlaps {placed:?}");
            }
        }
    }

    #[test]
    fn sorts_by_volume_and_position() {
        let mut t = tracker((100.0, 100.0, 100.0));
        t.commit(0, Vec3::new(50.0, 50.0, 50.0), SplitPolicy::Constrained);

        t.sort_by_volume();
        let volumes: Vec<f64> = t.spaces().iter().map(FreeSpace::volume).collect();
        assert!(volumes.windows(2).all(|w| w[0] <= w[1]));

        t.sort_by_position();
        let first = t.spaces()[0].position;
        assert_eq!(first.y, 0.0);
        assert_eq!(first.z, 0.0);
        assert_eq!(t.spaces().last().unwrap().position.y, 50.0);
    }
}
