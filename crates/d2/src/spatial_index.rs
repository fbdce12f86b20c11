//! Spatial indexing for 2D collision detection using R*-tree.
//!
//! This module provides the broad phase for the overlap engine: an R*-tree
//! over the bounding boxes of placed trees, keyed by configuration index, that
//! quickly identifies potentially overlapping neighbours.

use crate::configuration::Configuration;
use crate::shape::bounding_box;
use rstar::{RTree, RTreeObject, AABB};
use treepack_core::AABB2D;

/// An entry in the 2D spatial index representing a placed tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialEntry2D {
    /// Index of the placement in its configuration
    pub index: usize,
    /// Axis-aligned bounding box (min_x, min_y, max_x, max_y)
    pub aabb: [f64; 4],
}

impl SpatialEntry2D {
    /// Creates a new spatial entry.
    pub fn new(index: usize, aabb: [f64; 4]) -> Self {
        Self { index, aabb }
    }

    fn from_box(index: usize, aabb: &AABB2D) -> Self {
        Self::new(index, aabb.to_array())
    }
}

impl RTreeObject for SpatialEntry2D {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.aabb[0], self.aabb[1]], [self.aabb[2], self.aabb[3]])
    }
}

/// 2D spatial index using R*-tree for efficient collision queries.
///
/// Each configuration index appears at most once; inserting an index that is
/// already present replaces its box.
#[derive(Debug, Clone)]
pub struct SpatialIndex2D {
    tree: RTree<SpatialEntry2D>,
    boxes: Vec<Option<AABB2D>>,
    len: usize,
}

impl SpatialIndex2D {
    /// Creates a new empty spatial index.
    pub fn new() -> Self {
        Self {
            tree: RTree::new(),
            boxes: Vec::new(),
            len: 0,
        }
    }

    /// Creates a spatial index from `(index, box)` pairs using bulk loading.
    ///
    /// Later duplicates of an index win.
    pub fn bulk_load<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (usize, AABB2D)>,
    {
        let mut boxes: Vec<Option<AABB2D>> = Vec::new();
        for (index, aabb) in entries {
            if index >= boxes.len() {
                boxes.resize(index + 1, None);
            }
            boxes[index] = Some(aabb);
        }
        let tree_entries: Vec<SpatialEntry2D> = boxes
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|aabb| SpatialEntry2D::from_box(i, aabb)))
            .collect();
        let len = tree_entries.len();
        Self {
            tree: RTree::bulk_load(tree_entries),
            boxes,
            len,
        }
    }

    /// Indexes every placement of a configuration by its position.
    pub fn from_configuration(config: &Configuration) -> Self {
        Self::bulk_load(
            config
                .iter()
                .enumerate()
                .map(|(i, p)| (i, bounding_box(p))),
        )
    }

    /// Inserts a box for `index`, replacing any previous box.
    pub fn insert(&mut self, index: usize, aabb: AABB2D) {
        self.remove(index);
        if index >= self.boxes.len() {
            self.boxes.resize(index + 1, None);
        }
        self.boxes[index] = Some(aabb);
        self.tree.insert(SpatialEntry2D::from_box(index, &aabb));
        self.len += 1;
    }

    /// Removes the entry for `index`. Returns false if it was not present.
    pub fn remove(&mut self, index: usize) -> bool {
        let Some(aabb) = self.boxes.get_mut(index).and_then(Option::take) else {
            return false;
        };
        self.tree.remove(&SpatialEntry2D::from_box(index, &aabb));
        self.len -= 1;
        true
    }

    /// Replaces the box of `index`.
    pub fn update(&mut self, index: usize, aabb: AABB2D) {
        if self.get(index) == Some(aabb) {
            return;
        }
        self.insert(index, aabb);
    }

    /// Current box of `index`, if indexed.
    #[inline]
    pub fn get(&self, index: usize) -> Option<AABB2D> {
        self.boxes.get(index).copied().flatten()
    }

    /// Returns the number of entries in the index.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clears all entries from the index.
    pub fn clear(&mut self) {
        self.tree = RTree::new();
        self.boxes.clear();
        self.len = 0;
    }

    /// Indices of all entries whose boxes intersect (or touch) `aabb`.
    ///
    /// This is the primary broad-phase collision detection method.
    pub fn query(&self, aabb: &AABB2D) -> Vec<usize> {
        self.query_aabb([aabb.min_x, aabb.min_y], [aabb.max_x, aabb.max_y])
            .into_iter()
            .map(|entry| entry.index)
            .collect()
    }

    /// Finds all entries whose bounding boxes intersect with the given corners.
    pub fn query_aabb(&self, min: [f64; 2], max: [f64; 2]) -> Vec<&SpatialEntry2D> {
        let envelope = AABB::from_corners(min, max);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .collect()
    }

    /// Union of all indexed boxes, or `None` if the index is empty.
    pub fn bounds(&self) -> Option<AABB2D> {
        if self.is_empty() {
            return None;
        }
        let envelope = self.tree.root().envelope();
        let (lower, upper) = (envelope.lower(), envelope.upper());
        Some(AABB2D::new(lower[0], lower[1], upper[0], upper[1]))
    }

    /// Iterates over `(index, box)` pairs in index order.
    pub fn boxes(&self) -> impl Iterator<Item = (usize, AABB2D)> + '_ {
        self.boxes
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.map(|aabb| (i, aabb)))
    }

    /// Returns an iterator over all entries in the index.
    pub fn iter(&self) -> impl Iterator<Item = &SpatialEntry2D> {
        self.tree.iter()
    }
}

impl Default for SpatialIndex2D {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treepack_core::Placement;

    fn unit(x: f64, y: f64) -> AABB2D {
        AABB2D::new(x, y, x + 10.0, y + 10.0)
    }

    #[test]
    fn test_spatial_index_new() {
        let index = SpatialIndex2D::new();
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert!(index.bounds().is_none());
    }

    #[test]
    fn test_spatial_index_insert() {
        let mut index = SpatialIndex2D::new();
        index.insert(0, unit(0.0, 0.0));

        assert!(!index.is_empty());
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(0), Some(unit(0.0, 0.0)));
        assert_eq!(index.get(1), None);
    }

    #[test]
    fn test_spatial_index_query() {
        let mut index = SpatialIndex2D::new();

        // Insert three non-overlapping rectangles
        index.insert(0, unit(0.0, 0.0));
        index.insert(1, unit(20.0, 0.0));
        index.insert(2, unit(0.0, 20.0));

        // Query overlapping with r1 only
        let results = index.query(&AABB2D::new(5.0, 5.0, 15.0, 15.0));
        assert_eq!(results, vec![0]);

        // Query overlapping with r1 and r2
        let mut results = index.query(&AABB2D::new(5.0, 0.0, 25.0, 10.0));
        results.sort_unstable();
        assert_eq!(results, vec![0, 1]);

        // Query overlapping with nothing
        assert!(index.query(&AABB2D::new(50.0, 50.0, 60.0, 60.0)).is_empty());

        // Query overlapping with all
        assert_eq!(index.query(&AABB2D::new(-10.0, -10.0, 40.0, 40.0)).len(), 3);
    }

    #[test]
    fn test_query_includes_touching() {
        let mut index = SpatialIndex2D::new();
        index.insert(0, unit(0.0, 0.0));
        assert_eq!(index.query(&unit(10.0, 0.0)), vec![0]);
    }

    #[test]
    fn test_remove_and_update() {
        let mut index = SpatialIndex2D::new();
        index.insert(0, unit(0.0, 0.0));
        index.insert(1, unit(20.0, 0.0));

        assert!(index.remove(0));
        assert!(!index.remove(0));
        assert!(!index.remove(7));
        assert_eq!(index.len(), 1);
        assert!(index.query(&unit(0.0, 0.0)).is_empty());

        index.update(1, unit(0.0, 0.0));
        assert_eq!(index.len(), 1);
        assert_eq!(index.query(&unit(0.0, 0.0)), vec![1]);
        assert!(index.query(&AABB2D::new(25.0, 5.0, 26.0, 6.0)).is_empty());
    }

    #[test]
    fn test_insert_replaces_existing() {
        let mut index = SpatialIndex2D::new();
        index.insert(3, unit(0.0, 0.0));
        index.insert(3, unit(100.0, 0.0));
        assert_eq!(index.len(), 1);
        assert_eq!(index.iter().count(), 1);
        assert_eq!(index.get(3), Some(unit(100.0, 0.0)));
        assert_eq!(index.boxes().collect::<Vec<_>>(), vec![(3, unit(100.0, 0.0))]);
    }

    #[test]
    fn test_bulk_load() {
        let index = SpatialIndex2D::bulk_load(vec![
            (0, unit(0.0, 0.0)),
            (1, unit(20.0, 0.0)),
            (2, unit(40.0, 0.0)),
        ]);
        assert_eq!(index.len(), 3);
        let bounds = index.bounds().unwrap();
        assert_eq!(bounds, AABB2D::new(0.0, 0.0, 50.0, 10.0));
    }

    #[test]
    fn test_from_configuration() {
        let cfg = Configuration::new(vec![
            Placement::at(0, 0.0, 0.0),
            Placement::at(1, 5.0, 0.0),
        ]);
        let index = SpatialIndex2D::from_configuration(&cfg);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(1), Some(bounding_box(&cfg[1])));

        let near_first = bounding_box(&Placement::at(9, 0.5, 0.0));
        assert_eq!(index.query(&near_first), vec![0]);
    }

    #[test]
    fn test_clear() {
        let mut index = SpatialIndex2D::bulk_load(vec![(0, unit(0.0, 0.0))]);
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.get(0), None);
    }
}
