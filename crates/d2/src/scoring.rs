//! Packing-quality scalars and the incremental overlap engine.
//!
//! The free functions score a configuration from scratch using a temporary
//! spatial index. [`CollisionIndex`] keeps an index alive across iterations of
//! an annealing run and prices a moved group of shapes against it, which is
//! what makes per-move rescoring proportional to local density instead of `n`.

use crate::collision::overlap_area;
use crate::configuration::Configuration;
use crate::shape::bounding_box;
use crate::spatial_index::SpatialIndex2D;
use treepack_core::{Placement, AABB2D};

/// Side of the smallest axis-aligned square containing every polygon.
pub fn bounding_square_side(config: &Configuration) -> f64 {
    config.side()
}

/// Sum of pairwise overlap areas, each pair counted once.
pub fn total_overlap(config: &Configuration) -> f64 {
    CollisionIndex::new(config).total_overlap(config)
}

/// Sum of overlap areas between shape `index` and every other shape.
pub fn single_shape_overlap(config: &Configuration, index: usize) -> f64 {
    match config.get(index) {
        Some(p) => CollisionIndex::new(config).group_overlap(config, &[(index, *p)]),
        None => 0.0,
    }
}

/// `side + penalty * total_overlap`.
pub fn penalized_score(config: &Configuration, penalty: f64) -> f64 {
    bounding_square_side(config) + penalty * total_overlap(config)
}

/// Returns true if any two shapes overlap with positive area.
pub fn has_collision(config: &Configuration) -> bool {
    CollisionIndex::new(config).any_collision(config)
}

/// Returns true if shape `index` overlaps any other shape.
pub fn shape_collides(config: &Configuration, index: usize) -> bool {
    match config.get(index) {
        Some(p) => CollisionIndex::new(config).group_collides(config, &[(index, *p)]),
        None => false,
    }
}

/// Contest metric: `side² / n` (0 for an empty configuration).
pub fn packing_score(config: &Configuration) -> f64 {
    if config.is_empty() {
        return 0.0;
    }
    let side = bounding_square_side(config);
    side * side / config.len() as f64
}

/// All overlapping pairs `(i, j, area)` with `i < j`.
pub fn colliding_pairs(config: &Configuration) -> Vec<(usize, usize, f64)> {
    let index = SpatialIndex2D::from_configuration(config);
    let mut pairs = Vec::new();
    for (i, p) in config.iter().enumerate() {
        let mut candidates = index.query(&bounding_box(p));
        candidates.sort_unstable();
        for j in candidates.into_iter().filter(|&j| j > i) {
            let area = overlap_area(p, &config[j]);
            if area > 0.0 {
                pairs.push((i, j, area));
            }
        }
    }
    pairs
}

/// Spatial index kept in sync with a driver's configuration.
///
/// Non-members of a priced group are read from the configuration at the
/// positions stored in the index, so the index must reflect every placement
/// outside the group. Members may be priced at any placement.
#[derive(Debug, Clone)]
pub struct CollisionIndex {
    index: SpatialIndex2D,
}

impl CollisionIndex {
    /// Builds an index over every placement.
    pub fn new(config: &Configuration) -> Self {
        Self {
            index: SpatialIndex2D::from_configuration(config),
        }
    }

    /// Rebuilds the index after a global move.
    pub fn rebuild(&mut self, config: &Configuration) {
        self.index = SpatialIndex2D::from_configuration(config);
    }

    /// Syncs the boxes of `indices` with their current placements.
    pub fn commit(&mut self, config: &Configuration, indices: &[usize]) {
        for &i in indices {
            self.index.update(i, bounding_box(&config[i]));
        }
    }

    /// Underlying spatial index.
    pub fn spatial(&self) -> &SpatialIndex2D {
        &self.index
    }

    /// Overlap involving at least one group member, each pair counted once.
    ///
    /// Members are taken at the placements given in `group`; everybody else at
    /// their placement in `config`.
    pub fn group_overlap(&self, config: &Configuration, group: &[(usize, Placement)]) -> f64 {
        let mut total = 0.0;
        for (k, (i, p)) in group.iter().enumerate() {
            for j in self.index.query(&bounding_box(p)) {
                if j == *i || is_member(group, j) {
                    continue;
                }
                total += overlap_area(p, &config[j]);
            }
            for (_, q) in &group[k + 1..] {
                total += overlap_area(p, q);
            }
        }
        total
    }

    /// Returns true if any group member overlaps anything.
    pub fn group_collides(&self, config: &Configuration, group: &[(usize, Placement)]) -> bool {
        for (k, (i, p)) in group.iter().enumerate() {
            let hit = self
                .index
                .query(&bounding_box(p))
                .into_iter()
                .filter(|&j| j != *i && !is_member(group, j))
                .any(|j| overlap_area(p, &config[j]) > 0.0);
            if hit {
                return true;
            }
            if group[k + 1..].iter().any(|(_, q)| overlap_area(p, q) > 0.0) {
                return true;
            }
        }
        false
    }

    /// Bounding-square side if the group members sat at the given placements.
    pub fn side_with(&self, group: &[(usize, Placement)]) -> f64 {
        let mut bounds = AABB2D::empty();
        for (i, aabb) in self.index.boxes() {
            if !is_member(group, i) {
                bounds = bounds.union(&aabb);
            }
        }
        for (_, p) in group {
            bounds = bounds.union(&bounding_box(p));
        }
        if bounds.is_empty() {
            0.0
        } else {
            bounds.side()
        }
    }

    /// Bounding-square side of the indexed configuration.
    pub fn side(&self) -> f64 {
        self.index.bounds().map_or(0.0, |b| b.side())
    }

    /// Sum of all pairwise overlaps of the indexed configuration.
    pub fn total_overlap(&self, config: &Configuration) -> f64 {
        let mut total = 0.0;
        for (i, p) in config.iter().enumerate() {
            for j in self.index.query(&bounding_box(p)) {
                if j > i {
                    total += overlap_area(p, &config[j]);
                }
            }
        }
        total
    }

    /// Returns true if any pair of shapes overlaps.
    pub fn any_collision(&self, config: &Configuration) -> bool {
        config.iter().enumerate().any(|(i, p)| {
            self.index
                .query(&bounding_box(p))
                .into_iter()
                .any(|j| j > i && overlap_area(p, &config[j]) > 0.0)
        })
    }
}

#[inline]
fn is_member(group: &[(usize, Placement)], index: usize) -> bool {
    group.iter().any(|(i, _)| *i == index)
}
