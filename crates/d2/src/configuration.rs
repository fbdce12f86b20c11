//! An ordered set of tree placements.

use crate::shape::bounding_box;
use std::ops::{Index, IndexMut};
use treepack_core::{Error, Placement, Result, AABB2D};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Ordered sequence of placements; the position in the sequence is the index
/// used by the spatial index and the move kernels.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Configuration {
    placements: Vec<Placement>,
}

impl Configuration {
    /// Wraps a list of placements.
    pub fn new(placements: Vec<Placement>) -> Self {
        Self { placements }
    }

    /// Builds a configuration from `(x, y, angle)` triples, numbering ids from 0.
    pub fn from_poses<I>(poses: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64, f64)>,
    {
        Self {
            placements: poses
                .into_iter()
                .enumerate()
                .map(|(id, (x, y, angle))| Placement::new(id, x, y, angle))
                .collect(),
        }
    }

    /// Number of placements.
    #[inline]
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    /// Returns true if there are no placements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Placement at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Placement> {
        self.placements.get(index)
    }

    /// All placements.
    #[inline]
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// All placements, mutably.
    #[inline]
    pub fn placements_mut(&mut self) -> &mut [Placement] {
        &mut self.placements
    }

    /// Iterates over placements in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Placement> {
        self.placements.iter()
    }

    /// Consumes the configuration.
    pub fn into_placements(self) -> Vec<Placement> {
        self.placements
    }

    /// Replaces every placement with `snapshot`, which must have the same length.
    pub fn restore(&mut self, snapshot: &[Placement]) {
        self.placements.copy_from_slice(snapshot);
    }

    /// Appends a placement.
    pub fn push(&mut self, placement: Placement) {
        self.placements.push(placement);
    }

    /// Bounding box of all placed polygons (empty box for no placements).
    pub fn bounds(&self) -> AABB2D {
        self.placements
            .iter()
            .fold(AABB2D::empty(), |acc, p| acc.union(&bounding_box(p)))
    }

    /// Side of the smallest axis-aligned square containing every polygon.
    pub fn side(&self) -> f64 {
        if self.placements.is_empty() {
            return 0.0;
        }
        self.bounds().side()
    }

    /// Center of the bounding box.
    pub fn center(&self) -> (f64, f64) {
        if self.placements.is_empty() {
            return (0.0, 0.0);
        }
        self.bounds().center()
    }

    /// Scales every position about `(cx, cy)`; angles are unchanged.
    pub fn scale_about(&mut self, cx: f64, cy: f64, factor: f64) {
        for p in self.placements.iter_mut() {
            p.x = cx + (p.x - cx) * factor;
            p.y = cy + (p.y - cy) * factor;
        }
    }

    /// Translates every placement by `(dx, dy)`.
    pub fn translate_all(&mut self, dx: f64, dy: f64) {
        for p in self.placements.iter_mut() {
            p.translate(dx, dy);
        }
    }

    /// Returns a copy shifted so the bounding box starts at the origin.
    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        if !self.placements.is_empty() {
            let bounds = self.bounds();
            out.translate_all(-bounds.min_x, -bounds.min_y);
        }
        out
    }

    /// Checks that the configuration can seed a run.
    pub fn validate(&self) -> Result<()> {
        if self.placements.is_empty() {
            return Err(Error::InvalidConfiguration(
                "configuration has no placements".into(),
            ));
        }
        if let Some(p) = self.placements.iter().find(|p| !p.is_finite()) {
            return Err(Error::InvalidConfiguration(format!(
                "placement {} has non-finite coordinates ({}, {}, {})",
                p.id, p.x, p.y, p.angle_deg
            )));
        }
        Ok(())
    }
}

impl Index<usize> for Configuration {
    type Output = Placement;

    #[inline]
    fn index(&self, index: usize) -> &Placement {
        &self.placements[index]
    }
}

impl IndexMut<usize> for Configuration {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Placement {
        &mut self.placements[index]
    }
}

impl From<Vec<Placement>> for Configuration {
    fn from(placements: Vec<Placement>) -> Self {
        Self::new(placements)
    }
}

impl FromIterator<Placement> for Configuration {
    fn from_iter<I: IntoIterator<Item = Placement>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Configuration {
    type Item = &'a Placement;
    type IntoIter = std::slice::Iter<'a, Placement>;

    fn into_iter(self) -> Self::IntoIter {
        self.placements.iter()
    }
}
