//! Placement of a single shape instance.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Position and rotation of one shape instance.
///
/// Angles are kept in degrees in the canonical range `[0, 360)`; every
/// operation that changes an angle goes through [`normalize_angle`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Placement {
    /// Identifier of the shape instance (stable across moves and swaps).
    pub id: usize,
    /// X coordinate of the shape origin.
    pub x: f64,
    /// Y coordinate of the shape origin.
    pub y: f64,
    /// Rotation in degrees, counter-clockwise positive, in `[0, 360)`.
    pub angle_deg: f64,
}

impl Placement {
    /// Creates a placement, normalizing the angle.
    pub fn new(id: usize, x: f64, y: f64, angle_deg: f64) -> Self {
        Self {
            id,
            x,
            y,
            angle_deg: normalize_angle(angle_deg),
        }
    }

    /// Creates an unrotated placement at the given position.
    pub fn at(id: usize, x: f64, y: f64) -> Self {
        Self::new(id, x, y, 0.0)
    }

    /// Returns the rotation in radians.
    #[inline]
    pub fn angle_rad(&self) -> f64 {
        self.angle_deg.to_radians()
    }

    /// Translates the placement by `(dx, dy)`.
    #[inline]
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Rotates the placement by `delta_deg`, keeping the angle canonical.
    #[inline]
    pub fn rotate(&mut self, delta_deg: f64) {
        self.angle_deg = normalize_angle(self.angle_deg + delta_deg);
    }

    /// Exchanges position and angle with `other`; ids stay where they are.
    pub fn swap_pose(&mut self, other: &mut Placement) {
        std::mem::swap(&mut self.x, &mut other.x);
        std::mem::swap(&mut self.y, &mut other.y);
        std::mem::swap(&mut self.angle_deg, &mut other.angle_deg);
    }

    /// Returns true if all components are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.angle_deg.is_finite()
    }
}

/// Maps any angle in degrees into `[0, 360)`.
///
/// Non-finite input is returned unchanged.
#[inline]
pub fn normalize_angle(angle_deg: f64) -> f64 {
    if !angle_deg.is_finite() {
        return angle_deg;
    }
    let a = angle_deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if a >= 360.0 {
        0.0
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_angle() {
        assert_eq!(normalize_angle(0.0), 0.0);
        assert_eq!(normalize_angle(360.0), 0.0);
        assert!((normalize_angle(-90.0) - 270.0).abs() < 1e-12);
        assert!((normalize_angle(725.0) - 5.0).abs() < 1e-12);
        assert!(normalize_angle(-1e-18) < 360.0);
        assert!(normalize_angle(-1e-18) >= 0.0);
    }

    #[test]
    fn test_placement_rotate_wraps() {
        let mut p = Placement::new(1, 0.0, 0.0, 350.0);
        p.rotate(20.0);
        assert!((p.angle_deg - 10.0).abs() < 1e-12);
        p.rotate(-30.0);
        assert!((p.angle_deg - 340.0).abs() < 1e-12);
    }

    #[test]
    fn test_swap_pose_keeps_ids() {
        let mut a = Placement::new(1, 1.0, 2.0, 30.0);
        let mut b = Placement::new(2, -1.0, 5.0, 90.0);
        a.swap_pose(&mut b);

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!((a.x, a.y, a.angle_deg), (-1.0, 5.0, 90.0));
        assert_eq!((b.x, b.y, b.angle_deg), (1.0, 2.0, 30.0));
    }

    #[test]
    fn test_is_finite() {
        assert!(Placement::at(0, 1.0, 1.0).is_finite());
        let p = Placement {
            id: 0,
            x: f64::NAN,
            y: 0.0,
            angle_deg: 0.0,
        };
        assert!(!p.is_finite());
    }
}
