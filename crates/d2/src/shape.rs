//! Tree shape template and its placed (oriented) polygons.
//!
//! The template is a 15-vertex simple concave polygon: a three-tier tree with a
//! trunk, listed counter-clockwise starting at the tip. Rotation happens about
//! the template origin, which sits at the center of the trunk top.

use geo::{Area, Coord, LineString, Polygon as GeoPolygon};
use treepack_core::{Placement, AABB2D};

/// Number of template vertices.
pub const TEMPLATE_VERTICES: usize = 15;

/// Tree template, counter-clockwise, as an open ring.
pub const TREE_TEMPLATE: [(f64, f64); TEMPLATE_VERTICES] = [
    // Tip
    (0.0, 0.8),
    // Left side, top tier
    (-0.125, 0.5),
    (-0.0625, 0.5),
    // Left side, middle tier
    (-0.2, 0.25),
    (-0.1, 0.25),
    // Left side, bottom tier
    (-0.35, 0.0),
    (-0.075, 0.0),
    // Trunk
    (-0.075, -0.2),
    (0.075, -0.2),
    // Right side, bottom tier
    (0.075, 0.0),
    (0.35, 0.0),
    // Right side, middle tier
    (0.1, 0.25),
    (0.2, 0.25),
    // Right side, top tier
    (0.0625, 0.5),
    (0.125, 0.5),
];

/// Returns the template vertices rotated by the placement angle about the
/// origin and translated to the placement position.
pub fn oriented_polygon(placement: &Placement) -> Vec<(f64, f64)> {
    let (sin_a, cos_a) = rotation(placement);
    TREE_TEMPLATE
        .iter()
        .map(|&(x, y)| {
            (
                x * cos_a - y * sin_a + placement.x,
                x * sin_a + y * cos_a + placement.y,
            )
        })
        .collect()
}

/// Exact axis-aligned bounding box of the placed polygon.
pub fn bounding_box(placement: &Placement) -> AABB2D {
    let (sin_a, cos_a) = rotation(placement);
    let mut aabb = AABB2D::empty();
    for &(x, y) in TREE_TEMPLATE.iter() {
        aabb.expand_to(
            x * cos_a - y * sin_a + placement.x,
            x * sin_a + y * cos_a + placement.y,
        );
    }
    aabb
}

/// Sine and cosine of the placement angle, exact for quarter turns.
fn rotation(placement: &Placement) -> (f64, f64) {
    let a = placement.angle_deg;
    if a == 0.0 {
        (0.0, 1.0)
    } else if a == 90.0 {
        (1.0, 0.0)
    } else if a == 180.0 {
        (0.0, -1.0)
    } else if a == 270.0 {
        (-1.0, 0.0)
    } else {
        placement.angle_rad().sin_cos()
    }
}

/// Signed shoelace area of a closed ring given as an open vertex list.
/// Positive for counter-clockwise rings.
pub fn ring_area(ring: &[(f64, f64)]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += ring[i].0 * ring[j].1;
        area -= ring[j].0 * ring[i].1;
    }
    area / 2.0
}

/// Area of the tree template.
pub fn template_area() -> f64 {
    template_polygon().unsigned_area()
}

/// Largest distance from the rotation origin to a template vertex.
///
/// Two trees whose origins are further apart than twice this value cannot
/// intersect.
pub fn bounding_radius() -> f64 {
    TREE_TEMPLATE
        .iter()
        .map(|&(x, y)| x.hypot(y))
        .fold(0.0, f64::max)
}

/// Converts the placed polygon into a `geo` polygon.
pub fn to_geo_polygon(placement: &Placement) -> GeoPolygon<f64> {
    ring_to_geo(&oriented_polygon(placement))
}

fn template_polygon() -> GeoPolygon<f64> {
    ring_to_geo(&TREE_TEMPLATE)
}

fn ring_to_geo(ring: &[(f64, f64)]) -> GeoPolygon<f64> {
    let exterior = LineString::from(
        ring.iter()
            .map(|&(x, y)| Coord { x, y })
            .collect::<Vec<_>>(),
    );
    GeoPolygon::new(exterior, vec![])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_area() {
        assert!((template_area() - 0.245625).abs() < 1e-12);
        // Counter-clockwise ring has positive signed area
        assert!((ring_area(&TREE_TEMPLATE) - 0.245625).abs() < 1e-12);
    }

    #[test]
    fn test_template_extents() {
        let aabb = bounding_box(&Placement::at(0, 0.0, 0.0));
        assert!((aabb.min_x + 0.35).abs() < 1e-12);
        assert!((aabb.max_x - 0.35).abs() < 1e-12);
        assert!((aabb.min_y + 0.2).abs() < 1e-12);
        assert!((aabb.max_y - 0.8).abs() < 1e-12);
        assert!((bounding_radius() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_oriented_polygon_translation() {
        let poly = oriented_polygon(&Placement::at(0, 2.0, -1.0));
        assert_eq!(poly.len(), TEMPLATE_VERTICES);
        assert!((poly[0].0 - 2.0).abs() < 1e-12);
        assert!((poly[0].1 + 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_oriented_polygon_rotation() {
        // 90 degrees CCW maps the tip (0, 0.8) to (-0.8, 0)
        let poly = oriented_polygon(&Placement::new(0, 0.0, 0.0, 90.0));
        assert!((poly[0].0 + 0.8).abs() < 1e-12);
        assert!(poly[0].1.abs() < 1e-12);

        // 180 degrees flips the tree upside down
        let aabb = bounding_box(&Placement::new(0, 0.0, 0.0, 180.0));
        assert!((aabb.min_y + 0.8).abs() < 1e-12);
        assert!((aabb.max_y - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_quarter_turns_exact() {
        // Inverted tip lands exactly on the base tier corner of an upright tree
        let poly = oriented_polygon(&Placement::new(0, 0.35, 0.8, 180.0));
        assert_eq!(poly[0], (0.35, 0.0));
        let poly = oriented_polygon(&Placement::new(0, 0.0, 0.0, 270.0));
        assert_eq!(poly[0], (0.8, 0.0));
    }

    #[test]
    fn test_rotation_preserves_area() {
        for angle in [0.0, 17.0, 45.0, 133.0, 270.0] {
            let poly = oriented_polygon(&Placement::new(0, 1.5, 3.0, angle));
            assert!((ring_area(&poly) - 0.245625).abs() < 1e-12);
        }
    }

    #[test]
    fn test_bounding_box_contains_vertices() {
        for angle in [0.0, 45.0, 90.0, 180.0, 270.0] {
            let p = Placement::new(0, 0.3, -0.7, angle);
            let aabb = bounding_box(&p);
            for (x, y) in oriented_polygon(&p) {
                assert!(aabb.contains_point(x, y));
            }
        }
    }

    #[test]
    fn test_to_geo_polygon() {
        let poly = to_geo_polygon(&Placement::at(0, 5.0, 5.0));
        assert!((poly.unsigned_area() - 0.245625).abs() < 1e-12);
    }
}
