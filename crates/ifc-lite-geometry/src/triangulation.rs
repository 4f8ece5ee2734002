// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon triangulation utilities
//!
//! Convex polygons are fanned directly; everything else goes through earcutr.

use crate::{Error, Point2, Point3, Result, Vector3};

/// Check if a polygon is convex (all turns have the same sign)
fn is_convex(points: &[Point2<f64>]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }

    let mut sign = 0.0f64;
    for i in 0..n {
        let p0 = points[i];
        let p1 = points[(i + 1) % n];
        let p2 = points[(i + 2) % n];
        let cross = (p1.x - p0.x) * (p2.y - p1.y) - (p1.y - p0.y) * (p2.x - p1.x);

        if cross.abs() > 1e-10 {
            if sign == 0.0 {
                sign = cross.signum();
            } else if sign != cross.signum() {
                return false;
            }
        }
    }

    true
}

fn fan(n: usize) -> Vec<usize> {
    (1..n - 1).flat_map(|i| [0, i, i + 1]).collect()
}

fn earcut(outer: &[Point2<f64>], holes: &[&Vec<Point2<f64>>]) -> Result<Vec<usize>> {
    let total = outer.len() + holes.iter().map(|h| h.len()).sum::<usize>();
    let mut vertices = Vec::with_capacity(total * 2);
    let mut hole_starts = Vec::with_capacity(holes.len());

    vertices.extend(outer.iter().flat_map(|p| [p.x, p.y]));
    for hole in holes {
        hole_starts.push(vertices.len() / 2);
        vertices.extend(hole.iter().flat_map(|p| [p.x, p.y]));
    }

    earcutr::earcut(&vertices, &hole_starts, 2).map_err(|e| Error::triangulation(format!("{e:?}")))
}

/// Triangulate a simple polygon (no holes)
///
/// Returns triangle indices into `points`.
pub fn triangulate_polygon(points: &[Point2<f64>]) -> Result<Vec<usize>> {
    let n = points.len();
    if n < 3 {
        return Err(Error::triangulation("Need at least 3 points to triangulate"));
    }
    if n == 3 {
        return Ok(vec![0, 1, 2]);
    }
    if n <= 8 && is_convex(points) {
        return Ok(fan(n));
    }

    earcut(points, &[])
}

/// Triangulate a polygon with holes
///
/// Indices refer to the concatenation of `outer` and every hole with at
/// least three points, in order.
pub fn triangulate_polygon_with_holes(
    outer: &[Point2<f64>],
    holes: &[Vec<Point2<f64>>],
) -> Result<Vec<usize>> {
    if outer.len() < 3 {
        return Err(Error::triangulation("Need at least 3 points in outer boundary"));
    }

    let valid_holes: Vec<&Vec<Point2<f64>>> = holes.iter().filter(|h| h.len() >= 3).collect();
    if valid_holes.is_empty() {
        return triangulate_polygon(outer);
    }

    earcut(outer, &valid_holes)
}

/// Orthonormal in-plane basis (u, v) for a plane normal
pub fn plane_basis(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    // Pick the world axis least aligned with the normal
    let reference = if normal.x.abs() <= normal.y.abs() && normal.x.abs() <= normal.z.abs() {
        Vector3::x()
    } else if normal.y.abs() <= normal.z.abs() {
        Vector3::y()
    } else {
        Vector3::z()
    };

    let u = normal.cross(&reference).normalize();
    let v = normal.cross(&u).normalize();
    (u, v)
}

/// Project 3D points into a plane's (u, v) coordinates around `origin`
pub fn project_to_2d(
    points: &[Point3<f64>],
    origin: &Point3<f64>,
    u: &Vector3<f64>,
    v: &Vector3<f64>,
) -> Vec<Point2<f64>> {
    points
        .iter()
        .map(|p| {
            let d = p - origin;
            Point2::new(d.dot(u), d.dot(v))
        })
        .collect()
}

/// Polygon normal by Newell's method
///
/// Falls back to +Z for degenerate polygons.
pub fn calculate_polygon_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let n = points.len();
    if n < 3 {
        return Vector3::z();
    }

    let mut normal = Vector3::<f64>::zeros();
    for i in 0..n {
        let current = points[i];
        let next = points[(i + 1) % n];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }

    normal.try_normalize(1e-10).unwrap_or_else(Vector3::z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_triangulate_square() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert_eq!(triangulate_polygon(&points).unwrap(), vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_triangulate_concave_quad_uses_earcut() {
        // Dart shape: fanning from vertex 0 would cover area outside the polygon
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(4.0, 0.0),
            Point2::new(2.0, 3.0),
        ];
        let indices = triangulate_polygon(&points).unwrap();
        assert_eq!(indices.len(), 6);
        assert_ne!(indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_too_few_points() {
        assert!(triangulate_polygon(&[Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)]).is_err());
    }

    #[test]
    fn test_polygon_normal_and_projection() {
        let points = vec![
            Point3::new(0.0, 0.0, 2.0),
            Point3::new(1.0, 0.0, 2.0),
            Point3::new(1.0, 1.0, 2.0),
            Point3::new(0.0, 1.0, 2.0),
        ];

        let normal = calculate_polygon_normal(&points);
        assert_relative_eq!(normal.z, 1.0, epsilon = 1e-9);

        let (u, v) = plane_basis(&normal);
        let flat = project_to_2d(&points, &points[0], &u, &v);
        assert_relative_eq!(crate::profile::signed_area(&flat).abs(), 1.0, epsilon = 1e-9);
    }
}
