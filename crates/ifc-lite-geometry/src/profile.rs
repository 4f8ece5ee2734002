// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D profile definitions for swept solids

use crate::error::{Error, Result};
use crate::triangulation::triangulate_polygon_with_holes;
use nalgebra::{Matrix3, Point2};
use std::f64::consts::TAU;

/// 2D profile with optional holes
#[derive(Debug, Clone, PartialEq)]
pub struct Profile2D {
    /// Outer boundary (counter-clockwise after `normalize_winding`)
    pub outer: Vec<Point2<f64>>,
    /// Holes (clockwise after `normalize_winding`)
    pub holes: Vec<Vec<Point2<f64>>>,
}

impl Profile2D {
    pub fn new(outer: Vec<Point2<f64>>) -> Self {
        Self {
            outer,
            holes: Vec::new(),
        }
    }

    pub fn add_hole(&mut self, hole: Vec<Point2<f64>>) {
        self.holes.push(hole);
    }

    /// Rectangle centered at the origin
    pub fn rectangle(width: f64, height: f64) -> Self {
        let hw = width / 2.0;
        let hh = height / 2.0;

        Self::new(vec![
            Point2::new(-hw, -hh),
            Point2::new(hw, -hh),
            Point2::new(hw, hh),
            Point2::new(-hw, hh),
        ])
    }

    /// Circle centered at the origin
    ///
    /// Uses an adaptive segment count unless one is given.
    pub fn circle(radius: f64, segments: Option<usize>) -> Self {
        let segments = segments.unwrap_or_else(|| calculate_circle_segments(radius));
        Self::new(circle_points(radius, segments))
    }

    /// Apply a 2D homogeneous transform (profile Position)
    pub fn transform(&mut self, matrix: &Matrix3<f64>) {
        for p in self.outer.iter_mut().chain(self.holes.iter_mut().flatten()) {
            *p = matrix.transform_point(p);
        }
    }

    /// Make the outer loop counter-clockwise and every hole clockwise
    pub fn normalize_winding(&mut self) {
        if signed_area(&self.outer) < 0.0 {
            self.outer.reverse();
        }
        for hole in &mut self.holes {
            if signed_area(hole) > 0.0 {
                hole.reverse();
            }
        }
    }

    /// Triangulate the cap face
    pub fn triangulate(&self) -> Result<Triangulation> {
        if self.outer.len() < 3 {
            return Err(Error::profile("Profile must have at least 3 vertices"));
        }

        let holes: Vec<Vec<Point2<f64>>> =
            self.holes.iter().filter(|h| h.len() >= 3).cloned().collect();
        let indices = triangulate_polygon_with_holes(&self.outer, &holes)?;

        let points = self
            .outer
            .iter()
            .chain(holes.iter().flatten())
            .copied()
            .collect();

        Ok(Triangulation { points, indices })
    }
}

/// Triangulated profile cap
#[derive(Debug, Clone)]
pub struct Triangulation {
    /// All vertices (outer + holes)
    pub points: Vec<Point2<f64>>,
    /// Triangle indices into `points`
    pub indices: Vec<usize>,
}

/// Shoelace signed area; positive for counter-clockwise loops
pub fn signed_area(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        / 2.0
}

fn circle_points(radius: f64, segments: usize) -> Vec<Point2<f64>> {
    (0..segments)
        .map(|i| {
            let angle = TAU * (i as f64) / (segments as f64);
            Point2::new(radius * angle.cos(), radius * angle.sin())
        })
        .collect()
}

/// Adaptive number of segments for a circle of the given radius
#[inline]
pub fn calculate_circle_segments(radius: f64) -> usize {
    let segments = (radius.abs().sqrt() * 8.0).ceil() as usize;
    segments.clamp(8, 32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    #[test]
    fn test_rectangle_profile() {
        let profile = Profile2D::rectangle(10.0, 5.0);
        assert_eq!(profile.outer.len(), 4);
        assert_relative_eq!(signed_area(&profile.outer), 50.0);
    }

    #[test]
    fn test_circle_segments_are_clamped() {
        assert_eq!(calculate_circle_segments(0.01), 8);
        assert_eq!(calculate_circle_segments(1000.0), 32);
        assert!(Profile2D::circle(5.0, None).outer.len() >= 8);
    }

    #[test]
    fn test_normalize_winding() {
        let mut profile = Profile2D::rectangle(4.0, 4.0);
        profile.outer.reverse();
        profile.add_hole(Profile2D::rectangle(1.0, 1.0).outer);

        profile.normalize_winding();
        assert!(signed_area(&profile.outer) > 0.0);
        assert!(signed_area(&profile.holes[0]) < 0.0);
    }

    #[test]
    fn test_transform() {
        let mut profile = Profile2D::rectangle(2.0, 2.0);
        profile.transform(&Matrix3::new_translation(&Vector2::new(5.0, 0.0)));
        assert_relative_eq!(profile.outer[0].x, 4.0);
    }

    #[test]
    fn test_triangulate_with_hole() {
        let mut profile = Profile2D::rectangle(4.0, 4.0);
        profile.add_hole(Profile2D::rectangle(1.0, 1.0).outer);
        profile.normalize_winding();

        let tri = profile.triangulate().unwrap();
        assert_eq!(tri.points.len(), 8);
        // A square with a square hole needs 8 triangles
        assert_eq!(tri.indices.len(), 24);
    }
}
