// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned bounding boxes in world space (metres, Z up)

use nalgebra::{Matrix4, Point3, Vector3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneBounds {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Default for SceneBounds {
    /// A 10 m cube around the origin, used before anything is loaded
    fn default() -> Self {
        Self::from_center_size(Point3::origin(), Vector3::repeat(10.0))
    }
}

impl SceneBounds {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    pub fn from_center_size(center: Point3<f64>, size: Vector3<f64>) -> Self {
        let half = size / 2.0;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Smallest box containing all points, `None` if there are none
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point3<f64>>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self::new(first, first);
        for p in iter {
            bounds.expand(&p);
        }
        Some(bounds)
    }

    pub fn expand(&mut self, p: &Point3<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn union(&self, other: &SceneBounds) -> SceneBounds {
        SceneBounds {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Bounds of this box after an affine transform
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> SceneBounds {
        let corners = (0..8).map(|i| {
            let pick = |bit: usize, lo: f64, hi: f64| if i & bit == 0 { lo } else { hi };
            matrix.transform_point(&Point3::new(
                pick(1, self.min.x, self.max.x),
                pick(2, self.min.y, self.max.y),
                pick(4, self.min.z, self.max.z),
            ))
        });
        // Eight corners, never empty
        Self::from_points(corners).unwrap_or(*self)
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Largest edge length
    pub fn max_dim(&self) -> f64 {
        self.size().max()
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }
}
