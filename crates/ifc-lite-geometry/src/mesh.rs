// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triangle mesh with flat GPU-style buffers

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

/// Indexed triangle mesh
///
/// Buffers are laid out the way a renderer uploads them: `positions` and
/// `normals` are `xyz` triples, `indices` are triangle corner indices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<f32>,
    /// Per-vertex normals; empty until computed
    pub normals: Vec<f32>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertices: usize, indices: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertices * 3),
            normals: Vec::with_capacity(vertices * 3),
            indices: Vec::with_capacity(indices),
        }
    }

    /// True if there is nothing to draw
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Append a vertex and return its index
    pub fn push_vertex(&mut self, position: Point3<f64>, normal: Vector3<f64>) -> u32 {
        let index = self.vertex_count() as u32;
        self.positions
            .extend_from_slice(&[position.x as f32, position.y as f32, position.z as f32]);
        self.normals
            .extend_from_slice(&[normal.x as f32, normal.y as f32, normal.z as f32]);
        index
    }

    #[inline]
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Vertex position by index
    pub fn position(&self, index: u32) -> Option<Point3<f32>> {
        let i = index as usize * 3;
        let p = self.positions.get(i..i + 3)?;
        Some(Point3::new(p[0], p[1], p[2]))
    }

    /// Corner positions of a triangle
    pub fn triangle(&self, index: usize) -> Option<[Point3<f32>; 3]> {
        let corners = self.indices.get(index * 3..index * 3 + 3)?;
        Some([
            self.position(corners[0])?,
            self.position(corners[1])?,
            self.position(corners[2])?,
        ])
    }

    /// Transform positions and normals in place
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        for p in self.positions.chunks_exact_mut(3) {
            let point = matrix.transform_point(&Point3::new(p[0] as f64, p[1] as f64, p[2] as f64));
            p[0] = point.x as f32;
            p[1] = point.y as f32;
            p[2] = point.z as f32;
        }

        if self.normals.is_empty() {
            return;
        }

        // Normals transform with the inverse transpose of the linear part
        let linear: Matrix3<f64> = matrix.fixed_view::<3, 3>(0, 0).clone_owned();
        let normal_matrix = linear
            .try_inverse()
            .map(|m| m.transpose())
            .unwrap_or(linear);

        for n in self.normals.chunks_exact_mut(3) {
            let v = normal_matrix * Vector3::new(n[0] as f64, n[1] as f64, n[2] as f64);
            let v = v.try_normalize(1e-12).unwrap_or(v);
            n[0] = v.x as f32;
            n[1] = v.y as f32;
            n[2] = v.z as f32;
        }
    }

    /// Uniformly scale positions (file units to metres)
    pub fn scale(&mut self, factor: f64) {
        if factor == 1.0 {
            return;
        }
        let factor = factor as f32;
        for p in self.positions.iter_mut() {
            *p *= factor;
        }
    }

    /// Fill `normals` with area-weighted smooth vertex normals
    pub fn compute_normals(&mut self) {
        let mut accum = vec![Vector3::<f64>::zeros(); self.vertex_count()];

        for tri in self.indices.chunks_exact(3) {
            let (Some(a), Some(b), Some(c)) = (
                self.position(tri[0]),
                self.position(tri[1]),
                self.position(tri[2]),
            ) else {
                continue;
            };
            let face = (b - a).cross(&(c - a)).cast::<f64>();
            for &i in tri {
                if let Some(slot) = accum.get_mut(i as usize) {
                    *slot += face;
                }
            }
        }

        self.normals = accum
            .into_iter()
            .flat_map(|n| {
                let n = n.try_normalize(1e-12).unwrap_or_else(Vector3::z);
                [n.x as f32, n.y as f32, n.z as f32]
            })
            .collect();
    }

    /// Axis-aligned bounds as (min, max)
    pub fn bounds(&self) -> Option<(Point3<f32>, Point3<f32>)> {
        let mut points = self.positions.chunks_exact(3);
        let first = points.next()?;
        let mut min = Point3::new(first[0], first[1], first[2]);
        let mut max = min;

        for p in points {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }

        Some((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle() -> Mesh {
        let mut mesh = Mesh::new();
        let n = Vector3::z();
        let a = mesh.push_vertex(Point3::new(0.0, 0.0, 0.0), n);
        let b = mesh.push_vertex(Point3::new(1.0, 0.0, 0.0), n);
        let c = mesh.push_vertex(Point3::new(0.0, 1.0, 0.0), n);
        mesh.push_triangle(a, b, c);
        mesh
    }

    #[test]
    fn test_counts() {
        let mesh = triangle();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert!(!mesh.is_empty());
        assert!(Mesh::new().is_empty());
    }

    #[test]
    fn test_transform_translates_and_rotates_normals() {
        let mut mesh = triangle();
        let rotation = Matrix4::new_rotation(Vector3::new(std::f64::consts::FRAC_PI_2, 0.0, 0.0));
        let matrix = Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0)) * rotation;
        mesh.transform(&matrix);

        let p = mesh.position(1).unwrap();
        assert_relative_eq!(p.x, 11.0, epsilon = 1e-5);

        // +Z rotated 90 degrees about X points to -Y
        assert_relative_eq!(mesh.normals[1], -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_bounds_and_scale() {
        let mut mesh = triangle();
        mesh.scale(0.5);
        let (min, max) = mesh.bounds().unwrap();
        assert_relative_eq!(min.x, 0.0);
        assert_relative_eq!(max.y, 0.5);
        assert!(Mesh::new().bounds().is_none());
    }

    #[test]
    fn test_compute_normals() {
        let mut mesh = triangle();
        mesh.normals.clear();
        mesh.compute_normals();
        assert_eq!(mesh.normals.len(), 9);
        assert_relative_eq!(mesh.normals[2], 1.0, epsilon = 1e-6);
    }
}
