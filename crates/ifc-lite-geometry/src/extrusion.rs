// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Linear extrusion of 2D profiles into closed meshes

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::profile::Profile2D;
use nalgebra::{Point2, Point3, Vector3};

/// Extrude a profile lying in the XY plane along `direction` by `depth`
///
/// The direction need not be perpendicular to the profile plane. Produces
/// a bottom cap at z=0, a top cap at `direction * depth`, and flat-shaded
/// side walls for the outer loop and every hole.
pub fn extrude_profile(profile: &Profile2D, depth: f64, direction: Vector3<f64>) -> Result<Mesh> {
    if depth <= 0.0 || !depth.is_finite() {
        return Err(Error::geometry(format!("invalid extrusion depth {depth}")));
    }
    let direction = direction
        .try_normalize(1e-12)
        .ok_or_else(|| Error::geometry("zero extrusion direction"))?;
    if direction.z.abs() < 1e-9 {
        return Err(Error::geometry("extrusion direction lies in the profile plane"));
    }

    let mut profile = profile.clone();
    profile.normalize_winding();
    let cap = profile.triangulate()?;

    let offset = direction * depth;
    let up = Vector3::z() * direction.z.signum();

    let loops = 1 + profile.holes.len();
    let edge_count = profile.outer.len() + profile.holes.iter().map(Vec::len).sum::<usize>();
    let mut mesh = Mesh::with_capacity(
        cap.points.len() * 2 + edge_count * 4,
        cap.indices.len() * 2 + edge_count * 6,
    );

    // Caps: bottom faces away from the extrusion, top faces along it
    for (shift, normal) in [(Vector3::zeros(), -up), (offset, up)] {
        let base = mesh.vertex_count() as u32;
        for p in &cap.points {
            mesh.push_vertex(Point3::new(p.x, p.y, 0.0) + shift, normal);
        }
        for tri in cap.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0], tri[1], tri[2]);
            let ccw = turn(cap.points[a], cap.points[b], cap.points[c]) > 0.0;
            // Counter-clockwise seen from +Z faces +Z
            let (b, c) = if ccw == (normal.z > 0.0) { (b, c) } else { (c, b) };
            mesh.push_triangle(base + a as u32, base + b as u32, base + c as u32);
        }
    }

    let mut walls = Vec::with_capacity(loops);
    walls.push(&profile.outer);
    walls.extend(profile.holes.iter().filter(|h| h.len() >= 3));

    for ring in walls {
        for i in 0..ring.len() {
            let p0 = Point3::new(ring[i].x, ring[i].y, 0.0);
            let next = ring[(i + 1) % ring.len()];
            let p1 = Point3::new(next.x, next.y, 0.0);

            let Some(normal) = (p1 - p0).cross(&offset).try_normalize(1e-12) else {
                continue;
            };
            // Keep outward orientation for extrusions towards -Z
            let normal = normal * direction.z.signum();

            let a = mesh.push_vertex(p0, normal);
            let b = mesh.push_vertex(p1, normal);
            let c = mesh.push_vertex(p1 + offset, normal);
            let d = mesh.push_vertex(p0 + offset, normal);
            if direction.z > 0.0 {
                mesh.push_triangle(a, b, c);
                mesh.push_triangle(a, c, d);
            } else {
                mesh.push_triangle(a, c, b);
                mesh.push_triangle(a, d, c);
            }
        }
    }

    Ok(mesh)
}

fn turn(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_extrusion() {
        let mesh = extrude_profile(&Profile2D::rectangle(2.0, 1.0), 3.0, Vector3::z()).unwrap();

        // 2 caps x 2 triangles + 4 walls x 2 triangles
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.normals.len(), mesh.positions.len());

        let (min, max) = mesh.bounds().unwrap();
        assert_relative_eq!(min.x, -1.0);
        assert_relative_eq!(max.y, 0.5);
        assert_relative_eq!(max.z, 3.0);
    }

    #[test]
    fn test_cap_winding_matches_normal() {
        let mesh = extrude_profile(&Profile2D::rectangle(1.0, 1.0), 1.0, Vector3::z()).unwrap();
        for t in 0..mesh.triangle_count() {
            let [a, b, c] = mesh.triangle(t).unwrap();
            let geometric = (b - a).cross(&(c - a));
            let i = mesh.indices[t * 3] as usize * 3;
            let stored = Vector3::new(mesh.normals[i], mesh.normals[i + 1], mesh.normals[i + 2]);
            assert!(geometric.dot(&stored) > 0.0, "triangle {t} faces inward");
        }
    }

    #[test]
    fn test_oblique_and_negative_direction() {
        let mesh = extrude_profile(
            &Profile2D::rectangle(1.0, 1.0),
            2.0,
            Vector3::new(0.0, 0.0, -1.0),
        )
        .unwrap();
        let (min, _) = mesh.bounds().unwrap();
        assert_relative_eq!(min.z, -2.0);

        let sheared = extrude_profile(&Profile2D::rectangle(1.0, 1.0), 1.0, Vector3::new(1.0, 0.0, 1.0))
            .unwrap();
        let (_, max) = sheared.bounds().unwrap();
        assert!(max.x > 0.5);
    }

    #[test]
    fn test_rejects_bad_input() {
        let profile = Profile2D::rectangle(1.0, 1.0);
        assert!(extrude_profile(&profile, 0.0, Vector3::z()).is_err());
        assert!(extrude_profile(&profile, 1.0, Vector3::x()).is_err());
    }
}
