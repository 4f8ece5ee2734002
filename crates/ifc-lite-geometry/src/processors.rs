// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry Processors - Implementations for various IFC geometry types
//!
//! Each processor turns one representation item into a mesh in the item's
//! own coordinate system, still in file units.

use crate::{
    extrusion::extrude_profile,
    placement::{axis2_placement_2d, axis2_placement_3d, coords2, coords3, direction},
    profile::{calculate_circle_segments, Profile2D},
    router::GeometryProcessor,
    triangulation::{calculate_polygon_normal, plane_basis, project_to_2d, triangulate_polygon_with_holes},
    Error, Mesh, Result,
};
use ifc_lite_model::{AttributeValue, DecodedEntity, EntityId, EntityResolver, IfcType};
use nalgebra::{Point2, Point3};

// ============================================================================
// Extruded area solids
// ============================================================================

/// ExtrudedAreaSolid processor
///
/// Handles IfcExtrudedAreaSolid, the most common IFC body geometry.
#[derive(Default)]
pub struct ExtrudedAreaSolidProcessor;

impl ExtrudedAreaSolidProcessor {
    pub fn new() -> Self {
        Self
    }

    fn extract_profile(&self, profile: &DecodedEntity, resolver: &dyn EntityResolver) -> Result<Profile2D> {
        let mut shape = match profile.ifc_type {
            // (ProfileType, ProfileName, Position, XDim, YDim)
            IfcType::IfcRectangleProfileDef => {
                let x = profile
                    .get_float(3)
                    .ok_or_else(|| Error::invalid_attribute(3, "Missing XDim"))?;
                let y = profile
                    .get_float(4)
                    .ok_or_else(|| Error::invalid_attribute(4, "Missing YDim"))?;
                Profile2D::rectangle(x, y)
            }
            // (ProfileType, ProfileName, Position, Radius)
            IfcType::IfcCircleProfileDef => {
                let radius = profile
                    .get_float(3)
                    .ok_or_else(|| Error::invalid_attribute(3, "Missing Radius"))?;
                Profile2D::circle(radius, None)
            }
            // (ProfileType, ProfileName, OuterCurve)
            IfcType::IfcArbitraryClosedProfileDef => {
                return self.curve_profile(profile, resolver, false);
            }
            // (ProfileType, ProfileName, OuterCurve, InnerCurves)
            IfcType::IfcArbitraryProfileDefWithVoids => {
                return self.curve_profile(profile, resolver, true);
            }
            _ => {
                return Err(Error::unsupported_type(format!(
                    "profile {}",
                    profile.ifc_type
                )))
            }
        };

        // Parametric profiles carry an optional 2D Position at index 2
        if let Some(position) = profile.get_ref(2).and_then(|id| axis2_placement_2d(id, resolver)) {
            shape.transform(&position);
        }

        Ok(shape)
    }

    fn curve_profile(
        &self,
        profile: &DecodedEntity,
        resolver: &dyn EntityResolver,
        with_voids: bool,
    ) -> Result<Profile2D> {
        let outer_id = profile
            .get_ref(2)
            .ok_or_else(|| Error::invalid_attribute(2, "Missing OuterCurve"))?;
        let outer = curve_points_2d(outer_id, resolver)?;
        if outer.len() < 3 {
            return Err(Error::profile("Outer curve must have at least 3 points"));
        }

        let mut shape = Profile2D::new(outer);

        if with_voids {
            for inner_id in profile.get_refs(3).unwrap_or_default() {
                match curve_points_2d(inner_id, resolver) {
                    Ok(points) if points.len() >= 3 => shape.add_hole(points),
                    _ => continue,
                }
            }
        }

        Ok(shape)
    }
}

impl GeometryProcessor for ExtrudedAreaSolidProcessor {
    fn process(&self, entity: &DecodedEntity, resolver: &dyn EntityResolver) -> Result<Mesh> {
        // IfcExtrudedAreaSolid(SweptArea, Position, ExtrudedDirection, Depth)
        let profile_id = entity
            .get_ref(0)
            .ok_or_else(|| Error::invalid_attribute(0, "Missing SweptArea"))?;
        let profile_entity = resolver
            .get(profile_id)
            .ok_or_else(|| Error::entity_not_found(profile_id))?;
        let profile = self.extract_profile(&profile_entity, resolver)?;

        let extrusion = entity
            .get_ref(2)
            .and_then(|id| direction(id, resolver))
            .ok_or_else(|| Error::invalid_attribute(2, "Missing ExtrudedDirection"))?;
        let depth = entity
            .get_float(3)
            .ok_or_else(|| Error::invalid_attribute(3, "Missing Depth"))?;

        let mut mesh = extrude_profile(&profile, depth, extrusion)?;

        if let Some(position) = entity.get_ref(1).and_then(|id| axis2_placement_3d(id, resolver)) {
            mesh.transform(&position);
        }

        Ok(mesh)
    }

    fn supported_types(&self) -> Vec<IfcType> {
        vec![IfcType::IfcExtrudedAreaSolid]
    }
}

/// Points of a closed 2D curve, without the repeated closing point
fn curve_points_2d(curve_id: EntityId, resolver: &dyn EntityResolver) -> Result<Vec<Point2<f64>>> {
    let curve = resolver
        .get(curve_id)
        .ok_or_else(|| Error::entity_not_found(curve_id))?;

    let mut points = match curve.ifc_type {
        // IfcPolyline(Points)
        IfcType::IfcPolyline => curve
            .get_refs(0)
            .ok_or_else(|| Error::invalid_attribute(0, "Missing Points"))?
            .into_iter()
            .filter_map(|id| resolver.get(id))
            .filter_map(|p| p.get_list(0).map(coords2))
            .collect::<Vec<_>>(),
        IfcType::IfcIndexedPolyCurve => indexed_poly_curve_points(&curve, resolver)?,
        _ => return Err(Error::unsupported_type(format!("curve {}", curve.ifc_type))),
    };

    if points.len() > 1 {
        let first = points[0];
        let last = points[points.len() - 1];
        if (first - last).norm() < 1e-10 {
            points.pop();
        }
    }

    Ok(points)
}

/// IfcIndexedPolyCurve(Points, Segments, SelfIntersect)
///
/// Without Segments the points form a polyline. IfcArcIndex segments are
/// tessellated through their three points.
fn indexed_poly_curve_points(
    curve: &DecodedEntity,
    resolver: &dyn EntityResolver,
) -> Result<Vec<Point2<f64>>> {
    let list_id = curve
        .get_ref(0)
        .ok_or_else(|| Error::invalid_attribute(0, "Missing Points"))?;
    let list = resolver
        .get(list_id)
        .ok_or_else(|| Error::entity_not_found(list_id))?;

    // IfcCartesianPointList2D(CoordList)
    let coords: Vec<Point2<f64>> = list
        .get_list(0)
        .ok_or_else(|| Error::invalid_attribute(0, "Missing CoordList"))?
        .iter()
        .filter_map(|c| c.as_list().map(coords2))
        .collect();

    let Some(segments) = curve.get_list(1) else {
        return Ok(coords);
    };

    let lookup = |i: &AttributeValue| -> Option<Point2<f64>> {
        let index = usize::try_from(i.as_integer()?).ok()?;
        coords.get(index.checked_sub(1)?).copied()
    };

    let mut points: Vec<Point2<f64>> = Vec::new();
    for segment in segments {
        let AttributeValue::TypedValue(kind, args) = segment else {
            continue;
        };
        let Some(indices) = args.first().and_then(|a| a.as_list()) else {
            continue;
        };
        let pts: Vec<Point2<f64>> = indices.iter().filter_map(&lookup).collect();

        let tessellated = if kind == "IFCARCINDEX" && pts.len() == 3 {
            arc_points(pts[0], pts[1], pts[2])
        } else {
            pts
        };

        for p in tessellated {
            if points.last().map_or(true, |last| (last - p).norm() > 1e-10) {
                points.push(p);
            }
        }
    }

    Ok(points)
}

/// Tessellate the circular arc from `a` through `b` to `c`
fn arc_points(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> Vec<Point2<f64>> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < 1e-12 {
        return vec![a, b, c];
    }

    let sq = |p: Point2<f64>| p.x * p.x + p.y * p.y;
    let center = Point2::new(
        (sq(a) * (b.y - c.y) + sq(b) * (c.y - a.y) + sq(c) * (a.y - b.y)) / d,
        (sq(a) * (c.x - b.x) + sq(b) * (a.x - c.x) + sq(c) * (b.x - a.x)) / d,
    );
    let radius = (a - center).norm();

    let angle = |p: Point2<f64>| (p.y - center.y).atan2(p.x - center.x);
    let start = angle(a);
    let tau = std::f64::consts::TAU;
    let ccw = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x) > 0.0;

    let sweep = if ccw {
        (angle(c) - start).rem_euclid(tau)
    } else {
        -(start - angle(c)).rem_euclid(tau)
    };

    let full = calculate_circle_segments(radius) as f64;
    let steps = ((full * sweep.abs() / tau).ceil() as usize).max(2);

    (0..=steps)
        .map(|i| {
            let t = start + sweep * (i as f64) / (steps as f64);
            Point2::new(center.x + radius * t.cos(), center.y + radius * t.sin())
        })
        .collect()
}

// ============================================================================
// Triangulated face sets
// ============================================================================

/// TriangulatedFaceSet processor
///
/// Handles IfcTriangulatedFaceSet, explicit triangle meshes (IFC4+).
#[derive(Default)]
pub struct TriangulatedFaceSetProcessor;

impl TriangulatedFaceSetProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl GeometryProcessor for TriangulatedFaceSetProcessor {
    fn process(&self, entity: &DecodedEntity, resolver: &dyn EntityResolver) -> Result<Mesh> {
        // IfcTriangulatedFaceSet(Coordinates, Normals, Closed, CoordIndex, PnIndex)
        let coord_id = entity
            .get_ref(0)
            .ok_or_else(|| Error::invalid_attribute(0, "Missing Coordinates"))?;
        let coord_entity = resolver
            .get(coord_id)
            .ok_or_else(|| Error::entity_not_found(coord_id))?;

        // IfcCartesianPointList3D(CoordList)
        let coord_list = coord_entity
            .get_list(0)
            .ok_or_else(|| Error::invalid_attribute(0, "Missing CoordList"))?;

        let mut mesh = Mesh::with_capacity(coord_list.len(), 0);
        for coord in coord_list {
            let p = coord.as_list().map(coords3).unwrap_or_else(Point3::origin);
            mesh.positions
                .extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);
        }
        let vertex_count = coord_list.len() as u32;

        let faces = entity
            .get_list(3)
            .ok_or_else(|| Error::invalid_attribute(3, "Missing CoordIndex"))?;

        mesh.indices.reserve(faces.len() * 3);
        for face in faces {
            let Some(corners) = face.as_list() else {
                continue;
            };
            // 1-based in the file
            let tri: Vec<u32> = corners
                .iter()
                .take(3)
                .filter_map(|v| v.as_integer())
                .filter(|i| *i >= 1 && *i <= vertex_count as i64)
                .map(|i| (i - 1) as u32)
                .collect();
            if let [a, b, c] = tri[..] {
                mesh.push_triangle(a, b, c);
            }
        }

        if mesh.is_empty() {
            return Err(Error::geometry("Face set has no valid triangles"));
        }

        mesh.compute_normals();
        Ok(mesh)
    }

    fn supported_types(&self) -> Vec<IfcType> {
        vec![IfcType::IfcTriangulatedFaceSet]
    }
}

// ============================================================================
// Faceted B-reps
// ============================================================================

/// FacetedBrep processor
///
/// Handles IfcFacetedBrep, a closed shell of planar polygon faces. Faces
/// with inner bounds are triangulated with holes.
#[derive(Default)]
pub struct FacetedBrepProcessor;

impl FacetedBrepProcessor {
    pub fn new() -> Self {
        Self
    }

    /// IfcPolyLoop(Polygon)
    fn loop_points(&self, loop_id: EntityId, resolver: &dyn EntityResolver) -> Option<Vec<Point3<f64>>> {
        let poly_loop = resolver.get(loop_id)?;
        let points: Vec<Point3<f64>> = poly_loop
            .get_refs(0)?
            .into_iter()
            .filter_map(|id| resolver.get(id))
            .filter_map(|p| p.get_list(0).map(coords3))
            .collect();

        (points.len() >= 3).then_some(points)
    }

    /// Append one planar face, flat shaded
    fn add_face(&self, mesh: &mut Mesh, outer: &[Point3<f64>], holes: &[Vec<Point3<f64>>]) {
        let normal = calculate_polygon_normal(outer);
        let (u, v) = plane_basis(&normal);
        let origin = outer[0];

        let outer_2d = project_to_2d(outer, &origin, &u, &v);
        let holes_2d: Vec<Vec<Point2<f64>>> = holes
            .iter()
            .map(|h| project_to_2d(h, &origin, &u, &v))
            .collect();

        let (points, indices): (Vec<Point3<f64>>, Vec<usize>) =
            match triangulate_polygon_with_holes(&outer_2d, &holes_2d) {
                Ok(indices) => {
                    let points = outer
                        .iter()
                        .chain(holes.iter().filter(|h| h.len() >= 3).flatten())
                        .copied()
                        .collect();
                    (points, indices)
                }
                // Fan the outer loop and drop the holes
                Err(_) => (
                    outer.to_vec(),
                    (1..outer.len() - 1).flat_map(|i| [0, i, i + 1]).collect(),
                ),
            };

        let base = mesh.vertex_count() as u32;
        for p in &points {
            mesh.push_vertex(*p, normal);
        }

        for tri in indices.chunks_exact(3) {
            let (a, b, c) = (points[tri[0]], points[tri[1]], points[tri[2]]);
            let facing = (b - a).cross(&(c - a)).dot(&normal);
            let (i1, i2) = if facing >= 0.0 { (tri[1], tri[2]) } else { (tri[2], tri[1]) };
            mesh.push_triangle(base + tri[0] as u32, base + i1 as u32, base + i2 as u32);
        }
    }
}

impl GeometryProcessor for FacetedBrepProcessor {
    fn process(&self, entity: &DecodedEntity, resolver: &dyn EntityResolver) -> Result<Mesh> {
        // IfcFacetedBrep(Outer) -> IfcClosedShell(CfsFaces)
        let shell_id = entity
            .get_ref(0)
            .ok_or_else(|| Error::invalid_attribute(0, "Missing Outer shell"))?;
        let shell = resolver
            .get(shell_id)
            .ok_or_else(|| Error::entity_not_found(shell_id))?;
        let faces = shell
            .get_refs(0)
            .ok_or_else(|| Error::invalid_attribute(0, "Missing CfsFaces"))?;

        let mut mesh = Mesh::new();

        for face in faces.into_iter().filter_map(|id| resolver.get(id)) {
            let mut outer: Option<Vec<Point3<f64>>> = None;
            let mut holes: Vec<Vec<Point3<f64>>> = Vec::new();

            // IfcFace(Bounds) -> IfcFaceBound(Bound, Orientation)
            for bound in face
                .get_refs(0)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|id| resolver.get(id))
            {
                let Some(mut points) = bound.get_ref(0).and_then(|id| self.loop_points(id, resolver))
                else {
                    continue;
                };
                if bound.get_bool(1) == Some(false) {
                    points.reverse();
                }

                // An explicit outer bound wins; otherwise the first bound is outer
                if bound.ifc_type == IfcType::IfcFaceOuterBound {
                    if let Some(previous) = outer.replace(points) {
                        holes.push(previous);
                    }
                } else if outer.is_none() {
                    outer = Some(points);
                } else {
                    holes.push(points);
                }
            }

            if let Some(outer) = outer {
                self.add_face(&mut mesh, &outer, &holes);
            }
        }

        if mesh.is_empty() {
            return Err(Error::geometry("B-rep has no usable faces"));
        }
        Ok(mesh)
    }

    fn supported_types(&self) -> Vec<IfcType> {
        vec![IfcType::IfcFacetedBrep]
    }
}
