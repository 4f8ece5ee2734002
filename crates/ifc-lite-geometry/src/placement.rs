// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Points, directions and placements
//!
//! All matrices are in file units; the router scales translations to
//! metres once the full chain is composed.

use ifc_lite_model::{AttributeValue, EntityId, EntityResolver, IfcType};
use nalgebra::{Matrix3, Matrix4, Point2, Point3, Vector2, Vector3};

/// Placement chains deeper than this are treated as cyclic
const MAX_PLACEMENT_DEPTH: usize = 64;

/// Coordinates from a list attribute; missing components are zero
pub fn coords3(list: &[AttributeValue]) -> Point3<f64> {
    let c = |i: usize| list.get(i).and_then(|v| v.as_float()).unwrap_or(0.0);
    Point3::new(c(0), c(1), c(2))
}

pub fn coords2(list: &[AttributeValue]) -> Point2<f64> {
    let c = |i: usize| list.get(i).and_then(|v| v.as_float()).unwrap_or(0.0);
    Point2::new(c(0), c(1))
}

/// IfcCartesianPoint(Coordinates)
pub fn cartesian_point(id: EntityId, resolver: &dyn EntityResolver) -> Option<Point3<f64>> {
    let point = resolver.get(id)?;
    if point.ifc_type != IfcType::IfcCartesianPoint {
        return None;
    }
    Some(coords3(point.get_list(0)?))
}

/// IfcDirection(DirectionRatios), normalised
pub fn direction(id: EntityId, resolver: &dyn EntityResolver) -> Option<Vector3<f64>> {
    let dir = resolver.get(id)?;
    if dir.ifc_type != IfcType::IfcDirection {
        return None;
    }
    let ratios = dir.get_list(0)?;
    let z_default = if ratios.len() < 3 { 0.0 } else { 1.0 };
    let v = Vector3::new(
        ratios.first().and_then(|v| v.as_float()).unwrap_or(0.0),
        ratios.get(1).and_then(|v| v.as_float()).unwrap_or(0.0),
        ratios.get(2).and_then(|v| v.as_float()).unwrap_or(z_default),
    );
    v.try_normalize(1e-12)
}

/// IfcAxis2Placement3D(Location, Axis, RefDirection)
pub fn axis2_placement_3d(id: EntityId, resolver: &dyn EntityResolver) -> Option<Matrix4<f64>> {
    let placement = resolver.get(id)?;
    if placement.ifc_type != IfcType::IfcAxis2Placement3D {
        return None;
    }

    let location = placement
        .get_ref(0)
        .and_then(|p| cartesian_point(p, resolver))
        .unwrap_or_else(Point3::origin);
    let axis = placement
        .get_ref(1)
        .and_then(|d| direction(d, resolver))
        .unwrap_or_else(Vector3::z);
    let ref_dir = placement
        .get_ref(2)
        .and_then(|d| direction(d, resolver))
        .unwrap_or_else(Vector3::x);

    Some(basis_matrix(location, axis, ref_dir))
}

/// Right-handed frame from a Z axis and an approximate X axis
fn basis_matrix(location: Point3<f64>, axis: Vector3<f64>, ref_dir: Vector3<f64>) -> Matrix4<f64> {
    let z = axis;
    // RefDirection parallel to Axis: pick any perpendicular X
    let x = (ref_dir - z * ref_dir.dot(&z))
        .try_normalize(1e-9)
        .unwrap_or_else(|| {
            let fallback = if z.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
            (fallback - z * fallback.dot(&z)).normalize()
        });
    let y = z.cross(&x);

    Matrix4::new(
        x.x, y.x, z.x, location.x, //
        x.y, y.y, z.y, location.y, //
        x.z, y.z, z.z, location.z, //
        0.0, 0.0, 0.0, 1.0,
    )
}

/// IfcAxis2Placement2D(Location, RefDirection) as a homogeneous 2D matrix
pub fn axis2_placement_2d(id: EntityId, resolver: &dyn EntityResolver) -> Option<Matrix3<f64>> {
    let placement = resolver.get(id)?;
    if placement.ifc_type != IfcType::IfcAxis2Placement2D {
        return None;
    }

    let location = placement
        .get_ref(0)
        .and_then(|p| resolver.get(p))
        .and_then(|p| p.get_list(0).map(coords2))
        .unwrap_or_else(Point2::origin);
    let x = placement
        .get_ref(1)
        .and_then(|d| resolver.get(d))
        .and_then(|d| d.get_list(0).map(|r| coords2(r).coords))
        .and_then(|v| v.try_normalize(1e-12))
        .unwrap_or_else(Vector2::x);
    let y = Vector2::new(-x.y, x.x);

    Some(Matrix3::new(
        x.x, y.x, location.x, //
        x.y, y.y, location.y, //
        0.0, 0.0, 1.0,
    ))
}

/// IfcCartesianTransformationOperator3D(Axis1, Axis2, LocalOrigin, Scale, Axis3)
pub fn transformation_operator(
    id: EntityId,
    resolver: &dyn EntityResolver,
) -> Option<Matrix4<f64>> {
    let op = resolver.get(id)?;

    let origin = op
        .get_ref(2)
        .and_then(|p| cartesian_point(p, resolver))
        .unwrap_or_else(Point3::origin);
    let x_axis = op.get_ref(0).and_then(|d| direction(d, resolver));
    let z_axis = op.get_ref(4).and_then(|d| direction(d, resolver));
    let scale = op.get_float(3).unwrap_or(1.0);

    let frame = basis_matrix(
        origin,
        z_axis.unwrap_or_else(Vector3::z),
        x_axis.unwrap_or_else(Vector3::x),
    );
    Some(frame * Matrix4::new_scaling(scale))
}

/// Absolute transform of an object placement
///
/// Follows IfcLocalPlacement.PlacementRelTo up to the root, composing each
/// RelativePlacement on the way.
pub fn object_placement(id: EntityId, resolver: &dyn EntityResolver) -> Option<Matrix4<f64>> {
    let mut transform = Matrix4::identity();
    let mut current = Some(id);
    let mut depth = 0;

    while let Some(placement_id) = current {
        if depth >= MAX_PLACEMENT_DEPTH {
            return None;
        }
        depth += 1;

        let placement = resolver.get(placement_id)?;
        match placement.ifc_type {
            // IFCLOCALPLACEMENT(PlacementRelTo, RelativePlacement)
            IfcType::IfcLocalPlacement => {
                let relative = placement
                    .get_ref(1)
                    .and_then(|rel| axis2_placement_3d(rel, resolver))
                    .unwrap_or_else(Matrix4::identity);
                transform = relative * transform;
                current = placement.get_ref(0);
            }
            IfcType::IfcAxis2Placement3D => {
                transform = axis2_placement_3d(placement_id, resolver)? * transform;
                current = None;
            }
            _ => return None,
        }
    }

    Some(transform)
}

/// Scale the translation part of a file-unit transform to metres
pub fn scale_translation(matrix: &mut Matrix4<f64>, unit_scale: f64) {
    for row in 0..3 {
        matrix[(row, 3)] *= unit_scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ifc_lite_model::DecodedEntity;
    use rustc_hash::FxHashMap;
    use std::sync::Arc;

    /// In-memory resolver for hand-built entity graphs
    #[derive(Default)]
    struct MapResolver(FxHashMap<EntityId, Arc<DecodedEntity>>);

    impl MapResolver {
        fn add(&mut self, id: u32, ifc_type: IfcType, attributes: Vec<AttributeValue>) {
            self.0.insert(
                EntityId(id),
                Arc::new(DecodedEntity {
                    id: EntityId(id),
                    ifc_type,
                    attributes,
                }),
            );
        }
    }

    impl EntityResolver for MapResolver {
        fn get(&self, id: EntityId) -> Option<Arc<DecodedEntity>> {
            self.0.get(&id).cloned()
        }
        fn entities_by_type(&self, _: &IfcType) -> Vec<Arc<DecodedEntity>> {
            Vec::new()
        }
        fn ids_by_type(&self, _: &IfcType) -> Vec<EntityId> {
            Vec::new()
        }
        fn all_ids(&self) -> Vec<EntityId> {
            self.0.keys().copied().collect()
        }
    }

    fn floats(values: &[f64]) -> AttributeValue {
        AttributeValue::List(values.iter().map(|v| AttributeValue::Float(*v)).collect())
    }

    fn r(id: u32) -> AttributeValue {
        AttributeValue::EntityRef(EntityId(id))
    }

    #[test]
    fn test_local_placement_chain() {
        let mut res = MapResolver::default();
        res.add(1, IfcType::IfcCartesianPoint, vec![floats(&[10.0, 0.0, 0.0])]);
        res.add(2, IfcType::IfcAxis2Placement3D, vec![r(1), AttributeValue::Null, AttributeValue::Null]);
        res.add(3, IfcType::IfcLocalPlacement, vec![AttributeValue::Null, r(2)]);
        res.add(4, IfcType::IfcCartesianPoint, vec![floats(&[0.0, 5.0, 0.0])]);
        // Child frame rotated 90 degrees about Z
        res.add(5, IfcType::IfcDirection, vec![floats(&[0.0, 1.0, 0.0])]);
        res.add(6, IfcType::IfcAxis2Placement3D, vec![r(4), AttributeValue::Null, r(5)]);
        res.add(7, IfcType::IfcLocalPlacement, vec![r(3), r(6)]);

        let m = object_placement(EntityId(7), &res).unwrap();
        let p = m.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(10.0, 6.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_cyclic_placement_is_rejected() {
        let mut res = MapResolver::default();
        res.add(1, IfcType::IfcLocalPlacement, vec![r(2), AttributeValue::Null]);
        res.add(2, IfcType::IfcLocalPlacement, vec![r(1), AttributeValue::Null]);
        assert!(object_placement(EntityId(1), &res).is_none());
    }

    #[test]
    fn test_transformation_operator_scale() {
        let mut res = MapResolver::default();
        res.add(1, IfcType::IfcCartesianPoint, vec![floats(&[1.0, 2.0, 3.0])]);
        res.add(
            2,
            IfcType::IfcCartesianTransformationOperator3D,
            vec![AttributeValue::Null, AttributeValue::Null, r(1), AttributeValue::Float(2.0)],
        );

        let m = transformation_operator(EntityId(2), &res).unwrap();
        let p = m.transform_point(&Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(p, Point3::new(3.0, 4.0, 5.0), epsilon = 1e-9);
    }

    #[test]
    fn test_scale_translation() {
        let mut m = Matrix4::new_translation(&Vector3::new(1000.0, 0.0, 0.0));
        scale_translation(&mut m, 0.001);
        assert_relative_eq!(m[(0, 3)], 1.0);
    }
}
