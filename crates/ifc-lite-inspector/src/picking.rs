// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raycasting and selection
//!
//! [`raycast`] finds the nearest visible, unclipped triangle under a ray.
//! Selection and measurement both build on it.

use crate::geometry::{GeometryCache, GeometryRecord};
use crate::ids::ObjectId;
use crate::section::{point_visible, ClipPlane};
use futures::Future;
use ifc_lite_model::{EntityId, IfcModel};
use nalgebra::{Matrix4, Point2, Point3, Vector3};
use serde::Serialize;
use std::sync::Arc;

const EPSILON: f64 = 1e-9;

/// Half-line `origin + t * direction`, `t >= 0`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Vector3<f64>,
}

impl Ray {
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
        Self { origin, direction }
    }

    pub fn at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction * t
    }

    /// Same ray in another frame
    ///
    /// The direction is not renormalized, so `t` keeps its meaning.
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Ray {
        Ray {
            origin: matrix.transform_point(&self.origin),
            direction: matrix.transform_vector(&self.direction),
        }
    }
}

/// Pixel to normalized device coordinates (`-1..=1`, y up)
pub fn screen_to_ndc(x: f64, y: f64, width: f64, height: f64) -> Option<Point2<f64>> {
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    Some(Point2::new(x / width * 2.0 - 1.0, -(y / height) * 2.0 + 1.0))
}

/// Möller–Trumbore, both faces; returns the ray parameter of the hit
pub fn intersect_triangle(
    ray: &Ray,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> Option<f64> {
    let edge1 = b - a;
    let edge2 = c - a;
    let h = ray.direction.cross(&edge2);
    let det = edge1.dot(&h);
    if det.abs() < EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = ray.origin - a;
    let u = inv_det * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&edge1);
    let v = inv_det * ray.direction.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = inv_det * edge2.dot(&q);
    (t > EPSILON).then_some(t)
}

/// Slab test; returns the entry parameter (0 when starting inside)
pub fn intersect_aabb(ray: &Ray, min: &Point3<f64>, max: &Point3<f64>) -> Option<f64> {
    let mut t_min = 0.0f64;
    let mut t_max = f64::INFINITY;

    for axis in 0..3 {
        let origin = ray.origin[axis];
        let dir = ray.direction[axis];
        if dir.abs() < EPSILON {
            if origin < min[axis] || origin > max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dir;
        let (near, far) = {
            let t1 = (min[axis] - origin) * inv;
            let t2 = (max[axis] - origin) * inv;
            if t1 <= t2 {
                (t1, t2)
            } else {
                (t2, t1)
            }
        };
        t_min = t_min.max(near);
        t_max = t_max.min(far);
        if t_min > t_max {
            return None;
        }
    }

    Some(t_min)
}

/// Nearest surface under a ray
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub object_id: ObjectId,
    /// Index into [`GeometryCache::records`]
    pub record: usize,
    /// Distance along the ray, metres
    pub distance: f64,
    pub point: Point3<f64>,
}

fn raycast_record(
    ray: &Ray,
    record: &GeometryRecord,
    planes: &[ClipPlane],
    best: f64,
) -> Option<(f64, Point3<f64>)> {
    // Same `t` in both frames since the direction is not renormalized
    let local = ray.transformed(&record.inverse);
    let entry = intersect_aabb(&local, &record.local_bounds.min, &record.local_bounds.max)?;
    if entry > best {
        return None;
    }

    let mut nearest: Option<(f64, Point3<f64>)> = None;
    for index in 0..record.triangle_count() {
        let Some([a, b, c]) = record.mesh.triangle(index) else {
            continue;
        };
        let Some(t) = intersect_triangle(&local, &a.cast(), &b.cast(), &c.cast()) else {
            continue;
        };
        if t >= nearest.map_or(best, |(d, _)| d) {
            continue;
        }
        let point = ray.at(t);
        if !point_visible(planes, &point) {
            continue;
        }
        nearest = Some((t, point));
    }
    nearest
}

/// Nearest visible hit, ignoring hidden fragments and clipped surfaces
pub fn raycast(ray: &Ray, cache: &GeometryCache, planes: &[ClipPlane]) -> Option<Hit> {
    let direction = ray.direction.try_normalize(EPSILON)?;
    let ray = Ray::new(ray.origin, direction);

    let mut best: Option<Hit> = None;
    for (index, record) in cache.records().iter().enumerate() {
        if !record.visible {
            continue;
        }
        let limit = best.map_or(f64::INFINITY, |h| h.distance);
        if let Some((distance, point)) = raycast_record(&ray, record, planes, limit) {
            best = Some(Hit {
                object_id: record.object_id,
                record: index,
                distance,
                point,
            });
        }
    }
    best
}

/// One row of the property panel
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PropertyEntry {
    pub name: String,
    pub value: String,
    pub unit: Option<String>,
    /// Property set the value came from; `None` for entity attributes
    pub group: Option<String>,
}

impl PropertyEntry {
    fn attribute(name: &str, value: String) -> Self {
        Self {
            name: name.to_string(),
            value,
            unit: None,
            group: None,
        }
    }
}

/// Properties of an object: Name, GlobalId, every property set entry in
/// file order, then Type
///
/// Unknown objects give an empty list.
pub fn object_properties(model: &dyn IfcModel, id: ObjectId) -> Vec<PropertyEntry> {
    let entity_id = EntityId::from(id);
    let reader = model.properties();
    let Some(type_name) = reader.type_name(entity_id) else {
        log::warn!("No properties for object #{id}: entity not found");
        return Vec::new();
    };

    let mut entries = Vec::new();
    if let Some(name) = reader.name(entity_id) {
        entries.push(PropertyEntry::attribute("Name", name));
    }
    if let Some(global_id) = reader.global_id(entity_id) {
        entries.push(PropertyEntry::attribute("GlobalId", global_id));
    }
    for pset in reader.property_sets(entity_id) {
        for property in pset.properties {
            entries.push(PropertyEntry {
                name: property.name,
                value: property.value,
                unit: property.unit,
                group: Some(pset.name.clone()),
            });
        }
    }
    entries.push(PropertyEntry::attribute("Type", type_name));
    entries
}

/// Property lookup finished off the render tick
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyResult {
    pub request: u64,
    pub object_id: ObjectId,
    pub properties: Vec<PropertyEntry>,
}

/// Current selection and its properties
///
/// Single-select: selecting clears the previous highlight first.
#[derive(Debug, Default)]
pub struct SelectionService {
    selected: Option<ObjectId>,
    properties: Vec<PropertyEntry>,
    request: u64,
}

impl SelectionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<ObjectId> {
        self.selected
    }

    /// Properties of the selection, empty until a lookup completes
    pub fn properties(&self) -> &[PropertyEntry] {
        &self.properties
    }

    /// Select whatever the ray hits first
    ///
    /// A miss leaves the selection unchanged and returns `None`.
    pub fn pick(&mut self, ray: &Ray, cache: &mut GeometryCache) -> Option<ObjectId> {
        let planes = Arc::clone(cache.clip_planes());
        let hit = raycast(ray, cache, &planes)?;
        self.select(hit.object_id, cache);
        Some(hit.object_id)
    }

    /// Make `id` the selection and tint all of its fragments
    pub fn select(&mut self, id: ObjectId, cache: &mut GeometryCache) {
        cache.clear_highlight();
        let fragments = cache.highlight(id);
        self.selected = Some(id);
        self.properties.clear();
        self.request += 1;
        log::debug!("Selected #{id} ({fragments} fragments)");
    }

    pub fn clear(&mut self, cache: &mut GeometryCache) {
        cache.clear_highlight();
        self.selected = None;
        self.properties.clear();
        self.request += 1;
    }

    /// Property lookup for the current selection
    ///
    /// The returned future owns the model and can run on any executor.
    pub fn fetch_properties(
        &self,
        model: Arc<dyn IfcModel>,
    ) -> Option<impl Future<Output = PropertyResult> + Send + 'static> {
        let object_id = self.selected?;
        let request = self.request;
        Some(async move {
            PropertyResult {
                request,
                object_id,
                properties: object_properties(model.as_ref(), object_id),
            }
        })
    }

    /// Store a finished lookup; stale results are dropped
    pub fn apply_properties(&mut self, result: PropertyResult) -> bool {
        if result.request != self.request || self.selected != Some(result.object_id) {
            log::debug!("Dropping stale properties of #{}", result.object_id);
            return false;
        }
        self.properties = result.properties;
        true
    }
}
