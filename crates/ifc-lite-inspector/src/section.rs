// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Section planes
//!
//! [`ClippingManager`] owns the user's section planes. Every mutation
//! rebuilds the list of enabled [`ClipPlane`]s as one `Arc<[ClipPlane]>`;
//! the viewer hands that same `Arc` to the geometry cache, and every render
//! item reads it from there.
//!
//! A plane keeps the half-space behind its normal: point `p` survives when
//! `normal · p - distance <= 0`. Enabled planes combine as a conjunction.

use crate::ids::TimestampIds;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Section plane axis
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionAxis {
    X,
    Y,
    #[default]
    Z,
}

impl SectionAxis {
    pub fn unit(&self) -> Vector3<f64> {
        match self {
            SectionAxis::X => Vector3::x(),
            SectionAxis::Y => Vector3::y(),
            SectionAxis::Z => Vector3::z(),
        }
    }

    /// Plane normal, reversed when flipped
    pub fn normal(&self, flipped: bool) -> Vector3<f64> {
        if flipped {
            -self.unit()
        } else {
            self.unit()
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "x" => Some(SectionAxis::X),
            "y" => Some(SectionAxis::Y),
            "z" => Some(SectionAxis::Z),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionAxis::X => "x",
            SectionAxis::Y => "y",
            SectionAxis::Z => "z",
        }
    }
}

/// Plane equation handed to the renderer
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ClipPlane {
    pub normal: Vector3<f64>,
    pub distance: f64,
}

impl ClipPlane {
    /// Signed distance; positive values are clipped
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&p.coords) - self.distance
    }

    pub fn keeps(&self, p: &Point3<f64>) -> bool {
        self.signed_distance(p) <= 0.0
    }
}

/// True if `p` survives every plane
pub fn point_visible(planes: &[ClipPlane], p: &Point3<f64>) -> bool {
    planes.iter().all(|plane| plane.keeps(p))
}

/// A user-placed section plane
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionPlane {
    pub id: String,
    pub axis: SectionAxis,
    /// Position along the axis, metres
    pub offset: f64,
    /// Keep the positive side instead of the negative one
    pub flipped: bool,
    pub enabled: bool,
}

impl SectionPlane {
    pub fn new(id: impl Into<String>, axis: SectionAxis, offset: f64) -> Self {
        Self {
            id: id.into(),
            axis,
            offset,
            flipped: false,
            enabled: true,
        }
    }

    pub fn flipped(mut self) -> Self {
        self.flipped = true;
        self
    }

    /// The plane passes through `offset * axis`
    pub fn clip_plane(&self) -> ClipPlane {
        let normal = self.axis.normal(self.flipped);
        ClipPlane {
            normal,
            distance: self.offset * normal.dot(&self.axis.unit()),
        }
    }
}

/// Owner of the section plane list
#[derive(Debug)]
pub struct ClippingManager {
    planes: Vec<SectionPlane>,
    active: Arc<[ClipPlane]>,
    range: f64,
    ids: TimestampIds,
}

impl Default for ClippingManager {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl ClippingManager {
    /// Manager clamping offsets to `-range..=range`
    pub fn new(range: f64) -> Self {
        Self {
            planes: Vec::new(),
            active: Arc::from(Vec::new()),
            range: range.abs(),
            ids: TimestampIds::default(),
        }
    }

    pub fn planes(&self) -> &[SectionPlane] {
        &self.planes
    }

    pub fn get(&self, id: &str) -> Option<&SectionPlane> {
        self.planes.iter().find(|p| p.id == id)
    }

    /// Enabled planes, shared with every render item
    pub fn active(&self) -> &Arc<[ClipPlane]> {
        &self.active
    }

    /// True if `p` survives every enabled plane
    pub fn is_visible(&self, p: &Point3<f64>) -> bool {
        point_visible(&self.active, p)
    }

    /// Add an enabled plane at position 0; returns its id
    pub fn add_plane(&mut self, axis: SectionAxis) -> String {
        let id = self.ids.next("plane");
        self.planes.push(SectionPlane::new(id.clone(), axis, 0.0));
        self.publish();
        id
    }

    /// Insert a prepared plane, replacing one with the same id
    pub fn insert(&mut self, mut plane: SectionPlane) {
        plane.offset = self.clamp(plane.offset);
        match self.planes.iter_mut().find(|p| p.id == plane.id) {
            Some(existing) => *existing = plane,
            None => self.planes.push(plane),
        }
        self.publish();
    }

    pub fn remove_plane(&mut self, id: &str) -> bool {
        let before = self.planes.len();
        self.planes.retain(|p| p.id != id);
        let removed = self.planes.len() != before;
        if removed {
            self.publish();
        }
        removed
    }

    /// Flip a plane between enabled and disabled; returns the new state
    pub fn toggle_plane(&mut self, id: &str) -> Option<bool> {
        let enabled = self.update(id, |p| p.enabled = !p.enabled)?.enabled;
        Some(enabled)
    }

    pub fn set_offset(&mut self, id: &str, offset: f64) -> bool {
        let offset = self.clamp(offset);
        self.update(id, |p| p.offset = offset).is_some()
    }

    pub fn set_axis(&mut self, id: &str, axis: SectionAxis) -> bool {
        self.update(id, |p| p.axis = axis).is_some()
    }

    pub fn flip(&mut self, id: &str) -> bool {
        self.update(id, |p| p.flipped = !p.flipped).is_some()
    }

    pub fn clear(&mut self) {
        self.planes.clear();
        self.publish();
    }

    fn update(&mut self, id: &str, f: impl FnOnce(&mut SectionPlane)) -> Option<&SectionPlane> {
        let index = self.planes.iter().position(|p| p.id == id)?;
        f(&mut self.planes[index]);
        self.publish();
        self.planes.get(index)
    }

    fn clamp(&self, offset: f64) -> f64 {
        offset.clamp(-self.range, self.range)
    }

    fn publish(&mut self) {
        self.active = self
            .planes
            .iter()
            .filter(|p| p.enabled)
            .map(SectionPlane::clip_plane)
            .collect();
        log::debug!(
            "Section planes: {} of {} enabled",
            self.active.len(),
            self.planes.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_axis_parse() {
        assert_eq!(SectionAxis::parse("X"), Some(SectionAxis::X));
        assert_eq!(SectionAxis::parse("w"), None);
        assert_eq!(SectionAxis::Y.as_str(), "y");
        assert_eq!(SectionAxis::Z.normal(true), -Vector3::z());
    }

    #[test]
    fn test_plane_passes_through_offset() {
        let plane = SectionPlane::new("a", SectionAxis::X, 2.0).clip_plane();
        assert_relative_eq!(plane.signed_distance(&Point3::new(2.0, 5.0, 5.0)), 0.0);
        assert!(plane.keeps(&Point3::new(1.0, 0.0, 0.0)));
        assert!(!plane.keeps(&Point3::new(3.0, 0.0, 0.0)));

        let flipped = SectionPlane::new("b", SectionAxis::X, 2.0).flipped().clip_plane();
        assert_relative_eq!(flipped.signed_distance(&Point3::new(2.0, 0.0, 0.0)), 0.0);
        assert!(flipped.keeps(&Point3::new(3.0, 0.0, 0.0)));
        assert!(!flipped.keeps(&Point3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_slab_between_two_x_planes() {
        let mut manager = ClippingManager::default();
        manager.insert(SectionPlane::new("max", SectionAxis::X, 1.0));
        manager.insert(SectionPlane::new("min", SectionAxis::X, -1.0).flipped());

        for x in [-1.0, -0.5, 0.0, 0.75, 1.0] {
            assert!(manager.is_visible(&Point3::new(x, 3.0, -2.0)), "x = {x}");
        }
        for x in [-1.5, 1.01, 40.0] {
            assert!(!manager.is_visible(&Point3::new(x, 0.0, 0.0)), "x = {x}");
        }
    }

    #[test]
    fn test_disabled_and_removed_planes_do_not_clip() {
        let mut manager = ClippingManager::default();
        let id = manager.add_plane(SectionAxis::Z);
        let p = Point3::new(0.0, 0.0, 5.0);
        assert!(!manager.is_visible(&p));

        assert_eq!(manager.toggle_plane(&id), Some(false));
        assert!(manager.is_visible(&p));
        assert!(manager.active().is_empty());

        assert_eq!(manager.toggle_plane(&id), Some(true));
        assert!(manager.remove_plane(&id));
        assert!(!manager.remove_plane(&id));
        assert!(manager.is_visible(&p));
        assert_eq!(manager.toggle_plane(&id), None);
    }

    #[test]
    fn test_every_mutation_publishes_new_set() {
        let mut manager = ClippingManager::default();
        let id = manager.add_plane(SectionAxis::X);
        let before = Arc::clone(manager.active());

        assert!(manager.set_offset(&id, 250.0));
        assert_eq!(manager.get(&id).unwrap().offset, 100.0);
        assert!(!Arc::ptr_eq(&before, manager.active()));
        assert_relative_eq!(manager.active()[0].distance, 100.0);

        assert!(manager.flip(&id));
        assert_relative_eq!(manager.active()[0].normal.x, -1.0);
        assert!(manager.set_axis(&id, SectionAxis::Y));
        assert_relative_eq!(manager.active()[0].normal.y, -1.0);
    }

    #[test]
    fn test_plane_ids_unique() {
        let mut manager = ClippingManager::default();
        let a = manager.add_plane(SectionAxis::X);
        let b = manager.add_plane(SectionAxis::X);
        assert_ne!(a, b);
        assert!(a.starts_with("plane-"));
        manager.clear();
        assert!(manager.planes().is_empty());
        assert!(manager.active().is_empty());
    }
}
