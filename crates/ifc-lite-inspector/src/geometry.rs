// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry cache
//!
//! Holds one [`GeometryRecord`] per placed geometry instance of the loaded
//! model. Mesh buffers are `Arc`-shared: every occurrence of a mapped
//! representation item points at the same [`Mesh`], while colour, transform
//! and display flags are per record.
//!
//! The active section planes live here as a single `Arc<[ClipPlane]>` that
//! every [`RenderItem`] borrows, so publishing a new plane set is one
//! assignment.

use crate::bounds::SceneBounds;
use crate::ids::ObjectId;
use crate::section::ClipPlane;
use ifc_lite_geometry::{GeometryRouter, Mesh};
use ifc_lite_model::{EntityId, IfcModel};
use nalgebra::Matrix4;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One placed mesh fragment of an object
#[derive(Clone, Debug)]
pub struct GeometryRecord {
    /// Element the fragment belongs to, as assigned by the file
    pub object_id: ObjectId,
    /// Representation item the mesh was decoded from
    pub item: EntityId,
    /// Vertex and index buffers in the item's local frame, metres
    pub mesh: Arc<Mesh>,
    /// Local to world
    pub transform: Matrix4<f64>,
    /// World to local, for ray tests
    pub inverse: Matrix4<f64>,
    /// Base colour `[r, g, b, a]`
    pub color: [f32; 4],
    pub visible: bool,
    pub highlighted: bool,
    /// Mesh bounds in the local frame
    pub local_bounds: SceneBounds,
    /// World-space bounds
    pub bounds: SceneBounds,
}

impl GeometryRecord {
    /// Build a record, or `None` for an empty mesh
    pub fn new(
        object_id: ObjectId,
        item: EntityId,
        mesh: Arc<Mesh>,
        transform: Matrix4<f64>,
    ) -> Option<Self> {
        let (min, max) = mesh.bounds()?;
        let local_bounds = SceneBounds::new(min.cast::<f64>(), max.cast::<f64>());
        let inverse = transform.try_inverse().unwrap_or_else(Matrix4::identity);
        Some(Self {
            object_id,
            item,
            mesh,
            transform,
            inverse,
            color: object_color(object_id),
            visible: true,
            highlighted: false,
            local_bounds,
            bounds: local_bounds.transformed(&transform),
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.mesh.triangle_count()
    }
}

/// Everything a renderer needs to draw one fragment
#[derive(Clone, Debug)]
pub struct RenderItem<'a> {
    pub object_id: ObjectId,
    pub mesh: &'a Arc<Mesh>,
    pub transform: &'a Matrix4<f64>,
    /// Base colour with the highlight tint already blended in
    pub color: [f32; 4],
    /// The active section planes, shared by every item
    pub clip_planes: &'a Arc<[ClipPlane]>,
}

/// Tint applied to highlighted fragments
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HighlightStyle {
    pub color: [f32; 4],
    pub intensity: f32,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            color: [0.0, 1.0, 0.0, 1.0],
            intensity: 0.3,
        }
    }
}

impl HighlightStyle {
    fn apply(&self, base: [f32; 4]) -> [f32; 4] {
        let t = self.intensity.clamp(0.0, 1.0);
        [
            base[0] + (self.color[0] - base[0]) * t,
            base[1] + (self.color[1] - base[1]) * t,
            base[2] + (self.color[2] - base[2]) * t,
            base[3],
        ]
    }
}

/// Counters from one extraction pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    /// Placed instances enumerated by the model
    pub instances: usize,
    /// Records produced
    pub records: usize,
    /// Instances that failed to decode or produced no triangles
    pub skipped: usize,
}

/// Decode every placed geometry instance of a model
///
/// A failing instance is logged and skipped; it never aborts the batch.
/// Records keep the model's enumeration order and take their object id
/// from the instance's own element reference.
pub fn extract_geometry(model: &dyn IfcModel) -> (Vec<GeometryRecord>, ExtractionStats) {
    let resolver = model.resolver();
    let router = GeometryRouter::with_default_processors_and_unit_scale(model.unit_scale());
    let instances = router.placed_instances(resolver);

    #[cfg(feature = "parallel")]
    let decoded = router.decode_all(&instances, resolver);
    #[cfg(not(feature = "parallel"))]
    let decoded: Vec<_> = instances
        .iter()
        .map(|instance| router.decode(instance, resolver))
        .collect();

    let mut stats = ExtractionStats {
        instances: instances.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(instances.len());

    for (instance, result) in instances.into_iter().zip(decoded) {
        let mesh = match result {
            Ok(mesh) => mesh,
            Err(e) => {
                log::warn!(
                    "Skipping geometry item #{} of element #{}: {e}",
                    instance.item,
                    instance.element
                );
                stats.skipped += 1;
                continue;
            }
        };
        match GeometryRecord::new(instance.element.into(), instance.item, mesh, instance.transform) {
            Some(record) => records.push(record),
            None => {
                log::warn!(
                    "Skipping geometry item #{} of element #{}: empty mesh",
                    instance.item,
                    instance.element
                );
                stats.skipped += 1;
            }
        }
    }

    stats.records = records.len();
    log::info!(
        "Extracted {} geometry records from {} instances ({} skipped, {} distinct meshes)",
        stats.records,
        stats.instances,
        stats.skipped,
        router.cached_mesh_count()
    );
    (records, stats)
}

/// Stable display colour of an object
///
/// Hue comes from a hash of the id, so the same object gets the same colour
/// on every load.
pub fn object_color(id: ObjectId) -> [f32; 4] {
    let mut hasher = FxHasher::default();
    id.hash(&mut hasher);
    let hue = (hasher.finish() % 360) as f32;
    let [r, g, b] = hsl_to_rgb(hue, 0.5, 0.6);
    [r, g, b, 1.0]
}

fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> [f32; 3] {
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let h = hue / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    [r + m, g + m, b + m]
}

/// Renderable geometry of the loaded model
#[derive(Debug)]
pub struct GeometryCache {
    records: Vec<GeometryRecord>,
    by_object: FxHashMap<ObjectId, Vec<usize>>,
    clip_planes: Arc<[ClipPlane]>,
    highlight: HighlightStyle,
    bounds: Option<SceneBounds>,
    stats: ExtractionStats,
}

impl Default for GeometryCache {
    fn default() -> Self {
        Self::new(HighlightStyle::default())
    }
}

impl GeometryCache {
    pub fn new(highlight: HighlightStyle) -> Self {
        Self {
            records: Vec::new(),
            by_object: FxHashMap::default(),
            clip_planes: Arc::from(Vec::new()),
            highlight,
            bounds: None,
            stats: ExtractionStats::default(),
        }
    }

    /// Replace the cache content with the geometry of `model`
    pub fn extract(&mut self, model: &dyn IfcModel) -> ExtractionStats {
        let (records, stats) = extract_geometry(model);
        self.replace(records);
        self.stats = stats;
        stats
    }

    /// Replace the cache content with prepared records
    pub fn replace(&mut self, records: Vec<GeometryRecord>) {
        self.records = records;
        self.reindex();
        self.stats = ExtractionStats {
            instances: self.records.len(),
            records: self.records.len(),
            skipped: 0,
        };
    }

    fn reindex(&mut self) {
        self.by_object.clear();
        for (index, record) in self.records.iter().enumerate() {
            self.by_object.entry(record.object_id).or_default().push(index);
        }
        self.bounds = self
            .records
            .iter()
            .map(|r| r.bounds)
            .reduce(|a, b| a.union(&b));
    }

    /// Drop every record; returns how many were released
    pub fn dispose(&mut self) -> usize {
        let count = self.records.len();
        self.records.clear();
        self.by_object.clear();
        self.bounds = None;
        self.stats = ExtractionStats::default();
        if count > 0 {
            log::debug!("Disposed {count} geometry records");
        }
        count
    }

    pub fn records(&self) -> &[GeometryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> ExtractionStats {
        self.stats
    }

    /// Every fragment of an object
    pub fn fragments(&self, id: ObjectId) -> impl Iterator<Item = &GeometryRecord> {
        self.by_object
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(move |&i| self.records.get(i))
    }

    fn fragments_mut(&mut self, id: ObjectId) -> impl Iterator<Item = &mut GeometryRecord> {
        let indices: FxHashSet<usize> = self
            .by_object
            .get(&id)
            .into_iter()
            .flatten()
            .copied()
            .collect();
        self.records
            .iter_mut()
            .enumerate()
            .filter(move |(i, _)| indices.contains(i))
            .map(|(_, r)| r)
    }

    /// Bounds of all geometry
    pub fn bounds(&self) -> Option<SceneBounds> {
        self.bounds
    }

    /// Bounds of every fragment of one object
    pub fn object_bounds(&self, id: ObjectId) -> Option<SceneBounds> {
        self.fragments(id).map(|r| r.bounds).reduce(|a, b| a.union(&b))
    }

    // ------------------------------------------------------------------------
    // Visibility
    // ------------------------------------------------------------------------

    pub fn hide(&mut self, id: ObjectId) {
        self.fragments_mut(id).for_each(|r| r.visible = false);
    }

    pub fn show(&mut self, id: ObjectId) {
        self.fragments_mut(id).for_each(|r| r.visible = true);
    }

    /// Show only the given objects
    pub fn isolate(&mut self, ids: &[ObjectId]) {
        let keep: FxHashSet<ObjectId> = ids.iter().copied().collect();
        for record in &mut self.records {
            record.visible = keep.contains(&record.object_id);
        }
    }

    pub fn show_all(&mut self) {
        for record in &mut self.records {
            record.visible = true;
        }
    }

    /// True if any fragment of the object is visible
    pub fn is_visible(&self, id: ObjectId) -> bool {
        self.fragments(id).any(|r| r.visible)
    }

    // ------------------------------------------------------------------------
    // Highlight
    // ------------------------------------------------------------------------

    /// Tint every fragment of an object; returns the fragment count
    pub fn highlight(&mut self, id: ObjectId) -> usize {
        let mut count = 0;
        for record in self.fragments_mut(id) {
            record.highlighted = true;
            count += 1;
        }
        count
    }

    pub fn clear_highlight(&mut self) {
        for record in &mut self.records {
            record.highlighted = false;
        }
    }

    pub fn highlighted(&self) -> impl Iterator<Item = &GeometryRecord> {
        self.records.iter().filter(|r| r.highlighted)
    }

    // ------------------------------------------------------------------------
    // Section planes
    // ------------------------------------------------------------------------

    /// Publish a new set of enabled section planes to every fragment
    pub fn set_clip_planes(&mut self, planes: Arc<[ClipPlane]>) {
        self.clip_planes = planes;
    }

    pub fn clip_planes(&self) -> &Arc<[ClipPlane]> {
        &self.clip_planes
    }

    /// Draw list: visible fragments with their effective colour
    pub fn render_items(&self) -> impl Iterator<Item = RenderItem<'_>> {
        self.records.iter().filter(|r| r.visible).map(move |r| RenderItem {
            object_id: r.object_id,
            mesh: &r.mesh,
            transform: &r.transform,
            color: if r.highlighted {
                self.highlight.apply(r.color)
            } else {
                r.color
            },
            clip_planes: &self.clip_planes,
        })
    }
}
