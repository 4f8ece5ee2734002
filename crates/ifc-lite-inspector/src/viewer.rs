// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Viewer facade
//!
//! [`Viewer`] owns the single active model and every service built on it.
//! The host drives it from its event/render loop:
//!
//! 1. [`Viewer::begin_load`] tears down the current model and returns a
//!    future to run on any executor;
//! 2. the finished [`LoadOutcome`] goes back through [`Viewer::finish_load`],
//!    which builds geometry, the object tree and the camera fit;
//! 3. [`Viewer::tick`] is called once per frame with the current time.
//!
//! Input handlers (`click`, `pointer_move`, `resize`, shortcuts) run
//! synchronously. Property lookups are handed out as futures and their
//! results applied with [`Viewer::apply_properties`].

use crate::camera::{ViewMode, ViewportController};
use crate::config::{Shortcut, ViewerConfig, ViewerSettings};
use crate::error::{LoadError, Result};
use crate::events::{EventSink, LoadProgress, LoadStage, ProgressSink, ViewerEvent};
use crate::export::{export_table, ExportOutput, ExportTable};
use crate::geometry::{GeometryCache, HighlightStyle};
use crate::ids::ObjectId;
use crate::loader::{
    LoadOutcome, ModelFetcher, ModelHandle, ModelLoader, ModelSource, PendingLoad, Sleeper,
};
use crate::measure::MeasurementService;
use crate::picking::{raycast, PropertyResult, SelectionService};
use crate::section::{ClippingManager, SectionAxis};
use crate::tree::{build_tree, extract_floors, Floor, SpatialTree};
use futures::channel::mpsc::{unbounded, UnboundedReceiver};
use futures::Future;
use ifc_lite_model::IfcModel;
use nalgebra::Point3;
use std::sync::Arc;
use std::time::Instant;

/// What a click did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Measure mode placed a point; `completed` when it closed a measurement
    Measured { completed: bool },
    Selected(ObjectId),
    /// Nothing under the cursor; selection unchanged
    Missed,
}

/// Inspection engine for one render surface
pub struct Viewer {
    config: ViewerConfig,
    settings: ViewerSettings,
    loader: ModelLoader,
    sleeper: Option<Sleeper>,
    handle: Option<ModelHandle>,
    cache: GeometryCache,
    tree: SpatialTree,
    floors: Vec<Floor>,
    camera: ViewportController,
    selection: SelectionService,
    clipping: ClippingManager,
    measurements: MeasurementService,
    events: Option<EventSink>,
    progress: Option<UnboundedReceiver<LoadProgress>>,
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        let highlight = HighlightStyle {
            color: config.highlight_color,
            intensity: config.highlight_intensity,
        };
        Self {
            settings: config.settings,
            loader: ModelLoader::new(),
            sleeper: None,
            handle: None,
            cache: GeometryCache::new(highlight),
            tree: SpatialTree::default(),
            floors: Vec::new(),
            camera: ViewportController::new(&config),
            selection: SelectionService::new(),
            clipping: ClippingManager::new(config.section_range),
            measurements: MeasurementService::new(),
            events: None,
            progress: None,
            config,
        }
    }

    /// Transport for URL sources
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ModelFetcher>) -> Self {
        self.loader.set_fetcher(fetcher);
        self
    }

    /// Async sleep used between retries of URL loads
    ///
    /// Without one, URL loads are attempted once.
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    pub fn set_event_sink(&mut self, sink: EventSink) {
        self.events = Some(sink);
    }

    fn emit(&mut self, event: ViewerEvent) {
        if let Some(sink) = &mut self.events {
            sink(&event);
        }
    }

    fn emit_stage(&mut self, progress: LoadProgress) {
        log::info!("{} ({:.0}%)", progress.message, progress.percent);
        self.emit(ViewerEvent::Progress(progress));
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn settings(&self) -> ViewerSettings {
        self.settings
    }

    pub fn model(&self) -> Option<&Arc<dyn IfcModel>> {
        self.handle.as_ref().and_then(ModelHandle::model)
    }

    pub fn is_loaded(&self) -> bool {
        self.model().is_some()
    }

    pub fn geometry(&self) -> &GeometryCache {
        &self.cache
    }

    pub fn tree(&self) -> &SpatialTree {
        &self.tree
    }

    pub fn floors(&self) -> &[Floor] {
        &self.floors
    }

    pub fn camera(&self) -> &ViewportController {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut ViewportController {
        &mut self.camera
    }

    pub fn selection(&self) -> &SelectionService {
        &self.selection
    }

    pub fn clipping(&self) -> &ClippingManager {
        &self.clipping
    }

    pub fn measurements(&self) -> &MeasurementService {
        &self.measurements
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Tear down the current model and start loading a new one
    ///
    /// URL sources are retried per the configured policy when a sleeper is
    /// set. Progress of the returned future is forwarded to the event sink
    /// on the next [`tick`](Self::tick) or [`finish_load`](Self::finish_load).
    pub fn begin_load(&mut self, source: ModelSource) -> PendingLoad {
        self.teardown();

        let (sender, receiver) = unbounded();
        self.progress = Some(receiver);
        let sink: ProgressSink = Arc::new(move |progress: &LoadProgress| {
            // The receiver is gone once the viewer moved on; nothing to report to
            let _ = sender.unbounded_send(progress.clone());
        });

        match (&self.sleeper, source.is_remote()) {
            (Some(sleeper), true) => self.loader.load_with_retry(
                source,
                Some(sink),
                self.config.retry,
                Arc::clone(sleeper),
            ),
            _ => self.loader.load(source, Some(sink)),
        }
    }

    /// Install a finished load
    ///
    /// Returns `Ok(false)` when the outcome belongs to a load that was
    /// cancelled or superseded; its model is closed and nothing else
    /// changes.
    pub fn finish_load(&mut self, outcome: LoadOutcome) -> Result<bool> {
        if outcome.generation != self.loader.generation() {
            log::debug!("Discarding result of superseded load {}", outcome.generation);
            if let Ok(mut handle) = outcome.result {
                handle.close();
            }
            return Ok(false);
        }
        self.loader.complete(outcome.generation);
        self.drain_progress();
        self.progress = None;

        let handle = match outcome.result {
            Ok(handle) => handle,
            Err(LoadError::Cancelled) => return Ok(false),
            Err(err) => {
                log::error!("Model load failed: {err} ({})", err.guidance());
                return Err(err);
            }
        };
        let Some(model) = handle.model().cloned() else {
            return Err(LoadError::Cancelled);
        };

        self.emit_stage(LoadProgress::stage(LoadStage::LoadingGeometry));
        let stats = self.cache.extract(model.as_ref());
        self.cache.set_clip_planes(Arc::clone(self.clipping.active()));
        self.emit_stage(
            LoadProgress::stage(LoadStage::LoadingGeometry).with_geometry_count(stats.records),
        );

        self.emit_stage(LoadProgress::stage(LoadStage::BuildingTree));
        self.tree = build_tree(model.spatial());
        self.floors = extract_floors(&self.tree);

        self.emit_stage(LoadProgress::stage(LoadStage::Finalizing));
        self.camera.set_view_mode(ViewMode::Free);
        if let Some(bounds) = self.cache.bounds() {
            self.camera.fit_to_bounds(&bounds);
        }
        self.handle = Some(handle);

        self.emit_stage(LoadProgress::stage(LoadStage::Completed).with_geometry_count(stats.records));
        let floor_count = self.floors.len();
        self.emit(ViewerEvent::ModelLoaded {
            geometry_count: stats.records,
            floor_count,
        });
        Ok(true)
    }

    /// Release the current model and everything derived from it
    ///
    /// Order: pending load, camera transition, measurements, selection,
    /// geometry, then the model handle. Section planes are viewer state
    /// and survive.
    pub fn teardown(&mut self) {
        self.loader.cancel();
        self.progress = None;
        self.camera.cancel_animation();

        let had_measurements = !self.measurements.measurements().is_empty();
        self.measurements.dispose();
        if had_measurements {
            self.emit(ViewerEvent::MeasurementsChanged {
                measurements: Vec::new(),
            });
        }

        if self.selection.selected().is_some() {
            self.selection.clear(&mut self.cache);
            self.emit(ViewerEvent::SelectionChanged {
                object_id: None,
                properties: Vec::new(),
            });
        }

        self.cache.dispose();
        self.tree = SpatialTree::default();
        self.floors.clear();

        if let Some(mut handle) = self.handle.take() {
            if handle.close() {
                log::info!("Closed model ({} bytes)", handle.byte_len());
                self.emit(ViewerEvent::ModelClosed);
            }
        }
    }

    /// Per-frame update; returns true when the camera moved
    pub fn tick(&mut self, now: Instant) -> bool {
        self.drain_progress();
        self.camera.tick(now)
    }

    fn drain_progress(&mut self) {
        let mut pending = Vec::new();
        if let Some(receiver) = &mut self.progress {
            while let Ok(progress) = receiver.try_recv() {
                pending.push(progress);
            }
        }
        for progress in pending {
            self.emit(ViewerEvent::Progress(progress));
        }
    }

    // ------------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------------

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.resize(width, height);
    }

    fn surface_point(&self, x: f64, y: f64) -> Option<(ObjectId, Point3<f64>)> {
        let ray = self.camera.ray_from_screen(x, y)?;
        let hit = raycast(&ray, &self.cache, self.cache.clip_planes())?;
        Some((hit.object_id, hit.point))
    }

    /// Route a click: measure mode first, then selection
    pub fn click(&mut self, x: f64, y: f64) -> ClickOutcome {
        if self.measurements.is_active() {
            let Some((_, point)) = self.surface_point(x, y) else {
                return ClickOutcome::Missed;
            };
            let completed = self.measurements.add_point(point);
            if completed {
                self.emit_measurements();
            }
            return ClickOutcome::Measured { completed };
        }

        let Some(ray) = self.camera.ray_from_screen(x, y) else {
            return ClickOutcome::Missed;
        };
        match self.selection.pick(&ray, &mut self.cache) {
            Some(id) => {
                self.emit_selection();
                ClickOutcome::Selected(id)
            }
            None => ClickOutcome::Missed,
        }
    }

    /// Update the measurement preview under the cursor
    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if !self.measurements.is_active() || self.measurements.pending_start().is_none() {
            return;
        }
        if let Some((_, point)) = self.surface_point(x, y) {
            self.measurements.update_preview(point);
        }
    }

    /// Apply a keyboard shortcut; returns false for unmapped keys
    pub fn handle_shortcut(&mut self, key: &str) -> bool {
        let Some(shortcut) = Shortcut::from_key(key) else {
            return false;
        };
        match shortcut {
            Shortcut::View3d => self.camera.set_view_mode(ViewMode::Free),
            Shortcut::ViewPlan => self.camera.set_view_mode(ViewMode::Plan),
            Shortcut::ViewSection => self.camera.set_view_mode(ViewMode::Section),
            Shortcut::ViewElevation => self.camera.set_view_mode(ViewMode::Elevation),
            Shortcut::ResetView => self.camera.reset(),
            Shortcut::ToggleGrid => {
                self.toggle_grid();
            }
            Shortcut::ToggleAxes => {
                self.toggle_axes();
            }
        }
        true
    }

    pub fn toggle_grid(&mut self) -> bool {
        self.settings.show_grid = !self.settings.show_grid;
        self.settings.show_grid
    }

    pub fn toggle_axes(&mut self) -> bool {
        self.settings.show_axes = !self.settings.show_axes;
        self.settings.show_axes
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    fn emit_selection(&mut self) {
        let event = ViewerEvent::SelectionChanged {
            object_id: self.selection.selected(),
            properties: self.selection.properties().to_vec(),
        };
        self.emit(event);
    }

    /// Select an object, e.g. from the tree panel
    pub fn select(&mut self, id: ObjectId) {
        self.selection.select(id, &mut self.cache);
        self.emit_selection();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear(&mut self.cache);
        self.emit_selection();
    }

    /// Property lookup for the current selection, to run off the render tick
    pub fn property_request(&self) -> Option<impl Future<Output = PropertyResult> + Send + 'static> {
        let model = Arc::clone(self.model()?);
        self.selection.fetch_properties(model)
    }

    /// Apply a finished property lookup; stale results are dropped
    pub fn apply_properties(&mut self, result: PropertyResult) -> bool {
        let applied = self.selection.apply_properties(result);
        if applied {
            self.emit_selection();
        }
        applied
    }

    // ------------------------------------------------------------------------
    // Visibility and focus
    // ------------------------------------------------------------------------

    pub fn hide(&mut self, id: ObjectId) {
        self.cache.hide(id);
    }

    pub fn show(&mut self, id: ObjectId) {
        self.cache.show(id);
    }

    pub fn isolate(&mut self, ids: &[ObjectId]) {
        self.cache.isolate(ids);
    }

    pub fn show_all(&mut self) {
        self.cache.show_all();
    }

    /// Animate to frame every fragment of an object
    pub fn focus_object(&mut self, id: ObjectId, now: Instant) -> bool {
        let Some(bounds) = self.cache.object_bounds(id) else {
            return false;
        };
        self.camera.focus_on_bounds(&bounds, now);
        true
    }

    /// Animate to look down on the floor at `index` of [`floors`](Self::floors)
    pub fn focus_floor(&mut self, index: usize, now: Instant) -> bool {
        let Some(elevation) = self.floors.get(index).map(|f| f.elevation) else {
            return false;
        };
        self.camera.focus_floor(elevation, now)
    }

    // ------------------------------------------------------------------------
    // Section planes
    // ------------------------------------------------------------------------

    /// Mutate the plane set and publish the result to the geometry
    fn edit_planes<R>(&mut self, edit: impl FnOnce(&mut ClippingManager) -> R) -> R {
        let result = edit(&mut self.clipping);
        self.cache.set_clip_planes(Arc::clone(self.clipping.active()));
        result
    }

    pub fn add_section_plane(&mut self, axis: SectionAxis) -> String {
        self.edit_planes(|c| c.add_plane(axis))
    }

    pub fn remove_section_plane(&mut self, id: &str) -> bool {
        self.edit_planes(|c| c.remove_plane(id))
    }

    pub fn toggle_section_plane(&mut self, id: &str) -> Option<bool> {
        self.edit_planes(|c| c.toggle_plane(id))
    }

    pub fn set_section_offset(&mut self, id: &str, offset: f64) -> bool {
        self.edit_planes(|c| c.set_offset(id, offset))
    }

    pub fn set_section_axis(&mut self, id: &str, axis: SectionAxis) -> bool {
        self.edit_planes(|c| c.set_axis(id, axis))
    }

    pub fn flip_section_plane(&mut self, id: &str) -> bool {
        self.edit_planes(|c| c.flip(id))
    }

    pub fn clear_section_planes(&mut self) {
        self.edit_planes(ClippingManager::clear)
    }

    // ------------------------------------------------------------------------
    // Measurement
    // ------------------------------------------------------------------------

    fn emit_measurements(&mut self) {
        let measurements = self.measurements.measurements().to_vec();
        self.emit(ViewerEvent::MeasurementsChanged { measurements });
    }

    pub fn enter_measurement_mode(&mut self) {
        self.measurements.enter_mode();
    }

    pub fn exit_measurement_mode(&mut self) {
        self.measurements.exit_mode();
    }

    pub fn remove_measurement(&mut self, id: &str) -> bool {
        let removed = self.measurements.remove(id);
        if removed {
            self.emit_measurements();
        }
        removed
    }

    pub fn clear_measurements(&mut self) {
        self.measurements.clear_all();
        self.emit_measurements();
    }

    // ------------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------------

    /// Table of the loaded model; `None` without a model
    pub fn export_table(&self) -> Option<ExportTable> {
        let model = self.model()?;
        Some(export_table(&self.tree, model.as_ref()))
    }

    pub fn export_csv(&self) -> Option<ExportOutput> {
        self.export_table().map(|t| t.to_csv())
    }

    pub fn export_json(&self) -> Option<serde_json::Result<ExportOutput>> {
        self.export_table().map(|t| t.to_json())
    }
}
