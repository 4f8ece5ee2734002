// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC-Lite Inspector
//!
//! Viewer core for IFC models, independent of any window system or GPU
//! backend. The host supplies a render surface and input events; this crate
//! owns everything between the file and the draw list.
//!
//! ## Overview
//!
//! - **Loading**: [`ModelLoader`] fetches and parses a model into a
//!   [`ModelHandle`], cancellable and with bounded retries
//! - **Geometry**: [`GeometryCache`] holds one [`GeometryRecord`] per placed
//!   instance, with shared mesh buffers and per-object colour
//! - **Object tree**: [`build_tree`] and [`extract_floors`]
//! - **Camera**: [`ViewportController`] with perspective and orthographic
//!   projections, locked plan/section/elevation modes and timed transitions
//! - **Selection**: [`SelectionService`] raycasts the cache and looks up
//!   properties off the render tick
//! - **Section planes**: [`ClippingManager`] publishes the enabled planes as
//!   one shared `Arc<[ClipPlane]>`
//! - **Measurement**: [`MeasurementService`]
//! - **Export**: [`export_table`] to CSV or JSON
//!
//! [`Viewer`] ties them together for a single active model.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ifc_lite_inspector::{ModelSource, Viewer};
//!
//! let mut viewer = Viewer::default();
//! let pending = viewer.begin_load(ModelSource::Bytes(bytes));
//! let outcome = futures::executor::block_on(pending);
//! viewer.finish_load(outcome)?;
//!
//! println!("{} meshes on {} floors", viewer.geometry().len(), viewer.floors().len());
//! ```

pub mod bounds;
pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod geometry;
pub mod ids;
pub mod loader;
pub mod measure;
pub mod picking;
pub mod section;
pub mod tree;
pub mod viewer;

#[cfg(test)]
mod test_support;

// Re-export main types
pub use bounds::SceneBounds;
pub use camera::{
    CameraPose, CameraState, OrthographicProjection, PerspectiveProjection, Projection,
    ProjectionKind, SavedView, ViewMode, ViewportController,
};
pub use config::{RetryPolicy, Shortcut, ViewerConfig, ViewerSettings};
pub use error::{FailureCause, FetchError, LoadError, Result};
pub use events::{EventSink, LoadProgress, LoadStage, ProgressSink, ViewerEvent};
pub use export::{export_table, ExportOutput, ExportRow, ExportTable, PropertyLookup};
pub use geometry::{extract_geometry, GeometryCache, GeometryRecord, HighlightStyle, RenderItem};
pub use ids::{NodeId, ObjectId};
pub use loader::{
    FetchedBytes, LoadOutcome, ModelFetcher, ModelHandle, ModelLoader, ModelSource, PendingLoad,
    Sleeper,
};
pub use measure::{Measurement, MeasurementService};
pub use picking::{object_properties, raycast, Hit, PropertyEntry, Ray, SelectionService};
pub use section::{ClipPlane, ClippingManager, SectionAxis, SectionPlane};
pub use tree::{build_tree, extract_floors, filter_tree, Floor, SpatialTree, TreeNode};
pub use viewer::{ClickOutcome, Viewer};
