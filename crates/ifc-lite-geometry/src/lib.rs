// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC-Lite Geometry Processing (Trait-Based)
//!
//! Turns the placed geometry of an IFC model into triangle meshes. This
//! crate uses the `EntityResolver` trait from `ifc-lite-model` for entity
//! lookup, making it independent of any specific parser implementation.
//!
//! ## Overview
//!
//! - **Enumeration**: [`GeometryRouter::placed_instances`] walks every product's
//!   Body representation, expanding mapped items, into [`GeometryInstance`]s
//! - **Decoding**: [`GeometryRouter::decode`] dispatches an instance's item to
//!   a [`GeometryProcessor`] and caches the mesh per item
//! - **Profiles**: rectangle, circle and arbitrary curves, with holes
//! - **Triangulation**: polygon triangulation with hole support via earcutr
//!
//! Meshes come out in metres, in the item's local frame; the instance
//! transform places them in the world.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ifc_lite_geometry::{extrude_profile, Profile2D, Vector3};
//!
//! let profile = Profile2D::rectangle(2.0, 1.0);
//! let mesh = extrude_profile(&profile, 3.0, Vector3::z())?;
//!
//! println!("Generated {} triangles", mesh.triangle_count());
//! ```

pub mod error;
pub mod extrusion;
pub mod mesh;
pub mod placement;
pub mod processors;
pub mod profile;
pub mod router;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3};

// Re-export main types
pub use error::{Error, Result};
pub use extrusion::extrude_profile;
pub use mesh::Mesh;
pub use profile::{calculate_circle_segments, Profile2D, Triangulation};
pub use router::{GeometryInstance, GeometryProcessor, GeometryRouter};
pub use triangulation::{
    calculate_polygon_normal, project_to_2d, triangulate_polygon, triangulate_polygon_with_holes,
};

// Re-export processors
pub use processors::{
    ExtrudedAreaSolidProcessor, FacetedBrepProcessor, TriangulatedFaceSetProcessor,
};
