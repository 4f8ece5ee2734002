// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC-Lite Model - Trait definitions and shared types for IFC parsing
//!
//! This crate provides the core abstractions for working with IFC (Industry
//! Foundation Classes) files. Parser backends implement the traits; the
//! geometry and inspector crates consume them without knowing which backend
//! produced the model.
//!
//! # Architecture
//!
//! - [`IfcParser`] - Entry point for turning bytes into a model
//! - [`IfcModel`] - Read-only access to a parsed IFC model (the model handle)
//! - [`EntityResolver`] - Entity lookup and reference resolution
//! - [`PropertyReader`] - Property sets and root attributes
//! - [`SpatialQuery`] - Spatial hierarchy traversal
//!
//! # Example
//!
//! ```ignore
//! use ifc_lite_model::{IfcParser, IfcModel, EntityId};
//!
//! let model = parser.parse(&bytes)?;
//! if let Some(entity) = model.resolver().get(EntityId(123)) {
//!     println!("Entity type: {}", entity.ifc_type);
//! }
//! ```

pub mod error;
pub mod properties;
pub mod resolver;
pub mod spatial;
pub mod traits;
pub mod types;

// Re-export all public types
pub use error::*;
pub use properties::*;
pub use resolver::*;
pub use spatial::*;
pub use traits::*;
pub use types::*;
