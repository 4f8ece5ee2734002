// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core traits for IFC parsing
//!
//! These traits define the main abstractions for working with IFC data.

use crate::{EntityResolver, ModelMetadata, PropertyReader, Result, SpatialQuery};
use std::sync::Arc;

/// Progress callback type for parsing operations
///
/// Receives a phase name and a percentage in `0.0..=100.0`.
pub type ProgressCallback = Box<dyn Fn(&str, f32) + Send>;

/// Main parsing interface - entry point for parsing IFC content
///
/// # Example
///
/// ```ignore
/// use ifc_lite_model::{IfcParser, IfcModel};
///
/// let parser: Box<dyn IfcParser> = get_parser();
/// let model = parser.parse(&bytes)?;
/// println!("Schema: {}", model.metadata().schema_version);
/// ```
pub trait IfcParser: Send + Sync {
    /// Parse raw file bytes into a model
    fn parse(&self, bytes: &[u8]) -> Result<Arc<dyn IfcModel>>;

    /// Parse with progress reporting
    fn parse_with_progress(
        &self,
        bytes: &[u8],
        on_progress: ProgressCallback,
    ) -> Result<Arc<dyn IfcModel>>;
}

/// Core model interface - read-only access to a parsed IFC model
///
/// The model is thread-safe (`Send + Sync`) so geometry extraction can run
/// in parallel and the handle can cross an async boundary.
pub trait IfcModel: Send + Sync {
    /// Entity resolver for lookups and reference resolution
    fn resolver(&self) -> &dyn EntityResolver;

    /// Property reader for property sets and root attributes
    fn properties(&self) -> &dyn PropertyReader;

    /// Spatial hierarchy (Project → Site → Building → Storey → Elements)
    fn spatial(&self) -> &dyn SpatialQuery;

    /// Unit scale factor (file length units to metres)
    ///
    /// - 1.0 for metres
    /// - 0.001 for millimetres
    /// - 0.3048 for feet
    fn unit_scale(&self) -> f64;

    /// File metadata (schema version, originating system, etc.)
    fn metadata(&self) -> &ModelMetadata;
}
