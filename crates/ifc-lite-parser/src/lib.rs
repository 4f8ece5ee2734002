// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC-Lite Parser - STEP/IFC parser
//!
//! This crate provides a fast, memory-efficient parser for IFC (STEP) files.
//! It implements the traits defined in `ifc-lite-model`.
//!
//! # Features
//!
//! - **Fast tokenization** using `nom` combinators
//! - **SIMD-accelerated scanning** using `memchr`
//! - **Lazy entity decoding** - only parse entities when needed
//! - **Arc-based caching** - decoded entities are shared across threads
//! - **Header validation** - IFC2X3 and the IFC4 family are accepted
//!
//! # Example
//!
//! ```ignore
//! use ifc_lite_model::{IfcParser, IfcType};
//! use ifc_lite_parser::StepParser;
//!
//! let model = StepParser::new().parse(&bytes)?;
//! let walls = model.resolver().ids_by_type(&IfcType::IfcWall);
//! println!("Found {} walls", walls.len());
//! ```

mod header;
mod model;
mod properties;
mod resolver;
mod scanner;
mod spatial;
mod tokenizer;
mod units;

pub use header::check_schema;
pub use model::ParsedModel;
pub use properties::format_value;
pub use scanner::{EntityIndex, EntityScanner};
pub use tokenizer::{decode_step_string, parse_entity, Token};

use ifc_lite_model::{IfcModel, IfcParser, ProgressCallback, Result};
use std::sync::Arc;

/// Main STEP/IFC parser implementing `IfcParser` trait
#[derive(Default, Clone, Copy, Debug)]
pub struct StepParser;

impl StepParser {
    pub fn new() -> Self {
        Self
    }

    // Exporters occasionally write raw Latin-1 inside strings; decode lossily
    // rather than rejecting the whole file.
    fn decode(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

impl IfcParser for StepParser {
    fn parse(&self, bytes: &[u8]) -> Result<Arc<dyn IfcModel>> {
        ParsedModel::parse(Self::decode(bytes)).map(|m| Arc::new(m) as Arc<dyn IfcModel>)
    }

    fn parse_with_progress(
        &self,
        bytes: &[u8],
        on_progress: ProgressCallback,
    ) -> Result<Arc<dyn IfcModel>> {
        ParsedModel::parse_with_progress(Self::decode(bytes), |phase, percent| {
            on_progress(phase, percent)
        })
        .map(|m| Arc::new(m) as Arc<dyn IfcModel>)
    }
}

/// Quick parse function for simple use cases
pub fn parse(bytes: &[u8]) -> Result<Arc<dyn IfcModel>> {
    StepParser::new().parse(bytes)
}

/// Parse with progress reporting
pub fn parse_with_progress(
    bytes: &[u8],
    on_progress: impl Fn(&str, f32) + Send + 'static,
) -> Result<Arc<dyn IfcModel>> {
    StepParser::new().parse_with_progress(bytes, Box::new(on_progress))
}
