// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ParsedModel - Main IFC model implementation

use crate::header::parse_header;
use crate::properties::PropertyReaderImpl;
use crate::resolver::ResolverImpl;
use crate::scanner::EntityScanner;
use crate::spatial::SpatialQueryImpl;
use crate::units::extract_unit_scale;

use ifc_lite_model::{
    EntityResolver, IfcModel, ModelMetadata, ParseError, PropertyReader, Result, SpatialQuery,
};
use memchr::memmem;
use std::sync::Arc;

/// Parsed IFC model implementing the `IfcModel` trait
pub struct ParsedModel {
    resolver: Arc<ResolverImpl>,
    properties: PropertyReaderImpl,
    spatial: SpatialQueryImpl,
    /// Unit scale (file units to metres)
    unit_scale: f64,
    metadata: ModelMetadata,
}

impl ParsedModel {
    /// Parse IFC content and create a model
    pub fn parse(content: String) -> Result<Self> {
        Self::parse_with_progress(content, |_, _| {})
    }

    /// Parse with progress reporting
    ///
    /// Fails with `InvalidFormat` for content that is not a complete STEP
    /// exchange file and with `UnsupportedSchema` for non-IFC schemas.
    pub fn parse_with_progress(
        content: String,
        on_progress: impl Fn(&str, f32),
    ) -> Result<Self> {
        on_progress("Reading header", 0.0);
        let metadata = parse_header(&content)?;

        on_progress("Scanning entities", 10.0);
        let index = EntityScanner::build_index(&content)
            .ok_or_else(|| ParseError::format("missing DATA section"))?;

        if index.truncated || memmem::rfind(content.as_bytes(), b"END-ISO-10303-21").is_none() {
            return Err(ParseError::format("file is truncated"));
        }
        if index.is_empty() {
            return Err(ParseError::format("DATA section contains no entities"));
        }

        on_progress("Indexing types", 40.0);
        let resolver = Arc::new(ResolverImpl::new(content, index));

        on_progress("Extracting units", 50.0);
        let unit_scale = extract_unit_scale(resolver.as_ref());

        on_progress("Building property index", 60.0);
        let properties = PropertyReaderImpl::new(resolver.clone());

        on_progress("Building spatial structure", 70.0);
        let spatial = SpatialQueryImpl::build(resolver.as_ref(), unit_scale);

        on_progress("Complete", 100.0);

        Ok(Self {
            resolver,
            properties,
            spatial,
            unit_scale,
            metadata,
        })
    }
}

impl IfcModel for ParsedModel {
    fn resolver(&self) -> &dyn EntityResolver {
        self.resolver.as_ref()
    }

    fn properties(&self) -> &dyn PropertyReader {
        &self.properties
    }

    fn spatial(&self) -> &dyn SpatialQuery {
        &self.spatial
    }

    fn unit_scale(&self) -> f64 {
        self.unit_scale
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_lite_model::{EntityId, IfcType};
    use std::sync::Mutex;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('test.ifc','2024-01-01T00:00:00',('Author'),('Org'),'Preprocessor','App','');
FILE_SCHEMA(('IFC2X3'));
ENDSEC;
DATA;
#1=IFCPROJECT('guid',$,'Test Project',$,$,$,$,$,#2);
#2=IFCUNITASSIGNMENT((#3));
#3=IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.);
#4=IFCSITE('guid2',$,'Site',$,$,$,$,$,$,$,$,$,$,$);
#5=IFCRELAGGREGATES('guid3',$,$,$,#1,(#4));
#6=IFCBUILDING('guid4',$,'Building',$,$,$,$,$,$,$,$,$);
#7=IFCRELAGGREGATES('guid5',$,$,$,#4,(#6));
#8=IFCBUILDINGSTOREY('guid6',$,'Ground Floor',$,$,$,$,$,.ELEMENT.,0.0);
#9=IFCRELAGGREGATES('guid7',$,$,$,#6,(#8));
#10=IFCWALL('guid8',$,'Wall 1',$,$,$,$,$);
#11=IFCRELCONTAINEDINSPATIALSTRUCTURE('guid9',$,$,$,(#10),#8);
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_parse_model() {
        let model = ParsedModel::parse(TEST_IFC.to_string()).unwrap();

        assert_eq!(model.metadata().schema_version, "IFC2X3");
        assert_eq!(model.metadata().file_name, Some("test.ifc".to_string()));

        // Millimetres -> metres
        assert!((model.unit_scale() - 0.001).abs() < 1e-10);

        assert_eq!(model.resolver().ids_by_type(&IfcType::IfcWall).len(), 1);
        assert_eq!(model.resolver().entity_count(), 11);

        let project = model.spatial().spatial_tree().unwrap();
        assert_eq!(project.name.as_deref(), Some("Test Project"));
        assert_eq!(project.node_count(), 5);
        assert!(project.find(EntityId(10)).is_some());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let seen = Mutex::new(Vec::new());
        ParsedModel::parse_with_progress(TEST_IFC.to_string(), |_, p| {
            seen.lock().unwrap().push(p);
        })
        .unwrap();

        let seen = seen.into_inner().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last().copied(), Some(100.0));
    }

    #[test]
    fn test_truncated_file() {
        let cut = &TEST_IFC[..TEST_IFC.find("#10=").unwrap() + 12];
        let err = ParsedModel::parse(cut.to_string()).err().unwrap();
        assert!(matches!(err, ParseError::InvalidFormat(_)));
    }

    #[test]
    fn test_empty_data_section() {
        let content = TEST_IFC
            .lines()
            .filter(|l| !l.starts_with('#'))
            .collect::<Vec<_>>()
            .join("\n");
        let err = ParsedModel::parse(content).err().unwrap();
        assert!(matches!(err, ParseError::InvalidFormat(_)));
    }

    #[test]
    fn test_unsupported_schema() {
        let content = TEST_IFC.replace("IFC2X3", "CONFIG_CONTROL_DESIGN");
        let err = ParsedModel::parse(content).err().unwrap();
        assert!(matches!(err, ParseError::UnsupportedSchema(_)));
    }
}
