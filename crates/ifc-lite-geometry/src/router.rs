// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry Router - Dynamic dispatch to geometry processors
//!
//! Enumerates the placed geometry instances of a model and routes each
//! instance's representation item to the processor registered for its type.
//! Uses the `EntityResolver` trait from ifc-lite-model for entity lookup.

use crate::{
    placement::{axis2_placement_3d, object_placement, scale_translation, transformation_operator},
    Error, Mesh, Result,
};
use ifc_lite_model::{DecodedEntity, EntityId, EntityResolver, IfcType};
use nalgebra::Matrix4;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

/// Mapped items nested deeper than this are skipped
const MAX_MAPPING_DEPTH: usize = 8;

/// Geometry processor trait
///
/// Each processor handles one or more types of IFC geometry representations.
/// Processors use the `EntityResolver` trait for entity lookups, making them
/// independent of any specific parser implementation.
pub trait GeometryProcessor: Send + Sync {
    /// Process a representation item into a mesh in its local frame, in file units
    fn process(&self, entity: &DecodedEntity, resolver: &dyn EntityResolver) -> Result<Mesh>;

    /// Get supported IFC types
    fn supported_types(&self) -> Vec<IfcType>;
}

/// One placed occurrence of a representation item
///
/// `transform` maps the item's mesh into world space, with translation
/// already in metres.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryInstance {
    /// Element (product) the geometry belongs to
    pub element: EntityId,
    /// Representation item to decode
    pub item: EntityId,
    pub transform: Matrix4<f64>,
}

/// Geometry router - routes entities to processors
///
/// Decoded meshes are cached per representation item, so every occurrence
/// of a shared (mapped) item decodes once.
pub struct GeometryRouter {
    /// Registered processors by type
    processors: FxHashMap<IfcType, Arc<dyn GeometryProcessor>>,
    /// Decoded item meshes, in metres
    mesh_cache: RwLock<FxHashMap<EntityId, Arc<Mesh>>>,
    /// Unit scale factor (e.g., 0.001 for millimeters -> meters)
    unit_scale: f64,
}

impl GeometryRouter {
    /// Create new router without any processors registered
    pub fn new() -> Self {
        Self {
            processors: FxHashMap::default(),
            mesh_cache: RwLock::new(FxHashMap::default()),
            unit_scale: 1.0,
        }
    }

    /// Create router with default processors registered
    ///
    /// Registers the following processors:
    /// - `ExtrudedAreaSolidProcessor` (IfcExtrudedAreaSolid)
    /// - `TriangulatedFaceSetProcessor` (IfcTriangulatedFaceSet)
    /// - `FacetedBrepProcessor` (IfcFacetedBrep)
    pub fn with_default_processors() -> Self {
        use crate::processors::{
            ExtrudedAreaSolidProcessor, FacetedBrepProcessor, TriangulatedFaceSetProcessor,
        };

        let mut router = Self::new();
        router.register(Arc::new(ExtrudedAreaSolidProcessor::new()));
        router.register(Arc::new(TriangulatedFaceSetProcessor::new()));
        router.register(Arc::new(FacetedBrepProcessor::new()));
        router
    }

    /// Create router with default processors and specific unit scale
    pub fn with_default_processors_and_unit_scale(unit_scale: f64) -> Self {
        let mut router = Self::with_default_processors();
        router.unit_scale = unit_scale;
        router
    }

    /// Get the current unit scale factor
    pub fn unit_scale(&self) -> f64 {
        self.unit_scale
    }

    /// Register a geometry processor
    pub fn register(&mut self, processor: Arc<dyn GeometryProcessor>) {
        for ifc_type in processor.supported_types() {
            self.processors.insert(ifc_type, Arc::clone(&processor));
        }
    }

    /// Check if a type has a registered processor
    pub fn has_processor(&self, ifc_type: &IfcType) -> bool {
        self.processors.contains_key(ifc_type)
    }

    // ------------------------------------------------------------------------
    // Enumeration
    // ------------------------------------------------------------------------

    /// Every placed geometry instance in the model, in file order
    ///
    /// Products are recognised by a Representation (index 6) pointing at an
    /// IfcProductDefinitionShape. Opening elements are voids and are skipped.
    pub fn placed_instances(&self, resolver: &dyn EntityResolver) -> Vec<GeometryInstance> {
        let mut instances = Vec::new();

        for id in resolver.all_ids() {
            let Some(entity) = resolver.get(id) else {
                continue;
            };
            if entity.ifc_type == IfcType::IfcOpeningElement {
                continue;
            }
            instances.extend(self.instances(&entity, resolver));
        }

        instances
    }

    /// Placed geometry instances of one element
    ///
    /// Follows the IFC representation chain:
    /// Element -> ProductDefinitionShape -> ShapeRepresentation (Body) -> Items
    pub fn instances(
        &self,
        element: &DecodedEntity,
        resolver: &dyn EntityResolver,
    ) -> Vec<GeometryInstance> {
        let mut instances = Vec::new();

        let Some(shape) = element.get_ref(6).and_then(|id| resolver.get(id)) else {
            return instances;
        };
        if shape.ifc_type != IfcType::IfcProductDefinitionShape {
            return instances;
        }

        // ObjectPlacement (index 5)
        let mut placement = element
            .get_ref(5)
            .and_then(|id| object_placement(id, resolver))
            .unwrap_or_else(Matrix4::identity);
        scale_translation(&mut placement, self.unit_scale);

        // Representations (index 1 in IfcProductDefinitionShape)
        for rep_id in shape.get_refs(1).unwrap_or_default() {
            let Some(rep) = resolver.get(rep_id) else {
                continue;
            };
            if !is_body_representation(&rep) {
                continue;
            }
            self.collect_items(element.id, &rep, &placement, resolver, 0, &mut instances);
        }

        instances
    }

    fn collect_items(
        &self,
        element: EntityId,
        rep: &DecodedEntity,
        transform: &Matrix4<f64>,
        resolver: &dyn EntityResolver,
        depth: usize,
        out: &mut Vec<GeometryInstance>,
    ) {
        // Items (index 3 in IfcShapeRepresentation)
        for item_id in rep.get_refs(3).unwrap_or_default() {
            let Some(item) = resolver.get(item_id) else {
                continue;
            };

            if item.ifc_type != IfcType::IfcMappedItem {
                out.push(GeometryInstance {
                    element,
                    item: item_id,
                    transform: *transform,
                });
                continue;
            }

            if depth >= MAX_MAPPING_DEPTH {
                log::warn!("Mapped item #{item_id} nested too deeply, skipping");
                continue;
            }

            // IfcMappedItem(MappingSource, MappingTarget)
            // IfcRepresentationMap(MappingOrigin, MappedRepresentation)
            let Some(source) = item.get_ref(0).and_then(|id| resolver.get(id)) else {
                continue;
            };
            let Some(mapped) = source.get_ref(1).and_then(|id| resolver.get(id)) else {
                continue;
            };

            let mut origin = source
                .get_ref(0)
                .and_then(|id| axis2_placement_3d(id, resolver))
                .unwrap_or_else(Matrix4::identity);
            scale_translation(&mut origin, self.unit_scale);

            let mut target = item
                .get_ref(1)
                .and_then(|id| transformation_operator(id, resolver))
                .unwrap_or_else(Matrix4::identity);
            scale_translation(&mut target, self.unit_scale);

            let composed = transform * target * origin;
            self.collect_items(element, &mapped, &composed, resolver, depth + 1, out);
        }
    }

    // ------------------------------------------------------------------------
    // Decoding
    // ------------------------------------------------------------------------

    /// Decode the mesh of an instance's representation item, in metres
    ///
    /// The mesh stays in the item's local frame; apply `instance.transform`
    /// to place it.
    pub fn decode(
        &self,
        instance: &GeometryInstance,
        resolver: &dyn EntityResolver,
    ) -> Result<Arc<Mesh>> {
        if let Some(mesh) = self.cached(instance.item) {
            return Ok(mesh);
        }

        let item = resolver
            .get(instance.item)
            .ok_or_else(|| Error::entity_not_found(instance.item))?;
        let processor = self
            .processors
            .get(&item.ifc_type)
            .ok_or_else(|| Error::unsupported_type(item.ifc_type.to_string()))?;

        let mut mesh = processor.process(&item, resolver)?;
        if self.unit_scale != 1.0 {
            mesh.scale(self.unit_scale);
        }

        let mesh = Arc::new(mesh);
        if let Ok(mut cache) = self.mesh_cache.write() {
            cache.insert(instance.item, Arc::clone(&mesh));
        }
        Ok(mesh)
    }

    /// Decode many instances in parallel, preserving order
    pub fn decode_all(
        &self,
        instances: &[GeometryInstance],
        resolver: &dyn EntityResolver,
    ) -> Vec<Result<Arc<Mesh>>> {
        instances
            .par_iter()
            .map(|instance| self.decode(instance, resolver))
            .collect()
    }

    fn cached(&self, item: EntityId) -> Option<Arc<Mesh>> {
        self.mesh_cache.read().ok()?.get(&item).cloned()
    }

    /// Number of decoded item meshes held in the cache
    pub fn cached_mesh_count(&self) -> usize {
        self.mesh_cache.read().map(|c| c.len()).unwrap_or(0)
    }

}

impl Default for GeometryRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Body geometry only; axes, footprints and boxes are not rendered
///
/// RepresentationIdentifier (index 1) names the representation; files that
/// omit it fall back to RepresentationType (index 2).
fn is_body_representation(rep: &DecodedEntity) -> bool {
    if rep.ifc_type != IfcType::IfcShapeRepresentation {
        return false;
    }
    match rep.get_string(1) {
        Some(id) => matches!(id, "Body" | "Facetation"),
        None => !matches!(rep.get_string(2), Some("Curve2D" | "BoundingBox" | "Annotation2D")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ifc_lite_model::IfcModel;
    use ifc_lite_parser::ParsedModel;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('router.ifc','2024-01-01T00:00:00',(''),(''),'','','');
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPROJECT('0001',$,'Project',$,$,$,$,$,#2);
#2=IFCUNITASSIGNMENT((#3));
#3=IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.);
#10=IFCCARTESIANPOINT((0.,0.,0.));
#11=IFCAXIS2PLACEMENT3D(#10,$,$);
#12=IFCCARTESIANPOINT((1000.,0.,0.));
#13=IFCAXIS2PLACEMENT3D(#12,$,$);
#14=IFCLOCALPLACEMENT($,#13);
#20=IFCRECTANGLEPROFILEDEF(.AREA.,$,$,2000.,1000.);
#21=IFCDIRECTION((0.,0.,1.));
#22=IFCEXTRUDEDAREASOLID(#20,#11,#21,3000.);
#23=IFCSHAPEREPRESENTATION($,'Body','SweptSolid',(#22));
#24=IFCSHAPEREPRESENTATION($,'Axis','Curve2D',(#22));
#25=IFCPRODUCTDEFINITIONSHAPE($,$,(#23,#24));
#26=IFCWALL('0002',$,'Wall',$,$,#14,#25,$,$);
#30=IFCCARTESIANPOINT((5000.,0.,0.));
#31=IFCCARTESIANTRANSFORMATIONOPERATOR3D($,$,#30,$,$);
#32=IFCREPRESENTATIONMAP(#11,#23);
#33=IFCMAPPEDITEM(#32,#31);
#34=IFCSHAPEREPRESENTATION($,'Body','MappedRepresentation',(#33,#33));
#35=IFCPRODUCTDEFINITIONSHAPE($,$,(#34));
#36=IFCFURNITURE('0003',$,'Chair',$,$,$,#35,$,$);
#40=IFCSHAPEREPRESENTATION($,'Body','SweptSolid',(#41));
#41=IFCSPHERE(#11,500.);
#42=IFCPRODUCTDEFINITIONSHAPE($,$,(#40));
#43=IFCCOLUMN('0004',$,'Column',$,$,$,#42,$,$);
ENDSEC;
END-ISO-10303-21;
"#;

    fn model() -> ParsedModel {
        ParsedModel::parse(TEST_IFC.to_string()).unwrap()
    }

    #[test]
    fn test_router_creation() {
        let router = GeometryRouter::new();
        assert_eq!(router.unit_scale(), 1.0);
        // Empty router has no processors
        assert!(!router.has_processor(&IfcType::IfcExtrudedAreaSolid));
    }

    #[test]
    fn test_router_with_default_processors_and_unit_scale() {
        let router = GeometryRouter::with_default_processors_and_unit_scale(0.001);
        assert_eq!(router.unit_scale(), 0.001);
        assert!(router.has_processor(&IfcType::IfcExtrudedAreaSolid));
        assert!(router.has_processor(&IfcType::IfcTriangulatedFaceSet));
        assert!(router.has_processor(&IfcType::IfcFacetedBrep));
    }

    #[test]
    fn test_placed_instances_expand_mapped_items() {
        let model = model();
        let router = GeometryRouter::with_default_processors_and_unit_scale(model.unit_scale());
        let instances = router.placed_instances(model.resolver());

        // Wall body (axis skipped), two mapped chair items, one column item
        let elements: Vec<u32> = instances.iter().map(|i| i.element.0).collect();
        assert_eq!(elements, vec![26, 36, 36, 43]);

        let wall = &instances[0];
        assert_eq!(wall.item, EntityId(22));
        assert_relative_eq!(wall.transform[(0, 3)], 1.0, epsilon = 1e-9);

        let chair = &instances[1];
        assert_eq!(chair.item, EntityId(22));
        assert_relative_eq!(chair.transform[(0, 3)], 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_decode_scales_and_caches() {
        let model = model();
        let router = GeometryRouter::with_default_processors_and_unit_scale(model.unit_scale());
        let instances = router.placed_instances(model.resolver());

        let mesh = router.decode(&instances[0], model.resolver()).unwrap();
        let (min, max) = mesh.bounds().unwrap();
        assert_relative_eq!(min.x, -1.0, epsilon = 1e-5);
        assert_relative_eq!(max.z, 3.0, epsilon = 1e-5);

        // The chair shares item #22
        let shared = router.decode(&instances[1], model.resolver()).unwrap();
        assert!(Arc::ptr_eq(&mesh, &shared));
        assert_eq!(router.cached_mesh_count(), 1);
    }

    #[test]
    fn test_unsupported_item_is_an_error() {
        let model = model();
        let router = GeometryRouter::with_default_processors_and_unit_scale(model.unit_scale());
        let instances = router.placed_instances(model.resolver());

        let results = router.decode_all(&instances, model.resolver());
        assert_eq!(results.len(), 4);
        assert!(results[..3].iter().all(|r| r.is_ok()));
        assert!(matches!(results[3], Err(Error::UnsupportedType(_))));
    }

}
