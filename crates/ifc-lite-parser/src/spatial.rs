// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SpatialQuery trait implementation

use ifc_lite_model::{
    DecodedEntity, EntityId, EntityResolver, IfcType, SpatialNode, SpatialNodeType, SpatialQuery,
};
use rustc_hash::{FxHashMap, FxHashSet};

/// Spatial structure built once at load time
pub struct SpatialQueryImpl {
    tree: Option<SpatialNode>,
}

impl SpatialQueryImpl {
    /// Build the hierarchy from the first IfcProject
    ///
    /// Storey elevations are converted to metres with `unit_scale`.
    pub fn build(resolver: &dyn EntityResolver, unit_scale: f64) -> Self {
        let tree = SpatialBuilder::new(resolver, unit_scale).build();
        Self { tree }
    }

    pub fn empty() -> Self {
        Self { tree: None }
    }
}

impl SpatialQuery for SpatialQueryImpl {
    fn spatial_tree(&self) -> Option<&SpatialNode> {
        self.tree.as_ref()
    }
}

/// Helper for building the spatial tree
///
/// Relationship tables are gathered in one pass so that each node's
/// children are a map lookup instead of a scan over every relationship.
struct SpatialBuilder<'a> {
    resolver: &'a dyn EntityResolver,
    unit_scale: f64,
    /// IfcRelAggregates: RelatingObject -> RelatedObjects
    aggregates: FxHashMap<EntityId, Vec<EntityId>>,
    /// IfcRelContainedInSpatialStructure: RelatingStructure -> RelatedElements
    contains: FxHashMap<EntityId, Vec<EntityId>>,
    visited: FxHashSet<EntityId>,
}

impl<'a> SpatialBuilder<'a> {
    fn new(resolver: &'a dyn EntityResolver, unit_scale: f64) -> Self {
        let mut aggregates: FxHashMap<EntityId, Vec<EntityId>> = FxHashMap::default();
        for rel in resolver.entities_by_type(&IfcType::IfcRelAggregates) {
            // RelatingObject at index 4, RelatedObjects at index 5
            if let (Some(parent), Some(children)) = (rel.get_ref(4), rel.get_refs(5)) {
                aggregates.entry(parent).or_default().extend(children);
            }
        }

        let mut contains: FxHashMap<EntityId, Vec<EntityId>> = FxHashMap::default();
        for rel in resolver.entities_by_type(&IfcType::IfcRelContainedInSpatialStructure) {
            // RelatedElements at index 4, RelatingStructure at index 5
            if let (Some(elements), Some(structure)) = (rel.get_refs(4), rel.get_ref(5)) {
                contains.entry(structure).or_default().extend(elements);
            }
        }

        Self {
            resolver,
            unit_scale,
            aggregates,
            contains,
            visited: FxHashSet::default(),
        }
    }

    fn build(&mut self) -> Option<SpatialNode> {
        let project_id = self
            .resolver
            .ids_by_type(&IfcType::IfcProject)
            .into_iter()
            .next()?;
        let project = self.resolver.get(project_id)?;
        Some(self.build_node(&project))
    }

    fn build_node(&mut self, entity: &DecodedEntity) -> SpatialNode {
        self.visited.insert(entity.id);

        let mut node = self.create_node(entity);

        // Decomposition first, then contained elements
        let mut child_ids = self.aggregates.get(&entity.id).cloned().unwrap_or_default();
        if let Some(contained) = self.contains.get(&entity.id) {
            child_ids.extend(contained.iter().copied());
        }

        for child_id in child_ids {
            if self.visited.contains(&child_id) {
                continue;
            }
            if let Some(child) = self.resolver.get(child_id) {
                let child_node = self.build_node(&child);
                node.add_child(child_node);
            }
        }

        node
    }

    fn create_node(&self, entity: &DecodedEntity) -> SpatialNode {
        let node_type = SpatialNodeType::from_ifc_type(&entity.ifc_type);

        // Every IfcProduct carries Representation at index 6; IfcProject has a list there
        let mut node = SpatialNode::new(entity.id, node_type, entity.ifc_type.name())
            .with_geometry(entity.get_ref(6).is_some());

        if let Some(name) = entity.get_string(2) {
            node = node.with_name(name);
        }

        if entity.ifc_type == IfcType::IfcBuildingStorey {
            if let Some(elevation) = entity.get_float(9) {
                node = node.with_elevation(elevation * self.unit_scale);
            }
        }

        node
    }
}
