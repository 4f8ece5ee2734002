// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial structure as exposed by a parsed model

use crate::{EntityId, IfcType};
use serde::{Deserialize, Serialize};

/// Type of spatial structure node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpatialNodeType {
    Project,
    Site,
    Building,
    Storey,
    Space,
    /// Building element (wall, door, etc.)
    Element,
    /// IFC4x3 Facility (road, bridge, etc.)
    Facility,
    FacilityPart,
}

impl SpatialNodeType {
    /// Determine node type from IFC type
    pub fn from_ifc_type(ifc_type: &IfcType) -> Self {
        match ifc_type {
            IfcType::IfcProject => SpatialNodeType::Project,
            IfcType::IfcSite => SpatialNodeType::Site,
            IfcType::IfcBuilding => SpatialNodeType::Building,
            IfcType::IfcBuildingStorey => SpatialNodeType::Storey,
            IfcType::IfcSpace => SpatialNodeType::Space,
            IfcType::IfcFacility => SpatialNodeType::Facility,
            IfcType::IfcFacilityPart => SpatialNodeType::FacilityPart,
            _ => SpatialNodeType::Element,
        }
    }
}

/// Node in the model's native spatial hierarchy
///
/// The tree follows the decomposition relationships of the file:
/// Project → Site → Building → Storey → Elements. Name and elevation are
/// whatever the file carries; consumers decide on placeholders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialNode {
    pub id: EntityId,
    pub node_type: SpatialNodeType,
    /// Name attribute, if the entity has one
    pub name: Option<String>,
    /// STEP type name (e.g., "IFCWALL")
    pub entity_type: String,
    /// Elevation in metres (storeys only)
    pub elevation: Option<f64>,
    pub children: Vec<SpatialNode>,
    /// Whether this entity has a product representation
    pub has_geometry: bool,
}

impl SpatialNode {
    pub fn new(id: EntityId, node_type: SpatialNodeType, entity_type: impl Into<String>) -> Self {
        Self {
            id,
            node_type,
            name: None,
            entity_type: entity_type.into(),
            elevation: None,
            children: Vec::new(),
            has_geometry: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_geometry(mut self, has_geometry: bool) -> Self {
        self.has_geometry = has_geometry;
        self
    }

    pub fn add_child(&mut self, child: SpatialNode) {
        self.children.push(child);
    }

    /// Find a node by ID (recursive)
    pub fn find(&self, id: EntityId) -> Option<&SpatialNode> {
        self.iter().find(|n| n.id == id)
    }

    /// Iterate all nodes depth-first, parents before children
    pub fn iter(&self) -> SpatialNodeIter<'_> {
        SpatialNodeIter { stack: vec![self] }
    }

    /// Total node count of this subtree, including itself
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }
}

/// Iterator over spatial nodes (depth-first, pre-order)
pub struct SpatialNodeIter<'a> {
    stack: Vec<&'a SpatialNode>,
}

impl<'a> Iterator for SpatialNodeIter<'a> {
    type Item = &'a SpatialNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Reverse so the first child is visited first
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Spatial query interface
pub trait SpatialQuery: Send + Sync {
    /// Root of the spatial structure (typically IfcProject)
    fn spatial_tree(&self) -> Option<&SpatialNode>;
}
