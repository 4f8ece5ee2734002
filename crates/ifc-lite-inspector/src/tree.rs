// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Object tree and floor list
//!
//! The tree mirrors the model's spatial structure but carries its own
//! [`NodeId`]s, numbered in depth-first order from 0 on every build.

use crate::ids::{NodeId, ObjectId};
use ifc_lite_model::{SpatialNode, SpatialQuery};
use serde::Serialize;

const UNNAMED: &str = "Unnamed";
const UNKNOWN_TYPE: &str = "Unknown";

/// Node of the object tree
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub name: String,
    pub entity_type: String,
    /// Element this node stands for
    pub object_id: Option<ObjectId>,
    /// Storey elevation in metres
    pub elevation: Option<f64>,
    pub has_geometry: bool,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Depth-first, parents before children
    pub fn iter(&self) -> TreeIter<'_> {
        TreeIter { stack: vec![self] }
    }

    fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.entity_type.to_lowercase().contains(needle)
    }
}

/// Pre-order iterator over tree nodes
pub struct TreeIter<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for TreeIter<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Object tree of one loaded model
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SpatialTree {
    pub roots: Vec<TreeNode>,
}

impl SpatialTree {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeNode> {
        self.roots.iter().flat_map(TreeNode::iter)
    }

    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    pub fn find(&self, id: NodeId) -> Option<&TreeNode> {
        self.iter().find(|n| n.id == id)
    }

    /// First node linked to an object
    pub fn node_for_object(&self, id: ObjectId) -> Option<&TreeNode> {
        self.iter().find(|n| n.object_id == Some(id))
    }
}

/// Build the object tree from a model's spatial structure
///
/// Missing names and types become placeholders; a model without a
/// spatial structure yields an empty tree.
pub fn build_tree(spatial: &dyn SpatialQuery) -> SpatialTree {
    let mut next_id = 0u32;
    let roots = spatial
        .spatial_tree()
        .map(|root| vec![convert(root, &mut next_id)])
        .unwrap_or_default();
    log::debug!("Built object tree with {next_id} nodes");
    SpatialTree { roots }
}

fn convert(node: &SpatialNode, next_id: &mut u32) -> TreeNode {
    let id = NodeId(*next_id);
    *next_id += 1;

    let name = node
        .name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(UNNAMED)
        .to_string();
    let entity_type = if node.entity_type.is_empty() {
        UNKNOWN_TYPE.to_string()
    } else {
        node.entity_type.clone()
    };

    TreeNode {
        id,
        name,
        entity_type,
        object_id: Some(node.id.into()),
        elevation: node.elevation,
        has_geometry: node.has_geometry,
        children: node.children.iter().map(|c| convert(c, next_id)).collect(),
    }
}

/// Storey of the building, as listed in the floor picker
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Floor {
    pub id: NodeId,
    pub object_id: Option<ObjectId>,
    pub name: String,
    /// Metres; 0 when the file gives none
    pub elevation: f64,
}

/// Floors of the tree, lowest first
///
/// A node counts as a floor when its type mentions "storey" or "floor", or
/// its name mentions "floor" (case-insensitive).
// TODO: match on the node kind once trees from non-IFC sources carry one;
// the text match misses storeys named e.g. "Level 2" with custom types.
pub fn extract_floors(tree: &SpatialTree) -> Vec<Floor> {
    let mut floors: Vec<Floor> = tree
        .iter()
        .filter(|node| {
            let entity_type = node.entity_type.to_lowercase();
            entity_type.contains("storey")
                || entity_type.contains("floor")
                || node.name.to_lowercase().contains("floor")
        })
        .map(|node| Floor {
            id: node.id,
            object_id: node.object_id,
            name: node.name.clone(),
            elevation: node.elevation.unwrap_or(0.0),
        })
        .collect();
    floors.sort_by(|a, b| a.elevation.total_cmp(&b.elevation));
    floors
}

/// Nodes whose name or type contains `query`, with their ancestors
///
/// A matching node keeps its whole subtree. An empty query returns the
/// tree unchanged.
pub fn filter_tree(tree: &SpatialTree, query: &str) -> SpatialTree {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return tree.clone();
    }
    SpatialTree {
        roots: tree
            .roots
            .iter()
            .filter_map(|root| filter_node(root, &needle))
            .collect(),
    }
}

fn filter_node(node: &TreeNode, needle: &str) -> Option<TreeNode> {
    if node.matches(needle) {
        return Some(node.clone());
    }
    let children: Vec<TreeNode> = node
        .children
        .iter()
        .filter_map(|c| filter_node(c, needle))
        .collect();
    if children.is_empty() {
        return None;
    }
    Some(TreeNode {
        children,
        ..node.clone_shallow()
    })
}

impl TreeNode {
    fn clone_shallow(&self) -> TreeNode {
        TreeNode {
            id: self.id,
            name: self.name.clone(),
            entity_type: self.entity_type.clone(),
            object_id: self.object_id,
            elevation: self.elevation,
            has_geometry: self.has_geometry,
            children: Vec::new(),
        }
    }
}
