// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tabular export of the object tree
//!
//! One row per distinct object, in depth-first tree order. Columns are
//! `ExpressID, Name, Type, GlobalId` followed by the sorted union of every
//! property name seen; an object without a given property gets an empty
//! cell.

use crate::ids::ObjectId;
use crate::picking::{object_properties, PropertyEntry};
use crate::tree::{SpatialTree, TreeNode};
use ifc_lite_model::IfcModel;
use rustc_hash::FxHashSet;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::BTreeSet;

const FIXED_COLUMNS: [&str; 4] = ["ExpressID", "Name", "Type", "GlobalId"];
const GLOBAL_ID: &str = "GlobalId";
const UTF8_BOM: &str = "\u{feff}";

/// Source of per-object properties for the export
pub trait PropertyLookup {
    /// Attribute and property set entries of an object; empty when unknown
    fn lookup(&self, id: ObjectId) -> Vec<PropertyEntry>;
}

impl PropertyLookup for dyn IfcModel {
    fn lookup(&self, id: ObjectId) -> Vec<PropertyEntry> {
        object_properties(self, id)
    }
}

/// One exported object
#[derive(Clone, Debug, PartialEq)]
pub struct ExportRow {
    pub object_id: ObjectId,
    pub name: String,
    pub entity_type: String,
    pub global_id: Option<String>,
    /// Property set entries in source order; the first of a repeated name wins
    pub properties: Vec<(String, String)>,
}

impl ExportRow {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn csv_cells(&self, columns: &[String]) -> Vec<String> {
        let mut cells = vec![
            self.object_id.to_string(),
            csv_field(&self.name),
            csv_field(&self.entity_type),
            csv_field(self.global_id.as_deref().unwrap_or_default()),
        ];
        cells.extend(
            columns
                .iter()
                .map(|c| csv_field(self.property(c).unwrap_or_default())),
        );
        cells
    }
}

/// Rows plus the property column set
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExportTable {
    /// Property columns, sorted; the fixed columns are not included
    pub columns: Vec<String>,
    pub rows: Vec<ExportRow>,
}

/// Walk the tree depth-first and collect one row per distinct object
pub fn export_table(tree: &SpatialTree, lookup: &(impl PropertyLookup + ?Sized)) -> ExportTable {
    let mut visited = FxHashSet::default();
    let mut rows = Vec::new();
    for node in tree.iter() {
        if let Some(row) = export_row(node, lookup, &mut visited) {
            rows.push(row);
        }
    }

    let columns: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.properties.iter().map(|(name, _)| name.as_str()))
        .collect();
    let columns = columns.into_iter().map(str::to_string).collect();

    log::info!("Exported {} objects", rows.len());
    ExportTable { columns, rows }
}

fn export_row(
    node: &TreeNode,
    lookup: &(impl PropertyLookup + ?Sized),
    visited: &mut FxHashSet<ObjectId>,
) -> Option<ExportRow> {
    let object_id = node.object_id?;
    if !visited.insert(object_id) {
        return None;
    }

    let mut global_id = None;
    let mut properties: Vec<(String, String)> = Vec::new();
    for entry in lookup.lookup(object_id) {
        match entry.group {
            None if entry.name == GLOBAL_ID => global_id = Some(entry.value),
            None => {}
            Some(_) => {
                if !properties.iter().any(|(name, _)| *name == entry.name) {
                    properties.push((entry.name, entry.value));
                }
            }
        }
    }

    Some(ExportRow {
        object_id,
        name: node.name.clone(),
        entity_type: node.entity_type.clone(),
        global_id,
        properties,
    })
}

/// Encoded export ready for download
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub file_name: &'static str,
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl ExportTable {
    /// Header line: fixed columns, then property columns
    pub fn header(&self) -> Vec<&str> {
        FIXED_COLUMNS
            .into_iter()
            .chain(self.columns.iter().map(String::as_str))
            .collect()
    }

    /// UTF-8 CSV with a byte order mark
    pub fn to_csv(&self) -> ExportOutput {
        let mut out = String::from(UTF8_BOM);
        let header: Vec<String> = self.header().into_iter().map(csv_field).collect();
        out.push_str(&header.join(","));
        for row in &self.rows {
            out.push('\n');
            out.push_str(&row.csv_cells(&self.columns).join(","));
        }
        ExportOutput {
            bytes: out.into_bytes(),
            mime_type: "text/csv;charset=utf-8",
            file_name: "ifc-export.csv",
        }
    }

    /// JSON array of row objects, keys in column order
    pub fn to_json(&self) -> serde_json::Result<ExportOutput> {
        Ok(ExportOutput {
            bytes: serde_json::to_vec_pretty(self)?,
            mime_type: "application/json",
            file_name: "ifc-export.json",
        })
    }
}

impl Serialize for ExportTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&RowObject {
                row,
                columns: &self.columns,
            })?;
        }
        seq.end()
    }
}

struct RowObject<'a> {
    row: &'a ExportRow,
    columns: &'a [String],
}

impl Serialize for RowObject<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FIXED_COLUMNS.len() + self.columns.len()))?;
        map.serialize_entry("ExpressID", &self.row.object_id.0)?;
        map.serialize_entry("Name", &self.row.name)?;
        map.serialize_entry("Type", &self.row.entity_type)?;
        map.serialize_entry(GLOBAL_ID, &self.row.global_id)?;
        for column in self.columns {
            map.serialize_entry(column, self.row.property(column).unwrap_or_default())?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeId;
    use crate::test_support;
    use crate::tree::build_tree;

    fn pset_entry(name: &str, value: &str) -> PropertyEntry {
        PropertyEntry {
            name: name.to_string(),
            value: value.to_string(),
            unit: None,
            group: Some("Pset_Test".to_string()),
        }
    }

    fn leaf(id: u32, object: u32, name: &str) -> TreeNode {
        TreeNode {
            id: NodeId(id),
            name: name.to_string(),
            entity_type: "IFCWALL".to_string(),
            object_id: Some(ObjectId(object)),
            elevation: None,
            has_geometry: true,
            children: Vec::new(),
        }
    }

    /// Fixed answers per object id
    struct StaticLookup(Vec<(u32, Vec<PropertyEntry>)>);

    impl PropertyLookup for StaticLookup {
        fn lookup(&self, id: ObjectId) -> Vec<PropertyEntry> {
            self.0
                .iter()
                .find(|(object, _)| *object == id.0)
                .map(|(_, entries)| entries.clone())
                .unwrap_or_default()
        }
    }

    fn fixture_table() -> ExportTable {
        let model = test_support::model();
        let tree = build_tree(model.spatial());
        export_table(&tree, model.as_ref())
    }

    #[test]
    fn test_rows_follow_tree_order() {
        let table = fixture_table();
        let ids: Vec<u32> = table.rows.iter().map(|r| r.object_id.0).collect();
        assert_eq!(ids, vec![1, 10, 11, 12, 33, 34, 35, 36, 13, 30, 31, 32]);
        assert_eq!(
            table.columns,
            vec!["FireRating", "IsExternal", "LoadBearing"]
        );

        let wall = table.rows.iter().find(|r| r.object_id == ObjectId(30)).unwrap();
        assert_eq!(wall.global_id.as_deref(), Some("2O2Fr$t4X7Zf8NOew3FLOH"));
        assert_eq!(wall.property("FireRating"), Some("REI 60"));
    }

    #[test]
    fn test_repeated_objects_exported_once() {
        let mut root = leaf(0, 1, "root");
        let mut branch = leaf(1, 2, "branch");
        branch.children.push(leaf(2, 3, "shared"));
        root.children.push(branch);
        root.children.push(leaf(3, 3, "shared again"));
        let tree = SpatialTree { roots: vec![root] };

        let table = export_table(&tree, &StaticLookup(Vec::new()));
        let names: Vec<&str> = table.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["root", "branch", "shared"]);
    }

    #[test]
    fn test_missing_properties_are_empty_cells() {
        let mut root = leaf(0, 1, "a");
        root.children.push(leaf(1, 2, "b"));
        let tree = SpatialTree { roots: vec![root] };
        let lookup = StaticLookup(vec![
            (1, vec![pset_entry("Width", "0.2")]),
            (2, vec![pset_entry("Height", "3")]),
        ]);

        let table = export_table(&tree, &lookup);
        assert_eq!(table.columns, vec!["Height", "Width"]);
        let csv = String::from_utf8(table.to_csv().bytes).unwrap();
        let lines: Vec<&str> = csv.trim_start_matches(UTF8_BOM).lines().collect();
        assert_eq!(lines[0], "ExpressID,Name,Type,GlobalId,Height,Width");
        assert_eq!(lines[1], "1,a,IFCWALL,,,0.2");
        assert_eq!(lines[2], "2,b,IFCWALL,,3,");
    }

    #[test]
    fn test_csv_escaping_and_encoding() {
        let output = fixture_table().to_csv();
        assert_eq!(output.mime_type, "text/csv;charset=utf-8");
        assert!(output.bytes.starts_with(&[0xEF, 0xBB, 0xBF]));

        let csv = String::from_utf8(output.bytes).unwrap();
        let wall_b = csv.lines().find(|l| l.starts_with("31,")).unwrap();
        assert!(wall_b.starts_with("31,\"Wall B, \"\"north\"\"\",IFCWALL,"));

        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_json_rows_keep_column_order() {
        let output = fixture_table().to_json().unwrap();
        assert_eq!(output.mime_type, "application/json");

        let text = String::from_utf8(output.bytes.clone()).unwrap();
        let express = text.find("\"ExpressID\"").unwrap();
        let global = text.find("\"GlobalId\"").unwrap();
        let fire = text.find("\"FireRating\"").unwrap();
        assert!(express < global && global < fire);

        let value: serde_json::Value = serde_json::from_slice(&output.bytes).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 12);
        let wall = rows.iter().find(|r| r["ExpressID"] == 30).unwrap();
        assert_eq!(wall["IsExternal"], "true");
        assert_eq!(wall["LoadBearing"], "");
        assert_eq!(wall["GlobalId"], "2O2Fr$t4X7Zf8NOew3FLOH");
    }
}
