// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property set access for IFC entities

use crate::EntityId;
use serde::{Deserialize, Serialize};

/// A single property value with optional unit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    /// Property value formatted for display
    pub value: String,
    pub unit: Option<String>,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            unit: None,
        }
    }

    pub fn with_unit(
        name: impl Into<String>,
        value: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            unit: Some(unit.into()),
        }
    }
}

/// A named property set (e.g. `Pset_WallCommon`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertySet {
    pub name: String,
    /// Properties in source declaration order
    pub properties: Vec<Property>,
}

impl PropertySet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn add(&mut self, property: Property) {
        self.properties.push(property);
    }

    /// Get a property by name
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Property reader trait
///
/// Property sets come from IfcPropertySet entities linked via
/// IfcRelDefinesByProperties. Readers never fail: an entity without
/// attached data simply yields empty results.
pub trait PropertyReader: Send + Sync {
    /// All property sets attached to an entity, in relationship order
    fn property_sets(&self, id: EntityId) -> Vec<PropertySet>;

    /// Entity's GlobalId (attribute 0 of every IfcRoot)
    fn global_id(&self, id: EntityId) -> Option<String>;

    /// Entity's Name (attribute 2 of every IfcRoot)
    fn name(&self, id: EntityId) -> Option<String>;

    /// Entity's STEP type name, e.g. `IFCWALL`
    fn type_name(&self, id: EntityId) -> Option<String>;
}
