// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PropertyReader trait implementation

use ifc_lite_model::{
    AttributeValue, DecodedEntity, EntityId, EntityResolver, IfcType, Property, PropertyReader,
    PropertySet,
};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Property reader backed by an index of IfcRelDefinesByProperties
pub struct PropertyReaderImpl {
    resolver: Arc<dyn EntityResolver>,
    /// Entity ID -> property set IDs, in relationship order
    pset_index: FxHashMap<EntityId, Vec<EntityId>>,
}

impl PropertyReaderImpl {
    pub fn new(resolver: Arc<dyn EntityResolver>) -> Self {
        let mut pset_index: FxHashMap<EntityId, Vec<EntityId>> = FxHashMap::default();

        for rel in resolver.entities_by_type(&IfcType::IfcRelDefinesByProperties) {
            // RelatedObjects at index 4, RelatingPropertyDefinition at index 5
            let Some(related) = rel.get_refs(4) else {
                continue;
            };

            // IFC4 allows a set of definitions in place of a single one
            let definitions = match rel.get(5) {
                Some(AttributeValue::EntityRef(id)) => vec![*id],
                Some(AttributeValue::List(_)) => rel.get_refs(5).unwrap_or_default(),
                _ => continue,
            };

            for pset_id in definitions {
                let is_pset = resolver
                    .get(pset_id)
                    .is_some_and(|pset| pset.ifc_type == IfcType::IfcPropertySet);
                if !is_pset {
                    continue;
                }
                for object_id in &related {
                    pset_index.entry(*object_id).or_default().push(pset_id);
                }
            }
        }

        Self {
            resolver,
            pset_index,
        }
    }

    fn read_property_set(&self, pset: &DecodedEntity) -> PropertySet {
        // IFCPROPERTYSET(GlobalId, OwnerHistory, Name, Description, HasProperties)
        let mut set = PropertySet::new(pset.get_string(2).unwrap_or_default());

        if let Some(props) = pset.get(4) {
            for prop in self.resolver.resolve_ref_list(props) {
                if let Some(property) = self.read_property(&prop) {
                    set.add(property);
                }
            }
        }

        set
    }

    fn read_property(&self, prop: &DecodedEntity) -> Option<Property> {
        let name = prop.get_string(0)?.to_string();

        let (value, unit) = match prop.ifc_type {
            // (Name, Description, NominalValue, Unit)
            IfcType::IfcPropertySingleValue => (
                prop.get(2).map(format_value).unwrap_or_default(),
                prop.get(3).and_then(|u| self.unit_symbol(u)),
            ),
            // (Name, Description, EnumerationValues, EnumerationReference)
            IfcType::IfcPropertyEnumeratedValue => (join_values(prop.get(2)?), None),
            // (Name, Description, ListValues, Unit)
            IfcType::IfcPropertyListValue => (
                join_values(prop.get(2)?),
                prop.get(3).and_then(|u| self.unit_symbol(u)),
            ),
            // (Name, Description, UpperBoundValue, LowerBoundValue, Unit)
            IfcType::IfcPropertyBoundedValue => {
                let upper = prop.get(2).filter(|v| !v.is_null()).map(format_value);
                let lower = prop.get(3).filter(|v| !v.is_null()).map(format_value);
                let value = match (lower, upper) {
                    (Some(l), Some(u)) => format!("{l} - {u}"),
                    (Some(l), None) => format!(">= {l}"),
                    (None, Some(u)) => format!("<= {u}"),
                    (None, None) => return None,
                };
                (value, prop.get(4).and_then(|u| self.unit_symbol(u)))
            }
            _ => return None,
        };

        Some(Property { name, value, unit })
    }

    /// Short display symbol for a unit reference
    fn unit_symbol(&self, attr: &AttributeValue) -> Option<String> {
        let unit = self.resolver.resolve_ref(attr)?;

        match unit.ifc_type {
            IfcType::IfcSIUnit => {
                let prefix = match unit.get_enum(2).unwrap_or_default() {
                    "MILLI" => "m",
                    "CENTI" => "c",
                    "DECI" => "d",
                    "KILO" => "k",
                    _ => "",
                };
                let name = unit.get_enum(3)?;
                let symbol = match name {
                    "METRE" => "m",
                    "SQUARE_METRE" => "m²",
                    "CUBIC_METRE" => "m³",
                    "GRAM" => "g",
                    "SECOND" => "s",
                    "KELVIN" => "K",
                    "DEGREE_CELSIUS" => "°C",
                    "AMPERE" => "A",
                    "WATT" => "W",
                    "PASCAL" => "Pa",
                    "NEWTON" => "N",
                    other => other,
                };
                Some(format!("{prefix}{symbol}"))
            }
            // Name at index 2
            IfcType::IfcConversionBasedUnit => unit.get_string(2).map(str::to_string),
            _ => None,
        }
    }
}

/// Format an attribute value for display
pub fn format_value(attr: &AttributeValue) -> String {
    match attr {
        AttributeValue::String(s) => s.clone(),
        AttributeValue::Integer(i) => i.to_string(),
        AttributeValue::Float(f) => format_float(*f),
        AttributeValue::Enum(e) => match attr.as_bool() {
            Some(b) => b.to_string(),
            None => e.clone(),
        },
        AttributeValue::TypedValue(_, args) => args.first().map(format_value).unwrap_or_default(),
        AttributeValue::List(items) => items.iter().map(format_value).collect::<Vec<_>>().join(", "),
        AttributeValue::EntityRef(id) => id.to_string(),
        AttributeValue::Null | AttributeValue::Derived => String::new(),
    }
}

fn format_float(f: f64) -> String {
    let s = format!("{f:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn join_values(attr: &AttributeValue) -> String {
    match attr {
        AttributeValue::List(items) => items.iter().map(format_value).collect::<Vec<_>>().join(", "),
        other => format_value(other),
    }
}

impl PropertyReader for PropertyReaderImpl {
    fn property_sets(&self, id: EntityId) -> Vec<PropertySet> {
        self.pset_index
            .get(&id)
            .map(|pset_ids| {
                pset_ids
                    .iter()
                    .filter_map(|pset_id| self.resolver.get(*pset_id))
                    .map(|pset| self.read_property_set(&pset))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn global_id(&self, id: EntityId) -> Option<String> {
        let entity = self.resolver.get(id)?;
        entity.get_string(0).map(str::to_string)
    }

    fn name(&self, id: EntityId) -> Option<String> {
        let entity = self.resolver.get(id)?;
        entity.get_string(2).map(str::to_string)
    }

    fn type_name(&self, id: EntityId) -> Option<String> {
        self.resolver.get(id).map(|e| e.ifc_type.name().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolverImpl;
    use crate::scanner::EntityScanner;

    const CONTENT: &str = "DATA;
#1=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',$,'Wall 1',$,$,$,$,$);
#2=IFCPROPERTYSINGLEVALUE('IsExternal',$,IFCBOOLEAN(.T.),$);
#3=IFCPROPERTYSINGLEVALUE('Width',$,IFCLENGTHMEASURE(0.25),#9);
#4=IFCPROPERTYENUMERATEDVALUE('Status',$,(IFCLABEL('NEW'),IFCLABEL('EXISTING')),$);
#5=IFCPROPERTYSET('psetguid',$,'Pset_WallCommon',$,(#2,#3,#4));
#6=IFCRELDEFINESBYPROPERTIES('relguid',$,$,$,(#1),#5);
#7=IFCPROPERTYBOUNDEDVALUE('Range',$,IFCREAL(10.),IFCREAL(2.5),$,$);
#8=IFCPROPERTYSET('psetguid2',$,'Custom',$,(#7));
#9=IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.);
#10=IFCRELDEFINESBYPROPERTIES('relguid2',$,$,$,(#1),#8);
ENDSEC;
";

    fn reader() -> PropertyReaderImpl {
        let index = EntityScanner::build_index(CONTENT).unwrap();
        let resolver: Arc<dyn EntityResolver> = Arc::new(ResolverImpl::new(CONTENT.to_string(), index));
        PropertyReaderImpl::new(resolver)
    }

    #[test]
    fn test_property_sets_in_relationship_order() {
        let reader = reader();
        let psets = reader.property_sets(EntityId(1));

        assert_eq!(psets.len(), 2);
        assert_eq!(psets[0].name, "Pset_WallCommon");
        assert_eq!(psets[1].name, "Custom");

        let names: Vec<&str> = psets[0].properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["IsExternal", "Width", "Status"]);
    }

    #[test]
    fn test_property_values() {
        let reader = reader();
        let props: Vec<Property> = reader
            .property_sets(EntityId(1))
            .into_iter()
            .flat_map(|pset| pset.properties)
            .collect();
        let find = |name: &str| props.iter().find(|p| p.name == name).cloned();

        assert_eq!(
            find("IsExternal").map(|p| p.value),
            Some("true".to_string())
        );

        let width = find("Width").unwrap();
        assert_eq!(width.value, "0.25");
        assert_eq!(width.unit.as_deref(), Some("mm"));

        assert_eq!(
            find("Status").map(|p| p.value),
            Some("NEW, EXISTING".to_string())
        );
        assert_eq!(
            find("Range").map(|p| p.value),
            Some("2.5 - 10".to_string())
        );
    }

    #[test]
    fn test_root_attributes() {
        let reader = reader();
        assert_eq!(reader.global_id(EntityId(1)).as_deref(), Some("2O2Fr$t4X7Zf8NOew3FLOH"));
        assert_eq!(reader.name(EntityId(1)).as_deref(), Some("Wall 1"));
        assert_eq!(reader.type_name(EntityId(1)).as_deref(), Some("IFCWALL"));
        assert!(reader.property_sets(EntityId(99)).is_empty());
        assert!(reader.type_name(EntityId(99)).is_none());
    }
}
