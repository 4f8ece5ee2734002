// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Length unit extraction from IfcProject.UnitsInContext

use ifc_lite_model::{DecodedEntity, EntityResolver, IfcType};

/// Conversion-based units may nest; real files stop after one or two levels
const MAX_UNIT_DEPTH: usize = 4;

/// Extract the length unit scale (file units to metres)
///
/// Returns 1.0 if the project declares no usable length unit.
pub fn extract_unit_scale(resolver: &dyn EntityResolver) -> f64 {
    let Some(project) = resolver.entities_by_type(&IfcType::IfcProject).into_iter().next() else {
        return 1.0;
    };

    // IFCPROJECT(..., UnitsInContext) at index 8
    let Some(assignment) = project.get_ref(8).and_then(|id| resolver.get(id)) else {
        return 1.0;
    };

    // IFCUNITASSIGNMENT((units))
    assignment
        .get(0)
        .map(|units| resolver.resolve_ref_list(units))
        .unwrap_or_default()
        .iter()
        .find_map(|unit| length_unit_scale(unit, resolver, 0))
        .unwrap_or(1.0)
}

fn length_unit_scale(
    unit: &DecodedEntity,
    resolver: &dyn EntityResolver,
    depth: usize,
) -> Option<f64> {
    if depth > MAX_UNIT_DEPTH {
        return None;
    }

    match unit.ifc_type {
        IfcType::IfcSIUnit => si_unit_scale(unit),
        IfcType::IfcConversionBasedUnit => conversion_unit_scale(unit, resolver, depth),
        _ => None,
    }
}

/// IFCSIUNIT(*, UnitType, Prefix, Name)
fn si_unit_scale(unit: &DecodedEntity) -> Option<f64> {
    if unit.get_enum(1)? != "LENGTHUNIT" || unit.get_enum(3)? != "METRE" {
        return None;
    }

    Some(unit.get_enum(2).map_or(1.0, si_prefix_factor))
}

/// IFCCONVERSIONBASEDUNIT(Dimensions, UnitType, Name, ConversionFactor)
fn conversion_unit_scale(
    unit: &DecodedEntity,
    resolver: &dyn EntityResolver,
    depth: usize,
) -> Option<f64> {
    if unit.get_enum(1)? != "LENGTHUNIT" {
        return None;
    }

    // IFCMEASUREWITHUNIT(ValueComponent, UnitComponent)
    let factor = resolver.get(unit.get_ref(3)?)?;
    if factor.ifc_type != IfcType::IfcMeasureWithUnit {
        return None;
    }

    let value = factor.get_float(0)?;
    let base_scale = factor
        .get_ref(1)
        .and_then(|id| resolver.get(id))
        .and_then(|base| length_unit_scale(&base, resolver, depth + 1))
        .unwrap_or(1.0);

    Some(value * base_scale)
}

/// Multiplier for an SI prefix enumeration value
pub fn si_prefix_factor(prefix: &str) -> f64 {
    match prefix {
        "EXA" => 1e18,
        "PETA" => 1e15,
        "TERA" => 1e12,
        "GIGA" => 1e9,
        "MEGA" => 1e6,
        "KILO" => 1e3,
        "HECTO" => 1e2,
        "DECA" => 1e1,
        "DECI" => 1e-1,
        "CENTI" => 1e-2,
        "MILLI" => 1e-3,
        "MICRO" => 1e-6,
        "NANO" => 1e-9,
        "PICO" => 1e-12,
        "FEMTO" => 1e-15,
        "ATTO" => 1e-18,
        _ => 1.0,
    }
}
