// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HEADER section parsing and schema validation

use crate::tokenizer::{parse_arguments, Token};
use ifc_lite_model::{ModelMetadata, ParseError, Result};
use memchr::memmem;

/// Magic token every STEP exchange file starts with
const STEP_MAGIC: &str = "ISO-10303-21;";

/// Schema identifiers this parser understands
const SUPPORTED_SCHEMAS: &[&str] = &[
    "IFC2X3",
    "IFC4",
    "IFC4X1",
    "IFC4X2",
    "IFC4X3",
    "IFC4X3_ADD1",
    "IFC4X3_ADD2",
];

/// Parse the HEADER section into model metadata
///
/// Fails if the magic token or FILE_SCHEMA is missing, or if the schema
/// is not IFC2X3, IFC4, IFC4X1, IFC4X2 or an IFC4X3 release.
pub fn parse_header(content: &str) -> Result<ModelMetadata> {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    if !trimmed.starts_with(STEP_MAGIC) {
        return Err(ParseError::format("missing ISO-10303-21 header"));
    }

    let header = header_section(trimmed)?;

    let schema_args = record_arguments(header, "FILE_SCHEMA")
        .ok_or_else(|| ParseError::header("missing FILE_SCHEMA"))?;
    let schema_version = schema_args
        .first()
        .and_then(first_string)
        .ok_or_else(|| ParseError::header("FILE_SCHEMA names no schema"))?;
    check_schema(&schema_version)?;

    let mut metadata = ModelMetadata {
        schema_version,
        ..Default::default()
    };

    // FILE_NAME(name, time_stamp, (author), (organization),
    //           preprocessor_version, originating_system, authorization)
    if let Some(args) = record_arguments(header, "FILE_NAME") {
        metadata.file_name = args.first().and_then(Token::as_string);
        metadata.timestamp = args.get(1).and_then(Token::as_string);
        metadata.author = args.get(2).and_then(first_string);
        metadata.organization = args.get(3).and_then(first_string);
        metadata.preprocessor_version = args.get(4).and_then(Token::as_string);
        metadata.originating_system = args.get(5).and_then(Token::as_string);
    }

    if let Some(args) = record_arguments(header, "FILE_DESCRIPTION") {
        if let Some(Token::List(items)) = args.first() {
            let lines: Vec<String> = items.iter().filter_map(Token::as_string).collect();
            if !lines.is_empty() {
                metadata.file_description = Some(lines.join(" "));
            }
        }
    }

    // Empty strings carry no information
    for field in [
        &mut metadata.file_name,
        &mut metadata.timestamp,
        &mut metadata.author,
        &mut metadata.organization,
        &mut metadata.preprocessor_version,
        &mut metadata.originating_system,
    ] {
        if field.as_deref().is_some_and(str::is_empty) {
            *field = None;
        }
    }

    Ok(metadata)
}

/// Accept the known schema identifiers (case-insensitive), reject everything else
pub fn check_schema(schema: &str) -> Result<()> {
    let schema_id = schema.trim();
    if SUPPORTED_SCHEMAS
        .iter()
        .any(|s| s.eq_ignore_ascii_case(schema_id))
    {
        Ok(())
    } else {
        Err(ParseError::UnsupportedSchema(schema.to_string()))
    }
}

fn header_section(content: &str) -> Result<&str> {
    let bytes = content.as_bytes();
    let start = memmem::find(bytes, b"HEADER;")
        .ok_or_else(|| ParseError::header("missing HEADER section"))?;
    let end = memmem::find(&bytes[start..], b"ENDSEC;")
        .map(|e| start + e)
        .ok_or_else(|| ParseError::header("HEADER section is not terminated"))?;
    Ok(&content[start + 7..end])
}

fn record_arguments<'a>(header: &'a str, keyword: &str) -> Option<Vec<Token<'a>>> {
    let pos = memmem::find(header.as_bytes(), keyword.as_bytes())?;
    parse_arguments(&header[pos + keyword.len()..]).ok()
}

/// String value or first string of a list value
fn first_string(token: &Token) -> Option<String> {
    match token {
        Token::List(items) => items.first().and_then(Token::as_string),
        other => other.as_string(),
    }
}
