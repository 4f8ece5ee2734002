// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fast entity scanner using SIMD-accelerated byte searching
//!
//! Scans the DATA section to discover entity boundaries without full parsing.

use ifc_lite_model::{EntityId, IfcType};
use memchr::{memchr, memmem};
use rustc_hash::FxHashMap;

/// Byte range of each entity instance, keyed by STEP id
pub type EntityOffsets = FxHashMap<u32, (usize, usize)>;

/// Result of a full scan over the DATA section
#[derive(Default)]
pub struct EntityIndex {
    pub offsets: EntityOffsets,
    /// Entity IDs in file order
    pub order: Vec<EntityId>,
    /// Entity IDs grouped by type, each group in file order
    pub by_type: FxHashMap<IfcType, Vec<EntityId>>,
    /// True if the last instance ran into end of input without a `;`
    pub truncated: bool,
}

impl EntityIndex {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Fast entity scanner for IFC files
///
/// Uses memchr to find candidate `#` positions and only treats those at the
/// start of a statement as instance definitions.
pub struct EntityScanner<'a> {
    content: &'a str,
    pos: usize,
    truncated: bool,
}

impl<'a> EntityScanner<'a> {
    /// Create a scanner positioned after the `DATA;` keyword
    ///
    /// Returns `None` if the content has no DATA section.
    pub fn new(content: &'a str) -> Option<Self> {
        let pos = memmem::find(content.as_bytes(), b"DATA;")? + 5;
        Some(Self {
            content,
            pos,
            truncated: false,
        })
    }

    /// Scan to find the next entity
    ///
    /// Returns (id, type_name, start_byte, end_byte)
    pub fn next_entity(&mut self) -> Option<(u32, &'a str, usize, usize)> {
        let bytes = self.content.as_bytes();

        while self.pos < bytes.len() {
            let hash_pos = memchr(b'#', &bytes[self.pos..])?;
            self.pos += hash_pos;

            // References inside attribute lists are preceded by '(' or ','
            if !self.at_statement_start() {
                self.pos += 1;
                continue;
            }

            let start = self.pos;
            self.pos += 1;

            let id_start = self.pos;
            self.skip_while(|b| b.is_ascii_digit());
            if self.pos == id_start {
                continue;
            }
            let Ok(id) = self.content[id_start..self.pos].parse::<u32>() else {
                continue;
            };

            self.skip_while(|b| b == b' ' || b == b'\t');
            if bytes.get(self.pos) != Some(&b'=') {
                continue;
            }
            self.pos += 1;
            self.skip_while(|b| b.is_ascii_whitespace());

            let type_start = self.pos;
            self.skip_while(|b| b.is_ascii_alphanumeric() || b == b'_');
            if self.pos == type_start {
                continue;
            }
            let type_name = &self.content[type_start..self.pos];

            let Some(end) = self.find_entity_end() else {
                self.truncated = true;
                return None;
            };

            return Some((id, type_name, start, end));
        }

        None
    }

    /// Whether the input ended inside an unterminated instance
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    fn at_statement_start(&self) -> bool {
        let bytes = self.content.as_bytes();
        bytes[..self.pos]
            .iter()
            .rev()
            .find(|b| !matches!(b, b' ' | b'\t'))
            .map_or(true, |b| matches!(b, b'\n' | b'\r' | b';'))
    }

    fn skip_while(&mut self, pred: impl Fn(u8) -> bool) {
        let bytes = self.content.as_bytes();
        while self.pos < bytes.len() && pred(bytes[self.pos]) {
            self.pos += 1;
        }
    }

    /// Find the end of an entity (semicolon), handling quoted strings
    fn find_entity_end(&mut self) -> Option<usize> {
        let bytes = self.content.as_bytes();
        let mut in_string = false;

        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'\'' => {
                    if in_string && bytes.get(self.pos + 1) == Some(&b'\'') {
                        self.pos += 2;
                        continue;
                    }
                    in_string = !in_string;
                }
                b';' if !in_string => {
                    self.pos += 1;
                    return Some(self.pos);
                }
                _ => {}
            }
            self.pos += 1;
        }

        None
    }

    /// Scan the whole DATA section into an index
    ///
    /// Returns `None` if there is no DATA section. Duplicate IDs keep the
    /// last definition.
    pub fn build_index(content: &'a str) -> Option<EntityIndex> {
        let mut scanner = Self::new(content)?;
        let mut index = EntityIndex::default();

        while let Some((id, type_name, start, end)) = scanner.next_entity() {
            if index.offsets.insert(id, (start, end)).is_none() {
                index.order.push(EntityId(id));
                index
                    .by_type
                    .entry(IfcType::parse(type_name))
                    .or_default()
                    .push(EntityId(id));
            }
        }

        index.truncated = scanner.truncated();
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT: &str = "ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPROJECT('guid',$,'Project',$,$,$,$,$,$);
#2=IFCWALL('guid2',$,'It''s; a wall',$,$,$,#1,$);
  #3 = IFCWALL('guid3',$,'Wall 2',$,$,$,$,$);
ENDSEC;
END-ISO-10303-21;
";

    #[test]
    fn test_scanner_finds_entities() {
        let mut scanner = EntityScanner::new(CONTENT).unwrap();

        let (id, type_name, _, _) = scanner.next_entity().unwrap();
        assert_eq!(id, 1);
        assert_eq!(type_name, "IFCPROJECT");

        // The ';' inside the quoted name must not end the instance
        let (id, type_name, start, end) = scanner.next_entity().unwrap();
        assert_eq!(id, 2);
        assert_eq!(type_name, "IFCWALL");
        assert!(CONTENT[start..end].ends_with("$);"));

        // Indented definition, reference #1 above was skipped
        let (id, _, _, _) = scanner.next_entity().unwrap();
        assert_eq!(id, 3);

        assert!(scanner.next_entity().is_none());
        assert!(!scanner.truncated());
    }

    #[test]
    fn test_build_index() {
        let index = EntityScanner::build_index(CONTENT).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.order, vec![EntityId(1), EntityId(2), EntityId(3)]);
        assert_eq!(index.by_type[&IfcType::IfcWall], vec![EntityId(2), EntityId(3)]);
    }

    #[test]
    fn test_missing_data_section() {
        assert!(EntityScanner::build_index("ISO-10303-21;\nHEADER;\nENDSEC;").is_none());
    }

    #[test]
    fn test_truncated_instance() {
        let index = EntityScanner::build_index("DATA;\n#1=IFCWALL('a',$;\n#2=IFCWALL('b").unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.truncated);
    }
}
