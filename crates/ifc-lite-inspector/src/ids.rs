// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identifier types
//!
//! [`ObjectId`] comes from the file and is stable across reloads.
//! [`NodeId`] is assigned while building the object tree and is not.
//! They are separate types so one can never stand in for the other.

use ifc_lite_model::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source-assigned element identifier (the STEP instance number)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl From<EntityId> for ObjectId {
    fn from(id: EntityId) -> Self {
        ObjectId(id.0)
    }
}

impl From<ObjectId> for EntityId {
    fn from(id: ObjectId) -> Self {
        EntityId(id.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tree-local node identifier, sequential from 0 per build
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// `prefix-<millis>` identifiers, strictly increasing within one generator
#[derive(Debug, Default)]
pub(crate) struct TimestampIds {
    last: u64,
}

impl TimestampIds {
    pub(crate) fn next(&mut self, prefix: &str) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.last = now.max(self.last + 1);
        format!("{prefix}-{}", self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ids_are_unique() {
        let mut ids = TimestampIds::default();
        let a = ids.next("view");
        let b = ids.next("view");
        assert!(a.starts_with("view-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_object_id_roundtrips_entity_id() {
        let id = ObjectId::from(EntityId(42));
        assert_eq!(EntityId::from(id), EntityId(42));
        assert_eq!(id.to_string(), "42");
    }
}
