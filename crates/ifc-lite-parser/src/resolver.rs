// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! EntityResolver trait implementation

use crate::scanner::EntityIndex;
use crate::tokenizer::parse_entity_at;
use ifc_lite_model::{DecodedEntity, EntityId, EntityResolver, IfcType};
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe, lazily decoding entity resolver
///
/// Entities stay as raw text until first requested; decoded instances are
/// cached behind a `RwLock` so geometry workers can share them.
pub struct ResolverImpl {
    /// Raw IFC content (owned for thread safety)
    content: String,
    index: EntityIndex,
    cache: RwLock<FxHashMap<u32, Arc<DecodedEntity>>>,
}

impl ResolverImpl {
    pub fn new(content: String, index: EntityIndex) -> Self {
        Self {
            content,
            index,
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    /// Number of decoded entities currently cached
    pub fn cached_count(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    fn decode_and_cache(&self, id: u32) -> Option<Arc<DecodedEntity>> {
        {
            let cache = self.cache.read().ok()?;
            if let Some(cached) = cache.get(&id) {
                return Some(Arc::clone(cached));
            }
        }

        let (start, end) = self.index.offsets.get(&id)?;

        // A malformed instance resolves like a dangling reference
        let entity = Arc::new(parse_entity_at(&self.content, *start, *end).ok()?);

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(id, Arc::clone(&entity));
        }

        Some(entity)
    }
}

impl EntityResolver for ResolverImpl {
    fn get(&self, id: EntityId) -> Option<Arc<DecodedEntity>> {
        self.decode_and_cache(id.0)
    }

    fn entities_by_type(&self, ifc_type: &IfcType) -> Vec<Arc<DecodedEntity>> {
        self.index
            .by_type
            .get(ifc_type)
            .map(|ids| ids.iter().filter_map(|id| self.get(*id)).collect())
            .unwrap_or_default()
    }

    fn ids_by_type(&self, ifc_type: &IfcType) -> Vec<EntityId> {
        self.index.by_type.get(ifc_type).cloned().unwrap_or_default()
    }

    fn all_ids(&self) -> Vec<EntityId> {
        self.index.order.clone()
    }

    fn entity_count(&self) -> usize {
        self.index.len()
    }
}
