//! # Resource Cache
//!
//! Per-type registry of live resources keyed by id. Lookups are O(1) and
//! [`ResourceCache::all`] returns resources in insertion order.
//!
//! Freshness is not enforced here: each resource carries its own
//! `cached_at + cache_duration` check (see [`Resource::is_cache_expired`]).

use crate::error::StoreError;
use crate::resource::Resource;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Default)]
pub struct ResourceCache {
    resource_type: String,
    entries: HashMap<String, Resource>,
    order: Vec<String>,
}

impl ResourceCache {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            ..Self::default()
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn lookup(&self, id: &str) -> Option<Resource> {
        self.entries.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Stores `resource` under its id and returns any other instance it displaced.
    pub fn store(&mut self, resource: Resource) -> Result<Option<Resource>, StoreError> {
        let id = resource
            .id()
            .ok_or_else(|| StoreError::NotPersisted(resource.to_string()))?;
        match self.entries.insert(id.clone(), resource) {
            Some(previous) => {
                let displaced = self
                    .entries
                    .get(&id)
                    .is_some_and(|current| !current.ptr_eq(&previous));
                if displaced {
                    warn!(resource_type = %self.resource_type, %id, "Replaced live instance");
                    Ok(Some(previous))
                } else {
                    Ok(None)
                }
            }
            None => {
                self.order.push(id);
                Ok(None)
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Resource> {
        let removed = self.entries.remove(id);
        if removed.is_some() {
            self.order.retain(|key| key != id);
        }
        removed
    }

    /// Cached resources in insertion order.
    pub fn all(&self) -> Vec<Resource> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
