//! Relationship mutation API.
//!
//! Every mutation goes through [`Resource::link`] / [`Resource::unlink`], which
//! update the slot data, record the delta, patch the live proxy and, for
//! forward calls, mirror the change onto the inverse relation of the related
//! resource.

use super::Resource;
use crate::error::StoreError;
use crate::identifier::Identifier;
use crate::payload::{RelationshipData, RelationshipSlot};
use crate::proxy::{ProxyContent, RelatedProxy};
use crate::schema::{RelationKind, RelationMeta};
use tracing::{debug, warn};

/// Direction of a relationship mutation.
///
/// `Forward` mutations also update the inverse relation on the related
/// resource; that inverse call is made with `InverseOnly`, which stops there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Forward,
    InverseOnly,
}

/// Whether a mutation records a delta. Rollback restores state untracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tracking {
    Tracked,
    Untracked,
}

/// The target of `add_relationship`: an id or a live resource.
#[derive(Debug, Clone)]
pub enum RelatedRef {
    Id(String),
    Resource(Resource),
}

impl From<&str> for RelatedRef {
    fn from(id: &str) -> Self {
        RelatedRef::Id(id.to_owned())
    }
}

impl From<String> for RelatedRef {
    fn from(id: String) -> Self {
        RelatedRef::Id(id)
    }
}

impl From<u64> for RelatedRef {
    fn from(id: u64) -> Self {
        RelatedRef::Id(id.to_string())
    }
}

impl From<i64> for RelatedRef {
    fn from(id: i64) -> Self {
        RelatedRef::Id(id.to_string())
    }
}

impl From<Resource> for RelatedRef {
    fn from(resource: Resource) -> Self {
        RelatedRef::Resource(resource)
    }
}

impl From<&Resource> for RelatedRef {
    fn from(resource: &Resource) -> Self {
        RelatedRef::Resource(resource.clone())
    }
}

/// Authoritative membership for `update_relationship`: one (nullable) id or a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelatedIds {
    One(Option<String>),
    Many(Vec<String>),
}

impl From<&str> for RelatedIds {
    fn from(id: &str) -> Self {
        RelatedIds::One(Some(id.to_owned()))
    }
}

impl From<String> for RelatedIds {
    fn from(id: String) -> Self {
        RelatedIds::One(Some(id))
    }
}

impl From<Option<&str>> for RelatedIds {
    fn from(id: Option<&str>) -> Self {
        RelatedIds::One(id.map(str::to_owned))
    }
}

impl From<Option<String>> for RelatedIds {
    fn from(id: Option<String>) -> Self {
        RelatedIds::One(id)
    }
}

impl<T: ToString> From<Vec<T>> for RelatedIds {
    fn from(ids: Vec<T>) -> Self {
        RelatedIds::Many(ids.iter().map(ToString::to_string).collect())
    }
}

impl<T: ToString, const N: usize> From<[T; N]> for RelatedIds {
    fn from(ids: [T; N]) -> Self {
        RelatedIds::Many(ids.iter().map(ToString::to_string).collect())
    }
}

impl Resource {
    /// Declared metadata for `relation`.
    pub fn relation_meta(&self, relation: &str) -> Result<RelationMeta, StoreError> {
        let state = self.state.borrow();
        state
            .definition
            .relation_meta(relation)
            .cloned()
            .ok_or_else(|| StoreError::UnknownRelation {
                resource_type: state.definition.resource_type.clone(),
                relation: relation.to_owned(),
            })
    }

    /// Links `related` through `relation` and mirrors it onto the inverse relation.
    pub fn add_relationship(&self, relation: &str, related: impl Into<RelatedRef>) -> Result<(), StoreError> {
        self.link(relation, related.into(), Propagation::Forward, Tracking::Tracked)
    }

    /// Like [`add_relationship`](Self::add_relationship) with an explicit direction.
    pub fn add_relationship_with(
        &self,
        relation: &str,
        related: impl Into<RelatedRef>,
        propagation: Propagation,
    ) -> Result<(), StoreError> {
        self.link(relation, related.into(), propagation, Tracking::Tracked)
    }

    pub fn add_relationships<I>(&self, relation: &str, related: I) -> Result<(), StoreError>
    where
        I: IntoIterator,
        I::Item: Into<RelatedRef>,
    {
        for item in related {
            self.add_relationship(relation, item)?;
        }
        Ok(())
    }

    /// Unlinks `id` from `relation`. Ids that are not linked are ignored.
    pub fn remove_relationship(&self, relation: &str, id: impl ToString) -> Result<(), StoreError> {
        self.unlink(relation, &id.to_string(), Tracking::Tracked)
    }

    pub fn remove_relationships<I>(&self, relation: &str, ids: I) -> Result<(), StoreError>
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        for id in ids {
            self.remove_relationship(relation, id)?;
        }
        Ok(())
    }

    /// Reconciles `relation` with authoritative membership.
    ///
    /// To-many updates are driven by size: a larger set only adds, a smaller set
    /// only removes, and an equal-size set with different members is fully diffed.
    pub fn update_relationship(&self, relation: &str, ids: impl Into<RelatedIds>) -> Result<(), StoreError> {
        self.apply_related_ids(relation, ids.into(), Propagation::Forward, Tracking::Tracked)
    }

    /// Writes resolved proxy content back into the relationship data.
    ///
    /// The content is server state, so no delta is recorded.
    pub fn reconcile_relationship(&self, relation: &str, content: &ProxyContent) -> Result<(), StoreError> {
        let ids = match content {
            ProxyContent::One(None) => return Ok(()),
            ProxyContent::One(Some(resource)) => match resource.id() {
                Some(id) => RelatedIds::One(Some(id)),
                None => return Ok(()),
            },
            ProxyContent::Many(items) => RelatedIds::Many(items.iter().filter_map(Resource::id).collect()),
        };
        self.apply_related_ids(relation, ids, Propagation::InverseOnly, Tracking::Untracked)
    }

    /// The live proxy for `relation`, or a fresh one when none exists or the last one failed.
    pub fn related(&self, relation: &str) -> Result<RelatedProxy, StoreError> {
        match self.live_proxy(relation) {
            Some(proxy) if !proxy.is_failed() => Ok(proxy),
            _ => RelatedProxy::new(self, relation),
        }
    }

    fn apply_related_ids(
        &self,
        relation: &str,
        ids: RelatedIds,
        propagation: Propagation,
        tracking: Tracking,
    ) -> Result<(), StoreError> {
        let meta = self.relation_meta(relation)?;
        let existing = self.related_ids(&meta.name);

        match (meta.kind, ids) {
            (RelationKind::ToOne, RelatedIds::One(id)) => {
                let current = existing.into_iter().next();
                if current == id {
                    return Ok(());
                }
                if let Some(old) = current {
                    self.unlink(&meta.name, &old, tracking)?;
                }
                if let Some(new) = id {
                    self.link(&meta.name, RelatedRef::Id(new), propagation, tracking)?;
                }
            }
            (RelationKind::ToMany, RelatedIds::Many(ids)) => {
                let missing: Vec<&String> = ids.iter().filter(|id| !existing.contains(id)).collect();
                let stale: Vec<&String> = existing.iter().filter(|id| !ids.contains(id)).collect();
                let (add, remove) = if existing.is_empty() || ids.len() > existing.len() {
                    (missing, Vec::new())
                } else if ids.len() < existing.len() {
                    (Vec::new(), stale)
                } else {
                    (missing, stale)
                };
                for id in remove {
                    self.unlink(&meta.name, id, tracking)?;
                }
                for id in add {
                    self.link(&meta.name, RelatedRef::Id(id.clone()), propagation, tracking)?;
                }
            }
            (kind, _) => {
                return Err(StoreError::KindMismatch {
                    relation: meta.name,
                    kind,
                })
            }
        }
        Ok(())
    }

    pub(crate) fn link(
        &self,
        relation: &str,
        related: RelatedRef,
        propagation: Propagation,
        tracking: Tracking,
    ) -> Result<(), StoreError> {
        let meta = self.relation_meta(relation)?;
        let (id, related) = match related {
            RelatedRef::Resource(resource) => (resource.id(), Some(resource)),
            RelatedRef::Id(id) => {
                let cached = self
                    .store()
                    .ok()
                    .and_then(|store| store.cache_lookup(&meta.target_type, &id));
                (Some(id), cached)
            }
        };
        if let Some(resource) = &related {
            let related_type = resource.resource_type();
            if related_type != meta.target_type {
                warn!(resource = %self, relation, expected = %meta.target_type, found = %related_type, "Related type mismatch");
            }
        }

        let proxy = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let label = state.label();
            if let Some(id) = &id {
                let ident = Identifier::new(&meta.target_type, id);
                let slot = state
                    .relationships
                    .entry(meta.name.clone())
                    .or_insert_with(|| RelationshipSlot::empty(meta.kind));
                match &mut slot.data {
                    RelationshipData::ToOne(current) => {
                        if current.as_ref() == Some(&ident) {
                            debug!(resource = %label, relation, %id, "Already related");
                            return Ok(());
                        }
                        if tracking == Tracking::Tracked {
                            state
                                .relationship_tracker
                                .record_to_one(&meta.name, current.as_ref(), Some(ident.clone()));
                        }
                        *current = Some(ident);
                    }
                    RelationshipData::ToMany(data) => {
                        if data.contains(&ident) {
                            debug!(resource = %label, relation, %id, "Already related");
                            return Ok(());
                        }
                        if tracking == Tracking::Tracked {
                            state
                                .relationship_tracker
                                .record_added(&meta.name, data, ident.clone());
                        }
                        data.push(ident);
                    }
                }
                debug!(resource = %label, relation, %id, "Relationship added");
            }
            state.proxies.get(&meta.name).cloned()
        };

        if let (Some(proxy), Some(resource)) = (&proxy, &related) {
            proxy.attach(resource);
        }

        if propagation == Propagation::Forward {
            if let (Some(inverse), Some(resource)) = (&meta.inverse, &related) {
                resource.link(inverse, RelatedRef::Resource(self.clone()), Propagation::InverseOnly, tracking)?;
            }
        }
        Ok(())
    }

    pub(crate) fn unlink(&self, relation: &str, id: &str, tracking: Tracking) -> Result<(), StoreError> {
        let meta = self.relation_meta(relation)?;
        let (removed, proxy) = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let removed = match state.relationships.get_mut(&meta.name).map(|slot| &mut slot.data) {
                Some(RelationshipData::ToOne(current)) => {
                    let matches = current
                        .as_ref()
                        .is_some_and(|ident| ident.refers_to(&meta.target_type, id));
                    if matches {
                        if tracking == Tracking::Tracked {
                            state
                                .relationship_tracker
                                .record_to_one(&meta.name, current.as_ref(), None);
                        }
                        *current = None;
                    }
                    matches
                }
                Some(RelationshipData::ToMany(data)) => match data.iter().position(|ident| ident.id == id) {
                    Some(pos) => {
                        if tracking == Tracking::Tracked {
                            let ident = data[pos].clone();
                            state.relationship_tracker.record_removed(&meta.name, data, ident);
                        }
                        data.remove(pos);
                        true
                    }
                    None => false,
                },
                None => false,
            };
            if removed {
                debug!(resource = %state.label(), relation, id, "Relationship removed");
            }
            (removed, state.proxies.get(&meta.name).cloned())
        };

        if let Some(proxy) = proxy {
            match meta.kind {
                RelationKind::ToOne if removed => proxy.clear(),
                RelationKind::ToOne => {}
                RelationKind::ToMany => proxy.detach_id(id),
            }
        }
        Ok(())
    }
}
