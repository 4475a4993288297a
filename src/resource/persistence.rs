//! Rollback, server reconciliation and persistence.

use super::relationships::{Propagation, RelatedRef, Tracking};
use super::{merge_relationship, Resource};
use crate::error::StoreError;
use crate::payload::{RelationshipData, RelationshipSlot, ResourceObject};
use crate::schema::RelationKind;
use crate::tracking::RelationDelta;
use tracing::{debug, error, info, instrument};

impl Resource {
    /// Restores attributes and relationships to their state before the first
    /// change since the last reconciliation, and clears the deferred delete flag.
    pub fn rollback(&self) -> Result<(), StoreError> {
        let touched = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            state.attribute_tracker.restore(&mut state.attributes);
            state.delete_on_save = false;
            state.relationship_tracker.touched()
        };

        for (relation, delta) in touched {
            match delta {
                RelationDelta::ToOne(delta) => {
                    let Some(original) = delta.original() else {
                        continue;
                    };
                    let original = original.map(|ident| ident.id.clone());
                    if let Some(current) = self.related_ids(&relation).into_iter().next() {
                        self.unlink(&relation, &current, Tracking::Untracked)?;
                    }
                    if let Some(id) = original {
                        self.link(&relation, RelatedRef::Id(id), Propagation::InverseOnly, Tracking::Untracked)?;
                    }
                }
                RelationDelta::ToMany(delta) => {
                    let Some(original) = delta.original().map(<[_]>::to_vec) else {
                        continue;
                    };
                    for ident in delta.added() {
                        self.unlink(&relation, &ident.id, Tracking::Untracked)?;
                    }
                    for ident in delta.removed() {
                        self.link(
                            &relation,
                            RelatedRef::Id(ident.id.clone()),
                            Propagation::InverseOnly,
                            Tracking::Untracked,
                        )?;
                    }
                    if let Some(slot) = self.state.borrow_mut().relationships.get_mut(&relation) {
                        slot.data = RelationshipData::ToMany(original);
                    }
                }
            }
        }

        let mut state = self.state.borrow_mut();
        let definition = state.definition.clone();
        state.relationship_tracker.reset(definition.relations());
        debug!(resource = %state.label(), "Rolled back");
        Ok(())
    }

    /// Applies a server payload after a successful persist or refresh.
    ///
    /// Attributes are replaced wholesale when present. Relationships are merged
    /// per relation, overwriting only the `links`/`data` members the payload
    /// carries. All deltas are cleared. A payload for a different id is refused.
    pub fn reconcile_with_server(&self, payload: &ResourceObject) -> Result<(), StoreError> {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;

        if let Some(id) = &payload.id {
            match &state.id {
                Some(current) if current != id => {
                    return Err(StoreError::IdentityMismatch {
                        expected: state.label(),
                        found: format!("{}:{}", payload.resource_type, id),
                    });
                }
                Some(_) => {}
                None => {
                    state.id = Some(id.clone());
                    state.is_new = false;
                }
            }
        }

        if let Some(attributes) = &payload.attributes {
            state.attributes = attributes.clone();
        }
        if let Some(relationships) = &payload.relationships {
            for (name, object) in relationships {
                let kind = state.definition.relation_meta(name).map(|meta| meta.kind);
                let slot = state
                    .relationships
                    .entry(name.clone())
                    .or_insert_with(|| RelationshipSlot::empty(kind.unwrap_or(RelationKind::ToOne)));
                merge_relationship(slot, object, kind, name)?;
            }
        }
        if let Some(links) = &payload.links {
            state.links = links.clone();
        }
        if let Some(meta) = &payload.meta {
            state.meta = meta.clone();
        }

        state.attribute_tracker.reset();
        state.relationship_tracker.reset(state.definition.relations());
        debug!(resource = %state.label(), "Reconciled with server");
        Ok(())
    }

    /// Accepts the current local state as persisted.
    fn clear_changes(&self) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.attribute_tracker.reset();
        state.relationship_tracker.reset(state.definition.relations());
    }

    /// Flags the resource for deletion on the next [`save`](Self::save).
    pub fn delete_on_save(&self) {
        self.state.borrow_mut().delete_on_save = true;
    }

    pub fn is_scheduled_for_deletion(&self) -> bool {
        self.state.borrow().delete_on_save
    }

    /// Persists the resource: deletes it when flagged, creates it when new,
    /// updates it otherwise.
    #[instrument(skip(self), fields(resource = %self))]
    pub async fn save(&self) -> Result<(), StoreError> {
        if self.is_scheduled_for_deletion() {
            return self.delete().await;
        }
        if self.is_deleted() {
            error!("Cannot save a deleted resource");
            return Err(StoreError::AlreadyDeleted(self.state.borrow().label()));
        }

        let resource_type = self.resource_type();
        let store = self.store()?;
        let service = store.service(&resource_type)?;
        let payload = self.to_payload();

        if self.is_new() {
            let created = service.create_resource(&payload).await.inspect_err(|err| {
                error!(error = %err, "Create failed");
            })?;
            self.reconcile_with_server(&created)?;
            store.cache_resource(self)?;
            info!(resource = %self, "Created");
        } else {
            let include = self.changed_relationships();
            let updated = service
                .update_resource(&payload, &include)
                .await
                .inspect_err(|err| error!(error = %err, "Update failed"))?;
            match updated {
                Some(updated) => self.reconcile_with_server(&updated)?,
                None => self.clear_changes(),
            }
            info!(resource = %self, relationships = include.len(), "Updated");
        }
        Ok(())
    }

    /// Deletes the resource.
    ///
    /// A new resource is destroyed immediately. A persisted one is deleted
    /// through its type service and destroyed only once that succeeds. Deleting
    /// twice is an error and leaves the resource untouched.
    #[instrument(skip(self), fields(resource = %self))]
    pub async fn delete(&self) -> Result<(), StoreError> {
        let pending = {
            let mut state = self.state.borrow_mut();
            if state.destroyed || state.deleting {
                error!("Resource already deleted");
                return Err(StoreError::AlreadyDeleted(state.label()));
            }
            if state.is_new {
                None
            } else {
                state.deleting = true;
                Some(state.label())
            }
        };

        let Some(label) = pending else {
            self.destroy();
            return Ok(());
        };

        let result = self.delete_remote(&label).await;
        match result {
            Ok(()) => {
                self.destroy();
                Ok(())
            }
            Err(err) => {
                self.state.borrow_mut().deleting = false;
                error!(error = %err, "Delete failed");
                Err(err)
            }
        }
    }

    async fn delete_remote(&self, label: &str) -> Result<(), StoreError> {
        let identifier = self
            .identifier()
            .ok_or_else(|| StoreError::NotPersisted(label.to_owned()))?;
        let service = self.store()?.service(&identifier.resource_type)?;
        service.delete_resource(&identifier).await
    }

    /// Enters the destroyed phase: detaches from every proxy holding this
    /// resource and evicts it from the cache.
    pub(crate) fn destroy(&self) {
        let hooks = {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.deleting = false;
            state.delete_on_save = false;
            std::mem::take(&mut state.detach_hooks)
        };
        for hook in hooks {
            if let Some(proxy) = hook.upgrade() {
                proxy.detach(self);
            }
        }
        if let Ok(store) = self.store() {
            store.evict(self);
        }
        info!(resource = %self, "Destroyed");
    }
}
